// SPDX-FileCopyrightText: 2026 Pulse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed event dispatch registry for the Pulse sync core.
//!
//! All cross-component communication goes through an [`EventBus`]: the
//! connection re-dispatches push events here, and the synchronizers and the
//! presence tracker subscribe to the topics they own.

pub mod event;
pub mod registry;
pub mod topic;

pub use event::{BusEvent, TransportEvent};
pub use registry::{DispatchReport, EventBus, SubscriptionHandle};
pub use topic::Topic;
