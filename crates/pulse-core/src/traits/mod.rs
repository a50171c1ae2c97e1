// SPDX-FileCopyrightText: 2026 Pulse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter trait definitions.
//!
//! All adapters extend the [`PluginAdapter`] base trait and use
//! `#[async_trait]` for dynamic dispatch compatibility.

pub mod adapter;
pub mod authority;
pub mod transport;

pub use adapter::PluginAdapter;
pub use authority::RemoteAuthority;
pub use transport::{PushTransport, TransportFactory};
