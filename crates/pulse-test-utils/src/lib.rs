// SPDX-FileCopyrightText: 2026 Pulse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Pulse integration tests.
//!
//! Provides mock adapters and test harness infrastructure for fast,
//! deterministic, CI-runnable tests without a push broker or HTTP server.
//!
//! # Components
//!
//! - [`MockTransportFactory`] - In-memory push channel with frame injection and capture
//! - [`MockAuthority`] - Scriptable remote authority that records every call
//! - [`TestHarness`] - A [`SyncSession`](pulse_sync::SyncSession) wired to both mocks

pub mod fixtures;
pub mod harness;
pub mod mock_authority;
pub mod mock_transport;

pub use harness::TestHarness;
pub use mock_authority::{AuthorityCall, MockAuthority};
pub use mock_transport::{MockTransport, MockTransportFactory};
