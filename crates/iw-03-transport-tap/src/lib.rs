//! # Transport Tap Subsystem
//!
//! **Component:** inbound transport capture + outbound worker-send capture
//!
//! ## Coverage
//!
//! ```text
//! front-end ──▶ transport signal ──▶ TransportTap ──▶ requester-to-coordinator
//! worker    ──▶ transport signal ──▶ TransportTap ──▶ worker-to-coordinator
//! coordinator ──▶ worker send observer ───────────▶ coordinator-to-worker
//! ```
//!
//! The tap does not care which primitive registered the handler, or whether
//! one exists at all, so traffic to late or missing handlers is still seen.
//!
//! ## Self-Exclusion
//!
//! Relay and excluded channels, and the privileged worker's own scope, are
//! filtered in both directions.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod tap;
pub mod worker_send;

pub use tap::TransportTap;
pub use worker_send::{SendRecorder, WorkerSendTracker};
