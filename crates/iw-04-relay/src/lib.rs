//! # Cross-Context Relay
//!
//! **Component:** coordinator-side forwarding to the privileged worker
//!
//! ## Purpose
//!
//! Every captured event leaves the coordinating process through an
//! `EventRelay`, which implements `EventSink`. The relay forwards to the
//! privileged worker that owns the canonical log, and exposes the pull
//! ("get all events") and reset ("clear events") operations.
//!
//! ## Startup
//!
//! | State | `track` | `fetch_events` / `clear_events` |
//! |-------|---------|---------------------------------|
//! | `Starting` | held in a bounded backlog | `RelayError::NotReady` |
//! | `Ready` | sent as `render-event` | round trip to the worker |
//!
//! `PrivilegedWorkerLauncher` drives the `Starting → Ready` transition, with
//! one retry when the worker's scope was not registered yet.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod error;
pub mod launcher;
pub mod relay;

pub use error::RelayError;
pub use launcher::{LaunchOutcome, PrivilegedWorkerLauncher};
pub use relay::{EventRelay, RelayState, STARTUP_BACKLOG};
