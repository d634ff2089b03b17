//! # Requester-Side Tracking
//!
//! **Component:** decorator over a front-end context's bus
//!
//! ## Purpose
//!
//! Completes the picture the coordinator-side tap cannot see: replies to
//! `invoke` / `send_sync`, deliveries to local listeners, and local
//! listener removal. Request/response pairs are tied together by a token
//! that travels inside a correlated envelope and is stripped again before
//! any coordinator handler runs.
//!
//! ## Invariants
//!
//! | Invariant | Enforcement Location |
//! |-----------|---------------------|
//! | Every tokenized call records exactly one response | `bus.rs` - `track_response()` |
//! | A failed `invoke` records nothing | `bus.rs` - `invoke()` |
//! | Removal of an unknown listener emits nothing | `bus.rs` - `unsubscribe()` |
//! | Excluded channels are neither wrapped nor recorded | `bus.rs` - every primitive |
//! | Captured events never re-enter the tracked bus | `sink.rs` |

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod bus;
pub mod sink;

pub use bus::TrackedRequesterBus;
pub use sink::RequesterRelaySink;
