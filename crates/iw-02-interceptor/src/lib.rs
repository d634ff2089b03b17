//! # Primitive Interception Layer
//!
//! **Component:** decorator over the coordinator bus
//!
//! ## Purpose
//!
//! Sits between application code and the real coordinator bus. Handlers
//! are wrapped so they never observe a correlation envelope, and every
//! de-registration that actually removes something is reported to the
//! `EventSink` exactly once.
//!
//! ## Invariants
//!
//! | Invariant | Enforcement Location |
//! |-----------|---------------------|
//! | Handlers never see an envelope | `bus.rs` - `unwrapping()` |
//! | Removal of an unknown handler emits nothing | `bus.rs` - `unsubscribe()` |
//! | `once` / `handle_once` report their removal exactly once | `bus.rs` - fired flags |
//! | Excluded channels are untouched | `bus.rs` - every primitive |
//! | Removal by original handle finds the installed wrapper | `registry.rs` |

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod bus;
pub mod registry;

pub use bus::InterceptedBus;
pub use registry::ListenerRegistry;
