//! # Shared Types Crate
//!
//! This crate contains the captured IPC event model, the correlation
//! envelope codec and the relay/inspection protocol shared by every context
//! that takes part in instrumentation.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: Every type that crosses a context boundary
//!   is defined here.
//! - **Tagged Envelope**: A correlated call is a distinct `Payload` variant,
//!   decided at the serialization boundary. Plain argument lists are never
//!   reinterpreted.
//! - **Forward Only**: Producers hold an `EventSink`; they never own or
//!   mutate the log they feed.

pub mod entities;
pub mod envelope;
pub mod errors;
pub mod ipc;
pub mod sink;

pub use entities::*;
pub use envelope::{Payload, ENVELOPE_MARKER};
pub use errors::*;
pub use ipc::*;
pub use sink::{CollectingSink, EventSink};
