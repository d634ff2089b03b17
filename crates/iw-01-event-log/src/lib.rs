//! # Event Log Subsystem
//!
//! **Component:** Bounded Event Log + privileged-worker log service
//!
//! ## Purpose
//!
//! Stores every captured IPC event under a serial number, links the two
//! halves of each round trip through their correlation token, and serves
//! the window to the inspection surface.
//!
//! ## Domain Invariants
//!
//! | Invariant | Enforcement Location |
//! |-----------|---------------------|
//! | Serials strictly increasing, never reused (even across `clear`) | `domain/log.rs` - `take_serial()` |
//! | At most `capacity` events, oldest evicted first | `domain/log.rs` - `push()` |
//! | A link, once set, is never overwritten | `domain/log.rs` - `link()` |
//! | Pending tokens are independent of the event window | `domain/correlation.rs` |
//!
//! ## Ownership
//!
//! The log lives only in the privileged worker. Other contexts feed it
//! through relay messages and read snapshots; none of them mutate it.
//!
//! ```text
//! coordinator ──render-event──▶ EventLogService ──render_event──▶ panel
//!             ──get-ipc-events─▶       │
//!             ◀──ipc-events────────────┘
//! ```

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod domain;
pub mod ports;
pub mod service;
pub mod stream;

pub use domain::{BoundedEventLog, Correlation, CorrelationIndex, DEFAULT_LOG_CAPACITY};
pub use ports::EventLogApi;
pub use service::{EventLogService, PUSH_BUFFER};
pub use stream::EventStream;
