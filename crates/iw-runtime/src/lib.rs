//! # ipcwatch Runtime
//!
//! Installs the instrumentation engine into a host process.
//!
//! ## Modular Structure
//!
//! - `container/` - install options and installation state
//! - `wiring/` - per-context installation and relay routing
//! - `watch` - the `IpcWatch` entry points
//!
//! ## Flow
//!
//! ```text
//! app code ──▶ InterceptedBus ──▶ real coordinator bus
//!                   │                    ▲
//!                   │ removals           │ inbound traffic and
//!                   ▼                    │ requester reports
//!              ActiveRelay        TransportTap (per context)
//!            (primary context)           │
//!                   └──────▶ EventRelay ◀┘ ◀── worker send observer
//!                                │
//!                                ▼ render-event
//!                     privileged worker: EventLogService
//! ```
//!
//! ## Guarantees
//!
//! | Guarantee | Enforcement Location |
//! |-----------|---------------------|
//! | Interception installed once per process | `container/state.rs` |
//! | Each context installed once | `container/state.rs` |
//! | Ready hosts are installed immediately | `watch.rs` - `install()` |
//! | Failures never reach application code | `watch.rs` - logged at the boundary |
//! | Both halves of a round trip share a log | `iw-03-transport-tap` - per-context `render-event` |

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod container;
pub mod error;
pub mod watch;
pub mod wiring;

pub use container::{InstallOptions, InstallationState};
pub use error::InstallError;
pub use watch::IpcWatch;
pub use wiring::{ActiveRelay, ContextInstallation};
