//! # Shared Bus - Host Capability Interfaces
//!
//! The engine never talks to a concrete host. Everything it instruments or
//! relies on is reached through the traits in this crate:
//!
//! | Trait | Role |
//! |-------|------|
//! | `CoordinatorBus` | registration surface of the coordinating process |
//! | `RequesterBus` | front-end context's side of the bus |
//! | `Session` | one isolated context (preloads, extensions, transport) |
//! | `WorkerRegistry` / `ServiceWorker` | worker contexts of a session |
//! | `HostApp` | readiness, default context, new-context notifications |
//!
//! ## Dispatch Model
//!
//! ```text
//!  front-end ──send/invoke/sync──▶ Session ──transport signal──▶ tap
//!                                     │
//!                                     └──dispatch──▶ CoordinatorBus listeners
//! ```
//!
//! The `InMemory*` implementations host all of this in one process and are
//! what the tests and the demo binary run against.

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod coordinator;
pub mod host;
pub mod listener;
pub mod requester;
pub mod session;
pub mod transport;
pub mod worker;

pub use coordinator::{CoordinatorBus, InMemoryCoordinatorBus};
pub use host::{HostApp, InMemoryHost, SessionListener};
pub use listener::{BusEvent, Handler, Listener, ListenerKey, ListenerTable, SenderKind};
pub use requester::{InMemoryRequesterBus, RequesterBus};
pub use session::{Extension, InMemorySession, PreloadKind, PreloadScript, Session};
pub use transport::{TransportEvent, TransportHub, TransportListener, TransportSignal};
pub use worker::{
    InMemoryServiceWorker, InMemoryWorkerRegistry, RegistrationDetails, RegistrationListener,
    RunningStatus, RunningStatusDetails, RunningStatusListener, RunningWorkerInfo, SendObserver, ServiceWorker,
    SubscriptionId, WorkerMessage, WorkerPort, WorkerRegistry, WorkerScript,
};
