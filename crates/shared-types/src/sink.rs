//! # Event Sink Port
//!
//! The single outbound dependency of every producer of captured events.
//! Producers forward and forget: an `EventSink` never hands events back.

use crate::entities::IpcEvent;
use parking_lot::Mutex;

/// Destination for captured events.
///
/// Implementations must not call back into the bus synchronously with the
/// same channel; they run inside bus dispatch.
pub trait EventSink: Send + Sync {
    /// Forward one captured event.
    fn track(&self, event: IpcEvent);
}

/// In-memory sink that keeps every event it receives.
///
/// Used where no privileged worker exists (tests, requester contexts
/// without a relay).
#[derive(Debug, Default)]
pub struct CollectingSink {
    events: Mutex<Vec<IpcEvent>>,
}

impl CollectingSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the events received so far.
    #[must_use]
    pub fn events(&self) -> Vec<IpcEvent> {
        self.events.lock().clone()
    }

    /// Remove and return the events received so far.
    pub fn drain(&self) -> Vec<IpcEvent> {
        std::mem::take(&mut *self.events.lock())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

impl EventSink for CollectingSink {
    fn track(&self, event: IpcEvent) {
        self.events.lock().push(event);
    }
}
