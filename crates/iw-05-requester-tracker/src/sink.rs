//! # Requester Relay Sink
//!
//! A front-end context cannot reach the privileged worker directly. Its
//! captured events travel to the coordinating process as `render-event`
//! messages on the undecorated requester bus, where the transport tap of
//! the frame's own context hands them to that context's relay.

use shared_bus::RequesterBus;
use shared_types::{EventSink, IpcEvent, RelayMessage};
use std::sync::Arc;
use tracing::warn;

pub struct RequesterRelaySink {
    bus: Arc<dyn RequesterBus>,
}

impl RequesterRelaySink {
    /// `bus` must be the raw bus, not a `TrackedRequesterBus`.
    #[must_use]
    pub fn new(bus: Arc<dyn RequesterBus>) -> Self {
        Self { bus }
    }
}

impl EventSink for RequesterRelaySink {
    fn track(&self, event: IpcEvent) {
        match RelayMessage::RenderEvent(event).into_wire() {
            Ok((channel, args)) => self.bus.send(channel, args),
            Err(e) => warn!(error = %e, "Dropping requester event that failed to encode"),
        }
    }
}
