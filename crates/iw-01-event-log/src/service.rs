//! # Event Log Service
//!
//! Runs inside the privileged worker. Owns the canonical `BoundedEventLog`
//! and answers two protocols:
//!
//! - the relay from the coordinating process (`RelayMessage`), delivered as
//!   worker messages
//! - the inspection surface (`PanelRequest` / `PanelMessage`), with a push
//!   of every appended event

use crate::domain::BoundedEventLog;
use crate::ports::EventLogApi;
use crate::stream::EventStream;
use parking_lot::Mutex;
use serde_json::Value;
use shared_bus::{WorkerPort, WorkerScript};
use shared_types::{IndexedIpcEvent, IpcEvent, PanelMessage, PanelRequest, RelayMessage};
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Pushed messages buffered per panel subscriber.
pub const PUSH_BUFFER: usize = 1024;

pub struct EventLogService {
    log: Mutex<BoundedEventLog>,
    push: broadcast::Sender<PanelMessage>,
}

impl EventLogService {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (push, _) = broadcast::channel(PUSH_BUFFER);
        Self {
            log: Mutex::new(BoundedEventLog::new(capacity)),
            push,
        }
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.log.lock().capacity()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.log.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.log.lock().is_empty()
    }

    /// Apply one relay message. Replies go out through `port`.
    pub fn handle_relay(&self, message: RelayMessage, port: &dyn WorkerPort) {
        match message {
            RelayMessage::RenderEvent(event) => {
                self.record(event);
            }
            RelayMessage::GetIpcEvents => {
                let reply = RelayMessage::IpcEvents(self.get_all());
                match reply.into_wire() {
                    Ok((channel, args)) => port.post(channel, args),
                    Err(e) => warn!(error = %e, "Failed to encode event snapshot"),
                }
            }
            RelayMessage::ClearEvents => self.clear(),
            RelayMessage::IpcEvents(_) => {
                debug!("Ignoring snapshot sent to the log owner");
            }
        }
    }

    fn publish(&self, message: PanelMessage) {
        // No subscribers is fine: nothing is listening yet.
        let _ = self.push.send(message);
    }
}

impl Default for EventLogService {
    fn default() -> Self {
        Self::new(crate::domain::DEFAULT_LOG_CAPACITY)
    }
}

impl EventLogApi for EventLogService {
    fn record(&self, event: IpcEvent) -> IndexedIpcEvent {
        let indexed = self.log.lock().record(event);
        debug!(
            serial = indexed.serial_number,
            channel = %indexed.event.channel,
            "Recorded event"
        );
        self.publish(PanelMessage::RenderEvent {
            event: indexed.clone(),
        });
        indexed
    }

    fn get_all(&self) -> Vec<IndexedIpcEvent> {
        self.log.lock().get_all()
    }

    fn clear(&self) {
        self.log.lock().clear();
        debug!("Event log cleared");
        self.publish(PanelMessage::EventsCleared);
    }

    fn handle_panel_request(&self, request: PanelRequest) -> PanelMessage {
        match request {
            PanelRequest::GetAllEvents => PanelMessage::AllEvents {
                events: self.get_all(),
            },
            PanelRequest::ClearEvents => {
                self.clear();
                PanelMessage::EventsCleared
            }
            PanelRequest::Ping => PanelMessage::Pong,
        }
    }

    fn subscribe(&self) -> EventStream {
        EventStream::new(self.push.subscribe())
    }
}

impl WorkerScript for EventLogService {
    fn on_message(&self, channel: &str, args: &[Value], port: &dyn WorkerPort) {
        match RelayMessage::from_wire(channel, args) {
            Ok(Some(message)) => self.handle_relay(message, port),
            Ok(None) => debug!(channel = %channel, "Ignoring non-relay message"),
            Err(e) => warn!(channel = %channel, error = %e, "Dropping malformed relay message"),
        }
    }
}
