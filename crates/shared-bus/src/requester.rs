//! # Requester Bus
//!
//! The bus surface a front-end context uses to talk to the coordinating
//! process, and its in-memory implementation bound to a session.

use crate::listener::{BusEvent, Listener, ListenerTable, SenderKind};
use crate::session::InMemorySession;
use async_trait::async_trait;
use serde_json::Value;
use shared_types::BusError;
use std::sync::Arc;

/// Front-end side of the bus.
#[async_trait]
pub trait RequesterBus: Send + Sync {
    /// Fire-and-forget message to the coordinator.
    fn send(&self, channel: &str, args: Vec<Value>);

    /// Request/response call to the coordinator's responder.
    ///
    /// # Errors
    ///
    /// `BusError::NoResponder` when nothing answers, or the responder's error.
    async fn invoke(&self, channel: &str, args: Vec<Value>) -> Result<Value, BusError>;

    /// Blocking call answered by a coordinator listener.
    fn send_sync(&self, channel: &str, args: Vec<Value>) -> Value;

    /// Subscribe to messages the coordinator sends to this context.
    fn on(&self, channel: &str, listener: Listener);

    fn once(&self, channel: &str, listener: Listener);

    fn off(&self, channel: &str, listener: &Listener);

    fn remove_listener(&self, channel: &str, listener: &Listener);

    fn remove_all_listeners(&self, channel: Option<&str>);

    fn listener_count(&self, channel: &str) -> usize;
}

/// In-process front-end context.
pub struct InMemoryRequesterBus {
    session: Arc<InMemorySession>,
    frame_id: u32,
    listeners: ListenerTable,
}

impl InMemoryRequesterBus {
    #[must_use]
    pub fn new(session: Arc<InMemorySession>, frame_id: u32) -> Self {
        Self {
            session,
            frame_id,
            listeners: ListenerTable::new(),
        }
    }

    #[must_use]
    pub fn frame_id(&self) -> u32 {
        self.frame_id
    }

    /// Deliver a message from the coordinator to this context.
    pub fn emit(&self, channel: &str, args: &[Value]) -> bool {
        self.listeners
            .emit(channel, &BusEvent::new(SenderKind::Coordinator), args)
    }

    fn sender(&self) -> SenderKind {
        SenderKind::Frame {
            frame_id: self.frame_id,
        }
    }
}

#[async_trait]
impl RequesterBus for InMemoryRequesterBus {
    fn send(&self, channel: &str, args: Vec<Value>) {
        self.session.deliver_message(self.sender(), channel, args);
    }

    async fn invoke(&self, channel: &str, args: Vec<Value>) -> Result<Value, BusError> {
        self.session.deliver_invoke(self.sender(), channel, args)
    }

    fn send_sync(&self, channel: &str, args: Vec<Value>) -> Value {
        self.session.deliver_sync(self.sender(), channel, args)
    }

    fn on(&self, channel: &str, listener: Listener) {
        self.listeners.add(channel, listener);
    }

    fn once(&self, channel: &str, listener: Listener) {
        self.listeners.add_once(channel, listener);
    }

    fn off(&self, channel: &str, listener: &Listener) {
        self.listeners.remove(channel, listener);
    }

    fn remove_listener(&self, channel: &str, listener: &Listener) {
        self.listeners.remove(channel, listener);
    }

    fn remove_all_listeners(&self, channel: Option<&str>) {
        self.listeners.remove_all(channel);
    }

    fn listener_count(&self, channel: &str) -> usize {
        self.listeners.count(channel)
    }
}
