//! # Coordinator Bus
//!
//! The registration surface the coordinating process exposes to
//! application code, and the in-memory implementation used to host it.

use crate::listener::{BusEvent, Handler, Listener, ListenerTable};
use parking_lot::RwLock;
use serde_json::Value;
use shared_types::BusError;
use std::collections::HashMap;
use tracing::debug;

/// Registration primitives of the coordinating process's bus.
///
/// Removing something that was never registered is not an error.
pub trait CoordinatorBus: Send + Sync {
    /// Subscribe to every message on `channel`.
    fn on(&self, channel: &str, listener: Listener);

    /// Subscribe to the next message on `channel` only.
    fn once(&self, channel: &str, listener: Listener);

    /// Unsubscribe `listener` (alias of `remove_listener`).
    fn off(&self, channel: &str, listener: &Listener);

    /// Unsubscribe `listener`.
    fn remove_listener(&self, channel: &str, listener: &Listener);

    /// Unsubscribe everything on `channel`, or on every channel.
    fn remove_all_listeners(&self, channel: Option<&str>);

    /// Register the responder for request/response calls on `channel`.
    ///
    /// # Errors
    ///
    /// `BusError::ResponderAlreadyRegistered` if `channel` has one.
    fn handle(&self, channel: &str, handler: Handler) -> Result<(), BusError>;

    /// Register a responder that answers a single call.
    ///
    /// # Errors
    ///
    /// `BusError::ResponderAlreadyRegistered` if `channel` has one.
    fn handle_once(&self, channel: &str, handler: Handler) -> Result<(), BusError>;

    /// Remove the responder for `channel`.
    fn remove_handler(&self, channel: &str);

    /// Number of subscribers on `channel`.
    fn listener_count(&self, channel: &str) -> usize;

    /// Whether `channel` has a responder.
    fn has_handler(&self, channel: &str) -> bool;
}

#[derive(Clone)]
struct Responder {
    handler: Handler,
    once: bool,
}

/// In-process coordinator bus.
///
/// Besides the registration primitives it exposes `emit` and `invoke`,
/// which the hosting context uses to deliver inbound traffic.
#[derive(Default)]
pub struct InMemoryCoordinatorBus {
    listeners: ListenerTable,
    responders: RwLock<HashMap<String, Responder>>,
}

impl InMemoryCoordinatorBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver a fire-and-forget or synchronous message to subscribers.
    pub fn emit(&self, channel: &str, event: &BusEvent, args: &[Value]) -> bool {
        let delivered = self.listeners.emit(channel, event, args);
        if !delivered {
            debug!(channel = %channel, "No subscribers for message");
        }
        delivered
    }

    /// Deliver a request/response call to the channel's responder.
    ///
    /// # Errors
    ///
    /// `BusError::NoResponder` if nothing answers on `channel`, or whatever
    /// the responder returns.
    pub fn invoke(&self, channel: &str, event: &BusEvent, args: &[Value]) -> Result<Value, BusError> {
        let responder = {
            let mut responders = self.responders.write();
            let Some(responder) = responders.get(channel).cloned() else {
                return Err(BusError::NoResponder(channel.to_string()));
            };
            if responder.once {
                responders.remove(channel);
            }
            responder
        };
        responder.handler.call(event, args)
    }

    fn register(&self, channel: &str, handler: Handler, once: bool) -> Result<(), BusError> {
        let mut responders = self.responders.write();
        if responders.contains_key(channel) {
            return Err(BusError::ResponderAlreadyRegistered(channel.to_string()));
        }
        responders.insert(channel.to_string(), Responder { handler, once });
        Ok(())
    }
}

impl CoordinatorBus for InMemoryCoordinatorBus {
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

    fn handle(&self, channel: &str, handler: Handler) -> Result<(), BusError> {
        self.register(channel, handler, false)
    }

    fn handle_once(&self, channel: &str, handler: Handler) -> Result<(), BusError> {
        self.register(channel, handler, true)
    }

    fn remove_handler(&self, channel: &str) {
        self.responders.write().remove(channel);
    }

    fn listener_count(&self, channel: &str) -> usize {
        self.listeners.count(channel)
    }

    fn has_handler(&self, channel: &str) -> bool {
        self.responders.read().contains_key(channel)
    }
}
