//! # Transport Signals
//!
//! Low-level notifications a context emits for every inbound message,
//! before and independently of dispatch to registered listeners.

use crate::listener::SenderKind;
use parking_lot::RwLock;
use serde_json::Value;
use std::sync::Arc;

/// The kind of inbound call that produced a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportSignal {
    /// Fire-and-forget send.
    Message,
    /// Request/response invoke.
    Invoke,
    /// Synchronous blocking call.
    MessageSync,
}

/// One inbound message as seen by the transport.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportEvent {
    pub signal: TransportSignal,
    pub sender: SenderKind,
    pub channel: String,
    /// Arguments exactly as sent, envelope included.
    pub args: Vec<Value>,
}

pub type TransportListener = Arc<dyn Fn(&TransportEvent) + Send + Sync>;

/// Fan-out point for transport signals within one context.
#[derive(Default)]
pub struct TransportHub {
    listeners: RwLock<Vec<TransportListener>>,
}

impl TransportHub {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, listener: TransportListener) {
        self.listeners.write().push(listener);
    }

    pub fn publish(&self, event: &TransportEvent) {
        let listeners = self.listeners.read().clone();
        for listener in &listeners {
            listener(event);
        }
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.listeners.read().len()
    }
}
