//! # Listeners & Responders
//!
//! Callable handles registered on a bus, and the per-channel table that
//! both bus flavours use to dispatch to them.
//!
//! Handles are reference-counted closures. Identity is the allocation, so a
//! clone of a `Listener` removes the registration made with the original.

use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use shared_types::{BusError, VersionId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Who sent a message being dispatched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SenderKind {
    /// A front-end context.
    Frame { frame_id: u32 },
    /// A worker context.
    Worker { scope: String, version_id: VersionId },
    /// The coordinating process itself.
    Coordinator,
}

impl SenderKind {
    #[must_use]
    pub fn is_worker(&self) -> bool {
        matches!(self, Self::Worker { .. })
    }
}

/// Dispatch metadata handed to listeners and responders.
#[derive(Debug)]
pub struct BusEvent {
    sender: SenderKind,
    return_value: Mutex<Option<Value>>,
}

impl BusEvent {
    #[must_use]
    pub fn new(sender: SenderKind) -> Self {
        Self {
            sender,
            return_value: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn sender(&self) -> &SenderKind {
        &self.sender
    }

    /// Reply to a synchronous call.
    pub fn set_return_value(&self, value: Value) {
        *self.return_value.lock() = Some(value);
    }

    /// The reply set by a listener, if any.
    #[must_use]
    pub fn take_return_value(&self) -> Option<Value> {
        self.return_value.lock().take()
    }
}

/// Identity of a registered callable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerKey(usize);

type ListenerFn = dyn Fn(&BusEvent, &[Value]) + Send + Sync;
type ResponderFn = dyn Fn(&BusEvent, &[Value]) -> Result<Value, BusError> + Send + Sync;

/// A fire-and-forget subscriber.
#[derive(Clone)]
pub struct Listener(Arc<ListenerFn>);

impl Listener {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&BusEvent, &[Value]) + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    #[must_use]
    pub fn key(&self) -> ListenerKey {
        ListenerKey(Arc::as_ptr(&self.0) as *const () as usize)
    }

    pub fn call(&self, event: &BusEvent, args: &[Value]) {
        (self.0)(event, args);
    }
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Listener").field(&self.key()).finish()
    }
}

/// A request/response responder.
#[derive(Clone)]
pub struct Handler(Arc<ResponderFn>);

impl Handler {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&BusEvent, &[Value]) -> Result<Value, BusError> + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    #[must_use]
    pub fn key(&self) -> ListenerKey {
        ListenerKey(Arc::as_ptr(&self.0) as *const () as usize)
    }

    pub fn call(&self, event: &BusEvent, args: &[Value]) -> Result<Value, BusError> {
        (self.0)(event, args)
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Handler").field(&self.key()).finish()
    }
}

#[derive(Clone)]
struct Entry {
    listener: Listener,
    once: bool,
}

/// Per-channel listener table with event-emitter semantics.
///
/// Listeners fire in registration order. Removal by reference drops the
/// most recent matching registration. No lock is held while a listener
/// runs, so listeners may register or remove others.
#[derive(Default)]
pub struct ListenerTable {
    channels: RwLock<HashMap<String, Vec<Entry>>>,
}

impl ListenerTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, channel: &str, listener: Listener) {
        self.push(channel, listener, false);
    }

    pub fn add_once(&self, channel: &str, listener: Listener) {
        self.push(channel, listener, true);
    }

    /// Remove one registration of `listener`. Returns whether one existed.
    pub fn remove(&self, channel: &str, listener: &Listener) -> bool {
        let key = listener.key();
        let mut channels = self.channels.write();
        let Some(entries) = channels.get_mut(channel) else {
            return false;
        };
        let Some(position) = entries.iter().rposition(|e| e.listener.key() == key) else {
            return false;
        };
        entries.remove(position);
        if entries.is_empty() {
            channels.remove(channel);
        }
        true
    }

    /// Remove every listener on `channel`, or on all channels. Returns how
    /// many were removed.
    pub fn remove_all(&self, channel: Option<&str>) -> usize {
        let mut channels = self.channels.write();
        match channel {
            Some(channel) => channels.remove(channel).map_or(0, |e| e.len()),
            None => channels.drain().map(|(_, e)| e.len()).sum(),
        }
    }

    #[must_use]
    pub fn count(&self, channel: &str) -> usize {
        self.channels.read().get(channel).map_or(0, Vec::len)
    }

    /// Deliver to every listener on `channel`. Returns whether any fired.
    pub fn emit(&self, channel: &str, event: &BusEvent, args: &[Value]) -> bool {
        let snapshot = {
            let mut channels = self.channels.write();
            let Some(entries) = channels.get_mut(channel) else {
                return false;
            };
            let snapshot = entries.clone();
            entries.retain(|e| !e.once);
            if entries.is_empty() {
                channels.remove(channel);
            }
            snapshot
        };

        for entry in &snapshot {
            entry.listener.call(event, args);
        }
        !snapshot.is_empty()
    }

    fn push(&self, channel: &str, listener: Listener, once: bool) {
        self.channels
            .write()
            .entry(channel.to_string())
            .or_default()
            .push(Entry { listener, once });
    }
}
