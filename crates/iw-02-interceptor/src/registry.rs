//! # Listener Registration Bookkeeping
//!
//! Maps what the caller registered to what was actually installed on the
//! real bus, so a removal that supplies the caller's original handle can
//! find the wrapper.
//!
//! Subscriptions and responders live in separate namespaces. Subscriptions
//! are keyed by `(channel, original identity)` and keep a stack of
//! wrappers: registering the same listener twice needs two removals, as on
//! the real bus. Responders are keyed by channel alone since a channel has
//! at most one.

use parking_lot::Mutex;
use shared_bus::{Listener, ListenerKey};
use std::collections::{BTreeSet, HashMap, HashSet};

type SubscriptionKey = (String, ListenerKey);

#[derive(Default)]
pub struct ListenerRegistry {
    subscriptions: Mutex<HashMap<SubscriptionKey, Vec<Listener>>>,
    responders: Mutex<HashSet<String>>,
}

impl ListenerRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember that `wrapper` was installed for `original` on `channel`.
    pub fn push_listener(&self, channel: &str, original: ListenerKey, wrapper: Listener) {
        self.subscriptions
            .lock()
            .entry((channel.to_string(), original))
            .or_default()
            .push(wrapper);
    }

    /// Take the most recent wrapper installed for `original` on `channel`.
    pub fn pop_listener(&self, channel: &str, original: ListenerKey) -> Option<Listener> {
        let mut subscriptions = self.subscriptions.lock();
        let key = (channel.to_string(), original);
        let wrappers = subscriptions.get_mut(&key)?;
        let wrapper = wrappers.pop();
        if wrappers.is_empty() {
            subscriptions.remove(&key);
        }
        wrapper
    }

    /// Take one specific wrapper, if it is still registered.
    pub fn take_listener(&self, channel: &str, original: ListenerKey, wrapper: ListenerKey) -> Option<Listener> {
        let mut subscriptions = self.subscriptions.lock();
        let key = (channel.to_string(), original);
        let wrappers = subscriptions.get_mut(&key)?;
        let position = wrappers.iter().rposition(|w| w.key() == wrapper)?;
        let taken = wrappers.remove(position);
        if wrappers.is_empty() {
            subscriptions.remove(&key);
        }
        Some(taken)
    }

    /// Forget every subscription on `channel`. Returns how many there were.
    pub fn drain_channel(&self, channel: &str) -> usize {
        let mut removed = 0;
        self.subscriptions.lock().retain(|(ch, _), wrappers| {
            if ch == channel {
                removed += wrappers.len();
                false
            } else {
                true
            }
        });
        removed
    }

    /// Forget every subscription. Returns the channels that had any, sorted.
    pub fn drain_all(&self) -> Vec<String> {
        let channels: BTreeSet<String> = self
            .subscriptions
            .lock()
            .drain()
            .map(|((channel, _), _)| channel)
            .collect();
        channels.into_iter().collect()
    }

    /// Number of tracked subscriptions on `channel`.
    #[must_use]
    pub fn listener_registrations(&self, channel: &str) -> usize {
        self.subscriptions
            .lock()
            .iter()
            .filter(|((ch, _), _)| ch == channel)
            .map(|(_, wrappers)| wrappers.len())
            .sum()
    }

    pub fn add_responder(&self, channel: &str) {
        self.responders.lock().insert(channel.to_string());
    }

    /// Forget the responder on `channel`. Returns whether one was tracked.
    pub fn remove_responder(&self, channel: &str) -> bool {
        self.responders.lock().remove(channel)
    }

    #[must_use]
    pub fn has_responder(&self, channel: &str) -> bool {
        self.responders.lock().contains(channel)
    }

    /// Whether nothing at all is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subscriptions.lock().is_empty() && self.responders.lock().is_empty()
    }
}
