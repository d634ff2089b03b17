//! Pending correlation tokens.
//!
//! Independent of the stored-event window: evicting an event never drops
//! its pending token, and a late counterpart still gets linked.

use shared_types::{CorrelationToken, SerialNumber};
use std::collections::HashMap;

/// Outcome of offering a token to the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Correlation {
    /// First sighting; the serial is now pending.
    Pending,
    /// A counterpart was pending and has been consumed.
    Matched(SerialNumber),
}

#[derive(Debug, Default)]
pub struct CorrelationIndex {
    pending: HashMap<CorrelationToken, SerialNumber>,
}

impl CorrelationIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Match `serial` against a pending entry for `token`, or leave it
    /// pending.
    pub fn offer(&mut self, token: CorrelationToken, serial: SerialNumber) -> Correlation {
        match self.pending.remove(&token) {
            Some(counterpart) => Correlation::Matched(counterpart),
            None => {
                self.pending.insert(token, serial);
                Correlation::Pending
            }
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }
}
