//! # Bounded Event Log
//!
//! Append-only window over captured events. Serial numbers come from a
//! counter that survives `clear`, so they stay unique for the lifetime of
//! the log. Events inside the window always have contiguous serials, which
//! turns a serial lookup into an offset from the front.

use super::correlation::{Correlation, CorrelationIndex};
use shared_types::{CorrelationToken, IndexedIpcEvent, IpcEvent, SerialNumber};
use std::collections::VecDeque;
use tracing::trace;

/// Default number of events kept before the oldest is evicted.
pub const DEFAULT_LOG_CAPACITY: usize = 20_000;

#[derive(Debug)]
pub struct BoundedEventLog {
    capacity: usize,
    events: VecDeque<IndexedIpcEvent>,
    correlations: CorrelationIndex,
    next_serial: SerialNumber,
}

impl BoundedEventLog {
    /// A log holding at most `capacity` events (at least one).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            events: VecDeque::with_capacity(capacity.min(1024)),
            correlations: CorrelationIndex::new(),
            next_serial: 0,
        }
    }

    /// Store `event` under the next serial number, evicting the oldest
    /// event when the window is full.
    pub fn append(&mut self, event: IpcEvent) -> SerialNumber {
        let serial = self.take_serial();
        self.push(IndexedIpcEvent::new(event, serial));
        serial
    }

    /// Link `serial` with the pending event carrying `token`, or leave it
    /// pending until its counterpart arrives.
    ///
    /// Links already set are never overwritten. The link is set on whichever
    /// end is still in the window.
    pub fn correlate(&mut self, token: CorrelationToken, serial: SerialNumber) {
        if let Correlation::Matched(counterpart) = self.correlations.offer(token, serial) {
            self.link(serial, counterpart);
            self.link(counterpart, serial);
            trace!(serial, counterpart, "Correlated events");
        }
    }

    /// Append `event` and correlate it if it carries a token. Returns the
    /// stored event.
    pub fn record(&mut self, event: IpcEvent) -> IndexedIpcEvent {
        let serial = self.take_serial();
        let mut indexed = IndexedIpcEvent::new(event, serial);
        if let Some(token) = indexed.event.correlation_token {
            if let Correlation::Matched(counterpart) = self.correlations.offer(token, serial) {
                indexed.linked_serial_number = Some(counterpart);
                self.link(counterpart, serial);
                trace!(serial, counterpart, "Correlated events");
            }
        }
        self.push(indexed.clone());
        indexed
    }

    /// The current window, oldest first.
    #[must_use]
    pub fn get_all(&self) -> Vec<IndexedIpcEvent> {
        self.events.iter().cloned().collect()
    }

    #[must_use]
    pub fn get(&self, serial: SerialNumber) -> Option<&IndexedIpcEvent> {
        let index = self.position(serial)?;
        self.events.get(index)
    }

    /// Drop every event and pending token. Serial numbers keep counting.
    pub fn clear(&mut self) {
        self.events.clear();
        self.correlations.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub fn pending_correlations(&self) -> usize {
        self.correlations.len()
    }

    /// Serial number the next appended event will get.
    #[must_use]
    pub fn next_serial(&self) -> SerialNumber {
        self.next_serial
    }

    fn take_serial(&mut self) -> SerialNumber {
        let serial = self.next_serial;
        self.next_serial += 1;
        serial
    }

    fn push(&mut self, indexed: IndexedIpcEvent) {
        self.events.push_back(indexed);
        while self.events.len() > self.capacity {
            if let Some(evicted) = self.events.pop_front() {
                trace!(serial = evicted.serial_number, "Evicted event");
            }
        }
    }

    fn position(&self, serial: SerialNumber) -> Option<usize> {
        let front = self.events.front()?.serial_number;
        let offset = serial.checked_sub(front)?;
        usize::try_from(offset).ok()
    }

    fn link(&mut self, serial: SerialNumber, counterpart: SerialNumber) {
        let Some(index) = self.position(serial) else {
            return;
        };
        if let Some(stored) = self.events.get_mut(index) {
            if stored.linked_serial_number.is_none() {
                stored.linked_serial_number = Some(counterpart);
            }
        }
    }
}

impl Default for BoundedEventLog {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_CAPACITY)
    }
}
