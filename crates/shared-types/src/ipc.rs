//! # Relay & Inspection Protocols
//!
//! Messages exchanged between the coordinating process and the privileged
//! worker that owns the canonical log, and between that worker and the
//! inspection surface.
//!
//! ## Relay Channels (coordinator ↔ privileged worker)
//!
//! | Channel | Direction | Body |
//! |---------|-----------|------|
//! | `RENDER_EVENT_CHANNEL` | coordinator → worker | one `IpcEvent` |
//! | `GET_IPC_EVENTS_CHANNEL` | coordinator → worker | none |
//! | `IPC_EVENTS_CHANNEL` | worker → coordinator | `Vec<IndexedIpcEvent>` |
//! | `CLEAR_EVENTS_CHANNEL` | coordinator → worker | none |
//!
//! Relay channels are always excluded from tracking so the engine never
//! records its own traffic.

use crate::entities::{IndexedIpcEvent, IpcEvent};
use crate::errors::CodecError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;

pub const RENDER_EVENT_CHANNEL: &str = "ipcwatch:render-event";
pub const GET_IPC_EVENTS_CHANNEL: &str = "ipcwatch:get-ipc-events";
pub const IPC_EVENTS_CHANNEL: &str = "ipcwatch:ipc-events";
pub const CLEAR_EVENTS_CHANNEL: &str = "ipcwatch:clear-events";

/// Every channel the engine itself uses.
pub const RELAY_CHANNELS: [&str; 4] = [
    RENDER_EVENT_CHANNEL,
    GET_IPC_EVENTS_CHANNEL,
    IPC_EVENTS_CHANNEL,
    CLEAR_EVENTS_CHANNEL,
];

/// Preload script id for worker contexts.
pub const WORKER_PRELOAD_ID: &str = "ipcwatch-worker-preload";

/// Preload script id for front-end contexts.
pub const REQUESTER_PRELOAD_ID: &str = "ipcwatch-requester-preload";

// =============================================================================
// RELAY PROTOCOL
// =============================================================================

/// A message on the coordinator ↔ privileged worker relay.
#[derive(Debug, Clone, PartialEq)]
pub enum RelayMessage {
    RenderEvent(IpcEvent),
    GetIpcEvents,
    IpcEvents(Vec<IndexedIpcEvent>),
    ClearEvents,
}

impl RelayMessage {
    #[must_use]
    pub fn channel(&self) -> &'static str {
        match self {
            Self::RenderEvent(_) => RENDER_EVENT_CHANNEL,
            Self::GetIpcEvents => GET_IPC_EVENTS_CHANNEL,
            Self::IpcEvents(_) => IPC_EVENTS_CHANNEL,
            Self::ClearEvents => CLEAR_EVENTS_CHANNEL,
        }
    }

    /// Encode as a `(channel, args)` pair for a bus send.
    pub fn into_wire(self) -> Result<(&'static str, Vec<Value>), CodecError> {
        let channel = self.channel();
        let args = match self {
            Self::RenderEvent(event) => vec![to_value("render-event", &event)?],
            Self::IpcEvents(events) => vec![to_value("ipc-events", &events)?],
            Self::GetIpcEvents | Self::ClearEvents => Vec::new(),
        };
        Ok((channel, args))
    }

    /// Decode a received `(channel, args)` pair.
    ///
    /// Returns `Ok(None)` when `channel` is not a relay channel.
    pub fn from_wire(channel: &str, args: &[Value]) -> Result<Option<Self>, CodecError> {
        let message = match channel {
            RENDER_EVENT_CHANNEL => Self::RenderEvent(single_arg("render-event", args)?),
            IPC_EVENTS_CHANNEL => Self::IpcEvents(single_arg("ipc-events", args)?),
            GET_IPC_EVENTS_CHANNEL => Self::GetIpcEvents,
            CLEAR_EVENTS_CHANNEL => Self::ClearEvents,
            _ => return Ok(None),
        };
        Ok(Some(message))
    }
}

fn to_value<T: Serialize>(kind: &'static str, body: &T) -> Result<Value, CodecError> {
    serde_json::to_value(body).map_err(|source| CodecError::Malformed { kind, source })
}

fn single_arg<T: for<'de> Deserialize<'de>>(
    kind: &'static str,
    args: &[Value],
) -> Result<T, CodecError> {
    let [body] = args else {
        return Err(CodecError::Arity {
            kind,
            expected: 1,
            actual: args.len(),
        });
    };
    serde_json::from_value(body.clone()).map_err(|source| CodecError::Malformed { kind, source })
}

// =============================================================================
// INSPECTION-SURFACE PROTOCOL
// =============================================================================

/// Requests the inspection surface sends to the privileged worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PanelRequest {
    GetAllEvents,
    ClearEvents,
    Ping,
}

/// Messages the privileged worker sends to the inspection surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PanelMessage {
    AllEvents { events: Vec<IndexedIpcEvent> },
    RenderEvent { event: IndexedIpcEvent },
    EventsCleared,
    Pong,
}

// =============================================================================
// EXCLUDED CHANNELS
// =============================================================================

/// Channels that are neither envelope-wrapped nor recorded.
///
/// The relay channels are always part of the set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExcludedChannels {
    channels: BTreeSet<String>,
}

impl ExcludedChannels {
    /// Only the engine's own relay channels.
    #[must_use]
    pub fn relay_only() -> Self {
        Self {
            channels: RELAY_CHANNELS.iter().map(|c| (*c).to_string()).collect(),
        }
    }

    /// Relay channels plus `extra`.
    #[must_use]
    pub fn with_channels<I, S>(extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut excluded = Self::relay_only();
        excluded.channels.extend(extra.into_iter().map(Into::into));
        excluded
    }

    #[must_use]
    pub fn contains(&self, channel: &str) -> bool {
        self.channels.contains(channel)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.channels.iter().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

impl Default for ExcludedChannels {
    fn default() -> Self {
        Self::relay_only()
    }
}
