//! # Captured Event Model
//!
//! Defines the events recorded for every observed IPC call and their
//! indexed form as stored by the privileged worker's log.
//!
//! ## Clusters
//!
//! - **Identity**: `CorrelationToken`, `SerialNumber`, `ContextId`, `VersionId`
//! - **Classification**: `Direction`, `Method`, `WorkerDetails`
//! - **Events**: `IpcEvent`, `IndexedIpcEvent`

use crate::envelope::Payload;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

// =============================================================================
// IDENTITY
// =============================================================================

/// Monotonic identity assigned to an event when it is appended to a log.
pub type SerialNumber = u64;

/// Version identifier of a running worker context.
pub type VersionId = u64;

/// Opaque identifier linking a request-class event to its response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationToken(Uuid);

impl CorrelationToken {
    /// Generate a fresh random token.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CorrelationToken {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CorrelationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of an isolated context (the default context or a partition).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContextId(String);

impl ContextId {
    /// Name of the default context.
    pub const DEFAULT: &'static str = "default";

    /// The default context.
    #[must_use]
    pub fn default_context() -> Self {
        Self(Self::DEFAULT.to_string())
    }

    /// A partition-scoped context.
    #[must_use]
    pub fn partition(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The context name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this is the default context.
    #[must_use]
    pub fn is_default(&self) -> bool {
        self.0 == Self::DEFAULT
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// CLASSIFICATION
// =============================================================================

/// Which way an observed call travelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Direction {
    /// Front-end context to the coordinating process.
    RequesterToCoordinator,
    /// Coordinating process to a front-end context.
    CoordinatorToRequester,
    /// Worker context to the coordinating process.
    WorkerToCoordinator,
    /// Coordinating process to a worker context.
    CoordinatorToWorker,
    /// Bookkeeping inside a front-end context (listener removal).
    #[serde(rename = "requester")]
    RequesterLocal,
    /// Bookkeeping inside the coordinating process (listener removal).
    #[serde(rename = "coordinator")]
    CoordinatorLocal,
}

/// The primitive that produced an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Method {
    On,
    Off,
    RemoveListener,
    RemoveAllListeners,
    RemoveHandler,
    InvokeResponse,
    SendSyncResponse,
}

impl Method {
    /// Stable wire name of the primitive.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::On => "on",
            Self::Off => "off",
            Self::RemoveListener => "remove_listener",
            Self::RemoveAllListeners => "remove_all_listeners",
            Self::RemoveHandler => "remove_handler",
            Self::InvokeResponse => "invoke_response",
            Self::SendSyncResponse => "send_sync_response",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of the worker on the other end of coordinator/worker traffic.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkerDetails {
    /// Running version of the worker.
    pub version_id: VersionId,
    /// Scope the worker is registered under.
    pub scope: String,
}

// =============================================================================
// EVENTS
// =============================================================================

/// One observed call or call-lifecycle action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IpcEvent {
    pub direction: Direction,
    pub channel: String,
    pub args: Vec<Value>,
    /// Capture time in milliseconds since the Unix epoch.
    pub timestamp: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<Method>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_token: Option<CorrelationToken>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_time_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker_details: Option<WorkerDetails>,
}

impl IpcEvent {
    /// Record traffic as it was seen on the wire.
    ///
    /// A correlated envelope is peeled here: the token moves to
    /// `correlation_token` and `args` holds the caller's real arguments.
    #[must_use]
    pub fn capture(direction: Direction, channel: impl Into<String>, args: Vec<Value>) -> Self {
        let (correlation_token, args) = Payload::decode(args).into_parts();
        Self {
            direction,
            channel: channel.into(),
            args,
            timestamp: current_timestamp_ms(),
            method: None,
            correlation_token,
            response_time_ms: None,
            worker_details: None,
        }
    }

    /// Record a bookkeeping action (listener or responder removal).
    #[must_use]
    pub fn lifecycle(direction: Direction, channel: impl Into<String>, method: Method) -> Self {
        Self {
            direction,
            channel: channel.into(),
            args: Vec::new(),
            timestamp: current_timestamp_ms(),
            method: Some(method),
            correlation_token: None,
            response_time_ms: None,
            worker_details: None,
        }
    }

    #[must_use]
    pub fn with_method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    #[must_use]
    pub fn with_token(mut self, token: CorrelationToken) -> Self {
        self.correlation_token = Some(token);
        self
    }

    #[must_use]
    pub fn with_response_time(mut self, millis: u64) -> Self {
        self.response_time_ms = Some(millis);
        self
    }

    #[must_use]
    pub fn with_worker(mut self, details: WorkerDetails) -> Self {
        self.worker_details = Some(details);
        self
    }
}

/// An `IpcEvent` as stored in a log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedIpcEvent {
    #[serde(flatten)]
    pub event: IpcEvent,
    pub serial_number: SerialNumber,
    /// Serial number of the correlated counterpart, set on both ends.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linked_serial_number: Option<SerialNumber>,
}

impl IndexedIpcEvent {
    #[must_use]
    pub fn new(event: IpcEvent, serial_number: SerialNumber) -> Self {
        Self {
            event,
            serial_number,
            linked_serial_number: None,
        }
    }
}

/// Current wall-clock time in milliseconds since the Unix epoch.
#[must_use]
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
