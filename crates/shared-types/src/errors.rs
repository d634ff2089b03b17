//! # Error Types
//!
//! Defines error types shared across contexts.

use thiserror::Error;

/// Failures reported by the host message bus and its contexts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BusError {
    /// A responder is already registered for the channel.
    #[error("A responder is already registered for channel '{0}'")]
    ResponderAlreadyRegistered(String),

    /// No responder is registered for the channel.
    #[error("No responder registered for channel '{0}'")]
    NoResponder(String),

    /// The responder itself failed.
    #[error("Responder for channel '{channel}' failed: {message}")]
    ResponderFailed { channel: String, message: String },

    /// Worker startup failed because its scope is not registered yet.
    #[error("Worker scope not registered: {0}")]
    ScopeNotRegistered(String),

    /// The worker is not known to the registry.
    #[error("Unknown worker version: {0}")]
    UnknownWorker(u64),

    /// The context bundle could not be loaded.
    #[error("Failed to load bundle from {path}: {reason}")]
    LoadFailed { path: String, reason: String },
}

/// Failures converting protocol messages at a context boundary.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The message body did not match the expected shape.
    #[error("Malformed {kind} message: {source}")]
    Malformed {
        kind: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// The message carried the wrong number of arguments.
    #[error("Expected {expected} argument(s) for {kind}, got {actual}")]
    Arity {
        kind: &'static str,
        expected: usize,
        actual: usize,
    },
}
