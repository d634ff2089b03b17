//! Relay error types.

use shared_types::{BusError, CodecError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RelayError {
    /// The privileged worker has not started yet.
    #[error("privileged worker is not ready")]
    NotReady,

    /// The reply listener was dropped before a snapshot arrived.
    #[error("privileged worker did not reply")]
    ReplyDropped,

    /// Retrying startup needs a Tokio runtime.
    #[error("no async runtime available to retry worker startup")]
    NoRuntime,

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Bus(#[from] BusError),
}
