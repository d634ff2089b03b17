//! Installation errors.
//!
//! None of these reach the caller of `install`: they are logged where the
//! install step fails and the context is left with reduced observability.

use iw_04_relay::RelayError;
use shared_types::{BusError, ContextId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum InstallError {
    #[error("Failed to load the privileged worker bundle into context '{context}': {source}")]
    ExtensionLoad {
        context: ContextId,
        #[source]
        source: BusError,
    },

    #[error("Privileged worker startup failed: {0}")]
    Launch(#[from] RelayError),
}
