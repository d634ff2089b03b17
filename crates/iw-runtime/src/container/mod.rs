//! Installation configuration and state.

pub mod config;
pub mod state;

pub use config::InstallOptions;
pub use state::InstallationState;
