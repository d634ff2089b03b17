//! Event routing and per-context wiring.

pub mod context;
pub mod routing;

pub use context::ContextInstallation;
pub use routing::ActiveRelay;
