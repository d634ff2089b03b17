//! # ipcwatch Telemetry
//!
//! Structured logging for every ipcwatch crate.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use iw_telemetry::{init_telemetry, LogLevel, TelemetryConfig};
//!
//! let guard = init_telemetry(&TelemetryConfig::from_env())?;
//! guard.level_handle().set_level(LogLevel::quiet())?;
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `IPCWATCH_LOG_LEVEL` | `info` | Log level filter (falls back to `RUST_LOG`) |
//! | `IPCWATCH_CONSOLE_OUTPUT` | `true` | Write log lines to the console |
//! | `IPCWATCH_JSON_LOGS` | `false` | One JSON object per log line |
//!
//! The minimum severity can be changed after startup through a
//! `LogLevelHandle`; the filter sits behind a `reload` layer.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod config;
mod level;

pub use config::TelemetryConfig;
pub use level::LogLevel;

use std::sync::OnceLock;
use thiserror::Error;
use tracing_subscriber::{fmt, layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter, Registry};

/// Telemetry errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("A global subscriber is already installed")]
    AlreadyInitialized,

    #[error("Telemetry has not been initialized")]
    NotInitialized,

    #[error("Invalid log level: {0}")]
    InvalidLogLevel(String),

    #[error("Invalid filter directive: {0}")]
    Filter(String),

    #[error("Failed to reload log filter: {0}")]
    Reload(String),
}

static GLOBAL_HANDLE: OnceLock<LogLevelHandle> = OnceLock::new();

/// Changes the minimum severity of the installed subscriber.
#[derive(Clone)]
pub struct LogLevelHandle {
    inner: reload::Handle<EnvFilter, Registry>,
}

impl LogLevelHandle {
    /// Replace the active filter with `level`.
    pub fn set_level(&self, level: LogLevel) -> Result<(), TelemetryError> {
        self.inner
            .reload(EnvFilter::new(level.as_str()))
            .map_err(|e| TelemetryError::Reload(e.to_string()))?;
        tracing::debug!(level = %level, "Log level changed");
        Ok(())
    }

    /// The active filter, rendered as directives.
    #[must_use]
    pub fn current(&self) -> Option<String> {
        self.inner.with_current(ToString::to_string).ok()
    }
}

/// Install the global subscriber.
///
/// Returns a guard that must be held for the lifetime of the application.
///
/// # Errors
///
/// `TelemetryError::Filter` for an unparsable `log_level`, and
/// `TelemetryError::AlreadyInitialized` when another subscriber is already
/// installed. The latter is not fatal: logging keeps going to that one.
pub fn init_telemetry(config: &TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    let filter =
        EnvFilter::try_new(&config.log_level).map_err(|e| TelemetryError::Filter(e.to_string()))?;
    let (filter, handle) = reload::Layer::new(filter);

    let json_layer = (config.console_output && config.json_logs).then(|| {
        fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
    });
    let pretty_layer = (config.console_output && !config.json_logs).then(|| {
        fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .with_ansi(true)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(pretty_layer)
        .try_init()
        .map_err(|_| TelemetryError::AlreadyInitialized)?;

    let handle = LogLevelHandle { inner: handle };
    let _ = GLOBAL_HANDLE.set(handle.clone());

    tracing::info!(
        service = %config.service_name,
        level = %config.log_level,
        json = config.json_logs,
        "Telemetry initialized"
    );

    Ok(TelemetryGuard { handle })
}

/// Change the severity of the subscriber installed by `init_telemetry`.
///
/// # Errors
///
/// `TelemetryError::NotInitialized` if `init_telemetry` never succeeded.
pub fn set_global_level(level: LogLevel) -> Result<(), TelemetryError> {
    GLOBAL_HANDLE
        .get()
        .ok_or(TelemetryError::NotInitialized)?
        .set_level(level)
}

/// Guard that keeps telemetry active.
pub struct TelemetryGuard {
    handle: LogLevelHandle,
}

impl TelemetryGuard {
    #[must_use]
    pub fn level_handle(&self) -> LogLevelHandle {
        self.handle.clone()
    }
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        tracing::info!("Shutting down telemetry...");
    }
}
