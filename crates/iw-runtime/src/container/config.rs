//! # Install Options
//!
//! Everything `IpcWatch::install` can be told. All fields have defaults.

use iw_01_event_log::DEFAULT_LOG_CAPACITY;
use shared_types::ExcludedChannels;
use std::env;
use std::path::PathBuf;

/// Options accepted by `IpcWatch::install`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallOptions {
    /// Minimum log severity. Invalid names are logged and ignored.
    pub log_level: Option<String>,
    /// Channels neither envelope-wrapped nor recorded, in addition to the
    /// engine's own relay channels.
    pub ignore_channels: Vec<String>,
    /// Directory of the privileged worker bundle. Its name becomes the
    /// worker's scope.
    pub extension_dir: PathBuf,
    /// Preload injected into worker contexts.
    pub worker_preload: PathBuf,
    /// Preload injected into front-end contexts.
    pub requester_preload: PathBuf,
    /// Capacity of the privileged worker's log.
    pub log_capacity: usize,
}

impl Default for InstallOptions {
    fn default() -> Self {
        Self {
            log_level: None,
            ignore_channels: Vec::new(),
            extension_dir: PathBuf::from("dist/ipcwatch"),
            worker_preload: PathBuf::from("dist/worker-preload.js"),
            requester_preload: PathBuf::from("dist/requester-preload.js"),
            log_capacity: DEFAULT_LOG_CAPACITY,
        }
    }
}

impl InstallOptions {
    /// Defaults overlaid with environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `IPCWATCH_LOG_LEVEL`: Minimum log severity
    /// - `IPCWATCH_IGNORE_CHANNELS`: Comma-separated channels to exclude
    /// - `IPCWATCH_EXTENSION_DIR`: Privileged worker bundle directory
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as `from_env`, reading variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut options = Self::default();

        if let Some(level) = lookup("IPCWATCH_LOG_LEVEL") {
            options.log_level = Some(level);
        }

        if let Some(channels) = lookup("IPCWATCH_IGNORE_CHANNELS") {
            options.ignore_channels = channels
                .split(',')
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(str::to_string)
                .collect();
        }

        if let Some(dir) = lookup("IPCWATCH_EXTENSION_DIR") {
            options.extension_dir = PathBuf::from(dir);
        }

        options
    }

    #[must_use]
    pub fn with_ignored_channel(mut self, channel: impl Into<String>) -> Self {
        self.ignore_channels.push(channel.into());
        self
    }

    #[must_use]
    pub fn with_log_capacity(mut self, capacity: usize) -> Self {
        self.log_capacity = capacity;
        self
    }

    /// The full excluded set: relay channels plus `ignore_channels`.
    #[must_use]
    pub fn excluded_channels(&self) -> ExcludedChannels {
        ExcludedChannels::with_channels(self.ignore_channels.iter().cloned())
    }
}
