//! # IpcWatch
//!
//! The engine's entry points: `install`, `get_events`, `clear_events`,
//! and `instrument_requester` for front-end contexts.
//!
//! ```text
//! install()
//!   ├─ once per process: coordinator bus → InterceptedBus → ActiveRelay
//!   │                    context-created subscription
//!   └─ once per context: ContextInstallation (default context now if the
//!                        host is ready, every other context on creation)
//! ```

use crate::container::{InstallOptions, InstallationState};
use crate::wiring::{ActiveRelay, ContextInstallation};
use iw_02_interceptor::InterceptedBus;
use iw_04_relay::EventRelay;
use iw_05_requester_tracker::{RequesterRelaySink, TrackedRequesterBus};
use iw_telemetry::{LogLevel, TelemetryError};
use parking_lot::{Mutex, RwLock};
use shared_bus::{HostApp, RequesterBus, Session};
use shared_types::{ContextId, IndexedIpcEvent};
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tokio::runtime::Handle;
use tracing::{debug, error, info, warn};

pub struct IpcWatch {
    host: Arc<dyn HostApp>,
    state: Arc<InstallationState>,
    routing: Arc<ActiveRelay>,
    options: RwLock<InstallOptions>,
    contexts: Mutex<HashMap<ContextId, Arc<ContextInstallation>>>,
}

impl IpcWatch {
    /// An engine for `host` with its own installation state.
    #[must_use]
    pub fn new(host: Arc<dyn HostApp>) -> Arc<Self> {
        Self::with_state(host, Arc::new(InstallationState::new()))
    }

    /// An engine sharing `state`, e.g. `InstallationState::global()`.
    #[must_use]
    pub fn with_state(host: Arc<dyn HostApp>, state: Arc<InstallationState>) -> Arc<Self> {
        Arc::new(Self {
            host,
            state,
            routing: Arc::new(ActiveRelay::new()),
            options: RwLock::new(InstallOptions::default()),
            contexts: Mutex::new(HashMap::new()),
        })
    }

    #[must_use]
    pub fn state(&self) -> &InstallationState {
        &self.state
    }

    #[must_use]
    pub fn options(&self) -> InstallOptions {
        self.options.read().clone()
    }

    /// The installation for `context_id`, once it completed.
    #[must_use]
    pub fn context(&self, context_id: &ContextId) -> Option<Arc<ContextInstallation>> {
        self.contexts.lock().get(context_id).cloned()
    }

    /// Install the engine. Safe to call any number of times.
    ///
    /// Nothing here fails towards the caller: a bad log level is ignored,
    /// a worker that cannot start yet is retried, and a context that fails
    /// to install is logged and left uninstrumented.
    pub async fn install(self: &Arc<Self>, options: InstallOptions) {
        apply_log_level(options.log_level.as_deref());

        if !self.state.mark_process_installed() {
            debug!("ipcwatch already installed");
            return;
        }
        *self.options.write() = options.clone();

        let real = self.host.coordinator_bus();
        let intercepted = InterceptedBus::new(real, self.routing.clone(), options.excluded_channels());
        self.host.replace_coordinator_bus(Arc::new(intercepted));
        info!(excluded = options.ignore_channels.len(), "Coordinator bus intercepted");

        self.watch_new_sessions();

        if self.host.is_ready() {
            if let Some(session) = self.host.default_session() {
                self.install_context(session).await;
            }
        }
    }

    /// Install into one context unless it already is.
    pub async fn install_context(self: &Arc<Self>, session: Arc<dyn Session>) {
        let context_id = session.context_id().clone();
        if !self.state.mark_installed(&context_id) {
            debug!(context = %context_id, "Context already installed");
            return;
        }

        let options = self.options();
        match ContextInstallation::install(session, &options, &self.routing).await {
            Ok(installed) => {
                self.contexts.lock().insert(context_id, Arc::new(installed));
            }
            Err(e) => error!(context = %context_id, error = %e, "Failed to load ipcwatch"),
        }
    }

    /// The current window of the primary log: the default context's, or
    /// the first installed context's when the default one is not.
    ///
    /// Empty, with a warning, before installation or before the privileged
    /// worker is ready.
    pub async fn get_events(&self) -> Vec<IndexedIpcEvent> {
        match self.ready_relay() {
            Some(relay) => fetch(&relay).await,
            None => Vec::new(),
        }
    }

    /// The current window of one context's log.
    pub async fn get_context_events(&self, context_id: &ContextId) -> Vec<IndexedIpcEvent> {
        match self.routing.for_context(context_id) {
            Some(relay) => fetch(&relay).await,
            None => {
                warn!(context = %context_id, "ipcwatch is not installed in this context");
                Vec::new()
            }
        }
    }

    /// Reset the primary log.
    pub fn clear_events(&self) {
        if let Some(relay) = self.ready_relay() {
            if let Err(e) = relay.clear_events() {
                warn!(error = %e, "Failed to clear events");
            }
        }
    }

    /// Wrap a front-end context's bus. Captured events travel back over
    /// `render-event` on `bus` itself and are picked up by the transport
    /// tap of the context the frame belongs to.
    #[must_use]
    pub fn instrument_requester(bus: Arc<dyn RequesterBus>, options: &InstallOptions) -> TrackedRequesterBus {
        let sink = Arc::new(RequesterRelaySink::new(bus.clone()));
        TrackedRequesterBus::new(bus, sink, options.excluded_channels())
    }

    fn ready_relay(&self) -> Option<Arc<EventRelay>> {
        if !self.state.is_process_installed() {
            warn!("Events requested before ipcwatch was installed");
            return None;
        }
        let relay = self.routing.primary().filter(|r| r.is_ready());
        if relay.is_none() {
            warn!("The ipcwatch worker is not ready yet; no events available");
        }
        relay
    }

    fn watch_new_sessions(self: &Arc<Self>) {
        let runtime = match Handle::try_current() {
            Ok(runtime) => runtime,
            Err(_) => {
                warn!("No async runtime; contexts created later will not be instrumented");
                return;
            }
        };
        let watch: Weak<Self> = Arc::downgrade(self);
        self.host.on_session_created(Arc::new(move |session: Arc<dyn Session>| {
            let Some(watch) = watch.upgrade() else {
                return;
            };
            runtime.spawn(async move { watch.install_context(session).await });
        }));
    }
}

async fn fetch(relay: &EventRelay) -> Vec<IndexedIpcEvent> {
    match relay.fetch_events().await {
        Ok(events) => events,
        Err(e) => {
            warn!(context = %relay.context_id(), error = %e, "Cannot get IPC events");
            Vec::new()
        }
    }
}

fn apply_log_level(level: Option<&str>) {
    let Some(level) = level else {
        return;
    };
    let parsed = match level.parse::<LogLevel>() {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!(error = %e, "Ignoring log level; keeping the current one");
            return;
        }
    };
    match iw_telemetry::set_global_level(parsed) {
        Ok(()) => {}
        Err(TelemetryError::NotInitialized) => {
            debug!(level = %parsed, "No ipcwatch subscriber installed; log level left to the host");
        }
        Err(e) => warn!(error = %e, "Failed to apply log level"),
    }
}
