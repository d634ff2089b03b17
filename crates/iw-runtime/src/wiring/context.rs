//! # Per-Context Installation
//!
//! Everything installed into one isolated context, in order:
//!
//! 1. worker and front-end preload scripts
//! 2. the privileged worker bundle, whose background runs the event log
//! 3. a relay to that worker, registered with the process routing
//! 4. the transport tap and worker-send tracking, both feeding the relay
//! 5. the privileged worker launch (or its single deferred retry)
//!
//! Events captured before the worker is ready wait in the relay's backlog.

use crate::container::InstallOptions;
use crate::error::InstallError;
use crate::wiring::ActiveRelay;
use iw_01_event_log::EventLogService;
use iw_03_transport_tap::{TransportTap, WorkerSendTracker};
use iw_04_relay::{EventRelay, LaunchOutcome, PrivilegedWorkerLauncher};
use shared_bus::{PreloadKind, PreloadScript, Session, SubscriptionId};
use shared_types::{ContextId, REQUESTER_PRELOAD_ID, WORKER_PRELOAD_ID};
use std::sync::Arc;
use tracing::info;

/// What stays alive for one installed context.
pub struct ContextInstallation {
    context_id: ContextId,
    scope: String,
    relay: Arc<EventRelay>,
    launcher: Arc<PrivilegedWorkerLauncher>,
    tracker: Arc<WorkerSendTracker>,
    status_subscription: SubscriptionId,
}

impl ContextInstallation {
    /// Install into `session`.
    ///
    /// # Errors
    ///
    /// `InstallError::ExtensionLoad` if the bundle cannot be loaded, or a
    /// launch failure that could not be deferred.
    pub async fn install(
        session: Arc<dyn Session>,
        options: &InstallOptions,
        routing: &ActiveRelay,
    ) -> Result<Self, InstallError> {
        let context_id = session.context_id().clone();
        let excluded = options.excluded_channels();

        session.register_preload_script(PreloadScript {
            id: WORKER_PRELOAD_ID.to_string(),
            kind: PreloadKind::Worker,
            file_path: options.worker_preload.clone(),
        });
        session.register_preload_script(PreloadScript {
            id: REQUESTER_PRELOAD_ID.to_string(),
            kind: PreloadKind::Frame,
            file_path: options.requester_preload.clone(),
        });

        let log = Arc::new(EventLogService::new(options.log_capacity));
        let extension = session
            .load_extension(&options.extension_dir, log)
            .await
            .map_err(|source| InstallError::ExtensionLoad {
                context: context_id.clone(),
                source,
            })?;
        let scope = extension.url;

        let relay = Arc::new(EventRelay::new(context_id.clone()));
        routing.register(relay.clone());

        let tap = Arc::new(
            TransportTap::new(relay.clone(), excluded.clone()).with_privileged_scope(scope.clone()),
        );
        tap.attach(&*session);

        let workers = session.service_workers();
        let tracker = Arc::new(WorkerSendTracker::new(
            workers.clone(),
            relay.clone(),
            excluded,
            Some(scope.clone()),
        ));
        let status_subscription = tracker.start();

        let launcher = Arc::new(PrivilegedWorkerLauncher::new(workers, scope.clone(), relay.clone()));
        match launcher.launch().await? {
            LaunchOutcome::Ready => info!(context = %context_id, scope = %scope, "ipcwatch loaded"),
            LaunchOutcome::Deferred => {
                info!(context = %context_id, scope = %scope, "ipcwatch loaded, worker start deferred")
            }
        }

        Ok(Self {
            context_id,
            scope,
            relay,
            launcher,
            tracker,
            status_subscription,
        })
    }

    #[must_use]
    pub fn context_id(&self) -> &ContextId {
        &self.context_id
    }

    /// Scope of the privileged worker.
    #[must_use]
    pub fn scope(&self) -> &str {
        &self.scope
    }

    #[must_use]
    pub fn relay(&self) -> &Arc<EventRelay> {
        &self.relay
    }

    #[must_use]
    pub fn launcher(&self) -> &Arc<PrivilegedWorkerLauncher> {
        &self.launcher
    }

    #[must_use]
    pub fn tracker(&self) -> &Arc<WorkerSendTracker> {
        &self.tracker
    }

    #[must_use]
    pub fn status_subscription(&self) -> SubscriptionId {
        self.status_subscription
    }
}
