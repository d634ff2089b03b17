//! # Privileged Worker Launcher
//!
//! Starts the worker that owns the canonical log and hands it to the
//! relay. Starting can fail while the worker's scope is still being
//! registered; in that case a single retry is armed on the registry's
//! registration-completed notification for that scope. The subscription is
//! removed as soon as a matching notification arrives, whether the retry
//! then succeeds or not.

use crate::error::RelayError;
use crate::relay::EventRelay;
use parking_lot::Mutex;
use shared_bus::{ServiceWorker, SubscriptionId, WorkerRegistry};
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

/// Result of a launch attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchOutcome {
    /// The worker is running and the relay is ready.
    Ready,
    /// Startup failed; one retry is armed for when registration completes.
    Deferred,
}

pub struct PrivilegedWorkerLauncher {
    registry: Arc<dyn WorkerRegistry>,
    scope: String,
    relay: Arc<EventRelay>,
    pending: Mutex<Option<SubscriptionId>>,
}

impl PrivilegedWorkerLauncher {
    #[must_use]
    pub fn new(registry: Arc<dyn WorkerRegistry>, scope: impl Into<String>, relay: Arc<EventRelay>) -> Self {
        Self {
            registry,
            scope: scope.into(),
            relay,
            pending: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Whether a retry is still waiting for registration to complete.
    #[must_use]
    pub fn has_pending_retry(&self) -> bool {
        self.pending.lock().is_some()
    }

    /// Start the privileged worker, arming one retry on failure.
    ///
    /// # Errors
    ///
    /// `RelayError::NoRuntime` if startup failed and no Tokio runtime is
    /// available to run the retry.
    pub async fn launch(self: &Arc<Self>) -> Result<LaunchOutcome, RelayError> {
        match self.start().await {
            Ok(()) => Ok(LaunchOutcome::Ready),
            Err(e) => {
                debug!(scope = %self.scope, error = %e, "Privileged worker not startable yet");
                let runtime = Handle::try_current().map_err(|_| RelayError::NoRuntime)?;
                self.arm_retry(runtime);
                Ok(LaunchOutcome::Deferred)
            }
        }
    }

    /// Drop a pending retry. Returns whether one was pending.
    pub fn cancel(&self) -> bool {
        match self.pending.lock().take() {
            Some(id) => self.registry.remove_listener(id),
            None => false,
        }
    }

    async fn start(&self) -> Result<(), RelayError> {
        let worker = self.registry.start_worker_for_scope(&self.scope).await?;
        worker.start_task();
        info!(scope = %self.scope, version_id = worker.version_id(), "Privileged worker started");
        self.relay.mark_ready(worker);
        Ok(())
    }

    fn arm_retry(self: &Arc<Self>, runtime: Handle) {
        let launcher = Arc::clone(self);
        let id = self
            .registry
            .on_registration_completed(Arc::new(move |details| {
                if details.scope != launcher.scope {
                    return;
                }
                if !launcher.cancel() {
                    return;
                }
                let retry = Arc::clone(&launcher);
                runtime.spawn(async move {
                    if let Err(e) = retry.start().await {
                        warn!(scope = %retry.scope, error = %e, "Privileged worker retry failed");
                    }
                });
            }));
        *self.pending.lock() = Some(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_bus::InMemoryWorkerRegistry;
    use shared_types::ContextId;
    use std::time::Duration;

    const SCOPE: &str = "ext://ipcwatch/";

    fn launcher(registry: &Arc<InMemoryWorkerRegistry>) -> (Arc<PrivilegedWorkerLauncher>, Arc<EventRelay>) {
        let relay = Arc::new(EventRelay::new(ContextId::default_context()));
        let launcher = Arc::new(PrivilegedWorkerLauncher::new(registry.clone(), SCOPE, relay.clone()));
        (launcher, relay)
    }

    async fn wait_until_ready(relay: &EventRelay) {
        tokio::time::timeout(Duration::from_secs(1), async {
            while !relay.is_ready() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_immediate_start() {
        let registry = Arc::new(InMemoryWorkerRegistry::default());
        let (launcher, relay) = launcher(&registry);

        assert_eq!(launcher.launch().await.unwrap(), LaunchOutcome::Ready);
        assert!(relay.is_ready());
        assert!(!launcher.has_pending_retry());
        assert_eq!(registry.find_by_scope(SCOPE).unwrap().tasks_started(), 1);
    }

    #[tokio::test]
    async fn test_retry_after_registration_completes() {
        let registry = Arc::new(InMemoryWorkerRegistry::default());
        registry.defer_registration(SCOPE);
        let (launcher, relay) = launcher(&registry);

        assert_eq!(launcher.launch().await.unwrap(), LaunchOutcome::Deferred);
        assert!(!relay.is_ready());
        assert_eq!(registry.registration_listener_count(), 1);

        registry.complete_registration("ext://other/");
        assert_eq!(registry.registration_listener_count(), 1);

        registry.complete_registration(SCOPE);
        assert_eq!(registry.registration_listener_count(), 0);
        wait_until_ready(&relay).await;
    }

    #[tokio::test]
    async fn test_failed_retry_is_not_repeated() {
        let registry = Arc::new(InMemoryWorkerRegistry::default());
        registry.defer_registration(SCOPE);
        let (launcher, relay) = launcher(&registry);
        launcher.launch().await.unwrap();

        // The retry is spawned, but the scope is deferred again before it runs.
        registry.complete_registration(SCOPE);
        registry.defer_registration(SCOPE);
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(!relay.is_ready());
        assert!(!launcher.has_pending_retry());
        assert_eq!(registry.registration_listener_count(), 0);

        registry.complete_registration(SCOPE);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!relay.is_ready());
    }

    #[tokio::test]
    async fn test_cancel_removes_subscription() {
        let registry = Arc::new(InMemoryWorkerRegistry::default());
        registry.defer_registration(SCOPE);
        let (launcher, _) = launcher(&registry);
        launcher.launch().await.unwrap();

        assert!(launcher.cancel());
        assert!(!launcher.cancel());
        assert_eq!(registry.registration_listener_count(), 0);
    }
}
