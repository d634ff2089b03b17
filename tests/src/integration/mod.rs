//! Shared fixtures for the integration flows.

pub mod capacity;
pub mod contexts;
pub mod correlation;
pub mod installation;
pub mod self_exclusion;
pub mod startup;

use iw_runtime::{InstallOptions, IpcWatch};
use iw_05_requester_tracker::TrackedRequesterBus;
use shared_bus::{InMemoryHost, InMemorySession};
use shared_types::{ContextId, IndexedIpcEvent};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Scope of the privileged worker under the default options.
pub const PRIVILEGED_SCOPE: &str = "ext://ipcwatch/";

/// A ready host with the engine installed into its default context.
pub struct Harness {
    pub host: Arc<InMemoryHost>,
    pub session: Arc<InMemorySession>,
    pub watch: Arc<IpcWatch>,
    pub options: InstallOptions,
}

impl Harness {
    pub async fn installed(options: InstallOptions) -> Self {
        let host = Arc::new(InMemoryHost::new());
        let session = host.mark_ready();
        let watch = IpcWatch::new(host.clone());
        watch.install(options.clone()).await;
        Self {
            host,
            session,
            watch,
            options,
        }
    }

    pub async fn with_defaults() -> Self {
        Self::installed(InstallOptions::default()).await
    }

    /// A front-end context of the default session, tracked the way the
    /// requester preload does it.
    pub fn frame(&self) -> TrackedRequesterBus {
        IpcWatch::instrument_requester(Arc::new(self.session.open_frame()), &self.options)
    }

    pub async fn events(&self) -> Vec<IndexedIpcEvent> {
        self.watch.get_events().await
    }

    /// Events on `channel` only.
    pub async fn events_on(&self, channel: &str) -> Vec<IndexedIpcEvent> {
        self.events()
            .await
            .into_iter()
            .filter(|e| e.event.channel == channel)
            .collect()
    }

    pub fn default_context() -> ContextId {
        ContextId::default_context()
    }
}

/// Poll `condition` until it holds, yielding to spawned tasks in between.
pub async fn eventually<F>(mut condition: F)
where
    F: FnMut() -> bool,
{
    let waited = tokio::time::timeout(Duration::from_secs(2), async {
        while !condition() {
            tokio::task::yield_now().await;
        }
    })
    .await;
    assert!(waited.is_ok(), "condition not reached in time");
}

/// Run `future` with a timeout so a lost reply fails instead of hanging.
pub async fn within<T>(future: impl Future<Output = T>) -> T {
    match tokio::time::timeout(Duration::from_secs(2), future).await {
        Ok(value) => value,
        Err(_) => panic!("timed out"),
    }
}
