//! # Worker Send Tracking
//!
//! Outbound coordinator-to-worker traffic does not cross the transport
//! tap, so each worker gets a `SendRecorder` installed as its send
//! observer. The observer lives in the worker itself, so sends through
//! handles taken before patching are recorded too. Workers are found among
//! those already running and through running-status notifications. Each
//! version is patched at most once; the privileged worker is never patched.

use parking_lot::Mutex;
use serde_json::Value;
use shared_bus::{SendObserver, SubscriptionId, WorkerRegistry};
use shared_types::{Direction, EventSink, ExcludedChannels, IpcEvent, VersionId, WorkerDetails};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

/// Records what the coordinator sends one worker.
pub struct SendRecorder {
    worker: WorkerDetails,
    sink: Arc<dyn EventSink>,
    excluded: ExcludedChannels,
}

impl SendRecorder {
    #[must_use]
    pub fn new(worker: WorkerDetails, sink: Arc<dyn EventSink>, excluded: ExcludedChannels) -> Self {
        Self { worker, sink, excluded }
    }

    pub fn record(&self, channel: &str, args: &[Value]) {
        if self.excluded.contains(channel) {
            return;
        }
        let event = IpcEvent::capture(Direction::CoordinatorToWorker, channel, args.to_vec())
            .with_worker(self.worker.clone());
        self.sink.track(event);
    }

    #[must_use]
    pub fn into_observer(self) -> SendObserver {
        Arc::new(move |channel: &str, args: &[Value]| self.record(channel, args))
    }
}

/// Patches every non-privileged worker of one registry.
pub struct WorkerSendTracker {
    registry: Arc<dyn WorkerRegistry>,
    sink: Arc<dyn EventSink>,
    excluded: ExcludedChannels,
    privileged_scope: Option<String>,
    patched: Mutex<HashSet<VersionId>>,
}

impl WorkerSendTracker {
    #[must_use]
    pub fn new(
        registry: Arc<dyn WorkerRegistry>,
        sink: Arc<dyn EventSink>,
        excluded: ExcludedChannels,
        privileged_scope: Option<String>,
    ) -> Self {
        Self {
            registry,
            sink,
            excluded,
            privileged_scope,
            patched: Mutex::new(HashSet::new()),
        }
    }

    /// Patch the workers already running, then every worker that starts
    /// later.
    pub fn start(self: &Arc<Self>) -> SubscriptionId {
        for info in self.registry.get_all_running() {
            self.patch(info.version_id);
        }

        let tracker = Arc::clone(self);
        self.registry
            .on_running_status_changed(Arc::new(move |details| {
                if details.status.is_live() {
                    tracker.patch(details.version_id);
                }
            }))
    }

    /// Patch one worker version. Returns whether it was patched by this call.
    pub fn patch(&self, version_id: VersionId) -> bool {
        if self.patched.lock().contains(&version_id) {
            return false;
        }
        let Some(worker) = self.registry.get_worker_from_version_id(version_id) else {
            debug!(version_id, "Worker vanished before patching");
            return false;
        };
        if self.privileged_scope.as_deref() == Some(worker.scope()) {
            return false;
        }
        if !self.patched.lock().insert(version_id) {
            return false;
        }

        let details = WorkerDetails {
            version_id,
            scope: worker.scope().to_string(),
        };
        let recorder = SendRecorder::new(details, self.sink.clone(), self.excluded.clone());
        worker.set_send_observer(Some(recorder.into_observer()));
        debug!(version_id, "Worker send patched");
        true
    }

    #[must_use]
    pub fn is_patched(&self, version_id: VersionId) -> bool {
        self.patched.lock().contains(&version_id)
    }

    #[must_use]
    pub fn patched_count(&self) -> usize {
        self.patched.lock().len()
    }
}
