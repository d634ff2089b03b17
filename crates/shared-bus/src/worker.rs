//! # Worker Contexts
//!
//! Isolated background contexts addressable by scope, the registry that
//! starts and tracks them, and in-memory implementations of both.

use crate::coordinator::{CoordinatorBus, InMemoryCoordinatorBus};
use crate::listener::{BusEvent, SenderKind};
use crate::transport::{TransportEvent, TransportHub, TransportSignal};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use shared_types::{BusError, VersionId};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Sees every message the coordinating process sends to a worker.
pub type SendObserver = Arc<dyn Fn(&str, &[Value]) + Send + Sync>;

/// A running worker context as seen from the coordinating process.
pub trait ServiceWorker: Send + Sync {
    fn scope(&self) -> &str;

    fn version_id(&self) -> VersionId;

    /// Send a message from the coordinating process to this worker.
    fn send(&self, channel: &str, args: Vec<Value>);

    /// Keep the worker alive while the coordinator depends on it.
    fn start_task(&self);

    /// Observe every `send` made to this worker through any of its
    /// handles, including ones obtained earlier. `None` removes the
    /// observer.
    fn set_send_observer(&self, observer: Option<SendObserver>);

    /// Messages this worker sends to the coordinating process.
    fn ipc(&self) -> Arc<dyn CoordinatorBus>;
}

/// Outbound half available to code running inside a worker.
pub trait WorkerPort {
    /// Send a message from the worker to the coordinating process.
    fn post(&self, channel: &str, args: Vec<Value>);
}

/// Code running inside a worker context.
pub trait WorkerScript: Send + Sync {
    /// Handle a message the coordinating process sent to this worker.
    fn on_message(&self, channel: &str, args: &[Value], port: &dyn WorkerPort);
}

/// Lifecycle state of a worker version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunningStatus {
    Starting,
    Running,
    Stopping,
    Stopped,
}

impl RunningStatus {
    /// Whether the worker can receive messages (or will shortly).
    #[must_use]
    pub fn is_live(&self) -> bool {
        matches!(self, Self::Starting | Self::Running)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunningWorkerInfo {
    pub version_id: VersionId,
    pub scope: String,
    pub status: RunningStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunningStatusDetails {
    pub version_id: VersionId,
    pub status: RunningStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationDetails {
    pub scope: String,
}

/// Handle for removing a registry notification subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

pub type RunningStatusListener = Arc<dyn Fn(&RunningStatusDetails) + Send + Sync>;
pub type RegistrationListener = Arc<dyn Fn(&RegistrationDetails) + Send + Sync>;

/// Worker management for one context.
#[async_trait]
pub trait WorkerRegistry: Send + Sync {
    /// Workers that are currently starting or running.
    fn get_all_running(&self) -> Vec<RunningWorkerInfo>;

    /// The current handle for a worker version.
    fn get_worker_from_version_id(&self, version_id: VersionId) -> Option<Arc<dyn ServiceWorker>>;

    /// Start (or reuse) the worker registered under `scope`.
    ///
    /// # Errors
    ///
    /// `BusError::ScopeNotRegistered` while the scope's registration has
    /// not completed.
    async fn start_worker_for_scope(&self, scope: &str) -> Result<Arc<dyn ServiceWorker>, BusError>;

    fn on_running_status_changed(&self, listener: RunningStatusListener) -> SubscriptionId;

    fn on_registration_completed(&self, listener: RegistrationListener) -> SubscriptionId;

    /// Remove a subscription. Returns whether it existed.
    fn remove_listener(&self, id: SubscriptionId) -> bool;
}

// =============================================================================
// IN-MEMORY WORKER
// =============================================================================

/// A message delivered to an in-memory worker.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerMessage {
    pub channel: String,
    pub args: Vec<Value>,
}

/// In-process worker context.
pub struct InMemoryServiceWorker {
    scope: String,
    version_id: VersionId,
    ipc: Arc<InMemoryCoordinatorBus>,
    transport: Arc<TransportHub>,
    script: RwLock<Option<Arc<dyn WorkerScript>>>,
    send_observer: RwLock<Option<SendObserver>>,
    inbox: Mutex<Vec<WorkerMessage>>,
    tasks_started: AtomicUsize,
}

impl InMemoryServiceWorker {
    #[must_use]
    pub fn new(scope: impl Into<String>, version_id: VersionId, transport: Arc<TransportHub>) -> Self {
        Self {
            scope: scope.into(),
            version_id,
            ipc: Arc::new(InMemoryCoordinatorBus::new()),
            transport,
            script: RwLock::new(None),
            send_observer: RwLock::new(None),
            inbox: Mutex::new(Vec::new()),
            tasks_started: AtomicUsize::new(0),
        }
    }

    pub fn set_script(&self, script: Arc<dyn WorkerScript>) {
        *self.script.write() = Some(script);
    }

    /// Messages the coordinating process has sent to this worker.
    #[must_use]
    pub fn received(&self) -> Vec<WorkerMessage> {
        self.inbox.lock().clone()
    }

    pub fn clear_received(&self) {
        self.inbox.lock().clear();
    }

    #[must_use]
    pub fn tasks_started(&self) -> usize {
        self.tasks_started.load(Ordering::SeqCst)
    }

    fn sender(&self) -> SenderKind {
        SenderKind::Worker {
            scope: self.scope.clone(),
            version_id: self.version_id,
        }
    }
}

impl WorkerPort for InMemoryServiceWorker {
    fn post(&self, channel: &str, args: Vec<Value>) {
        self.transport.publish(&TransportEvent {
            signal: TransportSignal::Message,
            sender: self.sender(),
            channel: channel.to_string(),
            args: args.clone(),
        });
        self.ipc.emit(channel, &BusEvent::new(self.sender()), &args);
    }
}

impl ServiceWorker for InMemoryServiceWorker {
    fn scope(&self) -> &str {
        &self.scope
    }

    fn version_id(&self) -> VersionId {
        self.version_id
    }

    fn send(&self, channel: &str, args: Vec<Value>) {
        let observer = self.send_observer.read().clone();
        if let Some(observer) = observer {
            observer(channel, &args);
        }
        self.inbox.lock().push(WorkerMessage {
            channel: channel.to_string(),
            args: args.clone(),
        });
        let script = self.script.read().clone();
        if let Some(script) = script {
            script.on_message(channel, &args, self);
        }
    }

    fn start_task(&self) {
        self.tasks_started.fetch_add(1, Ordering::SeqCst);
    }

    fn set_send_observer(&self, observer: Option<SendObserver>) {
        *self.send_observer.write() = observer;
    }

    fn ipc(&self) -> Arc<dyn CoordinatorBus> {
        self.ipc.clone()
    }
}

// =============================================================================
// IN-MEMORY REGISTRY
// =============================================================================

struct WorkerSlot {
    status: RunningStatus,
    raw: Arc<InMemoryServiceWorker>,
}

/// In-process worker registry for one context.
pub struct InMemoryWorkerRegistry {
    transport: Arc<TransportHub>,
    workers: RwLock<BTreeMap<VersionId, WorkerSlot>>,
    pending_scopes: RwLock<HashSet<String>>,
    scripts: RwLock<HashMap<String, Arc<dyn WorkerScript>>>,
    status_listeners: RwLock<Vec<(SubscriptionId, RunningStatusListener)>>,
    registration_listeners: RwLock<Vec<(SubscriptionId, RegistrationListener)>>,
    next_version: AtomicU64,
    next_subscription: AtomicU64,
}

impl InMemoryWorkerRegistry {
    #[must_use]
    pub fn new(transport: Arc<TransportHub>) -> Self {
        Self {
            transport,
            workers: RwLock::new(BTreeMap::new()),
            pending_scopes: RwLock::new(HashSet::new()),
            scripts: RwLock::new(HashMap::new()),
            status_listeners: RwLock::new(Vec::new()),
            registration_listeners: RwLock::new(Vec::new()),
            next_version: AtomicU64::new(1),
            next_subscription: AtomicU64::new(1),
        }
    }

    /// Code to run in every worker started for `scope`, including one that
    /// is already running.
    pub fn install_script(&self, scope: &str, script: Arc<dyn WorkerScript>) {
        self.scripts.write().insert(scope.to_string(), script.clone());
        for slot in self.workers.read().values() {
            if slot.raw.scope() == scope {
                slot.raw.set_script(script.clone());
            }
        }
    }

    /// Make startups for `scope` fail until `complete_registration`.
    pub fn defer_registration(&self, scope: &str) {
        self.pending_scopes.write().insert(scope.to_string());
    }

    /// Finish registering `scope` and notify subscribers.
    pub fn complete_registration(&self, scope: &str) {
        self.pending_scopes.write().remove(scope);
        let details = RegistrationDetails {
            scope: scope.to_string(),
        };
        let listeners: Vec<_> = self
            .registration_listeners
            .read()
            .iter()
            .map(|(_, l)| l.clone())
            .collect();
        for listener in listeners {
            listener(&details);
        }
    }

    /// Start a worker for `scope` from application code.
    ///
    /// # Errors
    ///
    /// `BusError::ScopeNotRegistered` while the scope is deferred.
    pub fn spawn(&self, scope: &str) -> Result<Arc<InMemoryServiceWorker>, BusError> {
        if self.pending_scopes.read().contains(scope) {
            return Err(BusError::ScopeNotRegistered(scope.to_string()));
        }
        if let Some(existing) = self.find_by_scope(scope) {
            return Ok(existing);
        }

        let version_id = self.next_version.fetch_add(1, Ordering::SeqCst);
        let raw = Arc::new(InMemoryServiceWorker::new(scope, version_id, self.transport.clone()));
        if let Some(script) = self.scripts.read().get(scope) {
            raw.set_script(script.clone());
        }
        self.workers.write().insert(
            version_id,
            WorkerSlot {
                status: RunningStatus::Starting,
                raw: raw.clone(),
            },
        );
        debug!(scope = %scope, version_id, "Worker starting");

        self.notify_status(version_id, RunningStatus::Starting);
        self.set_status(version_id, RunningStatus::Running);
        Ok(raw)
    }

    /// Stop a running worker.
    pub fn stop(&self, version_id: VersionId) {
        self.set_status(version_id, RunningStatus::Stopping);
        self.set_status(version_id, RunningStatus::Stopped);
    }

    /// The live worker registered under `scope`.
    #[must_use]
    pub fn find_by_scope(&self, scope: &str) -> Option<Arc<InMemoryServiceWorker>> {
        self.workers
            .read()
            .values()
            .find(|s| s.raw.scope() == scope && s.status.is_live())
            .map(|s| s.raw.clone())
    }

    #[must_use]
    pub fn registration_listener_count(&self) -> usize {
        self.registration_listeners.read().len()
    }

    #[must_use]
    pub fn status_listener_count(&self) -> usize {
        self.status_listeners.read().len()
    }

    fn set_status(&self, version_id: VersionId, status: RunningStatus) {
        {
            let mut workers = self.workers.write();
            let Some(slot) = workers.get_mut(&version_id) else {
                return;
            };
            slot.status = status;
        }
        self.notify_status(version_id, status);
    }

    fn notify_status(&self, version_id: VersionId, status: RunningStatus) {
        let details = RunningStatusDetails { version_id, status };
        let listeners: Vec<_> = self
            .status_listeners
            .read()
            .iter()
            .map(|(_, l)| l.clone())
            .collect();
        for listener in listeners {
            listener(&details);
        }
    }

    fn next_subscription_id(&self) -> SubscriptionId {
        SubscriptionId(self.next_subscription.fetch_add(1, Ordering::SeqCst))
    }
}

impl Default for InMemoryWorkerRegistry {
    fn default() -> Self {
        Self::new(Arc::new(TransportHub::new()))
    }
}

#[async_trait]
impl WorkerRegistry for InMemoryWorkerRegistry {
    fn get_all_running(&self) -> Vec<RunningWorkerInfo> {
        self.workers
            .read()
            .iter()
            .filter(|(_, slot)| slot.status.is_live())
            .map(|(version_id, slot)| RunningWorkerInfo {
                version_id: *version_id,
                scope: slot.raw.scope().to_string(),
                status: slot.status,
            })
            .collect()
    }

    fn get_worker_from_version_id(&self, version_id: VersionId) -> Option<Arc<dyn ServiceWorker>> {
        self.workers
            .read()
            .get(&version_id)
            .map(|s| s.raw.clone() as Arc<dyn ServiceWorker>)
    }

    async fn start_worker_for_scope(&self, scope: &str) -> Result<Arc<dyn ServiceWorker>, BusError> {
        let raw = self.spawn(scope)?;
        self.get_worker_from_version_id(raw.version_id())
            .ok_or(BusError::UnknownWorker(raw.version_id()))
    }

    fn on_running_status_changed(&self, listener: RunningStatusListener) -> SubscriptionId {
        let id = self.next_subscription_id();
        self.status_listeners.write().push((id, listener));
        id
    }

    fn on_registration_completed(&self, listener: RegistrationListener) -> SubscriptionId {
        let id = self.next_subscription_id();
        self.registration_listeners.write().push((id, listener));
        id
    }

    fn remove_listener(&self, id: SubscriptionId) -> bool {
        let mut removed = false;
        self.status_listeners.write().retain(|(sid, _)| {
            let keep = *sid != id;
            removed |= !keep;
            keep
        });
        self.registration_listeners.write().retain(|(sid, _)| {
            let keep = *sid != id;
            removed |= !keep;
            keep
        });
        removed
    }
}
