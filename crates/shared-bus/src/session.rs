//! # Sessions
//!
//! An isolated context (the default one or a partition) with its own
//! preload scripts, extensions, worker registry and transport signals.

use crate::coordinator::InMemoryCoordinatorBus;
use crate::listener::{BusEvent, SenderKind};
use crate::requester::InMemoryRequesterBus;
use crate::transport::{TransportEvent, TransportHub, TransportListener, TransportSignal};
use crate::worker::{InMemoryWorkerRegistry, WorkerRegistry, WorkerScript};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use shared_types::{BusError, ContextId};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Which context kind a preload script is injected into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PreloadKind {
    Worker,
    Frame,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreloadScript {
    pub id: String,
    pub kind: PreloadKind,
    pub file_path: PathBuf,
}

/// A loaded extension bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extension {
    pub id: String,
    /// Base URL, which is also the scope of its background worker.
    pub url: String,
}

/// One isolated context.
#[async_trait]
pub trait Session: Send + Sync {
    fn context_id(&self) -> &ContextId;

    fn register_preload_script(&self, script: PreloadScript);

    /// Load the extension at `path` whose background worker runs
    /// `background`.
    ///
    /// # Errors
    ///
    /// `BusError::LoadFailed` if the bundle cannot be loaded.
    async fn load_extension(
        &self,
        path: &Path,
        background: Arc<dyn WorkerScript>,
    ) -> Result<Extension, BusError>;

    fn service_workers(&self) -> Arc<dyn WorkerRegistry>;

    /// Observe every inbound message before it is dispatched.
    fn on_transport(&self, listener: TransportListener);
}

/// In-process session.
///
/// Inbound traffic is delivered with `deliver_*`: transport subscribers see
/// it first, then the shared coordinator bus dispatches it.
pub struct InMemorySession {
    context_id: ContextId,
    coordinator: Arc<InMemoryCoordinatorBus>,
    transport: Arc<TransportHub>,
    workers: Arc<InMemoryWorkerRegistry>,
    preloads: Mutex<Vec<PreloadScript>>,
    extensions: Mutex<Vec<PathBuf>>,
    defer_extension_registration: AtomicBool,
    next_frame: AtomicU32,
}

impl InMemorySession {
    #[must_use]
    pub fn new(context_id: ContextId, coordinator: Arc<InMemoryCoordinatorBus>) -> Self {
        let transport = Arc::new(TransportHub::new());
        Self {
            context_id,
            coordinator,
            workers: Arc::new(InMemoryWorkerRegistry::new(transport.clone())),
            transport,
            preloads: Mutex::new(Vec::new()),
            extensions: Mutex::new(Vec::new()),
            defer_extension_registration: AtomicBool::new(false),
            next_frame: AtomicU32::new(1),
        }
    }

    /// Leave the background worker's scope unregistered after loading, so
    /// its first startup fails until `complete_registration` is called on
    /// the registry.
    pub fn defer_extension_registration(&self, defer: bool) {
        self.defer_extension_registration.store(defer, Ordering::SeqCst);
    }

    #[must_use]
    pub fn workers(&self) -> &Arc<InMemoryWorkerRegistry> {
        &self.workers
    }

    #[must_use]
    pub fn transport(&self) -> &Arc<TransportHub> {
        &self.transport
    }

    #[must_use]
    pub fn preload_scripts(&self) -> Vec<PreloadScript> {
        self.preloads.lock().clone()
    }

    #[must_use]
    pub fn loaded_extensions(&self) -> Vec<PathBuf> {
        self.extensions.lock().clone()
    }

    /// A new front-end context in this session.
    #[must_use]
    pub fn open_frame(self: &Arc<Self>) -> InMemoryRequesterBus {
        let frame_id = self.next_frame.fetch_add(1, Ordering::SeqCst);
        InMemoryRequesterBus::new(self.clone(), frame_id)
    }

    /// Deliver a fire-and-forget message.
    pub fn deliver_message(&self, sender: SenderKind, channel: &str, args: Vec<Value>) {
        self.publish(TransportSignal::Message, &sender, channel, &args);
        self.coordinator.emit(channel, &BusEvent::new(sender), &args);
    }

    /// Deliver a request/response call.
    ///
    /// # Errors
    ///
    /// Whatever the coordinator bus's responder lookup or responder returns.
    pub fn deliver_invoke(
        &self,
        sender: SenderKind,
        channel: &str,
        args: Vec<Value>,
    ) -> Result<Value, BusError> {
        self.publish(TransportSignal::Invoke, &sender, channel, &args);
        self.coordinator.invoke(channel, &BusEvent::new(sender), &args)
    }

    /// Deliver a synchronous call. Returns `Value::Null` when no listener
    /// replied.
    pub fn deliver_sync(&self, sender: SenderKind, channel: &str, args: Vec<Value>) -> Value {
        self.publish(TransportSignal::MessageSync, &sender, channel, &args);
        let event = BusEvent::new(sender);
        self.coordinator.emit(channel, &event, &args);
        event.take_return_value().unwrap_or(Value::Null)
    }

    fn publish(&self, signal: TransportSignal, sender: &SenderKind, channel: &str, args: &[Value]) {
        self.transport.publish(&TransportEvent {
            signal,
            sender: sender.clone(),
            channel: channel.to_string(),
            args: args.to_vec(),
        });
    }
}

#[async_trait]
impl Session for InMemorySession {
    fn context_id(&self) -> &ContextId {
        &self.context_id
    }

    fn register_preload_script(&self, script: PreloadScript) {
        debug!(context = %self.context_id, id = %script.id, "Preload script registered");
        self.preloads.lock().push(script);
    }

    async fn load_extension(
        &self,
        path: &Path,
        background: Arc<dyn WorkerScript>,
    ) -> Result<Extension, BusError> {
        let id = path
            .file_name()
            .and_then(|name| name.to_str())
            .filter(|name| !name.is_empty())
            .ok_or_else(|| BusError::LoadFailed {
                path: path.display().to_string(),
                reason: "bundle path has no directory name".into(),
            })?
            .to_string();
        let url = format!("ext://{id}/");

        self.extensions.lock().push(path.to_path_buf());
        self.workers.install_script(&url, background);
        if self.defer_extension_registration.load(Ordering::SeqCst) {
            self.workers.defer_registration(&url);
        }
        debug!(context = %self.context_id, url = %url, "Extension loaded");
        Ok(Extension { id, url })
    }

    fn service_workers(&self) -> Arc<dyn WorkerRegistry> {
        self.workers.clone()
    }

    fn on_transport(&self, listener: TransportListener) {
        self.transport.subscribe(listener);
    }
}
