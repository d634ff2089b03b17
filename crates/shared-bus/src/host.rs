//! # Host Application
//!
//! Process-level surface: readiness, the default context, notifications
//! for new contexts, and the coordinator bus handed to application code.

use crate::coordinator::{CoordinatorBus, InMemoryCoordinatorBus};
use crate::session::{InMemorySession, Session};
use parking_lot::RwLock;
use shared_types::ContextId;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

pub type SessionListener = Arc<dyn Fn(Arc<dyn Session>) + Send + Sync>;

/// The hosting process.
pub trait HostApp: Send + Sync {
    /// Whether the process is past its ready state.
    fn is_ready(&self) -> bool;

    /// The default context, once the process is ready.
    fn default_session(&self) -> Option<Arc<dyn Session>>;

    /// Notify `listener` of every context created from now on.
    fn on_session_created(&self, listener: SessionListener);

    /// The coordinator bus application code registers on.
    fn coordinator_bus(&self) -> Arc<dyn CoordinatorBus>;

    /// Hand application code `bus` from now on.
    fn replace_coordinator_bus(&self, bus: Arc<dyn CoordinatorBus>);
}

/// In-process host with any number of sessions sharing one coordinator bus.
pub struct InMemoryHost {
    real_bus: Arc<InMemoryCoordinatorBus>,
    current_bus: RwLock<Arc<dyn CoordinatorBus>>,
    sessions: RwLock<HashMap<ContextId, Arc<InMemorySession>>>,
    listeners: RwLock<Vec<SessionListener>>,
}

impl InMemoryHost {
    #[must_use]
    pub fn new() -> Self {
        let real_bus = Arc::new(InMemoryCoordinatorBus::new());
        Self {
            current_bus: RwLock::new(real_bus.clone()),
            real_bus,
            sessions: RwLock::new(HashMap::new()),
            listeners: RwLock::new(Vec::new()),
        }
    }

    /// A host that is already past its ready state.
    #[must_use]
    pub fn ready() -> Self {
        let host = Self::new();
        host.mark_ready();
        host
    }

    /// Create the default context and announce it.
    pub fn mark_ready(&self) -> Arc<InMemorySession> {
        info!("Host ready");
        self.from_partition(&ContextId::default_context())
    }

    /// The context for `context_id`, created and announced on first use.
    pub fn from_partition(&self, context_id: &ContextId) -> Arc<InMemorySession> {
        if let Some(existing) = self.sessions.read().get(context_id) {
            return existing.clone();
        }

        let session = Arc::new(InMemorySession::new(context_id.clone(), self.real_bus.clone()));
        self.sessions
            .write()
            .insert(context_id.clone(), session.clone());

        let listeners = self.listeners.read().clone();
        for listener in listeners {
            listener(session.clone());
        }
        session
    }

    /// The context for `context_id` if it exists.
    #[must_use]
    pub fn session(&self, context_id: &ContextId) -> Option<Arc<InMemorySession>> {
        self.sessions.read().get(context_id).cloned()
    }

    /// The undecorated bus inbound traffic is dispatched on.
    #[must_use]
    pub fn real_bus(&self) -> &Arc<InMemoryCoordinatorBus> {
        &self.real_bus
    }
}

impl Default for InMemoryHost {
    fn default() -> Self {
        Self::new()
    }
}

impl HostApp for InMemoryHost {
    fn is_ready(&self) -> bool {
        self.sessions
            .read()
            .contains_key(&ContextId::default_context())
    }

    fn default_session(&self) -> Option<Arc<dyn Session>> {
        self.session(&ContextId::default_context())
            .map(|s| s as Arc<dyn Session>)
    }

    fn on_session_created(&self, listener: SessionListener) {
        self.listeners.write().push(listener);
    }

    fn coordinator_bus(&self) -> Arc<dyn CoordinatorBus> {
        self.current_bus.read().clone()
    }

    fn replace_coordinator_bus(&self, bus: Arc<dyn CoordinatorBus>) {
        *self.current_bus.write() = bus;
    }
}
