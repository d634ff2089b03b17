//! # Event Relay
//!
//! The coordinating process's forwarding reference to the canonical log.
//! Captured events go to the privileged worker as `render-event` messages;
//! nothing is retained here once forwarded.
//!
//! ```text
//! [Starting] ──mark_ready(worker)──▶ [Ready]
//!     │                                 │
//!     └─ events held in a bounded       └─ events sent immediately
//!        backlog, flushed on ready
//! ```

use crate::error::RelayError;
use parking_lot::{Mutex, RwLock};
use shared_bus::{Listener, ServiceWorker};
use shared_types::{
    CodecError, ContextId, EventSink, IndexedIpcEvent, IpcEvent, RelayMessage, IPC_EVENTS_CHANNEL,
};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

/// Events held while the privileged worker is still starting.
pub const STARTUP_BACKLOG: usize = 1_000;

/// Startup state of the privileged worker as seen by the relay.
#[derive(Clone)]
pub enum RelayState {
    Starting,
    Ready(Arc<dyn ServiceWorker>),
}

impl RelayState {
    #[must_use]
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }
}

pub struct EventRelay {
    context_id: ContextId,
    state: RwLock<RelayState>,
    backlog: Mutex<VecDeque<IpcEvent>>,
}

impl EventRelay {
    #[must_use]
    pub fn new(context_id: ContextId) -> Self {
        Self {
            context_id,
            state: RwLock::new(RelayState::Starting),
            backlog: Mutex::new(VecDeque::new()),
        }
    }

    #[must_use]
    pub fn context_id(&self) -> &ContextId {
        &self.context_id
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.state.read().is_ready()
    }

    #[must_use]
    pub fn backlog_len(&self) -> usize {
        self.backlog.lock().len()
    }

    /// Flush the backlog to `worker` and switch to `Ready`.
    ///
    /// The state lock is held until the backlog is out, so a concurrent
    /// `forward` cannot overtake older events.
    pub fn mark_ready(&self, worker: Arc<dyn ServiceWorker>) {
        let mut state = self.state.write();
        let backlog: Vec<_> = self.backlog.lock().drain(..).collect();
        info!(
            context = %self.context_id,
            scope = %worker.scope(),
            flushed = backlog.len(),
            "Privileged worker ready"
        );
        for event in backlog {
            if let Err(e) = send(&*worker, RelayMessage::RenderEvent(event)) {
                warn!(error = %e, "Dropping event that failed to encode");
            }
        }
        *state = RelayState::Ready(worker);
    }

    /// Send `event` to the log, or hold it until the worker is ready.
    ///
    /// # Errors
    ///
    /// `RelayError::Codec` if the event cannot be encoded.
    pub fn forward(&self, event: IpcEvent) -> Result<(), RelayError> {
        let worker = match &*self.state.read() {
            RelayState::Ready(worker) => worker.clone(),
            RelayState::Starting => {
                let mut backlog = self.backlog.lock();
                if backlog.len() >= STARTUP_BACKLOG {
                    backlog.pop_front();
                }
                backlog.push_back(event);
                return Ok(());
            }
        };
        send(&*worker, RelayMessage::RenderEvent(event))
    }

    /// Ask the privileged worker for its current window.
    ///
    /// # Errors
    ///
    /// `RelayError::NotReady` before startup completed,
    /// `RelayError::ReplyDropped` if no reply arrives, or a decode failure.
    pub async fn fetch_events(&self) -> Result<Vec<IndexedIpcEvent>, RelayError> {
        let worker = self.ready_worker()?;

        let (tx, rx) = oneshot::channel::<Result<Vec<IndexedIpcEvent>, CodecError>>();
        let tx = Mutex::new(Some(tx));
        // Registered before the request goes out: the reply may arrive
        // during `send`.
        worker.ipc().once(
            IPC_EVENTS_CHANNEL,
            Listener::new(move |_, args| {
                let decoded = match RelayMessage::from_wire(IPC_EVENTS_CHANNEL, args) {
                    Ok(Some(RelayMessage::IpcEvents(events))) => Ok(events),
                    Ok(_) => Ok(Vec::new()),
                    Err(e) => Err(e),
                };
                if let Some(tx) = tx.lock().take() {
                    let _ = tx.send(decoded);
                }
            }),
        );
        send(&*worker, RelayMessage::GetIpcEvents)?;

        let events = rx.await.map_err(|_| RelayError::ReplyDropped)??;
        debug!(count = events.len(), "Fetched events from privileged worker");
        Ok(events)
    }

    /// Reset the canonical log.
    ///
    /// # Errors
    ///
    /// `RelayError::NotReady` before startup completed.
    pub fn clear_events(&self) -> Result<(), RelayError> {
        let worker = self.ready_worker()?;
        send(&*worker, RelayMessage::ClearEvents)
    }

    fn ready_worker(&self) -> Result<Arc<dyn ServiceWorker>, RelayError> {
        match &*self.state.read() {
            RelayState::Ready(worker) => Ok(worker.clone()),
            RelayState::Starting => Err(RelayError::NotReady),
        }
    }
}

fn send(worker: &dyn ServiceWorker, message: RelayMessage) -> Result<(), RelayError> {
    let (channel, args) = message.into_wire()?;
    worker.send(channel, args);
    Ok(())
}

impl EventSink for EventRelay {
    fn track(&self, event: IpcEvent) {
        if let Err(e) = self.forward(event) {
            warn!(context = %self.context_id, error = %e, "Failed to relay event");
        }
    }
}
