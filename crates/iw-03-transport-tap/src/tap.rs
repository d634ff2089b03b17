//! # Transport Tap
//!
//! Subscribes to a session's transport signals and records every inbound
//! message, whichever primitive (if any) ends up handling it. This is the
//! only place inbound direction is decided:
//!
//! | Sender | Direction |
//! |--------|-----------|
//! | front-end context | `requester-to-coordinator` |
//! | worker context | `worker-to-coordinator` (with worker details) |
//! | coordinator | not recorded |
//!
//! Relay channels, excluded channels and the privileged worker itself are
//! never recorded.
//!
//! Front-end contexts report their own events as `render-event` messages.
//! Those are not traffic: the tap unpacks them into the sink of the context
//! they were sent from, so both halves of a round trip land in one log.

use shared_bus::{SenderKind, Session, TransportEvent, TransportListener};
use shared_types::{
    Direction, EventSink, ExcludedChannels, IpcEvent, RelayMessage, WorkerDetails, RENDER_EVENT_CHANNEL,
};
use std::sync::Arc;
use tracing::{trace, warn};

pub struct TransportTap {
    sink: Arc<dyn EventSink>,
    excluded: ExcludedChannels,
    privileged_scope: Option<String>,
}

impl TransportTap {
    #[must_use]
    pub fn new(sink: Arc<dyn EventSink>, excluded: ExcludedChannels) -> Self {
        Self {
            sink,
            excluded,
            privileged_scope: None,
        }
    }

    /// Ignore everything sent by the worker registered under `scope`.
    #[must_use]
    pub fn with_privileged_scope(mut self, scope: impl Into<String>) -> Self {
        self.privileged_scope = Some(scope.into());
        self
    }

    /// Subscribe to `session`'s transport signals.
    pub fn attach(self: &Arc<Self>, session: &dyn Session) {
        session.on_transport(self.listener());
    }

    #[must_use]
    pub fn listener(self: &Arc<Self>) -> TransportListener {
        let tap = Arc::clone(self);
        Arc::new(move |event| tap.observe(event))
    }

    /// Classify and record one transport event.
    pub fn observe(&self, event: &TransportEvent) {
        if event.channel == RENDER_EVENT_CHANNEL {
            self.forward_reported(event);
            return;
        }
        if let Some(captured) = self.classify(event) {
            self.sink.track(captured);
        }
    }

    /// The event that `observe` would record, if any.
    #[must_use]
    pub fn classify(&self, event: &TransportEvent) -> Option<IpcEvent> {
        if self.excluded.contains(&event.channel) {
            trace!(channel = %event.channel, "Skipping excluded channel");
            return None;
        }

        match &event.sender {
            SenderKind::Frame { .. } => Some(IpcEvent::capture(
                Direction::RequesterToCoordinator,
                event.channel.clone(),
                event.args.clone(),
            )),
            SenderKind::Worker { scope, .. } if self.is_privileged(scope) => {
                trace!(channel = %event.channel, "Skipping privileged worker traffic");
                None
            }
            SenderKind::Worker { scope, version_id } => Some(
                IpcEvent::capture(
                    Direction::WorkerToCoordinator,
                    event.channel.clone(),
                    event.args.clone(),
                )
                .with_worker(WorkerDetails {
                    version_id: *version_id,
                    scope: scope.clone(),
                }),
            ),
            SenderKind::Coordinator => None,
        }
    }

    fn forward_reported(&self, event: &TransportEvent) {
        if !matches!(event.sender, SenderKind::Frame { .. }) {
            return;
        }
        match RelayMessage::from_wire(RENDER_EVENT_CHANNEL, &event.args) {
            Ok(Some(RelayMessage::RenderEvent(reported))) => self.sink.track(reported),
            Ok(_) => {}
            Err(e) => warn!(error = %e, "Dropping malformed requester event"),
        }
    }

    fn is_privileged(&self, scope: &str) -> bool {
        self.privileged_scope.as_deref() == Some(scope)
    }
}
