//! # Relay Routing
//!
//! Each installed context owns an `EventRelay` to its own privileged
//! worker. Context traffic (transport, worker sends, requester reports)
//! goes straight to that context's relay. Only events of the process-wide
//! interception layer come through here; they go to the primary relay:
//! the default context's once it is installed, otherwise the first one
//! registered.

use iw_04_relay::EventRelay;
use parking_lot::RwLock;
use shared_types::{ContextId, EventSink, IpcEvent};
use std::sync::Arc;
use tracing::debug;

#[derive(Default)]
pub struct ActiveRelay {
    relays: RwLock<Vec<Arc<EventRelay>>>,
}

impl ActiveRelay {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, relay: Arc<EventRelay>) {
        self.relays.write().push(relay);
    }

    /// The relay process-wide events and `get_events` use.
    #[must_use]
    pub fn primary(&self) -> Option<Arc<EventRelay>> {
        let relays = self.relays.read();
        relays
            .iter()
            .find(|r| r.context_id().is_default())
            .or_else(|| relays.first())
            .cloned()
    }

    /// The relay of one context.
    #[must_use]
    pub fn for_context(&self, context_id: &ContextId) -> Option<Arc<EventRelay>> {
        self.relays
            .read()
            .iter()
            .find(|r| r.context_id() == context_id)
            .cloned()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.relays.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.relays.read().is_empty()
    }
}

impl EventSink for ActiveRelay {
    fn track(&self, event: IpcEvent) {
        match self.primary() {
            Some(relay) => relay.track(event),
            None => debug!(channel = %event.channel, "No context installed, event dropped"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use iw_01_event_log::EventLogService;
    use serde_json::json;
    use shared_bus::InMemoryWorkerRegistry;
    use shared_types::{Direction, Method};

    fn relay(context_id: ContextId) -> Arc<EventRelay> {
        Arc::new(EventRelay::new(context_id))
    }

    fn removal() -> IpcEvent {
        IpcEvent::lifecycle(Direction::CoordinatorLocal, "ping", Method::RemoveListener)
    }

    #[test]
    fn test_backlogs_into_first_relay_without_default() {
        let routing = ActiveRelay::new();
        let first = relay(ContextId::partition("a"));
        let second = relay(ContextId::partition("b"));
        routing.register(first.clone());
        routing.register(second.clone());

        routing.track(removal());

        assert_eq!(first.backlog_len(), 1);
        assert_eq!(second.backlog_len(), 0);
    }

    #[tokio::test]
    async fn test_default_context_stays_primary() {
        let registry = InMemoryWorkerRegistry::default();
        registry.install_script("ext://ipcwatch/", Arc::new(EventLogService::new(10)));
        let worker = registry.spawn("ext://ipcwatch/").unwrap();

        let routing = ActiveRelay::new();
        let partition = relay(ContextId::partition("a"));
        let default = relay(ContextId::default_context());
        routing.register(partition.clone());
        routing.register(default.clone());
        partition.mark_ready(worker);

        routing.track(removal());

        assert!(Arc::ptr_eq(&routing.primary().unwrap(), &default));
        assert_eq!(default.backlog_len(), 1);
        assert!(partition.fetch_events().await.unwrap().is_empty());
    }

    #[test]
    fn test_for_context() {
        let routing = ActiveRelay::new();
        routing.register(relay(ContextId::partition("a")));
        assert!(routing.for_context(&ContextId::partition("a")).is_some());
        assert!(routing.for_context(&ContextId::partition("z")).is_none());
    }

    #[test]
    fn test_no_relay_drops_event() {
        let routing = ActiveRelay::new();
        routing.track(removal());
        assert!(routing.primary().is_none());
    }
}
