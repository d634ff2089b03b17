//! # Startup Race Flows
//!
//! The privileged worker's scope may still be registering when a context
//! is installed. Startup is retried once, on the matching
//! registration-completed notification, and events captured meanwhile are
//! delivered once it is ready.

#[cfg(test)]
mod tests {
    use super::super::{eventually, within, PRIVILEGED_SCOPE};
    use iw_runtime::{InstallOptions, IpcWatch};
    use serde_json::json;
    use shared_bus::{InMemoryHost, RequesterBus};
    use shared_types::ContextId;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_events_survive_deferred_startup() {
        let host = Arc::new(InMemoryHost::new());
        let session = host.mark_ready();
        session.defer_extension_registration(true);
        let watch = IpcWatch::new(host.clone());
        watch.install(InstallOptions::default()).await;

        session.open_frame().send("app:early", vec![json!(1)]);
        assert!(watch.get_events().await.is_empty());

        let installed = watch.context(&ContextId::default_context()).unwrap();
        assert!(installed.launcher().has_pending_retry());

        session.workers().complete_registration("ext://unrelated/");
        assert!(installed.launcher().has_pending_retry());

        session.workers().complete_registration(PRIVILEGED_SCOPE);
        eventually(|| installed.relay().is_ready()).await;

        assert!(!installed.launcher().has_pending_retry());
        assert_eq!(session.workers().registration_listener_count(), 0);
        let events = within(watch.get_events()).await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event.channel, "app:early");
    }

    #[tokio::test]
    async fn test_never_registered_scope_can_be_abandoned() {
        let host = Arc::new(InMemoryHost::new());
        let session = host.mark_ready();
        session.defer_extension_registration(true);
        let watch = IpcWatch::new(host.clone());
        watch.install(InstallOptions::default()).await;

        let installed = watch.context(&ContextId::default_context()).unwrap();
        assert!(installed.launcher().cancel());

        assert_eq!(session.workers().registration_listener_count(), 0);
        assert!(watch.get_events().await.is_empty());
    }
}
