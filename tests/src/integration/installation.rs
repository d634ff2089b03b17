//! # Installation Flows
//!
//! 1. Installing twice changes nothing the second time
//! 2. Every context is installed independently and exactly once
//! 3. Queries before install are empty, never errors

#[cfg(test)]
mod tests {
    use super::super::{eventually, Harness, PRIVILEGED_SCOPE};
    use iw_runtime::{InstallOptions, InstallationState, IpcWatch};
    use shared_bus::{HostApp, InMemoryHost};
    use shared_types::ContextId;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_install_twice_applies_once() {
        let harness = Harness::with_defaults().await;
        let bus = harness.host.coordinator_bus();

        harness.watch.install(InstallOptions::default()).await;

        assert!(Arc::ptr_eq(&bus, &harness.host.coordinator_bus()));
        assert_eq!(harness.session.preload_scripts().len(), 2);
        assert_eq!(harness.session.loaded_extensions().len(), 1);
        assert_eq!(harness.watch.state().installed_contexts(), 1);
    }

    #[tokio::test]
    async fn test_partitions_install_independently() {
        let harness = Harness::with_defaults().await;
        let partition = ContextId::partition("persist:docs");

        let session = harness.host.from_partition(&partition);
        eventually(|| harness.watch.context(&partition).is_some()).await;
        harness.host.from_partition(&partition);
        harness.watch.install_context(session.clone()).await;

        assert_eq!(session.preload_scripts().len(), 2);
        assert_eq!(session.loaded_extensions().len(), 1);
        assert_eq!(harness.session.loaded_extensions().len(), 1);
        assert!(session.workers().find_by_scope(PRIVILEGED_SCOPE).is_some());
        assert_eq!(harness.watch.state().installed_contexts(), 2);
    }

    #[tokio::test]
    async fn test_shared_state_blocks_second_engine() {
        let host = Arc::new(InMemoryHost::ready());
        let state = Arc::new(InstallationState::new());
        let first = IpcWatch::with_state(host.clone(), state.clone());
        let second = IpcWatch::with_state(host.clone(), state);

        first.install(InstallOptions::default()).await;
        let bus = host.coordinator_bus();
        second.install(InstallOptions::default()).await;

        assert!(Arc::ptr_eq(&bus, &host.coordinator_bus()));
        assert!(second.context(&ContextId::default_context()).is_none());
    }

    #[tokio::test]
    async fn test_queries_before_install_are_empty() {
        let host = Arc::new(InMemoryHost::ready());
        let watch = IpcWatch::new(host);

        assert!(watch.get_events().await.is_empty());
        assert!(watch
            .get_context_events(&ContextId::default_context())
            .await
            .is_empty());
        watch.clear_events();
    }
}
