//! # Self-Exclusion Flows
//!
//! 1. Sends to the privileged worker never produce events; sends to any
//!    other worker always do
//! 2. Fetching the log does not record the fetch
//! 3. Ignored channels reach handlers raw and are never recorded
//! 4. Application code clearing the bus cannot detach the engine

#[cfg(test)]
mod tests {
    use super::super::{within, Harness, PRIVILEGED_SCOPE};
    use iw_runtime::InstallOptions;
    use parking_lot::Mutex;
    use serde_json::json;
    use shared_bus::{CoordinatorBus, Handler, HostApp, RequesterBus, ServiceWorker, WorkerRegistry};
    use shared_types::{Direction, Payload, RELAY_CHANNELS, RENDER_EVENT_CHANNEL};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_privileged_worker_sends_are_not_recorded() {
        let harness = Harness::with_defaults().await;
        let workers = harness.session.workers();
        let privileged = workers.find_by_scope(PRIVILEGED_SCOPE).unwrap();
        let app = workers.spawn("ext://app/").unwrap();

        for version_id in [privileged.version_id(), app.version_id()] {
            workers
                .get_worker_from_version_id(version_id)
                .unwrap()
                .send("app:hello", vec![json!(version_id)]);
        }

        let events = within(harness.events_on("app:hello")).await;
        assert_eq!(events.len(), 1);
        assert_eq!(
            events[0].event.worker_details.as_ref().map(|d| d.scope.as_str()),
            Some("ext://app/")
        );
    }

    #[tokio::test]
    async fn test_fetching_is_not_recorded() {
        let harness = Harness::with_defaults().await;
        harness.frame().send("app:ping", vec![]);

        let first = within(harness.events()).await;
        let second = within(harness.events()).await;
        harness.watch.clear_events();
        let third = within(harness.events()).await;

        assert_eq!(first.len(), 1);
        assert_eq!(first, second);
        assert!(third.is_empty());
        for event in first {
            assert!(!RELAY_CHANNELS.contains(&event.event.channel.as_str()));
        }
    }

    #[tokio::test]
    async fn test_ignored_channel_is_raw_and_unrecorded() {
        let harness = Harness::installed(InstallOptions::default().with_ignored_channel("raw:rpc")).await;
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        harness
            .host
            .coordinator_bus()
            .handle(
                "raw:rpc",
                Handler::new(move |_, args| {
                    sink.lock().push(args.to_vec());
                    Ok(json!("ok"))
                }),
            )
            .unwrap();

        let reply = harness.frame().invoke("raw:rpc", vec![json!(1)]).await;

        assert_eq!(reply, Ok(json!("ok")));
        let received = seen.lock().clone();
        assert_eq!(received, vec![vec![json!(1)]]);
        assert!(!Payload::is_envelope(&received[0]));
        assert!(within(harness.events_on("raw:rpc")).await.is_empty());
    }

    #[tokio::test]
    async fn test_clearing_all_listeners_keeps_requester_reports() {
        let harness = Harness::with_defaults().await;
        let bus = harness.host.coordinator_bus();
        bus.handle("app:sum", Handler::new(|_, _| Ok(json!(7)))).unwrap();

        bus.remove_all_listeners(None);
        bus.remove_all_listeners(Some(RENDER_EVENT_CHANNEL));
        let reply = harness.frame().invoke("app:sum", vec![json!(7)]).await;

        assert_eq!(reply, Ok(json!(7)));
        let directions: Vec<_> = within(harness.events_on("app:sum"))
            .await
            .into_iter()
            .map(|e| e.event.direction)
            .collect();
        assert_eq!(
            directions,
            vec![Direction::RequesterToCoordinator, Direction::CoordinatorToRequester]
        );
    }
}
