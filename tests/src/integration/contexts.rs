//! # Multi-Context Flows
//!
//! 1. A round trip is logged, linked, in the context its frame belongs to
//! 2. Coordinator-local events stay in the default context's log once
//!    partitions are ready

#[cfg(test)]
mod tests {
    use super::super::{eventually, within, Harness};
    use iw_runtime::IpcWatch;
    use serde_json::{json, Value};
    use shared_bus::{CoordinatorBus, Handler, HostApp, Listener, RequesterBus};
    use shared_types::{ContextId, Direction, Method};
    use std::sync::Arc;

    async fn with_ready_partition(name: &str) -> (Harness, ContextId) {
        let harness = Harness::with_defaults().await;
        let partition = ContextId::partition(name);
        harness.host.from_partition(&partition);
        eventually(|| {
            harness
                .watch
                .context(&partition)
                .is_some_and(|installed| installed.relay().is_ready())
        })
        .await;
        (harness, partition)
    }

    #[tokio::test]
    async fn test_round_trips_stay_in_the_sending_context() {
        let (harness, partition) = with_ready_partition("persist:docs").await;
        harness
            .host
            .coordinator_bus()
            .handle(
                "app:sum",
                Handler::new(|_, args| Ok(json!(args.iter().filter_map(Value::as_i64).sum::<i64>()))),
            )
            .unwrap();
        let docs = harness.host.session(&partition).unwrap();
        let docs_frame = IpcWatch::instrument_requester(Arc::new(docs.open_frame()), &harness.options);

        assert_eq!(harness.frame().invoke("app:sum", vec![json!(1), json!(2)]).await, Ok(json!(3)));
        assert_eq!(docs_frame.invoke("app:sum", vec![json!(10)]).await, Ok(json!(10)));

        for (context, request_args) in [
            (Harness::default_context(), vec![json!(1), json!(2)]),
            (partition, vec![json!(10)]),
        ] {
            let events: Vec<_> = within(harness.watch.get_context_events(&context))
                .await
                .into_iter()
                .filter(|e| e.event.channel == "app:sum")
                .collect();
            assert_eq!(events.len(), 2, "context {context}");
            let (request, response) = (&events[0], &events[1]);
            assert_eq!(request.event.direction, Direction::RequesterToCoordinator);
            assert_eq!(request.event.args, request_args);
            assert_eq!(response.event.direction, Direction::CoordinatorToRequester);
            assert_eq!(response.event.method, Some(Method::InvokeResponse));
            assert_eq!(request.linked_serial_number, Some(response.serial_number));
            assert_eq!(response.linked_serial_number, Some(request.serial_number));
        }

        assert_eq!(within(harness.events_on("app:sum")).await.len(), 2);
    }

    #[tokio::test]
    async fn test_removals_go_to_the_default_log() {
        let (harness, partition) = with_ready_partition("persist:mail").await;
        let bus = harness.host.coordinator_bus();
        let listener = Listener::new(|_, _| {});
        bus.on("app:tick", listener.clone());
        bus.remove_listener("app:tick", &listener);

        let removals = within(harness.events_on("app:tick")).await;
        assert_eq!(removals.len(), 1);
        assert_eq!(removals[0].event.direction, Direction::CoordinatorLocal);
        let elsewhere = within(harness.watch.get_context_events(&partition)).await;
        assert!(elsewhere.iter().all(|e| e.event.channel != "app:tick"));
    }
}
