//! # Correlation Flows
//!
//! 1. Requester `invoke` / `send_sync` pairs are linked in the log
//! 2. Coordinator handlers never see the envelope
//! 3. Worker traffic carries the worker's identity
//! 4. Removals are reported once, unknown removals never

#[cfg(test)]
mod tests {
    use super::super::{within, Harness};
    use iw_runtime::{InstallOptions, IpcWatch};
    use parking_lot::Mutex;
    use serde_json::{json, Value};
    use shared_bus::{
        CoordinatorBus, Handler, HostApp, InMemoryHost, Listener, RequesterBus, ServiceWorker, WorkerPort,
        WorkerRegistry,
    };
    use shared_types::{Direction, IndexedIpcEvent, Method};
    use std::sync::Arc;

    fn assert_linked(a: &IndexedIpcEvent, b: &IndexedIpcEvent) {
        assert_eq!(a.linked_serial_number, Some(b.serial_number));
        assert_eq!(b.linked_serial_number, Some(a.serial_number));
    }

    #[tokio::test]
    async fn test_invoke_round_trip_is_linked() {
        let harness = Harness::with_defaults().await;
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        harness
            .host
            .coordinator_bus()
            .handle(
                "app:sum",
                Handler::new(move |_, args| {
                    sink.lock().push(args.to_vec());
                    Ok(json!(args.iter().filter_map(Value::as_i64).sum::<i64>()))
                }),
            )
            .unwrap();

        let reply = harness.frame().invoke("app:sum", vec![json!(2), json!(3)]).await;

        assert_eq!(reply, Ok(json!(5)));
        assert_eq!(*seen.lock(), vec![vec![json!(2), json!(3)]]);

        let events = within(harness.events_on("app:sum")).await;
        assert_eq!(events.len(), 2);
        let (request, response) = (&events[0], &events[1]);
        assert_eq!(request.event.direction, Direction::RequesterToCoordinator);
        assert_eq!(request.event.args, vec![json!(2), json!(3)]);
        assert_eq!(response.event.direction, Direction::CoordinatorToRequester);
        assert_eq!(response.event.method, Some(Method::InvokeResponse));
        assert_eq!(response.event.args, vec![json!(5)]);
        assert!(response.event.response_time_ms.is_some());
        assert_eq!(request.event.correlation_token, response.event.correlation_token);
        assert_linked(request, response);
    }

    #[tokio::test]
    async fn test_send_sync_round_trip_is_linked() {
        let harness = Harness::with_defaults().await;
        harness.host.coordinator_bus().on(
            "app:sync",
            Listener::new(|event, args| event.set_return_value(json!({ "echo": args }))),
        );

        let reply = harness.frame().send_sync("app:sync", vec![json!("x")]);

        assert_eq!(reply, json!({ "echo": ["x"] }));
        let events = within(harness.events_on("app:sync")).await;
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].event.method, Some(Method::SendSyncResponse));
        assert_linked(&events[0], &events[1]);
    }

    #[tokio::test]
    async fn test_fire_and_forget_has_no_token() {
        let harness = Harness::with_defaults().await;

        harness.frame().send("app:ping", vec![json!(1)]);

        let events = within(harness.events_on("app:ping")).await;
        assert_eq!(events.len(), 1);
        assert!(events[0].event.correlation_token.is_none());
        assert!(events[0].linked_serial_number.is_none());
    }

    #[tokio::test]
    async fn test_worker_traffic_both_ways() {
        let harness = Harness::with_defaults().await;
        let workers = harness.session.workers();
        let app = workers.spawn("ext://app/").unwrap();

        workers
            .get_worker_from_version_id(app.version_id())
            .unwrap()
            .send("app:notify", vec![json!("down")]);
        app.post("app:status", vec![json!("up")]);

        let down = within(harness.events_on("app:notify")).await;
        assert_eq!(down.len(), 1);
        assert_eq!(down[0].event.direction, Direction::CoordinatorToWorker);
        let details = down[0].event.worker_details.clone().unwrap();
        assert_eq!(details.scope, "ext://app/");
        assert_eq!(details.version_id, app.version_id());

        let up = within(harness.events_on("app:status")).await;
        assert_eq!(up.len(), 1);
        assert_eq!(up[0].event.direction, Direction::WorkerToCoordinator);
        assert_eq!(up[0].event.worker_details, Some(details));
    }

    #[tokio::test]
    async fn test_worker_handles_taken_before_install_are_tracked() {
        let host = Arc::new(InMemoryHost::new());
        let session = host.mark_ready();
        let app = session.workers().spawn("ext://app/").unwrap();
        let early = session.workers().get_worker_from_version_id(app.version_id()).unwrap();

        let watch = IpcWatch::new(host.clone());
        watch.install(InstallOptions::default()).await;
        early.send("app:notify", vec![json!(1)]);
        app.send("app:notify", vec![json!(2)]);

        let sent: Vec<_> = within(watch.get_events())
            .await
            .into_iter()
            .filter(|e| e.event.channel == "app:notify")
            .map(|e| (e.event.direction, e.event.args))
            .collect();
        assert_eq!(
            sent,
            vec![
                (Direction::CoordinatorToWorker, vec![json!(1)]),
                (Direction::CoordinatorToWorker, vec![json!(2)]),
            ]
        );
    }

    #[tokio::test]
    async fn test_register_invoke_remove_emits_one_removal() {
        let harness = Harness::with_defaults().await;
        let bus = harness.host.coordinator_bus();
        let listener = Listener::new(|_, _| {});
        bus.on("app:tick", listener.clone());

        harness.frame().send("app:tick", vec![]);
        bus.remove_listener("app:tick", &listener);
        bus.remove_listener("app:tick", &listener);
        bus.off("app:tick", &Listener::new(|_, _| {}));

        assert_eq!(harness.host.real_bus().listener_count("app:tick"), 0);
        let removals: Vec<_> = within(harness.events_on("app:tick"))
            .await
            .into_iter()
            .filter(|e| e.event.direction == Direction::CoordinatorLocal)
            .collect();
        assert_eq!(removals.len(), 1);
        assert_eq!(removals[0].event.method, Some(Method::RemoveListener));
        assert!(removals[0].event.args.is_empty());
    }

    #[tokio::test]
    async fn test_requester_once_delivery_and_removal() {
        let harness = Harness::with_defaults().await;
        let raw = Arc::new(harness.session.open_frame());
        let frame = IpcWatch::instrument_requester(raw.clone(), &harness.options);
        frame.once("app:push", Listener::new(|_, _| {}));

        raw.emit("app:push", &[json!(1)]);
        raw.emit("app:push", &[json!(2)]);

        let events = within(harness.events_on("app:push")).await;
        let kinds: Vec<_> = events
            .iter()
            .map(|e| (e.event.direction, e.event.method))
            .collect();
        assert_eq!(
            kinds,
            vec![
                (Direction::CoordinatorToRequester, Some(Method::On)),
                (Direction::RequesterLocal, Some(Method::RemoveListener)),
            ]
        );
    }
}
