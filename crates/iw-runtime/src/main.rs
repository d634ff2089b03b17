//! # ipcwatch Demo
//!
//! Runs a small scripted exchange against the in-memory host with the
//! engine installed, then prints the captured log as JSON.
//!
//! ## Exchange
//!
//! 1. front-end `send` to a coordinator listener
//! 2. front-end `invoke` round trip (correlated)
//! 3. front-end `send_sync` round trip (correlated)
//! 4. coordinator send to an application worker
//! 5. coordinator listener removal

use std::sync::Arc;

use anyhow::{Context, Result};
use serde_json::{json, Value};
use tracing::info;

use iw_runtime::{InstallOptions, IpcWatch};
use iw_telemetry::{init_telemetry, TelemetryConfig};
use shared_bus::{
    CoordinatorBus, Handler, HostApp, InMemoryHost, Listener, RequesterBus, ServiceWorker, WorkerRegistry,
};
use shared_types::ContextId;

const APP_WORKER_SCOPE: &str = "ext://demo-app/";

#[tokio::main]
async fn main() -> Result<()> {
    let _telemetry = init_telemetry(&TelemetryConfig::from_env())?;

    let host = Arc::new(InMemoryHost::ready());
    let options = InstallOptions::from_env();
    let watch = IpcWatch::new(host.clone());
    watch.install(options.clone()).await;

    let session = host
        .session(&ContextId::default_context())
        .context("default context missing")?;

    // Application code registers on whatever bus the host hands out.
    let bus = host.coordinator_bus();
    let ping = Listener::new(|_, args| info!(?args, "app:ping received"));
    bus.on("app:ping", ping.clone());
    bus.on(
        "app:sync",
        Listener::new(|event, _| event.set_return_value(json!("pong"))),
    );
    bus.handle(
        "app:sum",
        Handler::new(|_, args| Ok(json!(args.iter().filter_map(Value::as_i64).sum::<i64>()))),
    )?;

    let frame = IpcWatch::instrument_requester(Arc::new(session.open_frame()), &options);
    frame.send("app:ping", vec![json!("hello")]);
    let sum = frame.invoke("app:sum", vec![json!(2), json!(3)]).await?;
    let sync = frame.send_sync("app:sync", vec![]);
    info!(%sum, %sync, "Round trips complete");

    let app_worker = session.workers().spawn(APP_WORKER_SCOPE)?;
    session
        .workers()
        .get_worker_from_version_id(app_worker.version_id())
        .context("application worker vanished")?
        .send("app:notify", vec![json!({"status": "ready"})]);

    bus.remove_listener("app:ping", &ping);

    let events = watch.get_events().await;
    println!("{}", serde_json::to_string_pretty(&events)?);
    Ok(())
}
