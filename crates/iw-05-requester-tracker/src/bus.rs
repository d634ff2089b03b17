//! # Tracked Requester Bus
//!
//! Decorator over a front-end context's bus.
//!
//! - `invoke` / `send_sync` travel inside a correlated envelope. The reply
//!   is recorded as a `coordinator-to-requester` response carrying the same
//!   token and the round-trip time; the request half is recorded by the
//!   coordinator's transport tap, so the two meet in the log.
//! - `send` is forwarded as-is.
//! - Deliveries to `on` / `once` listeners are recorded (as `on`) before the
//!   listener runs, and removals that remove something are recorded as
//!   `requester-local` events.

use async_trait::async_trait;
use iw_02_interceptor::ListenerRegistry;
use serde_json::Value;
use shared_bus::{Listener, ListenerKey, RequesterBus};
use shared_types::{
    BusError, CorrelationToken, Direction, EventSink, ExcludedChannels, IpcEvent, Method, Payload,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Instant;
use tracing::debug;

pub struct TrackedRequesterBus {
    inner: Arc<dyn RequesterBus>,
    sink: Arc<dyn EventSink>,
    excluded: ExcludedChannels,
    registry: Arc<ListenerRegistry>,
}

impl TrackedRequesterBus {
    #[must_use]
    pub fn new(inner: Arc<dyn RequesterBus>, sink: Arc<dyn EventSink>, excluded: ExcludedChannels) -> Self {
        Self {
            inner,
            sink,
            excluded,
            registry: Arc::new(ListenerRegistry::new()),
        }
    }

    #[must_use]
    pub fn registry(&self) -> &ListenerRegistry {
        &self.registry
    }

    fn track_response(&self, channel: &str, reply: &Value, method: Method, token: CorrelationToken, started: Instant) {
        let elapsed = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        let event = IpcEvent::capture(Direction::CoordinatorToRequester, channel, vec![reply.clone()])
            .with_method(method)
            .with_token(token)
            .with_response_time(elapsed);
        self.sink.track(event);
    }

    fn recording(&self, channel: &str, listener: Listener) -> Listener {
        let sink = self.sink.clone();
        let channel = channel.to_string();
        Listener::new(move |event, args| {
            sink.track(
                IpcEvent::capture(Direction::CoordinatorToRequester, channel.clone(), args.to_vec())
                    .with_method(Method::On),
            );
            listener.call(event, args);
        })
    }

    fn unsubscribe(&self, channel: &str, listener: &Listener, method: Method) {
        if self.excluded.contains(channel) {
            self.inner.remove_listener(channel, listener);
            return;
        }
        match self.registry.pop_listener(channel, listener.key()) {
            Some(wrapper) => {
                self.inner.remove_listener(channel, &wrapper);
                track_local(&*self.sink, channel, method);
            }
            None => self.inner.remove_listener(channel, listener),
        }
    }
}

fn track_local(sink: &dyn EventSink, channel: &str, method: Method) {
    debug!(channel = %channel, method = %method, "Tracking requester removal");
    sink.track(IpcEvent::lifecycle(Direction::RequesterLocal, channel, method));
}

#[async_trait]
impl RequesterBus for TrackedRequesterBus {
    fn send(&self, channel: &str, args: Vec<Value>) {
        self.inner.send(channel, args);
    }

    async fn invoke(&self, channel: &str, args: Vec<Value>) -> Result<Value, BusError> {
        if self.excluded.contains(channel) {
            return self.inner.invoke(channel, args).await;
        }
        let token = CorrelationToken::new();
        let started = Instant::now();
        let reply = self.inner.invoke(channel, Payload::wrap(args, token)).await;
        match &reply {
            Ok(value) => self.track_response(channel, value, Method::InvokeResponse, token, started),
            Err(e) => debug!(channel = %channel, error = %e, "Invoke failed, no response recorded"),
        }
        reply
    }

    fn send_sync(&self, channel: &str, args: Vec<Value>) -> Value {
        if self.excluded.contains(channel) {
            return self.inner.send_sync(channel, args);
        }
        let token = CorrelationToken::new();
        let started = Instant::now();
        let reply = self.inner.send_sync(channel, Payload::wrap(args, token));
        self.track_response(channel, &reply, Method::SendSyncResponse, token, started);
        reply
    }

    fn on(&self, channel: &str, listener: Listener) {
        if self.excluded.contains(channel) {
            self.inner.on(channel, listener);
            return;
        }
        let original = listener.key();
        let wrapper = self.recording(channel, listener);
        self.registry.push_listener(channel, original, wrapper.clone());
        self.inner.on(channel, wrapper);
    }

    fn once(&self, channel: &str, listener: Listener) {
        if self.excluded.contains(channel) {
            self.inner.once(channel, listener);
            return;
        }

        let original = listener.key();
        let recorded = self.recording(channel, listener);
        let own_key: Arc<OnceLock<ListenerKey>> = Arc::new(OnceLock::new());
        let fired = AtomicBool::new(false);
        let wrapper = {
            let inner = self.inner.clone();
            let sink = self.sink.clone();
            let registry = self.registry.clone();
            let channel = channel.to_string();
            let own_key = own_key.clone();
            Listener::new(move |event, args| {
                if fired.swap(true, Ordering::SeqCst) {
                    return;
                }
                recorded.call(event, args);
                let me = own_key
                    .get()
                    .and_then(|key| registry.take_listener(&channel, original, *key));
                if let Some(me) = me {
                    inner.remove_listener(&channel, &me);
                    track_local(&*sink, &channel, Method::RemoveListener);
                }
            })
        };
        let _ = own_key.set(wrapper.key());

        self.registry.push_listener(channel, original, wrapper.clone());
        self.inner.on(channel, wrapper);
    }

    fn off(&self, channel: &str, listener: &Listener) {
        self.unsubscribe(channel, listener, Method::Off);
    }

    fn remove_listener(&self, channel: &str, listener: &Listener) {
        self.unsubscribe(channel, listener, Method::RemoveListener);
    }

    fn remove_all_listeners(&self, channel: Option<&str>) {
        match channel {
            Some(channel) if self.excluded.contains(channel) => {
                self.inner.remove_all_listeners(Some(channel));
            }
            Some(channel) => {
                let had_listeners = self.inner.listener_count(channel) > 0;
                self.registry.drain_channel(channel);
                self.inner.remove_all_listeners(Some(channel));
                if had_listeners {
                    track_local(&*self.sink, channel, Method::RemoveAllListeners);
                }
            }
            None => {
                let channels = self.registry.drain_all();
                self.inner.remove_all_listeners(None);
                for channel in channels {
                    track_local(&*self.sink, &channel, Method::RemoveAllListeners);
                }
            }
        }
    }

    fn listener_count(&self, channel: &str) -> usize {
        self.inner.listener_count(channel)
    }
}
