//! # Intercepted Coordinator Bus
//!
//! Decorator implementing `CoordinatorBus` over the real bus. Application
//! code registers through it unchanged; every handler it installs on the
//! real bus first peels a correlation envelope, so instrumented code never
//! sees one.
//!
//! ## What Gets Recorded
//!
//! Only removals, as `coordinator-local` lifecycle events. Inbound traffic
//! itself is reported by the transport tap, so recording dispatch here would
//! double count it.
//!
//! | Call | Event | Condition |
//! |------|-------|-----------|
//! | `off` / `remove_listener` | `off` / `remove_listener` | a wrapper was tracked |
//! | `once` fires | `remove_listener` | first delivery only |
//! | `remove_all_listeners` | `remove_all_listeners` per channel | something was registered |
//! | `remove_handler` | `remove_handler` | a responder was tracked |
//! | `handle_once` fires | `remove_handler` | first call only |
//!
//! Excluded channels bypass all of this and go straight to the real bus.

use crate::registry::ListenerRegistry;
use shared_bus::{CoordinatorBus, Handler, Listener, ListenerKey};
use shared_types::{BusError, Direction, EventSink, ExcludedChannels, IpcEvent, Method, Payload};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use tracing::{debug, trace};

pub struct InterceptedBus {
    real: Arc<dyn CoordinatorBus>,
    sink: Arc<dyn EventSink>,
    excluded: ExcludedChannels,
    registry: Arc<ListenerRegistry>,
}

impl InterceptedBus {
    #[must_use]
    pub fn new(real: Arc<dyn CoordinatorBus>, sink: Arc<dyn EventSink>, excluded: ExcludedChannels) -> Self {
        Self {
            real,
            sink,
            excluded,
            registry: Arc::new(ListenerRegistry::new()),
        }
    }

    #[must_use]
    pub fn registry(&self) -> &ListenerRegistry {
        &self.registry
    }

    #[must_use]
    pub fn excluded(&self) -> &ExcludedChannels {
        &self.excluded
    }

    fn unwrapping(listener: Listener) -> Listener {
        Listener::new(move |event, args| {
            let (_, args) = Payload::peel(args);
            listener.call(event, &args);
        })
    }

    fn unwrapping_handler(handler: Handler) -> Handler {
        Handler::new(move |event, args| {
            let (_, args) = Payload::peel(args);
            handler.call(event, &args)
        })
    }

    fn unsubscribe(&self, channel: &str, listener: &Listener, method: Method) {
        if self.excluded.contains(channel) {
            self.real.remove_listener(channel, listener);
            return;
        }
        match self.registry.pop_listener(channel, listener.key()) {
            Some(wrapper) => {
                self.real.remove_listener(channel, &wrapper);
                track_removal(&*self.sink, channel, method);
            }
            None => {
                // Possibly registered on the real bus before interception.
                self.real.remove_listener(channel, listener);
                trace!(channel = %channel, "Removal of untracked listener");
            }
        }
    }
}

fn track_removal(sink: &dyn EventSink, channel: &str, method: Method) {
    debug!(channel = %channel, method = %method, "Tracking removal");
    sink.track(IpcEvent::lifecycle(Direction::CoordinatorLocal, channel, method));
}

impl CoordinatorBus for InterceptedBus {
    fn on(&self, channel: &str, listener: Listener) {
        if self.excluded.contains(channel) {
            self.real.on(channel, listener);
            return;
        }
        let original = listener.key();
        let wrapper = Self::unwrapping(listener);
        self.registry.push_listener(channel, original, wrapper.clone());
        self.real.on(channel, wrapper);
    }

    fn once(&self, channel: &str, listener: Listener) {
        if self.excluded.contains(channel) {
            self.real.once(channel, listener);
            return;
        }

        // Installed with `on` and removed by hand after the first delivery,
        // so the removal can be reported. The wrapper finds itself through
        // the registry by key, which avoids a reference cycle.
        let original = listener.key();
        let own_key: Arc<OnceLock<ListenerKey>> = Arc::new(OnceLock::new());
        let fired = AtomicBool::new(false);
        let wrapper = {
            let real = self.real.clone();
            let sink = self.sink.clone();
            let registry = self.registry.clone();
            let channel = channel.to_string();
            let own_key = own_key.clone();
            Listener::new(move |event, args| {
                if fired.swap(true, Ordering::SeqCst) {
                    return;
                }
                let me = own_key
                    .get()
                    .and_then(|key| registry.take_listener(&channel, original, *key));
                if let Some(me) = me {
                    real.remove_listener(&channel, &me);
                    track_removal(&*sink, &channel, Method::RemoveListener);
                }
                let (_, args) = Payload::peel(args);
                listener.call(event, &args);
            })
        };
        // Freshly created, so the cell is empty.
        let _ = own_key.set(wrapper.key());

        self.registry.push_listener(channel, original, wrapper.clone());
        self.real.on(channel, wrapper);
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
                self.real.remove_all_listeners(Some(channel));
            }
            Some(channel) => {
                let had_listeners = self.real.listener_count(channel) > 0;
                self.registry.drain_channel(channel);
                self.real.remove_all_listeners(Some(channel));
                if had_listeners {
                    track_removal(&*self.sink, channel, Method::RemoveAllListeners);
                }
            }
            None => {
                let channels = self.registry.drain_all();
                self.real.remove_all_listeners(None);
                for channel in channels {
                    track_removal(&*self.sink, &channel, Method::RemoveAllListeners);
                }
            }
        }
    }

    fn handle(&self, channel: &str, handler: Handler) -> Result<(), BusError> {
        if self.excluded.contains(channel) {
            return self.real.handle(channel, handler);
        }
        self.real.handle(channel, Self::unwrapping_handler(handler))?;
        self.registry.add_responder(channel);
        Ok(())
    }

    fn handle_once(&self, channel: &str, handler: Handler) -> Result<(), BusError> {
        if self.excluded.contains(channel) {
            return self.real.handle_once(channel, handler);
        }

        let fired = AtomicBool::new(false);
        let wrapper = {
            let real = self.real.clone();
            let sink = self.sink.clone();
            let registry = self.registry.clone();
            let channel = channel.to_string();
            Handler::new(move |event, args| {
                if !fired.swap(true, Ordering::SeqCst) && registry.remove_responder(&channel) {
                    real.remove_handler(&channel);
                    track_removal(&*sink, &channel, Method::RemoveHandler);
                }
                let (_, args) = Payload::peel(args);
                handler.call(event, &args)
            })
        };
        self.real.handle(channel, wrapper)?;
        self.registry.add_responder(channel);
        Ok(())
    }

    fn remove_handler(&self, channel: &str) {
        if !self.excluded.contains(channel) && self.registry.remove_responder(channel) {
            self.real.remove_handler(channel);
            track_removal(&*self.sink, channel, Method::RemoveHandler);
            return;
        }
        self.real.remove_handler(channel);
    }

    fn listener_count(&self, channel: &str) -> usize {
        self.real.listener_count(channel)
    }

    fn has_handler(&self, channel: &str) -> bool {
        self.real.has_handler(channel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use serde_json::{json, Value};
    use shared_bus::{BusEvent, InMemoryCoordinatorBus, SenderKind};
    use shared_types::{CollectingSink, CorrelationToken};

    struct Fixture {
        real: Arc<InMemoryCoordinatorBus>,
        sink: Arc<CollectingSink>,
        bus: InterceptedBus,
    }

    fn fixture() -> Fixture {
        fixture_excluding(ExcludedChannels::relay_only())
    }

    fn fixture_excluding(excluded: ExcludedChannels) -> Fixture {
        let real = Arc::new(InMemoryCoordinatorBus::new());
        let sink = Arc::new(CollectingSink::new());
        let bus = InterceptedBus::new(real.clone(), sink.clone(), excluded);
        Fixture { real, sink, bus }
    }

    fn frame() -> BusEvent {
        BusEvent::new(SenderKind::Frame { frame_id: 1 })
    }

    fn recording() -> (Listener, Arc<Mutex<Vec<Vec<Value>>>>) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let sink = calls.clone();
        let listener = Listener::new(move |_, args| sink.lock().push(args.to_vec()));
        (listener, calls)
    }

    fn methods(sink: &CollectingSink) -> Vec<(String, Method)> {
        sink.events()
            .into_iter()
            .map(|e| {
                assert_eq!(e.direction, Direction::CoordinatorLocal);
                assert!(e.args.is_empty());
                (e.channel, e.method.unwrap())
            })
            .collect()
    }

    #[test]
    fn test_listener_never_sees_envelope() {
        let f = fixture();
        let (listener, calls) = recording();
        f.bus.on("ping", listener);

        let wrapped = Payload::wrap(vec![json!("a"), json!(2)], CorrelationToken::new());
        f.real.emit("ping", &frame(), &wrapped);
        f.real.emit("ping", &frame(), &[json!("plain")]);

        assert_eq!(*calls.lock(), vec![vec![json!("a"), json!(2)], vec![json!("plain")]]);
    }

    #[test]
    fn test_registration_alone_records_nothing() {
        let f = fixture();
        f.bus.on("ping", recording().0);
        f.bus.handle("sum", Handler::new(|_, _| Ok(Value::Null))).unwrap();
        assert!(f.sink.is_empty());
    }

    #[test]
    fn test_register_invoke_remove_emits_one_event() {
        let f = fixture();
        let (listener, calls) = recording();
        f.bus.on("ping", listener.clone());

        f.real.emit("ping", &frame(), &[json!(1)]);
        f.bus.remove_listener("ping", &listener);

        assert_eq!(calls.lock().len(), 1);
        assert_eq!(f.real.listener_count("ping"), 0);
        assert_eq!(f.bus.registry().listener_registrations("ping"), 0);
        assert_eq!(methods(&f.sink), vec![("ping".into(), Method::RemoveListener)]);
    }

    #[test]
    fn test_removing_unknown_listener_emits_nothing() {
        let f = fixture();
        let (listener, _) = recording();
        f.bus.off("ping", &listener);
        f.bus.remove_listener("ping", &listener);
        assert!(f.sink.is_empty());
    }

    #[test]
    fn test_off_reports_off() {
        let f = fixture();
        let (listener, _) = recording();
        f.bus.on("ping", listener.clone());
        f.bus.off("ping", &listener);
        assert_eq!(methods(&f.sink), vec![("ping".into(), Method::Off)]);
    }

    #[test]
    fn test_double_registration_needs_double_removal() {
        let f = fixture();
        let (listener, calls) = recording();
        f.bus.on("ping", listener.clone());
        f.bus.on("ping", listener.clone());

        f.bus.remove_listener("ping", &listener);
        f.real.emit("ping", &frame(), &[]);
        assert_eq!(calls.lock().len(), 1);

        f.bus.remove_listener("ping", &listener);
        f.bus.remove_listener("ping", &listener);
        assert_eq!(f.real.listener_count("ping"), 0);
        assert_eq!(f.sink.len(), 2);
    }

    #[test]
    fn test_once_reports_removal_exactly_once() {
        let f = fixture();
        let (listener, calls) = recording();
        f.bus.once("ping", listener.clone());

        f.real.emit("ping", &frame(), &[json!(1)]);
        f.real.emit("ping", &frame(), &[json!(2)]);
        f.bus.remove_listener("ping", &listener);

        assert_eq!(*calls.lock(), vec![vec![json!(1)]]);
        assert_eq!(f.real.listener_count("ping"), 0);
        assert_eq!(methods(&f.sink), vec![("ping".into(), Method::RemoveListener)]);
    }

    #[test]
    fn test_once_removed_before_firing() {
        let f = fixture();
        let (listener, calls) = recording();
        f.bus.once("ping", listener.clone());
        f.bus.off("ping", &listener);
        f.real.emit("ping", &frame(), &[]);

        assert!(calls.lock().is_empty());
        assert_eq!(methods(&f.sink), vec![("ping".into(), Method::Off)]);
    }

    #[test]
    fn test_remove_all_for_channel() {
        let f = fixture();
        f.bus.on("a", recording().0);
        f.bus.on("a", recording().0);
        f.bus.on("b", recording().0);

        f.bus.remove_all_listeners(Some("a"));
        f.bus.remove_all_listeners(Some("a"));

        assert_eq!(f.real.listener_count("a"), 0);
        assert_eq!(f.real.listener_count("b"), 1);
        assert_eq!(methods(&f.sink), vec![("a".into(), Method::RemoveAllListeners)]);
    }

    #[test]
    fn test_remove_all_everywhere() {
        let f = fixture();
        f.bus.on("b", recording().0);
        f.bus.on("a", recording().0);

        f.bus.remove_all_listeners(None);

        assert_eq!(
            methods(&f.sink),
            vec![
                ("a".into(), Method::RemoveAllListeners),
                ("b".into(), Method::RemoveAllListeners)
            ]
        );
        assert!(f.bus.registry().is_empty());
    }

    #[test]
    fn test_responder_sees_unwrapped_args() {
        let f = fixture();
        f.bus
            .handle("sum", Handler::new(|_, args| Ok(json!(args.iter().filter_map(Value::as_i64).sum::<i64>()))))
            .unwrap();

        let wrapped = Payload::wrap(vec![json!(2), json!(5)], CorrelationToken::new());
        assert_eq!(f.real.invoke("sum", &frame(), &wrapped), Ok(json!(7)));
    }

    #[test]
    fn test_remove_handler_tracking() {
        let f = fixture();
        f.bus.remove_handler("sum");
        assert!(f.sink.is_empty());

        f.bus.handle("sum", Handler::new(|_, _| Ok(Value::Null))).unwrap();
        f.bus.remove_handler("sum");

        assert!(!f.real.has_handler("sum"));
        assert_eq!(methods(&f.sink), vec![("sum".into(), Method::RemoveHandler)]);
    }

    #[test]
    fn test_duplicate_responder_keeps_original_and_no_bookkeeping_drift() {
        let f = fixture();
        f.bus.handle("sum", Handler::new(|_, _| Ok(json!(1)))).unwrap();
        let second = f.bus.handle("sum", Handler::new(|_, _| Ok(json!(2))));

        assert_eq!(second, Err(BusError::ResponderAlreadyRegistered("sum".into())));
        assert_eq!(f.real.invoke("sum", &frame(), &[]), Ok(json!(1)));
    }

    #[test]
    fn test_handle_once_reports_removal_after_call() {
        let f = fixture();
        f.bus.handle_once("once", Handler::new(|_, args| Ok(args[0].clone()))).unwrap();

        let wrapped = Payload::wrap(vec![json!("x")], CorrelationToken::new());
        assert_eq!(f.real.invoke("once", &frame(), &wrapped), Ok(json!("x")));
        assert!(f.real.invoke("once", &frame(), &[]).is_err());
        f.bus.remove_handler("once");

        assert_eq!(methods(&f.sink), vec![("once".into(), Method::RemoveHandler)]);
    }

    #[test]
    fn test_excluded_channel_is_passed_through_raw() {
        let f = fixture_excluding(ExcludedChannels::with_channels(["raw"]));
        let (listener, calls) = recording();
        f.bus.on("raw", listener.clone());

        let wrapped = Payload::wrap(vec![json!(1)], CorrelationToken::new());
        f.real.emit("raw", &frame(), &wrapped);
        f.bus.remove_listener("raw", &listener);
        f.bus.handle("raw", Handler::new(|_, _| Ok(Value::Null))).unwrap();
        f.bus.remove_handler("raw");

        assert_eq!(*calls.lock(), vec![wrapped]);
        assert_eq!(f.real.listener_count("raw"), 0);
        assert!(f.sink.is_empty());
        assert!(f.bus.registry().is_empty());
    }

    #[test]
    fn test_listener_registered_before_interception_can_be_removed() {
        let f = fixture();
        let (listener, _) = recording();
        f.real.on("legacy", listener.clone());

        f.bus.remove_listener("legacy", &listener);

        assert_eq!(f.real.listener_count("legacy"), 0);
        assert!(f.sink.is_empty());
    }
}
