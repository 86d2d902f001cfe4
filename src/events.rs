//! In-process event bus.
//!
//! Features react to each other through named events instead of direct
//! calls: the task board emits `task:toggled`, gamification listens for it.
//! Dispatch is synchronous and happens on the caller's thread, in
//! registration order.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::cell::RefCell;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;
use tracing::{trace, warn};

pub const TASK_ADDED: &str = "task:added";
pub const TASK_UPDATED: &str = "task:updated";
pub const TASK_TOGGLED: &str = "task:toggled";
pub const TASK_REMOVED: &str = "task:removed";
pub const PROJECT_ADDED: &str = "project:added";
pub const PROJECT_UPDATED: &str = "project:updated";
pub const PROJECT_COMPLETED: &str = "project:completed";
pub const PROJECT_REMOVED: &str = "project:removed";
pub const SETTINGS_UPDATED: &str = "settings:updated";
pub const POMODORO_COMPLETED: &str = "pomodoro:completed";
pub const DAY_ROLLED_OVER: &str = "day:rolled-over";

#[derive(Debug, Clone)]
pub struct Event {
    pub name: String,
    pub payload: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

pub type HandlerError = Box<dyn std::error::Error>;
pub type Handler = Rc<dyn Fn(&Event) -> Result<(), HandlerError>>;

/// Wrap a closure as a bus handler
pub fn handler(f: impl Fn(&Event) -> Result<(), HandlerError> + 'static) -> Handler {
    Rc::new(f)
}

/// Returned by [`EventBus::on`]; hand it back to stop listening
pub struct Subscription {
    name: String,
    handler: Handler,
}

impl Subscription {
    pub fn unsubscribe(self, bus: &EventBus) {
        bus.off(&self.name, &self.handler);
    }
}

#[derive(Default)]
pub struct EventBus {
    handlers: RefCell<HashMap<String, Vec<Handler>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `name`. Registering the same handler twice is a no-op.
    pub fn on(&self, name: &str, handler: Handler) -> Subscription {
        let mut handlers = self.handlers.borrow_mut();
        let list = handlers.entry(name.to_string()).or_default();
        if !list.iter().any(|h| Rc::ptr_eq(h, &handler)) {
            list.push(handler.clone());
        }
        Subscription {
            name: name.to_string(),
            handler,
        }
    }

    pub fn off(&self, name: &str, handler: &Handler) {
        let mut handlers = self.handlers.borrow_mut();
        if let Some(list) = handlers.get_mut(name) {
            list.retain(|h| !Rc::ptr_eq(h, handler));
            if list.is_empty() {
                handlers.remove(name);
            }
        }
    }

    pub fn handler_count(&self, name: &str) -> usize {
        self.handlers.borrow().get(name).map_or(0, Vec::len)
    }

    /// Deliver `payload` to every handler of `name`; returns how many succeeded.
    ///
    /// A handler that errors or panics is logged and skipped.
    pub fn emit(&self, name: &str, payload: serde_json::Value) -> usize {
        // Snapshot so handlers may subscribe or unsubscribe while we dispatch
        let snapshot: Vec<Handler> = self
            .handlers
            .borrow()
            .get(name)
            .cloned()
            .unwrap_or_default();
        if snapshot.is_empty() {
            trace!(event = name, "No handlers");
            return 0;
        }

        let event = Event {
            name: name.to_string(),
            payload,
            timestamp: Utc::now(),
        };

        let mut delivered = 0;
        for handler in snapshot {
            match panic::catch_unwind(AssertUnwindSafe(|| handler(&event))) {
                Ok(Ok(())) => delivered += 1,
                Ok(Err(e)) => warn!(event = name, error = %e, "Event handler failed"),
                Err(_) => warn!(event = name, "Event handler panicked"),
            }
        }
        delivered
    }

    /// Serialize `payload` and emit it
    pub fn emit_with<P: Serialize + ?Sized>(&self, name: &str, payload: &P) -> usize {
        match serde_json::to_value(payload) {
            Ok(value) => self.emit(name, value),
            Err(e) => {
                warn!(event = name, error = %e, "Dropping event with unserializable payload");
                0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn recorder() -> (Rc<RefCell<Vec<String>>>, impl Fn(&'static str) -> Handler) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let log_for_handlers = log.clone();
        let make = move |label: &'static str| {
            let log = log_for_handlers.clone();
            handler(move |event: &Event| {
                log.borrow_mut().push(format!("{}:{}", label, event.payload));
                Ok(())
            })
        };
        (log, make)
    }

    #[test]
    fn test_handlers_fire_in_registration_order() {
        let bus = EventBus::new();
        let (log, make) = recorder();
        bus.on(TASK_TOGGLED, make("first"));
        bus.on(TASK_TOGGLED, make("second"));

        assert_eq!(bus.emit(TASK_TOGGLED, json!(1)), 2);
        assert_eq!(*log.borrow(), vec!["first:1", "second:1"]);
    }

    #[test]
    fn test_failing_handler_does_not_block_others() {
        let bus = EventBus::new();
        let (log, make) = recorder();
        bus.on(TASK_TOGGLED, handler(|_| Err("boom".into())));
        bus.on(TASK_TOGGLED, handler(|_| panic!("handler panicked")));
        bus.on(TASK_TOGGLED, make("survivor"));

        assert_eq!(bus.emit(TASK_TOGGLED, json!({"id": "t1"})), 1);
        assert_eq!(*log.borrow(), vec![r#"survivor:{"id":"t1"}"#]);
    }

    #[test]
    fn test_same_handler_registered_twice_fires_once() {
        let bus = EventBus::new();
        let (log, make) = recorder();
        let h = make("only");
        bus.on(PROJECT_COMPLETED, h.clone());
        bus.on(PROJECT_COMPLETED, h);

        bus.emit(PROJECT_COMPLETED, json!("p"));
        assert_eq!(log.borrow().len(), 1);
        assert_eq!(bus.handler_count(PROJECT_COMPLETED), 1);
    }

    #[test]
    fn test_unsubscribe_and_off() {
        let bus = EventBus::new();
        let (log, make) = recorder();
        let kept = make("kept");
        let subscription = bus.on(TASK_ADDED, make("dropped"));
        bus.on(TASK_ADDED, kept.clone());

        subscription.unsubscribe(&bus);
        bus.emit(TASK_ADDED, json!(0));
        bus.off(TASK_ADDED, &kept);
        bus.emit(TASK_ADDED, json!(1));

        assert_eq!(*log.borrow(), vec!["kept:0"]);
        assert_eq!(bus.handler_count(TASK_ADDED), 0);
    }

    #[test]
    fn test_events_are_scoped_by_name() {
        let bus = EventBus::new();
        let (log, make) = recorder();
        bus.on(TASK_REMOVED, make("removed"));

        assert_eq!(bus.emit(TASK_ADDED, json!(null)), 0);
        assert!(log.borrow().is_empty());
    }
}
