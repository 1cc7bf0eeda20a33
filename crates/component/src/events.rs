//! Named-event publish/subscribe.
//!
//! Listeners for one event run in registration order. `emit` works on a
//! copy of the listener list, so listeners may register or cancel others
//! (or themselves) while running; such changes apply from the next emit.

use crate::{ComponentError, ErrorHandler, Subscription, guarded};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};
use vdom::PropValue;

type Listener = Rc<dyn Fn(&[PropValue]) -> Result<(), ComponentError>>;

pub const DEFAULT_MAX_LISTENERS: usize = 10;

struct BusInner {
    events: RefCell<HashMap<String, Vec<(u64, Listener)>>>,
    next_id: Cell<u64>,
    max_listeners: Cell<usize>,
    on_error: RefCell<Option<ErrorHandler>>,
}

/// Cloning yields another handle to the same registry.
#[derive(Clone)]
pub struct EventBus {
    inner: Rc<BusInner>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_max_listeners(DEFAULT_MAX_LISTENERS)
    }

    pub fn with_max_listeners(max_listeners: usize) -> Self {
        Self {
            inner: Rc::new(BusInner {
                events: RefCell::new(HashMap::new()),
                next_id: Cell::new(0),
                max_listeners: Cell::new(max_listeners),
                on_error: RefCell::new(None),
            }),
        }
    }

    /// Register `listener` for `event`.
    ///
    /// Returns `None` and reports [`ComponentError::MaxListeners`] when the
    /// event already has the maximum number of listeners.
    pub fn on(
        &self,
        event: &str,
        listener: impl Fn(&[PropValue]) -> Result<(), ComponentError> + 'static,
    ) -> Option<Subscription> {
        let listener: Listener = Rc::new(listener);
        self.register(event, |_| listener)
    }

    /// Register `listener` to run on the next `event` only.
    pub fn once(
        &self,
        event: &str,
        listener: impl Fn(&[PropValue]) -> Result<(), ComponentError> + 'static,
    ) -> Option<Subscription> {
        let weak = Rc::downgrade(&self.inner);
        let name = event.to_string();
        self.register(event, move |id| {
            let wrapped: Listener = Rc::new(move |args: &[PropValue]| {
                if let Some(inner) = weak.upgrade() {
                    inner.remove(&name, id);
                }
                listener(args)
            });
            wrapped
        })
    }

    /// Invoke every listener of `event` with `args`. Returns how many ran.
    pub fn emit(&self, event: &str, args: &[PropValue]) -> usize {
        let listeners: Vec<Listener> = match self.inner.events.borrow().get(event) {
            Some(list) => list.iter().map(|(_, l)| Rc::clone(l)).collect(),
            None => return 0,
        };
        for listener in &listeners {
            if let Err(err) = guarded(|| listener(args)) {
                self.inner.report(&err);
            }
        }
        log::trace!(target: "component.events", "emit {event:?} to {} listeners", listeners.len());
        listeners.len()
    }

    pub fn listener_count(&self, event: &str) -> usize {
        self.inner.events.borrow().get(event).map_or(0, Vec::len)
    }

    pub fn max_listeners(&self) -> usize {
        self.inner.max_listeners.get()
    }

    pub fn set_max_listeners(&self, n: usize) {
        self.inner.max_listeners.set(n);
    }

    pub fn set_error_handler(&self, handler: impl Fn(&ComponentError) + 'static) {
        *self.inner.on_error.borrow_mut() = Some(Rc::new(handler));
    }

    /// Drop the listeners of `event`, or of every event when `None`.
    pub fn remove_all_listeners(&self, event: Option<&str>) {
        let mut events = self.inner.events.borrow_mut();
        match event {
            Some(event) => {
                events.remove(event);
            }
            None => events.clear(),
        }
    }

    pub fn destroy(&self) {
        self.remove_all_listeners(None);
        self.inner.on_error.borrow_mut().take();
    }

    fn register(&self, event: &str, make: impl FnOnce(u64) -> Listener) -> Option<Subscription> {
        let limit = self.inner.max_listeners.get();
        if self.listener_count(event) >= limit {
            self.inner.report(&ComponentError::MaxListeners {
                event: event.to_string(),
                limit,
            });
            return None;
        }
        let id = self.inner.next_id.get();
        self.inner.next_id.set(id + 1);
        let listener = make(id);
        self.inner
            .events
            .borrow_mut()
            .entry(event.to_string())
            .or_default()
            .push((id, listener));

        let weak: Weak<BusInner> = Rc::downgrade(&self.inner);
        let name = event.to_string();
        Some(Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.remove(&name, id);
            }
        }))
    }
}

impl BusInner {
    fn remove(&self, event: &str, id: u64) {
        let mut events = self.events.borrow_mut();
        if let Some(list) = events.get_mut(event) {
            list.retain(|(k, _)| *k != id);
            if list.is_empty() {
                events.remove(event);
            }
        }
    }

    fn report(&self, err: &ComponentError) {
        log::error!(target: "component.events", "event bus error: {err}");
        let handler = self.on_error.borrow().clone();
        if let Some(handler) = handler {
            handler(err);
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("events", &self.inner.events.borrow().len())
            .field("max_listeners", &self.max_listeners())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counter(bus: &EventBus, event: &str) -> (Rc<Cell<usize>>, Option<Subscription>) {
        let count = Rc::new(Cell::new(0));
        let seen = Rc::clone(&count);
        let sub = bus.on(event, move |_| {
            seen.set(seen.get() + 1);
            Ok(())
        });
        (count, sub)
    }

    #[test]
    fn emit_passes_arguments_in_order() {
        let bus = EventBus::new();
        let log: Rc<RefCell<Vec<String>>> = Rc::default();
        for tag in ["first", "second"] {
            let log = Rc::clone(&log);
            let _ = bus.on("save", move |args| {
                log.borrow_mut().push(format!("{tag}:{}", args[0].fragment()));
                Ok(())
            });
        }
        assert_eq!(bus.emit("save", &[PropValue::from("doc")]), 2);
        assert_eq!(*log.borrow(), vec!["first:doc", "second:doc"]);
    }

    #[test]
    fn cancel_unsubscribes() {
        let bus = EventBus::new();
        let (count, sub) = counter(&bus, "tick");
        bus.emit("tick", &[]);
        sub.unwrap().cancel();
        bus.emit("tick", &[]);
        assert_eq!(count.get(), 1);
        assert_eq!(bus.listener_count("tick"), 0);
    }

    #[test]
    fn once_runs_a_single_time() {
        let bus = EventBus::new();
        let count = Rc::new(Cell::new(0));
        let seen = Rc::clone(&count);
        let _ = bus.once("ready", move |_| {
            seen.set(seen.get() + 1);
            Ok(())
        });
        bus.emit("ready", &[]);
        bus.emit("ready", &[]);
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn listener_bound_is_reported_not_raised() {
        let bus = EventBus::with_max_listeners(2);
        let errors: Rc<RefCell<Vec<String>>> = Rc::default();
        let sink = Rc::clone(&errors);
        bus.set_error_handler(move |err| sink.borrow_mut().push(err.to_string()));

        assert!(counter(&bus, "resize").1.is_some());
        assert!(counter(&bus, "resize").1.is_some());
        assert!(counter(&bus, "resize").1.is_none());
        assert_eq!(bus.listener_count("resize"), 2);
        assert_eq!(
            *errors.borrow(),
            vec!["Max listeners (2) exceeded for event: resize"]
        );
    }

    #[test]
    fn failing_listener_does_not_stop_others() {
        let bus = EventBus::new();
        let errors = Rc::new(Cell::new(0));
        let sink = Rc::clone(&errors);
        bus.set_error_handler(move |_| sink.set(sink.get() + 1));

        let _ = bus.on("go", |_| Err(ComponentError::msg("nope")));
        let _ = bus.on("go", |_| panic!("listener blew up"));
        let (count, _sub) = counter(&bus, "go");

        assert_eq!(bus.emit("go", &[]), 3);
        assert_eq!(count.get(), 1);
        assert_eq!(errors.get(), 2);
    }

    #[test]
    fn remove_all_and_destroy() {
        let bus = EventBus::new();
        let _a = counter(&bus, "a");
        let _b = counter(&bus, "b");
        bus.remove_all_listeners(Some("a"));
        assert_eq!(bus.listener_count("a"), 0);
        assert_eq!(bus.listener_count("b"), 1);
        bus.destroy();
        assert_eq!(bus.emit("b", &[]), 0);
    }
}
