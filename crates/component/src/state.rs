//! Keyed state with per-key subscribers.
//!
//! Outside a batch, `set_state` commits immediately and notifies the key's
//! subscribers with `(new, old)`. Inside a batch, writes are deferred and
//! committed together, in first-write order with the last value per key,
//! when the batch body returns. A failing batch body discards its deferred
//! writes.
//!
//! Batches nest. A batch opened while another is open or scheduled leaves
//! its writes to the outermost one, which commits everything at once.

use crate::{ComponentError, ErrorHandler, Subscription, guarded};
use scheduler::{Update, UpdateScheduler};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};
use vdom::PropValue;

type Subscriber = Rc<dyn Fn(&PropValue, Option<&PropValue>) -> Result<(), ComponentError>>;

#[derive(Default)]
struct StoreInner {
    state: RefCell<HashMap<String, PropValue>>,
    subscribers: RefCell<HashMap<String, Vec<(u64, Subscriber)>>>,
    pending: RefCell<Vec<(String, PropValue)>>,
    open_batches: Cell<usize>,
    next_id: Cell<u64>,
    on_error: RefCell<Option<ErrorHandler>>,
}

/// Cloning yields another handle to the same store.
#[derive(Clone, Default)]
pub struct StateStore {
    inner: Rc<StoreInner>,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<PropValue> {
        self.inner.state.borrow().get(key).cloned()
    }

    pub fn set_state(&self, key: &str, value: impl Into<PropValue>) {
        let value = value.into();
        if self.is_batching() {
            let mut pending = self.inner.pending.borrow_mut();
            match pending.iter_mut().find(|(k, _)| k == key) {
                Some((_, slot)) => *slot = value,
                None => pending.push((key.to_string(), value)),
            }
            return;
        }
        self.inner.commit(key, value);
    }

    /// `true` while a batch is open or scheduled.
    pub fn is_batching(&self) -> bool {
        self.inner.open_batches.get() > 0
    }

    /// Run `updates` with writes deferred, then commit them together.
    pub fn batch(&self, updates: impl FnOnce(&StateStore) -> Result<(), ComponentError>) {
        self.inner.open_batch();
        self.run_batch(updates);
    }

    /// Body of a batch that is already counted as open.
    fn run_batch(&self, updates: impl FnOnce(&StateStore) -> Result<(), ComponentError>) {
        let saved = self.inner.pending.borrow().clone();
        let result = {
            let _guard = BatchGuard { inner: &self.inner };
            guarded(|| updates(self))
        };
        match result {
            Ok(()) if !self.is_batching() => self.inner.flush_pending(),
            Ok(()) => {}
            Err(err) => {
                *self.inner.pending.borrow_mut() = saved;
                log::warn!(target: "component.state", "batch failed, dropped its deferred writes");
                self.inner.report(&err);
            }
        }
    }

    /// Open a batch now and run `updates` on the scheduler's next flush.
    ///
    /// Writes made before the flush are deferred into the same batch.
    pub fn batch_on(
        &self,
        scheduler: &UpdateScheduler,
        updates: impl FnOnce(&StateStore) -> Result<(), ComponentError> + 'static,
    ) {
        self.inner.open_batch();
        let weak: Weak<StoreInner> = Rc::downgrade(&self.inner);
        let updates = RefCell::new(Some(updates));
        scheduler.enqueue(Update::new(move || {
            let (Some(inner), Some(updates)) = (weak.upgrade(), updates.borrow_mut().take()) else {
                return Ok(());
            };
            StateStore { inner }.run_batch(updates);
            Ok(())
        }));
    }

    pub fn subscribe(
        &self,
        key: &str,
        subscriber: impl Fn(&PropValue, Option<&PropValue>) -> Result<(), ComponentError> + 'static,
    ) -> Subscription {
        let id = self.inner.next_id.get();
        self.inner.next_id.set(id + 1);
        self.inner
            .subscribers
            .borrow_mut()
            .entry(key.to_string())
            .or_default()
            .push((id, Rc::new(subscriber)));

        let weak = Rc::downgrade(&self.inner);
        let key = key.to_string();
        Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                let mut subscribers = inner.subscribers.borrow_mut();
                if let Some(list) = subscribers.get_mut(&key) {
                    list.retain(|(k, _)| *k != id);
                    if list.is_empty() {
                        subscribers.remove(&key);
                    }
                }
            }
        })
    }

    pub fn subscriber_count(&self, key: &str) -> usize {
        self.inner.subscribers.borrow().get(key).map_or(0, Vec::len)
    }

    /// Install the handler that receives subscriber and batch failures.
    pub fn set_error_boundary(&self, handler: impl Fn(&ComponentError) + 'static) {
        *self.inner.on_error.borrow_mut() = Some(Rc::new(handler));
    }

    pub fn destroy(&self) {
        self.inner.state.borrow_mut().clear();
        self.inner.subscribers.borrow_mut().clear();
        self.inner.pending.borrow_mut().clear();
        self.inner.on_error.borrow_mut().take();
    }
}

impl StoreInner {
    fn open_batch(&self) {
        self.open_batches.set(self.open_batches.get() + 1);
    }

    fn commit(&self, key: &str, value: PropValue) {
        let old = self.state.borrow_mut().insert(key.to_string(), value.clone());
        let subscribers: Vec<Subscriber> = match self.subscribers.borrow().get(key) {
            Some(list) => list.iter().map(|(_, s)| Rc::clone(s)).collect(),
            None => return,
        };
        for subscriber in subscribers {
            if let Err(err) = guarded(|| subscriber(&value, old.as_ref())) {
                self.report(&err);
            }
        }
    }

    fn flush_pending(&self) {
        let pending = std::mem::take(&mut *self.pending.borrow_mut());
        if !pending.is_empty() {
            log::debug!(target: "component.state", "committing {} batched writes", pending.len());
        }
        for (key, value) in pending {
            self.commit(&key, value);
        }
    }

    fn report(&self, err: &ComponentError) {
        log::error!(target: "component.state", "state store error: {err}");
        let handler = self.on_error.borrow().clone();
        if let Some(handler) = handler {
            handler(err);
        }
    }
}

/// Closes one batch even if the body panics past `guarded`.
struct BatchGuard<'a> {
    inner: &'a StoreInner,
}

impl Drop for BatchGuard<'_> {
    fn drop(&mut self) {
        let open = self.inner.open_batches.get();
        self.inner.open_batches.set(open.saturating_sub(1));
    }
}

impl fmt::Debug for StateStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateStore")
            .field("keys", &self.inner.state.borrow().len())
            .field("pending", &self.inner.pending.borrow().len())
            .field("batching", &self.is_batching())
            .finish()
    }
}
