//! Update batching for host mutations.
//!
//! Updates are zero-argument callbacks collected into a deduplicated,
//! insertion-ordered queue. The first enqueue after an idle period asks the
//! host runtime for a tick via [`ScheduleFlush`]; the flush that runs on that
//! tick drains everything queued so far.
//!
//! Guarantees:
//! - Single-threaded; callbacks run on the thread that owns the scheduler.
//! - Each flush runs the queued callbacks exactly once, in insertion order.
//! - A failing or panicking callback is reported and does not stop the rest.
//! - The queue is cleared and the in-flight flag reset even if a callback
//!   panics.
//! - Work enqueued while a flush is running is not drained by that flush; it
//!   is scheduled as a new flush once the current one finishes.
//! - Flushes never nest: a flush requested from inside a running update is a
//!   no-op.

mod runtime;

pub use crate::runtime::{FlushTask, Immediate, ScheduleFlush, TickQueue};

use std::cell::{Cell, RefCell};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::rc::{Rc, Weak};

#[derive(Debug)]
pub enum UpdateError {
    /// The callback returned an error.
    Failed(Box<dyn std::error::Error>),
    /// The callback panicked; the payload message is kept when it is a string.
    Panicked(String),
}

impl UpdateError {
    pub fn failed(err: impl std::error::Error + 'static) -> Self {
        UpdateError::Failed(Box::new(err))
    }
}

impl fmt::Display for UpdateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpdateError::Failed(err) => write!(f, "update failed: {err}"),
            UpdateError::Panicked(msg) => write!(f, "update panicked: {msg}"),
        }
    }
}

impl std::error::Error for UpdateError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            UpdateError::Failed(err) => Some(err.as_ref()),
            UpdateError::Panicked(_) => None,
        }
    }
}

type UpdateFn = dyn Fn() -> Result<(), UpdateError>;

/// A queued mutation callback. Clones share identity, which is what the
/// queue deduplicates on.
#[derive(Clone)]
pub struct Update(Rc<UpdateFn>);

impl Update {
    pub fn new(f: impl Fn() -> Result<(), UpdateError> + 'static) -> Self {
        Update(Rc::new(f))
    }

    pub fn ptr_eq(&self, other: &Update) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    fn run(&self) -> Result<(), UpdateError> {
        match panic::catch_unwind(AssertUnwindSafe(|| (self.0)())) {
            Ok(result) => result,
            Err(payload) => Err(UpdateError::Panicked(panic_message(payload.as_ref()))),
        }
    }
}

impl fmt::Debug for Update {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Update({:p})", Rc::as_ptr(&self.0) as *const ())
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Outcome of one flush.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FlushStats {
    pub ran: usize,
    pub failed: usize,
}

type ErrorHook = Rc<dyn Fn(&UpdateError)>;

struct Inner {
    queue: RefCell<Vec<Update>>,
    in_flight: Cell<bool>,
    flushing: Cell<bool>,
    runtime: Rc<dyn ScheduleFlush>,
    on_error: RefCell<Option<ErrorHook>>,
}

/// Batches updates and flushes them on the runtime's next tick.
///
/// Cloning yields another handle to the same queue.
#[derive(Clone)]
pub struct UpdateScheduler {
    inner: Rc<Inner>,
}

impl UpdateScheduler {
    pub fn new(runtime: Rc<dyn ScheduleFlush>) -> Self {
        Self {
            inner: Rc::new(Inner {
                queue: RefCell::new(Vec::new()),
                in_flight: Cell::new(false),
                flushing: Cell::new(false),
                runtime,
                on_error: RefCell::new(None),
            }),
        }
    }

    /// Queue `update` unless the same callback is already pending, and start
    /// a flush if none is in flight.
    pub fn enqueue(&self, update: Update) {
        {
            let mut queue = self.inner.queue.borrow_mut();
            if queue.iter().any(|queued| queued.ptr_eq(&update)) {
                log::trace!(target: "scheduler", "duplicate update ignored");
            } else {
                queue.push(update);
            }
        }
        if !self.inner.in_flight.get() {
            Inner::schedule(&self.inner);
        }
    }

    /// Run everything queued right now instead of waiting for the tick.
    ///
    /// Called from inside a running update this does nothing and returns
    /// empty stats; the queued work runs in the next cycle.
    pub fn flush_sync(&self) -> FlushStats {
        Inner::flush(&self.inner)
    }

    /// Drop all pending updates without running them.
    pub fn clear(&self) {
        let dropped = {
            let mut queue = self.inner.queue.borrow_mut();
            let dropped = queue.len();
            queue.clear();
            dropped
        };
        self.inner.in_flight.set(false);
        if dropped > 0 {
            log::debug!(target: "scheduler", "cleared {dropped} pending updates");
        }
    }

    /// Number of updates waiting for the next flush.
    pub fn len(&self) -> usize {
        self.inner.queue.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `true` while a flush is scheduled or running.
    pub fn is_pending(&self) -> bool {
        self.inner.in_flight.get()
    }

    /// Install a hook that receives every isolated update failure.
    pub fn set_error_hook(&self, hook: impl Fn(&UpdateError) + 'static) {
        *self.inner.on_error.borrow_mut() = Some(Rc::new(hook));
    }
}

impl fmt::Debug for UpdateScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpdateScheduler")
            .field("pending", &self.len())
            .field("in_flight", &self.is_pending())
            .finish()
    }
}

impl Inner {
    fn schedule(inner: &Rc<Inner>) {
        inner.in_flight.set(true);
        let weak: Weak<Inner> = Rc::downgrade(inner);
        inner.runtime.schedule(FlushTask::new(move || {
            if let Some(inner) = weak.upgrade() {
                Inner::flush(&inner);
            }
        }));
    }

    fn flush(inner: &Rc<Inner>) -> FlushStats {
        if inner.flushing.get() {
            log::trace!(target: "scheduler", "nested flush ignored");
            return FlushStats::default();
        }
        inner.flushing.set(true);
        let batch = std::mem::take(&mut *inner.queue.borrow_mut());
        inner.in_flight.set(true);
        let _guard = FlushGuard { inner };

        let mut stats = FlushStats::default();
        for update in batch {
            stats.ran += 1;
            if let Err(err) = update.run() {
                stats.failed += 1;
                inner.report(&err);
            }
        }
        if stats.ran > 0 {
            log::debug!(
                target: "scheduler",
                "flushed {} updates ({} failed)",
                stats.ran,
                stats.failed
            );
        }
        stats
    }

    fn report(&self, err: &UpdateError) {
        log::error!(target: "scheduler", "error in batch update: {err}");
        let hook = self.on_error.borrow().clone();
        if let Some(hook) = hook {
            hook(err);
        }
    }
}

/// Resets the in-flight flag when a flush ends and hands anything queued
/// during the flush to a fresh cycle.
struct FlushGuard<'a> {
    inner: &'a Rc<Inner>,
}

impl Drop for FlushGuard<'_> {
    fn drop(&mut self) {
        self.inner.flushing.set(false);
        self.inner.in_flight.set(false);
        let has_more = self
            .inner
            .queue
            .try_borrow()
            .map(|queue| !queue.is_empty())
            .unwrap_or(false);
        if has_more {
            Inner::schedule(self.inner);
        }
    }
}
