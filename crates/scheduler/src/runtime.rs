//! Host-runtime hooks for deferring a flush to the next scheduling point.
//!
//! The scheduler never decides *when* the next tick happens; an embedder
//! supplies a [`ScheduleFlush`] backed by its event loop (timer, microtask,
//! frame callback). [`TickQueue`] is a manual loop for tests and headless
//! drivers, [`Immediate`] runs the flush inline.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

/// A deferred flush handed to the runtime.
pub struct FlushTask(Box<dyn FnOnce()>);

impl FlushTask {
    pub fn new(f: impl FnOnce() + 'static) -> Self {
        FlushTask(Box::new(f))
    }

    pub fn run(self) {
        (self.0)()
    }
}

impl fmt::Debug for FlushTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FlushTask")
    }
}

pub trait ScheduleFlush {
    /// Arrange for `task` to run at the next scheduling opportunity, after the
    /// current call stack has returned.
    fn schedule(&self, task: FlushTask);
}

/// Manually driven tick queue.
#[derive(Default)]
pub struct TickQueue {
    pending: RefCell<VecDeque<FlushTask>>,
}

impl TickQueue {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    /// Run the oldest scheduled tick. Returns `false` if none was pending.
    pub fn run_one(&self) -> bool {
        let task = self.pending.borrow_mut().pop_front();
        match task {
            Some(task) => {
                task.run();
                true
            }
            None => false,
        }
    }

    /// Run ticks until none are left, including ticks scheduled by the ones
    /// being run. Returns how many ran.
    pub fn run_pending(&self) -> usize {
        let mut ran = 0;
        while self.run_one() {
            ran += 1;
        }
        ran
    }

    pub fn len(&self) -> usize {
        self.pending.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.borrow().is_empty()
    }
}

impl ScheduleFlush for TickQueue {
    fn schedule(&self, task: FlushTask) {
        self.pending.borrow_mut().push_back(task);
    }
}

impl fmt::Debug for TickQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TickQueue")
            .field("pending", &self.len())
            .finish()
    }
}

/// Runs every flush as soon as it is scheduled.
#[derive(Clone, Copy, Debug, Default)]
pub struct Immediate;

impl ScheduleFlush for Immediate {
    fn schedule(&self, task: FlushTask) {
        task.run();
    }
}
