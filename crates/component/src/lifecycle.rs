//! Ordered lifecycle hooks bound to a component value.
//!
//! Hooks of one kind run in registration order with `&mut C`. A hook that
//! fails (or panics) is logged and handed to the `error` hooks; the
//! remaining hooks of the same kind still run. Once destroyed, a lifecycle
//! rejects registrations and runs with a warning.

use crate::{ComponentError, guarded};
use std::collections::HashMap;
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Hook {
    BeforeMount,
    Mounted,
    BeforeUpdate,
    Updated,
    BeforeDestroy,
    Destroyed,
}

impl Hook {
    pub fn name(self) -> &'static str {
        match self {
            Hook::BeforeMount => "beforeMount",
            Hook::Mounted => "mounted",
            Hook::BeforeUpdate => "beforeUpdate",
            Hook::Updated => "updated",
            Hook::BeforeDestroy => "beforeDestroy",
            Hook::Destroyed => "destroyed",
        }
    }
}

type HookFn<C> = Box<dyn FnMut(&mut C) -> Result<(), ComponentError>>;
type ErrorHookFn<C> = Box<dyn FnMut(&mut C, &ComponentError)>;
type Cleanup = Box<dyn FnOnce() -> Result<(), ComponentError>>;

pub struct Lifecycle<C> {
    component: Option<C>,
    hooks: HashMap<Hook, Vec<HookFn<C>>>,
    error_hooks: Vec<ErrorHookFn<C>>,
    cleanups: Vec<Cleanup>,
    destroyed: bool,
}

impl<C> Lifecycle<C> {
    pub fn new(component: C) -> Self {
        Self {
            component: Some(component),
            hooks: HashMap::new(),
            error_hooks: Vec::new(),
            cleanups: Vec::new(),
            destroyed: false,
        }
    }

    pub fn component(&self) -> Option<&C> {
        self.component.as_ref()
    }

    pub fn component_mut(&mut self) -> Option<&mut C> {
        self.component.as_mut()
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    pub fn on_before_mount(&mut self, hook: impl FnMut(&mut C) -> Result<(), ComponentError> + 'static) {
        self.add_hook(Hook::BeforeMount, hook);
    }

    pub fn on_mounted(&mut self, hook: impl FnMut(&mut C) -> Result<(), ComponentError> + 'static) {
        self.add_hook(Hook::Mounted, hook);
    }

    pub fn on_before_update(&mut self, hook: impl FnMut(&mut C) -> Result<(), ComponentError> + 'static) {
        self.add_hook(Hook::BeforeUpdate, hook);
    }

    pub fn on_updated(&mut self, hook: impl FnMut(&mut C) -> Result<(), ComponentError> + 'static) {
        self.add_hook(Hook::Updated, hook);
    }

    pub fn on_before_destroy(&mut self, hook: impl FnMut(&mut C) -> Result<(), ComponentError> + 'static) {
        self.add_hook(Hook::BeforeDestroy, hook);
    }

    pub fn on_destroyed(&mut self, hook: impl FnMut(&mut C) -> Result<(), ComponentError> + 'static) {
        self.add_hook(Hook::Destroyed, hook);
    }

    pub fn on_error(&mut self, hook: impl FnMut(&mut C, &ComponentError) + 'static) {
        if self.reject_after_destroy("add hook to") {
            return;
        }
        self.error_hooks.push(Box::new(hook));
    }

    pub fn add_hook(&mut self, hook: Hook, f: impl FnMut(&mut C) -> Result<(), ComponentError> + 'static) {
        if self.reject_after_destroy("add hook to") {
            return;
        }
        self.hooks.entry(hook).or_default().push(Box::new(f));
    }

    /// Register work to run during [`Lifecycle::destroy`], after the
    /// `beforeDestroy` hooks.
    pub fn add_cleanup(&mut self, cleanup: impl FnOnce() -> Result<(), ComponentError> + 'static) {
        if self.reject_after_destroy("add cleanup to") {
            return;
        }
        self.cleanups.push(Box::new(cleanup));
    }

    /// Run every hook registered for `hook`. Returns how many failed.
    pub fn run_hook(&mut self, hook: Hook) -> usize {
        if hook != Hook::Destroyed && self.reject_after_destroy("run hooks on") {
            return 0;
        }
        let Some(mut list) = self.hooks.remove(&hook) else {
            return 0;
        };
        let mut failed = 0;
        for f in list.iter_mut() {
            let Some(component) = self.component.as_mut() else {
                break;
            };
            if let Err(err) = guarded(|| f(component)) {
                failed += 1;
                self.handle_error(hook, &err);
            }
        }
        // Hooks registered while running go after the existing ones.
        if let Some(added) = self.hooks.remove(&hook) {
            list.extend(added);
        }
        if !self.destroyed || hook == Hook::Destroyed {
            self.hooks.insert(hook, list);
        }
        failed
    }

    /// Tear down: `beforeDestroy` hooks, cleanups, then `destroyed` hooks.
    ///
    /// Returns the component value; later calls return `None`.
    pub fn destroy(&mut self) -> Option<C> {
        if self.destroyed {
            return None;
        }
        self.run_hook(Hook::BeforeDestroy);
        for cleanup in std::mem::take(&mut self.cleanups) {
            if let Err(err) = guarded(cleanup) {
                self.handle_error(Hook::BeforeDestroy, &err);
            }
        }
        let destroyed_hooks = self.hooks.remove(&Hook::Destroyed);
        self.hooks.clear();
        self.destroyed = true;
        if let Some(list) = destroyed_hooks {
            self.hooks.insert(Hook::Destroyed, list);
            self.run_hook(Hook::Destroyed);
        }
        self.hooks.clear();
        self.error_hooks.clear();
        log::debug!(target: "component.lifecycle", "destroyed");
        self.component.take()
    }

    fn handle_error(&mut self, hook: Hook, err: &ComponentError) {
        log::error!(target: "component.lifecycle", "lifecycle error in {}: {err}", hook.name());
        let Some(component) = self.component.as_mut() else {
            return;
        };
        for error_hook in self.error_hooks.iter_mut() {
            error_hook(component, err);
        }
    }

    fn reject_after_destroy(&self, action: &str) -> bool {
        if self.destroyed {
            log::warn!(target: "component.lifecycle", "cannot {action} destroyed component");
        }
        self.destroyed
    }
}

impl<C: fmt::Debug> fmt::Debug for Lifecycle<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lifecycle")
            .field("component", &self.component)
            .field("hooks", &self.hooks.values().map(Vec::len).sum::<usize>())
            .field("cleanups", &self.cleanups.len())
            .field("destroyed", &self.destroyed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Debug, Default)]
    struct Widget {
        events: Vec<String>,
    }

    fn note(label: &'static str) -> impl FnMut(&mut Widget) -> Result<(), ComponentError> {
        move |w: &mut Widget| {
            w.events.push(label.to_string());
            Ok(())
        }
    }

    #[test]
    fn hooks_run_in_registration_order() {
        let mut lifecycle = Lifecycle::new(Widget::default());
        lifecycle.on_mounted(note("a"));
        lifecycle.on_mounted(note("b"));
        lifecycle.on_before_mount(note("before"));
        lifecycle.run_hook(Hook::BeforeMount);
        lifecycle.run_hook(Hook::Mounted);
        lifecycle.run_hook(Hook::Mounted);
        assert_eq!(
            lifecycle.component().unwrap().events,
            vec!["before", "a", "b", "a", "b"]
        );
    }

    #[test]
    fn failing_hook_routes_to_error_hooks() {
        let mut lifecycle = Lifecycle::new(Widget::default());
        lifecycle.on_updated(|_| Err(ComponentError::msg("render failed")));
        lifecycle.on_updated(note("after"));
        lifecycle.on_error(|w, err| w.events.push(format!("error: {err}")));

        assert_eq!(lifecycle.run_hook(Hook::Updated), 1);
        assert_eq!(
            lifecycle.component().unwrap().events,
            vec!["error: render failed", "after"]
        );
    }

    #[test]
    fn destroy_runs_teardown_in_order() {
        let order: Rc<RefCell<Vec<&'static str>>> = Rc::default();
        let mut lifecycle = Lifecycle::new(Widget::default());
        let o = Rc::clone(&order);
        lifecycle.on_before_destroy(move |_| {
            o.borrow_mut().push("beforeDestroy");
            Ok(())
        });
        let o = Rc::clone(&order);
        lifecycle.add_cleanup(move || {
            o.borrow_mut().push("cleanup");
            Ok(())
        });
        let o = Rc::clone(&order);
        lifecycle.on_destroyed(move |_| {
            o.borrow_mut().push("destroyed");
            Ok(())
        });

        assert!(lifecycle.destroy().is_some());
        assert_eq!(*order.borrow(), vec!["beforeDestroy", "cleanup", "destroyed"]);
        assert!(lifecycle.is_destroyed());
        assert!(lifecycle.destroy().is_none());
    }

    #[test]
    fn destroyed_lifecycle_ignores_registration_and_runs() {
        let mut lifecycle = Lifecycle::new(Widget::default());
        lifecycle.destroy();
        lifecycle.on_mounted(note("late"));
        assert_eq!(lifecycle.run_hook(Hook::Mounted), 0);
        assert!(lifecycle.component().is_none());
    }

    #[test]
    fn panicking_cleanup_is_reported() {
        let errors = Rc::new(RefCell::new(0));
        let mut lifecycle = Lifecycle::new(Widget::default());
        let seen = Rc::clone(&errors);
        lifecycle.on_error(move |_, _| *seen.borrow_mut() += 1);
        lifecycle.add_cleanup(|| panic!("cleanup exploded"));
        let widget = lifecycle.destroy();
        assert!(widget.is_some());
        assert_eq!(*errors.borrow(), 1);
    }
}
