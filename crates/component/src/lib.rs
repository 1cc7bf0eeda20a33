//! Component-side collaborators of the reconciler.
//!
//! These are registries and validators rather than reconciliation logic:
//! - [`EventBus`]: named events with a per-event listener bound.
//! - [`Lifecycle`]: ordered hook lists run against a component value.
//! - [`StateStore`]: keyed values with subscribers and batched commits.
//! - [`validate_props`]: declarative prop schema checks.
//!
//! Callback failures never escape these types. They are caught at the
//! nearest boundary, logged, and forwarded to the error handler if one is
//! installed.

pub mod events;
pub mod lifecycle;
pub mod props;
pub mod state;

pub use crate::events::EventBus;
pub use crate::lifecycle::{Hook, Lifecycle};
pub use crate::props::{PropRule, PropType, validate_props};
pub use crate::state::StateStore;

use std::fmt;
use std::panic::{self, AssertUnwindSafe};

#[derive(Debug)]
pub enum ComponentError {
    /// A listener was rejected because its event is already at the bound.
    MaxListeners { event: String, limit: usize },
    /// A callback returned an error.
    Callback(Box<dyn std::error::Error>),
    /// A callback panicked.
    Panicked(String),
}

impl ComponentError {
    pub fn callback(err: impl std::error::Error + 'static) -> Self {
        ComponentError::Callback(Box::new(err))
    }

    /// Wrap a plain message as a callback failure.
    pub fn msg(message: impl Into<String>) -> Self {
        let message: String = message.into();
        ComponentError::Callback(message.into())
    }
}

impl fmt::Display for ComponentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComponentError::MaxListeners { event, limit } => {
                write!(f, "Max listeners ({limit}) exceeded for event: {event}")
            }
            ComponentError::Callback(err) => write!(f, "{err}"),
            ComponentError::Panicked(msg) => write!(f, "callback panicked: {msg}"),
        }
    }
}

impl std::error::Error for ComponentError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ComponentError::Callback(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

/// Handle returned by a registration; `cancel` undoes it.
///
/// Dropping the handle keeps the registration alive.
#[must_use = "dropping a Subscription keeps the registration; call cancel() to undo it"]
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    pub(crate) fn new(cancel: impl FnOnce() + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    pub fn cancel(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

pub(crate) type ErrorHandler = std::rc::Rc<dyn Fn(&ComponentError)>;

/// Run `f`, turning a panic into [`ComponentError::Panicked`].
pub(crate) fn guarded(f: impl FnOnce() -> Result<(), ComponentError>) -> Result<(), ComponentError> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|msg| (*msg).to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "non-string panic payload".to_string());
            Err(ComponentError::Panicked(message))
        }
    }
}
