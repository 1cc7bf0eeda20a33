//! Host-node boundary.
//!
//! [`HostTree`] is the only surface the reconciler uses to touch a concrete
//! rendering target. Hosts address their nodes with [`HostId`] handles and
//! follow DOM child-list semantics: inserting a node that already has a
//! parent moves it.
//!
//! [`MemoryHost`] is an arena-backed implementation used by tests, the demo
//! binary and headless embedders.

mod memory;
#[cfg(any(test, feature = "snapshot"))]
pub mod snapshot;

pub use crate::memory::MemoryHost;
pub use core_types::HostId;

use std::fmt;
use std::sync::Arc;
use vdom::Handler;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostError {
    UnknownNode(HostId),
    /// Text nodes cannot hold children.
    InvalidParent(HostId),
    NotAChild { parent: HostId, child: HostId },
    CycleDetected { parent: HostId, child: HostId },
}

impl fmt::Display for HostError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostError::UnknownNode(id) => write!(f, "unknown host node {}", id.0),
            HostError::InvalidParent(id) => write!(f, "host node {} cannot have children", id.0),
            HostError::NotAChild { parent, child } => {
                write!(f, "host node {} is not a child of {}", child.0, parent.0)
            }
            HostError::CycleDetected { parent, child } => write!(
                f,
                "inserting {} under {} would create a cycle",
                child.0, parent.0
            ),
        }
    }
}

impl std::error::Error for HostError {}

/// Fully resolved description of an element to create.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ElementDescriptor {
    pub tag: Arc<str>,
    pub attributes: Vec<(Arc<str>, String)>,
    pub listeners: Vec<(Arc<str>, Handler)>,
}

pub trait HostTree {
    fn create_element(&mut self, desc: &ElementDescriptor) -> HostId;
    fn create_text(&mut self, text: &str) -> HostId;

    fn child_count(&self, parent: HostId) -> usize;
    fn child_at(&self, parent: HostId, index: usize) -> Option<HostId>;
    /// Handlers bound to `event` on `node`, in registration order.
    fn listeners(&self, node: HostId, event: &str) -> Vec<Handler>;

    fn append_child(&mut self, parent: HostId, child: HostId) -> Result<(), HostError>;
    /// Insert `child` immediately before `before`, detaching it first if it
    /// already has a parent.
    fn insert_before(
        &mut self,
        parent: HostId,
        child: HostId,
        before: HostId,
    ) -> Result<(), HostError>;
    fn remove_child(&mut self, parent: HostId, child: HostId) -> Result<(), HostError>;
    fn replace_child(
        &mut self,
        parent: HostId,
        new_child: HostId,
        old_child: HostId,
    ) -> Result<(), HostError>;
}
