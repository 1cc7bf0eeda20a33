//! Virtual node model, differ and result cache.
//!
//! Everything in this crate is host-agnostic: trees are plain values and
//! patches describe host mutations by child index only.

pub mod memo;
pub mod tree;
pub mod types;
pub mod vdom_diff;

mod vdom_patch;

pub use crate::memo::{Dependency, MemoCache, MemoStats};
pub use crate::tree::{Child, create_node, leaf};
pub use crate::types::{Element, Event, Handler, NodeKind, PropValue, Props, VNode, js_number};
pub use crate::vdom_diff::{diff, has_changed};
pub use crate::vdom_patch::{KeyedOp, Move, Patch};
