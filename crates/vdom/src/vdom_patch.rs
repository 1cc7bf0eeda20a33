//! Patch values produced by the differ and consumed by the patcher.
//!
//! Invariants:
//! - A patch is a pure value; it never references live host nodes.
//! - Positions are child-list indices resolved by the applier against the
//!   host tree at apply time.
//! - `UpdateChildren::patches[i]` addresses child `i` of the host node the
//!   patch is applied to; `None` means that child is unchanged.
//! - In `KeyedUpdate`, removals and replacements carry indices into the
//!   *old* child list, creations carry indices into the *new* child list.
//! - `moves` are listed in ascending target order and each move observes the
//!   child list as left by the moves before it.

use crate::types::VNode;

#[derive(Clone, Debug, PartialEq)]
pub enum Patch {
    /// Host tree is missing this node; materialize and append it.
    Create { node: VNode },
    /// Remove the host child at the addressed index.
    Remove,
    /// Host node is structurally incompatible; materialize and swap.
    Replace { node: VNode },
    /// Positional child reconciliation.
    UpdateChildren { patches: Vec<Option<Patch>> },
    /// Key-based child reconciliation.
    KeyedUpdate {
        ops: Vec<KeyedOp>,
        moves: Vec<Move>,
    },
}

/// Per-index operation inside a keyed reconciliation.
#[derive(Clone, Debug, PartialEq)]
pub enum KeyedOp {
    /// Remove the child at this old index.
    Remove { index: usize },
    /// Swap the child at this old index for a freshly materialized node.
    Replace { index: usize, node: VNode },
    /// Insert a new node at this new index.
    Create { index: usize, node: VNode },
}

impl KeyedOp {
    pub fn index(&self) -> usize {
        match self {
            KeyedOp::Remove { index }
            | KeyedOp::Replace { index, .. }
            | KeyedOp::Create { index, .. } => *index,
        }
    }
}

/// Relocation of a retained keyed child from its old index to its new one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Move {
    pub from: usize,
    pub to: usize,
}

impl Patch {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Patch::Create { .. } => "create",
            Patch::Remove => "remove",
            Patch::Replace { .. } => "replace",
            Patch::UpdateChildren { .. } => "update-children",
            Patch::KeyedUpdate { .. } => "keyed-update",
        }
    }

    /// `true` when applying this patch would not mutate the host tree.
    pub fn is_noop(&self) -> bool {
        match self {
            Patch::Create { .. } | Patch::Remove | Patch::Replace { .. } => false,
            Patch::UpdateChildren { patches } => patches
                .iter()
                .all(|patch| patch.as_ref().is_none_or(Patch::is_noop)),
            Patch::KeyedUpdate { ops, moves } => ops.is_empty() && moves.is_empty(),
        }
    }

    /// Number of host mutations this patch describes, counted recursively.
    pub fn op_count(&self) -> usize {
        match self {
            Patch::Create { .. } | Patch::Remove | Patch::Replace { .. } => 1,
            Patch::UpdateChildren { patches } => {
                patches.iter().flatten().map(Patch::op_count).sum()
            }
            Patch::KeyedUpdate { ops, moves } => ops.len() + moves.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_empty_updates_are_noops() {
        let patch = Patch::UpdateChildren {
            patches: vec![
                None,
                Some(Patch::UpdateChildren {
                    patches: vec![None],
                }),
                Some(Patch::KeyedUpdate {
                    ops: Vec::new(),
                    moves: Vec::new(),
                }),
            ],
        };
        assert!(patch.is_noop());
        assert_eq!(patch.op_count(), 0);
    }

    #[test]
    fn any_mutation_breaks_noop() {
        let patch = Patch::UpdateChildren {
            patches: vec![None, Some(Patch::Remove)],
        };
        assert!(!patch.is_noop());
        assert_eq!(patch.op_count(), 1);

        let keyed = Patch::KeyedUpdate {
            ops: Vec::new(),
            moves: vec![Move { from: 1, to: 0 }],
        };
        assert!(!keyed.is_noop());
    }
}
