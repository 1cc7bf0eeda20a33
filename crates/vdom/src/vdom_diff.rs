//! Virtual tree diffing to patch values.
//!
//! Contract:
//! - `diff` never mutates its inputs and never fails for well-formed trees.
//! - Absent old node -> `Create`; absent new node -> `Remove`.
//! - Nodes of a different kind, tag or key -> `Replace`.
//! - Text nodes are leaves: equal text is unchanged, different text is a
//!   `Replace` (there is no in-place text update).
//! - Element children use key-based reconciliation when both child lists
//!   carry at least one key, positional reconciliation otherwise.
//! - Keyed pairs whose subtrees differ in any way are replaced wholesale; only
//!   their position is reconciled incrementally.
//! - Unkeyed children inside a keyed list are not matched up (known gap:
//!   mixing keyed and unkeyed siblings leaves the unkeyed ones untouched).
//!
//! Complexity: O(n) in the number of children per level plus map storage.

use crate::types::{Element, VNode};
use crate::vdom_patch::{KeyedOp, Move, Patch};
use std::collections::HashMap;

pub fn diff(old: Option<&VNode>, new: Option<&VNode>) -> Option<Patch> {
    match (old, new) {
        (None, None) => None,
        (None, Some(new)) => Some(Patch::Create { node: new.clone() }),
        (Some(_), None) => Some(Patch::Remove),
        (Some(old), Some(new)) => diff_nodes(old, new),
    }
}

/// `true` if the two nodes differ in kind, tag or key.
///
/// Text content is not inspected here.
pub fn has_changed(old: &VNode, new: &VNode) -> bool {
    old.kind() != new.kind() || old.tag() != new.tag() || old.key() != new.key()
}

fn diff_nodes(old: &VNode, new: &VNode) -> Option<Patch> {
    if has_changed(old, new) {
        log::trace!(
            target: "vdom.diff",
            "replace {:?}/{:?} -> {:?}/{:?}",
            old.tag(),
            old.key(),
            new.tag(),
            new.key()
        );
        return Some(Patch::Replace { node: new.clone() });
    }
    match (old, new) {
        (VNode::Text(old_text), VNode::Text(new_text)) => {
            if old_text == new_text {
                None
            } else {
                Some(Patch::Replace { node: new.clone() })
            }
        }
        (VNode::Element(old_el), VNode::Element(new_el)) => Some(diff_children(old_el, new_el)),
        // Kind mismatch is caught by `has_changed`.
        _ => Some(Patch::Replace { node: new.clone() }),
    }
}

fn diff_children(old: &Element, new: &Element) -> Patch {
    if has_keys(old.children()) && has_keys(new.children()) {
        diff_keyed(old.children(), new.children())
    } else {
        diff_positional(old.children(), new.children())
    }
}

fn has_keys(children: &[VNode]) -> bool {
    children.iter().any(|child| child.key().is_some())
}

fn diff_positional(old: &[VNode], new: &[VNode]) -> Patch {
    let len = old.len().max(new.len());
    let patches = (0..len)
        .map(|i| diff(old.get(i), new.get(i)))
        .collect();
    Patch::UpdateChildren { patches }
}

/// Maps each key to the first index carrying it.
fn keyed_positions(children: &[VNode]) -> HashMap<&str, usize> {
    let mut map = HashMap::with_capacity(children.len());
    for (index, child) in children.iter().enumerate() {
        if let Some(key) = child.key() {
            map.entry(key).or_insert(index);
        }
    }
    map
}

fn diff_keyed(old: &[VNode], new: &[VNode]) -> Patch {
    let old_map = keyed_positions(old);
    let new_map = keyed_positions(new);
    let mut ops = Vec::new();
    let mut moves = Vec::new();

    for (index, child) in old.iter().enumerate() {
        let Some(key) = child.key() else {
            continue;
        };
        if old_map.get(key) != Some(&index) {
            log::warn!(target: "vdom.diff", "duplicate sibling key {key:?} at old index {index}");
            ops.push(KeyedOp::Remove { index });
            continue;
        }
        match new_map.get(key) {
            None => ops.push(KeyedOp::Remove { index }),
            Some(&new_index) => {
                let next = &new[new_index];
                if has_changed(child, next) || child != next {
                    ops.push(KeyedOp::Replace {
                        index,
                        node: next.clone(),
                    });
                }
            }
        }
    }

    for (index, child) in new.iter().enumerate() {
        let Some(key) = child.key() else {
            continue;
        };
        if new_map.get(key) != Some(&index) {
            log::warn!(target: "vdom.diff", "duplicate sibling key {key:?} at new index {index}");
            ops.push(KeyedOp::Create {
                index,
                node: child.clone(),
            });
            continue;
        }
        match old_map.get(key) {
            None => ops.push(KeyedOp::Create {
                index,
                node: child.clone(),
            }),
            Some(&old_index) if old_index != index => moves.push(Move {
                from: old_index,
                to: index,
            }),
            Some(_) => {}
        }
    }

    log::trace!(
        target: "vdom.diff",
        "keyed diff: {} old, {} new, {} ops, {} moves",
        old.len(),
        new.len(),
        ops.len(),
        moves.len()
    );
    Patch::KeyedUpdate { ops, moves }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{Child, create_node, leaf};
    use crate::types::Props;

    fn keyed(tag: &str, key: &str, text: &str) -> VNode {
        create_node(tag, Props::new().with("key", key), [text])
    }

    fn list(items: Vec<VNode>) -> VNode {
        create_node("div", Props::new(), [Child::from(items)])
    }

    #[test]
    fn missing_old_node_creates() {
        let node = leaf("div", Props::new());
        assert_eq!(
            diff(None, Some(&node)),
            Some(Patch::Create { node: node.clone() })
        );
    }

    #[test]
    fn missing_new_node_removes() {
        let node = leaf("div", Props::new());
        assert_eq!(diff(Some(&node), None), Some(Patch::Remove));
    }

    #[test]
    fn numeric_and_text_keys_with_the_same_digits_match() {
        let numbered = leaf("li", Props::new().with("key", 1));
        let named = leaf("li", Props::new().with("key", "1"));
        assert!(!has_changed(&numbered, &named));
        assert!(has_changed(&numbered, &leaf("li", Props::new().with("key", 2))));
    }

    #[test]
    fn different_tag_replaces() {
        let old = leaf("div", Props::new());
        let new = leaf("span", Props::new());
        assert!(has_changed(&old, &new));
        assert_eq!(
            diff(Some(&old), Some(&new)),
            Some(Patch::Replace { node: new.clone() })
        );
    }

    #[test]
    fn different_key_replaces() {
        let old = leaf("div", Props::new().with("key", "old"));
        let new = leaf("div", Props::new().with("key", "new"));
        assert!(has_changed(&old, &new));
        assert!(matches!(
            diff(Some(&old), Some(&new)),
            Some(Patch::Replace { .. })
        ));
    }

    #[test]
    fn text_and_element_are_different_kinds() {
        let text = VNode::text("div");
        let element = leaf("div", Props::new());
        assert!(has_changed(&text, &element));
    }

    #[test]
    fn text_content_change_is_replace() {
        let old = VNode::text("a");
        let new = VNode::text("b");
        assert!(!has_changed(&old, &new));
        assert_eq!(
            diff(Some(&old), Some(&new)),
            Some(Patch::Replace { node: new.clone() })
        );
        assert_eq!(diff(Some(&old), Some(&old)), None);
    }

    #[test]
    fn positional_children_are_diffed_by_index() {
        let old = create_node("div", Props::new(), [leaf("span", Props::new())]);
        let new = create_node(
            "div",
            Props::new(),
            [leaf("p", Props::new()), leaf("em", Props::new())],
        );
        let Some(Patch::UpdateChildren { patches }) = diff(Some(&old), Some(&new)) else {
            panic!("expected positional update");
        };
        assert_eq!(patches.len(), 2);
        assert!(matches!(patches[0], Some(Patch::Replace { .. })));
        assert!(matches!(patches[1], Some(Patch::Create { .. })));
    }

    #[test]
    fn identical_trees_diff_to_noop() {
        let tree = create_node(
            "div",
            Props::new().with("id", "root"),
            [
                Child::from(create_node("p", Props::new(), ["hello"])),
                Child::from(list(vec![keyed("li", "a", "A"), keyed("li", "b", "B")])),
            ],
        );
        let copy = tree.clone();
        let patch = diff(Some(&tree), Some(&copy)).expect("element diff is always a patch");
        assert!(matches!(patch, Patch::UpdateChildren { .. }));
        assert!(patch.is_noop());

        let keyed_list = list(vec![keyed("li", "a", "A")]);
        let patch = diff(Some(&keyed_list), Some(&keyed_list)).expect("patch");
        assert!(matches!(patch, Patch::KeyedUpdate { .. }));
        assert!(patch.is_noop());
    }

    #[test]
    fn rotation_emits_one_move_per_displaced_key() {
        let old = list(vec![keyed("div", "A", "A"), keyed("div", "B", "B"), keyed("div", "C", "C")]);
        let new = list(vec![keyed("div", "B", "B"), keyed("div", "C", "C"), keyed("div", "A", "A")]);
        let Some(Patch::KeyedUpdate { ops, moves }) = diff(Some(&old), Some(&new)) else {
            panic!("expected keyed update");
        };
        assert!(ops.is_empty());
        assert_eq!(
            moves,
            vec![
                Move { from: 1, to: 0 },
                Move { from: 2, to: 1 },
                Move { from: 0, to: 2 },
            ]
        );
    }

    #[test]
    fn keyed_update_marks_remove_replace_create_and_moves() {
        let old = list(vec![
            keyed("div", "1", "First"),
            keyed("div", "2", "Second"),
            keyed("div", "3", "Third"),
        ]);
        let new = list(vec![
            keyed("div", "3", "Third"),
            keyed("div", "1", "First Updated"),
            keyed("div", "4", "Fourth"),
        ]);
        let Some(Patch::KeyedUpdate { ops, moves }) = diff(Some(&old), Some(&new)) else {
            panic!("expected keyed update");
        };
        assert_eq!(
            ops,
            vec![
                KeyedOp::Replace {
                    index: 0,
                    node: keyed("div", "1", "First Updated"),
                },
                KeyedOp::Remove { index: 1 },
                KeyedOp::Create {
                    index: 2,
                    node: keyed("div", "4", "Fourth"),
                },
            ]
        );
        assert_eq!(moves, vec![Move { from: 2, to: 0 }, Move { from: 0, to: 1 }]);
    }

    #[test]
    fn keyed_mode_needs_keys_on_both_sides() {
        let old = list(vec![leaf("li", Props::new()), leaf("li", Props::new())]);
        let new = list(vec![keyed("li", "a", "A")]);
        assert!(matches!(
            diff(Some(&old), Some(&new)),
            Some(Patch::UpdateChildren { .. })
        ));
    }

    #[test]
    fn unkeyed_siblings_are_left_alone_in_keyed_mode() {
        let old = list(vec![keyed("li", "a", "A"), leaf("hr", Props::new())]);
        let new = list(vec![leaf("br", Props::new()), keyed("li", "a", "A")]);
        let Some(Patch::KeyedUpdate { ops, moves }) = diff(Some(&old), Some(&new)) else {
            panic!("expected keyed update");
        };
        assert!(ops.is_empty());
        assert_eq!(moves, vec![Move { from: 0, to: 1 }]);
    }

    #[test]
    fn duplicate_keys_fall_back_to_remove_and_create() {
        let old = list(vec![keyed("li", "a", "A"), keyed("li", "a", "A2")]);
        let new = list(vec![keyed("li", "a", "A"), keyed("li", "a", "A3")]);
        let Some(Patch::KeyedUpdate { ops, moves }) = diff(Some(&old), Some(&new)) else {
            panic!("expected keyed update");
        };
        assert_eq!(
            ops,
            vec![
                KeyedOp::Remove { index: 1 },
                KeyedOp::Create {
                    index: 1,
                    node: keyed("li", "a", "A3"),
                },
            ]
        );
        assert!(moves.is_empty());
    }

    #[test]
    fn diff_does_not_touch_inputs() {
        let old = list(vec![keyed("li", "a", "A"), keyed("li", "b", "B")]);
        let new = list(vec![keyed("li", "b", "B")]);
        let (old_copy, new_copy) = (old.clone(), new.clone());
        let _ = diff(Some(&old), Some(&new));
        assert_eq!(old, old_copy);
        assert_eq!(new, new_copy);
    }
}
