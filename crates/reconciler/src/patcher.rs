//! Patch application against a [`HostTree`].
//!
//! Contract:
//! - `apply_patch` resolves every index against the host child list as it
//!   is at the moment the patch lands, never against a captured reference.
//! - A missing child at an addressed index is tolerated: `Remove` is a
//!   no-op, `Replace` falls back to append, nested updates are skipped.
//! - `materialize` is the only place virtual nodes turn into host nodes.
//!
//! Keyed updates resolve old indices against a snapshot of the element's
//! children taken before the first mutation, so removals and swaps never
//! shift the targets of later operations in the same patch.

use core_types::HostId;
use host::{ElementDescriptor, HostError, HostTree};
use std::collections::HashSet;
use std::fmt;
use vdom::{KeyedOp, Move, Patch, PropValue, Props, VNode};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatchError {
    Host(HostError),
    /// An element node carried an empty tag.
    EmptyTag,
    /// The host tree was already borrowed when a queued patch ran.
    HostBusy,
}

impl fmt::Display for PatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatchError::Host(err) => write!(f, "host mutation failed: {err}"),
            PatchError::EmptyTag => f.write_str("element node has an empty tag"),
            PatchError::HostBusy => f.write_str("host tree is borrowed elsewhere"),
        }
    }
}

impl std::error::Error for PatchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PatchError::Host(err) => Some(err),
            PatchError::EmptyTag | PatchError::HostBusy => None,
        }
    }
}

impl From<HostError> for PatchError {
    fn from(err: HostError) -> Self {
        PatchError::Host(err)
    }
}

const KEY_ATTRIBUTE: &str = "data-key";
const CLASS_PROP: &str = "className";
const EVENT_PREFIX: &str = "on";

/// Resolve props into the attributes and listeners a host element receives.
pub fn describe(tag: &str, props: &Props) -> ElementDescriptor {
    let mut desc = ElementDescriptor {
        tag: tag.into(),
        ..ElementDescriptor::default()
    };
    for (name, value) in props.iter() {
        if let Some(event) = event_name(name, value) {
            if let Some(handler) = value.as_handler() {
                desc.listeners.push((event.into(), handler.clone()));
            }
            continue;
        }
        let Some(rendered) = value.render() else {
            continue;
        };
        let attribute = match &**name {
            Props::KEY => KEY_ATTRIBUTE,
            CLASS_PROP => "class",
            other => other,
        };
        desc.attributes.push((attribute.into(), rendered));
    }
    desc
}

/// `onClick` with a handler value binds `click`.
fn event_name(name: &str, value: &PropValue) -> Option<String> {
    let suffix = name.strip_prefix(EVENT_PREFIX)?;
    if suffix.is_empty() || value.as_handler().is_none() {
        return None;
    }
    Some(suffix.to_lowercase())
}

/// Build a detached host subtree for `node`.
pub fn materialize<H: HostTree + ?Sized>(host: &mut H, node: &VNode) -> Result<HostId, PatchError> {
    match node {
        VNode::Text(text) => Ok(host.create_text(text)),
        VNode::Element(element) => {
            if element.tag().is_empty() {
                return Err(PatchError::EmptyTag);
            }
            let id = host.create_element(&describe(element.tag(), element.props()));
            for child in element.children() {
                let child_id = materialize(host, child)?;
                host.append_child(id, child_id)?;
            }
            Ok(id)
        }
    }
}

/// Apply `patch` to the child of `parent` at `index`, synchronously.
pub fn apply_patch<H: HostTree + ?Sized>(
    host: &mut H,
    parent: HostId,
    patch: &Patch,
    index: usize,
) -> Result<(), PatchError> {
    match patch {
        Patch::Create { node } => {
            let id = materialize(host, node)?;
            host.append_child(parent, id)?;
        }
        Patch::Remove => match host.child_at(parent, index) {
            Some(child) => host.remove_child(parent, child)?,
            None => log::trace!(target: "reconciler.patch", "remove: no child at {index}"),
        },
        Patch::Replace { node } => {
            let id = materialize(host, node)?;
            match host.child_at(parent, index) {
                Some(old) => host.replace_child(parent, id, old)?,
                None => {
                    log::trace!(target: "reconciler.patch", "replace: stale index {index}, appending");
                    host.append_child(parent, id)?;
                }
            }
        }
        Patch::UpdateChildren { patches } => match host.child_at(parent, index) {
            Some(element) => apply_children(host, element, patches)?,
            None => log::trace!(target: "reconciler.patch", "update-children: no child at {index}"),
        },
        Patch::KeyedUpdate { ops, moves } => match host.child_at(parent, index) {
            Some(element) => apply_keyed(host, element, ops, moves)?,
            None => log::trace!(target: "reconciler.patch", "keyed-update: no child at {index}"),
        },
    }
    Ok(())
}

fn apply_children<H: HostTree + ?Sized>(
    host: &mut H,
    element: HostId,
    patches: &[Option<Patch>],
) -> Result<(), PatchError> {
    for (i, patch) in patches.iter().enumerate() {
        match patch {
            Some(Patch::Remove) | None => {}
            Some(patch) => apply_patch(host, element, patch, i)?,
        }
    }
    // Highest index first so earlier removals do not shift later ones.
    for (i, patch) in patches.iter().enumerate().rev() {
        if let Some(patch @ Patch::Remove) = patch {
            apply_patch(host, element, patch, i)?;
        }
    }
    Ok(())
}

fn apply_keyed<H: HostTree + ?Sized>(
    host: &mut H,
    element: HostId,
    ops: &[KeyedOp],
    moves: &[Move],
) -> Result<(), PatchError> {
    let mut snapshot: Vec<Option<HostId>> = (0..host.child_count(element))
        .map(|i| host.child_at(element, i))
        .collect();

    for op in ops {
        if let KeyedOp::Remove { index } = op {
            match snapshot.get_mut(*index).and_then(Option::take) {
                Some(child) => host.remove_child(element, child)?,
                None => log::trace!(target: "reconciler.patch", "keyed remove: no child at {index}"),
            }
        }
    }

    for op in ops {
        if let KeyedOp::Replace { index, node } = op {
            let fresh = materialize(host, node)?;
            match snapshot.get(*index).copied().flatten() {
                Some(old) => {
                    host.replace_child(element, fresh, old)?;
                    snapshot[*index] = Some(fresh);
                }
                None => host.append_child(element, fresh)?,
            }
        }
    }

    let mut creates: Vec<(usize, &VNode)> = ops
        .iter()
        .filter_map(|op| match op {
            KeyedOp::Create { index, node } => Some((*index, node)),
            _ => None,
        })
        .collect();
    creates.sort_by_key(|(index, _)| *index);
    let mut ordered = moves.to_vec();
    ordered.sort_by_key(|m| m.to);
    let moved_from: HashSet<usize> = moves.iter().map(|m| m.from).collect();

    let end = snapshot
        .len()
        .max(creates.last().map_or(0, |(index, _)| index + 1))
        .max(ordered.last().map_or(0, |m| m.to + 1));

    let mut creates = creates.into_iter().peekable();
    let mut ordered = ordered.into_iter().peekable();
    let mut cursor = 0;
    for target in 0..end {
        while let Some((_, node)) = creates.next_if(|(index, _)| *index == target) {
            let id = materialize(host, node)?;
            place(host, element, id, cursor)?;
            cursor += 1;
        }
        while let Some(m) = ordered.next_if(|m| m.to == target) {
            match snapshot.get(m.from).copied().flatten() {
                Some(id) => {
                    place(host, element, id, cursor)?;
                    cursor += 1;
                }
                None => log::trace!(target: "reconciler.patch", "move: no child at {}", m.from),
            }
        }
        if moved_from.contains(&target) {
            continue;
        }
        if let Some(id) = snapshot.get(target).copied().flatten() {
            place(host, element, id, cursor)?;
            cursor += 1;
        }
    }

    log::debug!(
        target: "reconciler.patch",
        "keyed update on {}: {} ops, {} moves",
        element.0,
        ops.len(),
        moves.len()
    );
    Ok(())
}

/// Put `node` at `position` in `parent`, appending when out of range.
fn place<H: HostTree + ?Sized>(
    host: &mut H,
    parent: HostId,
    node: HostId,
    position: usize,
) -> Result<(), PatchError> {
    match host.child_at(parent, position) {
        Some(current) if current == node => Ok(()),
        Some(before) => Ok(host.insert_before(parent, node, before)?),
        None => Ok(host.append_child(parent, node)?),
    }
}
