use crate::{ElementDescriptor, HostError, HostTree};
use core_types::HostId;
use std::sync::Arc;
use vdom::{Event, Handler};

/// Arena-backed host tree.
///
/// `remove_child` and `replace_child` release the detached node and its
/// whole subtree. Released slots are reused by later creates, so a handle to
/// a removed node must not be used again. Moving a node with `append_child`
/// or `insert_before` keeps it alive.
#[derive(Default)]
pub struct MemoryHost {
    nodes: Vec<NodeRecord>,
    free: Vec<usize>,
}

struct NodeRecord {
    kind: NodeKind,
    parent: Option<HostId>,
    children: Vec<HostId>,
}

impl NodeRecord {
    fn allows_children(&self) -> bool {
        matches!(self.kind, NodeKind::Element { .. })
    }

    fn is_free(&self) -> bool {
        matches!(self.kind, NodeKind::Free)
    }
}

enum NodeKind {
    Element {
        tag: Arc<str>,
        attributes: Vec<(Arc<str>, String)>,
        listeners: Vec<(Arc<str>, Handler)>,
    },
    Text {
        text: String,
    },
    Free,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a detached container element to render into.
    pub fn create_root(&mut self, tag: &str) -> HostId {
        self.create_element(&ElementDescriptor {
            tag: tag.into(),
            ..ElementDescriptor::default()
        })
    }

    /// Live nodes, attached or not.
    pub fn node_count(&self) -> usize {
        self.nodes.len() - self.free.len()
    }

    pub fn tag(&self, id: HostId) -> Option<&str> {
        match &self.record(id)?.kind {
            NodeKind::Element { tag, .. } => Some(tag),
            _ => None,
        }
    }

    pub fn text(&self, id: HostId) -> Option<&str> {
        match &self.record(id)?.kind {
            NodeKind::Text { text } => Some(text),
            _ => None,
        }
    }

    pub fn attributes(&self, id: HostId) -> &[(Arc<str>, String)] {
        match self.record(id).map(|record| &record.kind) {
            Some(NodeKind::Element { attributes, .. }) => attributes,
            _ => &[],
        }
    }

    pub fn attribute(&self, id: HostId, name: &str) -> Option<&str> {
        self.attributes(id)
            .iter()
            .find(|(attr, _)| &**attr == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn children(&self, id: HostId) -> &[HostId] {
        self.record(id)
            .map(|record| record.children.as_slice())
            .unwrap_or(&[])
    }

    pub fn parent(&self, id: HostId) -> Option<HostId> {
        self.record(id)?.parent
    }

    /// Concatenated text of all descendant text nodes, in document order.
    pub fn text_content(&self, id: HostId) -> String {
        let mut out = String::new();
        self.collect_text(id, &mut out);
        out
    }

    fn collect_text(&self, id: HostId, out: &mut String) {
        let Some(record) = self.record(id) else {
            return;
        };
        match &record.kind {
            NodeKind::Text { text } => out.push_str(text),
            NodeKind::Element { .. } => {
                for child in &record.children {
                    self.collect_text(*child, out);
                }
            }
            NodeKind::Free => {}
        }
    }

    pub fn listener_names(&self, id: HostId) -> Vec<&str> {
        match self.record(id).map(|record| &record.kind) {
            Some(NodeKind::Element { listeners, .. }) => {
                listeners.iter().map(|(name, _)| &**name).collect()
            }
            _ => Vec::new(),
        }
    }

    /// Invoke every `event` listener on `id`. Returns how many ran.
    ///
    /// Callers sharing the host through a `RefCell` should collect
    /// [`HostTree::listeners`] and release the borrow before invoking them.
    pub fn dispatch(&self, id: HostId, event: &str) -> usize {
        let handlers = self.listeners(id, event);
        let payload = Event {
            name: event.into(),
            target: id,
        };
        for handler in &handlers {
            handler.call(&payload);
        }
        handlers.len()
    }

    fn record(&self, id: HostId) -> Option<&NodeRecord> {
        let index = (id.0 as usize).checked_sub(1)?;
        self.nodes.get(index).filter(|record| !record.is_free())
    }

    fn index(&self, id: HostId) -> Result<usize, HostError> {
        let index = (id.0 as usize)
            .checked_sub(1)
            .ok_or(HostError::UnknownNode(id))?;
        if self.nodes.get(index).is_none_or(NodeRecord::is_free) {
            return Err(HostError::UnknownNode(id));
        }
        Ok(index)
    }

    fn push(&mut self, kind: NodeKind) -> HostId {
        let record = NodeRecord {
            kind,
            parent: None,
            children: Vec::new(),
        };
        match self.free.pop() {
            Some(index) => {
                self.nodes[index] = record;
                HostId(index as u32 + 1)
            }
            None => {
                self.nodes.push(record);
                HostId(self.nodes.len() as u32)
            }
        }
    }

    /// Free a detached node and every node below it.
    fn release(&mut self, root: HostId) {
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            let Ok(index) = self.index(id) else {
                continue;
            };
            let record = &mut self.nodes[index];
            stack.append(&mut record.children);
            record.kind = NodeKind::Free;
            record.parent = None;
            self.free.push(index);
        }
    }

    fn check_insert(&self, parent: HostId, child: HostId) -> Result<(usize, usize), HostError> {
        let parent_index = self.index(parent)?;
        let child_index = self.index(child)?;
        if !self.nodes[parent_index].allows_children() {
            return Err(HostError::InvalidParent(parent));
        }
        if parent == child || self.is_descendant(child, parent) {
            return Err(HostError::CycleDetected { parent, child });
        }
        Ok((parent_index, child_index))
    }

    fn detach(&mut self, child_index: usize, child: HostId) {
        let Some(parent) = self.nodes[child_index].parent.take() else {
            return;
        };
        if let Ok(parent_index) = self.index(parent) {
            self.nodes[parent_index].children.retain(|k| *k != child);
        }
    }

    fn position_of(&self, parent_index: usize, parent: HostId, child: HostId) -> Result<usize, HostError> {
        self.nodes[parent_index]
            .children
            .iter()
            .position(|k| *k == child)
            .ok_or(HostError::NotAChild { parent, child })
    }

    fn is_descendant(&self, ancestor: HostId, maybe_descendant: HostId) -> bool {
        let Ok(index) = self.index(ancestor) else {
            return false;
        };
        let mut stack = self.nodes[index].children.clone();
        while let Some(current) = stack.pop() {
            if current == maybe_descendant {
                return true;
            }
            if let Ok(child_index) = self.index(current) {
                stack.extend(self.nodes[child_index].children.iter().copied());
            }
        }
        false
    }
}

impl HostTree for MemoryHost {
    fn create_element(&mut self, desc: &ElementDescriptor) -> HostId {
        self.push(NodeKind::Element {
            tag: Arc::clone(&desc.tag),
            attributes: desc.attributes.clone(),
            listeners: desc.listeners.clone(),
        })
    }

    fn create_text(&mut self, text: &str) -> HostId {
        self.push(NodeKind::Text {
            text: text.to_string(),
        })
    }

    fn listeners(&self, node: HostId, event: &str) -> Vec<Handler> {
        match self.record(node).map(|record| &record.kind) {
            Some(NodeKind::Element { listeners, .. }) => listeners
                .iter()
                .filter(|(name, _)| &**name == event)
                .map(|(_, handler)| handler.clone())
                .collect(),
            _ => Vec::new(),
        }
    }

    fn child_count(&self, parent: HostId) -> usize {
        self.children(parent).len()
    }

    fn child_at(&self, parent: HostId, index: usize) -> Option<HostId> {
        self.children(parent).get(index).copied()
    }

    fn append_child(&mut self, parent: HostId, child: HostId) -> Result<(), HostError> {
        let (parent_index, child_index) = self.check_insert(parent, child)?;
        self.detach(child_index, child);
        self.nodes[parent_index].children.push(child);
        self.nodes[child_index].parent = Some(parent);
        Ok(())
    }

    fn insert_before(
        &mut self,
        parent: HostId,
        child: HostId,
        before: HostId,
    ) -> Result<(), HostError> {
        let (parent_index, child_index) = self.check_insert(parent, child)?;
        self.position_of(parent_index, parent, before)?;
        if child == before {
            return Ok(());
        }
        self.detach(child_index, child);
        let pos = self.position_of(parent_index, parent, before)?;
        self.nodes[parent_index].children.insert(pos, child);
        self.nodes[child_index].parent = Some(parent);
        Ok(())
    }

    fn remove_child(&mut self, parent: HostId, child: HostId) -> Result<(), HostError> {
        let parent_index = self.index(parent)?;
        let child_index = self.index(child)?;
        self.position_of(parent_index, parent, child)?;
        self.detach(child_index, child);
        self.release(child);
        Ok(())
    }

    fn replace_child(
        &mut self,
        parent: HostId,
        new_child: HostId,
        old_child: HostId,
    ) -> Result<(), HostError> {
        let (parent_index, new_index) = self.check_insert(parent, new_child)?;
        let old_index = self.index(old_child)?;
        self.position_of(parent_index, parent, old_child)?;
        if new_child == old_child {
            return Ok(());
        }
        self.detach(new_index, new_child);
        let pos = self.position_of(parent_index, parent, old_child)?;
        self.nodes[parent_index].children[pos] = new_child;
        self.nodes[new_index].parent = Some(parent);
        self.nodes[old_index].parent = None;
        self.release(old_child);
        Ok(())
    }
}
