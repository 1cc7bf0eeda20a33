//! Virtual node construction.
//!
//! `create_node` is pure: no validation, no side effects. Children are
//! flattened exactly one level, so a `Child::Many` is spliced into the parent
//! list while nodes nested deeper stay where they are.

use crate::types::{Element, Props, VNode};
use std::sync::Arc;

/// A child argument to [`create_node`].
#[derive(Clone, Debug, PartialEq)]
pub enum Child {
    Node(VNode),
    Many(Vec<VNode>),
}

impl From<VNode> for Child {
    fn from(node: VNode) -> Self {
        Child::Node(node)
    }
}

impl From<&str> for Child {
    fn from(text: &str) -> Self {
        Child::Node(VNode::text(text))
    }
}

impl From<String> for Child {
    fn from(text: String) -> Self {
        Child::Node(VNode::text(text))
    }
}

impl From<Vec<VNode>> for Child {
    fn from(nodes: Vec<VNode>) -> Self {
        Child::Many(nodes)
    }
}

pub fn create_node<I>(tag: impl Into<Arc<str>>, props: Props, children: I) -> VNode
where
    I: IntoIterator,
    I::Item: Into<Child>,
{
    let mut flat = Vec::new();
    for child in children {
        match child.into() {
            Child::Node(node) => flat.push(node),
            Child::Many(nodes) => flat.extend(nodes),
        }
    }
    VNode::Element(Element::new(tag.into(), props, flat))
}

/// Childless element shorthand.
pub fn leaf(tag: impl Into<Arc<str>>, props: Props) -> VNode {
    create_node(tag, props, Vec::<Child>::new())
}
