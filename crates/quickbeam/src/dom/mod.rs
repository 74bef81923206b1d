//! Output tree interface
//!
//! The VM never mutates an output tree directly. Every mutation goes through
//! an [`OutputAdapter`], so hosts can target a browser DOM, a virtual tree,
//! or anything else shaped like one. [`Document`] is an in-memory adapter
//! used by tests and embedders that just want a tree.

mod document;
mod stack;

pub use document::Document;
pub use stack::{AttributeBinding, AttributeValue, ElementOperations, ElementStack, PendingAttribute};

use serde::Serialize;

use crate::value::Value;

/// Handle to a node created by an [`OutputAdapter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(pub usize);

/// Primitive tree mutations consumed by the [`ElementStack`].
pub trait OutputAdapter {
    /// Create a detached element.
    fn create_element(&mut self, tag: &str) -> NodeId;

    /// Create a detached text node.
    fn create_text(&mut self, text: &str) -> NodeId;

    /// Replace a text node's content.
    fn set_text(&mut self, node: NodeId, text: &str);

    /// Set an attribute. `trusted` is false for values that came from
    /// template data rather than the template itself.
    fn set_attribute(&mut self, element: NodeId, name: &str, value: &str, trusted: bool);

    /// Remove an attribute if present.
    fn remove_attribute(&mut self, element: NodeId, name: &str);

    /// Insert `node` into `parent` before `reference`, or at the end.
    fn insert_before(&mut self, parent: NodeId, node: NodeId, reference: Option<NodeId>);
}

/// The span of sibling nodes a block rendered into `parent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bounds {
    /// The element the nodes were inserted into
    pub parent: NodeId,

    /// First rendered node, if any
    pub first: Option<NodeId>,

    /// Last rendered node, if any
    pub last: Option<NodeId>,
}

impl Bounds {
    /// Whether the block rendered nothing.
    pub fn is_empty(&self) -> bool {
        self.first.is_none()
    }
}

/// Write a value to an attribute.
///
/// `undefined`, `null` and `false` remove the attribute; `true` sets it to
/// an empty string; anything else is written as its text.
pub(crate) fn apply_attribute(
    dom: &mut dyn OutputAdapter,
    element: NodeId,
    name: &str,
    value: &Value,
    trusted: bool,
) {
    match value {
        Value::Undefined | Value::Null | Value::Bool(false) => dom.remove_attribute(element, name),
        Value::Bool(true) => dom.set_attribute(element, name, "", trusted),
        other => dom.set_attribute(element, name, &other.to_text(), trusted),
    }
}
