//! The element stack: open elements, open blocks, and the element under construction

use std::mem;

use indexmap::IndexMap;

use super::{apply_attribute, Bounds, NodeId, OutputAdapter};
use crate::error::{RenderError, Result};
use crate::reference::{Reference, ReferenceCache, ValueRef};
use crate::value::Value;

/// The value an attribute will receive when its element is flushed.
#[derive(Debug, Clone)]
pub enum AttributeValue {
    /// Literal text from the template
    Static(String),

    /// Read from a reference when the element is flushed
    Dynamic(ValueRef),
}

/// An attribute queued on the element under construction.
#[derive(Debug, Clone)]
pub struct PendingAttribute {
    /// What to write
    pub value: AttributeValue,

    /// Whether the value may bypass sanitization
    pub trusted: bool,
}

/// Attributes queued on the element under construction.
///
/// Writing the same name twice keeps the original position but the later
/// value, so attributes written after a component's own (shadowed
/// attributes) win.
#[derive(Debug, Clone, Default)]
pub struct ElementOperations {
    attributes: IndexMap<String, PendingAttribute>,
}

impl ElementOperations {
    /// Queue a literal attribute.
    pub fn add_static_attribute(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.attributes.insert(
            name.into(),
            PendingAttribute {
                value: AttributeValue::Static(value.into()),
                trusted: true,
            },
        );
    }

    /// Queue a reference-valued attribute.
    pub fn add_dynamic_attribute(&mut self, name: impl Into<String>, reference: ValueRef, trusted: bool) {
        self.attributes.insert(
            name.into(),
            PendingAttribute {
                value: AttributeValue::Dynamic(reference),
                trusted,
            },
        );
    }

    /// Look up a queued attribute.
    pub fn get(&self, name: &str) -> Option<&PendingAttribute> {
        self.attributes.get(name)
    }

    /// Queued attribute names in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.attributes.keys().map(String::as_str)
    }

    /// Number of queued attributes.
    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    /// Check if nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }
}

/// A dynamic attribute that needs revalidation after the initial render.
#[derive(Debug)]
pub struct AttributeBinding {
    /// The element carrying the attribute
    pub element: NodeId,

    /// Attribute name
    pub name: String,

    /// Cache over the attribute's reference, already holding the rendered value
    pub cache: ReferenceCache<Value>,

    /// Whether the value may bypass sanitization
    pub trusted: bool,
}

#[derive(Debug, Clone, Copy)]
struct BlockTracker {
    parent: NodeId,
    first: Option<NodeId>,
    last: Option<NodeId>,
}

impl BlockTracker {
    fn new(parent: NodeId) -> Self {
        Self {
            parent,
            first: None,
            last: None,
        }
    }

    fn did_append(&mut self, first: NodeId, last: NodeId) {
        if self.first.is_none() {
            self.first = Some(first);
        }
        self.last = Some(last);
    }

    fn bounds(&self) -> Bounds {
        Bounds {
            parent: self.parent,
            first: self.first,
            last: self.last,
        }
    }
}

/// Nested open elements and blocks of the output tree.
#[derive(Debug)]
pub struct ElementStack {
    root: NodeId,
    elements: Vec<NodeId>,
    blocks: Vec<BlockTracker>,
    constructing: Option<NodeId>,
    operations: ElementOperations,
}

impl ElementStack {
    /// Create a stack that appends into `root`.
    pub fn new(root: NodeId) -> Self {
        Self {
            root,
            elements: vec![root],
            blocks: Vec::new(),
            constructing: None,
            operations: ElementOperations::default(),
        }
    }

    /// The element new nodes are appended to.
    pub fn element(&self) -> NodeId {
        self.elements.last().copied().unwrap_or(self.root)
    }

    /// The element under construction, between open and flush.
    pub fn constructing(&self) -> Option<NodeId> {
        self.constructing
    }

    /// Attributes queued on the element under construction.
    pub fn operations(&self) -> &ElementOperations {
        &self.operations
    }

    /// Mutable access to the queued attributes.
    pub fn operations_mut(&mut self) -> &mut ElementOperations {
        &mut self.operations
    }

    /// Start tracking a block of nodes appended to the current element.
    pub fn push_simple_block(&mut self) {
        self.blocks.push(BlockTracker::new(self.element()));
    }

    /// Stop tracking the innermost block and return what it rendered.
    pub fn pop_block(&mut self) -> Result<Bounds> {
        let block = self
            .blocks
            .pop()
            .ok_or_else(|| RenderError::protocol("pop-block", "block stack underflow"))?;

        if let (Some(parent), Some(first), Some(last)) =
            (self.blocks.last_mut(), block.first, block.last)
        {
            if parent.parent == block.parent {
                parent.did_append(first, last);
            }
        }
        Ok(block.bounds())
    }

    /// Create an element and make it the element under construction.
    pub fn open_element(&mut self, dom: &mut dyn OutputAdapter, tag: &str) -> Result<NodeId> {
        if self.constructing.is_some() {
            return Err(RenderError::protocol(
                "open-element",
                "another element is already under construction",
            ));
        }
        let element = dom.create_element(tag);
        self.constructing = Some(element);
        Ok(element)
    }

    /// Queue a literal attribute on the element under construction.
    pub fn set_static_attribute(&mut self, name: &str, value: &str) -> Result<()> {
        self.require_constructing("static-attr")?;
        self.operations.add_static_attribute(name, value);
        Ok(())
    }

    /// Queue a reference-valued attribute on the element under construction.
    pub fn set_dynamic_attribute(&mut self, name: &str, reference: ValueRef, trusted: bool) -> Result<()> {
        self.require_constructing("dynamic-attr")?;
        self.operations.add_dynamic_attribute(name, reference, trusted);
        Ok(())
    }

    /// Write the queued attributes, insert the element, and open it.
    ///
    /// Returns a binding for every attribute whose reference can change.
    /// Nothing is written if any queued reference comes from a destroyed
    /// source.
    pub fn flush_element(&mut self, dom: &mut dyn OutputAdapter) -> Result<Vec<AttributeBinding>> {
        let element = self.require_constructing("flush-element")?;
        for pending in self.operations.attributes.values() {
            if let AttributeValue::Dynamic(reference) = &pending.value {
                reference.tag().check("flush-element")?;
            }
        }
        self.constructing = None;

        let mut bindings = Vec::new();
        for (name, pending) in mem::take(&mut self.operations).attributes {
            match pending.value {
                AttributeValue::Static(value) => {
                    dom.set_attribute(element, &name, &value, pending.trusted)
                }
                AttributeValue::Dynamic(reference) => {
                    match ReferenceCache::for_reference(reference.clone()) {
                        Some(mut cache) => {
                            let value = cache.peek();
                            apply_attribute(dom, element, &name, &value, pending.trusted);
                            bindings.push(AttributeBinding {
                                element,
                                name,
                                cache,
                                trusted: pending.trusted,
                            });
                        }
                        None => {
                            apply_attribute(dom, element, &name, &reference.value(), pending.trusted)
                        }
                    }
                }
            }
        }

        self.append_node(dom, element);
        self.elements.push(element);
        Ok(bindings)
    }

    /// Close the current element.
    pub fn close_element(&mut self) -> Result<NodeId> {
        if self.elements.len() <= 1 {
            return Err(RenderError::protocol("close-element", "no open element to close"));
        }
        self.elements
            .pop()
            .ok_or_else(|| RenderError::protocol("close-element", "no open element to close"))
    }

    /// Append a text node to the current element.
    pub fn append_text(&mut self, dom: &mut dyn OutputAdapter, text: &str) -> Result<NodeId> {
        if self.constructing.is_some() {
            return Err(RenderError::protocol(
                "text",
                "cannot append content while an element is under construction",
            ));
        }
        let node = dom.create_text(text);
        self.append_node(dom, node);
        Ok(node)
    }

    /// Number of open elements, including the root.
    pub fn element_depth(&self) -> usize {
        self.elements.len()
    }

    /// Number of open blocks.
    pub fn block_depth(&self) -> usize {
        self.blocks.len()
    }

    /// Drop everything opened past the given depths.
    pub(crate) fn reset_to(&mut self, element_depth: usize, block_depth: usize) {
        self.elements.truncate(element_depth.max(1));
        self.blocks.truncate(block_depth);
        self.constructing = None;
        self.operations = ElementOperations::default();
    }

    fn append_node(&mut self, dom: &mut dyn OutputAdapter, node: NodeId) {
        let parent = self.element();
        dom.insert_before(parent, node, None);
        if let Some(block) = self.blocks.last_mut() {
            if block.parent == parent {
                block.did_append(node, node);
            }
        }
    }

    fn require_constructing(&self, opcode: &'static str) -> Result<NodeId> {
        self.constructing
            .ok_or_else(|| RenderError::protocol(opcode, "no element under construction"))
    }
}
