//! In-memory output tree

use indexmap::IndexMap;

use super::{NodeId, OutputAdapter};

/// URL-bearing attributes whose untrusted values are sanitized.
const URL_ATTRIBUTES: &[&str] = &["href", "src", "action", "formaction", "background"];

/// Protocols that are never allowed in an untrusted URL attribute.
const UNSAFE_PROTOCOLS: &[&str] = &["javascript:", "vbscript:"];

#[derive(Debug, Clone)]
enum NodeKind {
    Fragment,
    Element {
        tag: String,
        attributes: IndexMap<String, String>,
    },
    Text(String),
}

#[derive(Debug, Clone)]
struct Node {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// An arena-backed tree implementing [`OutputAdapter`].
///
/// Node `0` is a fragment that serves as the default render root.
///
/// # Example
///
/// ```
/// use quickbeam::{Document, OutputAdapter};
///
/// let mut doc = Document::new();
/// let p = doc.create_element("p");
/// let text = doc.create_text("hello");
/// doc.insert_before(p, text, None);
/// doc.insert_before(doc.root(), p, None);
///
/// assert_eq!(doc.serialize(doc.root()), "<p>hello</p>");
/// ```
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Create a document holding only the root fragment.
    pub fn new() -> Self {
        Self {
            nodes: vec![Node {
                kind: NodeKind::Fragment,
                parent: None,
                children: Vec::new(),
            }],
        }
    }

    /// The root fragment.
    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Children of a node.
    pub fn children(&self, node: NodeId) -> &[NodeId] {
        self.nodes
            .get(node.0)
            .map(|n| n.children.as_slice())
            .unwrap_or(&[])
    }

    /// Parent of a node, if attached.
    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes.get(node.0).and_then(|n| n.parent)
    }

    /// Tag name of an element.
    pub fn tag(&self, node: NodeId) -> Option<&str> {
        match self.nodes.get(node.0).map(|n| &n.kind) {
            Some(NodeKind::Element { tag, .. }) => Some(tag.as_str()),
            _ => None,
        }
    }

    /// Attribute value of an element.
    pub fn attribute(&self, node: NodeId, name: &str) -> Option<&str> {
        match self.nodes.get(node.0).map(|n| &n.kind) {
            Some(NodeKind::Element { attributes, .. }) => attributes.get(name).map(String::as_str),
            _ => None,
        }
    }

    /// Content of a text node.
    pub fn text(&self, node: NodeId) -> Option<&str> {
        match self.nodes.get(node.0).map(|n| &n.kind) {
            Some(NodeKind::Text(text)) => Some(text.as_str()),
            _ => None,
        }
    }

    /// Total number of nodes ever created.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if the document holds nothing but its root.
    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
    }

    /// Serialize a node's subtree as HTML. A fragment serializes as its
    /// children.
    pub fn serialize(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.write_node(node, &mut out);
        out
    }

    fn write_node(&self, node: NodeId, out: &mut String) {
        let Some(n) = self.nodes.get(node.0) else {
            return;
        };
        match &n.kind {
            NodeKind::Fragment => self.write_children(n, out),
            NodeKind::Text(text) => out.push_str(&escape(text)),
            NodeKind::Element { tag, attributes } => {
                out.push('<');
                out.push_str(tag);
                for (name, value) in attributes {
                    out.push_str(&format!(" {}=\"{}\"", name, escape(value)));
                }
                out.push('>');
                self.write_children(n, out);
                out.push_str(&format!("</{}>", tag));
            }
        }
    }

    fn write_children(&self, n: &Node, out: &mut String) {
        for child in &n.children {
            self.write_node(*child, out);
        }
    }

    fn push(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            kind,
            parent: None,
            children: Vec::new(),
        });
        id
    }

    fn detach(&mut self, node: NodeId) {
        if let Some(parent) = self.parent(node) {
            if let Some(p) = self.nodes.get_mut(parent.0) {
                p.children.retain(|child| *child != node);
            }
        }
    }
}

impl OutputAdapter for Document {
    fn create_element(&mut self, tag: &str) -> NodeId {
        self.push(NodeKind::Element {
            tag: tag.to_string(),
            attributes: IndexMap::new(),
        })
    }

    fn create_text(&mut self, text: &str) -> NodeId {
        self.push(NodeKind::Text(text.to_string()))
    }

    fn set_text(&mut self, node: NodeId, text: &str) {
        if let Some(Node {
            kind: NodeKind::Text(content),
            ..
        }) = self.nodes.get_mut(node.0)
        {
            *content = text.to_string();
        }
    }

    fn set_attribute(&mut self, element: NodeId, name: &str, value: &str, trusted: bool) {
        let value = if trusted {
            value.to_string()
        } else {
            sanitize(name, value)
        };
        if let Some(Node {
            kind: NodeKind::Element { attributes, .. },
            ..
        }) = self.nodes.get_mut(element.0)
        {
            attributes.insert(name.to_string(), value);
        }
    }

    fn remove_attribute(&mut self, element: NodeId, name: &str) {
        if let Some(Node {
            kind: NodeKind::Element { attributes, .. },
            ..
        }) = self.nodes.get_mut(element.0)
        {
            attributes.shift_remove(name);
        }
    }

    fn insert_before(&mut self, parent: NodeId, node: NodeId, reference: Option<NodeId>) {
        self.detach(node);
        let Some(p) = self.nodes.get_mut(parent.0) else {
            return;
        };
        let index = reference
            .and_then(|r| p.children.iter().position(|child| *child == r))
            .unwrap_or(p.children.len());
        p.children.insert(index, node);
        if let Some(n) = self.nodes.get_mut(node.0) {
            n.parent = Some(parent);
        }
    }
}

/// Prefix dangerous URL protocols in untrusted URL attributes with `unsafe:`.
fn sanitize(name: &str, value: &str) -> String {
    let is_url = URL_ATTRIBUTES.iter().any(|a| a.eq_ignore_ascii_case(name));
    let lowered = value.trim_start().to_ascii_lowercase();
    if is_url && UNSAFE_PROTOCOLS.iter().any(|p| lowered.starts_with(p)) {
        format!("unsafe:{}", value)
    } else {
        value.to_string()
    }
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            other => out.push(other),
        }
    }
    out
}
