//! Immutable arena-backed XML tree.
//!
//! A parsed [`XmlDocument`] stores all nodes in one vector; an [`XmlNode`] is
//! a shared handle to the document plus an index. Cloning a node is cheap and
//! keeps the whole document alive.
use core::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Document,
    Element,
    Text,
}

#[derive(Debug, Clone)]
pub(crate) struct NodeData {
    pub(crate) kind: NodeKind,
    pub(crate) name: Option<String>,
    pub(crate) text: Option<String>,
    pub(crate) attributes: Vec<(String, String)>,
    pub(crate) parent: Option<usize>,
    pub(crate) children: Vec<usize>,
}

impl NodeData {
    pub(crate) fn document() -> Self {
        Self {
            kind: NodeKind::Document,
            name: None,
            text: None,
            attributes: Vec::new(),
            parent: None,
            children: Vec::new(),
        }
    }

    pub(crate) fn element(name: String, attributes: Vec<(String, String)>, parent: usize) -> Self {
        Self {
            kind: NodeKind::Element,
            name: Some(name),
            text: None,
            attributes,
            parent: Some(parent),
            children: Vec::new(),
        }
    }

    pub(crate) fn text(text: String, parent: usize) -> Self {
        Self {
            kind: NodeKind::Text,
            name: None,
            text: Some(text),
            attributes: Vec::new(),
            parent: Some(parent),
            children: Vec::new(),
        }
    }
}

/// A parsed document. Index 0 is always the document node.
#[derive(Debug)]
pub struct XmlDocument {
    nodes: Vec<NodeData>,
    root_element: usize,
}

impl XmlDocument {
    pub(crate) fn from_parts(nodes: Vec<NodeData>, root_element: usize) -> Self {
        Self {
            nodes,
            root_element,
        }
    }

    pub fn into_shared(self) -> Arc<XmlDocument> {
        Arc::new(self)
    }
}

/// Handle to a node inside a shared [`XmlDocument`].
#[derive(Clone)]
pub struct XmlNode {
    doc: Arc<XmlDocument>,
    index: usize,
}

impl PartialEq for XmlNode {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.doc, &other.doc) && self.index == other.index
    }
}
impl Eq for XmlNode {}

impl fmt::Debug for XmlNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("XmlNode")
            .field("kind", &self.kind())
            .field("name", &self.name())
            .field("index", &self.index)
            .finish()
    }
}

impl XmlNode {
    pub fn document(doc: &Arc<XmlDocument>) -> Self {
        Self {
            doc: Arc::clone(doc),
            index: 0,
        }
    }

    pub fn root_element(doc: &Arc<XmlDocument>) -> Self {
        Self {
            doc: Arc::clone(doc),
            index: doc.root_element,
        }
    }

    fn at(&self, index: usize) -> Self {
        Self {
            doc: Arc::clone(&self.doc),
            index,
        }
    }

    fn data(&self) -> &NodeData {
        &self.doc.nodes[self.index]
    }

    pub fn kind(&self) -> NodeKind {
        self.data().kind
    }

    pub fn name(&self) -> Option<&str> {
        self.data().name.as_deref()
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.data()
            .attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn parent(&self) -> Option<Self> {
        self.data().parent.map(|p| self.at(p))
    }

    pub fn children(&self) -> Vec<Self> {
        self.data().children.iter().map(|&c| self.at(c)).collect()
    }

    /// The owning document's root element.
    pub fn owner_root(&self) -> Self {
        self.at(self.doc.root_element)
    }

    /// Concatenated text of this node and its descendants.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        let mut stack = vec![self.index];
        while let Some(index) = stack.pop() {
            let data = &self.doc.nodes[index];
            if let Some(t) = &data.text {
                out.push_str(t);
            }
            stack.extend(data.children.iter().rev().copied());
        }
        out
    }

    /// Descendant elements named `tag` in document order, excluding `self`.
    /// `*` matches every element.
    pub fn elements_by_tag_name(&self, tag: &str) -> Vec<Self> {
        let mut out = Vec::new();
        let mut stack: Vec<usize> = self.data().children.iter().rev().copied().collect();
        while let Some(index) = stack.pop() {
            let data = &self.doc.nodes[index];
            if data.kind == NodeKind::Element
                && (tag == "*" || data.name.as_deref() == Some(tag))
            {
                out.push(self.at(index));
            }
            stack.extend(data.children.iter().rev().copied());
        }
        out
    }
}
