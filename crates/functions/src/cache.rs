//! Run-scoped resource cache shared by all stateful builtins.
//!
//! The cache is a single flat, string-keyed namespace. Builtins keep their
//! entries apart by prefixing keys with an operation tag (`xml_doc_`,
//! `xml_list_`, ...); the cache itself never inspects keys. Entries live for
//! exactly one preprocessing run: no expiry, no eviction.
use crate::error::{Error, Result};
use crate::xml::XmlNode;
use core::fmt;
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Kind tag of a cached payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Document,
    Element,
    NodeList,
    Other,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ResourceKind::Document => "document",
            ResourceKind::Element => "element",
            ResourceKind::NodeList => "node list",
            ResourceKind::Other => "opaque resource",
        })
    }
}

/// What a container wraps: one tree node or an ordered node sequence.
#[derive(Debug, Clone)]
enum ContainerContent {
    Node(XmlNode),
    Nodes(Vec<XmlNode>),
}

/// Uid-tagged wrapper around tree nodes. Nodes keep their parsed document
/// alive, so a container never outlives the tree it points into.
#[derive(Debug, Clone)]
pub struct Container {
    uid: u64,
    content: ContainerContent,
}

impl Container {
    pub fn node(uid: u64, node: XmlNode) -> Self {
        Self {
            uid,
            content: ContainerContent::Node(node),
        }
    }

    pub fn nodes(uid: u64, nodes: Vec<XmlNode>) -> Self {
        Self {
            uid,
            content: ContainerContent::Nodes(nodes),
        }
    }

    pub fn uid(&self) -> u64 {
        self.uid
    }

    /// The wrapped node, if this container holds a single node.
    pub fn as_node(&self) -> Option<&XmlNode> {
        match &self.content {
            ContainerContent::Node(n) => Some(n),
            ContainerContent::Nodes(_) => None,
        }
    }

    /// The wrapped sequence, if this container holds a node list.
    pub fn as_nodes(&self) -> Option<&[XmlNode]> {
        match &self.content {
            ContainerContent::Node(_) => None,
            ContainerContent::Nodes(v) => Some(v),
        }
    }
}

/// Kind-tagged cached payload.
#[derive(Clone)]
pub enum Resource {
    Document(Container),
    Element(Container),
    NodeList(Container),
    Other(Arc<dyn Any + Send + Sync>),
}

impl Resource {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Resource::Document(_) => ResourceKind::Document,
            Resource::Element(_) => ResourceKind::Element,
            Resource::NodeList(_) => ResourceKind::NodeList,
            Resource::Other(_) => ResourceKind::Other,
        }
    }

    pub fn container(&self) -> Option<&Container> {
        match self {
            Resource::Document(c) | Resource::Element(c) | Resource::NodeList(c) => Some(c),
            Resource::Other(_) => None,
        }
    }

    /// Typed view of an `Other` payload.
    pub fn downcast_other<T: Any + Send + Sync>(&self) -> Option<&T> {
        match self {
            Resource::Other(v) => v.downcast_ref::<T>(),
            _ => None,
        }
    }
}

impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resource::Document(c) => f.debug_tuple("Document").field(&c.uid).finish(),
            Resource::Element(c) => f.debug_tuple("Element").field(&c.uid).finish(),
            Resource::NodeList(c) => f.debug_tuple("NodeList").field(&c.uid).finish(),
            Resource::Other(_) => f.write_str("Other(..)"),
        }
    }
}

#[derive(Debug, Default)]
pub struct ResourceCache {
    entries: HashMap<String, Resource>,
}

impl ResourceCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Resource> {
        self.entries.get(key)
    }

    /// Store `resource` under `key`, returning the overwritten payload if any.
    pub fn put(&mut self, key: impl Into<String>, resource: Resource) -> Option<Resource> {
        let key = key.into();
        tracing::debug!(%key, kind = %resource.kind(), "resource cached");
        self.entries.insert(key, resource)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up `key` and require its payload to be a container of one of `accepted` kinds.
    pub fn expect_container(&self, key: &str, accepted: &[ResourceKind]) -> Result<&Container> {
        let resource = self.get(key).ok_or_else(|| Error::unknown_handle(key))?;
        let kind = resource.kind();
        match resource.container() {
            Some(c) if accepted.contains(&kind) => Ok(c),
            _ => {
                let wanted: Vec<String> = accepted.iter().map(ToString::to_string).collect();
                Err(Error::type_mismatch(format!(
                    "handle '{key}' refers to a {kind}, expected {}",
                    wanted.join(" or ")
                )))
            }
        }
    }
}

/// Monotonic container identity source, scoped to one run.
#[derive(Debug)]
pub struct UidCounter {
    next: AtomicU64,
}

impl Default for UidCounter {
    fn default() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }
}

impl UidCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }
}
