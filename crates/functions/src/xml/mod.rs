//! XML builtins: open a document once per run and navigate it through
//! opaque string handles backed by the resource cache.
//!
//! Every handle is a cache key. Keys are derived only from the resolved file
//! path or from a container uid plus the query argument, so repeating a call
//! returns the same handle without parsing or querying again.
mod loader;
mod tree;

pub use loader::{DocumentLoader, QuickXmlLoader, parse_document};
pub use tree::{NodeKind, XmlDocument, XmlNode};

use crate::cache::{Container, Resource, ResourceKind};
use crate::context::CallCtx;
use crate::error::{Error, ErrorCode, Result};
use crate::function::FunctionDescriptor;
use crate::value::{Value, ValueKind};
use std::path::Path;
use std::sync::Arc;

pub const RES_XML_DOC_PREFIX: &str = "xml_doc_";
pub const RES_XML_ELEMENT_PREFIX: &str = "xml_elem_";
pub const RES_XML_LIST_PREFIX: &str = "xml_list_";

const NODE_HANDLES: &[ResourceKind] = &[ResourceKind::Document, ResourceKind::Element];

pub fn document_key(resolved: &Path) -> String {
    format!("{RES_XML_DOC_PREFIX}{}", resolved.display())
}

/// Root element key belonging to a document key.
pub fn document_root_key(doc_key: &str) -> String {
    let path = doc_key.strip_prefix(RES_XML_DOC_PREFIX).unwrap_or(doc_key);
    format!("{RES_XML_ELEMENT_PREFIX}root_{path}")
}

pub fn element_list_key(parent_uid: u64, tag: &str) -> String {
    format!("{RES_XML_LIST_PREFIX}{parent_uid}_{tag}")
}

pub fn list_element_key(list_uid: u64, index: usize) -> String {
    format!("{RES_XML_ELEMENT_PREFIX}{list_uid}_{index}")
}

/// Open `name` and cache its document and root element. Returns the document handle.
pub fn open_document(ctx: &mut CallCtx<'_>, loader: &dyn DocumentLoader, name: &str) -> Result<String> {
    let path = ctx.files.resolve_file(name)?;
    let doc_key = document_key(&path);
    if ctx.cache.contains_key(&doc_key) {
        tracing::debug!(key = %doc_key, "xml document served from cache");
        return Ok(doc_key);
    }
    if ctx.diagnostics.is_verbose() {
        ctx.diagnostics
            .log_verbose(&format!("parsing XML document '{}'", path.display()));
    }
    let doc = loader.load(&path)?.into_shared();
    let doc_container = Container::node(ctx.next_uid(), XmlNode::document(&doc));
    let root_container = Container::node(ctx.next_uid(), XmlNode::root_element(&doc));
    ctx.cache
        .put(document_root_key(&doc_key), Resource::Element(root_container));
    ctx.cache.put(doc_key.clone(), Resource::Document(doc_container));
    Ok(doc_key)
}

/// Handle of the root element of an opened document.
pub fn document_root(ctx: &mut CallCtx<'_>, doc_handle: &str) -> Result<String> {
    let container = ctx
        .cache
        .expect_container(doc_handle, &[ResourceKind::Document])?;
    let key = document_root_key(doc_handle);
    if ctx.cache.contains_key(&key) {
        return Ok(key);
    }
    let root = single_node(container, doc_handle)?.owner_root();
    let uid = ctx.next_uid();
    ctx.cache.put(key.clone(), Resource::Element(Container::node(uid, root)));
    Ok(key)
}

/// Handle of the descendant elements of `handle` named `tag`, in document order.
pub fn elements_by_tag(ctx: &mut CallCtx<'_>, handle: &str, tag: &str) -> Result<String> {
    let container = ctx.cache.expect_container(handle, NODE_HANDLES)?;
    let list_key = element_list_key(container.uid(), tag);
    if ctx.cache.contains_key(&list_key) {
        tracing::debug!(key = %list_key, "element list served from cache");
        return Ok(list_key);
    }
    let matches = single_node(container, handle)?.elements_by_tag_name(tag);
    tracing::debug!(key = %list_key, count = matches.len(), "element list queried");
    let uid = ctx.next_uid();
    ctx.cache
        .put(list_key.clone(), Resource::NodeList(Container::nodes(uid, matches)));
    Ok(list_key)
}

fn node_list<'c>(ctx: &'c CallCtx<'_>, handle: &str) -> Result<(&'c Container, &'c [XmlNode])> {
    let container = ctx.cache.expect_container(handle, &[ResourceKind::NodeList])?;
    let nodes = container
        .as_nodes()
        .ok_or_else(|| Error::type_mismatch(format!("handle '{handle}' holds no node list")))?;
    Ok((container, nodes))
}

fn single_node<'c>(container: &'c Container, handle: &str) -> Result<&'c XmlNode> {
    container
        .as_node()
        .ok_or_else(|| Error::type_mismatch(format!("handle '{handle}' holds a node list")))
}

/// The element behind `handle`; a document handle stands for its root element.
fn element(ctx: &CallCtx<'_>, handle: &str) -> Result<XmlNode> {
    let container = ctx.cache.expect_container(handle, NODE_HANDLES)?;
    let node = single_node(container, handle)?;
    Ok(match node.kind() {
        NodeKind::Document => node.owner_root(),
        _ => node.clone(),
    })
}

pub fn list_size(ctx: &CallCtx<'_>, handle: &str) -> Result<usize> {
    node_list(ctx, handle).map(|(_, nodes)| nodes.len())
}

/// Handle of the element at zero-based `index` of a node list.
pub fn list_element(ctx: &mut CallCtx<'_>, handle: &str, index: i64) -> Result<String> {
    let (container, nodes) = node_list(ctx, handle)?;
    let idx = usize::try_from(index)
        .ok()
        .filter(|&i| i < nodes.len())
        .ok_or_else(|| {
            Error::from_code(
                ErrorCode::IndexOutOfRange,
                format!(
                    "index {index} is out of range for list '{handle}' of size {}",
                    nodes.len()
                ),
            )
        })?;
    let key = list_element_key(container.uid(), idx);
    if ctx.cache.contains_key(&key) {
        return Ok(key);
    }
    let node = nodes[idx].clone();
    let uid = ctx.next_uid();
    ctx.cache.put(key.clone(), Resource::Element(Container::node(uid, node)));
    Ok(key)
}

/// Builtin descriptors of the XML family, parsing through `loader`.
pub fn descriptors(loader: Arc<dyn DocumentLoader>) -> Vec<FunctionDescriptor> {
    use ValueKind::{Int, String as Str};
    vec![
        FunctionDescriptor::new("xml_open", 1, Str, "open XML file and parse as DOM").overload(
            &[Str],
            move |ctx, args| {
                open_document(ctx, loader.as_ref(), &args[0].as_string()).map(Value::from)
            },
        ),
        FunctionDescriptor::new("xml_root", 1, Str, "get the root element of an opened XML document")
            .overload(&[Str], |ctx, args| {
                document_root(ctx, &args[0].as_string()).map(Value::from)
            }),
        FunctionDescriptor::new("xml_list", 2, Str, "get element list by element tag").overload(
            &[Str, Str],
            |ctx, args| {
                elements_by_tag(ctx, &args[0].as_string(), &args[1].as_string()).map(Value::from)
            },
        ),
        FunctionDescriptor::new("xml_size", 1, Int, "get number of elements in an element list")
            .overload(&[Str], |ctx, args| {
                let size = list_size(ctx, &args[0].as_string())?;
                Ok(Value::Int(i64::try_from(size).unwrap_or(i64::MAX)))
            }),
        FunctionDescriptor::new("xml_get", 2, Str, "get element from an element list by index")
            .overload(&[Str, Int], |ctx, args| {
                list_element(ctx, &args[0].as_string(), args[1].as_int()?).map(Value::from)
            }),
        FunctionDescriptor::new("xml_name", 1, Str, "get the tag name of an element").overload(
            &[Str],
            |ctx, args| {
                let el = element(ctx, &args[0].as_string())?;
                Ok(Value::from(el.name().unwrap_or_default()))
            },
        ),
        FunctionDescriptor::new("xml_text", 1, Str, "get the text content of an element")
            .overload(&[Str], |ctx, args| {
                element(ctx, &args[0].as_string()).map(|el| Value::from(el.text_content()))
            }),
        FunctionDescriptor::new("xml_attr", 2, Str, "get an attribute value of an element")
            .overload(&[Str, Str], |ctx, args| {
                let el = element(ctx, &args[0].as_string())?;
                Ok(Value::from(el.attribute(&args[1].as_string()).unwrap_or_default()))
            }),
    ]
}
