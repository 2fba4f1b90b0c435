//! The document arena: node storage, navigation, text extraction, and the
//! attribute mutation API.

use crate::dom::node::{NodeData, NodeId, NodeKind, QName};
use crate::dom::serialize::{self, SerializeOptions};
use crate::error::Result;
use crate::xpath::{self, Value};

/// The arena index of the document node itself.
pub const DOCUMENT_NODE: NodeId = 0;

/// A parsed document: a flat arena of nodes rooted at [`DOCUMENT_NODE`].
///
/// All navigation is by [`NodeId`]. Ids handed out by one document must not
/// be used with another; lookups with a foreign id panic or return
/// unrelated nodes.
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<NodeData>,
    /// HTML presentation mode: void elements serialize without closing
    /// tags, empty attribute values render as bare names.
    html: bool,
}

impl Default for Document {
    fn default() -> Self {
        Document::new()
    }
}

impl Document {
    /// An empty document containing only the document node.
    pub fn new() -> Self {
        Document {
            nodes: vec![NodeData::document()],
            html: false,
        }
    }

    /// Number of nodes in the arena, the document node included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        // The document node is always present.
        false
    }

    /// Borrow a node. Panics on an id that is not from this document.
    #[inline]
    pub fn node(&self, id: NodeId) -> &NodeData {
        &self.nodes[id as usize]
    }

    #[inline]
    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut NodeData {
        &mut self.nodes[id as usize]
    }

    /// Borrow a node, `None` for out-of-range ids.
    pub fn get(&self, id: NodeId) -> Option<&NodeData> {
        self.nodes.get(id as usize)
    }

    /// Allocate an unlinked node and return its id.
    pub fn push(&mut self, kind: NodeKind) -> NodeId {
        let id = self.nodes.len() as NodeId;
        self.nodes.push(NodeData::new(kind));
        id
    }

    /// Append `child` to `parent`'s child sequence and set its parent link.
    ///
    /// Adjacent text merging: when both `child` and the current last child
    /// are `Text`, the new text is folded into the existing node instead,
    /// and the surviving node's id is returned. The merged-away arena slot
    /// stays allocated but unlinked.
    pub fn append(&mut self, parent: NodeId, child: NodeId) -> NodeId {
        if let NodeKind::Text { text } = &self.nodes[child as usize].kind {
            if let Some(&last) = self.nodes[parent as usize].children.last() {
                if self.nodes[last as usize].is_text() {
                    let addition = text.clone();
                    if let NodeKind::Text { text: existing } = &mut self.nodes[last as usize].kind
                    {
                        existing.push_str(&addition);
                    }
                    return last;
                }
            }
        }
        self.nodes[child as usize].parent = Some(parent);
        self.nodes[parent as usize].children.push(child);
        child
    }

    /// Allocate a node of `kind` and append it under `parent`.
    pub fn append_kind(&mut self, parent: NodeId, kind: NodeKind) -> NodeId {
        let id = self.push(kind);
        self.append(parent, id)
    }

    /// Append character data under `parent`, merging with a trailing text
    /// node when present.
    pub fn append_text(&mut self, parent: NodeId, text: &str) -> NodeId {
        if let Some(&last) = self.nodes[parent as usize].children.last() {
            if self.nodes[last as usize].is_text() {
                if let NodeKind::Text { text: existing } = &mut self.nodes[last as usize].kind {
                    existing.push_str(text);
                }
                return last;
            }
        }
        self.append_kind(parent, NodeKind::Text { text: text.to_string() })
    }

    /// The parent handle of a node (`None` for the document node and for
    /// unlinked nodes).
    #[inline]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id as usize].parent
    }

    /// Ordered child sequence of a node.
    #[inline]
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id as usize].children
    }

    /// Attribute node list of an element; empty for every other kind.
    pub fn attributes(&self, id: NodeId) -> &[NodeId] {
        match &self.nodes[id as usize].kind {
            NodeKind::Element { attrs, .. } => attrs,
            _ => &[],
        }
    }

    /// Namespace declaration list of an element; empty for other kinds.
    pub fn ns_decls(&self, id: NodeId) -> &[NodeId] {
        match &self.nodes[id as usize].kind {
            NodeKind::Element { ns_decls, .. } => ns_decls,
            _ => &[],
        }
    }

    /// First `Element` child of the document node, if any.
    pub fn root(&self) -> Option<NodeId> {
        self.nodes[DOCUMENT_NODE as usize]
            .children
            .iter()
            .copied()
            .find(|&c| self.nodes[c as usize].is_element())
    }

    /// Element children of a node, in document order.
    pub fn element_children(&self, id: NodeId) -> Vec<NodeId> {
        self.nodes[id as usize]
            .children
            .iter()
            .copied()
            .filter(|&c| self.nodes[c as usize].is_element())
            .collect()
    }

    /// Element children matching `local` and, when given, a namespace URI.
    ///
    /// With `ns` of `None`, any namespace matches.
    pub fn elements(&self, id: NodeId, local: Option<&str>, ns: Option<&str>) -> Vec<NodeId> {
        self.element_children(id)
            .into_iter()
            .filter(|&c| {
                let name = match &self.nodes[c as usize].kind {
                    NodeKind::Element { name, .. } => name,
                    _ => return false,
                };
                if let Some(l) = local {
                    if name.local != l {
                        return false;
                    }
                }
                if let Some(u) = ns {
                    if name.ns.as_deref() != Some(u) {
                        return false;
                    }
                }
                true
            })
            .collect()
    }

    /// First element child matching `local` (and `ns` when given).
    pub fn element(&self, id: NodeId, local: &str, ns: Option<&str>) -> Option<NodeId> {
        self.elements(id, Some(local), ns).into_iter().next()
    }

    /// All descendants of `id` in document order, `id` excluded.
    /// Attribute and namespace nodes are not part of the child axis.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.collect_descendants(id, &mut out);
        out
    }

    fn collect_descendants(&self, id: NodeId, out: &mut Vec<NodeId>) {
        for &c in &self.nodes[id as usize].children {
            out.push(c);
            self.collect_descendants(c, out);
        }
    }

    /// Descendant elements of `id` in document order, `id` excluded.
    pub fn element_descendants(&self, id: NodeId) -> Vec<NodeId> {
        self.descendants(id)
            .into_iter()
            .filter(|&c| self.nodes[c as usize].is_element())
            .collect()
    }

    /// Qualified name of an element node.
    pub fn element_name(&self, id: NodeId) -> Option<&QName> {
        match &self.nodes[id as usize].kind {
            NodeKind::Element { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Attribute node of an element by local name and optional namespace
    /// URI. With `ns` of `None` only no-namespace attributes match.
    pub fn attribute_node(&self, el: NodeId, local: &str, ns: Option<&str>) -> Option<NodeId> {
        self.attributes(el)
            .iter()
            .copied()
            .find(|&a| match &self.nodes[a as usize].kind {
                NodeKind::Attribute { name, .. } => {
                    name.local == local && name.ns.as_deref() == ns
                }
                _ => false,
            })
    }

    /// Attribute value of an element by local name and optional namespace.
    pub fn attribute(&self, el: NodeId, local: &str, ns: Option<&str>) -> Option<&str> {
        self.attribute_node(el, local, ns)
            .and_then(|a| match &self.nodes[a as usize].kind {
                NodeKind::Attribute { value, .. } => Some(value.as_str()),
                _ => None,
            })
    }

    /// Set an attribute on an element.
    ///
    /// Identity is the (local, namespace-URI) pair: an existing attribute
    /// with the same pair has its value (and written prefix) replaced,
    /// otherwise a new attribute node is pushed. At most one attribute per
    /// pair exists per element.
    pub fn set_attribute(&mut self, el: NodeId, name: QName, value: &str) -> NodeId {
        if let Some(existing) = self.attribute_node(el, &name.local, name.ns.as_deref()) {
            if let NodeKind::Attribute { name: n, value: v } =
                &mut self.nodes[existing as usize].kind
            {
                *n = name;
                *v = value.to_string();
            }
            return existing;
        }
        let id = self.push(NodeKind::Attribute {
            name,
            value: value.to_string(),
        });
        self.nodes[id as usize].parent = Some(el);
        if let NodeKind::Element { attrs, .. } = &mut self.nodes[el as usize].kind {
            attrs.push(id);
        }
        id
    }

    /// Remove an attribute by (local, namespace-URI); `true` when removed.
    pub fn remove_attribute(&mut self, el: NodeId, local: &str, ns: Option<&str>) -> bool {
        let found = self.attribute_node(el, local, ns);
        if let Some(id) = found {
            if let NodeKind::Element { attrs, .. } = &mut self.nodes[el as usize].kind {
                attrs.retain(|&a| a != id);
            }
            self.nodes[id as usize].parent = None;
            true
        } else {
            false
        }
    }

    /// Record a namespace declaration on an element.
    pub fn add_namespace(&mut self, el: NodeId, prefix: &str, uri: &str) -> NodeId {
        let id = self.push(NodeKind::Namespace {
            prefix: prefix.to_string(),
            uri: uri.to_string(),
        });
        self.nodes[id as usize].parent = Some(el);
        if let NodeKind::Element { ns_decls, .. } = &mut self.nodes[el as usize].kind {
            ns_decls.push(id);
        }
        id
    }

    /// The text value of a node.
    ///
    /// Text and entity-reference nodes yield their data, attributes their
    /// value, comments their text, and containers the concatenated
    /// character data of their descendants. Declaration kinds yield the
    /// empty string.
    pub fn text_of(&self, id: NodeId) -> String {
        match &self.nodes[id as usize].kind {
            NodeKind::Text { text } | NodeKind::EntityRef { text } => text.clone(),
            NodeKind::Attribute { value, .. } => value.clone(),
            NodeKind::Comment { text } => text.clone(),
            _ if self.nodes[id as usize].is_container() => {
                let mut out = String::new();
                self.collect_text(id, &mut out);
                out
            }
            _ => String::new(),
        }
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        for &c in &self.nodes[id as usize].children {
            match &self.nodes[c as usize].kind {
                NodeKind::Text { text } | NodeKind::EntityRef { text } => out.push_str(text),
                _ if self.nodes[c as usize].is_container() => self.collect_text(c, out),
                _ => {}
            }
        }
    }

    /// Enable or disable HTML serialization mode.
    pub fn set_html(&mut self, html: bool) {
        self.html = html;
    }

    pub fn is_html(&self) -> bool {
        self.html
    }

    /// Serialize the whole document back to markup text.
    pub fn xml(&self) -> Result<String> {
        serialize::serialize(self, DOCUMENT_NODE, &SerializeOptions::default())
    }

    /// Serialize a single node (and its subtree).
    pub fn node_xml(&self, id: NodeId) -> Result<String> {
        serialize::serialize(self, id, &SerializeOptions::default())
    }

    /// Serialize a single node with explicit options.
    pub fn node_xml_with(&self, id: NodeId, options: &SerializeOptions) -> Result<String> {
        serialize::serialize(self, id, options)
    }

    /// Run a query pattern against this document.
    ///
    /// The default context is the root element (so relative patterns name
    /// the root's children); absolute patterns re-anchor at the document
    /// node themselves.
    pub fn query(&self, pattern: &str) -> Result<Vec<Value>> {
        let context = self.root().unwrap_or(DOCUMENT_NODE);
        xpath::XPath::new(pattern)?.execute(self, context)
    }

    /// Run a query pattern and keep only the first result.
    pub fn query_first(&self, pattern: &str) -> Result<Option<Value>> {
        let context = self.root().unwrap_or(DOCUMENT_NODE);
        xpath::XPath::new(pattern)?.first(self, context)
    }

    /// Run a query pattern from an explicit context node.
    pub fn query_from(&self, pattern: &str, context: NodeId) -> Result<Vec<Value>> {
        xpath::XPath::new(pattern)?.execute(self, context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc_with_root(local: &str) -> (Document, NodeId) {
        let mut doc = Document::new();
        let root = doc.append_kind(
            DOCUMENT_NODE,
            NodeKind::Element {
                name: QName::local(local),
                attrs: Vec::new(),
                ns_decls: Vec::new(),
            },
        );
        (doc, root)
    }

    #[test]
    fn test_root_is_first_element() {
        let mut doc = Document::new();
        doc.append_kind(
            DOCUMENT_NODE,
            NodeKind::Comment { text: "c".into() },
        );
        assert_eq!(doc.root(), None);
        let el = doc.append_kind(
            DOCUMENT_NODE,
            NodeKind::Element {
                name: QName::local("r"),
                attrs: Vec::new(),
                ns_decls: Vec::new(),
            },
        );
        assert_eq!(doc.root(), Some(el));
    }

    #[test]
    fn test_adjacent_text_merges() {
        let (mut doc, root) = doc_with_root("r");
        let a = doc.append_text(root, "foo");
        let b = doc.append_text(root, "bar");
        assert_eq!(a, b);
        assert_eq!(doc.children(root).len(), 1);
        assert_eq!(doc.text_of(root), "foobar");

        // A non-text node breaks the run.
        doc.append_kind(root, NodeKind::Comment { text: "x".into() });
        doc.append_text(root, "baz");
        assert_eq!(doc.children(root).len(), 3);
        assert_eq!(doc.text_of(root), "foobarbaz");
    }

    #[test]
    fn test_set_attribute_replaces_by_identity() {
        let (mut doc, root) = doc_with_root("r");
        doc.set_attribute(root, QName::local("a"), "1");
        doc.set_attribute(root, QName::new("a", Some("urn:x".into()), Some("x".into())), "2");
        assert_eq!(doc.attributes(root).len(), 2);

        // Same (local, ns) pair replaces in place.
        doc.set_attribute(root, QName::local("a"), "3");
        assert_eq!(doc.attributes(root).len(), 2);
        assert_eq!(doc.attribute(root, "a", None), Some("3"));
        assert_eq!(doc.attribute(root, "a", Some("urn:x")), Some("2"));
    }

    #[test]
    fn test_remove_attribute() {
        let (mut doc, root) = doc_with_root("r");
        doc.set_attribute(root, QName::local("a"), "1");
        assert!(doc.remove_attribute(root, "a", None));
        assert!(!doc.remove_attribute(root, "a", None));
        assert_eq!(doc.attribute(root, "a", None), None);
    }

    #[test]
    fn test_descendant_order() {
        let (mut doc, root) = doc_with_root("r");
        let a = doc.append_kind(
            root,
            NodeKind::Element {
                name: QName::local("a"),
                attrs: Vec::new(),
                ns_decls: Vec::new(),
            },
        );
        let t = doc.append_text(a, "x");
        let b = doc.append_kind(
            root,
            NodeKind::Element {
                name: QName::local("b"),
                attrs: Vec::new(),
                ns_decls: Vec::new(),
            },
        );
        assert_eq!(doc.descendants(root), vec![a, t, b]);
        assert_eq!(doc.element_descendants(root), vec![a, b]);
    }

    #[test]
    fn test_element_lookup_by_namespace() {
        let (mut doc, root) = doc_with_root("r");
        let bar = doc.append_kind(
            root,
            NodeKind::Element {
                name: QName::new("bar", Some("urn:foo".into()), None),
                attrs: Vec::new(),
                ns_decls: Vec::new(),
            },
        );
        assert_eq!(doc.element(root, "bar", None), Some(bar));
        assert_eq!(doc.element(root, "bar", Some("urn:foo")), Some(bar));
        assert_eq!(doc.element(root, "bar", Some("urn:bar")), None);
    }
}
