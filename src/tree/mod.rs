//! Arena-based XML document tree.
//!
//! All nodes live in a `Vec<NodeData>` owned by the [`Document`] and are
//! referenced by [`NodeId`], an arena index tagged with the document that
//! allocated it. Parent links are
//! plain indices: they answer "who owns me" for lookups and never keep a
//! node alive, so the tree has no reference cycles.
//!
//! Attributes are arena nodes too. Their `parent` is the owning element but
//! they are not linked into its child list; the element keeps them in
//! `NodeKind::Element::attributes`.

mod node;

pub use node::{Attribute, NamespaceDecl, NodeKind};

use std::cell::OnceCell;
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::error::ParseError;
use crate::util::qname::split_qname;

/// Position marker for nodes that are not reachable from the document node.
const DETACHED: u32 = u32::MAX;

/// Source of per-document tags.
static NEXT_TAG: AtomicU32 = AtomicU32::new(1);

/// A typed index into the document's node arena.
///
/// The handle also records which document allocated it, so a handle from
/// one document is never mistaken for a node of another. `Option<NodeId>`
/// is the same size as `NodeId` thanks to the niche.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    index: NonZeroU32,
    doc: u32,
}

impl NodeId {
    /// # Panics
    ///
    /// Panics if `index` is 0 or does not fit in a `u32`.
    #[allow(clippy::expect_used)]
    fn new(index: usize, doc: u32) -> Self {
        let raw = u32::try_from(index).expect("arena exceeds u32 index space");
        Self {
            index: NonZeroU32::new(raw).expect("NodeId index must be non-zero"),
            doc,
        }
    }

    fn as_index(self) -> usize {
        self.index.get() as usize
    }
}

/// Storage for a single node in the document arena.
#[derive(Debug, Clone)]
pub struct NodeData {
    /// What the node is, with its payload.
    pub kind: NodeKind,
    /// Parent node. For attributes this is the owning element.
    pub parent: Option<NodeId>,
    pub first_child: Option<NodeId>,
    pub last_child: Option<NodeId>,
    pub next_sibling: Option<NodeId>,
    pub prev_sibling: Option<NodeId>,
}

impl NodeData {
    fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            parent: None,
            first_child: None,
            last_child: None,
            next_sibling: None,
            prev_sibling: None,
        }
    }
}

/// An XML document.
///
/// Navigation goes through `&Document`, construction through `&mut Document`.
/// Document order is derived from the tree shape on first use and cached
/// until the next mutation.
///
/// # Examples
///
/// ```
/// use xmlbridge::Document;
///
/// let doc = Document::parse_str("<Invoice><ID>42</ID></Invoice>").unwrap();
/// let root = doc.root_element().unwrap();
/// assert_eq!(doc.node_name(root), Some("Invoice"));
/// assert_eq!(doc.node_value(root).as_deref(), Some("42"));
/// ```
#[derive(Debug)]
pub struct Document {
    /// Index 0 is a placeholder so that indices fit `NonZeroU32`.
    nodes: Vec<NodeData>,
    root: NodeId,
    /// XML version from the declaration.
    pub version: Option<String>,
    /// Encoding label from the declaration.
    pub encoding: Option<String>,
    /// Standalone flag from the declaration.
    pub standalone: Option<bool>,
    order: OnceCell<Vec<u32>>,
    /// Stamped into every `NodeId` this document hands out.
    tag: u32,
}

impl Document {
    /// Creates a document containing only the document node.
    #[must_use]
    pub fn new() -> Self {
        let nodes = vec![
            NodeData::new(NodeKind::Document),
            NodeData::new(NodeKind::Document),
        ];
        let tag = NEXT_TAG.fetch_add(1, Ordering::Relaxed);
        Self {
            nodes,
            root: NodeId::new(1, tag),
            version: None,
            encoding: None,
            standalone: None,
            order: OnceCell::new(),
            tag,
        }
    }

    /// Parses an XML string into a `Document` with default options.
    ///
    /// # Errors
    ///
    /// Returns `ParseError` if the input is not well-formed XML.
    pub fn parse_str(input: &str) -> Result<Self, ParseError> {
        crate::parser::parse_str(input)
    }

    /// Parses raw bytes, detecting the encoding from a BOM or the XML
    /// declaration.
    ///
    /// # Errors
    ///
    /// Returns `ParseError` if the bytes cannot be decoded or the result is
    /// not well-formed XML.
    pub fn parse_bytes(input: &[u8]) -> Result<Self, ParseError> {
        crate::parser::parse_bytes(input)
    }

    /// Returns the document node.
    #[must_use]
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Returns the single top-level element, if there is one.
    #[must_use]
    pub fn root_element(&self) -> Option<NodeId> {
        self.children(self.root)
            .find(|&id| self.node(id).kind.is_element())
    }

    /// Returns the `NodeData` for a node.
    ///
    /// # Panics
    ///
    /// Panics if `id` is out of range for this document. Debug builds also
    /// panic on a handle from another document.
    #[must_use]
    pub fn node(&self, id: NodeId) -> &NodeData {
        debug_assert_eq!(id.doc, self.tag, "NodeId belongs to another document");
        &self.nodes[id.as_index()]
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut NodeData {
        debug_assert_eq!(id.doc, self.tag, "NodeId belongs to another document");
        self.order.take();
        &mut self.nodes[id.as_index()]
    }

    /// Returns `true` if `id` was allocated by this document.
    ///
    /// Handles from another document are rejected even when their arena
    /// index is in range here.
    #[must_use]
    pub fn contains(&self, id: NodeId) -> bool {
        id.doc == self.tag && id.as_index() < self.nodes.len()
    }

    // --- Names and values ---

    /// Returns the local name of an element or attribute, or the target of a
    /// processing instruction.
    #[must_use]
    pub fn node_name(&self, id: NodeId) -> Option<&str> {
        match &self.node(id).kind {
            NodeKind::Element { name, .. }
            | NodeKind::Attribute(Attribute { name, .. })
            | NodeKind::ProcessingInstruction { target: name, .. } => Some(name),
            _ => None,
        }
    }

    /// Returns the prefix as written in the source.
    #[must_use]
    pub fn node_prefix(&self, id: NodeId) -> Option<&str> {
        match &self.node(id).kind {
            NodeKind::Element { prefix, .. } | NodeKind::Attribute(Attribute { prefix, .. }) => {
                prefix.as_deref()
            }
            _ => None,
        }
    }

    /// Returns `prefix:local` for elements and attributes, the target for
    /// processing instructions.
    #[must_use]
    pub fn qualified_name(&self, id: NodeId) -> Option<String> {
        let local = self.node_name(id)?;
        Some(match self.node_prefix(id) {
            Some(prefix) => format!("{prefix}:{local}"),
            None => local.to_string(),
        })
    }

    /// Returns the namespace URI of an element or attribute.
    #[must_use]
    pub fn node_namespace(&self, id: NodeId) -> Option<&str> {
        match &self.node(id).kind {
            NodeKind::Element { namespace, .. }
            | NodeKind::Attribute(Attribute { namespace, .. }) => namespace.as_deref(),
            _ => None,
        }
    }

    /// Returns the own text of a leaf node: text, CDATA, comment, PI data or
    /// attribute value. Elements and the document node return `None`.
    #[must_use]
    pub fn node_text(&self, id: NodeId) -> Option<&str> {
        match &self.node(id).kind {
            NodeKind::Text { content }
            | NodeKind::CData { content }
            | NodeKind::Comment { content } => Some(content),
            NodeKind::ProcessingInstruction { data, .. } => Some(data.as_deref().unwrap_or("")),
            NodeKind::Attribute(attr) => Some(&attr.value),
            _ => None,
        }
    }

    /// Concatenated text of all text and CDATA descendants.
    #[must_use]
    pub fn text_content(&self, id: NodeId) -> String {
        if let Some(own) = self.node_text(id) {
            return own.to_string();
        }
        let mut buf = String::new();
        for child in self.descendants(id) {
            if let NodeKind::Text { content } | NodeKind::CData { content } =
                &self.node(child).kind
            {
                buf.push_str(content);
            }
        }
        buf
    }

    /// The XPath string-value of a node.
    #[must_use]
    pub fn string_value(&self, id: NodeId) -> String {
        match &self.node(id).kind {
            NodeKind::DocumentType { .. } => String::new(),
            _ => self.text_content(id),
        }
    }

    /// The textual value a mapping callback sees for a matched node.
    ///
    /// Elements yield the concatenation of their descendant text, attributes
    /// their value, and character-data nodes their content. The document
    /// node and the doctype have no value.
    #[must_use]
    pub fn node_value(&self, id: NodeId) -> Option<String> {
        match &self.node(id).kind {
            NodeKind::Document | NodeKind::DocumentType { .. } => None,
            _ => Some(self.text_content(id)),
        }
    }

    // --- Attributes and namespaces ---

    /// Returns the attribute nodes of an element; empty for other kinds.
    #[must_use]
    pub fn attributes(&self, id: NodeId) -> &[NodeId] {
        match &self.node(id).kind {
            NodeKind::Element { attributes, .. } => attributes,
            _ => &[],
        }
    }

    /// Looks up an attribute value by qualified name as written.
    #[must_use]
    pub fn attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        let (prefix, local) = split_qname(name);
        self.attributes(id).iter().find_map(|&attr| match &self.node(attr).kind {
            NodeKind::Attribute(a) if a.name == local && a.prefix.as_deref() == prefix => {
                Some(a.value.as_str())
            }
            _ => None,
        })
    }

    /// Namespace declarations made directly on an element.
    #[must_use]
    pub fn namespace_declarations(&self, id: NodeId) -> &[NamespaceDecl] {
        match &self.node(id).kind {
            NodeKind::Element { namespaces, .. } => namespaces,
            _ => &[],
        }
    }

    /// Resolves a prefix (`None` for the default namespace) by walking the
    /// element and its ancestors.
    #[must_use]
    pub fn lookup_namespace(&self, id: NodeId, prefix: Option<&str>) -> Option<&str> {
        if prefix == Some("xml") {
            return Some(crate::parser::XML_NAMESPACE);
        }
        self.ancestors(id).find_map(|anc| {
            self.namespace_declarations(anc)
                .iter()
                .find(|decl| decl.prefix.as_deref() == prefix)
                .map(|decl| decl.uri.as_str())
        })
        .filter(|uri| !uri.is_empty())
    }

    // --- Navigation ---

    /// Returns the parent of a node. Attributes report their owning element.
    #[must_use]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    #[must_use]
    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).first_child
    }

    #[must_use]
    pub fn last_child(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).last_child
    }

    #[must_use]
    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).next_sibling
    }

    #[must_use]
    pub fn prev_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).prev_sibling
    }

    /// Iterates over the children of a node. Attributes are not children.
    pub fn children(&self, id: NodeId) -> Children<'_> {
        Children {
            doc: self,
            next: self.node(id).first_child,
        }
    }

    /// Iterates over a node and its ancestors up to the document node.
    pub fn ancestors(&self, id: NodeId) -> Ancestors<'_> {
        Ancestors {
            doc: self,
            next: Some(id),
        }
    }

    /// Iterates over all descendants of a node in document order, excluding
    /// the node itself and any attributes.
    pub fn descendants(&self, id: NodeId) -> Descendants<'_> {
        Descendants {
            doc: self,
            root: id,
            next: self.first_child(id),
        }
    }

    /// Returns the zero-based position of a node in document order, or
    /// `None` if the node is detached from the document.
    ///
    /// An element's attributes come directly after the element and before
    /// its first child.
    #[must_use]
    pub fn document_position(&self, id: NodeId) -> Option<usize> {
        let order = self.order.get_or_init(|| self.compute_order());
        match order.get(id.as_index()) {
            Some(&pos) if pos != DETACHED => Some(pos as usize),
            _ => None,
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn compute_order(&self) -> Vec<u32> {
        let mut order = vec![DETACHED; self.nodes.len()];
        let mut next = 0u32;
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            order[id.as_index()] = next;
            next += 1;
            for &attr in self.attributes(id) {
                order[attr.as_index()] = next;
                next += 1;
            }
            let first = stack.len();
            stack.extend(self.children(id));
            stack[first..].reverse();
        }
        order
    }

    /// Sorts node handles into document order and removes duplicates.
    /// Detached nodes sort last, by arena index.
    pub fn sort_in_document_order(&self, nodes: &mut Vec<NodeId>) {
        nodes.sort_by_key(|&id| (self.document_position(id).unwrap_or(usize::MAX), id));
        nodes.dedup();
    }

    // --- Construction ---

    /// Allocates a new unattached node.
    pub fn create_node(&mut self, kind: NodeKind) -> NodeId {
        self.order.take();
        let index = self.nodes.len();
        self.nodes.push(NodeData::new(kind));
        NodeId::new(index, self.tag)
    }

    /// Allocates an element from a qualified name. A prefixed name needs the
    /// namespace URI it should resolve to; the caller is responsible for
    /// declaring it (see [`Document::declare_namespace`]).
    pub fn create_element(&mut self, qname: &str, namespace: Option<&str>) -> NodeId {
        let (prefix, local) = split_qname(qname);
        self.create_node(NodeKind::Element {
            name: local.to_string(),
            prefix: prefix.map(str::to_string),
            namespace: namespace.map(str::to_string),
            attributes: Vec::new(),
            namespaces: Vec::new(),
        })
    }

    /// Allocates a text node.
    pub fn create_text(&mut self, content: impl Into<String>) -> NodeId {
        self.create_node(NodeKind::Text {
            content: content.into(),
        })
    }

    /// Attaches an attribute node to an element. Returns `None` if `element`
    /// is not an element.
    pub fn add_attribute(&mut self, element: NodeId, attribute: Attribute) -> Option<NodeId> {
        if !self.node(element).kind.is_element() {
            return None;
        }
        let id = self.create_node(NodeKind::Attribute(attribute));
        self.node_mut(id).parent = Some(element);
        if let NodeKind::Element { attributes, .. } = &mut self.node_mut(element).kind {
            attributes.push(id);
        }
        Some(id)
    }

    /// Sets an unprefixed or prefixed attribute, replacing the value of an
    /// existing attribute with the same qualified name.
    pub fn set_attribute(&mut self, element: NodeId, qname: &str, value: &str) -> Option<NodeId> {
        let (prefix, local) = split_qname(qname);
        let existing = self.attributes(element).iter().copied().find(|&attr| {
            self.node_name(attr) == Some(local) && self.node_prefix(attr) == prefix
        });
        if let Some(attr) = existing {
            if let NodeKind::Attribute(a) = &mut self.node_mut(attr).kind {
                a.value = value.to_string();
            }
            return Some(attr);
        }
        let namespace = prefix.and_then(|p| self.lookup_namespace(element, Some(p)).map(str::to_string));
        self.add_attribute(
            element,
            Attribute {
                name: local.to_string(),
                prefix: prefix.map(str::to_string),
                namespace,
                value: value.to_string(),
            },
        )
    }

    /// Records a namespace declaration on an element, replacing an earlier
    /// declaration of the same prefix on that element.
    pub fn declare_namespace(&mut self, element: NodeId, prefix: Option<&str>, uri: &str) {
        if let NodeKind::Element { namespaces, .. } = &mut self.node_mut(element).kind {
            let decl = NamespaceDecl {
                prefix: prefix.map(str::to_string),
                uri: uri.to_string(),
            };
            match namespaces.iter_mut().find(|d| d.prefix == decl.prefix) {
                Some(slot) => *slot = decl,
                None => namespaces.push(decl),
            }
        }
    }

    /// Appends `child` as the last child of `parent`.
    ///
    /// # Panics
    ///
    /// Panics in debug builds if `child` already has a parent.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        debug_assert!(
            self.node(child).parent.is_none(),
            "child already has a parent; detach it first"
        );

        self.node_mut(child).parent = Some(parent);
        match self.node(parent).last_child {
            Some(last) => {
                self.node_mut(last).next_sibling = Some(child);
                self.node_mut(child).prev_sibling = Some(last);
            }
            None => self.node_mut(parent).first_child = Some(child),
        }
        self.node_mut(parent).last_child = Some(child);
    }

    /// Unlinks a node from its parent. The node stays allocated.
    pub fn detach(&mut self, id: NodeId) {
        let Some(parent) = self.node(id).parent else {
            return;
        };

        if self.node(id).kind.is_attribute() {
            if let NodeKind::Element { attributes, .. } = &mut self.node_mut(parent).kind {
                attributes.retain(|&a| a != id);
            }
            self.node_mut(id).parent = None;
            return;
        }

        let prev = self.node(id).prev_sibling;
        let next = self.node(id).next_sibling;
        match prev {
            Some(p) => self.node_mut(p).next_sibling = next,
            None => self.node_mut(parent).first_child = next,
        }
        match next {
            Some(n) => self.node_mut(n).prev_sibling = prev,
            None => self.node_mut(parent).last_child = prev,
        }
        let data = self.node_mut(id);
        data.parent = None;
        data.prev_sibling = None;
        data.next_sibling = None;
    }

    /// Number of allocated nodes, excluding the arena placeholder.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len() - 1
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

// --- Iterators ---

/// Iterator over the children of a node.
pub struct Children<'a> {
    doc: &'a Document,
    next: Option<NodeId>,
}

impl Iterator for Children<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = self.doc.node(current).next_sibling;
        Some(current)
    }
}

/// Iterator over a node and its ancestors.
pub struct Ancestors<'a> {
    doc: &'a Document,
    next: Option<NodeId>,
}

impl Iterator for Ancestors<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = self.doc.node(current).parent;
        Some(current)
    }
}

/// Pre-order iterator over the descendants of a node.
pub struct Descendants<'a> {
    doc: &'a Document,
    root: NodeId,
    next: Option<NodeId>,
}

impl Iterator for Descendants<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;

        if let Some(child) = self.doc.first_child(current) {
            self.next = Some(child);
            return Some(current);
        }

        let mut cursor = current;
        loop {
            if cursor == self.root {
                self.next = None;
                break;
            }
            if let Some(sibling) = self.doc.next_sibling(cursor) {
                self.next = Some(sibling);
                break;
            }
            match self.doc.parent(cursor) {
                Some(parent) => cursor = parent,
                None => {
                    self.next = None;
                    break;
                }
            }
        }
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(xml: &str) -> Document {
        let Ok(doc) = Document::parse_str(xml) else {
            panic!("failed to parse {xml}");
        };
        doc
    }

    #[test]
    fn test_new_document_has_root() {
        let doc = Document::new();
        assert!(matches!(doc.node(doc.root()).kind, NodeKind::Document));
        assert_eq!(doc.node_count(), 1);
        assert!(doc.root_element().is_none());
    }

    #[test]
    fn test_contains_rejects_nodes_of_other_documents() {
        let doc = parse("<a><b/></a>");
        let other = parse("<a><b/></a>");
        let b = doc.descendants(doc.root()).last().unwrap();
        let other_b = other.descendants(other.root()).last().unwrap();
        assert!(doc.contains(b));
        assert!(!doc.contains(other_b));
        assert!(!doc.contains(other.root()));
        assert_ne!(b, other_b);
    }

    #[test]
    fn test_build_tree_by_hand() {
        let mut doc = Document::new();
        let root = doc.create_element("rsm:Invoice", Some("urn:rsm"));
        doc.declare_namespace(root, Some("rsm"), "urn:rsm");
        doc.append_child(doc.root(), root);
        let id = doc.create_element("ID", None);
        doc.append_child(root, id);
        let text = doc.create_text("INV-1");
        doc.append_child(id, text);

        assert_eq!(doc.root_element(), Some(root));
        assert_eq!(doc.qualified_name(root).as_deref(), Some("rsm:Invoice"));
        assert_eq!(doc.node_namespace(root), Some("urn:rsm"));
        assert_eq!(doc.node_value(root).as_deref(), Some("INV-1"));
        assert_eq!(doc.parent(text), Some(id));
    }

    #[test]
    fn test_attributes_are_nodes_owned_by_element() {
        let doc = parse(r#"<a x="1" p:y="2" xmlns:p="urn:p"/>"#);
        let Some(root) = doc.root_element() else {
            panic!("no root");
        };
        let attrs = doc.attributes(root);
        assert_eq!(attrs.len(), 2);
        assert_eq!(doc.parent(attrs[0]), Some(root));
        assert_eq!(doc.children(root).count(), 0);
        assert_eq!(doc.attribute(root, "x"), Some("1"));
        assert_eq!(doc.attribute(root, "p:y"), Some("2"));
        assert_eq!(doc.node_namespace(attrs[1]), Some("urn:p"));
        assert_eq!(doc.node_value(attrs[0]).as_deref(), Some("1"));
    }

    #[test]
    fn test_node_value_by_kind() {
        let doc = parse("<!DOCTYPE a><a><b>x<![CDATA[y]]></b><!--c--><?pi d?></a>");
        let Some(root) = doc.root_element() else {
            panic!("no root");
        };
        assert_eq!(doc.node_value(doc.root()), None);
        let doctype = doc.first_child(doc.root());
        assert_eq!(doctype.and_then(|d| doc.node_value(d)), None);
        assert_eq!(doc.node_value(root).as_deref(), Some("xy"));
        let kids: Vec<_> = doc.children(root).collect();
        assert_eq!(doc.node_value(kids[1]).as_deref(), Some("c"));
        assert_eq!(doc.node_value(kids[2]).as_deref(), Some("d"));
    }

    #[test]
    fn test_empty_element_value_is_empty_string() {
        let doc = parse("<a><b></b></a>");
        let Some(b) = doc.root_element().and_then(|r| doc.first_child(r)) else {
            panic!("no b");
        };
        assert_eq!(doc.node_value(b).as_deref(), Some(""));
    }

    #[test]
    fn test_descendants_preorder() {
        let doc = parse("<a><b><c/></b><d/></a>");
        let Some(root) = doc.root_element() else {
            panic!("no root");
        };
        let names: Vec<_> = doc
            .descendants(root)
            .filter_map(|id| doc.node_name(id))
            .collect();
        assert_eq!(names, vec!["b", "c", "d"]);
    }

    #[test]
    fn test_descendants_of_leaf_stop_at_subtree() {
        let doc = parse("<a><b/><c/></a>");
        let Some(b) = doc.root_element().and_then(|r| doc.first_child(r)) else {
            panic!("no b");
        };
        assert_eq!(doc.descendants(b).count(), 0);
    }

    #[test]
    fn test_document_position_places_attributes_after_owner() {
        let doc = parse(r#"<a k="v"><b/></a>"#);
        let Some(root) = doc.root_element() else {
            panic!("no root");
        };
        let attr = doc.attributes(root)[0];
        let Some(b) = doc.first_child(root) else {
            panic!("no b");
        };
        assert_eq!(doc.document_position(doc.root()), Some(0));
        assert_eq!(doc.document_position(root), Some(1));
        assert_eq!(doc.document_position(attr), Some(2));
        assert_eq!(doc.document_position(b), Some(3));
    }

    #[test]
    fn test_document_order_follows_tree_not_allocation() {
        let mut doc = Document::new();
        let root = doc.create_element("root", None);
        doc.append_child(doc.root(), root);
        let late = doc.create_element("late", None);
        let early = doc.create_element("early", None);
        doc.append_child(root, early);
        doc.append_child(root, late);

        let mut nodes = vec![late, early, late];
        doc.sort_in_document_order(&mut nodes);
        assert_eq!(nodes, vec![early, late]);

        doc.detach(early);
        assert_eq!(doc.document_position(early), None);
    }

    #[test]
    fn test_set_attribute_replaces_value() {
        let mut doc = Document::new();
        let root = doc.create_element("root", None);
        doc.append_child(doc.root(), root);
        let first = doc.set_attribute(root, "currencyID", "EUR");
        let second = doc.set_attribute(root, "currencyID", "USD");
        assert_eq!(first, second);
        assert_eq!(doc.attribute(root, "currencyID"), Some("USD"));
        let text = doc.create_text("t");
        assert_eq!(doc.set_attribute(text, "a", "b"), None);
    }

    #[test]
    fn test_detach_attribute() {
        let mut doc = parse(r#"<a x="1" y="2"/>"#);
        let Some(root) = doc.root_element() else {
            panic!("no root");
        };
        let x = doc.attributes(root)[0];
        doc.detach(x);
        assert_eq!(doc.attributes(root).len(), 1);
        assert_eq!(doc.attribute(root, "x"), None);
        assert_eq!(doc.parent(x), None);
    }

    #[test]
    fn test_lookup_namespace_walks_ancestors() {
        let doc = parse(r#"<a xmlns="urn:d" xmlns:p="urn:p"><b xmlns:p="urn:q"><c/></b></a>"#);
        let Some(c) = doc
            .root_element()
            .and_then(|a| doc.first_child(a))
            .and_then(|b| doc.first_child(b))
        else {
            panic!("no c");
        };
        assert_eq!(doc.lookup_namespace(c, Some("p")), Some("urn:q"));
        assert_eq!(doc.lookup_namespace(c, None), Some("urn:d"));
        assert_eq!(doc.lookup_namespace(c, Some("zz")), None);
        assert_eq!(
            doc.lookup_namespace(c, Some("xml")),
            Some(crate::parser::XML_NAMESPACE)
        );
    }
}
