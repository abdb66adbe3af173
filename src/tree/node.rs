//! Node payload definitions.
//!
//! `NodeKind` carries what a node *is*; where it sits in the tree lives in
//! [`super::NodeData`]. Attributes are arena nodes of their own so that path
//! queries can return them and callbacks can ask for their owning element.

use super::NodeId;

/// The kind of an XML node and its associated data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// The document node. There is exactly one per `Document`.
    Document,

    /// An element node, e.g. `<cbc:ID schemeID="0088">`.
    Element {
        /// Local name (`ID` for `cbc:ID`).
        name: String,
        /// Prefix as written in the source, if any.
        prefix: Option<String>,
        /// Namespace URI the prefix (or default namespace) resolved to.
        namespace: Option<String>,
        /// Attribute nodes owned by this element, in source order.
        attributes: Vec<NodeId>,
        /// Namespace declarations (`xmlns`, `xmlns:p`) made on this element.
        namespaces: Vec<NamespaceDecl>,
    },

    /// An attribute node. Its parent is the owning element, but it is never
    /// linked into that element's child list.
    Attribute(Attribute),

    /// A text node containing character data with references resolved.
    Text {
        content: String,
    },

    /// A CDATA section.
    CData {
        content: String,
    },

    /// A comment, without the `<!--` and `-->` delimiters.
    Comment {
        content: String,
    },

    /// A processing instruction, e.g. `<?xml-stylesheet href="a.xsl"?>`.
    ProcessingInstruction {
        target: String,
        data: Option<String>,
    },

    /// The document type declaration. The internal subset is not kept.
    DocumentType {
        name: String,
        public_id: Option<String>,
        system_id: Option<String>,
    },
}

impl NodeKind {
    /// Returns `true` for element nodes.
    #[must_use]
    pub fn is_element(&self) -> bool {
        matches!(self, Self::Element { .. })
    }

    /// Returns `true` for attribute nodes.
    #[must_use]
    pub fn is_attribute(&self) -> bool {
        matches!(self, Self::Attribute(_))
    }

    /// Returns `true` for text and CDATA nodes.
    #[must_use]
    pub fn is_text(&self) -> bool {
        matches!(self, Self::Text { .. } | Self::CData { .. })
    }

    /// Short lowercase label used in log output and error messages.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Document => "document",
            Self::Element { .. } => "element",
            Self::Attribute(_) => "attribute",
            Self::Text { .. } => "text",
            Self::CData { .. } => "cdata",
            Self::Comment { .. } => "comment",
            Self::ProcessingInstruction { .. } => "processing-instruction",
            Self::DocumentType { .. } => "doctype",
        }
    }
}

/// Payload of an attribute node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    /// Local name (`lang` for `xml:lang`).
    pub name: String,
    /// Prefix as written, if any.
    pub prefix: Option<String>,
    /// Namespace URI for prefixed attributes. Unprefixed attributes are
    /// never in a namespace.
    pub namespace: Option<String>,
    /// Normalized value with references resolved.
    pub value: String,
}

impl Attribute {
    /// Creates an attribute in no namespace.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            prefix: None,
            namespace: None,
            value: value.into(),
        }
    }

    /// Returns the name as written in the source, `prefix:local` or `local`.
    #[must_use]
    pub fn qualified_name(&self) -> String {
        match &self.prefix {
            Some(p) => format!("{p}:{}", self.name),
            None => self.name.clone(),
        }
    }
}

/// A namespace declaration attached to an element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceDecl {
    /// Declared prefix; `None` for the default namespace (`xmlns="..."`).
    pub prefix: Option<String>,
    /// Bound namespace URI. Empty only for a default-namespace undeclaration.
    pub uri: String,
}

impl NamespaceDecl {
    /// Renders the declaration as it appears in markup, without escaping.
    #[must_use]
    pub fn attribute_name(&self) -> String {
        match &self.prefix {
            Some(p) => format!("xmlns:{p}"),
            None => "xmlns".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_qualified_name() {
        let mut attr = Attribute::new("lang", "de");
        assert_eq!(attr.qualified_name(), "lang");
        attr.prefix = Some("xml".to_string());
        assert_eq!(attr.qualified_name(), "xml:lang");
    }

    #[test]
    fn test_namespace_decl_attribute_name() {
        let default = NamespaceDecl {
            prefix: None,
            uri: "urn:x".to_string(),
        };
        let prefixed = NamespaceDecl {
            prefix: Some("cbc".to_string()),
            uri: "urn:y".to_string(),
        };
        assert_eq!(default.attribute_name(), "xmlns");
        assert_eq!(prefixed.attribute_name(), "xmlns:cbc");
    }

    #[test]
    fn test_kind_predicates() {
        assert!(NodeKind::Attribute(Attribute::new("a", "b")).is_attribute());
        assert!(NodeKind::CData {
            content: String::new()
        }
        .is_text());
        assert!(!NodeKind::Document.is_element());
        assert_eq!(NodeKind::Document.label(), "document");
    }
}
