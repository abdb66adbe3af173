//! XML serializer.
//!
//! Renders a `Document` tree as well-formed XML text. Output is always
//! UTF-8, so the declaration (when written) always says so regardless of
//! the encoding the document was parsed from.

use std::fmt::Write as _;

use crate::parser::is_xml_whitespace;
use crate::tree::{Document, NodeId, NodeKind};

/// Options controlling XML serialization output.
///
/// # Examples
///
/// ```
/// use xmlbridge::Document;
/// use xmlbridge::serial::{serialize_with_options, SerializeOptions};
///
/// let doc = Document::parse_str("<root><child>Hello</child></root>").unwrap();
/// let xml = serialize_with_options(&doc, &SerializeOptions::default().indent(true));
/// assert!(xml.contains("\n  <child>Hello</child>\n"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerializeOptions {
    /// Put element-only content on separate, indented lines.
    /// Defaults to `false`.
    pub indent: bool,
    /// The string written once per nesting level when `indent` is on.
    /// Defaults to two spaces.
    pub indent_str: String,
    /// Write the `<?xml ...?>` declaration. Defaults to `true`.
    pub declaration: bool,
}

impl Default for SerializeOptions {
    fn default() -> Self {
        Self {
            indent: false,
            indent_str: "  ".to_string(),
            declaration: true,
        }
    }
}

impl SerializeOptions {
    /// Enables or disables indented output.
    ///
    /// Elements holding text next to child elements are written as-is so
    /// that no whitespace is added to mixed content.
    #[must_use]
    pub fn indent(mut self, indent: bool) -> Self {
        self.indent = indent;
        self
    }

    /// Sets the indentation unit, e.g. `"\t"` or four spaces.
    #[must_use]
    pub fn indent_str(mut self, s: &str) -> Self {
        self.indent_str = s.to_string();
        self
    }

    /// Enables or disables the XML declaration.
    #[must_use]
    pub fn declaration(mut self, declaration: bool) -> Self {
        self.declaration = declaration;
        self
    }
}

/// Serializes a document with default options.
///
/// # Examples
///
/// ```
/// use xmlbridge::Document;
/// use xmlbridge::serial::serialize;
///
/// let doc = Document::parse_str("<root><child>Hello</child></root>").unwrap();
/// assert_eq!(
///     serialize(&doc),
///     "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<root><child>Hello</child></root>\n"
/// );
/// ```
#[must_use]
pub fn serialize(doc: &Document) -> String {
    serialize_with_options(doc, &SerializeOptions::default())
}

/// Serializes a document with the given options.
#[must_use]
pub fn serialize_with_options(doc: &Document, options: &SerializeOptions) -> String {
    let mut writer = XmlWriter {
        doc,
        options,
        out: String::new(),
    };
    if options.declaration {
        writer.declaration();
    }
    // Top-level nodes each get their own line.
    for child in doc.children(doc.root()) {
        writer.node(child, 0, false);
        writer.out.push('\n');
    }
    writer.out
}

/// Serializes a single node and its subtree, without a declaration.
#[must_use]
pub fn serialize_node(doc: &Document, id: NodeId, options: &SerializeOptions) -> String {
    let mut writer = XmlWriter {
        doc,
        options,
        out: String::new(),
    };
    if matches!(doc.node(id).kind, NodeKind::Document) {
        for child in doc.children(id) {
            writer.node(child, 0, false);
        }
    } else {
        writer.node(id, 0, false);
    }
    writer.out
}

struct XmlWriter<'a> {
    doc: &'a Document,
    options: &'a SerializeOptions,
    out: String,
}

impl XmlWriter<'_> {
    fn declaration(&mut self) {
        let version = self.doc.version.as_deref().unwrap_or("1.0");
        let _ = write!(self.out, "<?xml version=\"{version}\" encoding=\"UTF-8\"");
        if let Some(standalone) = self.doc.standalone {
            let _ = write!(
                self.out,
                " standalone=\"{}\"",
                if standalone { "yes" } else { "no" }
            );
        }
        self.out.push_str("?>\n");
    }

    fn indent(&mut self, depth: usize) {
        for _ in 0..depth {
            self.out.push_str(&self.options.indent_str);
        }
    }

    /// Writes a quoted system or public literal. These cannot contain
    /// references, so the quote character is picked to fit the content.
    fn literal(&mut self, value: &str) {
        let quote = if value.contains('"') { '\'' } else { '"' };
        let _ = write!(self.out, "{quote}{value}{quote}");
    }

    /// True if the element has element children and no text other than
    /// whitespace, so indentation cannot change its content.
    fn is_element_only(&self, id: NodeId) -> bool {
        let mut has_element = false;
        for child in self.doc.children(id) {
            match &self.doc.node(child).kind {
                NodeKind::Element { .. } => has_element = true,
                NodeKind::Text { content } if content.chars().all(is_xml_whitespace) => {}
                NodeKind::Text { .. } | NodeKind::CData { .. } => return false,
                _ => {}
            }
        }
        has_element
    }

    /// Writes a node. `pretty` is set when the parent is element-only and
    /// indenting, in which case the node owns its line.
    fn node(&mut self, id: NodeId, depth: usize, pretty: bool) {
        let doc = self.doc;
        if pretty {
            self.indent(depth);
        }
        match &doc.node(id).kind {
            NodeKind::Element { .. } => self.element(id, depth),
            NodeKind::Text { content } => escape_text(&mut self.out, content),
            NodeKind::CData { content } => {
                let _ = write!(self.out, "<![CDATA[{content}]]>");
            }
            NodeKind::Comment { content } => {
                let _ = write!(self.out, "<!--{content}-->");
            }
            NodeKind::ProcessingInstruction { target, data } => {
                let _ = match data {
                    Some(data) => write!(self.out, "<?{target} {data}?>"),
                    None => write!(self.out, "<?{target}?>"),
                };
            }
            NodeKind::DocumentType {
                name,
                public_id,
                system_id,
            } => {
                let _ = write!(self.out, "<!DOCTYPE {name}");
                match (public_id, system_id) {
                    (Some(public), Some(system)) => {
                        self.out.push_str(" PUBLIC ");
                        self.literal(public);
                        self.out.push(' ');
                        self.literal(system);
                    }
                    (None, Some(system)) => {
                        self.out.push_str(" SYSTEM ");
                        self.literal(system);
                    }
                    _ => {}
                }
                self.out.push('>');
            }
            NodeKind::Attribute(attr) => {
                let _ = write!(self.out, "{}=\"", attr.qualified_name());
                escape_attribute(&mut self.out, &attr.value);
                self.out.push('"');
            }
            NodeKind::Document => {}
        }
        if pretty {
            self.out.push('\n');
        }
    }

    fn element(&mut self, id: NodeId, depth: usize) {
        let doc = self.doc;
        let Some(qname) = doc.qualified_name(id) else {
            return;
        };
        let _ = write!(self.out, "<{qname}");
        for decl in doc.namespace_declarations(id) {
            let _ = write!(self.out, " {}=\"", decl.attribute_name());
            escape_attribute(&mut self.out, &decl.uri);
            self.out.push('"');
        }
        for &attr in doc.attributes(id) {
            self.out.push(' ');
            self.node(attr, depth, false);
        }

        if doc.first_child(id).is_none() {
            self.out.push_str("/>");
            return;
        }
        self.out.push('>');

        let pretty = self.options.indent && self.is_element_only(id);
        if pretty {
            self.out.push('\n');
        }
        for child in doc.children(id) {
            if pretty && matches!(&doc.node(child).kind, NodeKind::Text { .. }) {
                continue;
            }
            self.node(child, depth + 1, pretty);
        }
        if pretty {
            self.indent(depth);
        }
        let _ = write!(self.out, "</{qname}>");
    }
}

/// Escapes character data: `&`, `<`, `>` and carriage returns.
fn escape_text(out: &mut String, text: &str) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\r' => out.push_str("&#13;"),
            _ => out.push(ch),
        }
    }
}

/// Escapes an attribute value for a double-quoted attribute. Whitespace
/// other than spaces is written as character references so that it
/// survives attribute-value normalization on re-parse.
fn escape_attribute(out: &mut String, value: &str) {
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\t' => out.push_str("&#9;"),
            '\n' => out.push_str("&#10;"),
            '\r' => out.push_str("&#13;"),
            _ => out.push(ch),
        }
    }
}
