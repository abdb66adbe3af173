//! The document-building recursive descent parser.

use crate::error::ParseError;
use crate::tree::{Attribute, Document, NamespaceDecl, NodeId, NodeKind};
use crate::util::qname::{is_qname, split_qname};

use super::input::{
    is_xml_whitespace, EntityDecl, NamespaceScopes, ParserInput, XMLNS_NAMESPACE, XML_NAMESPACE,
};
use super::ParseOptions;

pub(crate) struct XmlParser<'a> {
    input: ParserInput<'a>,
    options: &'a ParseOptions,
    doc: Document,
    scopes: NamespaceScopes,
}

impl<'a> XmlParser<'a> {
    pub fn new(input: &'a str, options: &'a ParseOptions) -> Self {
        Self {
            input: ParserInput::new(input, options),
            options,
            doc: Document::new(),
            scopes: NamespaceScopes::new(),
        }
    }

    pub fn parse(mut self) -> Result<Document, ParseError> {
        if self.input.char_after("<?xml").is_some_and(is_xml_whitespace) {
            self.parse_xml_decl()?;
        }

        let root = self.doc.root();
        self.parse_misc(root)?;
        if self.input.looking_at("<!DOCTYPE") {
            self.parse_doctype()?;
            self.parse_misc(root)?;
        }

        if self.input.at_end() {
            return Err(self.input.fatal("document has no root element"));
        }
        if !self.input.looking_at("<") {
            return Err(self.input.fatal("start tag expected"));
        }
        self.parse_element(root)?;
        self.parse_misc(root)?;

        if !self.input.at_end() {
            return Err(self.input.fatal("content after document element"));
        }
        Ok(self.doc)
    }

    // -- Prolog --

    fn parse_xml_decl(&mut self) -> Result<(), ParseError> {
        self.input.expect_str("<?xml")?;
        self.input.skip_whitespace_required("after '<?xml'")?;

        self.input.expect_str("version")?;
        let version = self.parse_eq_literal()?;
        let minor = version.strip_prefix("1.").unwrap_or("");
        if minor.is_empty() || !minor.bytes().all(|b| b.is_ascii_digit()) {
            return Err(self.input.fatal(format!("unsupported XML version '{version}'")));
        }
        self.doc.version = Some(version);

        let had_ws = self.input.skip_whitespace();
        if had_ws && self.input.eat("encoding") {
            let encoding = self.parse_eq_literal()?;
            let valid = encoding.chars().next().is_some_and(|c| c.is_ascii_alphabetic())
                && encoding
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
            if !valid {
                return Err(self.input.fatal(format!("invalid encoding name '{encoding}'")));
            }
            self.doc.encoding = Some(encoding);
            self.input.skip_whitespace();
        }
        if self.input.eat("standalone") {
            let standalone = match self.parse_eq_literal()?.as_str() {
                "yes" => true,
                "no" => false,
                other => {
                    return Err(self
                        .input
                        .fatal(format!("standalone must be 'yes' or 'no', found '{other}'")))
                }
            };
            self.doc.standalone = Some(standalone);
            self.input.skip_whitespace();
        }
        self.input.expect_str("?>")
    }

    fn parse_eq_literal(&mut self) -> Result<String, ParseError> {
        self.input.skip_whitespace();
        self.input.expect_str("=")?;
        self.input.skip_whitespace();
        self.input.parse_quoted()
    }

    fn parse_misc(&mut self, parent: NodeId) -> Result<(), ParseError> {
        loop {
            self.input.skip_whitespace();
            if self.input.looking_at("<!--") {
                self.parse_comment(parent)?;
            } else if self.input.looking_at("<?") {
                self.parse_pi(parent)?;
            } else {
                return Ok(());
            }
        }
    }

    fn parse_doctype(&mut self) -> Result<(), ParseError> {
        self.input.expect_str("<!DOCTYPE")?;
        self.input.skip_whitespace_required("after '<!DOCTYPE'")?;
        let name = self.input.parse_name()?.to_string();
        self.input.skip_whitespace();

        let mut public_id = None;
        let mut system_id = None;
        if self.input.eat("SYSTEM") {
            self.input.skip_whitespace_required("after 'SYSTEM'")?;
            system_id = Some(self.input.parse_quoted()?);
        } else if self.input.eat("PUBLIC") {
            self.input.skip_whitespace_required("after 'PUBLIC'")?;
            public_id = Some(self.input.parse_quoted()?);
            self.input.skip_whitespace_required("between public and system identifiers")?;
            system_id = Some(self.input.parse_quoted()?);
        }
        self.input.skip_whitespace();

        if self.input.eat("[") {
            self.parse_internal_subset()?;
            self.input.skip_whitespace();
        }
        self.input.expect_str(">")?;

        let node = self.doc.create_node(NodeKind::DocumentType {
            name,
            public_id,
            system_id,
        });
        let root = self.doc.root();
        self.doc.append_child(root, node);
        Ok(())
    }

    /// Scans declarations up to the closing `]`, recording general entity
    /// declarations and skipping everything else. Quoted literals and
    /// comments are honored so that a `]` inside them does not end the
    /// subset.
    fn parse_internal_subset(&mut self) -> Result<(), ParseError> {
        loop {
            if self.input.eat("]") {
                return Ok(());
            }
            if self.input.looking_at("<!ENTITY") {
                self.parse_entity_decl()?;
                continue;
            }
            if self.input.looking_at("<!--") {
                self.input.expect_str("<!--")?;
                self.input.take_until("-->", "comment")?;
                continue;
            }
            match self.input.peek() {
                Some('"' | '\'') => {
                    self.input.parse_quoted()?;
                }
                Some(_) => {
                    self.input.next_char()?;
                }
                None => return Err(self.input.fatal("unterminated internal subset")),
            }
        }
    }

    /// `<!ENTITY name "value">`, `<!ENTITY name SYSTEM "uri">` and the
    /// parameter entity forms. Parameter entities are parsed and dropped.
    fn parse_entity_decl(&mut self) -> Result<(), ParseError> {
        self.input.expect_str("<!ENTITY")?;
        self.input.skip_whitespace_required("after '<!ENTITY'")?;
        let parameter = self.input.eat("%");
        if parameter {
            self.input.skip_whitespace_required("after '%'")?;
        }
        let name = self.input.parse_name()?.to_string();
        self.input.skip_whitespace_required("after the entity name")?;

        let decl = if self.input.eat("SYSTEM") {
            self.input.skip_whitespace_required("after 'SYSTEM'")?;
            self.input.parse_quoted()?;
            EntityDecl::External
        } else if self.input.eat("PUBLIC") {
            self.input.skip_whitespace_required("after 'PUBLIC'")?;
            self.input.parse_quoted()?;
            self.input.skip_whitespace_required("between public and system identifiers")?;
            self.input.parse_quoted()?;
            EntityDecl::External
        } else {
            EntityDecl::Internal(self.input.parse_quoted()?)
        };
        self.input.skip_whitespace();
        if self.input.eat("NDATA") {
            self.input.skip_whitespace_required("after 'NDATA'")?;
            self.input.parse_name()?;
            self.input.skip_whitespace();
        }
        self.input.expect_str(">")?;

        if !parameter {
            self.input.declare_entity(&name, decl);
        }
        Ok(())
    }

    // -- Markup shared by prolog and content --

    fn parse_comment(&mut self, parent: NodeId) -> Result<(), ParseError> {
        self.input.expect_str("<!--")?;
        let content = self.input.take_until("--", "comment")?;
        if !self.input.eat(">") {
            return Err(self.input.fatal("'--' not allowed in comment"));
        }
        let node = self.doc.create_node(NodeKind::Comment { content });
        self.doc.append_child(parent, node);
        Ok(())
    }

    fn parse_pi(&mut self, parent: NodeId) -> Result<(), ParseError> {
        let location = self.input.location();
        self.input.expect_str("<?")?;
        let target = self.input.parse_name()?.to_string();
        if target.eq_ignore_ascii_case("xml") {
            return Err(ParserInput::fatal_at(
                "XML declaration allowed only at the start of the document",
                location,
            ));
        }
        let data = if self.input.eat("?>") {
            None
        } else {
            self.input
                .skip_whitespace_required("between processing instruction target and data")?;
            Some(self.input.take_until("?>", "processing instruction")?)
        };
        let node = self
            .doc
            .create_node(NodeKind::ProcessingInstruction { target, data });
        self.doc.append_child(parent, node);
        Ok(())
    }

    // -- Elements --

    fn parse_element(&mut self, parent: NodeId) -> Result<(), ParseError> {
        self.input.increment_depth()?;
        let start = self.input.location();
        self.input.expect_str("<")?;
        let qname = self.input.parse_name()?;
        if !is_qname(qname) {
            return Err(ParserInput::fatal_at(
                format!("invalid element name '{qname}'"),
                start,
            ));
        }

        let mut raw_attributes: Vec<(&'a str, String)> = Vec::new();
        loop {
            let had_ws = self.input.skip_whitespace();
            if self.input.looking_at("/>") || self.input.looking_at(">") {
                break;
            }
            if self.input.at_end() {
                return Err(self.input.fatal("unexpected end of input in start tag"));
            }
            if !had_ws {
                return Err(self.input.fatal("whitespace required between attributes"));
            }
            let at = self.input.location();
            let name = self.input.parse_name()?;
            self.input.skip_whitespace();
            self.input.expect_str("=")?;
            self.input.skip_whitespace();
            let value = self.input.parse_attribute_value()?;
            if raw_attributes.iter().any(|(n, _)| *n == name) {
                return Err(ParserInput::fatal_at(
                    format!("duplicate attribute '{name}'"),
                    at,
                ));
            }
            raw_attributes.push((name, value));
            if raw_attributes.len() > self.options.max_attributes as usize {
                return Err(self.input.fatal(format!(
                    "too many attributes (limit {})",
                    self.options.max_attributes
                )));
            }
        }

        self.scopes.push_scope();
        let mut declarations = Vec::new();
        let mut attributes = Vec::new();
        for (name, value) in raw_attributes {
            match split_qname(name) {
                (None, "xmlns") => {
                    if value == XML_NAMESPACE || value == XMLNS_NAMESPACE {
                        return Err(ParserInput::fatal_at(
                            format!("'{value}' cannot be the default namespace"),
                            start,
                        ));
                    }
                    self.scopes.bind(None, &value);
                    declarations.push(NamespaceDecl { prefix: None, uri: value });
                }
                (Some("xmlns"), prefix) => {
                    self.check_prefix_binding(prefix, &value, start)?;
                    self.scopes.bind(Some(prefix), &value);
                    declarations.push(NamespaceDecl {
                        prefix: Some(prefix.to_string()),
                        uri: value,
                    });
                }
                _ => attributes.push((name, value)),
            }
        }

        let (prefix, local) = split_qname(qname);
        let namespace = self.resolve_prefix(prefix, true, start)?;
        let element = self.doc.create_node(NodeKind::Element {
            name: local.to_string(),
            prefix: prefix.map(str::to_string),
            namespace,
            attributes: Vec::new(),
            namespaces: declarations,
        });
        self.doc.append_child(parent, element);

        let mut expanded: Vec<(Option<String>, &str)> = Vec::new();
        for (name, value) in attributes {
            if !is_qname(name) {
                return Err(ParserInput::fatal_at(
                    format!("invalid attribute name '{name}'"),
                    start,
                ));
            }
            let (prefix, local) = split_qname(name);
            let namespace = self.resolve_prefix(prefix, false, start)?;
            if expanded.iter().any(|(ns, l)| *ns == namespace && *l == local) {
                return Err(ParserInput::fatal_at(
                    format!("duplicate attribute '{name}' after namespace expansion"),
                    start,
                ));
            }
            expanded.push((namespace.clone(), local));
            self.doc.add_attribute(
                element,
                Attribute {
                    name: local.to_string(),
                    prefix: prefix.map(str::to_string),
                    namespace,
                    value,
                },
            );
        }

        if !self.input.eat("/>") {
            self.input.expect_str(">")?;
            self.parse_content(element)?;
            let end = self.input.location();
            self.input.expect_str("</")?;
            let closing = self.input.parse_name()?;
            if closing != qname {
                return Err(ParserInput::fatal_at(
                    format!("mismatched end tag: expected </{qname}>, found </{closing}>"),
                    end,
                ));
            }
            self.input.skip_whitespace();
            self.input.expect_str(">")?;
        }

        self.scopes.pop_scope();
        self.input.decrement_depth();
        Ok(())
    }

    fn check_prefix_binding(
        &self,
        prefix: &str,
        uri: &str,
        at: crate::error::SourceLocation,
    ) -> Result<(), ParseError> {
        let problem = if uri.is_empty() {
            Some(format!("namespace prefix '{prefix}' bound to an empty URI"))
        } else if prefix == "xmlns" {
            Some("the 'xmlns' prefix cannot be declared".to_string())
        } else if prefix == "xml" && uri != XML_NAMESPACE {
            Some("the 'xml' prefix cannot be rebound".to_string())
        } else if prefix != "xml" && (uri == XML_NAMESPACE || uri == XMLNS_NAMESPACE) {
            Some(format!("reserved namespace '{uri}' bound to prefix '{prefix}'"))
        } else {
            None
        };
        match problem {
            Some(message) => Err(ParserInput::fatal_at(message, at)),
            None => Ok(()),
        }
    }

    /// Resolves a prefix in the current scope. Unprefixed attributes never
    /// take the default namespace.
    fn resolve_prefix(
        &self,
        prefix: Option<&str>,
        is_element: bool,
        at: crate::error::SourceLocation,
    ) -> Result<Option<String>, ParseError> {
        match prefix {
            Some(p) => self
                .scopes
                .resolve(Some(p))
                .map(|uri| Some(uri.to_string()))
                .ok_or_else(|| ParserInput::fatal_at(format!("unbound namespace prefix '{p}'"), at)),
            None if is_element => Ok(self.scopes.resolve(None).map(str::to_string)),
            None => Ok(None),
        }
    }

    // -- Content --

    fn parse_content(&mut self, element: NodeId) -> Result<(), ParseError> {
        let mut text = String::new();
        loop {
            if self.input.at_end() {
                return Err(self.input.fatal("unexpected end of input in element content"));
            }
            if self.input.looking_at("</") {
                self.flush_text(element, &mut text);
                return Ok(());
            }
            if self.input.looking_at("<![CDATA[") {
                self.flush_text(element, &mut text);
                self.input.expect_str("<![CDATA[")?;
                let content = self.input.take_until("]]>", "CDATA section")?;
                let node = self.doc.create_node(NodeKind::CData { content });
                self.doc.append_child(element, node);
            } else if self.input.looking_at("<!--") {
                self.flush_text(element, &mut text);
                self.parse_comment(element)?;
            } else if self.input.looking_at("<?") {
                self.flush_text(element, &mut text);
                self.parse_pi(element)?;
            } else if self.input.looking_at("<") {
                self.flush_text(element, &mut text);
                self.parse_element(element)?;
            } else if self.input.eat("&") {
                self.input.parse_reference(&mut text, false)?;
                self.input.check_text_length(text.len())?;
            } else if self.input.looking_at("]]>") {
                return Err(self.input.fatal("']]>' not allowed in content"));
            } else {
                text.push(self.input.next_char()?);
                self.input.check_text_length(text.len())?;
            }
        }
    }

    fn flush_text(&mut self, parent: NodeId, text: &mut String) {
        if text.is_empty() {
            return;
        }
        let content = std::mem::take(text);
        if self.options.no_blanks && content.chars().all(is_xml_whitespace) {
            return;
        }
        let node = self.doc.create_text(content);
        self.doc.append_child(parent, node);
    }
}
