//! Low-level input cursor and namespace scoping for the XML parser.
//!
//! [`ParserInput`] walks the source text character by character, tracking
//! line, column and byte offset for error locations, and enforcing the
//! depth and size limits from [`ParseOptions`]. Character references, the
//! five predefined entities and general entities declared in the internal
//! subset are expanded; no external entity is ever loaded.

use std::collections::HashMap;

use crate::error::{ParseError, SourceLocation};
use crate::util::qname::{is_name_char, is_name_start_char};

use super::ParseOptions;

/// The namespace permanently bound to the `xml` prefix.
pub const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

/// The namespace of `xmlns` declarations themselves.
pub(crate) const XMLNS_NAMESPACE: &str = "http://www.w3.org/2000/xmlns/";

/// XML 1.0 `Char` production.
pub(crate) fn is_xml_char(c: char) -> bool {
    matches!(c as u32,
        0x09 | 0x0A | 0x0D | 0x20..=0xD7FF | 0xE000..=0xFFFD | 0x0001_0000..=0x0010_FFFF)
}

/// XML 1.0 `S` production.
pub(crate) fn is_xml_whitespace(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | '\r')
}

pub(crate) struct ParserInput<'a> {
    input: &'a str,
    pos: usize,
    line: u32,
    column: u32,
    depth: u32,
    max_depth: u32,
    max_name_length: usize,
    max_text_length: usize,
    entities: HashMap<String, EntityDecl>,
    expansions: u32,
    max_entity_expansions: u32,
}

/// A general entity declared in the internal subset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum EntityDecl {
    /// Replacement text as written in the literal, references unexpanded.
    Internal(String),
    /// Declared with `SYSTEM` or `PUBLIC`. Never loaded.
    External,
}

fn predefined_entity(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "apos" => Some('\''),
        "quot" => Some('"'),
        _ => None,
    }
}

/// Resolves the digits of `&#...;` (with a leading `x` for hex).
fn char_reference(digits: &str) -> Option<char> {
    let (digits, radix) = match digits.strip_prefix('x') {
        Some(hex) => (hex, 16),
        None => (digits, 10),
    };
    if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
        return None;
    }
    u32::from_str_radix(digits, radix)
        .ok()
        .and_then(char::from_u32)
        .filter(|&c| is_xml_char(c))
}

impl<'a> ParserInput<'a> {
    pub fn new(input: &'a str, options: &ParseOptions) -> Self {
        Self {
            input,
            pos: 0,
            line: 1,
            column: 1,
            depth: 0,
            max_depth: options.max_depth,
            max_name_length: options.max_name_length,
            max_text_length: options.max_text_length,
            entities: HashMap::new(),
            expansions: 0,
            max_entity_expansions: options.max_entity_expansions,
        }
    }

    // -- Position --

    pub fn location(&self) -> SourceLocation {
        SourceLocation {
            line: self.line,
            column: self.column,
            byte_offset: self.pos,
        }
    }

    pub fn at_end(&self) -> bool {
        self.pos >= self.input.len()
    }

    pub fn fatal(&self, message: impl Into<String>) -> ParseError {
        ParseError::new(message, self.location())
    }

    pub fn fatal_at(message: impl Into<String>, location: SourceLocation) -> ParseError {
        ParseError::new(message, location)
    }

    // -- Depth and size limits --

    pub fn increment_depth(&mut self) -> Result<(), ParseError> {
        self.depth += 1;
        if self.depth > self.max_depth {
            return Err(self.fatal(format!(
                "maximum nesting depth exceeded ({})",
                self.max_depth
            )));
        }
        Ok(())
    }

    pub fn decrement_depth(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    pub fn check_text_length(&self, len: usize) -> Result<(), ParseError> {
        if len > self.max_text_length {
            return Err(self.fatal(format!(
                "text exceeds maximum length ({} bytes)",
                self.max_text_length
            )));
        }
        Ok(())
    }

    // -- Peeking and consuming --

    pub fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    pub fn looking_at(&self, s: &str) -> bool {
        self.input[self.pos..].starts_with(s)
    }

    /// Returns the character following `prefix` if the input starts with it.
    pub fn char_after(&self, prefix: &str) -> Option<char> {
        self.input[self.pos..].strip_prefix(prefix)?.chars().next()
    }

    /// Consumes one character without normalization or validation.
    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(ch)
    }

    /// Consumes one character, folding `\r\n` and lone `\r` to `\n` and
    /// rejecting characters outside the XML `Char` production.
    pub fn next_char(&mut self) -> Result<char, ParseError> {
        let location = self.location();
        let ch = self
            .bump()
            .ok_or_else(|| self.fatal("unexpected end of input"))?;
        if ch == '\r' {
            if self.peek() == Some('\n') {
                self.bump();
            }
            return Ok('\n');
        }
        if !is_xml_char(ch) {
            return Err(Self::fatal_at(
                format!("invalid XML character U+{:04X}", ch as u32),
                location,
            ));
        }
        Ok(ch)
    }

    /// Consumes `s` if the input starts with it.
    pub fn eat(&mut self, s: &str) -> bool {
        if self.looking_at(s) {
            for _ in s.chars() {
                self.bump();
            }
            true
        } else {
            false
        }
    }

    pub fn expect_str(&mut self, expected: &str) -> Result<(), ParseError> {
        if self.eat(expected) {
            return Ok(());
        }
        Err(match self.peek() {
            Some(found) => self.fatal(format!("expected '{expected}', found '{found}'")),
            None => self.fatal(format!("expected '{expected}', found end of input")),
        })
    }

    /// Skips whitespace; returns whether any was consumed.
    pub fn skip_whitespace(&mut self) -> bool {
        let mut skipped = false;
        while self.peek().is_some_and(is_xml_whitespace) {
            self.bump();
            skipped = true;
        }
        skipped
    }

    pub fn skip_whitespace_required(&mut self, context: &str) -> Result<(), ParseError> {
        if self.skip_whitespace() {
            Ok(())
        } else {
            Err(self.fatal(format!("whitespace required {context}")))
        }
    }

    // -- Lexical productions --

    /// Parses an XML `Name` and returns it as a slice of the input.
    pub fn parse_name(&mut self) -> Result<&'a str, ParseError> {
        let start = self.pos;
        match self.peek() {
            Some(c) if is_name_start_char(c) => {
                self.bump();
            }
            Some(c) => return Err(self.fatal(format!("invalid name start character '{c}'"))),
            None => return Err(self.fatal("expected name, found end of input")),
        }
        while self.peek().is_some_and(is_name_char) {
            self.bump();
        }
        if self.pos - start > self.max_name_length {
            return Err(self.fatal(format!(
                "name exceeds maximum length ({} bytes)",
                self.max_name_length
            )));
        }
        Ok(&self.input[start..self.pos])
    }

    /// Parses a quoted literal without reference expansion (version numbers,
    /// system and public identifiers).
    pub fn parse_quoted(&mut self) -> Result<String, ParseError> {
        let quote = match self.peek() {
            Some(q @ ('"' | '\'')) => q,
            _ => return Err(self.fatal("expected quoted literal")),
        };
        self.bump();
        let mut value = String::new();
        loop {
            match self.peek() {
                Some(c) if c == quote => {
                    self.bump();
                    return Ok(value);
                }
                Some(_) => value.push(self.next_char()?),
                None => return Err(self.fatal("unterminated literal")),
            }
            self.check_text_length(value.len())?;
        }
    }

    // -- Entities --

    /// Records a general entity. The first declaration of a name is binding.
    pub fn declare_entity(&mut self, name: &str, decl: EntityDecl) {
        self.entities.entry(name.to_string()).or_insert(decl);
    }

    /// Parses a reference after its leading `&` and appends its expansion
    /// to `out`. Inside attribute values literal whitespace from replacement
    /// text is normalized to spaces.
    pub fn parse_reference(&mut self, out: &mut String, in_attribute: bool) -> Result<(), ParseError> {
        let location = self.location();
        if self.eat("#") {
            let start = self.pos;
            while self.peek().is_some_and(|c| c.is_ascii_alphanumeric()) {
                self.bump();
            }
            let digits = &self.input[start..self.pos];
            self.expect_str(";")?;
            let c = char_reference(digits).ok_or_else(|| {
                Self::fatal_at(format!("invalid character reference '&#{digits};'"), location)
            })?;
            out.push(c);
            return Ok(());
        }
        let name = self.parse_name()?;
        self.expect_str(";")?;
        if let Some(c) = predefined_entity(name) {
            out.push(c);
            return Ok(());
        }
        self.expand_entity(name, out, in_attribute, &mut Vec::new(), location)
    }

    fn expand_entity(
        &mut self,
        name: &str,
        out: &mut String,
        in_attribute: bool,
        active: &mut Vec<String>,
        location: SourceLocation,
    ) -> Result<(), ParseError> {
        self.expansions += 1;
        if self.expansions > self.max_entity_expansions {
            return Err(Self::fatal_at(
                format!("entity expansion limit exceeded ({})", self.max_entity_expansions),
                location,
            ));
        }
        let text = match self.entities.get(name) {
            Some(EntityDecl::Internal(text)) => text.clone(),
            Some(EntityDecl::External) => {
                return Err(Self::fatal_at(
                    format!("reference to external entity '{name}' is not supported"),
                    location,
                ))
            }
            None => {
                return Err(Self::fatal_at(format!("undeclared entity '{name}'"), location));
            }
        };
        if active.iter().any(|open| open == name) {
            return Err(Self::fatal_at(
                format!("recursive reference to entity '{name}'"),
                location,
            ));
        }
        if active.len() >= self.max_depth as usize {
            return Err(Self::fatal_at(
                format!("entity references nested deeper than {}", self.max_depth),
                location,
            ));
        }
        active.push(name.to_string());

        let mut rest = text.as_str();
        while let Some(c) = rest.chars().next() {
            rest = &rest[c.len_utf8()..];
            match c {
                '&' => {
                    let (reference, tail) = rest.split_once(';').ok_or_else(|| {
                        Self::fatal_at(format!("unterminated reference in entity '{name}'"), location)
                    })?;
                    rest = tail;
                    if let Some(digits) = reference.strip_prefix('#') {
                        out.push(char_reference(digits).ok_or_else(|| {
                            Self::fatal_at(
                                format!("invalid character reference '&#{digits};'"),
                                location,
                            )
                        })?);
                    } else if let Some(c) = predefined_entity(reference) {
                        out.push(c);
                    } else if reference.starts_with(is_name_start_char)
                        && reference.chars().all(is_name_char)
                    {
                        self.expand_entity(reference, out, in_attribute, active, location)?;
                    } else {
                        return Err(Self::fatal_at(
                            format!("invalid reference '&{reference};' in entity '{name}'"),
                            location,
                        ));
                    }
                }
                '<' if in_attribute => {
                    return Err(Self::fatal_at("'<' not allowed in attribute value", location));
                }
                '<' => {
                    return Err(Self::fatal_at(
                        format!("markup in the replacement text of entity '{name}' is not supported"),
                        location,
                    ));
                }
                c if in_attribute && is_xml_whitespace(c) => out.push(' '),
                c => out.push(c),
            }
            if out.len() > self.max_text_length {
                return Err(Self::fatal_at(
                    format!("text exceeds maximum length ({} bytes)", self.max_text_length),
                    location,
                ));
            }
        }
        active.pop();
        Ok(())
    }

    /// Parses a quoted attribute value: references expanded, whitespace
    /// characters normalized to spaces, `<` rejected.
    pub fn parse_attribute_value(&mut self) -> Result<String, ParseError> {
        let quote = match self.peek() {
            Some(q @ ('"' | '\'')) => q,
            _ => return Err(self.fatal("attribute value must be quoted")),
        };
        self.bump();
        let mut value = String::new();
        loop {
            match self.peek() {
                Some(c) if c == quote => {
                    self.bump();
                    return Ok(value);
                }
                Some('<') => return Err(self.fatal("'<' not allowed in attribute value")),
                Some('&') => {
                    self.bump();
                    self.parse_reference(&mut value, true)?;
                }
                Some(_) => {
                    let c = self.next_char()?;
                    value.push(if is_xml_whitespace(c) { ' ' } else { c });
                }
                None => return Err(self.fatal("unterminated attribute value")),
            }
            self.check_text_length(value.len())?;
        }
    }

    /// Collects characters up to `delimiter` and consumes the delimiter.
    pub fn take_until(&mut self, delimiter: &str, what: &str) -> Result<String, ParseError> {
        let mut text = String::new();
        loop {
            if self.eat(delimiter) {
                return Ok(text);
            }
            if self.at_end() {
                return Err(self.fatal(format!("unterminated {what}")));
            }
            text.push(self.next_char()?);
            self.check_text_length(text.len())?;
        }
    }
}

// -------------------------------------------------------------------------
// Namespace scoping
// -------------------------------------------------------------------------

/// Stack of in-scope namespace bindings, one frame per open element.
pub(crate) struct NamespaceScopes {
    frames: Vec<Vec<(Option<String>, String)>>,
}

impl NamespaceScopes {
    pub fn new() -> Self {
        Self {
            frames: vec![vec![(Some("xml".to_string()), XML_NAMESPACE.to_string())]],
        }
    }

    pub fn push_scope(&mut self) {
        self.frames.push(Vec::new());
    }

    pub fn pop_scope(&mut self) {
        if self.frames.len() > 1 {
            self.frames.pop();
        }
    }

    pub fn bind(&mut self, prefix: Option<&str>, uri: &str) {
        if let Some(frame) = self.frames.last_mut() {
            frame.push((prefix.map(str::to_string), uri.to_string()));
        }
    }

    /// Resolves a prefix, innermost scope first. An empty URI (a default
    /// namespace undeclaration) resolves to `None`.
    pub fn resolve(&self, prefix: Option<&str>) -> Option<&str> {
        self.frames
            .iter()
            .rev()
            .flat_map(|frame| frame.iter().rev())
            .find(|(p, _)| p.as_deref() == prefix)
            .map(|(_, uri)| uri.as_str())
            .filter(|uri| !uri.is_empty())
    }
}
