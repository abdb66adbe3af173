//! XML 1.0 + Namespaces well-formedness parser.
//!
//! A hand-rolled recursive descent parser that builds a [`Document`]. It is
//! strict: the first well-formedness violation aborts with a located
//! [`ParseError`] and no tree is returned. There is no recovery mode, no
//! external entity loading and no DTD processing beyond skipping the
//! internal subset.
//!
//! Whether failures are also logged is governed by the per-thread switch
//! in [`reporting`].

pub(crate) mod input;
pub mod reporting;
mod xml;

use crate::encoding::decode_to_utf8;
use crate::error::ParseError;
use crate::tree::Document;

pub use input::XML_NAMESPACE;
pub(crate) use input::is_xml_whitespace;

/// Default maximum element nesting depth.
pub const DEFAULT_MAX_DEPTH: u32 = 256;

/// Default maximum number of attributes on a single element.
pub const DEFAULT_MAX_ATTRIBUTES: u32 = 256;

/// Default maximum length in bytes of an element or attribute name.
pub const DEFAULT_MAX_NAME_LENGTH: usize = 50_000;

/// Default maximum length in bytes of a single text node or attribute value.
pub const DEFAULT_MAX_TEXT_LENGTH: usize = 10 * 1024 * 1024;

/// Default maximum number of entity references expanded per document,
/// counting references nested inside replacement text.
pub const DEFAULT_MAX_ENTITY_EXPANSIONS: u32 = 10_000;

/// Parse options controlling tree shape and resource limits.
///
/// ```
/// use xmlbridge::parser::ParseOptions;
///
/// let opts = ParseOptions::default()
///     .no_blanks(true)
///     .max_depth(64);
/// assert!(opts.no_blanks);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseOptions {
    /// Drop text nodes that consist only of whitespace.
    pub no_blanks: bool,
    /// Maximum element nesting depth.
    pub max_depth: u32,
    /// Maximum number of attributes (namespace declarations included) per
    /// element.
    pub max_attributes: u32,
    /// Maximum length in bytes of an element or attribute name.
    pub max_name_length: usize,
    /// Maximum length in bytes of a text run or attribute value.
    pub max_text_length: usize,
    /// Maximum number of entity references expanded in one document.
    pub max_entity_expansions: u32,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            no_blanks: false,
            max_depth: DEFAULT_MAX_DEPTH,
            max_attributes: DEFAULT_MAX_ATTRIBUTES,
            max_name_length: DEFAULT_MAX_NAME_LENGTH,
            max_text_length: DEFAULT_MAX_TEXT_LENGTH,
            max_entity_expansions: DEFAULT_MAX_ENTITY_EXPANSIONS,
        }
    }
}

impl ParseOptions {
    /// Enables or disables stripping of whitespace-only text nodes.
    #[must_use]
    pub fn no_blanks(mut self, yes: bool) -> Self {
        self.no_blanks = yes;
        self
    }

    /// Sets the maximum element nesting depth.
    #[must_use]
    pub fn max_depth(mut self, max: u32) -> Self {
        self.max_depth = max;
        self
    }

    /// Sets the maximum number of attributes per element.
    #[must_use]
    pub fn max_attributes(mut self, max: u32) -> Self {
        self.max_attributes = max;
        self
    }

    /// Sets the maximum name length in bytes.
    #[must_use]
    pub fn max_name_length(mut self, max: usize) -> Self {
        self.max_name_length = max;
        self
    }

    /// Sets the maximum text or attribute value length in bytes.
    #[must_use]
    pub fn max_text_length(mut self, max: usize) -> Self {
        self.max_text_length = max;
        self
    }

    /// Sets the maximum number of entity expansions.
    #[must_use]
    pub fn max_entity_expansions(mut self, max: u32) -> Self {
        self.max_entity_expansions = max;
        self
    }
}

/// Parses an XML string with default options.
///
/// # Errors
///
/// Returns `ParseError` if the input is not well-formed XML.
pub fn parse_str(input: &str) -> Result<Document, ParseError> {
    parse_str_with_options(input, &ParseOptions::default())
}

/// Parses an XML string with the given options.
///
/// A leading byte order mark is ignored.
///
/// # Errors
///
/// Returns `ParseError` if the input is not well-formed XML or exceeds one
/// of the configured limits.
pub fn parse_str_with_options(input: &str, options: &ParseOptions) -> Result<Document, ParseError> {
    let input = input.strip_prefix('\u{FEFF}').unwrap_or(input);
    let result = xml::XmlParser::new(input, options).parse();
    if let Err(err) = &result {
        reporting::report(err);
    }
    result
}

/// Parses raw bytes with default options, detecting the encoding.
///
/// # Errors
///
/// Returns `ParseError` if the bytes cannot be decoded or the document is
/// not well-formed.
pub fn parse_bytes(input: &[u8]) -> Result<Document, ParseError> {
    parse_bytes_with_options(input, &ParseOptions::default())
}

/// Parses raw bytes with the given options, detecting the encoding.
///
/// # Errors
///
/// Returns `ParseError` if the bytes cannot be decoded or the document is
/// not well-formed.
pub fn parse_bytes_with_options(
    input: &[u8],
    options: &ParseOptions,
) -> Result<Document, ParseError> {
    let text = decode_to_utf8(input).map_err(|e| {
        let err = ParseError::without_location(e.message);
        reporting::report(&err);
        err
    })?;
    parse_str_with_options(&text, options)
}
