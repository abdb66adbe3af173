//! Value model and errors for path expressions.
//!
//! The four `XPath` 1.0 data types and the conversions between them
//! (sections 4.2 to 4.4 of the recommendation). Converting a node-set needs
//! the document for string-values, so the conversions take one.

use thiserror::Error;

use crate::tree::{Document, NodeId};

/// An error raised while parsing or evaluating a path expression.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum XPathError {
    #[error("syntax error at position {position}: {message}")]
    Syntax { message: String, position: usize },

    #[error("undeclared namespace prefix '{0}'")]
    UnboundPrefix(String),

    #[error("unknown function '{0}'")]
    UnknownFunction(String),

    #[error("function '{name}' expects {expected} argument(s), found {found}")]
    ArgumentCount {
        name: String,
        expected: &'static str,
        found: usize,
    },

    #[error("undefined variable '${0}'")]
    UnknownVariable(String),

    #[error("type error: {0}")]
    Type(String),
}

impl XPathError {
    pub(crate) fn syntax(message: impl Into<String>, position: usize) -> Self {
        Self::Syntax {
            message: message.into(),
            position,
        }
    }
}

/// An `XPath` 1.0 value.
#[derive(Debug, Clone, PartialEq)]
pub enum XPathValue {
    Boolean(bool),
    Number(f64),
    String(String),
    /// Nodes in document order without duplicates.
    NodeSet(Vec<NodeId>),
}

impl XPathValue {
    /// The type name used in error messages.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Boolean(_) => "boolean",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::NodeSet(_) => "node-set",
        }
    }

    /// `boolean()` conversion.
    #[must_use]
    pub fn to_boolean(&self) -> bool {
        match self {
            Self::Boolean(b) => *b,
            Self::Number(n) => *n != 0.0 && !n.is_nan(),
            Self::String(s) => !s.is_empty(),
            Self::NodeSet(nodes) => !nodes.is_empty(),
        }
    }

    /// `number()` conversion.
    #[must_use]
    pub fn to_number(&self, doc: &Document) -> f64 {
        match self {
            Self::Boolean(b) => f64::from(u8::from(*b)),
            Self::Number(n) => *n,
            Self::String(s) => parse_number(s),
            Self::NodeSet(_) => parse_number(&self.to_xpath_string(doc)),
        }
    }

    /// `string()` conversion. A node-set converts to the string-value of its
    /// first node.
    #[must_use]
    pub fn to_xpath_string(&self, doc: &Document) -> String {
        match self {
            Self::Boolean(b) => b.to_string(),
            Self::Number(n) => format_number(*n),
            Self::String(s) => s.clone(),
            Self::NodeSet(nodes) => nodes
                .first()
                .map(|&n| doc.string_value(n))
                .unwrap_or_default(),
        }
    }

    /// Unwraps a node-set or reports a type error.
    ///
    /// # Errors
    ///
    /// Returns [`XPathError::Type`] for any other value type.
    pub fn into_node_set(self) -> Result<Vec<NodeId>, XPathError> {
        match self {
            Self::NodeSet(nodes) => Ok(nodes),
            other => Err(XPathError::Type(format!(
                "expected node-set, found {}",
                other.type_name()
            ))),
        }
    }
}

/// Parses a string per the `Number` production, surrounded by optional
/// whitespace. Anything else is NaN.
#[must_use]
pub fn parse_number(s: &str) -> f64 {
    let trimmed = s.trim_matches(|c| matches!(c, ' ' | '\t' | '\n' | '\r'));
    let digits = trimmed.strip_prefix('-').unwrap_or(trimmed);
    let valid = !digits.is_empty()
        && digits != "."
        && digits.bytes().all(|b| b.is_ascii_digit() || b == b'.')
        && digits.bytes().filter(|&b| b == b'.').count() <= 1;
    if valid {
        trimmed.parse().unwrap_or(f64::NAN)
    } else {
        f64::NAN
    }
}

/// Formats a number per `XPath` string conversion: no exponent, no trailing
/// `.0` on integers, `NaN` and `Infinity` spelled out.
#[must_use]
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if n == 0.0 {
        "0".to_string()
    } else {
        format!("{n}")
    }
}
