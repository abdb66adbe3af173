//! Error types for loading, querying and dispatching.
//!
//! Two layers live here. [`ParseError`] is the detailed, located error the
//! XML parser produces. [`ReaderError`] is what the public reader surface
//! returns; it deliberately collapses every load failure into the single
//! [`ReaderError::Parse`] variant so callers never see parser internals.
//! [`QueryFailure`] is returned by value from `query` and is never raised.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Boxed error type returned by user callbacks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type alias for reader operations.
pub type Result<T> = std::result::Result<T, ReaderError>;

/// Source location within an XML document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourceLocation {
    /// 1-based line number.
    pub line: u32,
    /// 1-based column number (in characters, not bytes).
    pub column: u32,
    /// 0-based byte offset from the start of the input.
    pub byte_offset: usize,
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// The error returned when the input is not a well-formed XML document.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("parse error at {location}: {message}")]
pub struct ParseError {
    /// Human-readable description of the fault.
    pub message: String,
    /// Where in the source the fault was detected.
    pub location: SourceLocation,
}

impl ParseError {
    /// Creates an error at the given location.
    pub fn new(message: impl Into<String>, location: SourceLocation) -> Self {
        Self {
            message: message.into(),
            location,
        }
    }

    /// Creates an error that has no meaningful position (encoding faults,
    /// I/O failures, parser panics).
    pub fn without_location(message: impl Into<String>) -> Self {
        Self::new(message, SourceLocation::default())
    }
}

/// A path expression that could not be evaluated.
///
/// This is a value, not an exception: `query` hands it back to the caller
/// and every other query operation treats it as "not found".
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("cannot evaluate '{expression}': {reason}")]
pub struct QueryFailure {
    /// The expression as supplied by the caller.
    pub expression: String,
    /// Why evaluation failed.
    pub reason: String,
}

/// Errors surfaced by [`crate::DocumentReader`] and [`crate::DocumentCore`].
#[derive(Error, Debug)]
pub enum ReaderError {
    /// The input was not well-formed XML, could not be decoded, could not be
    /// read, or the parser faulted. Detail is intentionally dropped.
    #[error("Invalid XML detected.")]
    Parse,

    /// Serialization was requested but no document is loaded.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// Writing serialized output failed.
    #[error("cannot write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A caller broke an operation's precondition.
    #[error("precondition violated: {0}")]
    Precondition(String),

    /// A callback was handed an argument bundle it cannot accept.
    #[error("callback expects {expected} but the call site supplied {supplied}")]
    CallbackArguments {
        expected: &'static str,
        supplied: &'static str,
    },

    /// Error returned by a user callback, passed through untouched.
    #[error("callback failed: {0}")]
    Callback(#[source] BoxError),
}

impl ReaderError {
    /// Returns the error a callback produced, if this is one.
    #[must_use]
    pub fn callback_error(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        match self {
            Self::Callback(inner) => Some(inner.as_ref()),
            _ => None,
        }
    }
}
