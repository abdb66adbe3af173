//! Query and conditional dispatch over a loaded document.
//!
//! [`DocumentReader`] is the surface mapping code talks to. It loads a
//! document, answers path queries against it, and fires callbacks
//! depending on whether (and with what value) a path matches.
//!
//! "Exists" has a precise meaning throughout: the expression evaluates, it
//! matches at least one node, and the first match has a non-empty textual
//! value. An element that is present but empty does not exist.
//!
//! # Examples
//!
//! ```
//! use xmlbridge::{Callback, DocumentReader};
//!
//! let mut reader = DocumentReader::new();
//! reader.add_namespace("cbc", "urn:cbc");
//! reader
//!     .load_from_xml_string(r#"<Invoice xmlns:cbc="urn:cbc"><cbc:ID>INV-1</cbc:ID></Invoice>"#)
//!     .unwrap();
//!
//! let mut id = String::new();
//! reader
//!     .when_exists(
//!         "/Invoice/cbc:ID",
//!         None,
//!         Some(Callback::node(|node| {
//!             id = reader.node_value(node).unwrap_or_default();
//!             Ok(())
//!         })),
//!         None,
//!     )
//!     .unwrap();
//! assert_eq!(id, "INV-1");
//! ```

pub mod callback;
pub mod node_list;

use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;

use tracing::debug;

use crate::document::{DocumentCore, NamespaceRegistry};
use crate::error::{ParseError, QueryFailure, ReaderError, Result};
use crate::parser::reporting::SuppressReporting;
use crate::parser::{self, ParseOptions};
use crate::serial::SerializeOptions;
use crate::tree::{Document, NodeId};
use crate::xpath::XPathValue;

pub use callback::{Callback, CallbackArgs, CallbackInvoker, CallbackResult};
pub use node_list::NodeList;

/// The values `when_equals` and `when_not_equals` compare against.
///
/// A single value converts into a one-element set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Candidates(Vec<String>);

impl Candidates {
    /// Exact, case-sensitive membership.
    #[must_use]
    pub fn contains(&self, value: &str) -> bool {
        self.0.iter().any(|candidate| candidate == value)
    }
}

impl From<&str> for Candidates {
    fn from(value: &str) -> Self {
        Self(vec![value.to_string()])
    }
}

impl From<String> for Candidates {
    fn from(value: String) -> Self {
        Self(vec![value])
    }
}

impl From<&[&str]> for Candidates {
    fn from(values: &[&str]) -> Self {
        Self(values.iter().map(ToString::to_string).collect())
    }
}

impl<const N: usize> From<[&str; N]> for Candidates {
    fn from(values: [&str; N]) -> Self {
        Self(values.iter().map(ToString::to_string).collect())
    }
}

impl From<Vec<String>> for Candidates {
    fn from(values: Vec<String>) -> Self {
        Self(values)
    }
}

impl From<Vec<&str>> for Candidates {
    fn from(values: Vec<&str>) -> Self {
        values.as_slice().into()
    }
}

/// Loads an XML document and answers namespace-aware path queries on it.
///
/// A reader starts empty. Loading replaces the tree only when the new input
/// parses; a failed load leaves the previous state untouched.
#[derive(Debug, Default)]
pub struct DocumentReader {
    core: DocumentCore,
    invoker: CallbackInvoker,
    parse_options: ParseOptions,
}

impl DocumentReader {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the parser limits used by subsequent loads.
    #[must_use]
    pub fn with_parse_options(mut self, options: ParseOptions) -> Self {
        self.parse_options = options;
        self
    }

    /// Sets the options used by [`serialize`](Self::serialize).
    #[must_use]
    pub fn with_serialize_options(mut self, options: SerializeOptions) -> Self {
        self.core = self.core.with_serialize_options(options);
        self
    }

    /// Creates a reader and loads `source` into it.
    ///
    /// # Errors
    ///
    /// Returns [`ReaderError::Parse`] if `source` is not well-formed XML.
    pub fn from_xml_string(source: &str) -> Result<Self> {
        let mut reader = Self::new();
        reader.load_from_xml_string(source)?;
        Ok(reader)
    }

    /// Creates a reader and loads the file at `path` into it.
    ///
    /// # Errors
    ///
    /// Returns [`ReaderError::Parse`] if the file cannot be read or is not
    /// well-formed XML.
    pub fn from_xml_file(path: impl AsRef<Path>) -> Result<Self> {
        let mut reader = Self::new();
        reader.load_from_xml_file(path)?;
        Ok(reader)
    }

    /// Creates a reader around an existing tree, e.g. one built by mapping
    /// code for serialization.
    #[must_use]
    pub fn from_document(document: Document) -> Self {
        let mut reader = Self::new();
        reader.core.set_document(document);
        reader
    }

    // --- Namespaces ---

    /// Binds `prefix` to `uri` for queries. Takes effect at the next load or
    /// [`rebuild_evaluator`](Self::rebuild_evaluator); a later binding for
    /// the same prefix wins.
    pub fn add_namespace(&mut self, prefix: &str, uri: &str) -> &mut Self {
        self.core.add_namespace(prefix, uri);
        self
    }

    /// Makes namespaces registered since the last load visible to queries.
    pub fn rebuild_evaluator(&mut self) -> &mut Self {
        self.core.rebuild_evaluator();
        self
    }

    #[must_use]
    pub fn registry(&self) -> &NamespaceRegistry {
        self.core.registry()
    }

    #[must_use]
    pub fn core(&self) -> &DocumentCore {
        &self.core
    }

    // --- Loading ---

    /// Replaces the current document with one parsed from `source`.
    ///
    /// Parser diagnostics are suppressed for the duration of the call.
    ///
    /// # Errors
    ///
    /// Returns [`ReaderError::Parse`] for any failure. The reader is left
    /// as it was.
    pub fn load_from_xml_string(&mut self, source: &str) -> Result<&mut Self> {
        let options = self.parse_options.clone();
        let document = guarded_parse(|| parser::parse_str_with_options(source, &options))?;
        debug!(bytes = source.len(), "document loaded from string");
        self.install(document);
        Ok(self)
    }

    /// Replaces the current document with one decoded from `bytes`, honoring
    /// a byte order mark or an encoding declaration.
    ///
    /// # Errors
    ///
    /// Returns [`ReaderError::Parse`] for malformed or undecodable input.
    pub fn load_from_xml_bytes(&mut self, bytes: &[u8]) -> Result<&mut Self> {
        let options = self.parse_options.clone();
        let document = guarded_parse(|| parser::parse_bytes_with_options(bytes, &options))?;
        debug!(bytes = bytes.len(), "document loaded from bytes");
        self.install(document);
        Ok(self)
    }

    /// Replaces the current document with the contents of the file at
    /// `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ReaderError::Parse`] if the file cannot be read or does not
    /// hold a well-formed document.
    pub fn load_from_xml_file(&mut self, path: impl AsRef<Path>) -> Result<&mut Self> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|err| {
            debug!(path = %path.display(), error = %err, "cannot read document");
            ReaderError::Parse
        })?;
        self.load_from_xml_bytes(&bytes)
    }

    fn install(&mut self, document: Document) {
        self.core.set_document(document);
        debug!(
            namespaces = ?self.core.document_namespaces().keys().collect::<Vec<_>>(),
            "captured document namespaces"
        );
    }

    /// Whether a document has been loaded.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.core.document().is_some()
    }

    #[must_use]
    pub fn document(&self) -> Option<&Document> {
        self.core.document()
    }

    /// Mutable access to the tree. See [`DocumentCore::document_mut`].
    pub fn document_mut(&mut self) -> Option<&mut Document> {
        self.core.document_mut()
    }

    /// The textual value of a node: descendant text for elements, the
    /// value for attributes, the content for character data.
    #[must_use]
    pub fn node_value(&self, node: NodeId) -> Option<String> {
        let doc = self.core.document()?;
        doc.contains(node).then(|| doc.node_value(node)).flatten()
    }

    /// The parent of a node; the owning element for attributes.
    #[must_use]
    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        let doc = self.core.document()?;
        doc.contains(node).then(|| doc.parent(node)).flatten()
    }

    // --- Queries ---

    /// Evaluates `expression` against `context` (the document node when
    /// `None`) and returns every match in document order.
    ///
    /// An expression that evaluates to a number, string or boolean matches
    /// nothing.
    ///
    /// # Errors
    ///
    /// Returns the [`QueryFailure`] for syntax errors, unbound prefixes,
    /// invalid context nodes, or when no document is loaded.
    pub fn query(
        &self,
        expression: &str,
        context: Option<NodeId>,
    ) -> std::result::Result<NodeList, QueryFailure> {
        let failure = |reason: String| {
            debug!(expression, %reason, "query failed");
            QueryFailure {
                expression: expression.to_string(),
                reason,
            }
        };
        let doc = self
            .core
            .document()
            .ok_or_else(|| failure("no document loaded".to_string()))?;
        let context = context.unwrap_or_else(|| doc.root());
        if !doc.contains(context) {
            return Err(failure("context node is not part of this document".to_string()));
        }
        match self.core.evaluator().evaluate(doc, context, expression) {
            Ok(XPathValue::NodeSet(nodes)) => Ok(NodeList::new(nodes)),
            Ok(_) => Ok(NodeList::default()),
            Err(err) => Err(failure(err.to_string())),
        }
    }

    /// The first match, if it exists in the non-empty sense.
    fn first_existing(&self, expression: &str, context: Option<NodeId>) -> Option<NodeId> {
        let first = self.query(expression, context).ok()?.first()?;
        let value = self.node_value(first)?;
        (!value.is_empty()).then_some(first)
    }

    /// True if `expression` matches and the first match has a non-empty
    /// value. Evaluation failures count as no match.
    #[must_use]
    pub fn exists(&self, expression: &str, context: Option<NodeId>) -> bool {
        self.first_existing(expression, context).is_some()
    }

    /// The value of the first match, or `None` whenever
    /// [`exists`](Self::exists) is false.
    #[must_use]
    pub fn query_value(&self, expression: &str, context: Option<NodeId>) -> Option<String> {
        self.first_existing(expression, context)
            .and_then(|node| self.node_value(node))
    }

    /// Every match, or an empty list whenever [`exists`](Self::exists) is
    /// false.
    #[must_use]
    pub fn query_all(&self, expression: &str, context: Option<NodeId>) -> NodeList {
        if !self.exists(expression, context) {
            return NodeList::default();
        }
        self.query(expression, context).unwrap_or_default()
    }

    // --- Conditional dispatch ---

    fn matched(&self, node: NodeId) -> CallbackArgs<'static> {
        CallbackArgs::Matched {
            node,
            parent: self.parent(node),
        }
    }

    /// Fires `callback` with the first match and its parent if `expression`
    /// exists, otherwise fires `else_callback` with no arguments.
    ///
    /// # Errors
    ///
    /// Propagates callback failures and argument mismatches.
    pub fn when_exists(
        &self,
        expression: &str,
        context: Option<NodeId>,
        callback: Option<Callback<'_>>,
        else_callback: Option<Callback<'_>>,
    ) -> Result<&Self> {
        match self.first_existing(expression, context) {
            Some(node) => self.invoker.fire(callback, self.matched(node))?,
            None => self.invoker.fire(else_callback, CallbackArgs::None)?,
        }
        Ok(self)
    }

    /// Fires `callback` with no arguments if `expression` does not exist,
    /// otherwise fires `else_callback` with the first match and its parent.
    ///
    /// # Errors
    ///
    /// Propagates callback failures and argument mismatches.
    pub fn when_not_exists(
        &self,
        expression: &str,
        context: Option<NodeId>,
        callback: Option<Callback<'_>>,
        else_callback: Option<Callback<'_>>,
    ) -> Result<&Self> {
        match self.first_existing(expression, context) {
            None => self.invoker.fire(callback, CallbackArgs::None)?,
            Some(node) => self.invoker.fire(else_callback, self.matched(node))?,
        }
        Ok(self)
    }

    /// The first existing match whose value is one of `candidates`.
    fn first_equal(
        &self,
        expression: &str,
        context: Option<NodeId>,
        candidates: &Candidates,
    ) -> Option<NodeId> {
        let node = self.first_existing(expression, context)?;
        let value = self.node_value(node)?;
        candidates.contains(&value).then_some(node)
    }

    /// Fires `callback` with the first match and its parent if the value of
    /// `expression` equals one of `candidates`, otherwise fires
    /// `else_callback` with no arguments. A missing value never matches.
    ///
    /// # Errors
    ///
    /// Propagates callback failures and argument mismatches.
    pub fn when_equals(
        &self,
        expression: &str,
        context: Option<NodeId>,
        candidates: impl Into<Candidates>,
        callback: Option<Callback<'_>>,
        else_callback: Option<Callback<'_>>,
    ) -> Result<&Self> {
        match self.first_equal(expression, context, &candidates.into()) {
            Some(node) => self.invoker.fire(callback, self.matched(node))?,
            None => self.invoker.fire(else_callback, CallbackArgs::None)?,
        }
        Ok(self)
    }

    /// The inverse of [`when_equals`](Self::when_equals): `callback` fires
    /// with no arguments when nothing matches, `else_callback` with the
    /// match and its parent when one does.
    ///
    /// # Errors
    ///
    /// Propagates callback failures and argument mismatches.
    pub fn when_not_equals(
        &self,
        expression: &str,
        context: Option<NodeId>,
        candidates: impl Into<Candidates>,
        callback: Option<Callback<'_>>,
        else_callback: Option<Callback<'_>>,
    ) -> Result<&Self> {
        match self.first_equal(expression, context, &candidates.into()) {
            None => self.invoker.fire(callback, CallbackArgs::None)?,
            Some(node) => self.invoker.fire(else_callback, self.matched(node))?,
        }
        Ok(self)
    }

    /// Tries `expressions` in order, each against the context node at the
    /// same index. The first that exists fires `callback` with its first
    /// match, its index and the expression text; later expressions are not
    /// evaluated. If none exists, `else_callback` fires with no arguments.
    ///
    /// # Errors
    ///
    /// Returns [`ReaderError::Precondition`] before evaluating anything if
    /// the two slices differ in length, and propagates callback failures.
    pub fn when_one_exists(
        &self,
        expressions: &[&str],
        contexts: &[Option<NodeId>],
        callback: Option<Callback<'_>>,
        else_callback: Option<Callback<'_>>,
    ) -> Result<&Self> {
        if expressions.len() != contexts.len() {
            return Err(ReaderError::Precondition(format!(
                "{} expressions but {} context nodes",
                expressions.len(),
                contexts.len()
            )));
        }
        for (index, (&expression, &context)) in expressions.iter().zip(contexts).enumerate() {
            if let Some(node) = self.first_existing(expression, context) {
                self.invoker.fire(
                    callback,
                    CallbackArgs::Indexed {
                        node,
                        index,
                        expression,
                    },
                )?;
                return Ok(self);
            }
        }
        self.invoker.fire(else_callback, CallbackArgs::None)?;
        Ok(self)
    }

    // --- Output ---

    /// Renders the current document as indented XML.
    ///
    /// # Errors
    ///
    /// Returns [`ReaderError::Serialization`] if nothing is loaded.
    pub fn serialize(&self) -> Result<String> {
        self.core.serialize()
    }

    /// Renders the current document to `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ReaderError::Serialization`] if nothing is loaded and
    /// [`ReaderError::Io`] if the write fails.
    pub fn serialize_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        self.core.serialize_to_file(path)
    }
}

/// Runs a parse with reporting suppressed, folding errors and parser
/// panics into [`ReaderError::Parse`].
fn guarded_parse(
    parse: impl FnOnce() -> std::result::Result<Document, ParseError>,
) -> Result<Document> {
    let _quiet = SuppressReporting::new();
    match panic::catch_unwind(AssertUnwindSafe(parse)) {
        Ok(Ok(document)) => Ok(document),
        Ok(Err(err)) => {
            debug!(error = %err, "rejected malformed document");
            Err(ReaderError::Parse)
        }
        Err(_) => {
            debug!("parser panicked");
            Err(ReaderError::Parse)
        }
    }
}
