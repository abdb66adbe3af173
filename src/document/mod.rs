//! The loaded tree together with its namespace state.
//!
//! [`DocumentCore`] owns at most one [`Document`], the explicitly registered
//! namespaces, the namespaces the document declares itself, and the
//! [`XPathEvaluator`] built from both. The evaluator is a snapshot: it only
//! sees registrations made before the last [`DocumentCore::rebuild_evaluator`]
//! call (loading a document rebuilds it too).

pub mod registry;

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use tracing::debug;

use crate::error::{ReaderError, Result};
use crate::serial::{serialize_with_options, SerializeOptions};
use crate::tree::{Document, NodeKind};
use crate::xpath::XPathEvaluator;

pub use registry::NamespaceRegistry;

/// Owner of the parsed tree, the namespace registry and the query
/// evaluator bound to them.
#[derive(Debug)]
pub struct DocumentCore {
    document: Option<Document>,
    registry: NamespaceRegistry,
    document_namespaces: BTreeMap<String, String>,
    evaluator: XPathEvaluator,
    serialize_options: SerializeOptions,
}

impl Default for DocumentCore {
    fn default() -> Self {
        Self {
            document: None,
            registry: NamespaceRegistry::new(),
            document_namespaces: BTreeMap::new(),
            evaluator: XPathEvaluator::default(),
            serialize_options: SerializeOptions::default().indent(true),
        }
    }
}

impl DocumentCore {
    /// Creates a core with no document. Serialization defaults to indented
    /// output with an XML declaration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the options used by [`serialize`](Self::serialize).
    #[must_use]
    pub fn with_serialize_options(mut self, options: SerializeOptions) -> Self {
        self.serialize_options = options;
        self
    }

    /// Binds `prefix` to `uri` for queries, replacing any earlier binding.
    ///
    /// The evaluator is not rebuilt; the binding takes effect at the next
    /// load or [`rebuild_evaluator`](Self::rebuild_evaluator).
    pub fn add_namespace(&mut self, prefix: &str, uri: &str) {
        if let Some(previous) = self.registry.insert(prefix, uri) {
            if previous != uri {
                debug!(prefix, %previous, uri, "namespace prefix rebound");
            }
        } else {
            debug!(prefix, uri, "namespace prefix registered");
        }
    }

    #[must_use]
    pub fn registry(&self) -> &NamespaceRegistry {
        &self.registry
    }

    /// Namespaces declared with a prefix somewhere in the current document.
    /// When a prefix is declared more than once, the first declaration in
    /// document order is kept.
    #[must_use]
    pub fn document_namespaces(&self) -> &BTreeMap<String, String> {
        &self.document_namespaces
    }

    /// Rebuilds the evaluator from the document's own declarations overlaid
    /// with the registry. Registered prefixes win over declared ones. Calling
    /// it twice in a row yields the same bindings.
    pub fn rebuild_evaluator(&mut self) {
        self.document_namespaces = self
            .document
            .as_ref()
            .map(collect_declarations)
            .unwrap_or_default();
        let mut bindings = self.document_namespaces.clone();
        bindings.extend(
            self.registry
                .iter()
                .map(|(prefix, uri)| (prefix.to_string(), uri.to_string())),
        );
        debug!(
            declared = self.document_namespaces.len(),
            registered = self.registry.len(),
            bound = bindings.len(),
            "query evaluator rebuilt"
        );
        self.evaluator = XPathEvaluator::new(bindings);
    }

    /// The evaluator as of the last rebuild.
    #[must_use]
    pub fn evaluator(&self) -> &XPathEvaluator {
        &self.evaluator
    }

    /// Installs `document` as the current tree and rebuilds the evaluator.
    pub fn set_document(&mut self, document: Document) {
        self.document = Some(document);
        self.rebuild_evaluator();
    }

    #[must_use]
    pub fn document(&self) -> Option<&Document> {
        self.document.as_ref()
    }

    /// Mutable access for building a destination tree in place.
    ///
    /// Namespace declarations added through this handle become queryable
    /// after the next [`rebuild_evaluator`](Self::rebuild_evaluator).
    pub fn document_mut(&mut self) -> Option<&mut Document> {
        self.document.as_mut()
    }

    /// Renders the current tree as XML text.
    ///
    /// # Errors
    ///
    /// Returns [`ReaderError::Serialization`] if no document is loaded.
    pub fn serialize(&self) -> Result<String> {
        let document = self
            .document
            .as_ref()
            .ok_or_else(|| ReaderError::Serialization("no document loaded".to_string()))?;
        Ok(serialize_with_options(document, &self.serialize_options))
    }

    /// Renders the current tree and writes it to `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ReaderError::Serialization`] if no document is loaded and
    /// [`ReaderError::Io`] if the file cannot be written.
    pub fn serialize_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let xml = self.serialize()?;
        fs::write(path, xml).map_err(|source| ReaderError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "document written");
        Ok(())
    }
}

/// Collects prefixed, non-empty namespace declarations in document order,
/// keeping the first binding seen for each prefix.
fn collect_declarations(doc: &Document) -> BTreeMap<String, String> {
    let mut found = BTreeMap::new();
    for node in doc.descendants(doc.root()) {
        if !matches!(doc.node(node).kind, NodeKind::Element { .. }) {
            continue;
        }
        for decl in doc.namespace_declarations(node) {
            if let Some(prefix) = &decl.prefix {
                if !decl.uri.is_empty() {
                    found
                        .entry(prefix.clone())
                        .or_insert_with(|| decl.uri.clone());
                }
            }
        }
    }
    found
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    const UBL: &str = r#"<Invoice xmlns="urn:ubl" xmlns:cbc="urn:cbc">
  <cbc:ID>INV-1</cbc:ID>
  <Nested xmlns:cbc="urn:other" xmlns:ext="urn:ext"/>
</Invoice>"#;

    fn loaded() -> DocumentCore {
        let mut core = DocumentCore::new();
        core.set_document(Document::parse_str(UBL).unwrap());
        core
    }

    #[test]
    fn test_captures_first_declaration_per_prefix() {
        let core = loaded();
        let captured: Vec<_> = core
            .document_namespaces()
            .iter()
            .map(|(p, u)| (p.as_str(), u.as_str()))
            .collect();
        assert_eq!(captured, vec![("cbc", "urn:cbc"), ("ext", "urn:ext")]);
    }

    #[test]
    fn test_registry_overrides_declared_prefix() {
        let mut core = loaded();
        core.add_namespace("cbc", "urn:other");
        // Not visible until rebuilt.
        assert_eq!(
            core.evaluator().bindings().get("cbc").map(String::as_str),
            Some("urn:cbc")
        );
        core.rebuild_evaluator();
        assert_eq!(
            core.evaluator().bindings().get("cbc").map(String::as_str),
            Some("urn:other")
        );
    }

    #[test]
    fn test_rebuild_is_idempotent() {
        let mut core = loaded();
        core.add_namespace("ubl", "urn:ubl");
        core.rebuild_evaluator();
        let first = core.evaluator().bindings().clone();
        core.rebuild_evaluator();
        assert_eq!(&first, core.evaluator().bindings());
    }

    #[test]
    fn test_default_namespace_is_not_bound() {
        let core = loaded();
        assert!(core.evaluator().bindings().values().all(|u| u != "urn:ubl"));
    }

    #[test]
    fn test_serialize_without_document() {
        let core = DocumentCore::new();
        assert!(matches!(core.serialize(), Err(ReaderError::Serialization(_))));
        assert!(matches!(
            core.serialize_to_file("unused.xml"),
            Err(ReaderError::Serialization(_))
        ));
    }

    #[test]
    fn test_serialize_indents_by_default() {
        let mut core = DocumentCore::new();
        core.set_document(Document::parse_str("<a><b>1</b></a>").unwrap());
        assert_eq!(
            core.serialize().unwrap(),
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<a>\n  <b>1</b>\n</a>\n"
        );
        let compact = DocumentCore::new().with_serialize_options(SerializeOptions::default());
        assert!(compact.serialize().is_err());
    }

    #[test]
    fn test_serialize_to_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let core = loaded();
        let missing = dir.path().join("no-such-dir").join("out.xml");
        let err = core.serialize_to_file(&missing).unwrap_err();
        let ReaderError::Io { path, .. } = err else {
            panic!("expected io error, got {err:?}");
        };
        assert_eq!(path, missing);

        let target = dir.path().join("out.xml");
        core.serialize_to_file(&target).unwrap();
        assert_eq!(std::fs::read_to_string(target).unwrap(), core.serialize().unwrap());
    }

    #[test]
    fn test_document_mut_then_rebuild() {
        let mut core = DocumentCore::new();
        core.set_document(Document::new());
        let doc = core.document_mut().unwrap();
        let root = doc.create_element("rsm:CrossIndustryInvoice", Some("urn:rsm"));
        doc.declare_namespace(root, Some("rsm"), "urn:rsm");
        let top = doc.root();
        doc.append_child(top, root);
        assert!(core.document_namespaces().is_empty());
        core.rebuild_evaluator();
        assert_eq!(
            core.document_namespaces().get("rsm").map(String::as_str),
            Some("urn:rsm")
        );
    }
}
