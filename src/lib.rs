//! # xmlbridge
//!
//! The query and dispatch core of a UBL / CII e-invoice converter. It loads
//! an XML document, evaluates namespace-aware `XPath` 1.0 queries against it,
//! and drives the conditional callbacks that field-mapping code uses to
//! build the other dialect's tree.
//!
//! Underneath sit a strict XML 1.0 + Namespaces parser, an arena
//! [`Document`] tree, an `XPath` evaluator and a serializer.
//!
//! ## Quick Start
//!
//! ```
//! use xmlbridge::DocumentReader;
//!
//! let mut reader = DocumentReader::new();
//! reader.add_namespace("cbc", "urn:oasis:names:specification:ubl:schema:xsd:CommonBasicComponents-2");
//! reader
//!     .load_from_xml_string(
//!         r#"<Invoice xmlns:cbc="urn:oasis:names:specification:ubl:schema:xsd:CommonBasicComponents-2">
//!              <cbc:ID>INV-1</cbc:ID>
//!              <cbc:Note></cbc:Note>
//!            </Invoice>"#,
//!     )
//!     .unwrap();
//!
//! assert_eq!(reader.query_value("//cbc:ID", None).as_deref(), Some("INV-1"));
//! // Present but empty counts as absent.
//! assert!(!reader.exists("//cbc:Note", None));
//! ```

pub mod document;
pub mod encoding;
pub mod error;
pub mod parser;
pub mod reader;
pub mod serial;
pub mod tree;
pub mod util;
pub mod xpath;

// Re-export primary types at the crate root for convenience.
pub use document::{DocumentCore, NamespaceRegistry};
pub use error::{QueryFailure, ReaderError};
pub use reader::{Callback, CallbackArgs, CallbackInvoker, Candidates, DocumentReader, NodeList};
pub use tree::{Attribute, Document, NodeId};
