//! `XPath` 1.0 query language.
//!
//! Expressions are tokenized, parsed into an [`ast::Expr`] and evaluated by
//! an [`XPathEvaluator`] against a [`Document`](crate::tree::Document).
//! Name tests are namespace-aware: a prefixed name matches by namespace URI
//! through the evaluator's bindings, and an unprefixed name matches only
//! names in no namespace.
//!
//! # Quick Start
//!
//! ```
//! use xmlbridge::Document;
//! use xmlbridge::xpath::{evaluate, XPathValue};
//!
//! let doc = Document::parse_str("<root><a>1</a><b>2</b></root>").unwrap();
//! let root = doc.root_element().unwrap();
//! let result = evaluate(&doc, root, "count(*)").unwrap();
//! assert_eq!(result, XPathValue::Number(2.0));
//! ```
//!
//! # Known Limitations
//!
//! - The `namespace::` axis is always empty. Namespace declarations are kept
//!   on their elements and are not materialized as nodes.

pub mod ast;
pub mod eval;
pub mod lexer;
pub mod parser;
pub mod types;

pub use eval::{evaluate, select, XPathEvaluator};
pub use types::{XPathError, XPathValue};
