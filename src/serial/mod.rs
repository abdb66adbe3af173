//! XML serialization.
//!
//! Writes a `Document` tree back out as XML text with proper escaping, an
//! optional declaration, and optional indentation of element-only content.

pub mod xml;

pub use xml::{serialize, serialize_node, serialize_with_options, SerializeOptions};
