//! Small helpers shared by the parser and the path evaluator.

pub mod qname;
