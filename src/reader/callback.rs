//! Optional callbacks with flexible arity.
//!
//! Dispatch sites in [`DocumentReader`](super::DocumentReader) offer one of
//! three argument bundles: nothing, a matched node with its parent, or a
//! matched node with the index and text of the expression that matched.
//! A [`Callback`] takes a prefix of what is offered and ignores the rest.

use std::fmt;

use tracing::trace;

use crate::error::{BoxError, ReaderError, Result};
use crate::tree::NodeId;

/// What a callback closure returns.
pub type CallbackResult = std::result::Result<(), BoxError>;

type NoArgsFn<'a> = Box<dyn FnOnce() -> CallbackResult + 'a>;
type NodeFn<'a> = Box<dyn FnOnce(NodeId) -> CallbackResult + 'a>;
type NodeAndParentFn<'a> = Box<dyn FnOnce(NodeId, Option<NodeId>) -> CallbackResult + 'a>;
type IndexedFn<'a> = Box<dyn FnOnce(NodeId, usize, &str) -> CallbackResult + 'a>;

/// A callback of one of the supported shapes.
///
/// # Examples
///
/// ```
/// use xmlbridge::Callback;
///
/// let mut seen = None;
/// let callback = Callback::node(|node| {
///     seen = Some(node);
///     Ok(())
/// });
/// # drop(callback);
/// ```
pub enum Callback<'a> {
    /// Takes no arguments.
    NoArgs(NoArgsFn<'a>),
    /// Takes the matched node.
    Node(NodeFn<'a>),
    /// Takes the matched node and its parent.
    NodeAndParent(NodeAndParentFn<'a>),
    /// Takes the matched node, the index of the expression that matched and
    /// the expression itself.
    Indexed(IndexedFn<'a>),
}

impl<'a> Callback<'a> {
    pub fn no_args(f: impl FnOnce() -> CallbackResult + 'a) -> Self {
        Self::NoArgs(Box::new(f))
    }

    pub fn node(f: impl FnOnce(NodeId) -> CallbackResult + 'a) -> Self {
        Self::Node(Box::new(f))
    }

    pub fn node_and_parent(f: impl FnOnce(NodeId, Option<NodeId>) -> CallbackResult + 'a) -> Self {
        Self::NodeAndParent(Box::new(f))
    }

    pub fn indexed(f: impl FnOnce(NodeId, usize, &str) -> CallbackResult + 'a) -> Self {
        Self::Indexed(Box::new(f))
    }

    fn shape(&self) -> &'static str {
        match self {
            Self::NoArgs(_) => "no arguments",
            Self::Node(_) => "a node",
            Self::NodeAndParent(_) => "a node and its parent",
            Self::Indexed(_) => "a node, an index and an expression",
        }
    }
}

impl fmt::Debug for Callback<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Callback").field(&self.shape()).finish()
    }
}

/// The arguments a dispatch site offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackArgs<'s> {
    None,
    Matched {
        node: NodeId,
        parent: Option<NodeId>,
    },
    Indexed {
        node: NodeId,
        index: usize,
        expression: &'s str,
    },
}

impl CallbackArgs<'_> {
    fn shape(&self) -> &'static str {
        match self {
            Self::None => "no arguments",
            Self::Matched { .. } => "a node and its parent",
            Self::Indexed { .. } => "a node, an index and an expression",
        }
    }
}

/// Calls optional callbacks with whatever part of the offered arguments
/// they accept.
#[derive(Debug, Clone, Copy, Default)]
pub struct CallbackInvoker;

impl CallbackInvoker {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Invokes `callback` with `args`. An absent callback does nothing.
    ///
    /// # Errors
    ///
    /// Returns [`ReaderError::CallbackArguments`] if the callback needs an
    /// argument the site does not offer, and [`ReaderError::Callback`]
    /// wrapping whatever error the callback itself returned.
    pub fn fire(&self, callback: Option<Callback<'_>>, args: CallbackArgs<'_>) -> Result<()> {
        let Some(callback) = callback else {
            return Ok(());
        };
        trace!(callback = callback.shape(), offered = args.shape(), "firing callback");
        let outcome = match (callback, args) {
            (Callback::NoArgs(f), _) => f(),
            (
                Callback::Node(f),
                CallbackArgs::Matched { node, .. } | CallbackArgs::Indexed { node, .. },
            ) => f(node),
            (Callback::NodeAndParent(f), CallbackArgs::Matched { node, parent }) => f(node, parent),
            (
                Callback::Indexed(f),
                CallbackArgs::Indexed {
                    node,
                    index,
                    expression,
                },
            ) => f(node, index, expression),
            (callback, args) => {
                return Err(ReaderError::CallbackArguments {
                    expected: callback.shape(),
                    supplied: args.shape(),
                })
            }
        };
        outcome.map_err(ReaderError::Callback)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::tree::Document;

    fn two_nodes() -> (NodeId, NodeId) {
        let doc = Document::parse_str("<a><b/></a>").unwrap();
        let a = doc.root_element().unwrap();
        (doc.first_child(a).unwrap(), a)
    }

    #[test]
    fn test_absent_callback_is_noop() {
        let invoker = CallbackInvoker::new();
        assert!(invoker.fire(None, CallbackArgs::None).is_ok());
        let (node, parent) = two_nodes();
        assert!(invoker
            .fire(
                None,
                CallbackArgs::Matched {
                    node,
                    parent: Some(parent)
                }
            )
            .is_ok());
    }

    #[test]
    fn test_trailing_arguments_are_dropped() {
        let (node, parent) = two_nodes();
        let invoker = CallbackInvoker::new();
        let calls = Cell::new(0);

        let args = CallbackArgs::Matched {
            node,
            parent: Some(parent),
        };
        invoker
            .fire(
                Some(Callback::no_args(|| {
                    calls.set(calls.get() + 1);
                    Ok(())
                })),
                args,
            )
            .unwrap();
        invoker
            .fire(
                Some(Callback::node(|n| {
                    assert_eq!(n, node);
                    calls.set(calls.get() + 1);
                    Ok(())
                })),
                args,
            )
            .unwrap();
        invoker
            .fire(
                Some(Callback::node_and_parent(|n, p| {
                    assert_eq!((n, p), (node, Some(parent)));
                    calls.set(calls.get() + 1);
                    Ok(())
                })),
                args,
            )
            .unwrap();
        invoker
            .fire(
                Some(Callback::node(|n| {
                    assert_eq!(n, node);
                    calls.set(calls.get() + 1);
                    Ok(())
                })),
                CallbackArgs::Indexed {
                    node,
                    index: 1,
                    expression: "//b",
                },
            )
            .unwrap();
        assert_eq!(calls.get(), 4);
    }

    #[test]
    fn test_indexed_receives_everything() {
        let (node, _) = two_nodes();
        let mut got = None;
        CallbackInvoker::new()
            .fire(
                Some(Callback::indexed(|n, i, e| {
                    got = Some((n, i, e.to_string()));
                    Ok(())
                })),
                CallbackArgs::Indexed {
                    node,
                    index: 2,
                    expression: "cbc:Note",
                },
            )
            .unwrap();
        assert_eq!(got, Some((node, 2, "cbc:Note".to_string())));
    }

    #[test]
    fn test_missing_arguments_are_rejected() {
        let (node, parent) = two_nodes();
        let invoker = CallbackInvoker::new();
        let err = invoker
            .fire(Some(Callback::node(|_| Ok(()))), CallbackArgs::None)
            .unwrap_err();
        assert!(matches!(
            err,
            ReaderError::CallbackArguments {
                expected: "a node",
                supplied: "no arguments"
            }
        ));
        let err = invoker
            .fire(
                Some(Callback::indexed(|_, _, _| Ok(()))),
                CallbackArgs::Matched {
                    node,
                    parent: Some(parent),
                },
            )
            .unwrap_err();
        assert!(matches!(err, ReaderError::CallbackArguments { .. }));
    }

    #[test]
    fn test_callback_error_propagates() {
        let err = CallbackInvoker::new()
            .fire(
                Some(Callback::no_args(|| Err("no seller".into()))),
                CallbackArgs::None,
            )
            .unwrap_err();
        assert_eq!(
            err.callback_error().map(ToString::to_string).as_deref(),
            Some("no seller")
        );
    }
}
