//! Namespace-aware evaluation of path expressions.
//!
//! An [`XPathEvaluator`] carries the prefix bindings used to resolve
//! prefixed name tests, plus any variable bindings. It is immutable once
//! built; rebinding a prefix means building a new evaluator.
//!
//! Each step is applied per context node: the axis is walked in its own
//! direction, the node test filters it, and predicates see proximity
//! positions counted along that direction. Step results are merged back
//! into document order.

use std::collections::{BTreeMap, HashMap};

use tracing::trace;

use super::ast::{Axis, BinaryOp, Expr, NodeTest, Step};
use super::parser;
use super::types::{parse_number, XPathError, XPathValue};
use crate::parser::XML_NAMESPACE;
use crate::tree::{Document, NodeId, NodeKind};

/// Evaluates path expressions under a fixed set of namespace bindings.
///
/// # Examples
///
/// ```
/// use std::collections::BTreeMap;
/// use xmlbridge::Document;
/// use xmlbridge::xpath::XPathEvaluator;
///
/// let doc = Document::parse_str(r#"<i:Invoice xmlns:i="urn:inv"><i:ID>7</i:ID></i:Invoice>"#)
///     .unwrap();
/// let bindings = BTreeMap::from([("inv".to_string(), "urn:inv".to_string())]);
/// let evaluator = XPathEvaluator::new(bindings);
/// let ids = evaluator.select(&doc, doc.root(), "/inv:Invoice/inv:ID").unwrap();
/// assert_eq!(doc.node_value(ids[0]).as_deref(), Some("7"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct XPathEvaluator {
    bindings: BTreeMap<String, String>,
    variables: HashMap<String, XPathValue>,
}

impl XPathEvaluator {
    /// Creates an evaluator that resolves prefixes through `bindings`.
    ///
    /// The `xml` prefix is always bound and need not be listed.
    #[must_use]
    pub fn new(bindings: BTreeMap<String, String>) -> Self {
        Self {
            bindings,
            variables: HashMap::new(),
        }
    }

    /// Binds `$name` for subsequent evaluations.
    #[must_use]
    pub fn with_variable(mut self, name: impl Into<String>, value: XPathValue) -> Self {
        self.variables.insert(name.into(), value);
        self
    }

    /// The prefix bindings this evaluator resolves against.
    #[must_use]
    pub fn bindings(&self) -> &BTreeMap<String, String> {
        &self.bindings
    }

    /// Parses and evaluates `expression` with `context` as the context node.
    ///
    /// # Errors
    ///
    /// Returns [`XPathError`] on syntax errors, unbound prefixes, unknown
    /// functions or variables, and type errors.
    pub fn evaluate(
        &self,
        doc: &Document,
        context: NodeId,
        expression: &str,
    ) -> Result<XPathValue, XPathError> {
        let expr = parser::parse(expression)?;
        self.evaluate_expr(doc, context, &expr)
    }

    /// Evaluates an already parsed expression.
    ///
    /// # Errors
    ///
    /// See [`XPathEvaluator::evaluate`].
    pub fn evaluate_expr(
        &self,
        doc: &Document,
        context: NodeId,
        expr: &Expr,
    ) -> Result<XPathValue, XPathError> {
        let eval = Eval {
            doc,
            bindings: &self.bindings,
            variables: &self.variables,
        };
        eval.expr(
            expr,
            Focus {
                node: context,
                position: 1,
                size: 1,
            },
        )
    }

    /// Evaluates `expression` and requires a node-set result.
    ///
    /// # Errors
    ///
    /// As [`XPathEvaluator::evaluate`], plus [`XPathError::Type`] if the
    /// result is not a node-set.
    pub fn select(
        &self,
        doc: &Document,
        context: NodeId,
        expression: &str,
    ) -> Result<Vec<NodeId>, XPathError> {
        self.evaluate(doc, context, expression)?.into_node_set()
    }
}

/// The context node with its proximity position and context size.
#[derive(Debug, Clone, Copy)]
struct Focus {
    node: NodeId,
    position: usize,
    size: usize,
}

/// A node test with its prefix already resolved.
enum Test<'t> {
    Name {
        namespace: Option<&'t str>,
        local: &'t str,
    },
    Wildcard,
    NamespaceWildcard(&'t str),
    Node,
    Text,
    Comment,
    ProcessingInstruction(Option<&'t str>),
}

struct Eval<'a> {
    doc: &'a Document,
    bindings: &'a BTreeMap<String, String>,
    variables: &'a HashMap<String, XPathValue>,
}

impl<'a> Eval<'a> {
    fn expr(&self, expr: &Expr, focus: Focus) -> Result<XPathValue, XPathError> {
        match expr {
            Expr::Number(n) => Ok(XPathValue::Number(*n)),
            Expr::Literal(s) => Ok(XPathValue::String(s.clone())),
            Expr::Variable(name) => self
                .variables
                .get(name)
                .cloned()
                .ok_or_else(|| XPathError::UnknownVariable(name.clone())),
            Expr::Binary { op, left, right } => self.binary(*op, left, right, focus),
            Expr::Negate(inner) => {
                let n = self.expr(inner, focus)?.to_number(self.doc);
                Ok(XPathValue::Number(-n))
            }
            Expr::FunctionCall { name, args } => self.function(name, args, focus),
            Expr::Path { absolute, steps } => {
                let start = if *absolute {
                    self.doc.root()
                } else {
                    focus.node
                };
                self.steps(vec![start], steps).map(XPathValue::NodeSet)
            }
            Expr::Filter { base, predicates } => {
                let mut nodes = self.node_set(base, focus)?;
                for predicate in predicates {
                    nodes = self.filter(nodes, predicate)?;
                }
                Ok(XPathValue::NodeSet(nodes))
            }
            Expr::PathFrom { base, steps } => {
                let nodes = self.node_set(base, focus)?;
                self.steps(nodes, steps).map(XPathValue::NodeSet)
            }
            Expr::Union(left, right) => {
                let mut nodes = self.node_set(left, focus)?;
                nodes.extend(self.node_set(right, focus)?);
                self.doc.sort_in_document_order(&mut nodes);
                Ok(XPathValue::NodeSet(nodes))
            }
        }
    }

    fn node_set(&self, expr: &Expr, focus: Focus) -> Result<Vec<NodeId>, XPathError> {
        self.expr(expr, focus)?.into_node_set()
    }

    fn binary(
        &self,
        op: BinaryOp,
        left: &Expr,
        right: &Expr,
        focus: Focus,
    ) -> Result<XPathValue, XPathError> {
        match op {
            BinaryOp::Or => {
                let value = self.expr(left, focus)?.to_boolean()
                    || self.expr(right, focus)?.to_boolean();
                Ok(XPathValue::Boolean(value))
            }
            BinaryOp::And => {
                let value = self.expr(left, focus)?.to_boolean()
                    && self.expr(right, focus)?.to_boolean();
                Ok(XPathValue::Boolean(value))
            }
            BinaryOp::Eq
            | BinaryOp::Neq
            | BinaryOp::Lt
            | BinaryOp::Lte
            | BinaryOp::Gt
            | BinaryOp::Gte => {
                let lhs = self.expr(left, focus)?;
                let rhs = self.expr(right, focus)?;
                Ok(XPathValue::Boolean(self.compare(op, &lhs, &rhs)))
            }
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => {
                let a = self.expr(left, focus)?.to_number(self.doc);
                let b = self.expr(right, focus)?.to_number(self.doc);
                Ok(XPathValue::Number(match op {
                    BinaryOp::Add => a + b,
                    BinaryOp::Sub => a - b,
                    BinaryOp::Mul => a * b,
                    BinaryOp::Div => a / b,
                    _ => a % b,
                }))
            }
        }
    }

    /// Comparison per `XPath` 1.0 section 3.4. Node-sets compare
    /// existentially through the string-values of their members.
    fn compare(&self, op: BinaryOp, lhs: &XPathValue, rhs: &XPathValue) -> bool {
        match (lhs, rhs) {
            (XPathValue::NodeSet(nodes), XPathValue::Boolean(_)) => {
                self.compare_scalar(op, &XPathValue::Boolean(!nodes.is_empty()), rhs)
            }
            (XPathValue::Boolean(_), XPathValue::NodeSet(nodes)) => {
                self.compare_scalar(op, lhs, &XPathValue::Boolean(!nodes.is_empty()))
            }
            (XPathValue::NodeSet(left), XPathValue::NodeSet(right)) => {
                let right: Vec<_> = right.iter().map(|&n| self.string_of(n)).collect();
                left.iter().any(|&l| {
                    let l = self.string_of(l);
                    right.iter().any(|r| self.compare_scalar(op, &l, r))
                })
            }
            (XPathValue::NodeSet(nodes), other) => nodes
                .iter()
                .any(|&n| self.compare_scalar(op, &self.string_of(n), other)),
            (other, XPathValue::NodeSet(nodes)) => nodes
                .iter()
                .any(|&n| self.compare_scalar(op, other, &self.string_of(n))),
            _ => self.compare_scalar(op, lhs, rhs),
        }
    }

    #[allow(clippy::float_cmp)]
    fn compare_scalar(&self, op: BinaryOp, lhs: &XPathValue, rhs: &XPathValue) -> bool {
        let doc = self.doc;
        match op {
            BinaryOp::Eq | BinaryOp::Neq => {
                let equal = match (lhs, rhs) {
                    (XPathValue::Boolean(_), _) | (_, XPathValue::Boolean(_)) => {
                        lhs.to_boolean() == rhs.to_boolean()
                    }
                    (XPathValue::Number(_), _) | (_, XPathValue::Number(_)) => {
                        lhs.to_number(doc) == rhs.to_number(doc)
                    }
                    _ => lhs.to_xpath_string(doc) == rhs.to_xpath_string(doc),
                };
                // NaN is unequal to everything, itself included.
                if op == BinaryOp::Eq {
                    equal
                } else {
                    !equal
                }
            }
            _ => {
                let (a, b) = (lhs.to_number(doc), rhs.to_number(doc));
                match op {
                    BinaryOp::Lt => a < b,
                    BinaryOp::Lte => a <= b,
                    BinaryOp::Gt => a > b,
                    _ => a >= b,
                }
            }
        }
    }

    fn string_of(&self, node: NodeId) -> XPathValue {
        XPathValue::String(self.doc.string_value(node))
    }

    // --- Location steps ---

    fn steps(&self, mut nodes: Vec<NodeId>, steps: &[Step]) -> Result<Vec<NodeId>, XPathError> {
        for step in steps {
            let test = self.resolve_test(&step.test)?;
            let mut next = Vec::new();
            for &context in &nodes {
                let mut selected: Vec<NodeId> = self
                    .axis(context, step.axis)
                    .into_iter()
                    .filter(|&n| self.matches(n, &test, step.axis))
                    .collect();
                for predicate in &step.predicates {
                    selected = self.filter(selected, predicate)?;
                }
                next.extend(selected);
            }
            self.doc.sort_in_document_order(&mut next);
            nodes = next;
        }
        Ok(nodes)
    }

    /// Keeps the nodes for which `predicate` holds. A numeric predicate
    /// selects by proximity position.
    #[allow(clippy::float_cmp)]
    fn filter(&self, nodes: Vec<NodeId>, predicate: &Expr) -> Result<Vec<NodeId>, XPathError> {
        let size = nodes.len();
        let mut kept = Vec::with_capacity(size);
        for (index, node) in nodes.into_iter().enumerate() {
            let focus = Focus {
                node,
                position: index + 1,
                size,
            };
            let keep = match self.expr(predicate, focus)? {
                XPathValue::Number(n) => n == to_f64(focus.position),
                other => other.to_boolean(),
            };
            if keep {
                kept.push(node);
            }
        }
        Ok(kept)
    }

    fn resolve_test<'t>(&self, test: &'t NodeTest) -> Result<Test<'t>, XPathError>
    where
        'a: 't,
    {
        Ok(match test {
            NodeTest::Name { prefix, local } => Test::Name {
                namespace: match prefix {
                    Some(p) => Some(self.resolve_prefix(p)?),
                    None => None,
                },
                local,
            },
            NodeTest::Wildcard => Test::Wildcard,
            NodeTest::NamespaceWildcard(p) => Test::NamespaceWildcard(self.resolve_prefix(p)?),
            NodeTest::Node => Test::Node,
            NodeTest::Text => Test::Text,
            NodeTest::Comment => Test::Comment,
            NodeTest::ProcessingInstruction(target) => {
                Test::ProcessingInstruction(target.as_deref())
            }
        })
    }

    fn resolve_prefix(&self, prefix: &str) -> Result<&'a str, XPathError> {
        if prefix == "xml" {
            return Ok(XML_NAMESPACE);
        }
        self.bindings.get(prefix).map(String::as_str).ok_or_else(|| {
            trace!(prefix, "unbound prefix in name test");
            XPathError::UnboundPrefix(prefix.to_string())
        })
    }

    fn matches(&self, node: NodeId, test: &Test<'_>, axis: Axis) -> bool {
        let kind = &self.doc.node(node).kind;
        let principal = if axis == Axis::Attribute {
            kind.is_attribute()
        } else {
            kind.is_element()
        };
        match test {
            Test::Name { namespace, local } => {
                principal
                    && self.doc.node_name(node) == Some(*local)
                    && self.doc.node_namespace(node) == *namespace
            }
            Test::Wildcard => principal,
            Test::NamespaceWildcard(uri) => {
                principal && self.doc.node_namespace(node) == Some(*uri)
            }
            Test::Node => !matches!(kind, NodeKind::DocumentType { .. }),
            Test::Text => matches!(kind, NodeKind::Text { .. } | NodeKind::CData { .. }),
            Test::Comment => matches!(kind, NodeKind::Comment { .. }),
            Test::ProcessingInstruction(target) => match kind {
                NodeKind::ProcessingInstruction { target: t, .. } => {
                    target.map_or(true, |wanted| wanted == t)
                }
                _ => false,
            },
        }
    }

    /// Nodes along `axis` from `node`, in axis order (reverse axes nearest
    /// first).
    fn axis(&self, node: NodeId, axis: Axis) -> Vec<NodeId> {
        let doc = self.doc;
        let is_attribute = doc.node(node).kind.is_attribute();
        match axis {
            Axis::SelfAxis => vec![node],
            Axis::Child => doc.children(node).collect(),
            Axis::Descendant => doc.descendants(node).collect(),
            Axis::DescendantOrSelf => std::iter::once(node).chain(doc.descendants(node)).collect(),
            Axis::Parent => doc.parent(node).into_iter().collect(),
            Axis::Ancestor => doc.ancestors(node).skip(1).collect(),
            Axis::AncestorOrSelf => doc.ancestors(node).collect(),
            Axis::Attribute => doc.attributes(node).to_vec(),
            Axis::Namespace => Vec::new(),
            Axis::FollowingSibling if is_attribute => Vec::new(),
            Axis::PrecedingSibling if is_attribute => Vec::new(),
            Axis::FollowingSibling => {
                std::iter::successors(doc.next_sibling(node), |&n| doc.next_sibling(n)).collect()
            }
            Axis::PrecedingSibling => {
                std::iter::successors(doc.prev_sibling(node), |&n| doc.prev_sibling(n)).collect()
            }
            Axis::Following => self.following(node),
            Axis::Preceding => self.preceding(node),
        }
    }

    fn following(&self, node: NodeId) -> Vec<NodeId> {
        let doc = self.doc;
        let mut out = Vec::new();
        let start = if doc.node(node).kind.is_attribute() {
            // An attribute precedes its element's content.
            let Some(owner) = doc.parent(node) else {
                return out;
            };
            out.extend(doc.descendants(owner));
            owner
        } else {
            node
        };
        for ancestor in doc.ancestors(start) {
            let mut sibling = doc.next_sibling(ancestor);
            while let Some(s) = sibling {
                out.push(s);
                out.extend(doc.descendants(s));
                sibling = doc.next_sibling(s);
            }
        }
        out
    }

    fn preceding(&self, node: NodeId) -> Vec<NodeId> {
        let doc = self.doc;
        let start = if doc.node(node).kind.is_attribute() {
            match doc.parent(node) {
                Some(owner) => owner,
                None => return Vec::new(),
            }
        } else {
            node
        };
        let mut out = Vec::new();
        for ancestor in doc.ancestors(start) {
            let mut sibling = doc.prev_sibling(ancestor);
            while let Some(s) = sibling {
                let subtree: Vec<_> = doc.descendants(s).collect();
                out.extend(subtree.into_iter().rev());
                out.push(s);
                sibling = doc.prev_sibling(s);
            }
        }
        out
    }

    // --- Function library ---

    fn function(&self, name: &str, args: &[Expr], focus: Focus) -> Result<XPathValue, XPathError> {
        let doc = self.doc;
        let arity = |min: usize, max: usize, expected: &'static str| {
            if (min..=max).contains(&args.len()) {
                Ok(())
            } else {
                Err(XPathError::ArgumentCount {
                    name: name.to_string(),
                    expected,
                    found: args.len(),
                })
            }
        };
        let string_arg = |i: usize| -> Result<String, XPathError> {
            Ok(self.expr(&args[i], focus)?.to_xpath_string(doc))
        };
        let number_arg =
            |i: usize| -> Result<f64, XPathError> { Ok(self.expr(&args[i], focus)?.to_number(doc)) };
        // String of the first argument, or of the context node when omitted.
        let string_or_context = || -> Result<String, XPathError> {
            if args.is_empty() {
                Ok(doc.string_value(focus.node))
            } else {
                string_arg(0)
            }
        };
        // First node of the argument set, or the context node when omitted.
        let node_or_context = || -> Result<Option<NodeId>, XPathError> {
            if args.is_empty() {
                Ok(Some(focus.node))
            } else {
                Ok(self.node_set(&args[0], focus)?.first().copied())
            }
        };

        let value = match name {
            "last" => {
                arity(0, 0, "0")?;
                XPathValue::Number(to_f64(focus.size))
            }
            "position" => {
                arity(0, 0, "0")?;
                XPathValue::Number(to_f64(focus.position))
            }
            "count" => {
                arity(1, 1, "1")?;
                XPathValue::Number(to_f64(self.node_set(&args[0], focus)?.len()))
            }
            "id" => {
                arity(1, 1, "1")?;
                let ids = match self.expr(&args[0], focus)? {
                    XPathValue::NodeSet(nodes) => nodes
                        .iter()
                        .map(|&n| doc.string_value(n))
                        .collect::<Vec<_>>()
                        .join(" "),
                    other => other.to_xpath_string(doc),
                };
                XPathValue::NodeSet(self.elements_by_id(&ids))
            }
            "local-name" => {
                arity(0, 1, "0 or 1")?;
                let name = node_or_context()?
                    .filter(|&n| !matches!(doc.node(n).kind, NodeKind::Document))
                    .and_then(|n| doc.node_name(n))
                    .unwrap_or_default();
                XPathValue::String(name.to_string())
            }
            "namespace-uri" => {
                arity(0, 1, "0 or 1")?;
                let uri = node_or_context()?
                    .and_then(|n| doc.node_namespace(n))
                    .unwrap_or_default();
                XPathValue::String(uri.to_string())
            }
            "name" => {
                arity(0, 1, "0 or 1")?;
                let name = node_or_context()?
                    .and_then(|n| doc.qualified_name(n))
                    .unwrap_or_default();
                XPathValue::String(name)
            }
            "string" => {
                arity(0, 1, "0 or 1")?;
                XPathValue::String(string_or_context()?)
            }
            "concat" => {
                if args.len() < 2 {
                    return Err(XPathError::ArgumentCount {
                        name: name.to_string(),
                        expected: "2 or more",
                        found: args.len(),
                    });
                }
                let mut out = String::new();
                for i in 0..args.len() {
                    out.push_str(&string_arg(i)?);
                }
                XPathValue::String(out)
            }
            "starts-with" => {
                arity(2, 2, "2")?;
                XPathValue::Boolean(string_arg(0)?.starts_with(&string_arg(1)?))
            }
            "contains" => {
                arity(2, 2, "2")?;
                XPathValue::Boolean(string_arg(0)?.contains(&string_arg(1)?))
            }
            "substring-before" => {
                arity(2, 2, "2")?;
                let (s, sep) = (string_arg(0)?, string_arg(1)?);
                let before = s.split_once(&sep).map(|(b, _)| b).unwrap_or_default();
                XPathValue::String(before.to_string())
            }
            "substring-after" => {
                arity(2, 2, "2")?;
                let (s, sep) = (string_arg(0)?, string_arg(1)?);
                let after = s.split_once(&sep).map(|(_, a)| a).unwrap_or_default();
                XPathValue::String(after.to_string())
            }
            "substring" => {
                arity(2, 3, "2 or 3")?;
                let s = string_arg(0)?;
                let start = xpath_round(number_arg(1)?);
                let end = if args.len() == 3 {
                    start + xpath_round(number_arg(2)?)
                } else {
                    f64::INFINITY
                };
                let out: String = s
                    .chars()
                    .enumerate()
                    .filter(|&(i, _)| {
                        let p = to_f64(i + 1);
                        p >= start && p < end
                    })
                    .map(|(_, c)| c)
                    .collect();
                XPathValue::String(out)
            }
            "string-length" => {
                arity(0, 1, "0 or 1")?;
                XPathValue::Number(to_f64(string_or_context()?.chars().count()))
            }
            "normalize-space" => {
                arity(0, 1, "0 or 1")?;
                let s = string_or_context()?;
                let words: Vec<_> = s
                    .split(|c| matches!(c, ' ' | '\t' | '\n' | '\r'))
                    .filter(|w| !w.is_empty())
                    .collect();
                XPathValue::String(words.join(" "))
            }
            "translate" => {
                arity(3, 3, "3")?;
                let (s, from, to) = (string_arg(0)?, string_arg(1)?, string_arg(2)?);
                let from: Vec<char> = from.chars().collect();
                let to: Vec<char> = to.chars().collect();
                let out: String = s
                    .chars()
                    .filter_map(|c| match from.iter().position(|&f| f == c) {
                        Some(i) => to.get(i).copied(),
                        None => Some(c),
                    })
                    .collect();
                XPathValue::String(out)
            }
            "boolean" => {
                arity(1, 1, "1")?;
                XPathValue::Boolean(self.expr(&args[0], focus)?.to_boolean())
            }
            "not" => {
                arity(1, 1, "1")?;
                XPathValue::Boolean(!self.expr(&args[0], focus)?.to_boolean())
            }
            "true" => {
                arity(0, 0, "0")?;
                XPathValue::Boolean(true)
            }
            "false" => {
                arity(0, 0, "0")?;
                XPathValue::Boolean(false)
            }
            "lang" => {
                arity(1, 1, "1")?;
                let wanted = string_arg(0)?.to_ascii_lowercase();
                let lang = doc.ancestors(focus.node).find_map(|n| self.xml_lang(n));
                XPathValue::Boolean(lang.is_some_and(|l| {
                    let l = l.to_ascii_lowercase();
                    l == wanted
                        || l.strip_prefix(&wanted).is_some_and(|rest| rest.starts_with('-'))
                }))
            }
            "number" => {
                arity(0, 1, "0 or 1")?;
                if args.is_empty() {
                    XPathValue::Number(parse_number(&doc.string_value(focus.node)))
                } else {
                    XPathValue::Number(number_arg(0)?)
                }
            }
            "sum" => {
                arity(1, 1, "1")?;
                let total = self
                    .node_set(&args[0], focus)?
                    .iter()
                    .map(|&n| parse_number(&doc.string_value(n)))
                    .sum();
                XPathValue::Number(total)
            }
            "floor" => {
                arity(1, 1, "1")?;
                XPathValue::Number(number_arg(0)?.floor())
            }
            "ceiling" => {
                arity(1, 1, "1")?;
                XPathValue::Number(number_arg(0)?.ceil())
            }
            "round" => {
                arity(1, 1, "1")?;
                XPathValue::Number(xpath_round(number_arg(0)?))
            }
            _ => return Err(XPathError::UnknownFunction(name.to_string())),
        };
        Ok(value)
    }

    /// Elements carrying an `xml:id` equal to one of the whitespace
    /// separated tokens in `ids`.
    fn elements_by_id(&self, ids: &str) -> Vec<NodeId> {
        let wanted: Vec<&str> = ids.split_ascii_whitespace().collect();
        if wanted.is_empty() {
            return Vec::new();
        }
        let doc = self.doc;
        doc.descendants(doc.root())
            .filter(|&n| {
                doc.attributes(n).iter().any(|&a| {
                    doc.node_namespace(a) == Some(XML_NAMESPACE)
                        && doc.node_name(a) == Some("id")
                        && doc.node_text(a).is_some_and(|v| wanted.contains(&v))
                })
            })
            .collect()
    }

    fn xml_lang(&self, node: NodeId) -> Option<&'a str> {
        let doc = self.doc;
        doc.attributes(node).iter().find_map(|&a| {
            (doc.node_namespace(a) == Some(XML_NAMESPACE) && doc.node_name(a) == Some("lang"))
                .then(|| doc.node_text(a))
                .flatten()
        })
    }
}

/// `round()` per `XPath`: halves round towards positive infinity, and
/// negative values that round to zero keep their sign.
fn xpath_round(n: f64) -> f64 {
    if n.is_nan() || n.is_infinite() {
        n
    } else if (-0.5..0.0).contains(&n) {
        -0.0
    } else {
        (n + 0.5).floor()
    }
}

#[allow(clippy::cast_precision_loss)]
fn to_f64(n: usize) -> f64 {
    n as f64
}

/// Evaluates `expression` with no namespace bindings.
///
/// # Errors
///
/// See [`XPathEvaluator::evaluate`].
pub fn evaluate(
    doc: &Document,
    context: NodeId,
    expression: &str,
) -> Result<XPathValue, XPathError> {
    XPathEvaluator::default().evaluate(doc, context, expression)
}

/// Selects nodes with no namespace bindings.
///
/// # Errors
///
/// See [`XPathEvaluator::select`].
pub fn select(
    doc: &Document,
    context: NodeId,
    expression: &str,
) -> Result<Vec<NodeId>, XPathError> {
    XPathEvaluator::default().select(doc, context, expression)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;

    const INVOICE: &str = r#"<?xml version="1.0"?>
<Invoice xmlns="urn:ubl:Invoice" xmlns:cbc="urn:cbc" xmlns:cac="urn:cac">
  <cbc:ID>INV-1</cbc:ID>
  <cbc:Note xml:lang="en-GB">first</cbc:Note>
  <cbc:Note>second</cbc:Note>
  <cac:InvoiceLine>
    <cbc:ID>1</cbc:ID>
    <cbc:LineExtensionAmount currencyID="EUR">10.50</cbc:LineExtensionAmount>
  </cac:InvoiceLine>
  <cac:InvoiceLine>
    <cbc:ID>2</cbc:ID>
    <cbc:LineExtensionAmount currencyID="EUR">4.50</cbc:LineExtensionAmount>
  </cac:InvoiceLine>
  <!-- trailing -->
</Invoice>"#;

    fn evaluator() -> XPathEvaluator {
        XPathEvaluator::new(BTreeMap::from([
            ("ubl".to_string(), "urn:ubl:Invoice".to_string()),
            ("cbc".to_string(), "urn:cbc".to_string()),
            ("cac".to_string(), "urn:cac".to_string()),
        ]))
    }

    fn eval(expr: &str) -> XPathValue {
        let doc = Document::parse_str(INVOICE).unwrap();
        evaluator().evaluate(&doc, doc.root(), expr).unwrap()
    }

    fn strings(expr: &str) -> Vec<String> {
        let doc = Document::parse_str(INVOICE).unwrap();
        evaluator()
            .select(&doc, doc.root(), expr)
            .unwrap()
            .into_iter()
            .map(|n| doc.string_value(n))
            .collect()
    }

    fn number(expr: &str) -> f64 {
        match eval(expr) {
            XPathValue::Number(n) => n,
            other => panic!("expected number, got {other:?}"),
        }
    }

    fn string(expr: &str) -> String {
        match eval(expr) {
            XPathValue::String(s) => s,
            other => panic!("expected string, got {other:?}"),
        }
    }

    fn boolean(expr: &str) -> bool {
        match eval(expr) {
            XPathValue::Boolean(b) => b,
            other => panic!("expected boolean, got {other:?}"),
        }
    }

    #[test]
    fn test_prefixed_paths() {
        assert_eq!(strings("/ubl:Invoice/cbc:ID"), vec!["INV-1"]);
        assert_eq!(strings("//cac:InvoiceLine/cbc:ID"), vec!["1", "2"]);
        assert_eq!(strings("//cbc:LineExtensionAmount/@currencyID"), vec!["EUR", "EUR"]);
    }

    #[test]
    fn test_unprefixed_name_means_no_namespace() {
        assert!(strings("/Invoice").is_empty());
        assert!(strings("//ID").is_empty());
    }

    #[test]
    fn test_unbound_prefix_is_an_error() {
        let doc = Document::parse_str(INVOICE).unwrap();
        let err = evaluator().evaluate(&doc, doc.root(), "//ram:ID").unwrap_err();
        assert_eq!(err, XPathError::UnboundPrefix("ram".into()));
        let err = evaluate(&doc, doc.root(), "//cbc:*").unwrap_err();
        assert_eq!(err, XPathError::UnboundPrefix("cbc".into()));
    }

    #[test]
    fn test_positional_predicates() {
        assert_eq!(strings("//cac:InvoiceLine[2]/cbc:ID"), vec!["2"]);
        assert_eq!(strings("//cac:InvoiceLine[last()]/cbc:ID"), vec!["2"]);
        assert_eq!(strings("(//cbc:ID)[position() > 1]"), vec!["1", "2"]);
        // Per context node: each line's first cbc child.
        assert_eq!(strings("//cac:InvoiceLine/cbc:*[1]"), vec!["1", "2"]);
    }

    #[test]
    fn test_reverse_axis_positions() {
        assert_eq!(
            strings("//cac:InvoiceLine[2]/preceding-sibling::*[1]"),
            vec!["\n    1\n    10.50\n  "]
        );
        assert_eq!(
            strings("//cac:InvoiceLine[1]/cbc:ID/ancestor::*[1]/cbc:ID"),
            vec!["1"]
        );
    }

    #[test]
    fn test_following_and_preceding() {
        assert_eq!(number("count(//cbc:Note[1]/following::cbc:ID)"), 2.0);
        assert_eq!(number("count(//cac:InvoiceLine[2]/preceding::cbc:ID)"), 2.0);
        assert_eq!(number("count(//cac:InvoiceLine[1]/cbc:ID/following-sibling::node())"), 3.0);
    }

    #[test]
    fn test_attribute_axis_excludes_namespace_declarations() {
        assert_eq!(number("count(/ubl:Invoice/@*)"), 0.0);
        assert_eq!(number("count(/ubl:Invoice/namespace::*)"), 0.0);
    }

    #[test]
    fn test_node_type_tests() {
        assert_eq!(number("count(/ubl:Invoice/comment())"), 1.0);
        assert_eq!(string("normalize-space(//cbc:ID[1]/text())"), "INV-1");
    }

    #[test]
    fn test_comparisons() {
        assert!(boolean("//cbc:ID = 'INV-1'"));
        assert!(boolean("//cbc:ID = 2"));
        assert!(!boolean("//cbc:ID = 'inv-1'"));
        assert!(boolean("//cbc:ID != 'INV-1'"));
        assert!(boolean("//cbc:LineExtensionAmount > 10"));
        assert!(!boolean("//cbc:Missing = //cbc:Missing"));
        assert!(boolean("//cbc:Missing = false()"));
        assert!(boolean("1 < 2 and 'a' = 'a'"));
        assert!(!boolean("number('x') = number('x')"));
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(number("sum(//cbc:LineExtensionAmount)"), 15.0);
        assert_eq!(number("7 mod 3"), 1.0);
        assert_eq!(number("-7 mod 3"), -1.0);
        assert_eq!(number("1 div 0"), f64::INFINITY);
        assert_eq!(number("2 * 3 - -1"), 7.0);
    }

    #[test]
    fn test_string_functions() {
        assert_eq!(string("concat('a', 'b', 1)"), "ab1");
        assert_eq!(string("substring('12345', 1.5, 2.6)"), "234");
        assert_eq!(string("substring('12345', 0, 3)"), "12");
        assert_eq!(string("substring-before('2024-01-31', '-')"), "2024");
        assert_eq!(string("substring-after('2024-01-31', '-')"), "01-31");
        assert_eq!(string("translate('2024-01-31', '-', '')"), "20240131");
        assert_eq!(string("normalize-space('  a \n b ')"), "a b");
        assert_eq!(number("string-length('héllo')"), 5.0);
        assert!(boolean("starts-with('INV-1', 'INV')"));
        assert!(boolean("contains('INV-1', '-')"));
    }

    #[test]
    fn test_name_functions() {
        assert_eq!(string("local-name(//cac:InvoiceLine)"), "InvoiceLine");
        assert_eq!(string("name(//cac:InvoiceLine)"), "cac:InvoiceLine");
        assert_eq!(string("namespace-uri(/*)"), "urn:ubl:Invoice");
        assert_eq!(string("local-name(//cbc:Missing)"), "");
    }

    #[test]
    fn test_number_functions() {
        assert_eq!(number("floor(2.7)"), 2.0);
        assert_eq!(number("ceiling(2.1)"), 3.0);
        assert_eq!(number("round(2.5)"), 3.0);
        assert_eq!(number("round(-2.5)"), -2.0);
        assert!(number("round(-0.2)").is_sign_negative());
    }

    #[test]
    fn test_lang_and_id() {
        let doc = Document::parse_str(INVOICE).unwrap();
        let notes = evaluator().select(&doc, doc.root(), "//cbc:Note").unwrap();
        let lang = evaluator().evaluate(&doc, notes[0], "lang('en')").unwrap();
        assert_eq!(lang, XPathValue::Boolean(true));
        let lang = evaluator().evaluate(&doc, notes[1], "lang('en')").unwrap();
        assert_eq!(lang, XPathValue::Boolean(false));

        let doc = Document::parse_str(r#"<a><b xml:id="x"/><c xml:id="y"/></a>"#).unwrap();
        assert_eq!(select(&doc, doc.root(), "id('y x')").unwrap().len(), 2);
    }

    #[test]
    fn test_variables() {
        let doc = Document::parse_str(INVOICE).unwrap();
        let eval = evaluator().with_variable("min", XPathValue::Number(5.0));
        let big = eval
            .select(&doc, doc.root(), "//cbc:LineExtensionAmount[. > $min]")
            .unwrap();
        assert_eq!(big.len(), 1);
        assert_eq!(
            evaluator().evaluate(&doc, doc.root(), "$nope").unwrap_err(),
            XPathError::UnknownVariable("nope".into())
        );
    }

    #[test]
    fn test_union_is_in_document_order() {
        assert_eq!(
            strings("//cac:InvoiceLine[2]/cbc:ID | /ubl:Invoice/cbc:ID"),
            vec!["INV-1", "2"]
        );
        let doc = Document::parse_str(INVOICE).unwrap();
        assert!(matches!(
            evaluator().evaluate(&doc, doc.root(), "1 | //cbc:ID"),
            Err(XPathError::Type(_))
        ));
    }

    #[test]
    fn test_function_errors() {
        let doc = Document::parse_str(INVOICE).unwrap();
        assert!(matches!(
            evaluate(&doc, doc.root(), "frobnicate()"),
            Err(XPathError::UnknownFunction(_))
        ));
        assert!(matches!(
            evaluate(&doc, doc.root(), "count()"),
            Err(XPathError::ArgumentCount { .. })
        ));
        assert!(matches!(
            evaluate(&doc, doc.root(), "concat('a')"),
            Err(XPathError::ArgumentCount { .. })
        ));
    }

    #[test]
    fn test_select_rejects_scalars() {
        let doc = Document::parse_str(INVOICE).unwrap();
        assert!(select(&doc, doc.root(), "count(//*)").is_err());
        assert_eq!(
            evaluate(&doc, doc.root(), "string(count(//*))").unwrap(),
            XPathValue::String("10".into())
        );
    }

    #[test]
    fn test_relative_to_context_node() {
        let doc = Document::parse_str(INVOICE).unwrap();
        let lines = evaluator().select(&doc, doc.root(), "//cac:InvoiceLine").unwrap();
        let ids = evaluator().select(&doc, lines[1], "cbc:ID").unwrap();
        assert_eq!(doc.node_value(ids[0]).as_deref(), Some("2"));
        let up = evaluator().select(&doc, ids[0], "../../cbc:ID").unwrap();
        assert_eq!(doc.node_value(up[0]).as_deref(), Some("INV-1"));
    }
}
