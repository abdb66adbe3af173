//! Recursive descent parser for path expressions.
//!
//! Follows the `XPath` 1.0 grammar productions [1] to [39], expanding the
//! abbreviated syntax (`//`, `.`, `..`, `@`) into full steps as it goes.

use super::ast::{Axis, BinaryOp, Expr, NodeTest, Step};
use super::lexer::{tokenize, Spanned, Token};
use super::types::XPathError;

/// Maximum nesting of parenthesized expressions, predicates, function
/// arguments, unary minus and operator chains. Each level costs several
/// parser frames and, after parsing, an evaluator frame.
pub const MAX_NESTING: usize = 128;

pub struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    /// Byte length of the source, reported for errors at end of input.
    end: usize,
    depth: usize,
}

impl Parser {
    /// Tokenizes `input` and prepares to parse it.
    ///
    /// # Errors
    ///
    /// Returns any lexical error.
    pub fn new(input: &str) -> Result<Self, XPathError> {
        Ok(Self {
            tokens: tokenize(input)?,
            pos: 0,
            end: input.len(),
            depth: 0,
        })
    }

    /// Parses a complete expression, rejecting trailing tokens.
    ///
    /// # Errors
    ///
    /// Returns [`XPathError::Syntax`] with the byte offset of the offending
    /// token.
    pub fn parse(mut self) -> Result<Expr, XPathError> {
        if self.tokens.is_empty() {
            return Err(XPathError::syntax("empty expression", 0));
        }
        let expr = self.parse_or()?;
        if let Some(extra) = self.tokens.get(self.pos) {
            return Err(XPathError::syntax(
                format!("unexpected {:?}", extra.token),
                extra.position,
            ));
        }
        Ok(expr)
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|s| &s.token)
    }

    fn position(&self) -> usize {
        self.tokens.get(self.pos).map_or(self.end, |s| s.position)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|s| s.token.clone());
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: &Token, what: &str) -> Result<(), XPathError> {
        if self.eat(expected) {
            Ok(())
        } else {
            Err(XPathError::syntax(format!("expected {what}"), self.position()))
        }
    }

    fn enter(&mut self) -> Result<(), XPathError> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            return Err(XPathError::syntax(
                format!("expression nested too deeply (max {MAX_NESTING})"),
                self.position(),
            ));
        }
        Ok(())
    }

    fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    fn parse_or(&mut self) -> Result<Expr, XPathError> {
        let mut left = self.parse_and()?;
        let mark = self.depth;
        while self.eat(&Token::Or) {
            self.enter()?;
            let right = self.parse_and()?;
            left = Self::binary(BinaryOp::Or, left, right);
        }
        self.depth = mark;
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, XPathError> {
        let mut left = self.parse_equality()?;
        let mark = self.depth;
        while self.eat(&Token::And) {
            self.enter()?;
            let right = self.parse_equality()?;
            left = Self::binary(BinaryOp::And, left, right);
        }
        self.depth = mark;
        Ok(left)
    }

    fn parse_equality(&mut self) -> Result<Expr, XPathError> {
        let mut left = self.parse_relational()?;
        let mark = self.depth;
        loop {
            let op = match self.peek() {
                Some(Token::Eq) => BinaryOp::Eq,
                Some(Token::Neq) => BinaryOp::Neq,
                _ => {
                    self.depth = mark;
                    return Ok(left);
                }
            };
            self.pos += 1;
            self.enter()?;
            let right = self.parse_relational()?;
            left = Self::binary(op, left, right);
        }
    }

    fn parse_relational(&mut self) -> Result<Expr, XPathError> {
        let mut left = self.parse_additive()?;
        let mark = self.depth;
        loop {
            let op = match self.peek() {
                Some(Token::Lt) => BinaryOp::Lt,
                Some(Token::Lte) => BinaryOp::Lte,
                Some(Token::Gt) => BinaryOp::Gt,
                Some(Token::Gte) => BinaryOp::Gte,
                _ => {
                    self.depth = mark;
                    return Ok(left);
                }
            };
            self.pos += 1;
            self.enter()?;
            let right = self.parse_additive()?;
            left = Self::binary(op, left, right);
        }
    }

    fn parse_additive(&mut self) -> Result<Expr, XPathError> {
        let mut left = self.parse_multiplicative()?;
        let mark = self.depth;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => {
                    self.depth = mark;
                    return Ok(left);
                }
            };
            self.pos += 1;
            self.enter()?;
            let right = self.parse_multiplicative()?;
            left = Self::binary(op, left, right);
        }
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, XPathError> {
        let mut left = self.parse_unary()?;
        let mark = self.depth;
        loop {
            let op = match self.peek() {
                Some(Token::Multiply) => BinaryOp::Mul,
                Some(Token::Div) => BinaryOp::Div,
                Some(Token::Mod) => BinaryOp::Mod,
                _ => {
                    self.depth = mark;
                    return Ok(left);
                }
            };
            self.pos += 1;
            self.enter()?;
            let right = self.parse_unary()?;
            left = Self::binary(op, left, right);
        }
    }

    fn parse_unary(&mut self) -> Result<Expr, XPathError> {
        if self.eat(&Token::Minus) {
            self.enter()?;
            let operand = self.parse_unary()?;
            self.depth -= 1;
            return Ok(Expr::Negate(Box::new(operand)));
        }
        self.parse_union()
    }

    fn parse_union(&mut self) -> Result<Expr, XPathError> {
        let mut left = self.parse_path()?;
        let mark = self.depth;
        while self.eat(&Token::Pipe) {
            self.enter()?;
            let right = self.parse_path()?;
            left = Expr::Union(Box::new(left), Box::new(right));
        }
        self.depth = mark;
        Ok(left)
    }

    fn starts_step(token: Option<&Token>) -> bool {
        matches!(
            token,
            Some(
                Token::Dot
                    | Token::DotDot
                    | Token::At
                    | Token::Star
                    | Token::PrefixStar(_)
                    | Token::Name(_)
                    | Token::NodeType(_)
                    | Token::AxisName(_)
            )
        )
    }

    fn parse_path(&mut self) -> Result<Expr, XPathError> {
        match self.peek() {
            Some(Token::Slash) => {
                self.pos += 1;
                let steps = if Self::starts_step(self.peek()) {
                    self.parse_relative_steps()?
                } else {
                    Vec::new()
                };
                Ok(Expr::Path {
                    absolute: true,
                    steps,
                })
            }
            Some(Token::DoubleSlash) => {
                self.pos += 1;
                let mut steps = vec![Step::descendant_or_self()];
                steps.extend(self.parse_relative_steps()?);
                Ok(Expr::Path {
                    absolute: true,
                    steps,
                })
            }
            token if Self::starts_step(token) => Ok(Expr::Path {
                absolute: false,
                steps: self.parse_relative_steps()?,
            }),
            _ => self.parse_filter_path(),
        }
    }

    /// `FilterExpr ('/' | '//') RelativeLocationPath`, or just `FilterExpr`.
    fn parse_filter_path(&mut self) -> Result<Expr, XPathError> {
        let primary = self.parse_primary()?;
        let mut predicates = Vec::new();
        while self.peek() == Some(&Token::LBracket) {
            predicates.push(self.parse_predicate()?);
        }
        let base = if predicates.is_empty() {
            primary
        } else {
            Expr::Filter {
                base: Box::new(primary),
                predicates,
            }
        };

        let mut steps = Vec::new();
        if self.eat(&Token::DoubleSlash) {
            steps.push(Step::descendant_or_self());
        } else if !self.eat(&Token::Slash) {
            return Ok(base);
        }
        steps.extend(self.parse_relative_steps()?);
        Ok(Expr::PathFrom {
            base: Box::new(base),
            steps,
        })
    }

    fn parse_relative_steps(&mut self) -> Result<Vec<Step>, XPathError> {
        let mut steps = vec![self.parse_step()?];
        loop {
            if self.eat(&Token::Slash) {
                steps.push(self.parse_step()?);
            } else if self.eat(&Token::DoubleSlash) {
                steps.push(Step::descendant_or_self());
                steps.push(self.parse_step()?);
            } else {
                return Ok(steps);
            }
        }
    }

    fn parse_step(&mut self) -> Result<Step, XPathError> {
        if self.eat(&Token::Dot) {
            return Ok(Step {
                axis: Axis::SelfAxis,
                test: NodeTest::Node,
                predicates: Vec::new(),
            });
        }
        if self.eat(&Token::DotDot) {
            return Ok(Step {
                axis: Axis::Parent,
                test: NodeTest::Node,
                predicates: Vec::new(),
            });
        }

        let axis = match self.peek() {
            Some(Token::At) => {
                self.pos += 1;
                Axis::Attribute
            }
            Some(Token::AxisName(name)) => {
                let position = self.position();
                let axis = Axis::from_name(name).ok_or_else(|| {
                    XPathError::syntax(format!("unknown axis '{name}'"), position)
                })?;
                self.pos += 1;
                self.expect(&Token::ColonColon, "'::'")?;
                axis
            }
            _ => Axis::Child,
        };

        let test = self.parse_node_test()?;
        let mut predicates = Vec::new();
        while self.peek() == Some(&Token::LBracket) {
            predicates.push(self.parse_predicate()?);
        }
        Ok(Step {
            axis,
            test,
            predicates,
        })
    }

    fn parse_node_test(&mut self) -> Result<NodeTest, XPathError> {
        let position = self.position();
        match self.advance() {
            Some(Token::Star) => Ok(NodeTest::Wildcard),
            Some(Token::PrefixStar(prefix)) => Ok(NodeTest::NamespaceWildcard(prefix)),
            Some(Token::Name(name)) => Ok(match name.split_once(':') {
                Some((prefix, local)) => NodeTest::Name {
                    prefix: Some(prefix.to_string()),
                    local: local.to_string(),
                },
                None => NodeTest::Name {
                    prefix: None,
                    local: name,
                },
            }),
            Some(Token::NodeType(kind)) => {
                self.expect(&Token::LParen, "'('")?;
                let test = match kind.as_str() {
                    "node" => NodeTest::Node,
                    "text" => NodeTest::Text,
                    "comment" => NodeTest::Comment,
                    _ => match self.peek() {
                        Some(Token::Literal(target)) => {
                            let target = target.clone();
                            self.pos += 1;
                            NodeTest::ProcessingInstruction(Some(target))
                        }
                        _ => NodeTest::ProcessingInstruction(None),
                    },
                };
                self.expect(&Token::RParen, "')'")?;
                Ok(test)
            }
            _ => Err(XPathError::syntax("expected node test", position)),
        }
    }

    fn parse_predicate(&mut self) -> Result<Expr, XPathError> {
        self.expect(&Token::LBracket, "'['")?;
        self.enter()?;
        let expr = self.parse_or()?;
        self.depth -= 1;
        self.expect(&Token::RBracket, "']'")?;
        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<Expr, XPathError> {
        let position = self.position();
        match self.advance() {
            Some(Token::Number(n)) => Ok(Expr::Number(n)),
            Some(Token::Literal(s)) => Ok(Expr::Literal(s)),
            Some(Token::Variable(name)) => Ok(Expr::Variable(name)),
            Some(Token::LParen) => {
                self.enter()?;
                let expr = self.parse_or()?;
                self.depth -= 1;
                self.expect(&Token::RParen, "')'")?;
                Ok(expr)
            }
            Some(Token::FunctionName(name)) => {
                self.expect(&Token::LParen, "'('")?;
                let mut args = Vec::new();
                if !self.eat(&Token::RParen) {
                    self.enter()?;
                    loop {
                        args.push(self.parse_or()?);
                        if self.eat(&Token::RParen) {
                            break;
                        }
                        self.expect(&Token::Comma, "',' or ')'")?;
                    }
                    self.depth -= 1;
                }
                Ok(Expr::FunctionCall { name, args })
            }
            Some(other) => Err(XPathError::syntax(
                format!("unexpected {other:?}"),
                position,
            )),
            None => Err(XPathError::syntax("unexpected end of expression", position)),
        }
    }
}

/// Parses an expression string into an AST.
///
/// # Errors
///
/// Returns [`XPathError::Syntax`] for malformed expressions.
pub fn parse(input: &str) -> Result<Expr, XPathError> {
    Parser::new(input)?.parse()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn name(prefix: Option<&str>, local: &str) -> NodeTest {
        NodeTest::Name {
            prefix: prefix.map(str::to_string),
            local: local.to_string(),
        }
    }

    #[test]
    fn test_absolute_prefixed_path() {
        let expr = parse("/ubl:Invoice/cbc:ID").unwrap();
        let Expr::Path { absolute, steps } = expr else {
            panic!("expected path");
        };
        assert!(absolute);
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].test, name(Some("ubl"), "Invoice"));
        assert_eq!(steps[1].axis, Axis::Child);
    }

    #[test]
    fn test_abbreviations_expand() {
        let Expr::Path { absolute, steps } = parse("//a/../@b").unwrap() else {
            panic!("expected path");
        };
        assert!(absolute);
        let axes: Vec<_> = steps.iter().map(|s| s.axis).collect();
        assert_eq!(
            axes,
            vec![Axis::DescendantOrSelf, Axis::Child, Axis::Parent, Axis::Attribute]
        );
    }

    #[test]
    fn test_root_only() {
        assert_eq!(
            parse("/").unwrap(),
            Expr::Path {
                absolute: true,
                steps: vec![]
            }
        );
    }

    #[test]
    fn test_precedence() {
        let Expr::Binary { op, right, .. } = parse("1 or 2 and 3").unwrap() else {
            panic!("expected binary");
        };
        assert_eq!(op, BinaryOp::Or);
        assert!(matches!(*right, Expr::Binary { op: BinaryOp::And, .. }));

        let Expr::Binary { op, left, .. } = parse("1 + 2 * 3 = 7").unwrap() else {
            panic!("expected binary");
        };
        assert_eq!(op, BinaryOp::Eq);
        assert!(matches!(*left, Expr::Binary { op: BinaryOp::Add, .. }));
    }

    #[test]
    fn test_predicates_and_functions() {
        let Expr::Path { steps, .. } = parse("cac:Line[position() = last()][@id]").unwrap()
        else {
            panic!("expected path");
        };
        assert_eq!(steps[0].predicates.len(), 2);
        assert!(matches!(
            &steps[0].predicates[0],
            Expr::Binary { op: BinaryOp::Eq, .. }
        ));
    }

    #[test]
    fn test_filter_expressions() {
        assert!(matches!(
            parse("(//a)[1]").unwrap(),
            Expr::Filter { .. }
        ));
        let Expr::PathFrom { steps, .. } = parse("$x//b").unwrap() else {
            panic!("expected path from variable");
        };
        assert_eq!(steps[0], Step::descendant_or_self());
    }

    #[test]
    fn test_node_type_tests() {
        let Expr::Path { steps, .. } =
            parse("node()/text()/comment()/processing-instruction('pi')").unwrap()
        else {
            panic!("expected path");
        };
        let tests: Vec<_> = steps.into_iter().map(|s| s.test).collect();
        assert_eq!(
            tests,
            vec![
                NodeTest::Node,
                NodeTest::Text,
                NodeTest::Comment,
                NodeTest::ProcessingInstruction(Some("pi".into()))
            ]
        );
    }

    #[test]
    fn test_union_and_negation() {
        assert!(matches!(parse("a | b").unwrap(), Expr::Union(..)));
        assert!(matches!(parse("--1").unwrap(), Expr::Negate(_)));
    }

    #[test]
    fn test_syntax_errors() {
        for bad in ["", "/a[", "a/", "count(1,", "foo::a", "a b", ")"] {
            assert!(parse(bad).is_err(), "{bad:?} should fail");
        }
        let Err(XPathError::Syntax { position, .. }) = parse("a[1") else {
            panic!("expected syntax error");
        };
        assert_eq!(position, 3);
    }

    #[test]
    fn test_nesting_limit() {
        let nested = |n: usize| format!("{}1{}", "(".repeat(n), ")".repeat(n));
        assert!(parse(&nested(MAX_NESTING)).is_ok());
        let Err(XPathError::Syntax { message, position }) = parse(&nested(MAX_NESTING + 1)) else {
            panic!("expected syntax error");
        };
        assert!(message.contains("nested too deeply"), "{message}");
        assert_eq!(position, MAX_NESTING + 1);
        assert!(parse(&nested(200_000)).is_err());
    }

    #[test]
    fn test_chains_count_toward_nesting() {
        assert!(parse(&vec!["1"; MAX_NESTING + 1].join(" + ")).is_ok());
        assert!(parse(&vec!["1"; MAX_NESTING + 2].join(" + ")).is_err());
        assert!(parse(&format!("{}1", "-".repeat(MAX_NESTING + 1))).is_err());
        assert!(parse(&vec!["a"; 10_000].join(" | ")).is_err());
        let predicates = format!("a{}", "[b".repeat(MAX_NESTING + 1) + &"]".repeat(MAX_NESTING + 1));
        assert!(parse(&predicates).is_err());
    }
}
