//! Tokenizer for path expressions.
//!
//! Implements the lexical structure of `XPath` 1.0 section 3.7, including
//! its disambiguation rules:
//!
//! - If there is a preceding token and it is not `@`, `::`, `(`, `[`, `,` or
//!   an operator, then `*` is the multiply operator and a bare name is an
//!   operator name (`and`, `or`, `mod`, `div`).
//! - Otherwise a name followed by `(` is a function name or node type, and a
//!   name followed by `::` is an axis name.

use crate::util::qname::{is_name_char, is_name_start_char};

use super::types::XPathError;

const NODE_TYPES: &[&str] = &["comment", "text", "processing-instruction", "node"];

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    LParen,
    RParen,
    LBracket,
    RBracket,
    Dot,
    DotDot,
    At,
    Comma,
    ColonColon,
    Slash,
    DoubleSlash,
    Pipe,
    Plus,
    Minus,
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
    And,
    Or,
    Mod,
    Div,
    Multiply,
    Number(f64),
    Literal(String),
    /// `*` as a name test.
    Star,
    /// `prefix:*`
    PrefixStar(String),
    /// A name test, possibly prefixed.
    Name(String),
    FunctionName(String),
    NodeType(String),
    AxisName(String),
    /// `$name`, without the dollar sign.
    Variable(String),
}

impl Token {
    /// Whether this token leaves the lexer expecting an operand next.
    fn expects_operand(&self) -> bool {
        matches!(
            self,
            Self::At
                | Self::ColonColon
                | Self::LParen
                | Self::LBracket
                | Self::Comma
                | Self::And
                | Self::Or
                | Self::Mod
                | Self::Div
                | Self::Multiply
                | Self::Slash
                | Self::DoubleSlash
                | Self::Pipe
                | Self::Plus
                | Self::Minus
                | Self::Eq
                | Self::Neq
                | Self::Lt
                | Self::Lte
                | Self::Gt
                | Self::Gte
        )
    }
}

/// A token with the byte offset where it starts.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub position: usize,
}

pub struct Lexer<'a> {
    input: &'a str,
    pos: usize,
    tokens: Vec<Spanned>,
}

impl<'a> Lexer<'a> {
    #[must_use]
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            tokens: Vec::new(),
        }
    }

    /// Splits the whole expression into tokens.
    ///
    /// # Errors
    ///
    /// Returns [`XPathError::Syntax`] for unterminated literals and
    /// characters that cannot start a token.
    pub fn tokenize(mut self) -> Result<Vec<Spanned>, XPathError> {
        loop {
            self.skip_whitespace();
            let Some(c) = self.peek() else {
                return Ok(self.tokens);
            };
            let start = self.pos;
            let token = match c {
                '(' => self.single(Token::LParen),
                ')' => self.single(Token::RParen),
                '[' => self.single(Token::LBracket),
                ']' => self.single(Token::RBracket),
                '@' => self.single(Token::At),
                ',' => self.single(Token::Comma),
                '|' => self.single(Token::Pipe),
                '+' => self.single(Token::Plus),
                '-' => self.single(Token::Minus),
                '=' => self.single(Token::Eq),
                '/' => {
                    if self.rest().starts_with("//") {
                        self.pos += 2;
                        Token::DoubleSlash
                    } else {
                        self.single(Token::Slash)
                    }
                }
                ':' if self.rest().starts_with("::") => {
                    self.pos += 2;
                    Token::ColonColon
                }
                '!' if self.rest().starts_with("!=") => {
                    self.pos += 2;
                    Token::Neq
                }
                '<' => self.with_optional_eq(Token::Lt, Token::Lte),
                '>' => self.with_optional_eq(Token::Gt, Token::Gte),
                '.' => {
                    if self.rest().starts_with("..") {
                        self.pos += 2;
                        Token::DotDot
                    } else if self.rest()[1..].starts_with(|d: char| d.is_ascii_digit()) {
                        self.number()
                    } else {
                        self.single(Token::Dot)
                    }
                }
                '"' | '\'' => self.literal(c)?,
                '$' => {
                    self.pos += 1;
                    let name = self.qname().ok_or_else(|| {
                        XPathError::syntax("expected variable name after '$'", start)
                    })?;
                    Token::Variable(name)
                }
                '*' => {
                    self.pos += 1;
                    if self.operator_context() {
                        Token::Multiply
                    } else {
                        Token::Star
                    }
                }
                d if d.is_ascii_digit() => self.number(),
                n if is_ncname_start(n) => self.name_token(start)?,
                other => {
                    return Err(XPathError::syntax(
                        format!("unexpected character '{other}'"),
                        start,
                    ))
                }
            };
            self.tokens.push(Spanned {
                token,
                position: start,
            });
        }
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn skip_whitespace(&mut self) {
        let trimmed = self
            .rest()
            .trim_start_matches(|c| matches!(c, ' ' | '\t' | '\n' | '\r'));
        self.pos = self.input.len() - trimmed.len();
    }

    fn single(&mut self, token: Token) -> Token {
        self.pos += 1;
        token
    }

    fn with_optional_eq(&mut self, plain: Token, with_eq: Token) -> Token {
        self.pos += 1;
        if self.rest().starts_with('=') {
            self.pos += 1;
            with_eq
        } else {
            plain
        }
    }

    /// True when the previous token can end an operand.
    fn operator_context(&self) -> bool {
        self.tokens
            .last()
            .is_some_and(|prev| !prev.token.expects_operand())
    }

    fn number(&mut self) -> Token {
        let len = self
            .rest()
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(self.rest().len());
        let mut text = &self.rest()[..len];
        // Only one decimal point belongs to the number.
        if let Some(second) = text.match_indices('.').nth(1).map(|(i, _)| i) {
            text = &text[..second];
        }
        self.pos += text.len();
        Token::Number(text.parse().unwrap_or(f64::NAN))
    }

    fn literal(&mut self, quote: char) -> Result<Token, XPathError> {
        let start = self.pos;
        let body = &self.rest()[1..];
        let end = body
            .find(quote)
            .ok_or_else(|| XPathError::syntax("unterminated string literal", start))?;
        self.pos += end + 2;
        Ok(Token::Literal(body[..end].to_string()))
    }

    fn ncname(&mut self) -> Option<&'a str> {
        let rest = self.rest();
        let mut chars = rest.char_indices();
        match chars.next() {
            Some((_, c)) if is_ncname_start(c) => {}
            _ => return None,
        }
        let len = chars
            .find(|&(_, c)| !is_ncname_char(c))
            .map_or(rest.len(), |(i, _)| i);
        self.pos += len;
        Some(&rest[..len])
    }

    /// Reads `NCName` or `NCName:NCName`.
    fn qname(&mut self) -> Option<String> {
        let first = self.ncname()?;
        if self.rest().starts_with(':') && !self.rest().starts_with("::") {
            let save = self.pos;
            self.pos += 1;
            if let Some(local) = self.ncname() {
                return Some(format!("{first}:{local}"));
            }
            self.pos = save;
        }
        Some(first.to_string())
    }

    fn name_token(&mut self, start: usize) -> Result<Token, XPathError> {
        if self.operator_context() {
            let name = self.ncname().unwrap_or_default();
            return match name {
                "and" => Ok(Token::And),
                "or" => Ok(Token::Or),
                "mod" => Ok(Token::Mod),
                "div" => Ok(Token::Div),
                other => Err(XPathError::syntax(
                    format!("expected operator, found '{other}'"),
                    start,
                )),
            };
        }

        let first = self.ncname().unwrap_or_default();
        if self.rest().starts_with(":*") {
            self.pos += 2;
            return Ok(Token::PrefixStar(first.to_string()));
        }
        self.pos = start;
        let name = self.qname().unwrap_or_default();

        let after = self
            .rest()
            .trim_start_matches(|c| matches!(c, ' ' | '\t' | '\n' | '\r'));
        if after.starts_with("::") {
            Ok(Token::AxisName(name))
        } else if after.starts_with('(') {
            if NODE_TYPES.contains(&name.as_str()) {
                Ok(Token::NodeType(name))
            } else {
                Ok(Token::FunctionName(name))
            }
        } else {
            Ok(Token::Name(name))
        }
    }
}

fn is_ncname_start(c: char) -> bool {
    c != ':' && is_name_start_char(c)
}

fn is_ncname_char(c: char) -> bool {
    c != ':' && is_name_char(c)
}

/// Tokenizes an expression.
///
/// # Errors
///
/// See [`Lexer::tokenize`].
pub fn tokenize(input: &str) -> Result<Vec<Spanned>, XPathError> {
    Lexer::new(input).tokenize()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn tokens(input: &str) -> Vec<Token> {
        tokenize(input).unwrap().into_iter().map(|s| s.token).collect()
    }

    #[test]
    fn test_simple_path() {
        assert_eq!(
            tokens("//cbc:ID"),
            vec![Token::DoubleSlash, Token::Name("cbc:ID".into())]
        );
    }

    #[test]
    fn test_star_disambiguation() {
        assert_eq!(
            tokens("* * 2"),
            vec![Token::Star, Token::Multiply, Token::Number(2.0)]
        );
        assert_eq!(tokens("cac:*"), vec![Token::PrefixStar("cac".into())]);
    }

    #[test]
    fn test_operator_names() {
        assert_eq!(
            tokens("a and div"),
            vec![Token::Name("a".into()), Token::And, Token::Name("div".into())]
        );
        assert_eq!(
            tokens("6 div 2 mod 4"),
            vec![
                Token::Number(6.0),
                Token::Div,
                Token::Number(2.0),
                Token::Mod,
                Token::Number(4.0)
            ]
        );
    }

    #[test]
    fn test_function_axis_and_node_type() {
        assert_eq!(
            tokens("count(child::text())"),
            vec![
                Token::FunctionName("count".into()),
                Token::LParen,
                Token::AxisName("child".into()),
                Token::ColonColon,
                Token::NodeType("text".into()),
                Token::LParen,
                Token::RParen,
                Token::RParen
            ]
        );
    }

    #[test]
    fn test_literals_numbers_and_comparisons() {
        assert_eq!(
            tokens(r#"@currencyID != 'EUR' and .5 <= 1.25"#),
            vec![
                Token::At,
                Token::Name("currencyID".into()),
                Token::Neq,
                Token::Literal("EUR".into()),
                Token::And,
                Token::Number(0.5),
                Token::Lte,
                Token::Number(1.25)
            ]
        );
    }

    #[test]
    fn test_variables_and_dots() {
        assert_eq!(
            tokens("$line/../."),
            vec![
                Token::Variable("line".into()),
                Token::Slash,
                Token::DotDot,
                Token::Slash,
                Token::Dot
            ]
        );
    }

    #[test]
    fn test_positions() {
        let spanned = tokenize("a | b").unwrap();
        let positions: Vec<_> = spanned.iter().map(|s| s.position).collect();
        assert_eq!(positions, vec![0, 2, 4]);
    }

    #[test]
    fn test_errors() {
        assert!(tokenize("'open").is_err());
        assert!(tokenize("a # b").is_err());
        assert!(tokenize("a foo b").is_err());
        assert!(tokenize("$").is_err());
    }
}
