use crate::algebra::{
    normalize::{normalize, NormalizationError},
    BinaryOperation, Expression,
};
use log::warn;
use once_cell::sync::Lazy;
use regex::Regex;
use std::{
    error::Error,
    fmt::{self, Display, Formatter},
    str::FromStr,
};

static NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([0-9]+\.?[0-9]*|\.[0-9]+)$").unwrap());

/// How deeply brackets, function calls and negations may be nested.
pub const MAX_NESTING: usize = 256;

static IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][0-9A-Za-z_]*$").unwrap());

/// Parse an [`Expression`] tree from some human-typed text.
///
/// The text is [normalized](normalize) first, so implicit multiplication and
/// square brackets are accepted.
pub fn parse(s: &str) -> Result<Expression, ParseError> {
    let normalized = normalize(s)?;
    let tokens = tokenize(&normalized)?;
    parse_tokens(&tokens)
}

/// Is `text` shaped like a variable name?
pub fn is_identifier(text: &str) -> bool { IDENTIFIER.is_match(text) }

/// Split normalized text into [`Token`]s.
pub fn tokenize(normalized: &str) -> Result<Vec<Token<'_>>, ParseError> {
    normalized
        .split_whitespace()
        .enumerate()
        .map(|(index, text)| match TokenKind::classify(text) {
            Some(kind) => Ok(Token { text, index, kind }),
            None => Err(ParseError::InvalidToken {
                token: text.to_string(),
                index,
            }),
        })
        .collect()
}

/// Build an [`Expression`] from a sequence of tokens.
pub fn parse_tokens(tokens: &[Token<'_>]) -> Result<Expression, ParseError> {
    if tokens.is_empty() {
        return Err(ParseError::NoTerms);
    }

    let opening = count(tokens, TokenKind::OpenParen);
    let closing = count(tokens, TokenKind::CloseParen);
    if opening != closing {
        return Err(ParseError::UnbalancedBrackets { opening, closing });
    }

    if tokens.len() == 1 {
        warn!(
            "\"{}\" is a single term, this may be a trivial equation",
            tokens[0].text
        );
    }

    Parser::new(tokens).parse()
}

fn count(tokens: &[Token<'_>], kind: TokenKind) -> usize {
    tokens.iter().filter(|t| t.kind == kind).count()
}

impl FromStr for Expression {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> { parse(s) }
}

/// A simple recursive descent parser (`LL(1)`) for converting a sequence of
/// tokens into an expression tree.
///
/// The grammar:
///
/// ```text
/// expression     := term (("+" | "-") term)*
///
/// term           := power (("*" | "/") power)*
///
/// power          := factor ("^" factor)*
///
/// factor         := "(" expression ")"
///                 | IDENTIFIER "(" expression ")"
///                 | IDENTIFIER
///                 | NUMBER
///                 | "-" factor
/// ```
///
/// Every binary operator is left-associative, including `^`. Nesting deeper
/// than [`MAX_NESTING`] is rejected rather than overflowing the stack.
#[derive(Debug, Clone)]
pub(crate) struct Parser<'t> {
    tokens: &'t [Token<'t>],
    cursor: usize,
    depth: usize,
}

impl<'t> Parser<'t> {
    pub(crate) fn new(tokens: &'t [Token<'t>]) -> Self {
        Parser {
            tokens,
            cursor: 0,
            depth: 0,
        }
    }

    pub(crate) fn parse(mut self) -> Result<Expression, ParseError> {
        let expr = self.expression()?;

        match self.tokens.get(self.cursor) {
            None => Ok(expr),
            Some(token) => Err(token.unexpected(&[
                TokenKind::Plus,
                TokenKind::Minus,
                TokenKind::Times,
                TokenKind::Divide,
                TokenKind::Caret,
            ])),
        }
    }

    fn peek(&self) -> Option<TokenKind> {
        self.tokens.get(self.cursor).map(|tok| tok.kind)
    }

    fn advance(
        &mut self,
        expected: &'static [TokenKind],
    ) -> Result<&'t Token<'t>, ParseError> {
        let tokens = self.tokens;

        match tokens.get(self.cursor) {
            Some(token) => {
                self.cursor += 1;
                Ok(token)
            },
            None => Err(ParseError::UnexpectedEndOfInput { expected }),
        }
    }

    fn expect(
        &mut self,
        expected: &'static [TokenKind],
    ) -> Result<(), ParseError> {
        let token = self.advance(expected)?;

        if expected.contains(&token.kind) {
            Ok(())
        } else {
            Err(token.unexpected(expected))
        }
    }

    fn expression(&mut self) -> Result<Expression, ParseError> {
        self.binary_chain(&[TokenKind::Plus, TokenKind::Minus], Self::term)
    }

    fn term(&mut self) -> Result<Expression, ParseError> {
        self.binary_chain(&[TokenKind::Times, TokenKind::Divide], Self::power)
    }

    fn power(&mut self) -> Result<Expression, ParseError> {
        self.binary_chain(&[TokenKind::Caret], Self::factor)
    }

    fn nested<F>(
        &mut self,
        token: &Token<'_>,
        parse: F,
    ) -> Result<Expression, ParseError>
    where
        F: FnOnce(&mut Self) -> Result<Expression, ParseError>,
    {
        if self.depth >= MAX_NESTING {
            return Err(ParseError::TooDeeplyNested {
                index: token.index,
                limit: MAX_NESTING,
            });
        }

        self.depth += 1;
        let got = parse(self);
        self.depth -= 1;

        got
    }

    /// Parse `operand (operator operand)*`, folding to the left.
    fn binary_chain<F>(
        &mut self,
        operators: &[TokenKind],
        mut operand: F,
    ) -> Result<Expression, ParseError>
    where
        F: FnMut(&mut Self) -> Result<Expression, ParseError>,
    {
        let mut left = operand(self)?;

        while let Some(kind) = self.peek() {
            if !operators.contains(&kind) {
                break;
            }

            // skip past the operator and parse the second bit
            self.cursor += 1;
            let right = operand(self)?;
            left = Expression::binary(left, kind.as_binary_op(), right);
        }

        Ok(left)
    }

    fn factor(&mut self) -> Result<Expression, ParseError> {
        const EXPECTED: &[TokenKind] = &[
            TokenKind::Number,
            TokenKind::Identifier,
            TokenKind::Minus,
            TokenKind::OpenParen,
        ];

        let token = self.advance(EXPECTED)?;

        match token.kind {
            TokenKind::Number => token
                .text
                .parse()
                .map(Expression::Literal)
                .map_err(|_| ParseError::InvalidToken {
                    token: token.text.to_string(),
                    index: token.index,
                }),
            TokenKind::Minus => {
                let operand = self.nested(token, Self::factor)?;
                Ok(-operand)
            },
            TokenKind::Identifier => {
                if self.peek() == Some(TokenKind::OpenParen) {
                    self.function_call(token)
                } else {
                    Ok(Expression::reference(token.text))
                }
            },
            TokenKind::OpenParen => self.nested(token, |p| {
                let expr = p.expression()?;
                p.expect(&[TokenKind::CloseParen])?;
                Ok(expr)
            }),
            _ => Err(token.unexpected(EXPECTED)),
        }
    }

    fn function_call(
        &mut self,
        identifier: &'t Token<'t>,
    ) -> Result<Expression, ParseError> {
        self.expect(&[TokenKind::OpenParen])?;
        let argument = self.nested(identifier, Self::expression)?;
        self.expect(&[TokenKind::CloseParen])?;

        Ok(Expression::call(identifier.text, argument))
    }
}

/// Possible errors that may occur while parsing.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseError {
    Normalization(NormalizationError),
    NoTerms,
    UnbalancedBrackets {
        opening: usize,
        closing: usize,
    },
    InvalidToken {
        token: String,
        index: usize,
    },
    UnexpectedEndOfInput {
        expected: &'static [TokenKind],
    },
    UnexpectedToken {
        found: String,
        index: usize,
        expected: &'static [TokenKind],
    },
    TooDeeplyNested {
        index: usize,
        limit: usize,
    },
}

impl From<NormalizationError> for ParseError {
    fn from(e: NormalizationError) -> Self { ParseError::Normalization(e) }
}

impl Display for ParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::Normalization(inner) => Display::fmt(inner, f),
            ParseError::NoTerms => write!(f, "No terms"),
            ParseError::UnbalancedBrackets { opening, closing } => write!(
                f,
                "Unbalanced brackets: {} opening but {} closing",
                opening, closing
            ),
            ParseError::InvalidToken { token, index } => {
                write!(f, "Unrecognized token \"{}\" at {}", token, index)
            },
            ParseError::UnexpectedEndOfInput { expected } => write!(
                f,
                "Unexpected end of input, expected {}",
                one_of(expected)
            ),
            ParseError::UnexpectedToken {
                found,
                index,
                expected,
            } => write!(
                f,
                "Found \"{}\" at {} but expected {}",
                found,
                index,
                one_of(expected)
            ),
            ParseError::TooDeeplyNested { index, limit } => write!(
                f,
                "Nesting at {} goes deeper than {} levels",
                index, limit
            ),
        }
    }
}

fn one_of(kinds: &[TokenKind]) -> String {
    let names: Vec<_> = kinds.iter().map(ToString::to_string).collect();
    names.join(" or ")
}

impl Error for ParseError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ParseError::Normalization(inner) => Some(inner),
            _ => None,
        }
    }
}

/// A single whitespace-separated atom of a normalized equation.
#[derive(Debug, Clone, PartialEq)]
pub struct Token<'a> {
    pub text: &'a str,
    /// The token's position in the sequence.
    pub index: usize,
    pub kind: TokenKind,
}

impl<'a> Token<'a> {
    fn unexpected(&self, expected: &'static [TokenKind]) -> ParseError {
        ParseError::UnexpectedToken {
            found: self.text.to_string(),
            index: self.index,
            expected,
        }
    }
}

/// The kinds of token that can appear in an [`Expression`]'s text form.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum TokenKind {
    Identifier,
    Number,
    OpenParen,
    CloseParen,
    Plus,
    Minus,
    Times,
    Divide,
    Caret,
}

impl TokenKind {
    fn classify(text: &str) -> Option<TokenKind> {
        let kind = match text {
            "(" => TokenKind::OpenParen,
            ")" => TokenKind::CloseParen,
            "+" => TokenKind::Plus,
            "-" => TokenKind::Minus,
            "*" => TokenKind::Times,
            "/" => TokenKind::Divide,
            "^" => TokenKind::Caret,
            _ if NUMBER.is_match(text) => TokenKind::Number,
            _ if is_identifier(text) => TokenKind::Identifier,
            _ => return None,
        };

        Some(kind)
    }

    fn as_binary_op(self) -> BinaryOperation {
        match self {
            TokenKind::Plus => BinaryOperation::Plus,
            TokenKind::Minus => BinaryOperation::Minus,
            TokenKind::Times => BinaryOperation::Times,
            TokenKind::Divide => BinaryOperation::Divide,
            TokenKind::Caret => BinaryOperation::Power,
            other => unreachable!("{:?} is not a binary op", other),
        }
    }
}

impl Display for TokenKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Identifier => write!(f, "an identifier"),
            TokenKind::Number => write!(f, "a number"),
            TokenKind::OpenParen => write!(f, "\"(\""),
            TokenKind::CloseParen => write!(f, "\")\""),
            TokenKind::Plus => write!(f, "\"+\""),
            TokenKind::Minus => write!(f, "\"-\""),
            TokenKind::Times => write!(f, "\"*\""),
            TokenKind::Divide => write!(f, "\"/\""),
            TokenKind::Caret => write!(f, "\"^\""),
        }
    }
}

#[cfg(test)]
mod tokenizer_tests {
    use super::*;

    macro_rules! tokenize_test {
        ($name:ident, $src:expr, $should_be:expr) => {
            #[test]
            fn $name() {
                let tokens = tokenize($src).unwrap();

                assert_eq!(tokens.len(), 1, "{:?}", tokens);
                assert_eq!(tokens[0].text, $src);
                assert_eq!(tokens[0].kind, $should_be);
            }
        };
    }

    tokenize_test!(open_paren, "(", TokenKind::OpenParen);
    tokenize_test!(close_paren, ")", TokenKind::CloseParen);
    tokenize_test!(plus, "+", TokenKind::Plus);
    tokenize_test!(minus, "-", TokenKind::Minus);
    tokenize_test!(times, "*", TokenKind::Times);
    tokenize_test!(divide, "/", TokenKind::Divide);
    tokenize_test!(caret, "^", TokenKind::Caret);
    tokenize_test!(single_digit_integer, "3", TokenKind::Number);
    tokenize_test!(multi_digit_integer, "31", TokenKind::Number);
    tokenize_test!(number_with_trailing_dot, "31.", TokenKind::Number);
    tokenize_test!(simple_decimal, "3.14", TokenKind::Number);
    tokenize_test!(leading_dot, ".5", TokenKind::Number);
    tokenize_test!(simple_identifier, "x", TokenKind::Identifier);
    tokenize_test!(longer_identifier, "hello", TokenKind::Identifier);
    tokenize_test!(
        identifiers_can_have_underscores,
        "hello_world",
        TokenKind::Identifier
    );
    tokenize_test!(
        identifiers_can_contain_numbers,
        "var5",
        TokenKind::Identifier
    );

    #[test]
    fn tokens_know_their_position() {
        let tokens = tokenize("8 * x").unwrap();

        let indices: Vec<_> = tokens.iter().map(|t| t.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[test]
    fn unrecognized_token_shapes() {
        let inputs =
            vec![("1 + $", "$", 2), ("2pie", "2pie", 0), ("1..2", "1..2", 0)];

        for (src, token, index) in inputs {
            let got = tokenize(src).unwrap_err();

            assert_eq!(
                got,
                ParseError::InvalidToken {
                    token: token.to_string(),
                    index
                }
            );
        }
    }
}
