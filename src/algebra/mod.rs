//! The text-to-tree half of the system.

mod expr;
pub mod normalize;
mod parse;

pub use expr::{BinaryOperation, Expression};
pub use normalize::{normalize, NormalizationError};
pub use parse::{
    is_identifier, parse, parse_tokens, tokenize, ParseError, Token, TokenKind,
    MAX_NESTING,
};
