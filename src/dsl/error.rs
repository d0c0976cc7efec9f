//! Construction-time errors of the filter DSL.
//!
//! All of these describe a broken query string. Data-side problems found
//! while evaluating (unparsable numbers, missing keys) are never errors.

use thiserror::Error;

/// The tokenizer hit a character it does not understand.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unexpected character {character:?} at offset {offset}")]
pub struct LexError {
    pub character: char,
    pub offset: usize,
}

/// The token stream does not follow the grammar.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("syntax error at offset {position}: expected {expected}, found {found}")]
pub struct SyntaxError {
    pub position: usize,
    pub expected: String,
    pub found: String,
}

impl SyntaxError {
    pub fn new(position: usize, expected: impl Into<String>, found: impl Into<String>) -> Self {
        Self {
            position,
            expected: expected.into(),
            found: found.into(),
        }
    }
}

/// A literal in the query could not be normalized.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    #[error("invalid regex pattern '{pattern}': {reason}")]
    InvalidRegex { pattern: String, reason: String },
    #[error("invalid number '{literal}'")]
    InvalidNumber { literal: String },
    #[error("unknown unit '{unit}' in '{literal}'")]
    UnknownUnit { literal: String, unit: String },
    #[error("invalid date '{literal}'")]
    InvalidDate { literal: String },
    #[error("invalid relative date '{literal}': {reason}")]
    InvalidRelativeDate { literal: String, reason: String },
}

impl CompileError {
    #[must_use]
    pub fn regex(pattern: &str, reason: &str) -> Self {
        Self::InvalidRegex {
            pattern: pattern.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Any error raised while turning a query string into an [`ElementFilter`].
///
/// [`ElementFilter`]: super::ElementFilter
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterError {
    #[error("lex error: {0}")]
    Lex(#[from] LexError),
    #[error("{0}")]
    Syntax(#[from] SyntaxError),
    #[error("compile error: {0}")]
    Compile(#[from] CompileError),
}
