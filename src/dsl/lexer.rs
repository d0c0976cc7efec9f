//! Lexer/tokenizer for the filter DSL.

use std::fmt;

use winnow::combinator::alt;
use winnow::prelude::*;
use winnow::token::take_while;

use super::error::LexError;

/// Token types for the DSL.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Element type keywords
    Nodes,
    Ways,
    Relations,

    // Structural keywords
    With,
    And,
    Or,
    Not,

    // Operators
    Eq,      // =
    Ne,      // !=
    Like,    // ~
    NotLike, // !~
    Lt,      // <
    Le,      // <=
    Gt,      // >
    Ge,      // >=
    Bang,    // !

    // Punctuation
    LParen, // (
    RParen, // )
    Comma,  // ,
    Pipe,   // |

    // Tag keys, values, numbers, dates
    Word(String),
    Quoted(String),

    // End of input
    Eof,
}

impl Token {
    /// Word or quoted string content, if this token is a literal.
    pub fn literal(&self) -> Option<&str> {
        match self {
            Token::Word(s) | Token::Quoted(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Nodes => write!(f, "'nodes'"),
            Token::Ways => write!(f, "'ways'"),
            Token::Relations => write!(f, "'relations'"),
            Token::With => write!(f, "'with'"),
            Token::And => write!(f, "'and'"),
            Token::Or => write!(f, "'or'"),
            Token::Not => write!(f, "'not'"),
            Token::Eq => write!(f, "'='"),
            Token::Ne => write!(f, "'!='"),
            Token::Like => write!(f, "'~'"),
            Token::NotLike => write!(f, "'!~'"),
            Token::Lt => write!(f, "'<'"),
            Token::Le => write!(f, "'<='"),
            Token::Gt => write!(f, "'>'"),
            Token::Ge => write!(f, "'>='"),
            Token::Bang => write!(f, "'!'"),
            Token::LParen => write!(f, "'('"),
            Token::RParen => write!(f, "')'"),
            Token::Comma => write!(f, "','"),
            Token::Pipe => write!(f, "'|'"),
            Token::Word(s) => write!(f, "'{}'", s),
            Token::Quoted(s) => write!(f, "\"{}\"", s),
            Token::Eof => write!(f, "end of input"),
        }
    }
}

/// A token and the byte offset it starts at.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub offset: usize,
}

// Result type of the token parsers
type PResult<T> = Result<T, winnow::error::ErrMode<winnow::error::ContextError>>;

fn backtrack() -> winnow::error::ErrMode<winnow::error::ContextError> {
    winnow::error::ErrMode::Backtrack(winnow::error::ContextError::default())
}

const WHITESPACE: [char; 4] = [' ', '\t', '\r', '\n'];

/// Characters that end a bare word.
fn is_reserved(c: char) -> bool {
    matches!(c, '(' | ')' | ',' | '|' | '=' | '!' | '~' | '<' | '>' | '"' | '&')
}

fn is_word_char(c: char) -> bool {
    !c.is_whitespace() && !c.is_control() && !is_reserved(c)
}

/// Lex a bare word: a keyword, tag key, tag value, number or date.
fn lex_word(input: &mut &str) -> PResult<Token> {
    take_while(1.., is_word_char)
        .map(|word: &str| match word {
            "nodes" => Token::Nodes,
            "ways" => Token::Ways,
            "relations" => Token::Relations,
            "with" => Token::With,
            "and" => Token::And,
            "or" => Token::Or,
            "not" => Token::Not,
            other => Token::Word(other.to_string()),
        })
        .parse_next(input)
}

/// Lex a double-quoted string. `\"` and `\\` are unescaped, any other
/// backslash sequence is kept verbatim so regex escapes survive.
fn lex_quoted(input: &mut &str) -> PResult<Token> {
    let Some(rest) = input.strip_prefix('"') else {
        return Err(backtrack());
    };

    let mut value = String::new();
    let mut chars = rest.char_indices();
    while let Some((idx, c)) = chars.next() {
        match c {
            '"' => {
                *input = &rest[idx + 1..];
                return Ok(Token::Quoted(value));
            }
            '\\' => match chars.next() {
                Some((_, escaped @ ('"' | '\\'))) => value.push(escaped),
                Some((_, other)) => {
                    value.push('\\');
                    value.push(other);
                }
                None => break,
            },
            c => value.push(c),
        }
    }

    // unterminated
    Err(backtrack())
}

fn lex_operator(input: &mut &str) -> PResult<Token> {
    alt((
        // Multi-char operators first
        "!=".value(Token::Ne),
        "!~".value(Token::NotLike),
        "<=".value(Token::Le),
        ">=".value(Token::Ge),
        // Single-char operators
        "=".value(Token::Eq),
        "~".value(Token::Like),
        "<".value(Token::Lt),
        ">".value(Token::Gt),
        "!".value(Token::Bang),
        "(".value(Token::LParen),
        ")".value(Token::RParen),
        ",".value(Token::Comma),
        "|".value(Token::Pipe),
    ))
    .parse_next(input)
}

/// Lex a single token.
fn lex_token(input: &mut &str) -> PResult<Token> {
    *input = input.trim_start_matches(WHITESPACE);

    if input.is_empty() {
        return Ok(Token::Eof);
    }

    alt((lex_operator, lex_quoted, lex_word)).parse_next(input)
}

/// Tokenize the entire input.
///
/// The returned sequence always ends with [`Token::Eof`].
pub fn tokenize(input: &str) -> Result<Vec<Spanned>, LexError> {
    let mut remaining = input;
    let mut tokens = Vec::new();

    loop {
        let skipped = remaining.trim_start_matches(WHITESPACE);
        let offset = input.len() - skipped.len();

        match lex_token(&mut remaining) {
            Ok(Token::Eof) => {
                tokens.push(Spanned {
                    token: Token::Eof,
                    offset: input.len(),
                });
                return Ok(tokens);
            }
            Ok(token) => tokens.push(Spanned { token, offset }),
            Err(_) => {
                let character = skipped.chars().next().unwrap_or('\0');
                return Err(LexError { character, offset });
            }
        }
    }
}
