//! Parser for the filter DSL.
//!
//! Grammar (in rough EBNF):
//!
//! query      = types ("with" or_expr)?
//! types      = type ("," type)*
//! type       = "nodes" | "ways" | "relations"
//! or_expr    = and_expr ("or" and_expr)*
//! and_expr   = unary_expr ("and" unary_expr)*
//! unary_expr = "not" unary_expr | "(" or_expr ")" | leaf
//! leaf       = KEY
//!            | "!" KEY
//!            | KEY ("=" | "!=") VALUE
//!            | KEY ("~" | "!~") value_list
//!            | KEY ("<" | "<=" | ">" | ">=") literal
//!            | "~" value_list ("~" value_list)?
//!            | "!~" value_list
//!            | ("older" | "newer") literal
//! value_list = VALUE ("|" VALUE)*
//! literal    = VALUE+

use super::ast::{AgeOp, CompareOp, Expr, FilterAst, LeafAst};
use super::error::{FilterError, SyntaxError};
use super::lexer::{Spanned, Token, tokenize};
use crate::element::{ElementType, ElementTypes};

/// Parser state.
struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    eof_offset: usize,
}

type ParseResult<T> = Result<T, SyntaxError>;

impl Parser {
    fn new(tokens: Vec<Spanned>) -> Self {
        let eof_offset = tokens.last().map(|t| t.offset).unwrap_or(0);
        Parser {
            tokens,
            pos: 0,
            eof_offset,
        }
    }

    fn peek(&self) -> &Token {
        self.peek_at(0)
    }

    fn peek_at(&self, ahead: usize) -> &Token {
        self.tokens
            .get(self.pos + ahead)
            .map(|t| &t.token)
            .unwrap_or(&Token::Eof)
    }

    fn offset(&self) -> usize {
        self.tokens
            .get(self.pos)
            .map(|t| t.offset)
            .unwrap_or(self.eof_offset)
    }

    fn advance(&mut self) -> Token {
        let tok = self.peek().clone();
        self.pos += 1;
        tok
    }

    fn error(&self, expected: &str) -> SyntaxError {
        SyntaxError::new(self.offset(), expected, self.peek().to_string())
    }

    fn expect(&mut self, expected: Token) -> ParseResult<()> {
        if *self.peek() == expected {
            self.advance();
            Ok(())
        } else {
            Err(self.error(&expected.to_string()))
        }
    }

    /// Parse the whole query: element types and optional tag expression.
    fn parse_query(&mut self) -> ParseResult<FilterAst> {
        let mut types = ElementTypes::empty();
        types.insert(self.parse_type()?);
        while matches!(self.peek(), Token::Comma) {
            self.advance(); // consume ,
            types.insert(self.parse_type()?);
        }

        let root = match self.peek() {
            Token::With => {
                self.advance(); // consume with
                Some(self.parse_or_expr()?)
            }
            Token::Eof => None,
            _ => return Err(self.error("',' or 'with'")),
        };

        Ok(FilterAst { types, root })
    }

    fn parse_type(&mut self) -> ParseResult<ElementType> {
        let element_type = match self.peek() {
            Token::Nodes => ElementType::Node,
            Token::Ways => ElementType::Way,
            Token::Relations => ElementType::Relation,
            _ => return Err(self.error("'nodes', 'ways' or 'relations'")),
        };
        self.advance();
        Ok(element_type)
    }

    /// Parse OR expression: and_expr ("or" and_expr)*
    fn parse_or_expr(&mut self) -> ParseResult<Expr<LeafAst>> {
        let mut left = self.parse_and_expr()?;

        while matches!(self.peek(), Token::Or) {
            self.advance(); // consume or
            let right = self.parse_and_expr()?;
            left = left.or(right);
        }

        Ok(left)
    }

    /// Parse AND expression: unary_expr ("and" unary_expr)*
    fn parse_and_expr(&mut self) -> ParseResult<Expr<LeafAst>> {
        let mut left = self.parse_unary_expr()?;

        while matches!(self.peek(), Token::And) {
            self.advance(); // consume and
            let right = self.parse_unary_expr()?;
            left = left.and(right);
        }

        Ok(left)
    }

    /// Parse unary expression: "not" unary_expr | "(" or_expr ")" | leaf
    fn parse_unary_expr(&mut self) -> ParseResult<Expr<LeafAst>> {
        match self.peek() {
            Token::Not => {
                self.advance(); // consume not
                let inner = self.parse_unary_expr()?;
                Ok(Expr::Not(Box::new(inner)))
            }
            Token::LParen => {
                self.advance(); // consume (
                let inner = self.parse_or_expr()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            _ => self.parse_leaf().map(Expr::Leaf),
        }
    }

    fn parse_leaf(&mut self) -> ParseResult<LeafAst> {
        match self.peek().clone() {
            Token::Bang => {
                self.advance(); // consume !
                let key = self.parse_value("tag key")?;
                Ok(LeafAst::LacksKey(key))
            }
            Token::Like => {
                self.advance(); // consume ~
                let keys = self.parse_value_list()?;
                if matches!(self.peek(), Token::Like) {
                    self.advance(); // consume ~
                    let values = self.parse_value_list()?;
                    Ok(LeafAst::TagLike { keys, values })
                } else {
                    Ok(LeafAst::HasKeyLike(keys))
                }
            }
            Token::NotLike => {
                self.advance(); // consume !~
                Ok(LeafAst::LacksKeyLike(self.parse_value_list()?))
            }
            Token::Word(word)
                if (word == "older" || word == "newer") && self.peek_at(1).literal().is_some() =>
            {
                self.advance(); // consume older/newer
                let op = if word == "older" {
                    AgeOp::Older
                } else {
                    AgeOp::Newer
                };
                let literal = self.parse_literal()?;
                Ok(LeafAst::Age { op, literal })
            }
            Token::Word(_) | Token::Quoted(_) => self.parse_tag_expr(),
            _ => Err(self.error("tag key, '!', '~', '!~', 'not' or '('")),
        }
    }

    /// Parse tag expression: KEY (operator operand)?
    fn parse_tag_expr(&mut self) -> ParseResult<LeafAst> {
        let key = self.parse_value("tag key")?;

        let op = match self.peek() {
            Token::Lt => Some(CompareOp::Lt),
            Token::Le => Some(CompareOp::Le),
            Token::Gt => Some(CompareOp::Gt),
            Token::Ge => Some(CompareOp::Ge),
            _ => None,
        };
        if let Some(op) = op {
            self.advance(); // consume operator
            let literal = self.parse_literal()?;
            return Ok(LeafAst::Compare { key, op, literal });
        }

        match self.peek() {
            Token::Eq => {
                self.advance(); // consume =
                let value = self.parse_value("tag value")?;
                Ok(LeafAst::Equals { key, value })
            }
            Token::Ne => {
                self.advance(); // consume !=
                let value = self.parse_value("tag value")?;
                Ok(LeafAst::NotEquals { key, value })
            }
            Token::Like => {
                self.advance(); // consume ~
                let values = self.parse_value_list()?;
                Ok(LeafAst::MatchesAny { key, values })
            }
            Token::NotLike => {
                self.advance(); // consume !~
                let values = self.parse_value_list()?;
                Ok(LeafAst::MatchesNone { key, values })
            }
            _ => Ok(LeafAst::HasKey(key)),
        }
    }

    /// Parse a single word or quoted string.
    fn parse_value(&mut self, what: &str) -> ParseResult<String> {
        match self.peek() {
            Token::Word(s) | Token::Quoted(s) => {
                let s = s.clone();
                self.advance();
                Ok(s)
            }
            _ => Err(self.error(what)),
        }
    }

    /// Parse value list: value ("|" value)*
    fn parse_value_list(&mut self) -> ParseResult<Vec<String>> {
        let mut values = vec![self.parse_value("value")?];

        while matches!(self.peek(), Token::Pipe) {
            self.advance(); // consume |
            values.push(self.parse_value("value")?);
        }

        Ok(values)
    }

    /// Parse a comparison literal, which may span several words
    /// (`30 mph`, `today -1 years`).
    fn parse_literal(&mut self) -> ParseResult<String> {
        let mut parts = vec![self.parse_value("number or date")?];

        while let Some(part) = self.peek().literal() {
            parts.push(part.to_string());
            self.advance();
        }

        Ok(parts.join(" "))
    }
}

/// Parse a filter query into an uncompiled AST.
pub fn parse_filter(input: &str) -> Result<FilterAst, FilterError> {
    let tokens = tokenize(input)?;
    let mut parser = Parser::new(tokens);
    let ast = parser.parse_query()?;

    // Ensure we consumed all tokens
    if !matches!(parser.peek(), Token::Eof) {
        return Err(parser
            .error("'and', 'or', ')' or end of input")
            .into());
    }

    Ok(ast)
}
