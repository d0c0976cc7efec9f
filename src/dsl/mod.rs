//! Element filter expressions.
//!
//! Syntax:
//!   nodes, ways with ...        - element types, then an optional expression
//!   key                         - tag exists with a non-empty value
//!   !key                        - tag absent (or empty)
//!   key = value, key != value   - exact match
//!   key ~ a|b|.*c               - any alternative matches (regex if it
//!                                 contains metacharacters, `*` for any value)
//!   key !~ a|b                  - no alternative matches
//!   key < 30 mph, key >= 2      - numeric comparison, units normalized
//!   key < today -1 years        - date comparison
//!   ~k1|k2                      - some key matches the pattern
//!   !~k1|k2                     - no key matches the pattern
//!   ~k1|k2 ~ v1|v2              - some tag matches both patterns
//!   older 2020-01-01            - last edited or checked before the date
//!   newer today -6 months       - last edited or checked after the date
//!   a and b, a or b, not a      - boolean operators (`and` binds tighter)
//!   (expr)                      - grouping
//!
//! Values containing whitespace or reserved characters can be quoted:
//! `name = "Bob's \"Bakery\""`.

mod ast;
mod compile;
mod error;
mod eval;
mod filter;
mod lexer;
mod parser;

pub use ast::{AgeOp, CompareOp, Expr, FilterAst, LeafAst};
pub use compile::{Predicate, ValuePattern, ValuePatterns, compile, compile_leaf};
pub use error::{CompileError, FilterError, LexError, SyntaxError};
pub use eval::{EvalContext, LAST_CHECK_DATE_KEYS, evaluate, last_check_date};
pub use filter::{ElementFilter, Filtered};
pub use lexer::{Spanned, Token, tokenize};
pub use parser::parse_filter;
