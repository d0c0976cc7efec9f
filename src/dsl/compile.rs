//! Lowering of parsed leaves into validated matchers.
//!
//! Regexes are compiled, numbers normalized and dates parsed exactly once
//! here; evaluation only reads the results.

use regex::Regex;

use super::ast::{AgeOp, CompareOp, Expr, FilterAst, LeafAst};
use super::error::CompileError;
use crate::dates::DateLiteral;
use crate::element::ElementTypes;
use crate::units::{Quantity, UnitTable};

/// Characters that turn a `~` alternative into a regex.
const REGEX_META: &[char] = &[
    '.', '*', '+', '?', '(', ')', '[', ']', '{', '}', '^', '$', '\\', '|',
];

/// One alternative of a `~`/`!~` value list.
#[derive(Debug, Clone)]
pub enum ValuePattern {
    /// `*`
    Any,
    /// Compared byte for byte.
    Exact(String),
    /// Anchored to the whole value.
    Regex(Regex),
}

impl ValuePattern {
    pub fn compile(pattern: &str) -> Result<Self, CompileError> {
        if pattern == "*" {
            Ok(ValuePattern::Any)
        } else if pattern.contains(REGEX_META) {
            Ok(ValuePattern::Regex(anchored_regex(pattern)?))
        } else {
            Ok(ValuePattern::Exact(pattern.to_string()))
        }
    }

    #[inline]
    pub fn matches(&self, value: &str) -> bool {
        match self {
            ValuePattern::Any => true,
            ValuePattern::Exact(expected) => value == expected,
            ValuePattern::Regex(re) => re.is_match(value),
        }
    }
}

/// Ordered alternatives; matches if any alternative does.
#[derive(Debug, Clone)]
pub struct ValuePatterns(Vec<ValuePattern>);

impl ValuePatterns {
    pub fn compile(values: &[String]) -> Result<Self, CompileError> {
        values
            .iter()
            .map(|v| ValuePattern::compile(v))
            .collect::<Result<Vec<_>, _>>()
            .map(ValuePatterns)
    }

    #[inline]
    pub fn matches(&self, value: &str) -> bool {
        self.0.iter().any(|p| p.matches(value))
    }
}

fn anchored_regex(pattern: &str) -> Result<Regex, CompileError> {
    Regex::new(&format!("^(?:{})$", pattern))
        .map_err(|e| CompileError::regex(pattern, &e.to_string()))
}

/// Key patterns are always regexes; alternatives are joined into one.
fn key_regex(keys: &[String]) -> Result<Regex, CompileError> {
    anchored_regex(&keys.join("|"))
}

/// A compiled leaf.
#[derive(Debug, Clone)]
pub enum Predicate {
    HasKey(String),
    LacksKey(String),
    Equals {
        key: String,
        value: String,
    },
    NotEquals {
        key: String,
        value: String,
    },
    MatchesAny {
        key: String,
        patterns: ValuePatterns,
    },
    MatchesNone {
        key: String,
        patterns: ValuePatterns,
    },
    Numeric {
        key: String,
        op: CompareOp,
        threshold: Quantity,
    },
    Date {
        key: String,
        op: CompareOp,
        date: DateLiteral,
    },
    HasKeyLike(Regex),
    LacksKeyLike(Regex),
    TagLike {
        key: Regex,
        values: ValuePatterns,
    },
    Age {
        op: AgeOp,
        date: DateLiteral,
    },
}

impl Predicate {
    /// Whether evaluating needs to know today's date.
    pub fn uses_dates(&self) -> bool {
        matches!(self, Predicate::Date { .. } | Predicate::Age { .. })
    }
}

/// Compile one leaf.
pub fn compile_leaf(leaf: LeafAst, units: &UnitTable) -> Result<Predicate, CompileError> {
    Ok(match leaf {
        LeafAst::HasKey(key) => Predicate::HasKey(key),
        LeafAst::LacksKey(key) => Predicate::LacksKey(key),
        LeafAst::Equals { key, value } => Predicate::Equals { key, value },
        LeafAst::NotEquals { key, value } => Predicate::NotEquals { key, value },
        LeafAst::MatchesAny { key, values } => Predicate::MatchesAny {
            key,
            patterns: ValuePatterns::compile(&values)?,
        },
        LeafAst::MatchesNone { key, values } => Predicate::MatchesNone {
            key,
            patterns: ValuePatterns::compile(&values)?,
        },
        LeafAst::Compare { key, op, literal } => {
            if DateLiteral::looks_like_date(&literal) {
                Predicate::Date {
                    key,
                    op,
                    date: DateLiteral::parse(&literal)?,
                }
            } else {
                Predicate::Numeric {
                    key,
                    op,
                    threshold: units.parse_literal(&literal)?,
                }
            }
        }
        LeafAst::HasKeyLike(keys) => Predicate::HasKeyLike(key_regex(&keys)?),
        LeafAst::LacksKeyLike(keys) => Predicate::LacksKeyLike(key_regex(&keys)?),
        LeafAst::TagLike { keys, values } => Predicate::TagLike {
            key: key_regex(&keys)?,
            values: ValuePatterns::compile(&values)?,
        },
        LeafAst::Age { op, literal } => Predicate::Age {
            op,
            date: DateLiteral::parse(&literal)?,
        },
    })
}

/// Compile a whole parsed filter.
pub fn compile(
    ast: FilterAst,
    units: &UnitTable,
) -> Result<(ElementTypes, Option<Expr<Predicate>>), CompileError> {
    let root = match ast.root {
        Some(expr) => Some(expr.try_map(&mut |leaf| compile_leaf(leaf, units))?),
        None => None,
    };
    Ok((ast.types, root))
}
