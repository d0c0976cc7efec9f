//! AST types for the filter DSL.
//!
//! The boolean tree [`Expr`] is generic over its leaves: the parser produces
//! `Expr<LeafAst>` holding raw literals, the compiler turns it into
//! `Expr<Predicate>` holding validated matchers.

use std::fmt;

use crate::element::ElementTypes;

/// Boolean expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr<L> {
    /// All children must match; evaluated left to right, stops at the first miss.
    And(Vec<Expr<L>>),

    /// Any child must match; evaluated left to right, stops at the first hit.
    Or(Vec<Expr<L>>),

    /// Inverts its child.
    Not(Box<Expr<L>>),

    Leaf(L),
}

/// Comparison operator for numbers and dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Lt, // <
    Le, // <=
    Gt, // >
    Ge, // >=
}

impl CompareOp {
    pub fn apply<T: PartialOrd>(self, left: T, right: T) -> bool {
        match self {
            CompareOp::Lt => left < right,
            CompareOp::Le => left <= right,
            CompareOp::Gt => left > right,
            CompareOp::Ge => left >= right,
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompareOp::Lt => write!(f, "<"),
            CompareOp::Le => write!(f, "<="),
            CompareOp::Gt => write!(f, ">"),
            CompareOp::Ge => write!(f, ">="),
        }
    }
}

/// Direction of an element age check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgeOp {
    Older,
    Newer,
}

/// A leaf as written in the query, literals not yet validated.
#[derive(Debug, Clone, PartialEq)]
pub enum LeafAst {
    /// `key`
    HasKey(String),
    /// `!key`
    LacksKey(String),
    /// `key = value`
    Equals { key: String, value: String },
    /// `key != value`
    NotEquals { key: String, value: String },
    /// `key ~ a|b|c`
    MatchesAny { key: String, values: Vec<String> },
    /// `key !~ a|b|c`
    MatchesNone { key: String, values: Vec<String> },
    /// `key < 60`, `maxspeed <= 30 mph`, `check_date < today -1 years`
    Compare {
        key: String,
        op: CompareOp,
        literal: String,
    },
    /// `~key_pattern`
    HasKeyLike(Vec<String>),
    /// `!~key_pattern`
    LacksKeyLike(Vec<String>),
    /// `~key_pattern ~ value_pattern`
    TagLike {
        keys: Vec<String>,
        values: Vec<String>,
    },
    /// `older today -2 years`, `newer 2020-01-01`
    Age { op: AgeOp, literal: String },
}

/// Parsed but not yet compiled filter.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterAst {
    pub types: ElementTypes,
    /// `None` when the query has no `with` clause.
    pub root: Option<Expr<LeafAst>>,
}

impl<L> Expr<L> {
    /// Combine two expressions with AND, flattening nested ANDs.
    pub fn and(self, other: Expr<L>) -> Self {
        match self {
            Expr::And(mut exprs) => {
                exprs.push(other);
                Expr::And(exprs)
            }
            first => Expr::And(vec![first, other]),
        }
    }

    /// Combine two expressions with OR, flattening nested ORs.
    pub fn or(self, other: Expr<L>) -> Self {
        match self {
            Expr::Or(mut exprs) => {
                exprs.push(other);
                Expr::Or(exprs)
            }
            first => Expr::Or(vec![first, other]),
        }
    }

    /// Convert every leaf, keeping the tree shape.
    pub fn try_map<M, E>(self, f: &mut impl FnMut(L) -> Result<M, E>) -> Result<Expr<M>, E> {
        Ok(match self {
            Expr::And(exprs) => Expr::And(
                exprs
                    .into_iter()
                    .map(|e| e.try_map(f))
                    .collect::<Result<_, _>>()?,
            ),
            Expr::Or(exprs) => Expr::Or(
                exprs
                    .into_iter()
                    .map(|e| e.try_map(f))
                    .collect::<Result<_, _>>()?,
            ),
            Expr::Not(inner) => Expr::Not(Box::new(inner.try_map(f)?)),
            Expr::Leaf(leaf) => Expr::Leaf(f(leaf)?),
        })
    }

    /// Visit every leaf.
    pub fn leaves(&self) -> Vec<&L> {
        let mut out = Vec::new();
        self.collect_leaves(&mut out);
        out
    }

    fn collect_leaves<'a>(&'a self, out: &mut Vec<&'a L>) {
        match self {
            Expr::And(exprs) | Expr::Or(exprs) => {
                for expr in exprs {
                    expr.collect_leaves(out);
                }
            }
            Expr::Not(inner) => inner.collect_leaves(out),
            Expr::Leaf(leaf) => out.push(leaf),
        }
    }
}
