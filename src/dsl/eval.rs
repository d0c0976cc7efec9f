//! Evaluator for compiled filter expressions.

use time::Date;

use super::ast::{AgeOp, Expr};
use super::compile::Predicate;
use crate::dates::parse_date;
use crate::element::Element;
use crate::units::UnitTable;

/// Tags that record when a mapper last confirmed an element.
pub const LAST_CHECK_DATE_KEYS: [&str; 5] = [
    "check_date",
    "lastcheck",
    "last_checked",
    "survey:date",
    "survey_date",
];

/// Everything a leaf needs besides the element itself.
#[derive(Debug, Clone, Copy)]
pub struct EvalContext<'a> {
    pub units: &'a UnitTable,
    pub today: Date,
}

/// Evaluate an expression tree against an element.
///
/// `And`/`Or` short-circuit left to right, so keys only referenced by
/// operands after the deciding one are never looked up.
pub fn evaluate<E: Element + ?Sized>(
    expr: &Expr<Predicate>,
    element: &E,
    ctx: &EvalContext<'_>,
) -> bool {
    match expr {
        Expr::And(exprs) => exprs.iter().all(|e| evaluate(e, element, ctx)),
        Expr::Or(exprs) => exprs.iter().any(|e| evaluate(e, element, ctx)),
        Expr::Not(inner) => !evaluate(inner, element, ctx),
        Expr::Leaf(predicate) => evaluate_predicate(predicate, element, ctx),
    }
}

/// Evaluate one leaf. A missing key never raises: it is simply absent.
pub fn evaluate_predicate<E: Element + ?Sized>(
    predicate: &Predicate,
    element: &E,
    ctx: &EvalContext<'_>,
) -> bool {
    match predicate {
        Predicate::HasKey(key) => has_value(element, key),
        Predicate::LacksKey(key) => !has_value(element, key),

        Predicate::Equals { key, value } => element.tag(key) == Some(value.as_str()),
        Predicate::NotEquals { key, value } => element.tag(key) != Some(value.as_str()),

        Predicate::MatchesAny { key, patterns } => {
            element.tag(key).is_some_and(|v| patterns.matches(v))
        }
        Predicate::MatchesNone { key, patterns } => {
            !element.tag(key).is_some_and(|v| patterns.matches(v))
        }

        Predicate::Numeric { key, op, threshold } => element
            .tag(key)
            .and_then(|v| ctx.units.parse_tag_value(v))
            .is_some_and(|actual| actual.compare(*op, threshold)),

        Predicate::Date { key, op, date } => element
            .tag(key)
            .and_then(parse_date)
            .is_some_and(|actual| op.apply(actual, date.resolve(ctx.today))),

        Predicate::HasKeyLike(re) => element.tags().any(|(k, _)| re.is_match(k)),
        Predicate::LacksKeyLike(re) => !element.tags().any(|(k, _)| re.is_match(k)),

        Predicate::TagLike { key, values } => element
            .tags()
            .any(|(k, v)| key.is_match(k) && values.matches(v)),

        Predicate::Age { op, date } => last_check_date(element).is_some_and(|last| {
            let threshold = date.resolve(ctx.today);
            match op {
                AgeOp::Older => last < threshold,
                AgeOp::Newer => last > threshold,
            }
        }),
    }
}

fn has_value<E: Element + ?Sized>(element: &E, key: &str) -> bool {
    element.tag(key).is_some_and(|v| !v.is_empty())
}

/// Latest of the edit timestamp and any check date tag.
pub fn last_check_date<E: Element + ?Sized>(element: &E) -> Option<Date> {
    let edited = element.timestamp().map(|ts| ts.date());
    LAST_CHECK_DATE_KEYS
        .iter()
        .filter_map(|key| element.tag(key).and_then(parse_date))
        .chain(edited)
        .max()
}
