//! Compiled, reusable element filters.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use time::Date;

use super::ast::Expr;
use super::compile::{Predicate, compile};
use super::error::FilterError;
use super::eval::{EvalContext, evaluate};
use super::parser::parse_filter;
use crate::dates::today_utc;
use crate::element::{Element, ElementTypes};
use crate::units::UnitTable;

/// A parsed and compiled filter expression.
///
/// Immutable after construction and cheap to share between threads: wrap it
/// in an `Arc` (see [`crate::cache::FilterCache`]) and call [`matches`] from
/// as many workers as needed.
///
/// [`matches`]: ElementFilter::matches
#[derive(Clone)]
pub struct ElementFilter {
    source: Arc<str>,
    types: ElementTypes,
    root: Option<Expr<Predicate>>,
    units: Arc<UnitTable>,
    uses_dates: bool,
}

impl ElementFilter {
    /// Parse and compile with the built-in unit table.
    pub fn parse(source: &str) -> Result<Self, FilterError> {
        Self::parse_with_units(source, Arc::new(UnitTable::default()))
    }

    pub fn parse_with_units(source: &str, units: Arc<UnitTable>) -> Result<Self, FilterError> {
        let ast = parse_filter(source)?;
        let (types, root) = compile(ast, &units)?;
        let uses_dates = root
            .as_ref()
            .is_some_and(|expr| expr.leaves().iter().any(|leaf| leaf.uses_dates()));

        Ok(Self {
            source: Arc::from(source),
            types,
            root,
            units,
            uses_dates,
        })
    }

    /// The expression text this filter was built from.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn element_types(&self) -> ElementTypes {
        self.types
    }

    /// Whether any leaf compares against a date.
    pub fn uses_dates(&self) -> bool {
        self.uses_dates
    }

    /// Whether the element matches, resolving relative dates against the
    /// current UTC date.
    pub fn matches<E: Element + ?Sized>(&self, element: &E) -> bool {
        if !self.types.contains(element.element_type()) {
            return false;
        }
        self.eval(element, self.clock_date())
    }

    /// Today's UTC date, or a placeholder when no leaf reads dates.
    fn clock_date(&self) -> Date {
        if self.uses_dates {
            today_utc()
        } else {
            Date::MIN
        }
    }

    /// Like [`matches`](Self::matches) with an explicit "today".
    pub fn matches_at<E: Element + ?Sized>(&self, element: &E, today: Date) -> bool {
        self.types.contains(element.element_type()) && self.eval(element, today)
    }

    fn eval<E: Element + ?Sized>(&self, element: &E, today: Date) -> bool {
        let Some(root) = &self.root else {
            return true;
        };
        let ctx = EvalContext {
            units: &self.units,
            today,
        };
        evaluate(root, element, &ctx)
    }

    /// Lazily keep the elements of `elements` that match, in order.
    ///
    /// The returned iterator is `Clone` whenever the input is, so a filtered
    /// sequence can be walked more than once.
    pub fn filter<I>(&self, elements: I) -> Filtered<'_, I::IntoIter>
    where
        I: IntoIterator,
        I::Item: Element,
    {
        self.filter_at(elements, self.clock_date())
    }

    pub fn filter_at<I>(&self, elements: I, today: Date) -> Filtered<'_, I::IntoIter>
    where
        I: IntoIterator,
        I::Item: Element,
    {
        Filtered {
            filter: self,
            inner: elements.into_iter(),
            today,
        }
    }
}

impl FromStr for ElementFilter {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ElementFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl fmt::Debug for ElementFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElementFilter")
            .field("source", &self.source)
            .field("types", &self.types)
            .field("leaves", &self.root.as_ref().map_or(0, |r| r.leaves().len()))
            .finish()
    }
}

/// Iterator returned by [`ElementFilter::filter`].
#[derive(Clone)]
pub struct Filtered<'f, I> {
    filter: &'f ElementFilter,
    inner: I,
    today: Date,
}

impl<I> Iterator for Filtered<'_, I>
where
    I: Iterator,
    I::Item: Element,
{
    type Item = I::Item;

    fn next(&mut self) -> Option<Self::Item> {
        let (filter, today) = (self.filter, self.today);
        self.inner.find(|e| filter.matches_at(e, today))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, self.inner.size_hint().1)
    }
}
