//! Date literals in queries and dates in tag values.

use time::{Date, Duration, Month, OffsetDateTime};

use crate::dsl::CompileError;

/// Unit of a relative date offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateUnit {
    Days,
    Weeks,
    Months,
    Years,
}

/// Largest offset that can still land inside the supported calendar from any
/// starting date, in years.
const MAX_OFFSET_YEARS: u64 = 20_000;

impl DateUnit {
    fn max_offset(self) -> u64 {
        match self {
            DateUnit::Days => MAX_OFFSET_YEARS * 366,
            DateUnit::Weeks => MAX_OFFSET_YEARS * 53,
            DateUnit::Months => MAX_OFFSET_YEARS * 12,
            DateUnit::Years => MAX_OFFSET_YEARS,
        }
    }
}

/// A date as written in a query.
///
/// Relative dates are resolved against the caller's "today" at evaluation
/// time, never at parse time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateLiteral {
    Absolute(Date),
    /// `today`, `today -1 years`, `today +2 weeks`
    Relative { amount: i64, unit: DateUnit },
}

impl DateLiteral {
    /// Whether a comparison literal should be read as a date rather than a
    /// number: it starts with `today` or with `YYYY-`.
    pub fn looks_like_date(literal: &str) -> bool {
        let literal = literal.trim();
        if literal.starts_with("today") {
            return true;
        }
        let bytes = literal.as_bytes();
        bytes.len() > 4 && bytes[..4].iter().all(u8::is_ascii_digit) && bytes[4] == b'-'
    }

    pub fn parse(literal: &str) -> Result<Self, CompileError> {
        let trimmed = literal.trim();
        let Some(rest) = trimmed.strip_prefix("today") else {
            return parse_date(trimmed)
                .map(DateLiteral::Absolute)
                .ok_or_else(|| CompileError::InvalidDate {
                    literal: literal.to_string(),
                });
        };

        let invalid = |reason: &str| CompileError::InvalidRelativeDate {
            literal: literal.to_string(),
            reason: reason.to_string(),
        };

        let mut parts = rest.split_whitespace();
        let Some(amount) = parts.next() else {
            return Ok(DateLiteral::Relative {
                amount: 0,
                unit: DateUnit::Days,
            });
        };
        let amount: i64 = amount
            .strip_prefix('+')
            .unwrap_or(amount)
            .parse()
            .map_err(|_| invalid("offset must be a whole number"))?;
        let unit = match parts.next() {
            Some("day" | "days") => DateUnit::Days,
            Some("week" | "weeks") => DateUnit::Weeks,
            Some("month" | "months") => DateUnit::Months,
            Some("year" | "years") => DateUnit::Years,
            Some(_) => return Err(invalid("unit must be days, weeks, months or years")),
            None => return Err(invalid("missing unit")),
        };
        if parts.next().is_some() {
            return Err(invalid("unexpected trailing text"));
        }
        if amount.unsigned_abs() > unit.max_offset() {
            return Err(invalid("offset out of range"));
        }

        Ok(DateLiteral::Relative { amount, unit })
    }

    /// The date this literal denotes for the given "today". Shifts past the
    /// ends of the calendar saturate to [`Date::MIN`] or [`Date::MAX`].
    pub fn resolve(&self, today: Date) -> Date {
        match *self {
            DateLiteral::Absolute(date) => date,
            DateLiteral::Relative { amount, unit } => {
                let limit = unit.max_offset() as i64;
                let amount = amount.clamp(-limit, limit);
                match unit {
                    DateUnit::Days => today.saturating_add(Duration::days(amount)),
                    DateUnit::Weeks => today.saturating_add(Duration::weeks(amount)),
                    DateUnit::Months => add_months(today, amount),
                    DateUnit::Years => add_months(today, amount * 12),
                }
            }
        }
    }
}

/// Shift by whole months, clamping the day to the target month's length
/// (2024-03-31 minus one month is 2024-02-29).
fn add_months(date: Date, months: i64) -> Date {
    let saturated = if months < 0 { Date::MIN } else { Date::MAX };
    let Some(total) = (i64::from(date.year()) * 12 + i64::from(u8::from(date.month())) - 1)
        .checked_add(months)
    else {
        return saturated;
    };
    let year = total.div_euclid(12);
    if year < i64::from(Date::MIN.year()) || year > i64::from(Date::MAX.year()) {
        return saturated;
    }
    let Ok(month) = Month::try_from(total.rem_euclid(12) as u8 + 1) else {
        return saturated;
    };
    let year = year as i32;

    let mut day = date.day();
    while day > 28 {
        if let Ok(shifted) = Date::from_calendar_date(year, month, day) {
            return shifted;
        }
        day -= 1;
    }
    Date::from_calendar_date(year, month, day).unwrap_or(saturated)
}

/// Parse a date from a tag value: `YYYY-MM-DD`, `YYYY-MM` or `YYYY`.
/// Partial dates resolve to the first day of the period.
pub fn parse_date(value: &str) -> Option<Date> {
    let mut parts = value.trim().split('-');

    let year = parts.next().filter(|p| p.len() == 4)?;
    let year: i32 = parse_digits(year)?;
    let month = match parts.next() {
        Some(m) if m.len() == 2 => Month::try_from(parse_digits::<u8>(m)?).ok()?,
        Some(_) => return None,
        None => Month::January,
    };
    let day = match parts.next() {
        Some(d) if d.len() == 2 => parse_digits(d)?,
        Some(_) => return None,
        None => 1,
    };
    if parts.next().is_some() {
        return None;
    }

    Date::from_calendar_date(year, month, day).ok()
}

fn parse_digits<T: std::str::FromStr>(s: &str) -> Option<T> {
    if !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

/// Current UTC date.
pub fn today_utc() -> Date {
    OffsetDateTime::now_utc().date()
}
