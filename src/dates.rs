//! Calendar date enumeration for the date-partitioned mirror layout.
//!
//! The mirror partitions builds as `{yyyymm}/{yyyymmdd}/`, so a run
//! needs an ordered, gap-free list of `YYYYMMDD` dates. Callers supply
//! either an explicit start/end pair or a relative shorthand such as
//! `7days`; both resolve here, with no I/O and no clock access (the
//! current date is a parameter).

use std::fmt;
use std::sync::LazyLock;

use chrono::{Days, NaiveDate};
use regex::Regex;
use thiserror::Error;

/// Pattern for relative range shorthands like `7days` or `2 weeks`.
#[allow(clippy::expect_used)]
static SHORTHAND_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+)\s*(day|days|week|weeks|month|months)$")
        .expect("shorthand regex is valid") // Static pattern, safe to panic
});

/// Errors from date-range resolution. Both are fatal to a run and occur
/// before any network use.
#[derive(Debug, Error)]
pub enum DateError {
    /// A literal date did not parse as `YYYYMMDD`.
    #[error("invalid date {value:?}: expected YYYYMMDD")]
    InvalidDate {
        /// The rejected input.
        value: String,
    },

    /// A relative shorthand did not match `<count><days|weeks|months>`.
    #[error("invalid range shorthand {value:?}: expected forms like 7days, 2weeks, 3months")]
    InvalidShorthand {
        /// The rejected input.
        value: String,
    },
}

/// One calendar date in the mirror's `YYYYMMDD` spelling.
///
/// Ordering is chronological because the spelling is big-endian.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BuildDate(String);

impl BuildDate {
    /// Parses a `YYYYMMDD` string.
    ///
    /// # Errors
    ///
    /// Returns [`DateError::InvalidDate`] when the input is not exactly
    /// eight digits naming a real calendar date.
    pub fn parse(value: &str) -> Result<Self, DateError> {
        parse_naive(value).map(Self::from_naive)
    }

    fn from_naive(date: NaiveDate) -> Self {
        Self(date.format("%Y%m%d").to_string())
    }

    /// The full `YYYYMMDD` spelling.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The `YYYYMM` prefix naming the month directory.
    #[must_use]
    pub fn yyyymm(&self) -> &str {
        &self.0[..6]
    }
}

impl fmt::Display for BuildDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Resolves an explicit start/end pair into the inclusive, contiguous,
/// chronologically ordered date sequence. Inverted bounds are swapped,
/// so the result is insensitive to argument order.
///
/// # Errors
///
/// Returns [`DateError::InvalidDate`] when either bound does not parse.
pub fn resolve_range(start: &str, end: &str) -> Result<Vec<BuildDate>, DateError> {
    let start = parse_naive(start)?;
    let end = parse_naive(end)?;
    Ok(range_between(start, end))
}

/// Resolves a relative shorthand (`7days`, `2weeks`, `3months`) into the
/// inclusive date sequence ending at `today`. A month is approximated as
/// 30 days.
///
/// # Errors
///
/// Returns [`DateError::InvalidShorthand`] when the input does not match
/// the `<count><unit>` pattern or the span is unrepresentable.
pub fn resolve_last(shorthand: &str, today: NaiveDate) -> Result<Vec<BuildDate>, DateError> {
    let normalized = shorthand.trim().to_ascii_lowercase();
    let captures = SHORTHAND_PATTERN
        .captures(&normalized)
        .ok_or_else(|| invalid_shorthand(shorthand))?;

    let count: u64 = captures[1]
        .parse()
        .map_err(|_| invalid_shorthand(shorthand))?;
    let unit = &captures[2];
    let per_unit = if unit.starts_with("day") {
        1
    } else if unit.starts_with("week") {
        7
    } else {
        30
    };
    let days = count
        .checked_mul(per_unit)
        .ok_or_else(|| invalid_shorthand(shorthand))?;
    let start = today
        .checked_sub_days(Days::new(days))
        .ok_or_else(|| invalid_shorthand(shorthand))?;

    Ok(range_between(start, today))
}

fn invalid_shorthand(value: &str) -> DateError {
    DateError::InvalidShorthand {
        value: value.to_string(),
    }
}

fn parse_naive(value: &str) -> Result<NaiveDate, DateError> {
    let invalid = || DateError::InvalidDate {
        value: value.to_string(),
    };
    // Exactly eight digits; chrono alone is lenient about field widths.
    if value.len() != 8 || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    NaiveDate::parse_from_str(value, "%Y%m%d").map_err(|_| invalid())
}

fn range_between(mut start: NaiveDate, mut end: NaiveDate) -> Vec<BuildDate> {
    if start > end {
        std::mem::swap(&mut start, &mut end);
    }
    let mut dates = Vec::new();
    let mut current = start;
    while current <= end {
        dates.push(BuildDate::from_naive(current));
        match current.succ_opt() {
            Some(next) => current = next,
            None => break,
        }
    }
    dates
}
