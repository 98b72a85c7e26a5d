//! Answer matching for free-text, numeric and date exercise fields.
//!
//! Comparisons never fail: unparseable input produces a non-matching
//! `Verdict` carrying a reason, so a form with one bad field still validates
//! the rest.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Default absolute tolerance for numeric answers.
pub const DEFAULT_TOLERANCE: f64 = 1e-9;

const INVALID_NUMBER: &str = "invalid numeric format";
const INVALID_DATE: &str = "invalid date format";

/// Result of comparing a user answer to the expected one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    /// Whether the answer is considered correct.
    pub is_match: bool,
    /// Canonical form of the user input, if it could be parsed.
    pub user_normalized: Option<String>,
    /// Canonical form of the expected value, if it could be parsed.
    pub expected_normalized: Option<String>,
    /// Why the comparison could not be made.
    pub reason: Option<String>,
}

impl Verdict {
    fn compared(is_match: bool, user: String, expected: String) -> Self {
        Self {
            is_match,
            user_normalized: Some(user),
            expected_normalized: Some(expected),
            reason: None,
        }
    }

    fn invalid(user: Option<String>, expected: Option<String>, reason: &str) -> Self {
        Self {
            is_match: false,
            user_normalized: user,
            expected_normalized: expected,
            reason: Some(reason.to_string()),
        }
    }
}

/// Parse a number written with either decimal convention.
///
/// Whitespace is ignored. With both `,` and `.` present the rightmost one is
/// the decimal separator and the other is dropped as a thousands separator.
/// A lone `,` is a decimal comma.
pub fn parse_flexible_number(raw: &str) -> Option<f64> {
    let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.is_empty() {
        return None;
    }

    let canonical = match (compact.rfind(','), compact.rfind('.')) {
        (Some(comma), Some(dot)) if comma > dot => compact.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => compact.replace(',', ""),
        (Some(_), None) => compact.replace(',', "."),
        (None, _) => compact,
    };

    canonical.parse::<f64>().ok().filter(|value| value.is_finite())
}

/// Compare two numbers within `tolerance`.
pub fn compare_numbers(user: &str, expected: &str, tolerance: f64) -> Verdict {
    numeric_verdict(
        parse_flexible_number(user),
        parse_flexible_number(expected),
        tolerance,
    )
}

fn numeric_verdict(user: Option<f64>, expected: Option<f64>, tolerance: f64) -> Verdict {
    match (user, expected) {
        (Some(a), Some(b)) => {
            Verdict::compared((a - b).abs() <= tolerance, a.to_string(), b.to_string())
        }
        (a, b) => Verdict::invalid(
            a.map(|v| v.to_string()),
            b.map(|v| v.to_string()),
            INVALID_NUMBER,
        ),
    }
}

/// Canonical text form: accents stripped, lowercased, whitespace collapsed.
pub fn normalize_text(s: &str) -> String {
    let stripped: String = s.nfd().filter(|c| !is_combining_mark(*c)).collect();
    stripped
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Exact comparison of the canonical text forms.
pub fn compare_text(user: &str, expected: &str) -> Verdict {
    let user = normalize_text(user);
    let expected = normalize_text(expected);
    Verdict::compared(user == expected, user, expected)
}

/// A date answer: typed text or an already-parsed calendar date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateInput<'a> {
    Text(&'a str),
    Date(NaiveDate),
}

impl<'a> From<&'a str> for DateInput<'a> {
    fn from(value: &'a str) -> Self {
        Self::Text(value)
    }
}

impl<'a> From<&'a String> for DateInput<'a> {
    fn from(value: &'a String) -> Self {
        Self::Text(value)
    }
}

impl From<NaiveDate> for DateInput<'_> {
    fn from(value: NaiveDate) -> Self {
        Self::Date(value)
    }
}

impl From<DateTime<Utc>> for DateInput<'_> {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Date(value.date_naive())
    }
}

/// Parse a date into `YYYY-MM-DD`.
///
/// `/`, `.` and `-` are all accepted as separators. A leading four-digit year
/// reads as year-month-day. A trailing four-digit year tries day-month-year
/// first and falls back to month-day-year.
pub fn parse_flexible_date<'a>(value: impl Into<DateInput<'a>>) -> Option<String> {
    let date = match value.into() {
        DateInput::Date(date) => date,
        DateInput::Text(text) => parse_date_text(text)?,
    };
    Some(date.format("%Y-%m-%d").to_string())
}

fn parse_date_text(text: &str) -> Option<NaiveDate> {
    let unified: String = text
        .trim()
        .chars()
        .map(|c| if c == '/' || c == '.' { '-' } else { c })
        .collect();
    let parts: Vec<&str> = unified.split('-').collect();
    let [first, second, third] = parts.as_slice() else {
        return None;
    };

    if is_year(first) {
        calendar_date(first, second, third)
    } else if is_year(third) {
        calendar_date(third, second, first).or_else(|| calendar_date(third, first, second))
    } else {
        None
    }
}

fn is_year(part: &str) -> bool {
    part.len() == 4 && is_digits(part)
}

fn is_digits(part: &str) -> bool {
    !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit())
}

// from_ymd_opt rejects overflowing days and months.
fn calendar_date(year: &str, month: &str, day: &str) -> Option<NaiveDate> {
    if !is_digits(month) || !is_digits(day) {
        return None;
    }
    NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, day.parse().ok()?)
}

/// Compare two dates on their ISO calendar form.
pub fn compare_dates<'a, 'b>(
    user: impl Into<DateInput<'a>>,
    expected: impl Into<DateInput<'b>>,
) -> Verdict {
    match (parse_flexible_date(user), parse_flexible_date(expected)) {
        (Some(a), Some(b)) => Verdict::compared(a == b, a, b),
        (a, b) => Verdict::invalid(a, b, INVALID_DATE),
    }
}

/// Expected value of an exercise field, tagged with how to compare it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExpectedAnswer {
    Number {
        value: f64,
        #[serde(default = "default_tolerance")]
        tolerance: f64,
    },
    Text {
        value: String,
    },
    Date {
        value: String,
    },
}

fn default_tolerance() -> f64 {
    DEFAULT_TOLERANCE
}

/// Compare a typed answer using the rule its expected value calls for.
pub fn check_answer(user: &str, expected: &ExpectedAnswer) -> Verdict {
    match expected {
        ExpectedAnswer::Number { value, tolerance } => {
            let expected = Some(*value).filter(|v| v.is_finite());
            numeric_verdict(parse_flexible_number(user), expected, *tolerance)
        }
        ExpectedAnswer::Text { value } => compare_text(user, value),
        ExpectedAnswer::Date { value } => compare_dates(user, value),
    }
}
