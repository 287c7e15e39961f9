//! Scalar values with kind inferred from their text.
//!
//! Nothing carries a schema: a cell is an Integer if its text parses as
//! one, otherwise a Float, otherwise a Date if it is date-shaped, otherwise
//! a String. Inference runs every time a value is compared.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Inferred kind of a value, in inference priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Kind {
    Integer,
    Float,
    Date,
    String,
}

/// Calendar-free date. Ordering is lexicographic on (year, month, day);
/// month 13 or day 40 are accepted as written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Date {
    pub year: i64,
    pub month: i64,
    pub day: i64,
}

impl Date {
    pub fn new(year: i64, month: i64, day: i64) -> Self {
        Self { year, month, day }
    }
}

impl fmt::Display for Date {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}-{:02}", self.year, self.month, self.day)
    }
}

/// A value resolved to its inferred kind.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scalar<'a> {
    Integer(i64),
    Float(f64),
    Date(Date),
    String(&'a str),
}

impl Scalar<'_> {
    pub fn kind(&self) -> Kind {
        match self {
            Scalar::Integer(_) => Kind::Integer,
            Scalar::Float(_) => Kind::Float,
            Scalar::Date(_) => Kind::Date,
            Scalar::String(_) => Kind::String,
        }
    }
}

/// Borrowed text scalar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Value<'a> {
    text: &'a str,
}

impl<'a> Value<'a> {
    pub fn new(text: &'a str) -> Self {
        Self { text }
    }

    pub fn as_str(&self) -> &'a str {
        self.text
    }

    /// Infer the kind of this value.
    pub fn kind(&self) -> Kind {
        self.classify().kind()
    }

    /// Parse once and return the value tagged with its kind.
    pub fn classify(&self) -> Scalar<'a> {
        if let Ok(n) = self.text.parse::<i64>() {
            return Scalar::Integer(n);
        }
        if let Ok(f) = self.text.parse::<f64>() {
            return Scalar::Float(f);
        }
        if is_date_shaped(self.text) {
            return Scalar::Date(self.as_date());
        }
        Scalar::String(self.text)
    }

    /// Integer coercion; zero when the text does not parse.
    pub fn as_integer(&self) -> i64 {
        self.text.parse().unwrap_or(0)
    }

    /// Float coercion; zero when the text does not parse.
    pub fn as_float(&self) -> f64 {
        self.text.parse().unwrap_or(0.0)
    }

    /// Date coercion. Each `-` separated part that fails to parse is zero.
    pub fn as_date(&self) -> Date {
        let mut parts = self
            .text
            .splitn(3, '-')
            .map(|part| part.parse::<i64>().unwrap_or(0));
        Date {
            year: parts.next().unwrap_or(0),
            month: parts.next().unwrap_or(0),
            day: parts.next().unwrap_or(0),
        }
    }
}

impl fmt::Display for Value<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.text)
    }
}

fn date_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    // Anchored: text that only contains a date, such as `x2020-01-01`, stays a String.
    PATTERN.get_or_init(|| {
        Regex::new(r"^[0-9]{4}-[0-1][0-9]-[0-3][0-9]$").expect("date pattern is valid")
    })
}

/// `YYYY-MM-DD` by character class only; `2020-19-39` qualifies.
pub fn is_date_shaped(text: &str) -> bool {
    date_pattern().is_match(text)
}
