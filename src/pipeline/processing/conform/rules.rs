//! Field-level cleansing rules shared by the conformers.
//!
//! Every rule is total: malformed input resolves to a sentinel or an unknown
//! value, never to an error.

use chrono::{NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde_json::Value;
use std::collections::BTreeSet;
use std::str::FromStr;

use crate::common::constants::NOT_AVAILABLE;

static DATE_CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9]{8}$").expect("valid regex"));

/// Outcome of reading one raw field
#[derive(Debug, Clone, PartialEq)]
pub enum Parsed<T> {
    Value(T),
    /// Null, absent, or blank
    Missing,
    /// Present but unusable; resolved to unknown
    Malformed,
}

impl<T> Parsed<T> {
    pub fn value(self) -> Option<T> {
        match self {
            Parsed::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_malformed(&self) -> bool {
        matches!(self, Parsed::Malformed)
    }
}

/// Explicit code-to-label table for one categorical field with a single default.
#[derive(Debug, Clone)]
pub struct CodeMap {
    field: &'static str,
    entries: Vec<(&'static str, &'static str)>,
    default: &'static str,
}

/// Result of a code lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mapped {
    pub label: &'static str,
    /// False when the default was applied to a present, unrecognized code
    pub recognized: bool,
    pub missing: bool,
}

impl CodeMap {
    /// Codes are matched after trimming and uppercasing, so table codes are
    /// written uppercase.
    pub fn new(field: &'static str, entries: &[(&'static str, &'static str)]) -> Self {
        Self {
            field,
            entries: entries.to_vec(),
            default: NOT_AVAILABLE,
        }
    }

    pub fn field(&self) -> &'static str {
        self.field
    }

    pub fn default_label(&self) -> &'static str {
        self.default
    }

    pub fn lookup(&self, raw: Option<&Value>) -> Mapped {
        let code = match text(raw) {
            Some(code) => code.to_uppercase(),
            None => {
                return Mapped {
                    label: self.default,
                    recognized: true,
                    missing: true,
                }
            }
        };
        match self.entries.iter().find(|(c, _)| *c == code) {
            Some((_, label)) => Mapped {
                label,
                recognized: true,
                missing: false,
            },
            None => Mapped {
                label: self.default,
                recognized: false,
                missing: false,
            },
        }
    }

    /// Convenience for callers holding a plain string
    pub fn lookup_str(&self, raw: &str) -> &'static str {
        self.lookup(Some(&Value::String(raw.to_string()))).label
    }

    /// Every label this table can produce, default included
    pub fn labels(&self) -> BTreeSet<&'static str> {
        let mut labels: BTreeSet<&'static str> = self.entries.iter().map(|(_, l)| *l).collect();
        labels.insert(self.default);
        labels
    }

    pub fn is_label(&self, value: &str) -> bool {
        value == self.default || self.entries.iter().any(|(_, l)| *l == value)
    }
}

pub static MARITAL_STATUS: Lazy<CodeMap> =
    Lazy::new(|| CodeMap::new("marital_status", &[("S", "Single"), ("M", "Married")]));

pub static CRM_GENDER: Lazy<CodeMap> =
    Lazy::new(|| CodeMap::new("gender", &[("F", "Female"), ("M", "Male")]));

pub static ERP_GENDER: Lazy<CodeMap> = Lazy::new(|| {
    CodeMap::new(
        "gender",
        &[("F", "Female"), ("FEMALE", "Female"), ("M", "Male"), ("MALE", "Male")],
    )
});

pub static PRODUCT_LINE: Lazy<CodeMap> = Lazy::new(|| {
    CodeMap::new(
        "product_line",
        &[
            ("M", "Mountain"),
            ("R", "Road"),
            ("S", "Other Sales"),
            ("T", "Touring"),
        ],
    )
});

pub static COUNTRY: Lazy<CodeMap> = Lazy::new(|| {
    CodeMap::new(
        "country",
        &[
            ("DE", "Germany"),
            ("GERMANY", "Germany"),
            ("US", "United States"),
            ("USA", "United States"),
            ("UNITED STATES", "United States"),
            ("AU", "Australia"),
            ("AUSTRALIA", "Australia"),
            ("CA", "Canada"),
            ("CANADA", "Canada"),
            ("FR", "France"),
            ("FRANCE", "France"),
            ("UK", "United Kingdom"),
            ("GB", "United Kingdom"),
            ("UNITED KINGDOM", "United Kingdom"),
        ],
    )
});

pub static MAINTENANCE: Lazy<CodeMap> = Lazy::new(|| {
    CodeMap::new(
        "maintenance",
        &[("Y", "Yes"), ("YES", "Yes"), ("N", "No"), ("NO", "No")],
    )
});

/// Trimmed text form of a scalar; blank strings count as missing
pub fn text(raw: Option<&Value>) -> Option<String> {
    match raw? {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Text with a sentinel for missing values
pub fn text_or(raw: Option<&Value>, default: &str) -> String {
    text(raw).unwrap_or_else(|| default.to_string())
}

pub fn integer(raw: Option<&Value>) -> Parsed<i64> {
    let Some(value) = raw else {
        return Parsed::Missing;
    };
    let parsed = match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) if s.trim().is_empty() => return Parsed::Missing,
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>().ok().or_else(|| {
                s.parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite() && f.fract() == 0.0)
                    .map(|f| f as i64)
            })
        }
        _ => None,
    };
    parsed.map(Parsed::Value).unwrap_or(Parsed::Malformed)
}

pub fn decimal(raw: Option<&Value>) -> Parsed<Decimal> {
    let Some(value) = raw else {
        return Parsed::Missing;
    };
    let parsed = match value {
        Value::Number(n) => match n.as_i64() {
            Some(i) => Some(Decimal::from(i)),
            None => Decimal::from_str(&n.to_string())
                .ok()
                .or_else(|| n.as_f64().and_then(Decimal::from_f64)),
        },
        Value::String(s) if s.trim().is_empty() => return Parsed::Missing,
        Value::String(s) => {
            let s = s.trim();
            Decimal::from_str(s)
                .ok()
                .or_else(|| Decimal::from_scientific(s).ok())
        }
        _ => None,
    };
    parsed
        .map(|d| Parsed::Value(d.normalize()))
        .unwrap_or(Parsed::Malformed)
}

/// Fixed-width `yyyymmdd` code. Zero, wrong width and impossible calendar
/// dates are all unknown.
pub fn date_code(code: &str) -> Option<NaiveDate> {
    if !DATE_CODE.is_match(code) || code.bytes().all(|b| b == b'0') {
        return None;
    }
    NaiveDate::parse_from_str(code, "%Y%m%d").ok()
}

/// Dates arrive either as numeric codes or as ISO text, optionally with a time.
pub fn date(raw: Option<&Value>) -> Parsed<NaiveDate> {
    let Some(value) = raw else {
        return Parsed::Missing;
    };
    let parsed = match value {
        Value::Number(n) => n.as_i64().and_then(|i| date_code(&i.to_string())),
        Value::String(s) if s.trim().is_empty() => return Parsed::Missing,
        Value::String(s) => {
            let s = s.trim();
            if s.bytes().all(|b| b.is_ascii_digit()) {
                date_code(s)
            } else {
                NaiveDate::parse_from_str(s, "%Y-%m-%d")
                    .ok()
                    .or_else(|| {
                        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
                            .ok()
                            .map(|dt| dt.date())
                    })
                    .or_else(|| {
                        NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S")
                            .ok()
                            .map(|dt| dt.date())
                    })
            }
        }
        _ => None,
    };
    parsed.map(Parsed::Value).unwrap_or(Parsed::Malformed)
}
