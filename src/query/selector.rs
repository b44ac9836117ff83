//! PromQL selector and label-matcher rendering.

use crate::core::NAME_LABEL;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fmt::Write as _;
use std::time::Duration;

/// A PromQL series selector or full query expression
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Selector(String);

impl Selector {
    /// Wraps raw PromQL text
    pub fn new(expr: impl Into<String>) -> Self {
        Selector(expr.into())
    }

    /// Returns the PromQL text
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the inner string value
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Selector {
    fn from(expr: String) -> Self {
        Selector(expr)
    }
}

impl From<&str> for Selector {
    fn from(expr: &str) -> Self {
        Selector(expr.to_string())
    }
}

/// Quotes a label value as a PromQL string literal.
fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            },
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// `label="value"`
pub fn label_eq(label: &str, value: &str) -> String {
    format!("{}={}", label, quote(value))
}

/// `label!="value"`
pub fn label_neq(label: &str, value: &str) -> String {
    format!("{}!={}", label, quote(value))
}

/// `label=~"regex"`
pub fn label_matches(label: &str, expr: &str) -> String {
    format!("{}=~{}", label, quote(expr))
}

/// `label!~"regex"`
pub fn label_not_matches(label: &str, expr: &str) -> String {
    format!("{}!~{}", label, quote(expr))
}

/// Matches series whose name matches the given regex
pub fn name_matches(expr: &str) -> String {
    label_matches(NAME_LABEL, expr)
}

/// Matches series whose name does not match the given regex
pub fn name_not_matches(expr: &str) -> String {
    label_not_matches(NAME_LABEL, expr)
}

/// Builds `name{expr,...}`, or `{expr,...}` when `name` is empty.
pub fn match_series<I>(name: &str, label_exprs: I) -> Selector
where
    I: IntoIterator<Item = String>,
{
    let exprs: Vec<String> = label_exprs.into_iter().collect();
    Selector(format!("{}{{{}}}", name, exprs.join(",")))
}

/// Renders a duration as a Prometheus duration literal (`1m30s`, `500ms`, `2w`).
pub fn prom_duration(d: Duration) -> String {
    const SECOND: u128 = 1000;
    const MINUTE: u128 = 60 * SECOND;
    const HOUR: u128 = 60 * MINUTE;
    const DAY: u128 = 24 * HOUR;
    const WEEK: u128 = 7 * DAY;
    const YEAR: u128 = 365 * DAY;

    let mut ms = d.as_millis();
    if ms == 0 {
        return "0s".to_string();
    }

    let mut out = String::new();
    // years and weeks are only used when they divide the duration exactly
    for (unit, mult, exact) in [
        ("y", YEAR, true),
        ("w", WEEK, true),
        ("d", DAY, false),
        ("h", HOUR, false),
        ("m", MINUTE, false),
        ("s", SECOND, false),
        ("ms", 1, false),
    ] {
        if exact && ms % mult != 0 {
            continue;
        }
        let v = ms / mult;
        if v > 0 {
            let _ = write!(out, "{}{}", v, unit);
            ms -= v * mult;
        }
    }
    out
}
