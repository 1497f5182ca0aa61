//! Typed, bounded accessors over untrusted query strings.
//!
//! Every accessor is total: malformed input collapses to the default (or to
//! an empty string for pattern-filtered text) instead of an error, so no
//! handler can be made to fail through its query string.

use std::convert::Infallible;
use std::num::IntErrorKind;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use regex::Regex;

const TRUTHY: [&str; 4] = ["1", "true", "yes", "on"];

/// Whether a flag value reads as "on". Anything outside the truthy set,
/// garbage included, is false.
pub fn is_truthy(raw: &str) -> bool {
    let value = raw.trim().to_lowercase();
    TRUTHY.contains(&value.as_str())
}

/// A regular expression that must match an entire value.
#[derive(Debug, Clone)]
pub struct Pattern(Regex);

impl Pattern {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Regex::new(&format!("^(?:{pattern})$")).map(Self)
    }

    pub fn is_full_match(&self, value: &str) -> bool {
        self.0.is_match(value)
    }
}

/// Decoded query parameters. Repeated names keep every value but only the
/// first one is ever read.
#[derive(Debug, Clone, Default)]
pub struct QueryParams {
    pairs: Vec<(String, String)>,
}

impl QueryParams {
    /// Decode a raw (form-urlencoded) query string.
    pub fn from_query(query: Option<&str>) -> Self {
        let pairs = query
            .map(|q| {
                url::form_urlencoded::parse(q.as_bytes())
                    .into_owned()
                    .collect()
            })
            .unwrap_or_default();
        Self { pairs }
    }

    /// First raw value for `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Integer parameter. Absent or unparsable yields `default` unclamped;
    /// parsed values are clamped into the given bounds.
    pub fn int(&self, name: &str, default: i64, min: Option<i64>, max: Option<i64>) -> i64 {
        match self.get(name).and_then(parse_int) {
            Some(value) => clamp(value, min, max),
            None => default,
        }
    }

    /// Float parameter, same contract as [`QueryParams::int`].
    pub fn float(&self, name: &str, default: f64, min: Option<f64>, max: Option<f64>) -> f64 {
        match self.get(name).and_then(parse_float) {
            Some(value) => clamp(value, min, max),
            None => default,
        }
    }

    /// Boolean flag. Present values are true only for `1`, `true`, `yes`, `on`.
    pub fn bool(&self, name: &str, default: bool) -> bool {
        self.get(name).map(is_truthy).unwrap_or(default)
    }

    /// Trimmed string, truncated to `max_len` characters (0 = unbounded).
    ///
    /// A value rejected by `pattern` comes back as an empty string, not as
    /// `default`: callers can tell "filtered out" from "absent".
    pub fn string(
        &self,
        name: &str,
        default: &str,
        max_len: usize,
        pattern: Option<&Pattern>,
    ) -> String {
        let Some(raw) = self.get(name) else {
            return default.to_string();
        };

        let trimmed = raw.trim();
        let value: String = if max_len > 0 {
            trimmed.chars().take(max_len).collect()
        } else {
            trimmed.to_string()
        };

        match pattern {
            Some(p) if !p.is_full_match(&value) => String::new(),
            _ => value,
        }
    }

    /// Value only if it is exactly one of `allowed` (case-sensitive).
    pub fn one_of(&self, name: &str, allowed: &[&str], default: &str) -> String {
        match self.get(name) {
            Some(raw) if allowed.contains(&raw) => raw.to_string(),
            _ => default.to_string(),
        }
    }

    /// ISO-8601 instant as epoch seconds.
    pub fn timestamp(&self, name: &str) -> Option<f64> {
        self.get(name)
            .filter(|raw| !raw.is_empty())
            .and_then(parse_iso8601)
    }
}

impl<S> FromRequestParts<S> for QueryParams
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_query(parts.uri.query()))
    }
}

fn parse_int(raw: &str) -> Option<i64> {
    match raw.trim().parse::<i64>() {
        Ok(value) => Some(value),
        // Out-of-range digit strings still carry a sign; saturate so the
        // clamp lands them on the nearest bound.
        Err(e) => match e.kind() {
            IntErrorKind::PosOverflow => Some(i64::MAX),
            IntErrorKind::NegOverflow => Some(i64::MIN),
            _ => None,
        },
    }
}

fn parse_float(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| !v.is_nan())
}

fn clamp<T: PartialOrd>(mut value: T, min: Option<T>, max: Option<T>) -> T {
    if let Some(lo) = min {
        if value < lo {
            value = lo;
        }
    }
    if let Some(hi) = max {
        if value > hi {
            value = hi;
        }
    }
    value
}

const OFFSET_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%dT%H:%M%:z",
    "%Y-%m-%d %H:%M%:z",
];

const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Parse an ISO-8601 date or date-time. Values without an offset are UTC.
pub fn parse_iso8601(raw: &str) -> Option<f64> {
    let to_secs = |dt: DateTime<Utc>| dt.timestamp_micros() as f64 / 1_000_000.0;

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(to_secs(dt.with_timezone(&Utc)));
    }
    for fmt in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(raw, fmt) {
            return Some(to_secs(dt.with_timezone(&Utc)));
        }
    }
    for fmt in NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(to_secs(dt.and_utc()));
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| to_secs(dt.and_utc()))
}
