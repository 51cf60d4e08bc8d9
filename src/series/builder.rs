//! Turning raw rows into period series.
//!
//! Rows are loosely-typed JSON maps. Dates may be ISO dates, datetimes, or
//! US-style `MM/DD/YYYY`. Amounts may be numbers or strings with currency
//! formatting. Rows whose date or amount cannot be read are skipped, not
//! fatal.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{NaiveDate, NaiveDateTime};
use serde_json::Value;
use tracing::{debug, warn};

use crate::domain::{Aggregation, Frequency, Record, TimeSeries};
use crate::series::FiscalCalendar;

/// Key used when rows are not grouped.
pub const TOTAL_SERIES: &str = "total";

/// A series is dropped from alignment when more than this share of the
/// aligned periods is missing.
pub const MAX_MISSING_SHARE: f64 = 0.5;

/// How to turn rows into series.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesSpec {
    pub amount_field: String,
    pub date_field: String,
    pub group_by: Option<String>,
    pub aggregation: Aggregation,
    pub frequency: Frequency,
}

impl SeriesSpec {
    pub fn new(amount_field: impl Into<String>, date_field: impl Into<String>) -> Self {
        Self {
            amount_field: amount_field.into(),
            date_field: date_field.into(),
            group_by: None,
            aggregation: Aggregation::Sum,
            frequency: Frequency::Monthly,
        }
    }

    pub fn group_by(mut self, field: impl Into<String>) -> Self {
        self.group_by = Some(field.into());
        self
    }

    pub fn aggregation(mut self, aggregation: Aggregation) -> Self {
        self.aggregation = aggregation;
        self
    }

    pub fn frequency(mut self, frequency: Frequency) -> Self {
        self.frequency = frequency;
        self
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct Bucket {
    sum: f64,
    count: usize,
}

impl Bucket {
    fn value(self, aggregation: Aggregation) -> f64 {
        match aggregation {
            Aggregation::Sum => self.sum,
            Aggregation::Mean => self.sum / self.count as f64,
            Aggregation::Count => self.count as f64,
        }
    }
}

/// Aggregate rows into one series per group (or a single `"total"` series).
///
/// Missing date/amount fields yield an empty map with a warning. Buckets whose
/// aggregate is exactly zero are dropped, so every returned series holds only
/// non-zero finite values.
pub fn prepare_time_series(
    rows: &[Record],
    spec: &SeriesSpec,
    calendar: &FiscalCalendar,
) -> BTreeMap<String, TimeSeries> {
    if rows.is_empty() {
        return BTreeMap::new();
    }
    for field in [&spec.date_field, &spec.amount_field] {
        if !rows.iter().any(|r| r.contains_key(field.as_str())) {
            warn!(field = field.as_str(), "field not found in any row; no series built");
            return BTreeMap::new();
        }
    }

    let group_field = spec
        .group_by
        .as_deref()
        .filter(|g| rows.iter().any(|r| r.contains_key(*g)));

    let mut buckets: BTreeMap<String, BTreeMap<NaiveDate, Bucket>> = BTreeMap::new();
    let mut skipped = 0usize;
    for row in rows {
        let Some(date) = row.get(&spec.date_field).and_then(parse_date) else {
            skipped += 1;
            continue;
        };
        let Some(amount) = row.get(&spec.amount_field).and_then(parse_amount) else {
            skipped += 1;
            continue;
        };
        let key = match group_field {
            Some(g) => match row.get(g).and_then(value_to_key) {
                Some(k) => k,
                None => {
                    skipped += 1;
                    continue;
                }
            },
            None => TOTAL_SERIES.to_string(),
        };
        let Some(period) = calendar.period_start(date, spec.frequency) else {
            skipped += 1;
            continue;
        };

        let bucket = buckets.entry(key).or_default().entry(period).or_default();
        bucket.sum += amount;
        bucket.count += 1;
    }
    if skipped > 0 {
        debug!(skipped, total = rows.len(), "rows skipped while building series");
    }

    buckets
        .into_iter()
        .filter_map(|(name, periods)| {
            let map: BTreeMap<NaiveDate, f64> = periods
                .into_iter()
                .map(|(p, b)| (p, b.value(spec.aggregation)))
                .filter(|(_, v)| v.is_finite() && *v != 0.0)
                .collect();
            (!map.is_empty()).then(|| {
                let series = TimeSeries::from_map(name.clone(), spec.frequency, map);
                (name, series)
            })
        })
        .collect()
}

/// Series placed on a shared period axis. `None` marks a missing period.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AlignedSeriesSet {
    pub periods: Vec<NaiveDate>,
    pub columns: BTreeMap<String, Vec<Option<f64>>>,
}

impl AlignedSeriesSet {
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    pub fn column(&self, name: &str) -> Option<&[Option<f64>]> {
        self.columns.get(name).map(Vec::as_slice)
    }

    /// Pairwise-complete values of two columns.
    pub fn complete_pairs(&self, a: &str, b: &str) -> (Vec<f64>, Vec<f64>) {
        let (Some(ca), Some(cb)) = (self.columns.get(a), self.columns.get(b)) else {
            return (Vec::new(), Vec::new());
        };
        ca.iter()
            .zip(cb)
            .filter_map(|(x, y)| Some(((*x)?, (*y)?)))
            .unzip()
    }
}

/// Put series on the union of the periods of every input series.
///
/// Series with fewer than `min_observations` points, or missing more than
/// half of the aligned periods, are excluded and their names returned. The
/// axis keeps every period seen in the input, including those contributed
/// only by excluded series.
pub fn align_series(
    series: &BTreeMap<String, TimeSeries>,
    min_observations: usize,
) -> (AlignedSeriesSet, Vec<String>) {
    let periods: Vec<NaiveDate> = series
        .values()
        .flat_map(|s| s.periods().iter().copied())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let mut dropped = Vec::new();
    let mut columns = BTreeMap::new();
    for (name, s) in series {
        if s.len() < min_observations {
            dropped.push(name.clone());
            continue;
        }
        let column: Vec<Option<f64>> = periods.iter().map(|p| s.get(*p)).collect();
        let missing = column.iter().filter(|v| v.is_none()).count();
        if periods.is_empty() || missing as f64 / periods.len() as f64 > MAX_MISSING_SHARE {
            dropped.push(name.clone());
            continue;
        }
        columns.insert(name.clone(), column);
    }

    dropped.sort();
    (AlignedSeriesSet { periods, columns }, dropped)
}

/// Parse a date cell. Accepts `YYYY-MM-DD`, ISO datetimes, `YYYY/MM/DD`,
/// `MM/DD/YYYY`, and `YYYY-MM` (first of month).
pub fn parse_date(value: &Value) -> Option<NaiveDate> {
    let raw = value.as_str()?.trim();
    if raw.is_empty() {
        return None;
    }
    for fmt in ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"] {
        if let Ok(d) = NaiveDate::parse_from_str(raw, fmt) {
            return Some(d);
        }
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(dt.date());
        }
    }
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(raw) {
        return Some(dt.date_naive());
    }
    NaiveDate::parse_from_str(&format!("{raw}-01"), "%Y-%m-%d").ok()
}

/// Parse an amount cell. Strings may carry `$`, thousands separators, or
/// accounting-style parentheses for negatives.
pub fn parse_amount(value: &Value) -> Option<f64> {
    let amount = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => {
            let trimmed = s.trim();
            let (negative, body) = match trimmed.strip_prefix('(').and_then(|t| t.strip_suffix(')')) {
                Some(inner) => (true, inner),
                None => (false, trimmed),
            };
            let cleaned: String = body.chars().filter(|c| !matches!(c, '$' | ',' | ' ')).collect();
            let parsed: f64 = cleaned.parse().ok()?;
            if negative { -parsed } else { parsed }
        }
        _ => return None,
    };
    amount.is_finite().then_some(amount)
}

/// Text form of a grouping/account cell. Null and empty values have no key.
pub fn value_to_key(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => {
            let t = s.trim();
            (!t.is_empty()).then(|| t.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    }
}
