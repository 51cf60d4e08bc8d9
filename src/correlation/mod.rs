//! Pairwise correlation with significance, lagged account-vs-revenue search,
//! and correlation matrices.
//!
//! Lag convention: at lag `k` the account series is moved `k` periods earlier
//! on the calendar before joining, so revenue at `t` is paired with the
//! account's value at `t + k` ("expense leads revenue").
//!
//! Tie-breaking is explicit: a later lag replaces the current best only when
//! its `|r|` is strictly greater, so exact ties keep the lowest lag. The final
//! ranking sorts by `|r|` descending, then account name ascending.

use std::collections::BTreeMap;

use nalgebra::DMatrix;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::domain::{
    inner_join, CorrelationAnalysis, CorrelationEntry, CorrelationMethod, TimeSeries, SIGNIFICANCE_LEVEL,
};
use crate::math::stats::{average_ranks, correlation_p_value, pearson};
use crate::seasonal::{seasonally_adjust, MONTHLY_PERIOD};
use crate::series::{align_series, LedgerSeries, REVENUE_SERIES};

/// Fewest joined observations for a defined correlation.
pub const MIN_PAIRS: usize = 3;

/// Seasonal adjustment is applied only to series covering two full years.
pub const MIN_ADJUST_OBSERVATIONS: usize = 2 * MONTHLY_PERIOD;

/// Default minimum length for series entering a correlation matrix.
pub const MATRIX_MIN_OBSERVATIONS: usize = 12;

/// Correlation and two-sided p-value of two value slices.
///
/// Returns `(0.0, 1.0)` for fewer than three pairs or zero variance.
pub fn correlate_values(x: &[f64], y: &[f64], method: CorrelationMethod) -> (f64, f64) {
    let n = x.len().min(y.len());
    if n < MIN_PAIRS {
        return (0.0, 1.0);
    }
    let r = match method {
        CorrelationMethod::Pearson => pearson(&x[..n], &y[..n]),
        CorrelationMethod::Spearman => pearson(&average_ranks(&x[..n]), &average_ranks(&y[..n])),
    };
    match r {
        Some(r) => (r, correlation_p_value(r, n)),
        None => (0.0, 1.0),
    }
}

/// Correlation of two series over their common periods.
pub fn compute_correlation(x: &TimeSeries, y: &TimeSeries, method: CorrelationMethod) -> (f64, f64) {
    let joined = inner_join(x, y);
    correlate_values(&joined.left, &joined.right, method)
}

/// Best lag found for one account.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LagCorrelation {
    pub lag: usize,
    pub correlation: f64,
    pub p_value: f64,
    pub observations: usize,
}

/// Search lags `0..=max_lag` for the largest `|r|` of `account` against
/// `target`. `None` when no lag has at least three joined observations.
pub fn best_lag_correlation(
    account: &TimeSeries,
    target: &TimeSeries,
    max_lag: usize,
    method: CorrelationMethod,
) -> Option<LagCorrelation> {
    let mut best: Option<LagCorrelation> = None;
    for lag in 0..=max_lag {
        let Ok(shift) = u32::try_from(lag) else {
            break;
        };
        let joined = inner_join(&account.shift_earlier(shift), target);
        if joined.len() < MIN_PAIRS {
            continue;
        }
        let (correlation, p_value) = correlate_values(&joined.left, &joined.right, method);
        let better = best.is_none_or(|b| correlation.abs() > b.correlation.abs());
        if better {
            best = Some(LagCorrelation {
                lag,
                correlation,
                p_value,
                observations: joined.len(),
            });
        }
    }
    best
}

/// Strength band for a correlation coefficient.
pub fn correlation_strength(r: f64) -> &'static str {
    let a = r.abs();
    if a > 0.7 {
        "strong"
    } else if a > 0.4 {
        "moderate"
    } else if a > 0.2 {
        "weak"
    } else {
        "very weak"
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn interpret(found: &LagCorrelation) -> String {
    let direction = if found.correlation > 0.0 { "positive" } else { "negative" };
    let lag_text = if found.lag > 0 {
        format!(" (lag {} months)", found.lag)
    } else {
        String::new()
    };
    let sig_text = if found.p_value < SIGNIFICANCE_LEVEL {
        " (significant)"
    } else {
        " (not significant)"
    };
    format!(
        "{} {direction} correlation{lag_text}{sig_text}",
        capitalize(correlation_strength(found.correlation))
    )
}

/// Knobs for the account-vs-revenue search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CorrelationOptions {
    pub seasonally_adjust: bool,
    pub max_lag: usize,
    pub method: CorrelationMethod,
}

impl Default for CorrelationOptions {
    fn default() -> Self {
        Self {
            seasonally_adjust: true,
            max_lag: 3,
            method: CorrelationMethod::Pearson,
        }
    }
}

fn adjust_if_long(series: &TimeSeries, enabled: bool) -> TimeSeries {
    if !enabled || series.len() < MIN_ADJUST_OBSERVATIONS {
        return series.clone();
    }
    match seasonally_adjust(series, MONTHLY_PERIOD) {
        Ok(adjusted) => adjusted,
        Err(err) => {
            warn!(series = %series.name, error = %err, "could not seasonally adjust; using raw series");
            series.clone()
        }
    }
}

/// Rank every expense account in `ledger` by its best-lag correlation with
/// revenue.
pub fn correlate_ledger(ledger: &LedgerSeries, opts: &CorrelationOptions) -> CorrelationAnalysis {
    let adjusted = opts.seasonally_adjust;
    if ledger.total_rows == 0 {
        return CorrelationAnalysis::empty(REVENUE_SERIES, adjusted, 0, "No data provided");
    }
    if ledger.revenue_rows == 0 {
        return CorrelationAnalysis::empty(REVENUE_SERIES, adjusted, 0, "No revenue accounts found");
    }
    let Some(revenue) = ledger.revenue.as_ref() else {
        return CorrelationAnalysis::empty(REVENUE_SERIES, adjusted, 0, "Could not prepare revenue time series");
    };
    let period_count = revenue.len();
    if ledger.expense_rows == 0 {
        return CorrelationAnalysis::empty(REVENUE_SERIES, adjusted, period_count, "No expense accounts found");
    }
    if ledger.expenses.is_empty() {
        return CorrelationAnalysis::empty(
            REVENUE_SERIES,
            adjusted,
            period_count,
            "Could not prepare expense time series",
        );
    }

    let target = adjust_if_long(revenue, adjusted);
    let accounts: Vec<(&String, &TimeSeries)> = ledger.expenses.iter().collect();

    let mut correlations: Vec<CorrelationEntry> = accounts
        .par_iter()
        .filter_map(|(name, series)| {
            let series = adjust_if_long(series, adjusted);
            let Some(found) = best_lag_correlation(&series, &target, opts.max_lag, opts.method) else {
                debug!(account = name.as_str(), "no lag with enough overlapping periods; skipped");
                return None;
            };
            Some(CorrelationEntry {
                account_name: (*name).clone(),
                account_number: ledger.account_number(name).to_string(),
                correlation: found.correlation,
                p_value: found.p_value,
                is_significant: found.p_value < SIGNIFICANCE_LEVEL,
                lag_months: found.lag,
                interpretation: interpret(&found),
            })
        })
        .collect();

    rank_entries(&mut correlations);
    let top_positive: Vec<CorrelationEntry> = correlations.iter().filter(|c| c.correlation > 0.0).cloned().collect();
    let top_negative: Vec<CorrelationEntry> = correlations.iter().filter(|c| c.correlation < 0.0).cloned().collect();
    let significant = correlations.iter().filter(|c| c.is_significant).count();

    let mut summary = format!(
        "Analyzed {} expense accounts against revenue. {significant} correlations are statistically significant (p<0.05). ",
        correlations.len()
    );
    if let Some(top) = top_positive.first() {
        summary.push_str(&format!(
            "Strongest positive: {} (r={:.3}). ",
            top.account_name, top.correlation
        ));
    }
    if let Some(top) = top_negative.first() {
        summary.push_str(&format!(
            "Strongest negative: {} (r={:.3}).",
            top.account_name, top.correlation
        ));
    }

    info!(
        accounts = correlations.len(),
        significant,
        periods = period_count,
        "correlation search complete"
    );

    CorrelationAnalysis {
        target_variable: REVENUE_SERIES.to_string(),
        correlations,
        top_positive,
        top_negative,
        seasonally_adjusted: adjusted,
        period_count,
        summary: summary.trim_end().to_string(),
    }
}

/// `|r|` descending, then account name ascending.
fn rank_entries(entries: &mut [CorrelationEntry]) {
    entries.sort_by(|a, b| {
        b.correlation
            .abs()
            .partial_cmp(&a.correlation.abs())
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.account_name.cmp(&b.account_name))
    });
}

/// Square correlation matrix over aligned series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationMatrix {
    pub names: Vec<String>,
    /// `values[(i, j)]` is the correlation of `names[i]` with `names[j]`;
    /// `NaN` where fewer than three periods overlap.
    #[serde(skip)]
    pub values: DMatrix<f64>,
}

impl CorrelationMatrix {
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn get(&self, a: &str, b: &str) -> Option<f64> {
        let i = self.names.iter().position(|n| n == a)?;
        let j = self.names.iter().position(|n| n == b)?;
        Some(self.values[(i, j)])
    }
}

/// Pairwise correlations of every series that survives alignment.
pub fn correlation_matrix(series: &BTreeMap<String, TimeSeries>, method: CorrelationMethod) -> CorrelationMatrix {
    let (aligned, dropped) = align_series(series, MATRIX_MIN_OBSERVATIONS);
    if !dropped.is_empty() {
        debug!(?dropped, "series excluded from correlation matrix");
    }
    let names: Vec<String> = aligned.names().map(str::to_string).collect();
    let k = names.len();
    let mut values = DMatrix::from_element(k, k, f64::NAN);
    for i in 0..k {
        values[(i, i)] = 1.0;
        for j in (i + 1)..k {
            let (x, y) = aligned.complete_pairs(&names[i], &names[j]);
            let r = if x.len() < MIN_PAIRS {
                f64::NAN
            } else {
                correlate_values(&x, &y, method).0
            };
            values[(i, j)] = r;
            values[(j, i)] = r;
        }
    }
    CorrelationMatrix { names, values }
}
