//! Shared domain types.
//!
//! These types are kept plain and serializable so they can be:
//!
//! - passed between the analysis stages in-memory
//! - exported to JSON alongside the rendered narrative block
//! - asserted on directly in tests

use std::collections::BTreeMap;

use chrono::{Months, NaiveDate};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Significance level used for every `is_significant` flag in the crate.
pub const SIGNIFICANCE_LEVEL: f64 = 0.05;

/// A raw transaction row: field name -> JSON value.
pub type Record = serde_json::Map<String, serde_json::Value>;

/// Bucket size for aggregating raw rows into periods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Monthly,
    Quarterly,
}

impl Frequency {
    /// Number of calendar months in one period.
    pub fn months(self) -> u32 {
        match self {
            Frequency::Monthly => 1,
            Frequency::Quarterly => 3,
        }
    }

    /// Lenient parse: `M`/`monthly` and `Q`/`quarterly`; anything else is monthly.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "q" | "qs" | "qe" | "quarter" | "quarterly" => Frequency::Quarterly,
            _ => Frequency::Monthly,
        }
    }
}

/// How rows falling into the same period are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
    Sum,
    Mean,
    Count,
}

impl Aggregation {
    /// Lenient parse; unrecognized modes aggregate by sum.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "mean" | "avg" | "average" => Aggregation::Mean,
            "count" => Aggregation::Count,
            _ => Aggregation::Sum,
        }
    }
}

/// Correlation coefficient flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CorrelationMethod {
    Pearson,
    Spearman,
}

impl CorrelationMethod {
    /// Lenient parse; unrecognized methods fall back to Pearson.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "spearman" => CorrelationMethod::Spearman,
            _ => CorrelationMethod::Pearson,
        }
    }
}

/// How seasonal and trend components combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SeasonalityMode {
    Additive,
    Multiplicative,
    /// Trend extraction only; the seasonal component is identically zero.
    None,
}

/// Which algorithm produced a decomposition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecompositionMethod {
    /// Loess-based seasonal-trend decomposition.
    Stl,
    /// Centered moving average + per-phase means (fallback).
    MovingAverage,
}

/// Conditional-variance model family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum VolatilityModelKind {
    Arch,
    Garch,
    Egarch,
}

impl VolatilityModelKind {
    pub fn display_name(self) -> &'static str {
        match self {
            VolatilityModelKind::Arch => "ARCH",
            VolatilityModelKind::Garch => "GARCH",
            VolatilityModelKind::Egarch => "EGARCH",
        }
    }
}

/// Conditional-mean specification used before modelling the variance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum MeanModel {
    /// Constant mean (estimated by the sample mean).
    Constant,
    /// Mean fixed at zero.
    Zero,
    /// AR(1) mean estimated by least squares.
    Ar,
}

impl MeanModel {
    /// Number of estimated mean parameters (for information criteria).
    pub fn param_count(self) -> usize {
        match self {
            MeanModel::Constant => 1,
            MeanModel::Zero => 0,
            MeanModel::Ar => 2,
        }
    }
}

/// A period-indexed numeric series.
///
/// Periods are labelled by the first day of their bucket and are strictly
/// increasing. Missing periods are absent, never zero-filled, and values are
/// always finite.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeSeries {
    pub name: String,
    pub frequency: Frequency,
    periods: Vec<NaiveDate>,
    values: Vec<f64>,
}

impl TimeSeries {
    /// Build from an ordered map, dropping non-finite values.
    pub fn from_map(name: impl Into<String>, frequency: Frequency, map: BTreeMap<NaiveDate, f64>) -> Self {
        let (periods, values): (Vec<NaiveDate>, Vec<f64>) =
            map.into_iter().filter(|(_, v)| v.is_finite()).unzip();
        Self {
            name: name.into(),
            frequency,
            periods,
            values,
        }
    }

    /// Build from unordered points. Duplicate periods are rejected.
    pub fn from_points(
        name: impl Into<String>,
        frequency: Frequency,
        points: Vec<(NaiveDate, f64)>,
    ) -> Result<Self, AppError> {
        let name = name.into();
        let mut map = BTreeMap::new();
        for (period, value) in points {
            if map.insert(period, value).is_some() {
                return Err(AppError::malformed(format!(
                    "Series '{name}' has more than one value for period {period}"
                )));
            }
        }
        Ok(Self::from_map(name, frequency, map))
    }

    /// Consecutive periods starting at `start`, one per value.
    pub fn consecutive(name: impl Into<String>, frequency: Frequency, start: NaiveDate, values: &[f64]) -> Self {
        let mut map = BTreeMap::new();
        let mut period = start;
        for &v in values {
            map.insert(period, v);
            match period.checked_add_months(Months::new(frequency.months())) {
                Some(next) => period = next,
                None => break,
            }
        }
        Self::from_map(name, frequency, map)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn periods(&self) -> &[NaiveDate] {
        &self.periods
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn iter(&self) -> impl Iterator<Item = (NaiveDate, f64)> + '_ {
        self.periods.iter().copied().zip(self.values.iter().copied())
    }

    pub fn get(&self, period: NaiveDate) -> Option<f64> {
        self.periods
            .binary_search(&period)
            .ok()
            .map(|idx| self.values[idx])
    }

    pub fn renamed(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Same periods, new values. Lengths must match.
    pub fn with_values(&self, values: Vec<f64>) -> Result<Self, AppError> {
        if values.len() != self.values.len() {
            return Err(AppError::computation(format!(
                "Length mismatch replacing values of '{}': {} != {}",
                self.name,
                values.len(),
                self.values.len()
            )));
        }
        let map = self.periods.iter().copied().zip(values).collect();
        Ok(Self::from_map(self.name.clone(), self.frequency, map))
    }

    /// Move every observation `lag` periods earlier on the calendar, so the
    /// value observed at `t + lag` is paired with `t` when joined.
    pub fn shift_earlier(&self, lag: u32) -> Self {
        if lag == 0 {
            return self.clone();
        }
        let months = Months::new(lag * self.frequency.months());
        let map = self
            .iter()
            .filter_map(|(p, v)| p.checked_sub_months(months).map(|q| (q, v)))
            .collect();
        Self::from_map(self.name.clone(), self.frequency, map)
    }
}

/// Observations two series have in common, in period order.
#[derive(Debug, Clone, Default)]
pub struct JoinedPairs {
    pub periods: Vec<NaiveDate>,
    pub left: Vec<f64>,
    pub right: Vec<f64>,
}

impl JoinedPairs {
    pub fn len(&self) -> usize {
        self.periods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.periods.is_empty()
    }
}

/// Inner-join two series on their common periods.
pub fn inner_join(left: &TimeSeries, right: &TimeSeries) -> JoinedPairs {
    let mut out = JoinedPairs::default();
    let (mut i, mut j) = (0, 0);
    while i < left.periods.len() && j < right.periods.len() {
        match left.periods[i].cmp(&right.periods[j]) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                out.periods.push(left.periods[i]);
                out.left.push(left.values[i]);
                out.right.push(right.values[j]);
                i += 1;
                j += 1;
            }
        }
    }
    out
}

/// Trend/seasonal/residual split of a series.
#[derive(Debug, Clone, Serialize)]
pub struct SeasonalDecomposition {
    pub periods: Vec<NaiveDate>,
    pub original: Vec<f64>,
    pub trend: Vec<f64>,
    pub seasonal: Vec<f64>,
    pub residual: Vec<f64>,
    pub mode: SeasonalityMode,
    pub method: DecompositionMethod,
    /// Seasonal cycle length in periods (12 for monthly data).
    pub period: usize,
    /// Share of non-trend variance explained by the seasonal component, in `[0, 1]`.
    pub seasonal_strength: f64,
    pub interpretation: String,
}

/// Best-lag correlation of one account against the target series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationEntry {
    pub account_name: String,
    pub account_number: String,
    pub correlation: f64,
    pub p_value: f64,
    pub is_significant: bool,
    /// Periods the account series was shifted earlier (0 = same period).
    pub lag_months: usize,
    pub interpretation: String,
}

/// Ranked correlations of every account against the target series.
#[derive(Debug, Clone, Serialize)]
pub struct CorrelationAnalysis {
    pub target_variable: String,
    /// Sorted by `|correlation|` descending.
    pub correlations: Vec<CorrelationEntry>,
    pub top_positive: Vec<CorrelationEntry>,
    pub top_negative: Vec<CorrelationEntry>,
    pub seasonally_adjusted: bool,
    pub period_count: usize,
    pub summary: String,
}

impl CorrelationAnalysis {
    pub fn empty(
        target_variable: impl Into<String>,
        seasonally_adjusted: bool,
        period_count: usize,
        summary: impl Into<String>,
    ) -> Self {
        Self {
            target_variable: target_variable.into(),
            correlations: Vec::new(),
            top_positive: Vec::new(),
            top_negative: Vec::new(),
            seasonally_adjusted,
            period_count,
            summary: summary.into(),
        }
    }
}

/// Single-regressor OLS estimate with inference.
#[derive(Debug, Clone, Serialize)]
pub struct RegressionResult {
    pub dependent_var: String,
    pub independent_var: String,
    pub coefficient: f64,
    pub std_error: f64,
    pub t_statistic: f64,
    pub p_value: f64,
    pub r_squared: f64,
    pub adj_r_squared: f64,
    pub confidence_interval_95: (f64, f64),
    pub observations: usize,
    pub is_significant: bool,
    pub interpretation: String,
}

/// Fitted conditional-variance model.
#[derive(Debug, Clone, Serialize)]
pub struct VolatilityResult {
    pub model: VolatilityModelKind,
    pub mean_model: MeanModel,
    /// ARCH order `p`.
    pub arch_order: usize,
    /// GARCH order `q` (0 for pure ARCH).
    pub garch_order: usize,
    pub conditional_volatility: Vec<f64>,
    pub unconditional_variance: f64,
    pub arch_params: BTreeMap<String, f64>,
    pub garch_params: BTreeMap<String, f64>,
    pub aic: f64,
    pub bic: f64,
    pub log_likelihood: f64,
    pub ljung_box_p_value: f64,
    pub interpretation: String,
    pub forecast: Option<Vec<f64>>,
}

impl VolatilityResult {
    /// Order label such as `ARCH(1)` or `GARCH(1,1)`.
    pub fn model_label(&self) -> String {
        match self.model {
            VolatilityModelKind::Arch => format!("ARCH({})", self.arch_order),
            kind => format!("{}({},{})", kind.display_name(), self.arch_order, self.garch_order),
        }
    }
}

/// Everything one orchestrated analysis produced.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub correlation: CorrelationAnalysis,
    /// Decompositions in analysis order: target first, then ranked accounts.
    pub seasonality: Vec<(String, SeasonalDecomposition)>,
    pub volatility: Option<VolatilityResult>,
    /// Regressions of the target on significant accounts, in ranking order.
    pub regressions: Vec<(String, RegressionResult)>,
    /// Diagnostics from stages that were skipped or failed.
    pub notes: Vec<String>,
    pub summary: String,
    /// Rendered block handed verbatim to the narrative step.
    pub narrative_context: String,
}

impl AnalysisReport {
    pub fn seasonality_for(&self, name: &str) -> Option<&SeasonalDecomposition> {
        self.seasonality.iter().find(|(n, _)| n == name).map(|(_, d)| d)
    }

    pub fn regression_for(&self, name: &str) -> Option<&RegressionResult> {
        self.regressions.iter().find(|(n, _)| n == name).map(|(_, r)| r)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ym(y: i32, m: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, 1).unwrap()
    }

    #[test]
    fn from_points_sorts_and_rejects_duplicates() {
        let s = TimeSeries::from_points(
            "s",
            Frequency::Monthly,
            vec![(ym(2024, 3), 3.0), (ym(2024, 1), 1.0), (ym(2024, 2), f64::NAN)],
        )
        .unwrap();
        assert_eq!(s.periods(), &[ym(2024, 1), ym(2024, 3)]);
        assert_eq!(s.values(), &[1.0, 3.0]);

        let dup = TimeSeries::from_points(
            "d",
            Frequency::Monthly,
            vec![(ym(2024, 1), 1.0), (ym(2024, 1), 2.0)],
        );
        assert!(dup.is_err());
    }

    #[test]
    fn shift_earlier_restamps_by_calendar_periods() {
        let s = TimeSeries::consecutive("s", Frequency::Monthly, ym(2024, 1), &[1.0, 2.0, 3.0]);
        let shifted = s.shift_earlier(1);
        assert_eq!(shifted.periods(), &[ym(2023, 12), ym(2024, 1), ym(2024, 2)]);
        assert_eq!(shifted.get(ym(2024, 1)), Some(2.0));

        let q = TimeSeries::consecutive("q", Frequency::Quarterly, ym(2024, 2), &[1.0, 2.0]);
        assert_eq!(q.periods(), &[ym(2024, 2), ym(2024, 5)]);
        assert_eq!(q.shift_earlier(1).get(ym(2024, 2)), Some(2.0));
    }

    #[test]
    fn inner_join_keeps_common_periods_only() {
        let a = TimeSeries::consecutive("a", Frequency::Monthly, ym(2024, 1), &[1.0, 2.0, 3.0, 4.0]);
        let b = TimeSeries::consecutive("b", Frequency::Monthly, ym(2024, 3), &[30.0, 40.0, 50.0]);
        let joined = inner_join(&a, &b);
        assert_eq!(joined.periods, vec![ym(2024, 3), ym(2024, 4)]);
        assert_eq!(joined.left, vec![3.0, 4.0]);
        assert_eq!(joined.right, vec![30.0, 40.0]);
    }

    #[test]
    fn lenient_parsers_fall_back_to_defaults() {
        assert_eq!(Aggregation::parse("median"), Aggregation::Sum);
        assert_eq!(Aggregation::parse("COUNT"), Aggregation::Count);
        assert_eq!(Frequency::parse("Q"), Frequency::Quarterly);
        assert_eq!(Frequency::parse("W"), Frequency::Monthly);
        assert_eq!(CorrelationMethod::parse("kendall"), CorrelationMethod::Pearson);
    }
}
