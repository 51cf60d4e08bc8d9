//! Analysis orchestration.
//!
//! `StatisticalAnalyzer` is an explicitly constructed, immutable service: it
//! holds the fiscal calendar and the negotiated capabilities, and every
//! operation borrows it immutably, so one instance can serve concurrent
//! callers. Single operations fail loudly (insufficient data, malformed
//! input, capability unavailable); the full revenue analysis runs each
//! secondary stage best-effort and reports what it could compute.

pub mod stage;

use std::collections::BTreeMap;

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::config::{AnalyzerConfig, Capabilities};
use crate::correlation::{
    self, CorrelationMatrix, CorrelationOptions, MIN_ADJUST_OBSERVATIONS, correlate_ledger,
};
use crate::domain::{
    AnalysisReport, CorrelationAnalysis, CorrelationMethod, MeanModel, Record, RegressionResult,
    SeasonalDecomposition, SeasonalityMode, TimeSeries, VolatilityResult,
};
use crate::error::AppError;
use crate::regression;
use crate::report;
use crate::seasonal::{self, MONTHLY_PERIOD};
use crate::series::{
    self, AlignedSeriesSet, FiscalCalendar, LedgerLayout, LedgerSeries, REVENUE_SERIES, SeriesSpec,
};
use crate::volatility::{self, ArchTest, DEFAULT_ARCH_LAGS, MIN_FIT_OBSERVATIONS, VolatilitySpec};

pub use stage::{StageOutcome, best_effort};

/// Per-call knobs for [`StatisticalAnalyzer::full_revenue_correlation_analysis`].
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisOptions {
    pub layout: LedgerLayout,
    pub seasonally_adjust: bool,
    pub include_volatility: bool,
    pub max_lag: usize,
    /// Accounts per side (positive / negative) carried into later stages.
    pub top_n: usize,
    pub method: CorrelationMethod,
    pub forecast_horizon: usize,
    pub arch_lags: usize,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            layout: LedgerLayout::default(),
            seasonally_adjust: true,
            include_volatility: true,
            max_lag: 3,
            top_n: 10,
            method: CorrelationMethod::Pearson,
            forecast_horizon: 6,
            arch_lags: DEFAULT_ARCH_LAGS,
        }
    }
}

impl AnalysisOptions {
    pub fn correlation_options(&self) -> CorrelationOptions {
        CorrelationOptions {
            seasonally_adjust: self.seasonally_adjust,
            max_lag: self.max_lag,
            method: self.method,
        }
    }
}

#[derive(Debug, Clone)]
pub struct StatisticalAnalyzer {
    config: AnalyzerConfig,
    calendar: FiscalCalendar,
}

impl StatisticalAnalyzer {
    pub fn new(config: AnalyzerConfig) -> Result<Self, AppError> {
        let calendar = FiscalCalendar::new(config.fiscal_start_month)?;
        debug!(
            fiscal_start_month = config.fiscal_start_month,
            missing = ?config.capabilities.missing(),
            "statistical analyzer ready"
        );
        Ok(Self { config, calendar })
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    pub fn calendar(&self) -> &FiscalCalendar {
        &self.calendar
    }

    pub fn capabilities(&self) -> Capabilities {
        self.config.capabilities
    }

    fn require(&self, capability: &'static str) -> Result<(), AppError> {
        if self.config.capabilities.is_enabled(capability) {
            Ok(())
        } else {
            Err(AppError::CapabilityUnavailable {
                capability,
                reason: "disabled by configuration".to_string(),
            })
        }
    }

    // -- time series ------------------------------------------------------

    pub fn prepare_time_series(&self, rows: &[Record], spec: &SeriesSpec) -> BTreeMap<String, TimeSeries> {
        series::prepare_time_series(rows, spec, &self.calendar)
    }

    pub fn align_series(
        &self,
        series: &BTreeMap<String, TimeSeries>,
        min_observations: usize,
    ) -> (AlignedSeriesSet, Vec<String>) {
        series::align_series(series, min_observations)
    }

    // -- seasonality ------------------------------------------------------

    pub fn decompose_seasonality(
        &self,
        series: &TimeSeries,
        period: usize,
        mode: SeasonalityMode,
    ) -> Result<SeasonalDecomposition, AppError> {
        self.require("seasonal")?;
        seasonal::decompose_seasonality(series, period, mode)
    }

    pub fn seasonally_adjust(&self, series: &TimeSeries, period: usize) -> Result<TimeSeries, AppError> {
        self.require("seasonal")?;
        seasonal::seasonally_adjust(series, period)
    }

    pub fn detect_seasonality_strength(&self, series: &TimeSeries, period: usize) -> Result<(f64, String), AppError> {
        self.require("seasonal")?;
        Ok(seasonal::detect_seasonality_strength(series, period))
    }

    // -- correlation ------------------------------------------------------

    pub fn compute_correlation(
        &self,
        x: &TimeSeries,
        y: &TimeSeries,
        method: CorrelationMethod,
    ) -> Result<(f64, f64), AppError> {
        self.require("correlation")?;
        Ok(correlation::compute_correlation(x, y, method))
    }

    pub fn correlate_accounts_with_revenue(
        &self,
        rows: &[Record],
        options: &AnalysisOptions,
    ) -> Result<CorrelationAnalysis, AppError> {
        self.require("correlation")?;
        let ledger = LedgerSeries::build(rows, &options.layout, &self.calendar);
        Ok(correlate_ledger(&ledger, &self.effective_correlation_options(options)))
    }

    pub fn correlation_matrix(
        &self,
        series: &BTreeMap<String, TimeSeries>,
        method: CorrelationMethod,
    ) -> Result<CorrelationMatrix, AppError> {
        self.require("correlation")?;
        Ok(correlation::correlation_matrix(series, method))
    }

    // -- regression -------------------------------------------------------

    pub fn simple_regression(
        &self,
        y: &TimeSeries,
        x: &TimeSeries,
        add_constant: bool,
    ) -> Result<RegressionResult, AppError> {
        self.require("regression")?;
        regression::simple_regression(y, x, add_constant)
    }

    pub fn regression_with_seasonality(
        &self,
        y: &TimeSeries,
        x: &TimeSeries,
        seasonal_period: usize,
    ) -> Result<RegressionResult, AppError> {
        self.require("regression")?;
        regression::regression_with_seasonality(y, x, seasonal_period, &self.calendar)
    }

    // -- volatility -------------------------------------------------------

    pub fn detect_arch_effects(&self, series: &TimeSeries, lags: usize) -> Result<ArchTest, AppError> {
        self.require("volatility")?;
        Ok(volatility::detect_arch_effects(series, lags))
    }

    pub fn fit_arch_model(
        &self,
        series: &TimeSeries,
        p: usize,
        q: usize,
        mean_model: MeanModel,
    ) -> Result<VolatilityResult, AppError> {
        self.require("volatility")?;
        volatility::fit_arch_model(series, p, q, mean_model)
    }

    pub fn fit_volatility_model(&self, series: &TimeSeries, spec: &VolatilitySpec) -> Result<VolatilityResult, AppError> {
        self.require("volatility")?;
        volatility::fit_volatility_model(series, spec)
    }

    pub fn volatility_forecast(&self, result: &VolatilityResult, horizon: usize) -> Result<Vec<f64>, AppError> {
        self.require("volatility")?;
        Ok(volatility::volatility_forecast(result, horizon))
    }

    // -- orchestration ----------------------------------------------------

    /// Seasonal adjustment inside the correlation search needs the seasonal
    /// capability; without it the search runs on raw series.
    fn effective_correlation_options(&self, options: &AnalysisOptions) -> CorrelationOptions {
        CorrelationOptions {
            seasonally_adjust: options.seasonally_adjust && self.config.capabilities.seasonal,
            ..options.correlation_options()
        }
    }

    /// Rank every expense account against revenue, then decompose, model and
    /// regress the strongest drivers.
    ///
    /// Never fails: stage failures become `notes`, and an analyzer without
    /// the correlation capability returns an empty report explaining why.
    pub fn full_revenue_correlation_analysis(&self, rows: &[Record], options: &AnalysisOptions) -> AnalysisReport {
        let caps = self.config.capabilities;
        if !caps.correlation {
            return unavailable_report(&caps.missing(), options.seasonally_adjust);
        }

        let mut notes = Vec::new();
        let correlation_options = self.effective_correlation_options(options);
        if options.seasonally_adjust && !correlation_options.seasonally_adjust {
            notes.push("Seasonal adjustment skipped: seasonal capability unavailable".to_string());
        }

        let ledger = LedgerSeries::build(rows, &options.layout, &self.calendar);
        let correlation = correlate_ledger(&ledger, &correlation_options);

        let seasonality = self.seasonality_stage(&ledger, &correlation, options, &mut notes);
        let volatility = self.volatility_stage(&ledger, options, &mut notes);
        let regressions = self.regression_stage(&ledger, &correlation, options, &mut notes);

        let mut report = AnalysisReport {
            correlation,
            seasonality,
            volatility,
            regressions,
            notes,
            summary: String::new(),
            narrative_context: String::new(),
        };
        report.summary = report::executive_summary(&report);
        report.narrative_context = report::render_narrative_context(&report);

        info!(
            accounts = report.correlation.correlations.len(),
            decompositions = report.seasonality.len(),
            regressions = report.regressions.len(),
            volatility = report.volatility.is_some(),
            notes = report.notes.len(),
            "revenue analysis complete"
        );
        report
    }

    fn seasonality_stage(
        &self,
        ledger: &LedgerSeries,
        correlation: &CorrelationAnalysis,
        options: &AnalysisOptions,
        notes: &mut Vec<String>,
    ) -> Vec<(String, SeasonalDecomposition)> {
        if correlation.correlations.is_empty() {
            return Vec::new();
        }
        if !self.config.capabilities.seasonal {
            notes.push("Seasonality analysis skipped: seasonal capability unavailable".to_string());
            return Vec::new();
        }

        let mut targets: Vec<(&str, &TimeSeries)> = Vec::new();
        if let Some(revenue) = ledger.revenue.as_ref() {
            targets.push((REVENUE_SERIES, revenue));
        }
        let ranked = correlation
            .top_positive
            .iter()
            .take(options.top_n)
            .chain(correlation.top_negative.iter().take(options.top_n));
        for entry in ranked {
            if let Some(series) = ledger.expenses.get(&entry.account_name) {
                targets.push((entry.account_name.as_str(), series));
            }
        }
        targets.retain(|(name, series)| {
            let long_enough = series.len() >= MIN_ADJUST_OBSERVATIONS;
            if !long_enough {
                debug!(series = %name, len = series.len(), "too short for decomposition; skipped");
            }
            long_enough
        });

        let outcomes: Vec<(String, StageOutcome<SeasonalDecomposition>)> = targets
            .par_iter()
            .map(|(name, series)| {
                let outcome = best_effort(&format!("seasonality '{name}'"), || {
                    seasonal::decompose_seasonality(series, MONTHLY_PERIOD, SeasonalityMode::Additive)
                });
                (name.to_string(), outcome)
            })
            .collect();

        outcomes
            .into_iter()
            .filter_map(|(name, outcome)| outcome.merge_into(notes).map(|d| (name, d)))
            .collect()
    }

    fn volatility_stage(
        &self,
        ledger: &LedgerSeries,
        options: &AnalysisOptions,
        notes: &mut Vec<String>,
    ) -> Option<VolatilityResult> {
        if !options.include_volatility {
            return None;
        }
        if !self.config.capabilities.volatility {
            notes.push("Volatility modeling skipped: volatility capability unavailable".to_string());
            return None;
        }
        let revenue = ledger.revenue.as_ref()?;

        let test = volatility::detect_arch_effects(revenue, options.arch_lags);
        if !test.has_effects {
            debug!(p_value = test.p_value, "no ARCH effects in revenue; volatility model not fitted");
            return None;
        }
        if revenue.len() < MIN_FIT_OBSERVATIONS {
            debug!(
                len = revenue.len(),
                required = MIN_FIT_OBSERVATIONS,
                "ARCH effects present but revenue too short to fit"
            );
            return None;
        }

        let mut result = best_effort("volatility model", || {
            volatility::fit_arch_model(revenue, 1, 1, MeanModel::Constant)
        })
        .merge_into(notes)?;
        result.forecast = Some(volatility::volatility_forecast(&result, options.forecast_horizon));
        Some(result)
    }

    fn regression_stage(
        &self,
        ledger: &LedgerSeries,
        correlation: &CorrelationAnalysis,
        options: &AnalysisOptions,
        notes: &mut Vec<String>,
    ) -> Vec<(String, RegressionResult)> {
        if correlation.correlations.is_empty() {
            return Vec::new();
        }
        if !self.config.capabilities.regression {
            notes.push("Regression analysis skipped: regression capability unavailable".to_string());
            return Vec::new();
        }
        let Some(revenue) = ledger.revenue.as_ref() else {
            return Vec::new();
        };

        let targets: Vec<(&str, &TimeSeries)> = correlation
            .top_positive
            .iter()
            .take(options.top_n)
            .filter(|entry| entry.is_significant)
            .filter_map(|entry| {
                ledger
                    .expenses
                    .get(&entry.account_name)
                    .map(|series| (entry.account_name.as_str(), series))
            })
            .collect();

        let outcomes: Vec<(String, StageOutcome<RegressionResult>)> = targets
            .par_iter()
            .map(|(name, series)| {
                let with_seasonality = options.seasonally_adjust && series.len() >= MIN_ADJUST_OBSERVATIONS;
                let outcome = best_effort(&format!("regression '{name}'"), || {
                    if with_seasonality {
                        regression::regression_with_seasonality(revenue, series, MONTHLY_PERIOD, &self.calendar)
                    } else {
                        regression::simple_regression(revenue, series, true)
                    }
                });
                (name.to_string(), outcome)
            })
            .collect();

        outcomes
            .into_iter()
            .filter_map(|(name, outcome)| outcome.merge_into(notes).map(|r| (name, r)))
            .collect()
    }
}

fn unavailable_report(missing: &[&'static str], seasonally_adjusted: bool) -> AnalysisReport {
    let list = missing.join(", ");
    warn!(missing = %list, "statistical analysis unavailable");
    AnalysisReport {
        correlation: CorrelationAnalysis::empty(
            REVENUE_SERIES,
            seasonally_adjusted,
            0,
            format!("Statistical analysis requires the correlation capability (missing: {list})"),
        ),
        seasonality: Vec::new(),
        volatility: None,
        regressions: Vec::new(),
        notes: vec![format!("Capabilities unavailable: {list}")],
        summary: format!("Statistical analysis disabled - missing capabilities ({list})"),
        narrative_context: report::unavailable_context(missing),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::sample::{SampleConfig, generate_ledger};
    use crate::error::ErrorKind;
    use chrono::NaiveDate;

    fn analyzer(capabilities: Capabilities) -> StatisticalAnalyzer {
        StatisticalAnalyzer::new(AnalyzerConfig::default().with_capabilities(capabilities)).unwrap()
    }

    fn sample_rows() -> Vec<Record> {
        generate_ledger(&SampleConfig::default()).unwrap()
    }

    #[test]
    fn full_analysis_on_sample_ledger() {
        let rows = sample_rows();
        let report = analyzer(Capabilities::detect()).full_revenue_correlation_analysis(&rows, &AnalysisOptions::default());

        let corr = &report.correlation;
        assert_eq!(corr.target_variable, "Revenue");
        assert!(corr.seasonally_adjusted);
        assert_eq!(corr.period_count, SampleConfig::default().months);
        assert_eq!(corr.correlations.len(), 6);

        let commissions = corr
            .correlations
            .iter()
            .find(|c| c.account_name == "Sales Commissions")
            .unwrap();
        let noise = corr
            .correlations
            .iter()
            .find(|c| c.account_name == "Office Supplies")
            .unwrap();
        assert!(commissions.is_significant);
        assert!(commissions.correlation > 0.0);
        assert!(commissions.correlation.abs() > noise.correlation.abs());
        assert_eq!(commissions.account_number, "531110");

        assert!(report.seasonality_for("Revenue").is_some());
        let regression = report.regression_for("Sales Commissions").unwrap();
        assert_eq!(regression.dependent_var, "Revenue");
        assert!(regression.coefficient > 0.0);

        assert!(report.narrative_context.starts_with("## Correlation Analysis Results"));
        assert!(report.narrative_context.contains("## Seasonality Analysis"));
        assert!(report.narrative_context.contains("## Regression Analysis Results"));
        assert!(report.summary.contains("Seasonality analyzed for"));
    }

    #[test]
    fn clustered_revenue_gets_garch_model_and_forecast() {
        let rows = generate_ledger(&SampleConfig {
            months: 72,
            ..SampleConfig::default()
        })
        .unwrap();
        let report = analyzer(Capabilities::detect()).full_revenue_correlation_analysis(&rows, &AnalysisOptions::default());

        let vol = report.volatility.as_ref().expect("volatility model fitted");
        assert_eq!(vol.model_label(), "GARCH(1,1)");
        let forecast = vol.forecast.as_ref().expect("forecast attached");
        assert_eq!(forecast.len(), AnalysisOptions::default().forecast_horizon);
        assert!(forecast.iter().all(|v| *v == vol.unconditional_variance));

        let text = &report.narrative_context;
        assert!(text.contains("## Volatility (ARCH) Analysis\nModel: GARCH(1,1)"), "{text}");
        assert!(text.contains("Variance forecast (6 periods, flat at unconditional level)"));

        let without = AnalysisOptions {
            include_volatility: false,
            ..AnalysisOptions::default()
        };
        let report = analyzer(Capabilities::detect()).full_revenue_correlation_analysis(&rows, &without);
        assert!(report.volatility.is_none());
        assert!(!report.narrative_context.contains("## Volatility (ARCH) Analysis"));
    }

    #[test]
    fn missing_correlation_capability_yields_explanatory_report() {
        let report = analyzer(Capabilities::none()).full_revenue_correlation_analysis(&sample_rows(), &AnalysisOptions::default());
        assert!(report.correlation.correlations.is_empty());
        assert!(report.seasonality.is_empty());
        assert!(report.volatility.is_none());
        assert!(report.regressions.is_empty());
        assert_eq!(
            report.summary,
            "Statistical analysis disabled - missing capabilities (correlation, seasonal, regression, volatility)"
        );
        assert!(report.narrative_context.starts_with("## Statistical Analysis Unavailable"));
    }

    #[test]
    fn reduced_capabilities_skip_stages_with_notes() {
        let caps = Capabilities::detect().without("regression").unwrap().without("volatility").unwrap();
        let report = analyzer(caps).full_revenue_correlation_analysis(&sample_rows(), &AnalysisOptions::default());
        assert!(!report.correlation.correlations.is_empty());
        assert!(!report.seasonality.is_empty());
        assert!(report.regressions.is_empty());
        assert!(report.volatility.is_none());
        assert!(report.notes.iter().any(|n| n.contains("regression capability")));
        assert!(report.notes.iter().any(|n| n.contains("volatility capability")));
    }

    #[test]
    fn short_accounts_do_not_block_other_stages() {
        let mut rows = sample_rows();
        // An account with only three months of history.
        for month in 1..=3u32 {
            let mut row = Record::new();
            row.insert("account_name".into(), "One-off Consulting".into());
            row.insert("account_number".into(), "655000".into());
            row.insert("amount".into(), (50_000.0 * month as f64).into());
            row.insert(
                "formuladate".into(),
                NaiveDate::from_ymd_opt(2021, month + 1, 15).unwrap().to_string().into(),
            );
            rows.push(row);
        }
        let report = analyzer(Capabilities::detect()).full_revenue_correlation_analysis(&rows, &AnalysisOptions::default());
        assert!(report.seasonality_for("One-off Consulting").is_none());
        assert!(report.seasonality_for("Revenue").is_some());
        assert!(report.regression_for("Sales Commissions").is_some());
    }

    #[test]
    fn empty_input_reports_no_data() {
        let report = analyzer(Capabilities::detect()).full_revenue_correlation_analysis(&[], &AnalysisOptions::default());
        assert_eq!(report.correlation.summary, "No data provided");
        assert!(report.seasonality.is_empty());
        assert_eq!(report.summary, "No data provided");
    }

    #[test]
    fn gated_operations_report_capability_kind() {
        let caps = Capabilities::detect().without("seasonal").unwrap();
        let a = analyzer(caps);
        let series = TimeSeries::consecutive(
            "x",
            crate::domain::Frequency::Monthly,
            NaiveDate::from_ymd_opt(2022, 1, 1).unwrap(),
            &[1.0; 30],
        );
        let err = a.seasonally_adjust(&series, 12).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CapabilityUnavailable);
        assert_eq!(err.exit_code(), 5);
        assert!(a.compute_correlation(&series, &series, CorrelationMethod::Pearson).is_ok());
    }

    #[test]
    fn invalid_fiscal_month_is_rejected() {
        let err = StatisticalAnalyzer::new(AnalyzerConfig::default().with_fiscal_start_month(0)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedInput);
    }
}
