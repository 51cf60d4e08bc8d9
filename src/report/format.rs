//! Text rendering of analysis results.
//!
//! Two audiences:
//! - the narrative step, which receives `render_narrative_context` verbatim
//!   (fixed section headings, 3-decimal coefficients, 4-decimal p-values,
//!   `***` on entries significant at p<0.05)
//! - a terminal user, who gets the fixed-width tables

use crate::domain::{AnalysisReport, CorrelationAnalysis, CorrelationEntry};

/// Entries listed per section of the narrative block.
pub const NARRATIVE_SECTION_LIMIT: usize = 10;

fn significance_marker(significant: bool) -> &'static str {
    if significant { "***" } else { "" }
}

/// One sentence per stage that produced output.
pub fn executive_summary(report: &AnalysisReport) -> String {
    let mut parts: Vec<String> = Vec::new();
    if !report.correlation.summary.is_empty() {
        parts.push(report.correlation.summary.clone());
    }
    if !report.seasonality.is_empty() {
        parts.push(format!("Seasonality analyzed for {} series.", report.seasonality.len()));
    }
    if let Some(vol) = &report.volatility {
        parts.push(format!(
            "ARCH/GARCH volatility modeling completed: {}",
            vol.interpretation
        ));
    }
    if !report.regressions.is_empty() {
        parts.push(format!(
            "Regression analysis completed for {} top accounts.",
            report.regressions.len()
        ));
    }
    if parts.is_empty() {
        "Analysis completed.".to_string()
    } else {
        parts.join(" ")
    }
}

fn push_correlation_entries(lines: &mut Vec<String>, heading: &str, entries: &[CorrelationEntry]) {
    if entries.is_empty() {
        return;
    }
    lines.push(heading.to_string());
    for (i, e) in entries.iter().take(NARRATIVE_SECTION_LIMIT).enumerate() {
        let lag = if e.lag_months > 0 {
            format!(" (lag {}mo)", e.lag_months)
        } else {
            String::new()
        };
        lines.push(format!(
            "{}. {}: r={:.3}{} (p={:.4}){lag}",
            i + 1,
            e.account_name,
            e.correlation,
            significance_marker(e.is_significant),
            e.p_value
        ));
    }
    lines.push(String::new());
}

/// Multi-section grounding block for narrative generation.
pub fn render_narrative_context(report: &AnalysisReport) -> String {
    let mut lines: Vec<String> = Vec::new();

    let corr = &report.correlation;
    lines.push("## Correlation Analysis Results".to_string());
    lines.push(format!("Target Variable: {}", corr.target_variable));
    lines.push(format!(
        "Seasonally Adjusted: {}",
        if corr.seasonally_adjusted { "Yes" } else { "No" }
    ));
    lines.push(format!("Periods Analyzed: {}", corr.period_count));
    lines.push(String::new());
    push_correlation_entries(
        &mut lines,
        "### Top Positive Correlations (Higher expense → Higher revenue):",
        &corr.top_positive,
    );
    push_correlation_entries(
        &mut lines,
        "### Top Negative Correlations (Higher expense → Lower revenue):",
        &corr.top_negative,
    );
    lines.push("Note: *** indicates statistical significance at p<0.05".to_string());
    lines.push(String::new());

    if !report.seasonality.is_empty() {
        lines.push("## Seasonality Analysis".to_string());
        for (name, d) in report.seasonality.iter().take(NARRATIVE_SECTION_LIMIT) {
            lines.push(format!(
                "- {name}: Seasonal strength = {:.2} - {}",
                d.seasonal_strength, d.interpretation
            ));
        }
        lines.push(String::new());
    }

    if let Some(vol) = &report.volatility {
        lines.push("## Volatility (ARCH) Analysis".to_string());
        lines.push(format!("Model: {}", vol.model_label()));
        lines.push(format!("Unconditional Variance: {:.4}", vol.unconditional_variance));
        lines.push(format!("AIC: {:.2}, BIC: {:.2}", vol.aic, vol.bic));
        lines.push(vol.interpretation.clone());
        if let Some(forecast) = vol.forecast.as_ref().filter(|f| !f.is_empty()) {
            lines.push(format!(
                "Variance forecast ({} periods, flat at unconditional level): {:.4}",
                forecast.len(),
                forecast[0]
            ));
        }
        lines.push(String::new());
    }

    if !report.regressions.is_empty() {
        lines.push("## Regression Analysis Results".to_string());
        for (name, r) in report.regressions.iter().take(NARRATIVE_SECTION_LIMIT) {
            lines.push(format!(
                "- {name}: coefficient={:.3}{}, R²={:.3}, p={:.4}",
                r.coefficient,
                significance_marker(r.is_significant),
                r.r_squared,
                r.p_value
            ));
            lines.push(format!("  {}", r.interpretation));
        }
        lines.push(String::new());
    }

    lines.join("\n").trim_end().to_string()
}

/// Block returned when the analyzer lacks the capabilities to run at all.
pub fn unavailable_context(missing: &[&str]) -> String {
    let mut out = String::new();
    out.push_str("## Statistical Analysis Unavailable\n\n");
    out.push_str(&format!(
        "The analyzer was configured without: {}.\n\n",
        missing.join(", ")
    ));
    out.push_str("With every capability enabled the system can perform:\n");
    out.push_str("- Correlation analysis between expense accounts and revenue\n");
    out.push_str("- Seasonality decomposition and adjustment\n");
    out.push_str("- ARCH/GARCH volatility modeling\n");
    out.push_str("- Regression analysis with statistical significance testing");
    out
}

/// Ranked correlation table for the terminal.
pub fn format_correlation_table(analysis: &CorrelationAnalysis, top_n: usize) -> String {
    let mut out = String::new();
    out.push_str(
        format!(
            "{:<4} {:<36} {:<10} {:>8} {:>8} {:>4} {:<4}\n",
            "rank", "account", "number", "r", "p", "lag", "sig"
        )
        .trim_end(),
    );
    out.push('\n');
    out.push_str(format!("{:-<4} {:-<36} {:-<10} {:-<8} {:-<8} {:-<4} {:-<4}\n", "", "", "", "", "", "", "").trim_end());
    out.push('\n');

    for (i, e) in analysis.correlations.iter().take(top_n).enumerate() {
        out.push_str(
            format!(
                "{:<4} {:<36} {:<10} {:>8.3} {:>8.4} {:>4} {:<4}\n",
                i + 1,
                truncate(&e.account_name, 36),
                truncate(&e.account_number, 10),
                e.correlation,
                e.p_value,
                e.lag_months,
                significance_marker(e.is_significant),
            )
            .trim_end(),
        );
        out.push('\n');
    }
    out
}

/// Header block for the `analyze` command.
pub fn format_run_summary(report: &AnalysisReport) -> String {
    let corr = &report.correlation;
    let mut out = String::new();
    out.push_str("=== finstat - revenue driver analysis ===\n");
    out.push_str(&format!(
        "Periods: {} | accounts ranked: {} | significant: {}\n",
        corr.period_count,
        corr.correlations.len(),
        corr.correlations.iter().filter(|c| c.is_significant).count()
    ));
    out.push_str(&format!(
        "Decompositions: {} | regressions: {} | volatility: {}\n",
        report.seasonality.len(),
        report.regressions.len(),
        report
            .volatility
            .as_ref()
            .map_or_else(|| "not fitted".to_string(), |v| v.model_label())
    ));
    if !report.notes.is_empty() {
        out.push_str("\nNotes:\n");
        for note in &report.notes {
            out.push_str(&format!("- {note}\n"));
        }
    }
    out.push('\n');
    out.push_str(&format!("Summary: {}\n", report.summary));
    out
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('.');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use crate::domain::{
        DecompositionMethod, MeanModel, RegressionResult, SeasonalDecomposition, SeasonalityMode, VolatilityModelKind,
        VolatilityResult,
    };

    fn entry(name: &str, r: f64, p: f64, lag: usize) -> CorrelationEntry {
        CorrelationEntry {
            account_name: name.to_string(),
            account_number: "500".to_string(),
            correlation: r,
            p_value: p,
            is_significant: p < 0.05,
            lag_months: lag,
            interpretation: String::new(),
        }
    }

    fn report() -> AnalysisReport {
        let pos = entry("Commissions", 0.91234, 0.00001, 1);
        let neg = entry("Discounts", -0.5, 0.2, 0);
        let mut correlation = CorrelationAnalysis::empty("Revenue", true, 36, "Analyzed 2 expense accounts against revenue.");
        correlation.correlations = vec![pos.clone(), neg.clone()];
        correlation.top_positive = vec![pos];
        correlation.top_negative = vec![neg];

        let decomposition = SeasonalDecomposition {
            periods: Vec::new(),
            original: Vec::new(),
            trend: Vec::new(),
            seasonal: Vec::new(),
            residual: Vec::new(),
            mode: SeasonalityMode::Additive,
            method: DecompositionMethod::Stl,
            period: 12,
            seasonal_strength: 0.8123,
            interpretation: "Strong seasonality (strength=0.81). Seasonal component explains most variance.".to_string(),
        };
        let regression = RegressionResult {
            dependent_var: "Revenue".to_string(),
            independent_var: "Commissions".to_string(),
            coefficient: 3.14159,
            std_error: 0.1,
            t_statistic: 31.4,
            p_value: 0.0,
            r_squared: 0.9,
            adj_r_squared: 0.89,
            confidence_interval_95: (2.9, 3.3),
            observations: 36,
            is_significant: true,
            interpretation: "Strong positive relationship.".to_string(),
        };

        AnalysisReport {
            correlation,
            seasonality: vec![("Revenue".to_string(), decomposition)],
            volatility: None,
            regressions: vec![("Commissions".to_string(), regression)],
            notes: Vec::new(),
            summary: String::new(),
            narrative_context: String::new(),
        }
    }

    #[test]
    fn narrative_block_uses_fixed_headings_and_precision() {
        let text = render_narrative_context(&report());
        assert!(text.starts_with("## Correlation Analysis Results\nTarget Variable: Revenue\nSeasonally Adjusted: Yes\nPeriods Analyzed: 36"));
        assert!(text.contains("1. Commissions: r=0.912*** (p=0.0000) (lag 1mo)"));
        assert!(text.contains("1. Discounts: r=-0.500 (p=0.2000)"));
        assert!(text.contains("## Seasonality Analysis\n- Revenue: Seasonal strength = 0.81 - Strong seasonality"));
        assert!(!text.contains("## Volatility (ARCH) Analysis"));
        assert!(text.contains("- Commissions: coefficient=3.142***, R²=0.900, p=0.0000"));
    }

    #[test]
    fn narrative_block_renders_volatility_section() {
        let mut report = report();
        report.volatility = Some(VolatilityResult {
            model: VolatilityModelKind::Garch,
            mean_model: MeanModel::Constant,
            arch_order: 1,
            garch_order: 1,
            conditional_volatility: Vec::new(),
            unconditional_variance: 2.5,
            arch_params: BTreeMap::new(),
            garch_params: BTreeMap::new(),
            aic: 101.234,
            bic: 108.9,
            log_likelihood: -46.6,
            ljung_box_p_value: 0.4,
            interpretation: "Volatility is persistent.".to_string(),
            forecast: Some(vec![2.5; 4]),
        });
        let text = render_narrative_context(&report);
        assert!(text.contains(
            "## Volatility (ARCH) Analysis\nModel: GARCH(1,1)\nUnconditional Variance: 2.5000\nAIC: 101.23, BIC: 108.90\nVolatility is persistent.\nVariance forecast (4 periods, flat at unconditional level): 2.5000\n"
        ), "{text}");
    }

    #[test]
    fn summary_mentions_each_stage_with_output() {
        let summary = executive_summary(&report());
        assert_eq!(
            summary,
            "Analyzed 2 expense accounts against revenue. Seasonality analyzed for 1 series. \
             Regression analysis completed for 1 top accounts."
        );
    }

    #[test]
    fn correlation_table_truncates_long_names() {
        let mut analysis = report().correlation;
        analysis.correlations[0].account_name = "X".repeat(50);
        let table = format_correlation_table(&analysis, 1);
        assert_eq!(table.lines().count(), 3);
        assert!(table.contains(&format!("{}.", "X".repeat(35))));
    }
}
