//! The `analyze` workflow, independent of how results are printed:
//! load or generate rows -> build the analyzer -> run the full analysis.

use std::path::PathBuf;

use crate::analysis::{AnalysisOptions, StatisticalAnalyzer};
use crate::config::AnalyzerConfig;
use crate::data::{SampleConfig, generate_ledger};
use crate::domain::{AnalysisReport, Record};
use crate::error::AppError;
use crate::io::ingest::{ensure_fields_present, load_records};

#[derive(Debug, Clone, PartialEq)]
pub enum InputSource {
    File(PathBuf),
    Sample(SampleConfig),
}

/// Everything one `finstat analyze` run needs.
#[derive(Debug, Clone)]
pub struct AnalyzeRequest {
    pub source: InputSource,
    pub config: AnalyzerConfig,
    pub options: AnalysisOptions,
}

#[derive(Debug, Clone)]
pub struct RunOutput {
    pub rows_read: usize,
    pub report: AnalysisReport,
}

fn load(request: &AnalyzeRequest) -> Result<Vec<Record>, AppError> {
    match &request.source {
        InputSource::File(path) => {
            let records = load_records(path)?;
            let layout = &request.options.layout;
            ensure_fields_present(
                &records,
                &[
                    layout.amount_field.as_str(),
                    layout.date_field.as_str(),
                    layout.account_number_field.as_str(),
                ],
            )?;
            Ok(records)
        }
        InputSource::Sample(config) => generate_ledger(config),
    }
}

/// Execute the analysis and return the report.
pub fn run_analysis(request: &AnalyzeRequest) -> Result<RunOutput, AppError> {
    let analyzer = StatisticalAnalyzer::new(request.config)?;
    let records = load(request)?;
    let report = analyzer.full_revenue_correlation_analysis(&records, &request.options);
    Ok(RunOutput {
        rows_read: records.len(),
        report,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Capabilities;

    #[test]
    fn sample_source_runs_end_to_end() {
        let request = AnalyzeRequest {
            source: InputSource::Sample(SampleConfig {
                months: 30,
                ..SampleConfig::default()
            }),
            config: AnalyzerConfig::default(),
            options: AnalysisOptions::default(),
        };
        let run = run_analysis(&request).unwrap();
        assert_eq!(run.rows_read, 30 * 8 * 3);
        assert_eq!(run.report.correlation.period_count, 30);
        assert!(!run.report.correlation.correlations.is_empty());
    }

    #[test]
    fn missing_file_is_io_error() {
        let request = AnalyzeRequest {
            source: InputSource::File(PathBuf::from("/nonexistent/finstat/ledger.csv")),
            config: AnalyzerConfig::default().with_capabilities(Capabilities::detect()),
            options: AnalysisOptions::default(),
        };
        let err = run_analysis(&request).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Io);
        assert_eq!(err.exit_code(), 2);
    }
}
