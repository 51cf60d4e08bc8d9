//! Top-level application orchestration.
//!
//! `src/main.rs` stays tiny; this module is the real main:
//! - parses CLI arguments and installs logging
//! - resolves configuration (environment, `.env`, flags)
//! - runs the analysis pipeline or the sample generator
//! - prints reports and writes optional exports

use clap::Parser;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::analysis::AnalysisOptions;
use crate::cli::{AnalyzeArgs, Command, SampleArgs};
use crate::config::AnalyzerConfig;
use crate::data::{SampleConfig, generate_ledger};
use crate::data::sample::LEDGER_COLUMNS;
use crate::error::AppError;
use crate::series::LedgerLayout;

pub mod pipeline;

use pipeline::{AnalyzeRequest, InputSource};

/// Entry point for the `finstat` binary.
pub fn run() -> Result<(), AppError> {
    let cli = crate::cli::Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Analyze(args) => handle_analyze(args),
        Command::Sample(args) => handle_sample(args),
    }
}

/// `RUST_LOG` wins, then `--verbose`, then `info`. Logs go to stderr.
fn init_tracing(verbose: bool) {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr).compact())
        .try_init();
}

fn handle_analyze(args: AnalyzeArgs) -> Result<(), AppError> {
    let mut config = AnalyzerConfig::from_env()?;
    if let Some(month) = args.fiscal_start_month {
        config = config.with_fiscal_start_month(month);
    }
    let request = AnalyzeRequest {
        source: input_source_from_args(&args),
        config,
        options: analysis_options_from_args(&args),
    };
    let run = pipeline::run_analysis(&request)?;

    if args.context_only {
        println!("{}", run.report.narrative_context);
    } else {
        println!("{}", crate::report::format_run_summary(&run.report));
        println!(
            "{}",
            crate::report::format_correlation_table(&run.report.correlation, args.top)
        );
    }

    if let Some(path) = &args.export {
        crate::io::export::write_report_json(path, &run.report)?;
        info!(path = %path.display(), "report exported");
    }
    Ok(())
}

fn handle_sample(args: SampleArgs) -> Result<(), AppError> {
    let mut config = SampleConfig {
        months: args.months,
        seed: args.seed,
        ..SampleConfig::default()
    };
    if let Some(start) = args.start {
        config.start = start;
    }
    let rows = generate_ledger(&config)?;
    crate::io::export::write_records_csv(&args.output, &rows, &LEDGER_COLUMNS)?;
    info!(path = %args.output.display(), rows = rows.len(), "sample ledger written");
    Ok(())
}

pub fn input_source_from_args(args: &AnalyzeArgs) -> InputSource {
    match &args.input {
        Some(path) if !args.sample => InputSource::File(path.clone()),
        _ => InputSource::Sample(SampleConfig {
            months: args.months,
            seed: args.seed,
            ..SampleConfig::default()
        }),
    }
}

pub fn analysis_options_from_args(args: &AnalyzeArgs) -> AnalysisOptions {
    AnalysisOptions {
        layout: LedgerLayout {
            amount_field: args.amount_field.clone(),
            date_field: args.date_field.clone(),
            account_name_field: args.account_field.clone(),
            account_number_field: args.account_number_field.clone(),
            revenue_prefix: args.revenue_prefix.clone(),
            expense_prefixes: args.expense_prefixes.clone(),
        },
        seasonally_adjust: !args.no_seasonal_adjust,
        include_volatility: !args.no_volatility,
        max_lag: args.max_lag,
        top_n: args.top,
        method: args.method,
        forecast_horizon: args.forecast_horizon,
        ..AnalysisOptions::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use crate::domain::CorrelationMethod;

    fn analyze_args(argv: &[&str]) -> AnalyzeArgs {
        let mut full = vec!["finstat", "analyze"];
        full.extend_from_slice(argv);
        match Cli::parse_from(full).command {
            Command::Analyze(args) => args,
            Command::Sample(_) => panic!("expected analyze"),
        }
    }

    #[test]
    fn default_flags_match_default_options() {
        let args = analyze_args(&["--sample"]);
        assert_eq!(analysis_options_from_args(&args), AnalysisOptions::default());
        assert_eq!(input_source_from_args(&args), InputSource::Sample(SampleConfig::default()));
    }

    #[test]
    fn flags_override_options() {
        let args = analyze_args(&[
            "--input",
            "gl.json",
            "--method",
            "spearman",
            "--no-seasonal-adjust",
            "--no-volatility",
            "--expense-prefixes",
            "6,7",
            "--top",
            "5",
        ]);
        let options = analysis_options_from_args(&args);
        assert_eq!(options.method, CorrelationMethod::Spearman);
        assert!(!options.seasonally_adjust);
        assert!(!options.include_volatility);
        assert_eq!(options.layout.expense_prefixes, vec!["6", "7"]);
        assert_eq!(options.top_n, 5);
        assert_eq!(input_source_from_args(&args), InputSource::File("gl.json".into()));
    }
}
