//! Command-line parsing for `finstat`.
//!
//! Argument parsing stays here; the statistics live in the library modules
//! and `app` does the dispatch.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};

use crate::domain::CorrelationMethod;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "finstat", version, about = "Revenue driver analysis for general-ledger extracts")]
pub struct Cli {
    /// Enable debug logging (RUST_LOG takes precedence).
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Correlate expense accounts with revenue, then decompose, model and regress the top drivers.
    Analyze(AnalyzeArgs),
    /// Write a synthetic ledger extract to CSV.
    Sample(SampleArgs),
}

#[derive(Debug, Parser, Clone)]
pub struct AnalyzeArgs {
    /// Ledger extract (.json array of objects or headed .csv).
    #[arg(short, long, value_name = "FILE", required_unless_present = "sample")]
    pub input: Option<PathBuf>,

    /// Analyze a generated ledger instead of a file.
    #[arg(long, conflicts_with = "input")]
    pub sample: bool,

    /// Months of generated data when using --sample.
    #[arg(long, default_value_t = 48)]
    pub months: usize,

    /// Seed for --sample.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    #[arg(long, default_value = "amount")]
    pub amount_field: String,

    #[arg(long, default_value = "formuladate")]
    pub date_field: String,

    #[arg(long, default_value = "account_name")]
    pub account_field: String,

    #[arg(long, default_value = "account_number")]
    pub account_number_field: String,

    /// Account-number prefix identifying revenue accounts.
    #[arg(long, default_value = "4")]
    pub revenue_prefix: String,

    /// Account-number prefixes identifying expense accounts.
    #[arg(long, value_delimiter = ',', default_value = "5,6,7,8")]
    pub expense_prefixes: Vec<String>,

    /// Largest lag (months) searched for each account.
    #[arg(long, default_value_t = 3)]
    pub max_lag: usize,

    /// Accounts per side carried into decomposition and regression.
    #[arg(long, default_value_t = 10)]
    pub top: usize,

    /// Correlation method.
    #[arg(long, value_enum, default_value_t = CorrelationMethod::Pearson)]
    pub method: CorrelationMethod,

    /// Correlate raw series instead of seasonally adjusted ones.
    #[arg(long)]
    pub no_seasonal_adjust: bool,

    /// Skip the ARCH test and volatility model.
    #[arg(long)]
    pub no_volatility: bool,

    /// Periods in the attached variance forecast.
    #[arg(long, default_value_t = 6)]
    pub forecast_horizon: usize,

    /// Fiscal year start month (overrides FINSTAT_FISCAL_START_MONTH).
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..=12))]
    pub fiscal_start_month: Option<u32>,

    /// Write the full report as JSON.
    #[arg(long, value_name = "JSON")]
    pub export: Option<PathBuf>,

    /// Print only the narrative context block.
    #[arg(long)]
    pub context_only: bool,
}

#[derive(Debug, Parser, Clone)]
pub struct SampleArgs {
    #[arg(long, default_value_t = 48)]
    pub months: usize,

    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// First month (YYYY-MM-DD; the day is ignored).
    #[arg(long)]
    pub start: Option<NaiveDate>,

    /// Destination CSV.
    #[arg(short, long, value_name = "CSV")]
    pub output: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn analyze_defaults() {
        let cli = Cli::parse_from(["finstat", "analyze", "--input", "ledger.csv"]);
        let Command::Analyze(args) = cli.command else {
            panic!("expected analyze");
        };
        assert_eq!(args.input, Some(PathBuf::from("ledger.csv")));
        assert_eq!(args.expense_prefixes, vec!["5", "6", "7", "8"]);
        assert_eq!(args.max_lag, 3);
        assert_eq!(args.top, 10);
        assert!(!args.no_seasonal_adjust);
        assert!(!cli.verbose);
    }

    #[test]
    fn analyze_needs_a_source() {
        assert!(Cli::try_parse_from(["finstat", "analyze"]).is_err());
        assert!(Cli::try_parse_from(["finstat", "analyze", "--sample", "-v"]).is_ok());
        assert!(Cli::try_parse_from(["finstat", "analyze", "--sample", "--fiscal-start-month", "13"]).is_err());
    }

    #[test]
    fn sample_parses_start_date() {
        let cli = Cli::parse_from(["finstat", "sample", "--start", "2020-07-01", "-o", "out.csv"]);
        let Command::Sample(args) = cli.command else {
            panic!("expected sample");
        };
        assert_eq!(args.start, NaiveDate::from_ymd_opt(2020, 7, 1));
        assert_eq!(args.months, 48);
    }
}
