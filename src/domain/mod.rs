//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - input enums (`Frequency`, `Aggregation`, `CorrelationMethod`, `MeanModel`, ...)
//! - the period-indexed `TimeSeries` and the raw `Record` row
//! - analysis outputs (`SeasonalDecomposition`, `CorrelationAnalysis`,
//!   `RegressionResult`, `VolatilityResult`, `AnalysisReport`)

pub mod types;

pub use types::*;
