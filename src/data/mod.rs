//! Synthetic data sources.

pub mod sample;

pub use sample::{SampleConfig, generate_ledger};
