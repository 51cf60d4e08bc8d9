//! `fin-stats` library crate.
//!
//! Statistical analysis of general-ledger extracts: which expense accounts
//! move with revenue, how seasonal the series are, whether revenue shows
//! volatility clustering, and how strongly the top drivers explain revenue.
//!
//! The binary (`finstat`) is a thin wrapper around this library so the
//! analysis is testable and reusable without spawning processes.

pub mod analysis;
pub mod app;
pub mod cli;
pub mod config;
pub mod correlation;
pub mod data;
pub mod domain;
pub mod error;
pub mod io;
pub mod math;
pub mod regression;
pub mod report;
pub mod seasonal;
pub mod series;
pub mod volatility;
