//! Numerical building blocks: least squares, descriptive statistics and
//! distributions, loess smoothing, derivative-free search.

pub mod loess;
pub mod ols;
pub mod search;
pub mod stats;

pub use ols::*;
