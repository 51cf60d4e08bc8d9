//! Robust STL (seasonal-trend decomposition by loess).
//!
//! One inner pass:
//! 1. detrend, then smooth each cycle-subseries (all Januaries, all
//!    Februaries, ...) with loess, extending each by one cycle on both ends;
//! 2. low-pass filter the smoothed cycle-subseries (moving averages of
//!    length `np`, `np`, 3, then loess) and subtract it, so the seasonal
//!    component carries no trend;
//! 3. deseasonalize and smooth with loess to get the trend.
//!
//! Outer passes recompute bisquare robustness weights from the residuals so
//! single outlying months do not bend the components.

use crate::error::AppError;
use crate::math::loess::{loess_at, loess_smooth, moving_average, positions};
use crate::math::stats::median;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StlParams {
    pub period: usize,
    pub seasonal_span: usize,
    pub trend_span: usize,
    pub low_pass_span: usize,
    pub inner_iterations: usize,
    pub robust_iterations: usize,
}

impl StlParams {
    /// Robust defaults for a cycle of `period` observations.
    pub fn for_period(period: usize) -> Self {
        let seasonal_span = next_odd(period).max(7);
        let trend_min = 1.5 * period as f64 / (1.0 - 1.5 / seasonal_span as f64);
        Self {
            period,
            seasonal_span,
            trend_span: next_odd(trend_min.ceil() as usize),
            low_pass_span: next_odd(period),
            inner_iterations: 2,
            robust_iterations: 15,
        }
    }
}

fn next_odd(value: usize) -> usize {
    if value % 2 == 0 { value + 1 } else { value }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StlComponents {
    pub trend: Vec<f64>,
    pub seasonal: Vec<f64>,
    pub residual: Vec<f64>,
}

pub fn stl(y: &[f64], params: &StlParams) -> Result<StlComponents, AppError> {
    let n = y.len();
    let np = params.period;
    if np < 2 {
        return Err(AppError::malformed(format!("STL period must be at least 2, got {np}")));
    }
    if n < 2 * np {
        return Err(AppError::insufficient("STL decomposition", 2 * np, n));
    }

    let mut trend = vec![0.0; n];
    let mut seasonal = vec![0.0; n];
    let mut weights = vec![1.0; n];

    for outer in 0..=params.robust_iterations {
        for _ in 0..params.inner_iterations {
            let detrended: Vec<f64> = y.iter().zip(&trend).map(|(a, t)| a - t).collect();
            let cycle = smooth_cycle_subseries(&detrended, &weights, np, params.seasonal_span)?;
            let low_pass = low_pass_filter(&cycle, np, params.low_pass_span)?;
            for i in 0..n {
                seasonal[i] = cycle[np + i] - low_pass[i];
            }

            let deseasonalized: Vec<f64> = y.iter().zip(&seasonal).map(|(a, s)| a - s).collect();
            trend = loess_smooth(&deseasonalized, Some(&weights), params.trend_span)
                .ok_or_else(|| AppError::computation("STL trend smoothing failed"))?;
        }

        if outer < params.robust_iterations {
            let residual: Vec<f64> = (0..n).map(|i| y[i] - trend[i] - seasonal[i]).collect();
            weights = robustness_weights(&residual);
        }
    }

    let residual: Vec<f64> = (0..n).map(|i| y[i] - trend[i] - seasonal[i]).collect();
    if trend
        .iter()
        .chain(&seasonal)
        .chain(&residual)
        .any(|v| !v.is_finite())
    {
        return Err(AppError::computation("STL produced non-finite components"));
    }

    Ok(StlComponents {
        trend,
        seasonal,
        residual,
    })
}

/// Smoothed cycle-subseries laid out on an axis of `n + 2 * np` points
/// (one extra cycle before and after the data).
fn smooth_cycle_subseries(values: &[f64], weights: &[f64], np: usize, span: usize) -> Result<Vec<f64>, AppError> {
    let n = values.len();
    let mut out = vec![0.0; n + 2 * np];

    for phase in 0..np {
        let sub: Vec<f64> = values.iter().skip(phase).step_by(np).copied().collect();
        let sub_weights: Vec<f64> = weights.iter().skip(phase).step_by(np).copied().collect();
        let m = sub.len();
        if m == 0 {
            continue;
        }
        let xs = positions(m);
        for k in 0..m + 2 {
            let fitted = loess_at(&xs, &sub, Some(&sub_weights), span, k as f64)
                .ok_or_else(|| AppError::computation("STL seasonal smoothing failed"))?;
            out[phase + k * np] = fitted;
        }
    }
    Ok(out)
}

fn low_pass_filter(cycle: &[f64], np: usize, span: usize) -> Result<Vec<f64>, AppError> {
    let first = moving_average(cycle, np);
    let second = moving_average(&first, np);
    let third = moving_average(&second, 3);
    loess_smooth(&third, None, span).ok_or_else(|| AppError::computation("STL low-pass smoothing failed"))
}

/// Bisquare weights on residuals scaled by six median absolute residuals.
fn robustness_weights(residual: &[f64]) -> Vec<f64> {
    let abs: Vec<f64> = residual.iter().map(|r| r.abs()).collect();
    let h = 6.0 * median(&abs).unwrap_or(0.0);
    if !(h > 0.0) {
        return vec![1.0; residual.len()];
    }
    abs.iter()
        .map(|r| {
            let u = r / h;
            if u <= 0.001 {
                1.0
            } else if u <= 0.999 {
                (1.0 - u * u).powi(2)
            } else {
                0.0
            }
        })
        .collect()
}
