//! Ordinary least squares with classical inference.
//!
//! Every regression in the crate (slope estimates, seasonal-dummy models, the
//! ARCH LM auxiliary regression, the AR(1) mean model) goes through `fit_ols`:
//!
//! ```text
//! minimize Σ (y_i - x_i^T β)^2
//! ```
//!
//! Implementation choices:
//! - β is solved with SVD so tall design matrices work without forming a
//!   square system (nalgebra's `QR::solve` panics for non-square matrices).
//! - The coefficient covariance uses `(XᵀX)⁻¹`, falling back to the
//!   pseudo-inverse when dummy columns make the design rank deficient.
//! - Residual degrees of freedom use the numerical rank, like statsmodels.

use nalgebra::{DMatrix, DVector};

use crate::error::AppError;
use crate::math::stats::{student_t_critical, student_t_two_sided_p};

/// Solve a least squares problem using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.clone().svd(true, true);

    // Try progressively looser tolerances if strict solve fails.
    for &tol in &[1e-10, 1e-8, 1e-6] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}

/// Fitted OLS model.
#[derive(Debug, Clone)]
pub struct OlsFit {
    pub beta: DVector<f64>,
    pub std_errors: DVector<f64>,
    pub residuals: DVector<f64>,
    pub sse: f64,
    pub r_squared: f64,
    pub adj_r_squared: f64,
    pub n: usize,
    pub df_resid: usize,
}

/// Inference for a single coefficient.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoefficientInference {
    pub estimate: f64,
    pub std_error: f64,
    pub t_statistic: f64,
    pub p_value: f64,
    pub ci_lower: f64,
    pub ci_upper: f64,
}

impl OlsFit {
    /// t-test and 95% interval for coefficient `idx`.
    pub fn inference(&self, idx: usize) -> CoefficientInference {
        let estimate = self.beta[idx];
        let std_error = self.std_errors[idx];
        let df = self.df_resid as f64;

        let t_statistic = if std_error > 0.0 {
            estimate / std_error
        } else if estimate == 0.0 {
            0.0
        } else {
            f64::INFINITY.copysign(estimate)
        };
        let p_value = student_t_two_sided_p(t_statistic, df);
        let half_width = student_t_critical(0.975, df) * std_error;

        CoefficientInference {
            estimate,
            std_error,
            t_statistic,
            p_value,
            ci_lower: estimate - half_width,
            ci_upper: estimate + half_width,
        }
    }
}

/// Fit `y = Xβ + ε`. `has_constant` selects centered (true) or uncentered
/// total sum of squares for R².
pub fn fit_ols(x: &DMatrix<f64>, y: &DVector<f64>, has_constant: bool) -> Result<OlsFit, AppError> {
    let n = x.nrows();
    if n != y.len() {
        return Err(AppError::computation(format!(
            "Design matrix has {n} rows but response has {} values",
            y.len()
        )));
    }
    if x.iter().chain(y.iter()).any(|v| !v.is_finite()) {
        return Err(AppError::computation("Non-finite value in regression inputs"));
    }

    let rank = numerical_rank(x);
    if rank == 0 {
        return Err(AppError::computation("Design matrix has rank 0"));
    }
    if n <= rank {
        return Err(AppError::insufficient("least squares (residual degrees of freedom)", rank + 1, n));
    }

    let beta = solve_least_squares(x, y)
        .ok_or_else(|| AppError::computation("Least squares system is too ill-conditioned"))?;

    let residuals = y - x * &beta;
    let sse = residuals.norm_squared();
    let df_resid = n - rank;
    let sigma2 = sse / df_resid as f64;

    let xtx = x.transpose() * x;
    let xtx_inv = match xtx.clone().try_inverse() {
        Some(inv) if inv.iter().all(|v| v.is_finite()) => inv,
        _ => xtx
            .pseudo_inverse(1e-10)
            .map_err(|e| AppError::computation(format!("Covariance pseudo-inverse failed: {e}")))?,
    };
    let std_errors = DVector::from_iterator(
        beta.len(),
        (0..beta.len()).map(|i| (sigma2 * xtx_inv[(i, i)]).max(0.0).sqrt()),
    );

    let sst = if has_constant {
        let mean = y.mean();
        y.iter().map(|v| (v - mean).powi(2)).sum::<f64>()
    } else {
        y.norm_squared()
    };
    let r_squared = if sst > 0.0 { 1.0 - sse / sst } else { 0.0 };
    let k_constant = usize::from(has_constant) as f64;
    let adj_r_squared = 1.0 - (n as f64 - k_constant) / df_resid as f64 * (1.0 - r_squared);

    Ok(OlsFit {
        beta,
        std_errors,
        residuals,
        sse,
        r_squared,
        adj_r_squared,
        n,
        df_resid,
    })
}

fn numerical_rank(x: &DMatrix<f64>) -> usize {
    let singular = x.clone().svd(false, false).singular_values;
    let max = singular.iter().cloned().fold(0.0_f64, f64::max);
    if max <= 0.0 {
        return 0;
    }
    let tol = max * (x.nrows().max(x.ncols()) as f64) * f64::EPSILON;
    singular.iter().filter(|&&s| s > tol).count()
}
