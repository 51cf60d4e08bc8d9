//! Gaussian quasi-maximum-likelihood estimation of conditional-variance
//! models.
//!
//! Parameter layout (model space):
//! - ARCH/GARCH: `[ω, α₁..α_p, β₁..β_q]`, variance recursion
//!   `σ²_t = ω + Σ α_i e²_{t-i} + Σ β_j σ²_{t-j}`
//! - EGARCH: `[ω, α₁..α_p, γ₁..γ_p, β₁..β_q]`, log-variance recursion
//!   `ln σ²_t = ω + Σ α_i (|z_{t-i}| - √(2/π)) + Σ γ_i z_{t-i} + Σ β_j ln σ²_{t-j}`
//!
//! Pre-sample squared residuals and variances are replaced by an
//! exponentially weighted backcast of the first observations. For GARCH the
//! search runs on `ω / s²` so step sizes do not depend on the data's units.

use std::f64::consts::PI;

use crate::domain::VolatilityModelKind;
use crate::error::AppError;
use crate::math::search::{grid_search, pattern_search, PatternSearchOptions};
use crate::math::stats::variance;

const BACKCAST_DECAY: f64 = 0.94;
const BACKCAST_WINDOW: usize = 75;
const MAX_LOG_VARIANCE: f64 = 700.0;

/// Order and family of a variance model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VarianceModel {
    pub kind: VolatilityModelKind,
    pub p: usize,
    pub q: usize,
}

/// Estimated variance model.
#[derive(Debug, Clone)]
pub struct VarianceFit {
    /// Parameters in model space (see module docs).
    pub params: Vec<f64>,
    pub sigma2: Vec<f64>,
    pub log_likelihood: f64,
}

impl VarianceModel {
    pub fn param_count(&self) -> usize {
        match self.kind {
            VolatilityModelKind::Egarch => 1 + 2 * self.p + self.q,
            _ => 1 + self.p + self.q,
        }
    }

    fn gamma_count(&self) -> usize {
        match self.kind {
            VolatilityModelKind::Egarch => self.p,
            _ => 0,
        }
    }

    /// `(name, value)` of every shock coefficient (`alpha`, `gamma`) and of
    /// every persistence coefficient (`beta`).
    pub fn named_params(&self, params: &[f64]) -> (Vec<(String, f64)>, Vec<(String, f64)>) {
        let mut shocks = Vec::new();
        for i in 0..self.p {
            shocks.push((format!("alpha[{}]", i + 1), params[1 + i]));
        }
        for i in 0..self.gamma_count() {
            shocks.push((format!("gamma[{}]", i + 1), params[1 + self.p + i]));
        }
        let beta_start = 1 + self.p + self.gamma_count();
        let persistence = (0..self.q)
            .map(|j| (format!("beta[{}]", j + 1), params[beta_start + j]))
            .collect();
        (shocks, persistence)
    }

    fn betas<'a>(&self, params: &'a [f64]) -> &'a [f64] {
        &params[1 + self.p + self.gamma_count()..]
    }

    /// Long-run variance implied by `params`; `None` when the process is not
    /// stationary.
    pub fn unconditional_variance(&self, params: &[f64]) -> Option<f64> {
        let omega = params[0];
        let value = match self.kind {
            VolatilityModelKind::Egarch => {
                let persistence: f64 = self.betas(params).iter().sum();
                if persistence.abs() >= 1.0 {
                    return None;
                }
                (omega / (1.0 - persistence)).exp()
            }
            _ => {
                let persistence: f64 = params[1..].iter().sum();
                if persistence >= 1.0 {
                    return None;
                }
                omega / (1.0 - persistence)
            }
        };
        (value.is_finite() && value > 0.0).then_some(value)
    }

    /// Conditional variance path, or `None` for infeasible parameters.
    pub fn conditional_variance(&self, params: &[f64], resid: &[f64], backcast: f64) -> Option<Vec<f64>> {
        if params.len() != self.param_count() || params.iter().any(|v| !v.is_finite()) {
            return None;
        }
        match self.kind {
            VolatilityModelKind::Egarch => self.egarch_variance(params, resid, backcast),
            _ => self.garch_variance(params, resid, backcast),
        }
    }

    fn garch_variance(&self, params: &[f64], resid: &[f64], backcast: f64) -> Option<Vec<f64>> {
        let omega = params[0];
        let alphas = &params[1..1 + self.p];
        let betas = self.betas(params);
        if omega <= 0.0 || params[1..].iter().any(|v| *v < 0.0) || params[1..].iter().sum::<f64>() >= 1.0 {
            return None;
        }

        let mut sigma2 = Vec::with_capacity(resid.len());
        for t in 0..resid.len() {
            let mut s = omega;
            for (i, a) in alphas.iter().enumerate() {
                let lag = i + 1;
                s += a * if t >= lag { resid[t - lag].powi(2) } else { backcast };
            }
            for (j, b) in betas.iter().enumerate() {
                let lag = j + 1;
                s += b * if t >= lag { sigma2[t - lag] } else { backcast };
            }
            if !(s.is_finite() && s > 0.0) {
                return None;
            }
            sigma2.push(s);
        }
        Some(sigma2)
    }

    fn egarch_variance(&self, params: &[f64], resid: &[f64], backcast: f64) -> Option<Vec<f64>> {
        let omega = params[0];
        let alphas = &params[1..1 + self.p];
        let gammas = &params[1 + self.p..1 + 2 * self.p];
        let betas = self.betas(params);
        if betas.iter().sum::<f64>().abs() >= 1.0 {
            return None;
        }

        let abs_mean = (2.0 / PI).sqrt();
        let ln_backcast = backcast.ln();
        let mut ln_sigma2: Vec<f64> = Vec::with_capacity(resid.len());
        let mut z: Vec<f64> = Vec::with_capacity(resid.len());
        for t in 0..resid.len() {
            let mut s = omega;
            for i in 0..self.p {
                let lag = i + 1;
                if t >= lag {
                    let zt = z[t - lag];
                    s += alphas[i] * (zt.abs() - abs_mean) + gammas[i] * zt;
                }
            }
            for (j, b) in betas.iter().enumerate() {
                let lag = j + 1;
                s += b * if t >= lag { ln_sigma2[t - lag] } else { ln_backcast };
            }
            if !s.is_finite() || s.abs() > MAX_LOG_VARIANCE {
                return None;
            }
            ln_sigma2.push(s);
            z.push(resid[t] / (0.5 * s).exp());
        }
        Some(ln_sigma2.into_iter().map(f64::exp).collect())
    }

    /// Gaussian log-likelihood of `resid` under `params`.
    pub fn log_likelihood(&self, params: &[f64], resid: &[f64], backcast: f64) -> Option<f64> {
        let sigma2 = self.conditional_variance(params, resid, backcast)?;
        let ll = gaussian_log_likelihood(resid, &sigma2);
        ll.is_finite().then_some(ll)
    }
}

pub fn gaussian_log_likelihood(resid: &[f64], sigma2: &[f64]) -> f64 {
    let ln_2pi = (2.0 * PI).ln();
    -0.5 * resid
        .iter()
        .zip(sigma2)
        .map(|(e, s)| ln_2pi + s.ln() + e * e / s)
        .sum::<f64>()
}

/// Exponentially weighted mean of the first squared residuals.
pub fn backcast(resid: &[f64]) -> f64 {
    let window = resid.len().min(BACKCAST_WINDOW);
    let mut weight = 1.0;
    let mut total_weight = 0.0;
    let mut value = 0.0;
    for e in &resid[..window] {
        value += weight * e * e;
        total_weight += weight;
        weight *= BACKCAST_DECAY;
    }
    if total_weight > 0.0 { value / total_weight } else { 0.0 }
}

fn split_evenly(total: f64, count: usize) -> Vec<f64> {
    vec![total / count.max(1) as f64; count]
}

/// Starting points (search space) and initial step sizes.
fn starting_grid(model: &VarianceModel, sample_var: f64) -> (Vec<Vec<f64>>, Vec<f64>) {
    let beta_totals: &[f64] = if model.q > 0 { &[0.0, 0.5, 0.7, 0.8, 0.9] } else { &[0.0] };
    let mut grid = Vec::new();

    match model.kind {
        VolatilityModelKind::Egarch => {
            let ln_var = sample_var.ln();
            for &a in &[0.0, 0.1, 0.2, 0.4] {
                for &g in &[-0.1, 0.0, 0.1] {
                    for &b in beta_totals {
                        let mut point = vec![ln_var * (1.0 - b)];
                        point.extend(split_evenly(a, model.p));
                        point.extend(split_evenly(g, model.p));
                        point.extend(split_evenly(b, model.q));
                        grid.push(point);
                    }
                }
            }
            let mut steps = vec![0.1 * ln_var.abs().max(1.0)];
            steps.extend(vec![0.05; 2 * model.p + model.q]);
            (grid, steps)
        }
        _ => {
            for &a in &[0.0, 0.05, 0.1, 0.2, 0.3] {
                for &b in beta_totals {
                    if a + b >= 0.999 {
                        continue;
                    }
                    // Variance targeting: ω = s² (1 - Σα - Σβ), searched as ω / s².
                    let mut point = vec![1.0 - a - b];
                    point.extend(split_evenly(a, model.p));
                    point.extend(split_evenly(b, model.q));
                    grid.push(point);
                }
            }
            let steps = vec![0.05; model.param_count()];
            (grid, steps)
        }
    }
}

/// Maximize the Gaussian likelihood of `resid`.
pub fn estimate(model: &VarianceModel, resid: &[f64]) -> Result<VarianceFit, AppError> {
    let sample_var = variance(resid);
    if !(sample_var > 0.0) {
        return Err(AppError::computation("Residuals have zero variance; volatility model is undefined"));
    }
    let bc = backcast(resid).max(sample_var * 1e-6);

    // Search space -> model space (GARCH ω is scaled by the sample variance).
    let to_model = |x: &[f64]| -> Vec<f64> {
        let mut params = x.to_vec();
        if model.kind != VolatilityModelKind::Egarch {
            params[0] *= sample_var;
        }
        params
    };
    let objective = |x: &[f64]| model.log_likelihood(&to_model(x), resid, bc);

    let (grid, steps) = starting_grid(model, sample_var);
    let (best_idx, _) = grid_search(&grid, objective)
        .ok_or_else(|| AppError::computation("No feasible starting point for volatility model"))?;

    let opts = PatternSearchOptions {
        tolerance: 1e-6,
        max_evaluations: 20_000,
    };
    let (best_x, log_likelihood) = pattern_search(grid[best_idx].clone(), steps, objective, opts)
        .ok_or_else(|| AppError::computation("Volatility likelihood search failed"))?;

    let params = to_model(&best_x);
    let sigma2 = model
        .conditional_variance(&params, resid, bc)
        .ok_or_else(|| AppError::computation("Fitted volatility parameters are infeasible"))?;

    Ok(VarianceFit {
        params,
        sigma2,
        log_likelihood,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn garch11() -> VarianceModel {
        VarianceModel {
            kind: VolatilityModelKind::Garch,
            p: 1,
            q: 1,
        }
    }

    #[test]
    fn backcast_weights_early_observations() {
        assert!((backcast(&[2.0, 2.0, 2.0]) - 4.0).abs() < 1e-12);
        assert!(backcast(&[3.0, 0.0, 0.0]) > backcast(&[0.0, 0.0, 3.0]));
    }

    #[test]
    fn garch_recursion_matches_hand_calculation() {
        let model = garch11();
        let params = [0.1, 0.2, 0.5];
        let sigma2 = model.conditional_variance(&params, &[1.0, -2.0], 1.0).unwrap();
        // t=0: 0.1 + 0.2*1 + 0.5*1 = 0.8; t=1: 0.1 + 0.2*1 + 0.5*0.8 = 0.7
        assert!((sigma2[0] - 0.8).abs() < 1e-12);
        assert!((sigma2[1] - 0.7).abs() < 1e-12);
    }

    #[test]
    fn non_stationary_parameters_are_infeasible() {
        let model = garch11();
        assert!(model.conditional_variance(&[0.1, 0.5, 0.6], &[1.0], 1.0).is_none());
        assert!(model.conditional_variance(&[-0.1, 0.1, 0.1], &[1.0], 1.0).is_none());
        assert_eq!(model.unconditional_variance(&[0.1, 0.5, 0.6]), None);
        assert!((model.unconditional_variance(&[0.1, 0.2, 0.3]).unwrap() - 0.2).abs() < 1e-12);
    }

    #[test]
    fn egarch_names_include_asymmetry_terms() {
        let model = VarianceModel {
            kind: VolatilityModelKind::Egarch,
            p: 1,
            q: 1,
        };
        let (shocks, persistence) = model.named_params(&[0.0, 0.1, -0.05, 0.9]);
        assert_eq!(shocks[0], ("alpha[1]".to_string(), 0.1));
        assert_eq!(shocks[1], ("gamma[1]".to_string(), -0.05));
        assert_eq!(persistence, vec![("beta[1]".to_string(), 0.9)]);
    }
}
