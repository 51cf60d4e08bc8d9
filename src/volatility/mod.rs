//! Volatility clustering: Engle's LM test and ARCH/GARCH/EGARCH fits.
//!
//! Input series are demeaned first (a proxy for "returns"), then passed
//! through the requested mean model; the variance model is fitted to the
//! mean-model residuals.

pub mod garch;

use std::collections::BTreeMap;

use nalgebra::{DMatrix, DVector};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::domain::{MeanModel, TimeSeries, VolatilityModelKind, VolatilityResult, SIGNIFICANCE_LEVEL};
use crate::error::AppError;
use crate::math::fit_ols;
use crate::math::stats::{chi_squared_sf, ljung_box, mean, variance};

use self::garch::{estimate, VarianceModel};

/// Fewest observations for any volatility fit.
pub const MIN_FIT_OBSERVATIONS: usize = 50;

/// Lag order of the residual autocorrelation diagnostic.
pub const LJUNG_BOX_LAGS: usize = 10;

/// Default lag order of the ARCH LM test.
pub const DEFAULT_ARCH_LAGS: usize = 5;

/// Outcome of Engle's LM test.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArchTest {
    pub statistic: f64,
    pub p_value: f64,
    pub has_effects: bool,
    pub interpretation: String,
}

impl ArchTest {
    fn not_significant(interpretation: String) -> Self {
        Self {
            statistic: 0.0,
            p_value: 1.0,
            has_effects: false,
            interpretation,
        }
    }
}

/// Engle's LM test for ARCH effects at `lags` lags.
///
/// Regresses `e²_t` on a constant and `e²_{t-1} .. e²_{t-lags}`;
/// `LM = nobs · R²` is χ²(lags). Series shorter than `lags + 10` get a
/// non-significant default rather than an error.
pub fn detect_arch_effects(series: &TimeSeries, lags: usize) -> ArchTest {
    let n = series.len();
    if lags == 0 {
        return ArchTest::not_significant("ARCH test needs at least one lag".to_string());
    }
    if n < lags + 10 {
        return ArchTest::not_significant(format!("Insufficient data: {n} < {}", lags + 10));
    }

    let m = mean(series.values());
    let squared: Vec<f64> = series.values().iter().map(|v| (v - m).powi(2)).collect();
    let nobs = n - lags;
    let design = DMatrix::from_fn(nobs, lags + 1, |i, j| {
        if j == 0 { 1.0 } else { squared[lags + i - j] }
    });
    let response = DVector::from_iterator(nobs, squared[lags..].iter().copied());

    let fit = match fit_ols(&design, &response, true) {
        Ok(fit) => fit,
        Err(err) => {
            warn!(series = %series.name, error = %err, "ARCH LM regression failed");
            return ArchTest::not_significant(format!("Error: {err}"));
        }
    };
    let statistic = (nobs as f64 * fit.r_squared).max(0.0);
    let p_value = chi_squared_sf(statistic, lags);
    let has_effects = p_value < SIGNIFICANCE_LEVEL;

    let interpretation = if has_effects {
        format!("ARCH effects detected (p={p_value:.4}). Volatility clustering present.")
    } else {
        format!("No significant ARCH effects (p={p_value:.4}). Constant variance assumption holds.")
    };
    debug!(series = %series.name, statistic, p_value, "ARCH LM test");

    ArchTest {
        statistic,
        p_value,
        has_effects,
        interpretation,
    }
}

/// Which model to fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VolatilitySpec {
    pub kind: VolatilityModelKind,
    pub p: usize,
    pub q: usize,
    pub mean: MeanModel,
}

impl VolatilitySpec {
    pub fn arch(p: usize) -> Self {
        Self {
            kind: VolatilityModelKind::Arch,
            p,
            q: 0,
            mean: MeanModel::Constant,
        }
    }

    pub fn garch(p: usize, q: usize) -> Self {
        Self {
            kind: VolatilityModelKind::Garch,
            p,
            q,
            mean: MeanModel::Constant,
        }
    }

    pub fn egarch(p: usize, q: usize) -> Self {
        Self {
            kind: VolatilityModelKind::Egarch,
            p,
            q,
            mean: MeanModel::Constant,
        }
    }

    pub fn with_mean(mut self, mean: MeanModel) -> Self {
        self.mean = mean;
        self
    }

    fn validate(&self) -> Result<(), AppError> {
        if self.p == 0 {
            return Err(AppError::malformed("ARCH order p must be at least 1"));
        }
        if self.kind == VolatilityModelKind::Arch && self.q != 0 {
            return Err(AppError::malformed("A pure ARCH model has no GARCH order; use GARCH for q > 0"));
        }
        Ok(())
    }
}

fn mean_residuals(returns: &[f64], mean_model: MeanModel) -> Result<Vec<f64>, AppError> {
    match mean_model {
        MeanModel::Zero => Ok(returns.to_vec()),
        MeanModel::Constant => {
            let mu = mean(returns);
            Ok(returns.iter().map(|r| r - mu).collect())
        }
        MeanModel::Ar => {
            let n = returns.len() - 1;
            let design = DMatrix::from_fn(n, 2, |i, j| if j == 0 { 1.0 } else { returns[i] });
            let response = DVector::from_iterator(n, returns[1..].iter().copied());
            let fit = fit_ols(&design, &response, true)?;
            Ok(fit.residuals.iter().copied().collect())
        }
    }
}

/// Fit a conditional-variance model to `series`.
pub fn fit_volatility_model(series: &TimeSeries, spec: &VolatilitySpec) -> Result<VolatilityResult, AppError> {
    spec.validate()?;
    let n = series.len();
    if n < MIN_FIT_OBSERVATIONS {
        return Err(AppError::insufficient(
            format!("{} fit of '{}'", spec.kind.display_name(), series.name),
            MIN_FIT_OBSERVATIONS,
            n,
        ));
    }

    let m = mean(series.values());
    let returns: Vec<f64> = series.values().iter().map(|v| v - m).collect();
    let resid = mean_residuals(&returns, spec.mean)?;

    let model = VarianceModel {
        kind: spec.kind,
        p: spec.p,
        q: spec.q,
    };
    let fit = estimate(&model, &resid)?;

    let unconditional_variance = model
        .unconditional_variance(&fit.params)
        .unwrap_or_else(|| variance(&resid));
    let (shocks, persistence) = model.named_params(&fit.params);
    let arch_params: BTreeMap<String, f64> = shocks.into_iter().collect();
    let garch_params: BTreeMap<String, f64> = persistence.into_iter().collect();

    let k = (spec.mean.param_count() + model.param_count()) as f64;
    let nobs = resid.len() as f64;
    let aic = 2.0 * k - 2.0 * fit.log_likelihood;
    let bic = k * nobs.ln() - 2.0 * fit.log_likelihood;

    let ljung_box_p_value = match ljung_box(&resid, LJUNG_BOX_LAGS) {
        Ok((_, p)) => p,
        Err(err) => {
            warn!(series = %series.name, error = %err, "Ljung-Box diagnostic failed; assuming no autocorrelation");
            1.0
        }
    };

    let mut result = VolatilityResult {
        model: spec.kind,
        mean_model: spec.mean,
        arch_order: spec.p,
        garch_order: spec.q,
        conditional_volatility: fit.sigma2.iter().map(|s| s.sqrt()).collect(),
        unconditional_variance,
        arch_params,
        garch_params,
        aic,
        bic,
        log_likelihood: fit.log_likelihood,
        ljung_box_p_value,
        interpretation: String::new(),
        forecast: None,
    };

    let residual_text = if ljung_box_p_value < SIGNIFICANCE_LEVEL {
        "Residuals show remaining autocorrelation (p<0.05)."
    } else {
        "Residuals appear white noise (p>=0.05)."
    };
    result.interpretation = format!(
        "{} model fitted. AIC={aic:.2}, BIC={bic:.2}. {residual_text} Unconditional variance: {unconditional_variance:.4}.",
        result.model_label()
    );
    info!(
        series = %series.name,
        model = %result.model_label(),
        log_likelihood = fit.log_likelihood,
        "volatility model fitted"
    );
    Ok(result)
}

/// ARCH(p) when `q == 0`, otherwise GARCH(p, q).
pub fn fit_arch_model(series: &TimeSeries, p: usize, q: usize, mean_model: MeanModel) -> Result<VolatilityResult, AppError> {
    let spec = if q == 0 { VolatilitySpec::arch(p) } else { VolatilitySpec::garch(p, q) };
    fit_volatility_model(series, &spec.with_mean(mean_model))
}

/// Flat forecast: the unconditional variance repeated `horizon` times.
///
/// The fitted recursion state is not retained, so this is not a multi-step
/// conditional forecast.
pub fn volatility_forecast(result: &VolatilityResult, horizon: usize) -> Vec<f64> {
    vec![result.unconditional_variance; horizon]
}
