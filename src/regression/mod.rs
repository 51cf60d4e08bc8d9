//! Single-regressor OLS, optionally controlling for seasonal phase.
//!
//! Both variants inner-join the two series on their common periods first.
//! The reported coefficient, standard error, t-statistic, p-value and
//! confidence interval are always those of the regressor `x`; R² and
//! adjusted R² describe the whole model.

use std::collections::BTreeSet;

use nalgebra::{DMatrix, DVector};
use tracing::debug;

use crate::domain::{inner_join, JoinedPairs, RegressionResult, TimeSeries, SIGNIFICANCE_LEVEL};
use crate::error::AppError;
use crate::math::{fit_ols, CoefficientInference, OlsFit};
use crate::series::FiscalCalendar;

/// Fewest joined observations for a plain regression.
pub const MIN_OBSERVATIONS: usize = 3;

/// Magnitude-only strength band for a slope. Not scale-free: only
/// meaningful relative to the variables' own units.
pub fn coefficient_strength(coefficient: f64) -> &'static str {
    let a = coefficient.abs();
    if a > 0.5 {
        "strong"
    } else if a > 0.2 {
        "moderate"
    } else {
        "weak"
    }
}

fn direction(coefficient: f64) -> &'static str {
    if coefficient > 0.0 { "positive" } else { "negative" }
}

fn significance_text(p_value: f64) -> &'static str {
    if p_value < SIGNIFICANCE_LEVEL {
        "statistically significant"
    } else {
        "not statistically significant"
    }
}

fn build_result(
    y: &TimeSeries,
    x: &TimeSeries,
    fit: &OlsFit,
    slope: CoefficientInference,
    interpretation: String,
) -> RegressionResult {
    RegressionResult {
        dependent_var: y.name.clone(),
        independent_var: x.name.clone(),
        coefficient: slope.estimate,
        std_error: slope.std_error,
        t_statistic: slope.t_statistic,
        p_value: slope.p_value,
        r_squared: fit.r_squared,
        adj_r_squared: fit.adj_r_squared,
        confidence_interval_95: (slope.ci_lower, slope.ci_upper),
        observations: fit.n,
        is_significant: slope.p_value < SIGNIFICANCE_LEVEL,
        interpretation,
    }
}

fn joined_or_insufficient(y: &TimeSeries, x: &TimeSeries, required: usize, context: &str) -> Result<JoinedPairs, AppError> {
    let joined = inner_join(y, x);
    if joined.len() < required {
        return Err(AppError::insufficient(
            format!("{context} of '{}' on '{}'", y.name, x.name),
            required,
            joined.len(),
        ));
    }
    Ok(joined)
}

/// Regress `y` on `x` (plus an intercept unless `add_constant` is false).
pub fn simple_regression(y: &TimeSeries, x: &TimeSeries, add_constant: bool) -> Result<RegressionResult, AppError> {
    let joined = joined_or_insufficient(y, x, MIN_OBSERVATIONS, "regression")?;
    let n = joined.len();

    let cols = if add_constant { 2 } else { 1 };
    let design = DMatrix::from_fn(n, cols, |i, j| {
        if add_constant && j == 0 { 1.0 } else { joined.right[i] }
    });
    let response = DVector::from_vec(joined.left.clone());

    let fit = fit_ols(&design, &response, add_constant)?;
    let slope = fit.inference(cols - 1);

    let interpretation = format!(
        "{} {} relationship ({}, p={:.4}). R²={:.3} indicates {:.1}% of variance explained.",
        capitalize(coefficient_strength(slope.estimate)),
        direction(slope.estimate),
        significance_text(slope.p_value),
        slope.p_value,
        fit.r_squared,
        fit.r_squared * 100.0
    );
    debug!(y = %y.name, x = %x.name, n, coefficient = slope.estimate, "simple regression");
    Ok(build_result(y, x, &fit, slope, interpretation))
}

/// Regress `y` on `x`, an intercept, and seasonal-phase indicators (first
/// phase present dropped). Needs at least `seasonal_period + 3` joined
/// observations.
pub fn regression_with_seasonality(
    y: &TimeSeries,
    x: &TimeSeries,
    seasonal_period: usize,
    calendar: &FiscalCalendar,
) -> Result<RegressionResult, AppError> {
    if seasonal_period < 2 {
        return Err(AppError::malformed(format!(
            "Seasonal period must be at least 2, got {seasonal_period}"
        )));
    }
    let joined = joined_or_insufficient(y, x, seasonal_period + 3, "seasonal regression")?;
    let n = joined.len();

    let phases: Vec<usize> = joined
        .periods
        .iter()
        .enumerate()
        .map(|(pos, p)| calendar.season_phase(*p, seasonal_period, pos))
        .collect();
    let levels: Vec<usize> = phases.iter().copied().collect::<BTreeSet<_>>().into_iter().skip(1).collect();

    // Columns: intercept, x, one indicator per non-reference phase.
    let cols = 2 + levels.len();
    let design = DMatrix::from_fn(n, cols, |i, j| match j {
        0 => 1.0,
        1 => joined.right[i],
        _ => f64::from(u8::from(phases[i] == levels[j - 2])),
    });
    let response = DVector::from_vec(joined.left.clone());

    let fit = fit_ols(&design, &response, true)?;
    let slope = fit.inference(1);

    let interpretation = format!(
        "{} relationship controlling for seasonality ({}, p={:.4}). R²={:.3} (adjusted: {:.3}).",
        capitalize(direction(slope.estimate)),
        significance_text(slope.p_value),
        slope.p_value,
        fit.r_squared,
        fit.adj_r_squared
    );
    debug!(y = %y.name, x = %x.name, n, dummies = levels.len(), "seasonal regression");
    Ok(build_result(y, x, &fit, slope, interpretation))
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Frequency;
    use crate::error::ErrorKind;
    use chrono::NaiveDate;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use rand_distr::{Distribution, Normal};
    use std::f64::consts::PI;

    fn start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2015, 1, 1).unwrap()
    }

    fn series(name: &str, values: &[f64]) -> TimeSeries {
        TimeSeries::consecutive(name, Frequency::Monthly, start(), values)
    }

    fn linear_pair(n: usize, noise_sd: f64, seed: u64) -> (TimeSeries, TimeSeries) {
        let mut rng = StdRng::seed_from_u64(seed);
        let noise = Normal::new(0.0, noise_sd).unwrap();
        let x: Vec<f64> = (0..n).map(|i| i as f64 * 0.5 + (i % 7) as f64).collect();
        let y: Vec<f64> = x.iter().map(|v| 2.0 * v + 5.0 + noise.sample(&mut rng)).collect();
        (series("y", &y), series("x", &x))
    }

    #[test]
    fn recovers_slope_on_noisy_linear_data() {
        let (y, x) = linear_pair(100, 1.0, 17);
        let r = simple_regression(&y, &x, true).unwrap();
        assert!((r.coefficient - 2.0).abs() < 0.5, "coefficient = {}", r.coefficient);
        assert!(r.r_squared > 0.9);
        assert!(r.is_significant);
        assert_eq!(r.observations, 100);
        assert!(r.confidence_interval_95.0 < r.coefficient && r.coefficient < r.confidence_interval_95.1);
        assert_eq!(r.dependent_var, "y");
        assert_eq!(r.independent_var, "x");
        assert!(r.interpretation.starts_with("Strong positive relationship (statistically significant"));
    }

    #[test]
    fn r_squared_approaches_one_as_noise_shrinks() {
        let mut previous = 0.0;
        for sd in [4.0, 1.0, 0.1, 0.001] {
            let (y, x) = linear_pair(40, sd, 5);
            let r = simple_regression(&y, &x, true).unwrap();
            assert!(r.r_squared >= previous - 1e-9);
            previous = r.r_squared;
        }
        assert!(previous > 0.9999);
    }

    #[test]
    fn regression_through_origin() {
        let x = series("x", &[1.0, 2.0, 3.0, 4.0]);
        let y = series("y", &[2.0, 4.1, 5.9, 8.0]);
        let r = simple_regression(&y, &x, false).unwrap();
        assert!((r.coefficient - 2.0).abs() < 0.05);
    }

    #[test]
    fn too_few_joined_points_is_insufficient() {
        let x = series("x", &[1.0, 2.0]);
        let y = series("y", &[1.0, 2.0, 3.0]);
        let err = simple_regression(&y, &x, true).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientData);
        assert!(err.to_string().contains("2 < 3"));
    }

    #[test]
    fn seasonal_dummies_absorb_the_cycle() {
        // y = 1.5x + monthly pattern; x is unrelated to the cycle.
        let mut rng = StdRng::seed_from_u64(23);
        let noise = Normal::new(0.0, 0.5).unwrap();
        let x: Vec<f64> = (0..48).map(|i| 10.0 + ((i * 5) % 13) as f64).collect();
        let y: Vec<f64> = x
            .iter()
            .enumerate()
            .map(|(i, v)| 1.5 * v + 30.0 * (2.0 * PI * i as f64 / 12.0).sin() + noise.sample(&mut rng))
            .collect();
        let (ys, xs) = (series("y", &y), series("x", &x));

        let seasonal = regression_with_seasonality(&ys, &xs, 12, &FiscalCalendar::default()).unwrap();
        let plain = simple_regression(&ys, &xs, true).unwrap();
        assert!((seasonal.coefficient - 1.5).abs() < 0.1, "coefficient = {}", seasonal.coefficient);
        assert!(seasonal.r_squared > plain.r_squared);
        assert!(seasonal.adj_r_squared <= seasonal.r_squared);
        assert!(seasonal.interpretation.contains("controlling for seasonality"));
    }

    #[test]
    fn seasonal_regression_needs_period_plus_three() {
        let x = series("x", &[1.0; 14]);
        let y = series("y", &[1.0; 14]);
        let err = regression_with_seasonality(&y, &x, 12, &FiscalCalendar::default()).unwrap_err();
        assert!(err.to_string().contains("14 < 15"), "{err}");
    }

    #[test]
    fn strength_bands_are_magnitude_only() {
        assert_eq!(coefficient_strength(-0.6), "strong");
        assert_eq!(coefficient_strength(0.3), "moderate");
        assert_eq!(coefficient_strength(0.2), "weak");
    }
}
