//! Seasonal decomposition, strength scoring, and seasonal adjustment.
//!
//! STL is the primary algorithm. If it fails internally the moving-average
//! decomposition is used instead and the result records
//! [`DecompositionMethod::MovingAverage`].

pub mod simple;
pub mod stl;

use tracing::{debug, warn};

use crate::domain::{DecompositionMethod, SeasonalDecomposition, SeasonalityMode, TimeSeries};
use crate::error::AppError;
use crate::math::loess::loess_smooth;
use crate::math::stats::variance;

use self::simple::moving_average_decomposition;
use self::stl::{stl, StlComponents, StlParams};

/// Seasonal cycle length for monthly data.
pub const MONTHLY_PERIOD: usize = 12;

/// Share of non-trend variance carried by the seasonal component.
pub fn seasonal_strength(seasonal: &[f64], residual: &[f64]) -> f64 {
    let vs = variance(seasonal);
    let vr = variance(residual);
    let total = vs + vr;
    if !(total > 0.0) {
        return 0.0;
    }
    (vs / total).clamp(0.0, 1.0)
}

/// Band label used in every seasonality interpretation.
pub fn strength_label(strength: f64) -> &'static str {
    if strength > 0.7 {
        "Strong seasonality"
    } else if strength > 0.4 {
        "Moderate seasonality"
    } else if strength > 0.2 {
        "Weak seasonality"
    } else {
        "No significant seasonality"
    }
}

fn interpret(strength: f64) -> String {
    let detail = if strength > 0.7 {
        "Seasonal component explains most variance."
    } else if strength > 0.4 {
        "Some seasonal patterns present."
    } else if strength > 0.2 {
        "Limited seasonal patterns."
    } else {
        "Seasonal component is negligible."
    };
    format!("{} (strength={strength:.2}). {detail}", strength_label(strength))
}

/// Additive decomposer tried before the moving-average fallback.
type Decomposer = fn(&[f64], usize) -> Result<StlComponents, AppError>;

fn stl_for_period(values: &[f64], period: usize) -> Result<StlComponents, AppError> {
    stl(values, &StlParams::for_period(period))
}

/// `primary` first, moving-average decomposition if it fails.
fn additive_components(
    values: &[f64],
    period: usize,
    primary: Decomposer,
) -> Result<(StlComponents, DecompositionMethod), AppError> {
    match primary(values, period) {
        Ok(c) => Ok((c, DecompositionMethod::Stl)),
        Err(err) => {
            warn!(error = %err, "STL failed; using moving-average decomposition");
            moving_average_decomposition(values, period).map(|c| (c, DecompositionMethod::MovingAverage))
        }
    }
}

fn trend_only(values: &[f64], period: usize) -> Result<(StlComponents, DecompositionMethod), AppError> {
    let n = values.len();
    match loess_smooth(values, None, StlParams::for_period(period).trend_span) {
        Some(trend) => {
            let residual = values.iter().zip(&trend).map(|(y, t)| y - t).collect();
            Ok((
                StlComponents {
                    trend,
                    seasonal: vec![0.0; n],
                    residual,
                },
                DecompositionMethod::Stl,
            ))
        }
        None => {
            let mut c = moving_average_decomposition(values, period)?;
            for (r, s) in c.residual.iter_mut().zip(&c.seasonal) {
                *r += s;
            }
            c.seasonal = vec![0.0; n];
            Ok((c, DecompositionMethod::MovingAverage))
        }
    }
}

/// Split `series` into trend, seasonal and residual components.
///
/// Requires at least two full cycles. Multiplicative mode requires strictly
/// positive values and satisfies `original = trend * seasonal * residual`.
pub fn decompose_seasonality(
    series: &TimeSeries,
    period: usize,
    mode: SeasonalityMode,
) -> Result<SeasonalDecomposition, AppError> {
    decompose_with(series, period, mode, stl_for_period)
}

fn decompose_with(
    series: &TimeSeries,
    period: usize,
    mode: SeasonalityMode,
    primary: Decomposer,
) -> Result<SeasonalDecomposition, AppError> {
    if period < 2 {
        return Err(AppError::malformed(format!("Seasonal period must be at least 2, got {period}")));
    }
    let n = series.len();
    if n < 2 * period {
        return Err(AppError::insufficient(
            format!("seasonal decomposition of '{}'", series.name),
            2 * period,
            n,
        ));
    }
    let original = series.values().to_vec();

    let (components, method, strength) = match mode {
        SeasonalityMode::Additive => {
            let (c, method) = additive_components(&original, period, primary)?;
            let strength = seasonal_strength(&c.seasonal, &c.residual);
            (c, method, strength)
        }
        SeasonalityMode::Multiplicative => {
            if original.iter().any(|v| *v <= 0.0) {
                return Err(AppError::malformed(format!(
                    "Multiplicative decomposition of '{}' requires strictly positive values",
                    series.name
                )));
            }
            let logs: Vec<f64> = original.iter().map(|v| v.ln()).collect();
            let (c, method) = additive_components(&logs, period, primary)?;
            let strength = seasonal_strength(&c.seasonal, &c.residual);
            let exp = |v: Vec<f64>| v.into_iter().map(f64::exp).collect::<Vec<_>>();
            (
                StlComponents {
                    trend: exp(c.trend),
                    seasonal: exp(c.seasonal),
                    residual: exp(c.residual),
                },
                method,
                strength,
            )
        }
        SeasonalityMode::None => {
            let (c, method) = trend_only(&original, period)?;
            (c, method, 0.0)
        }
    };

    debug!(series = %series.name, ?method, strength, "decomposed");
    Ok(SeasonalDecomposition {
        periods: series.periods().to_vec(),
        original,
        trend: components.trend,
        seasonal: components.seasonal,
        residual: components.residual,
        mode,
        method,
        period,
        seasonal_strength: strength,
        interpretation: interpret(strength),
    })
}

/// Remove the seasonal component (trend + residual). Series shorter than two
/// cycles are returned unchanged.
pub fn seasonally_adjust(series: &TimeSeries, period: usize) -> Result<TimeSeries, AppError> {
    if series.len() < 2 * period {
        warn!(
            series = %series.name,
            len = series.len(),
            required = 2 * period,
            "insufficient data for seasonal adjustment; using raw series"
        );
        return Ok(series.clone());
    }
    let decomposition = decompose_seasonality(series, period, SeasonalityMode::Additive)?;
    let adjusted = decomposition
        .trend
        .iter()
        .zip(&decomposition.residual)
        .map(|(t, r)| t + r)
        .collect();
    series.with_values(adjusted)
}

/// `(strength, interpretation)`; never fails.
pub fn detect_seasonality_strength(series: &TimeSeries, period: usize) -> (f64, String) {
    if series.len() < 2 * period {
        return (0.0, "Insufficient data for seasonality detection".to_string());
    }
    match decompose_seasonality(series, period, SeasonalityMode::Additive) {
        Ok(d) => {
            let s = d.seasonal_strength;
            (s, format!("{} ({s:.2})", strength_label(s)))
        }
        Err(err) => {
            warn!(series = %series.name, error = %err, "seasonality detection failed");
            (0.0, format!("Error: {err}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Frequency;
    use chrono::NaiveDate;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use rand_distr::{Distribution, Normal};
    use std::f64::consts::PI;

    fn start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2021, 1, 1).unwrap()
    }

    fn seasonal_series(n: usize, seed: u64) -> TimeSeries {
        let mut rng = StdRng::seed_from_u64(seed);
        let noise = Normal::new(0.0, 10.0).unwrap();
        let values: Vec<f64> = (0..n)
            .map(|i| {
                let i = i as f64;
                1000.0 + (2.0 * PI * i / 12.0).sin() * 100.0 + 10.0 * i + noise.sample(&mut rng)
            })
            .collect();
        TimeSeries::consecutive("revenue", Frequency::Monthly, start(), &values)
    }

    #[test]
    fn seasonal_sine_is_detected() {
        let series = seasonal_series(36, 7);
        let (strength, interp) = detect_seasonality_strength(&series, 12);
        assert!(strength > 0.3, "strength = {strength}");
        assert!(interp.contains("seasonality"));
    }

    #[test]
    fn additive_components_sum_to_original() {
        for (n, seed) in [(24, 1), (36, 2), (60, 3)] {
            let series = seasonal_series(n, seed);
            let d = decompose_seasonality(&series, 12, SeasonalityMode::Additive).unwrap();
            assert_eq!(d.trend.len(), n);
            for i in 0..n {
                let rebuilt = d.trend[i] + d.seasonal[i] + d.residual[i];
                assert!((rebuilt - d.original[i]).abs() < 1e-6);
            }
            assert!((0.0..=1.0).contains(&d.seasonal_strength));
        }
    }

    #[test]
    fn multiplicative_components_multiply_to_original() {
        let series = seasonal_series(36, 11);
        let d = decompose_seasonality(&series, 12, SeasonalityMode::Multiplicative).unwrap();
        for i in 0..36 {
            let rebuilt = d.trend[i] * d.seasonal[i] * d.residual[i];
            assert!((rebuilt / d.original[i] - 1.0).abs() < 1e-9);
        }

        let negative = TimeSeries::consecutive("neg", Frequency::Monthly, start(), &[-1.0; 24]);
        let err = decompose_seasonality(&negative, 12, SeasonalityMode::Multiplicative).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::MalformedInput);
    }

    fn failing_decomposer(_: &[f64], _: usize) -> Result<StlComponents, AppError> {
        Err(AppError::computation("STL trend smoothing failed"))
    }

    #[test]
    fn failed_stl_falls_back_to_moving_average() {
        let series = seasonal_series(36, 4);
        let d = decompose_with(&series, 12, SeasonalityMode::Additive, failing_decomposer).unwrap();
        assert_eq!(d.method, DecompositionMethod::MovingAverage);
        for i in 0..36 {
            let rebuilt = d.trend[i] + d.seasonal[i] + d.residual[i];
            assert!((rebuilt - d.original[i]).abs() < 1e-6);
        }
        assert!(d.seasonal_strength > 0.3, "strength = {}", d.seasonal_strength);

        let m = decompose_with(&series, 12, SeasonalityMode::Multiplicative, failing_decomposer).unwrap();
        assert_eq!(m.method, DecompositionMethod::MovingAverage);
        for i in 0..36 {
            let rebuilt = m.trend[i] * m.seasonal[i] * m.residual[i];
            assert!((rebuilt / m.original[i] - 1.0).abs() < 1e-9);
        }

        let d = decompose_seasonality(&series, 12, SeasonalityMode::Additive).unwrap();
        assert_eq!(d.method, DecompositionMethod::Stl);
    }

    #[test]
    fn trend_only_mode_has_zero_seasonality() {
        let d = decompose_seasonality(&seasonal_series(30, 5), 12, SeasonalityMode::None).unwrap();
        assert!(d.seasonal.iter().all(|s| *s == 0.0));
        assert_eq!(d.seasonal_strength, 0.0);
    }

    #[test]
    fn short_series_fails_with_required_count() {
        let short = seasonal_series(20, 1);
        let err = decompose_seasonality(&short, 12, SeasonalityMode::Additive).unwrap_err();
        assert!(err.to_string().contains("20 < 24"), "{err}");
    }

    #[test]
    fn short_series_is_adjusted_unchanged() {
        let short = seasonal_series(18, 3);
        let adjusted = seasonally_adjust(&short, 12).unwrap();
        assert_eq!(adjusted, short);
    }

    #[test]
    fn adjustment_removes_seasonal_swing() {
        let series = seasonal_series(48, 9);
        let adjusted = seasonally_adjust(&series, 12).unwrap();
        assert_eq!(adjusted.periods(), series.periods());
        let (strength, _) = detect_seasonality_strength(&adjusted, 12);
        let (before, _) = detect_seasonality_strength(&series, 12);
        assert!(strength < before);
    }

    #[test]
    fn strength_is_zero_without_variance() {
        assert_eq!(seasonal_strength(&[0.0; 12], &[0.0; 12]), 0.0);
        assert_eq!(seasonal_strength(&[0.0; 12], &[1.0, -1.0, 1.0, -1.0]), 0.0);
        assert_eq!(strength_label(0.75), "Strong seasonality");
        assert_eq!(strength_label(0.2), "No significant seasonality");
    }
}
