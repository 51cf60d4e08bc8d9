//! Moving-average decomposition used when STL cannot run.
//!
//! trend = centered rolling mean (edges filled from the nearest computed
//! value), seasonal = mean of the detrended values per cycle phase centered
//! to zero, residual = detrended - seasonal.

use crate::error::AppError;
use crate::math::stats::mean;
use crate::seasonal::stl::StlComponents;

pub fn moving_average_decomposition(y: &[f64], period: usize) -> Result<StlComponents, AppError> {
    let n = y.len();
    if period == 0 {
        return Err(AppError::malformed("Seasonal period must be positive"));
    }
    if n < 2 {
        return Err(AppError::insufficient("moving-average decomposition", 2, n));
    }

    let trend = centered_rolling_mean(y, period.min(n / 4).max(2));
    let detrended: Vec<f64> = y.iter().zip(&trend).map(|(a, t)| a - t).collect();

    let mut phase_means: Vec<f64> = (0..period)
        .map(|phase| {
            let values: Vec<f64> = detrended.iter().skip(phase).step_by(period).copied().collect();
            mean(&values)
        })
        .collect();
    let phases_present = period.min(n);
    let center = mean(&phase_means[..phases_present]);
    for m in &mut phase_means[..phases_present] {
        *m -= center;
    }

    let seasonal: Vec<f64> = (0..n).map(|i| phase_means[i % period]).collect();
    let residual: Vec<f64> = detrended.iter().zip(&seasonal).map(|(d, s)| d - s).collect();

    Ok(StlComponents {
        trend,
        seasonal,
        residual,
    })
}

/// Rolling mean of width `window` labelled at the window center; the
/// undefined ends are back/forward filled.
fn centered_rolling_mean(values: &[f64], window: usize) -> Vec<f64> {
    let n = values.len();
    let window = window.min(n).max(1);
    let mut out: Vec<Option<f64>> = vec![None; n];
    for (i, slot) in out.iter_mut().enumerate() {
        let end = i + window / 2;
        if end >= n || end + 1 < window {
            continue;
        }
        let start = end + 1 - window;
        *slot = Some(mean(&values[start..=end]));
    }

    let first = out.iter().flatten().next().copied();
    let mut last = first;
    out.into_iter()
        .map(|v| {
            if v.is_some() {
                last = v;
            }
            v.or(last).or(first).unwrap_or(0.0)
        })
        .collect()
}
