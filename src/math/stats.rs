//! Descriptive statistics and reference distributions.
//!
//! p-values come from `statrs` (Student-t, chi-squared). Helpers here never
//! panic on degenerate input: zero variance, too few points, or non-finite
//! statistics resolve to the neutral answer (`r = 0`, `p = 1`).

use statrs::distribution::{ChiSquared, ContinuousCDF, StudentsT};

use crate::error::AppError;

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population variance (divides by `n`).
pub fn variance(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64
}

pub fn median(values: &[f64]) -> Option<f64> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        Some(sorted[mid])
    } else {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    }
}

/// Pearson coefficient clamped to `[-1, 1]`. `None` when either side has
/// zero variance or fewer than two points.
pub fn pearson(x: &[f64], y: &[f64]) -> Option<f64> {
    let n = x.len().min(y.len());
    if n < 2 {
        return None;
    }
    let (x, y) = (&x[..n], &y[..n]);
    let (mx, my) = (mean(x), mean(y));

    let mut sxy = 0.0;
    let mut sxx = 0.0;
    let mut syy = 0.0;
    for (a, b) in x.iter().zip(y) {
        let dx = a - mx;
        let dy = b - my;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    if sxx <= 0.0 || syy <= 0.0 {
        return None;
    }
    let r = sxy / (sxx.sqrt() * syy.sqrt());
    r.is_finite().then(|| r.clamp(-1.0, 1.0))
}

/// 1-based ranks with ties sharing their average rank.
pub fn average_ranks(values: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| {
        values[a]
            .partial_cmp(&values[b])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut ranks = vec![0.0; values.len()];
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && values[order[end]] == values[order[start]] {
            end += 1;
        }
        // Positions start..end (0-based) share ranks start+1..=end.
        let rank = (start + end + 1) as f64 / 2.0;
        for &idx in &order[start..end] {
            ranks[idx] = rank;
        }
        start = end;
    }
    ranks
}

/// Two-sided p-value of a correlation coefficient from `n` pairs, via the
/// t-statistic `r * sqrt((n - 2) / (1 - r²))` on `n - 2` degrees of freedom.
pub fn correlation_p_value(r: f64, n: usize) -> f64 {
    if n < 3 || !r.is_finite() {
        return 1.0;
    }
    let denom = 1.0 - r * r;
    if denom <= 0.0 {
        return 0.0;
    }
    let t = r * ((n as f64 - 2.0) / denom).sqrt();
    student_t_two_sided_p(t, n as f64 - 2.0)
}

/// `P(|T| >= |t|)` for Student-t with `df` degrees of freedom.
pub fn student_t_two_sided_p(t: f64, df: f64) -> f64 {
    if t.is_nan() || !(df > 0.0) {
        return 1.0;
    }
    if t.is_infinite() {
        return 0.0;
    }
    match StudentsT::new(0.0, 1.0, df) {
        Ok(dist) => (2.0 * dist.sf(t.abs())).clamp(0.0, 1.0),
        Err(_) => 1.0,
    }
}

/// Quantile of the standard Student-t distribution.
pub fn student_t_critical(prob: f64, df: f64) -> f64 {
    match StudentsT::new(0.0, 1.0, df) {
        Ok(dist) if df > 0.0 => dist.inverse_cdf(prob),
        _ => f64::NAN,
    }
}

/// Upper-tail probability of a chi-squared statistic.
pub fn chi_squared_sf(stat: f64, df: usize) -> f64 {
    if !stat.is_finite() || df == 0 {
        return 1.0;
    }
    if stat <= 0.0 {
        return 1.0;
    }
    match ChiSquared::new(df as f64) {
        Ok(dist) => dist.sf(stat).clamp(0.0, 1.0),
        Err(_) => 1.0,
    }
}

/// Sample autocorrelation at lags `1..=max_lag`.
pub fn autocorrelations(values: &[f64], max_lag: usize) -> Vec<f64> {
    let n = values.len();
    let m = mean(values);
    let denom: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    (1..=max_lag)
        .map(|k| {
            if denom <= 0.0 || k >= n {
                return 0.0;
            }
            let num: f64 = (k..n).map(|t| (values[t] - m) * (values[t - k] - m)).sum();
            num / denom
        })
        .collect()
}

/// Ljung-Box portmanteau test. Returns `(Q, p)` with `Q ~ χ²(lags)`.
pub fn ljung_box(values: &[f64], lags: usize) -> Result<(f64, f64), AppError> {
    let n = values.len();
    if lags == 0 {
        return Err(AppError::malformed("Ljung-Box needs at least one lag"));
    }
    if n <= lags + 1 {
        return Err(AppError::insufficient("Ljung-Box test", lags + 2, n));
    }
    let acf = autocorrelations(values, lags);
    let nf = n as f64;
    let q = nf
        * (nf + 2.0)
        * acf
            .iter()
            .enumerate()
            .map(|(i, rho)| rho * rho / (nf - (i + 1) as f64))
            .sum::<f64>();
    if !q.is_finite() {
        return Err(AppError::computation("Ljung-Box statistic is not finite"));
    }
    Ok((q, chi_squared_sf(q, lags)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pearson_handles_perfect_and_degenerate_inputs() {
        let x = [1.0, 2.0, 3.0, 4.0];
        assert!((pearson(&x, &[2.0, 4.0, 6.0, 8.0]).unwrap() - 1.0).abs() < 1e-12);
        assert!((pearson(&x, &[8.0, 6.0, 4.0, 2.0]).unwrap() + 1.0).abs() < 1e-12);
        assert_eq!(pearson(&x, &[5.0; 4]), None);
        assert_eq!(pearson(&[1.0], &[1.0]), None);
    }

    #[test]
    fn average_ranks_share_ties() {
        assert_eq!(average_ranks(&[10.0, 30.0, 20.0, 20.0]), vec![1.0, 4.0, 2.5, 2.5]);
    }

    #[test]
    fn correlation_p_value_edges() {
        assert_eq!(correlation_p_value(0.9, 2), 1.0);
        assert_eq!(correlation_p_value(1.0, 10), 0.0);
        assert!((correlation_p_value(0.0, 10) - 1.0).abs() < 1e-12);
        let p = correlation_p_value(0.6, 20);
        assert!(p > 0.001 && p < 0.01, "p = {p}");
    }

    #[test]
    fn t_quantile_matches_tables() {
        // t_{0.975, 10} = 2.228
        assert!((student_t_critical(0.975, 10.0) - 2.228).abs() < 1e-3);
        assert!((student_t_two_sided_p(2.228, 10.0) - 0.05).abs() < 1e-3);
    }

    #[test]
    fn chi_squared_tail_matches_tables() {
        // χ²_{0.95, 1} = 3.841
        assert!((chi_squared_sf(3.841, 1) - 0.05).abs() < 1e-3);
        assert_eq!(chi_squared_sf(0.0, 3), 1.0);
    }

    #[test]
    fn ljung_box_flags_autocorrelated_series() {
        let trending: Vec<f64> = (0..60).map(|i| i as f64).collect();
        let (_, p) = ljung_box(&trending, 10).unwrap();
        assert!(p < 0.01);

        assert!(ljung_box(&[1.0, 2.0, 3.0], 10).is_err());
    }

    #[test]
    fn median_of_even_length() {
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), Some(2.5));
        assert_eq!(median(&[]), None);
    }
}
