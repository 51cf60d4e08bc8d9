//! Local-linear loess smoothing with tricube weights.
//!
//! This is the smoother STL is built from. For an evaluation point `x` the
//! `span` nearest observations form the neighborhood; each gets weight
//!
//! ```text
//! w_j = ρ_j * (1 - (|x_j - x| / h)^3)^3      (0 outside the neighborhood)
//! ```
//!
//! where `h` is the distance to the farthest neighbor (widened when `span`
//! exceeds the number of observations) and `ρ_j` is an optional robustness
//! weight. A weighted straight line is then fitted and evaluated at `x`.

/// Fit at a single point. Returns `None` when every weight is zero.
pub fn loess_at(xs: &[f64], ys: &[f64], robustness: Option<&[f64]>, span: usize, x: f64) -> Option<f64> {
    let n = xs.len().min(ys.len());
    if n == 0 || span == 0 {
        return None;
    }

    // Slide a window of q points towards x; xs is sorted ascending.
    let q = span.min(n);
    let mut left = 0;
    while left + q < n && x - xs[left] > xs[left + q] - x {
        left += 1;
    }
    let right = left + q - 1;

    let mut h = (x - xs[left]).max(xs[right] - x);
    if span > n {
        h += ((span - n) / 2) as f64;
    }
    let h_near = 0.001 * h;
    let h_far = 0.999 * h;

    let mut weights = vec![0.0; n];
    let mut total = 0.0;
    for j in 0..n {
        let dist = (xs[j] - x).abs();
        let w = if h <= 0.0 {
            if dist == 0.0 { 1.0 } else { 0.0 }
        } else if dist <= h_near {
            1.0
        } else if dist <= h_far {
            (1.0 - (dist / h).powi(3)).powi(3)
        } else {
            0.0
        };
        let w = w * robustness.map_or(1.0, |r| r[j]);
        weights[j] = w;
        total += w;
    }
    if !(total > 0.0) {
        return None;
    }

    let x_bar = weights.iter().zip(xs).map(|(w, xj)| w * xj).sum::<f64>() / total;
    let y_bar = weights.iter().zip(ys).map(|(w, yj)| w * yj).sum::<f64>() / total;
    let spread = weights
        .iter()
        .zip(xs)
        .map(|(w, xj)| w * (xj - x_bar).powi(2))
        .sum::<f64>();

    let range = xs[n - 1] - xs[0];
    let fitted = if spread.sqrt() > 0.001 * range {
        let slope = weights
            .iter()
            .zip(xs.iter().zip(ys))
            .map(|(w, (xj, yj))| w * (xj - x_bar) * (yj - y_bar))
            .sum::<f64>()
            / spread;
        y_bar + slope * (x - x_bar)
    } else {
        y_bar
    };

    fitted.is_finite().then_some(fitted)
}

/// Smooth `ys` observed at positions `1..=n`, evaluated at each position.
pub fn loess_smooth(ys: &[f64], robustness: Option<&[f64]>, span: usize) -> Option<Vec<f64>> {
    let xs = positions(ys.len());
    xs.iter()
        .map(|&x| loess_at(&xs, ys, robustness, span, x))
        .collect()
}

/// Observation positions `1.0, 2.0, ..., n`.
pub fn positions(n: usize) -> Vec<f64> {
    (1..=n).map(|i| i as f64).collect()
}

/// Trailing moving average of width `width`; output has `n - width + 1` values.
pub fn moving_average(values: &[f64], width: usize) -> Vec<f64> {
    if width == 0 || values.len() < width {
        return Vec::new();
    }
    let mut out = Vec::with_capacity(values.len() - width + 1);
    let mut sum: f64 = values[..width].iter().sum();
    out.push(sum / width as f64);
    for i in width..values.len() {
        sum += values[i] - values[i - width];
        out.push(sum / width as f64);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reproduces_a_straight_line() {
        let ys: Vec<f64> = (0..20).map(|i| 3.0 + 2.0 * i as f64).collect();
        let fitted = loess_smooth(&ys, None, 7).unwrap();
        for (a, b) in fitted.iter().zip(&ys) {
            assert!((a - b).abs() < 1e-9);
        }
    }

    #[test]
    fn extrapolates_beyond_the_data() {
        let xs = positions(5);
        let ys = [1.0, 2.0, 3.0, 4.0, 5.0];
        let before = loess_at(&xs, &ys, None, 11, 0.0).unwrap();
        let after = loess_at(&xs, &ys, None, 11, 6.0).unwrap();
        assert!((before - 0.0).abs() < 1e-9);
        assert!((after - 6.0).abs() < 1e-9);
    }

    #[test]
    fn zero_robustness_weights_fail() {
        let xs = positions(4);
        let ys = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(loess_at(&xs, &ys, Some(&[0.0; 4]), 3, 2.0), None);
    }

    #[test]
    fn moving_average_window() {
        assert_eq!(moving_average(&[1.0, 2.0, 3.0, 4.0], 2), vec![1.5, 2.5, 3.5]);
        assert!(moving_average(&[1.0], 3).is_empty());
    }
}
