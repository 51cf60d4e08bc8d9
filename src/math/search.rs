//! Derivative-free maximization: a parallel grid scan followed by a
//! Hooke-Jeeves style compass search.
//!
//! Volatility likelihoods are cheap to evaluate but have awkward constraint
//! boundaries, so we:
//!
//! 1. score every point of a coarse grid in parallel and keep the best
//!    (ties resolve to the lowest grid index, so results are deterministic);
//! 2. refine from there by trying `±step` along each coordinate, halving the
//!    steps whenever no trial improves.
//!
//! Objectives return `None` for infeasible points.

use rayon::prelude::*;

/// Best grid point as `(index, value)`.
pub fn grid_search<F>(grid: &[Vec<f64>], objective: F) -> Option<(usize, f64)>
where
    F: Fn(&[f64]) -> Option<f64> + Sync,
{
    let scored: Vec<(usize, f64)> = grid
        .par_iter()
        .enumerate()
        .filter_map(|(idx, point)| {
            objective(point)
                .filter(|v| v.is_finite())
                .map(|v| (idx, v))
        })
        .collect();

    let mut best = *scored.first()?;
    for &(idx, value) in &scored[1..] {
        if value > best.1 || (value == best.1 && idx < best.0) {
            best = (idx, value);
        }
    }
    Some(best)
}

#[derive(Debug, Clone, Copy)]
pub struct PatternSearchOptions {
    /// Stop once every step is below this.
    pub tolerance: f64,
    pub max_evaluations: usize,
}

impl Default for PatternSearchOptions {
    fn default() -> Self {
        Self {
            tolerance: 1e-6,
            max_evaluations: 5_000,
        }
    }
}

/// Maximize `objective` starting from a feasible `start`.
///
/// Returns the best point and its value; `None` if `start` is infeasible.
pub fn pattern_search<F>(
    start: Vec<f64>,
    initial_steps: Vec<f64>,
    objective: F,
    opts: PatternSearchOptions,
) -> Option<(Vec<f64>, f64)>
where
    F: Fn(&[f64]) -> Option<f64>,
{
    let score = |x: &[f64]| objective(x).filter(|v| v.is_finite());

    let mut best_x = start;
    let mut best_f = score(&best_x)?;
    let mut steps = initial_steps;
    let mut evaluations = 1;

    while evaluations < opts.max_evaluations && steps.iter().any(|s| *s > opts.tolerance) {
        let mut improved = false;
        for i in 0..best_x.len() {
            for direction in [1.0, -1.0] {
                let mut trial = best_x.clone();
                trial[i] += direction * steps[i];
                evaluations += 1;
                if let Some(f) = score(&trial) {
                    if f > best_f {
                        best_f = f;
                        best_x = trial;
                        improved = true;
                        break;
                    }
                }
            }
        }
        if !improved {
            for s in &mut steps {
                *s *= 0.5;
            }
        }
    }

    Some((best_x, best_f))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_search_breaks_ties_by_index() {
        let grid = vec![vec![1.0], vec![-1.0], vec![2.0]];
        let (idx, value) = grid_search(&grid, |p| Some(-(p[0] * p[0]))).unwrap();
        assert_eq!(idx, 0);
        assert_eq!(value, -1.0);

        let grid = vec![vec![2.0], vec![0.5]];
        assert_eq!(grid_search(&grid, |p| Some(-(p[0] * p[0]))).unwrap().0, 1);
    }

    #[test]
    fn grid_search_skips_infeasible_points() {
        let grid = vec![vec![-1.0], vec![3.0]];
        let best = grid_search(&grid, |p| (p[0] > 0.0).then_some(p[0]));
        assert_eq!(best, Some((1, 3.0)));
        assert_eq!(grid_search(&grid, |_| None), None);
    }

    #[test]
    fn pattern_search_finds_quadratic_peak() {
        let objective = |p: &[f64]| Some(-((p[0] - 0.3).powi(2) + (p[1] + 0.2).powi(2)));
        let (x, f) = pattern_search(
            vec![0.0, 0.0],
            vec![0.1, 0.1],
            objective,
            PatternSearchOptions::default(),
        )
        .unwrap();
        assert!((x[0] - 0.3).abs() < 1e-4);
        assert!((x[1] + 0.2).abs() < 1e-4);
        assert!(f <= 0.0);
    }

    #[test]
    fn pattern_search_respects_feasible_region() {
        // Peak at -1 but only x >= 0 is feasible.
        let objective = |p: &[f64]| (p[0] >= 0.0).then(|| -(p[0] + 1.0).powi(2));
        let (x, _) = pattern_search(vec![0.5], vec![0.1], objective, PatternSearchOptions::default()).unwrap();
        assert!(x[0] >= 0.0 && x[0] < 1e-4);
    }
}
