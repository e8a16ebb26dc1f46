//! Deterministic box-bounded Nelder–Mead minimizer.
//!
//! Points outside the bounds evaluate to [`OUT_OF_BOUNDS_PENALTY`], which
//! pushes the simplex back inside without any gradient information. The
//! initial simplex is built inside the box, so the best vertex is always
//! feasible.

use serde::{Deserialize, Serialize};

/// Objective value assigned to infeasible or non-finite points.
pub const OUT_OF_BOUNDS_PENALTY: f64 = 1e12;

/// Axis-aligned box constraints.
#[derive(Debug, Clone, PartialEq)]
pub struct Bounds {
    lower: Vec<f64>,
    upper: Vec<f64>,
}

impl Bounds {
    /// Build bounds from per-dimension limits. Returns `None` when the
    /// dimensions disagree or any lower limit exceeds its upper limit.
    pub fn new(lower: Vec<f64>, upper: Vec<f64>) -> Option<Self> {
        if lower.len() != upper.len() || lower.iter().zip(&upper).any(|(lo, hi)| !(lo <= hi)) {
            return None;
        }
        Some(Self { lower, upper })
    }

    pub fn dim(&self) -> usize {
        self.lower.len()
    }

    pub fn lower(&self) -> &[f64] {
        &self.lower
    }

    pub fn upper(&self) -> &[f64] {
        &self.upper
    }

    pub fn contains(&self, x: &[f64]) -> bool {
        x.len() == self.dim()
            && x
                .iter()
                .zip(self.lower.iter().zip(&self.upper))
                .all(|(v, (lo, hi))| *v >= *lo && *v <= *hi)
    }

    /// Project `x` onto the box.
    pub fn clamp(&self, x: &[f64]) -> Vec<f64> {
        x.iter()
            .zip(self.lower.iter().zip(&self.upper))
            .map(|(v, (lo, hi))| v.clamp(*lo, *hi))
            .collect()
    }

    /// Point at fractional position `t` (0..=1 per axis) inside the box.
    pub fn interpolate(&self, t: &[f64]) -> Vec<f64> {
        t.iter()
            .zip(self.lower.iter().zip(&self.upper))
            .map(|(t, (lo, hi))| lo + t.clamp(0.0, 1.0) * (hi - lo))
            .collect()
    }
}

/// Result of a minimization run.
#[derive(Debug, Clone, PartialEq)]
pub struct Minimum {
    pub x: Vec<f64>,
    pub value: f64,
    pub iterations: usize,
    pub evaluations: usize,
    pub converged: bool,
}

/// Nelder–Mead settings. Coefficients are the standard ones
/// (reflection 1, expansion 2, contraction 0.5, shrink 0.5).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NelderMead {
    pub max_iterations: usize,
    /// Convergence when every vertex lies within this distance of the best (per axis)...
    pub x_tolerance: f64,
    /// ...and every vertex value lies within this distance of the best value.
    pub f_tolerance: f64,
    /// Initial simplex edge as a fraction of each bound width.
    pub initial_step: f64,
}

impl Default for NelderMead {
    fn default() -> Self {
        Self {
            max_iterations: 5000,
            x_tolerance: 1e-4,
            f_tolerance: 1e-4,
            initial_step: 0.05,
        }
    }
}

impl NelderMead {
    /// Minimize `objective` starting from `start` (clamped into `bounds`).
    pub fn minimize<F>(&self, mut objective: F, start: &[f64], bounds: &Bounds) -> Minimum
    where
        F: FnMut(&[f64]) -> f64,
    {
        let n = bounds.dim();
        let mut evaluations = 0usize;
        let mut eval = |x: &[f64]| -> f64 {
            evaluations += 1;
            if !bounds.contains(x) {
                return OUT_OF_BOUNDS_PENALTY;
            }
            let v = objective(x);
            if v.is_finite() { v } else { OUT_OF_BOUNDS_PENALTY }
        };

        let x0 = bounds.clamp(start);
        let mut simplex: Vec<Vec<f64>> = Vec::with_capacity(n + 1);
        simplex.push(x0.clone());
        for i in 0..n {
            let mut vertex = x0.clone();
            let width = bounds.upper[i] - bounds.lower[i];
            let step = if width.is_finite() && width > 0.0 {
                self.initial_step * width
            } else if x0[i] != 0.0 {
                0.05 * x0[i].abs()
            } else {
                0.00025
            };
            vertex[i] = if x0[i] + step <= bounds.upper[i] {
                x0[i] + step
            } else {
                x0[i] - step
            };
            simplex.push(vertex);
        }
        let mut values: Vec<f64> = simplex.iter().map(|v| eval(v)).collect();

        let mut iterations = 0usize;
        let mut converged = false;

        while iterations < self.max_iterations {
            order_simplex(&mut simplex, &mut values);

            let f_spread = values[1..]
                .iter()
                .map(|v| (v - values[0]).abs())
                .fold(0.0f64, f64::max);
            let x_spread = simplex[1..]
                .iter()
                .flat_map(|v| v.iter().zip(&simplex[0]).map(|(a, b)| (a - b).abs()))
                .fold(0.0f64, f64::max);
            if f_spread <= self.f_tolerance && x_spread <= self.x_tolerance {
                converged = true;
                break;
            }
            iterations += 1;

            let centroid: Vec<f64> = (0..n)
                .map(|j| simplex[..n].iter().map(|v| v[j]).sum::<f64>() / n as f64)
                .collect();
            let worst = simplex[n].clone();
            let along = |t: f64| -> Vec<f64> {
                centroid
                    .iter()
                    .zip(&worst)
                    .map(|(c, w)| c + t * (c - w))
                    .collect()
            };

            let reflected = along(1.0);
            let f_reflected = eval(&reflected);

            if f_reflected < values[0] {
                let expanded = along(2.0);
                let f_expanded = eval(&expanded);
                if f_expanded < f_reflected {
                    simplex[n] = expanded;
                    values[n] = f_expanded;
                } else {
                    simplex[n] = reflected;
                    values[n] = f_reflected;
                }
                continue;
            }

            if f_reflected < values[n - 1] {
                simplex[n] = reflected;
                values[n] = f_reflected;
                continue;
            }

            let (contracted, f_contracted, accept) = if f_reflected < values[n] {
                let c = along(0.5);
                let f = eval(&c);
                let ok = f <= f_reflected;
                (c, f, ok)
            } else {
                let c = along(-0.5);
                let f = eval(&c);
                let ok = f < values[n];
                (c, f, ok)
            };

            if accept {
                simplex[n] = contracted;
                values[n] = f_contracted;
                continue;
            }

            // Shrink toward the best vertex.
            let best = simplex[0].clone();
            for k in 1..=n {
                let shrunk: Vec<f64> = simplex[k]
                    .iter()
                    .zip(&best)
                    .map(|(v, b)| b + 0.5 * (v - b))
                    .collect();
                values[k] = eval(&shrunk);
                simplex[k] = shrunk;
            }
        }

        order_simplex(&mut simplex, &mut values);
        Minimum {
            x: simplex.swap_remove(0),
            value: values[0],
            iterations,
            evaluations,
            converged,
        }
    }
}

/// Sort vertices by ascending objective value (stable, so ties keep age order).
fn order_simplex(simplex: &mut Vec<Vec<f64>>, values: &mut Vec<f64>) {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));
    *simplex = order.iter().map(|&i| simplex[i].clone()).collect();
    *values = order.iter().map(|&i| values[i]).collect();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_box(n: usize, lo: f64, hi: f64) -> Bounds {
        Bounds::new(vec![lo; n], vec![hi; n]).unwrap()
    }

    #[test]
    fn test_bounds_rejects_inverted_limits() {
        assert!(Bounds::new(vec![1.0], vec![0.0]).is_none());
        assert!(Bounds::new(vec![0.0, 0.0], vec![1.0]).is_none());
        assert!(Bounds::new(vec![f64::NAN], vec![1.0]).is_none());
    }

    #[test]
    fn test_bounds_clamp_and_contains() {
        let b = unit_box(2, 0.0, 1.0);
        assert!(b.contains(&[0.0, 1.0]));
        assert!(!b.contains(&[-0.1, 0.5]));
        assert_eq!(b.clamp(&[-3.0, 7.0]), vec![0.0, 1.0]);
        assert_eq!(b.interpolate(&[0.5, 0.25]), vec![0.5, 0.25]);
    }

    #[test]
    fn test_minimize_quadratic() {
        let b = unit_box(2, -10.0, 10.0);
        let result = NelderMead::default().minimize(
            |x| (x[0] - 3.0).powi(2) + (x[1] + 1.5).powi(2),
            &[0.0, 0.0],
            &b,
        );
        assert!(result.converged);
        assert!((result.x[0] - 3.0).abs() < 1e-3);
        assert!((result.x[1] + 1.5).abs() < 1e-3);
    }

    #[test]
    fn test_minimize_rosenbrock() {
        let b = unit_box(2, -5.0, 5.0);
        let result = NelderMead::default().minimize(
            |x| 100.0 * (x[1] - x[0] * x[0]).powi(2) + (1.0 - x[0]).powi(2),
            &[-1.2, 1.0],
            &b,
        );
        assert!(result.converged);
        assert!((result.x[0] - 1.0).abs() < 1e-2);
        assert!((result.x[1] - 1.0).abs() < 1e-2);
    }

    #[test]
    fn test_minimum_on_boundary_stays_feasible() {
        // Unconstrained minimum at x = -4 lies outside [0, 10].
        let b = unit_box(1, 0.0, 10.0);
        let result = NelderMead::default().minimize(|x| (x[0] + 4.0).powi(2), &[5.0], &b);
        assert!(b.contains(&result.x));
        assert!(result.x[0] < 1e-3);
    }

    #[test]
    fn test_start_outside_bounds_is_clamped() {
        let b = unit_box(1, 0.0, 1.0);
        let result = NelderMead::default().minimize(|x| (x[0] - 0.5).powi(2), &[40.0], &b);
        assert!(result.converged);
        assert!((result.x[0] - 0.5).abs() < 1e-3);
    }

    #[test]
    fn test_iteration_cap_reports_non_convergence() {
        let b = unit_box(2, -5.0, 5.0);
        let nm = NelderMead {
            max_iterations: 3,
            ..Default::default()
        };
        let result = nm.minimize(
            |x| 100.0 * (x[1] - x[0] * x[0]).powi(2) + (1.0 - x[0]).powi(2),
            &[-1.2, 1.0],
            &b,
        );
        assert!(!result.converged);
        assert_eq!(result.iterations, 3);
    }

    #[test]
    fn test_nan_objective_is_penalized() {
        let b = unit_box(1, -1.0, 1.0);
        let result = NelderMead::default().minimize(
            |x| if x[0] > 0.5 { f64::NAN } else { (x[0] - 0.2).powi(2) },
            &[0.0],
            &b,
        );
        assert!((result.x[0] - 0.2).abs() < 1e-3);
    }

    #[test]
    fn test_deterministic() {
        let b = unit_box(3, -2.0, 2.0);
        let f = |x: &[f64]| x.iter().map(|v| (v - 0.3).powi(4)).sum::<f64>();
        let a = NelderMead::default().minimize(f, &[1.0, -1.0, 0.0], &b);
        let c = NelderMead::default().minimize(f, &[1.0, -1.0, 0.0], &b);
        assert_eq!(a, c);
    }
}
