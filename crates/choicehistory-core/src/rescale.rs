//! Contrast rescaling from per-contrast drift rates.
//!
//! Drift rate grows with contrast but levels off at high contrasts. Fitting
//! `a * tanh(b * x)` to the subject-averaged drift per contrast gives a
//! rescaled stimulus that the drift depends on linearly.

use std::path::Path;

use choicehistory_psychofit::{Bounds, NelderMead};
use serde::{Deserialize, Serialize};

use crate::ddm::WideTable;
use crate::error::Result;
use crate::stats::mean;
use crate::table::{fmt_opt, write_table};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DriftPoint {
    pub contrast: f64,
    /// Mean over subjects with an estimate.
    pub drift: f64,
    pub n_subjects: usize,
}

/// Mean drift per contrast from `parameter(contrast)` columns, e.g.
/// `v(-12.5)`. Columns whose condition is not a number are ignored. Sorted by
/// contrast.
pub fn drift_by_contrast(table: &WideTable, parameter: &str) -> Vec<DriftPoint> {
    let mut points: Vec<DriftPoint> = table
        .columns
        .iter()
        .enumerate()
        .filter_map(|(c, name)| {
            let condition = name.strip_prefix(parameter)?.strip_prefix('(')?.strip_suffix(')')?;
            let contrast: f64 = condition.trim().parse().ok()?;
            let values: Vec<f64> = table
                .rows
                .iter()
                .filter_map(|(_, row)| row[c])
                .filter(|v| v.is_finite())
                .collect();
            let drift = mean(values.iter().copied())?;
            Some(DriftPoint {
                contrast,
                drift,
                n_subjects: values.len(),
            })
        })
        .collect();
    points.sort_by(|a, b| a.contrast.total_cmp(&b.contrast));
    points
}

/// Fitted `a * tanh(b * x)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TanhFit {
    pub a: f64,
    pub b: f64,
    /// Sum of squared residuals.
    pub sse: f64,
    pub converged: bool,
}

impl TanhFit {
    pub fn rescale(&self, contrast: f64) -> f64 {
        self.a * (self.b * contrast).tanh()
    }
}

const FALLBACK_START: [f64; 2] = [3.0, 0.4];

/// Least-squares fit of `a * tanh(b * x)` to `(contrast, drift)` points.
///
/// Needs two points with a nonzero contrast. Drift is taken as increasing
/// with contrast, so `a` and `b` are kept positive.
pub fn fit_tanh(points: &[DriftPoint]) -> Option<TanhFit> {
    let finite: Vec<(f64, f64)> = points
        .iter()
        .filter(|p| p.contrast.is_finite() && p.drift.is_finite())
        .map(|p| (p.contrast, p.drift))
        .collect();
    let informative: Vec<f64> = finite
        .iter()
        .filter(|(x, _)| *x != 0.0)
        .map(|(x, _)| x.abs())
        .collect();
    if informative.len() < 2 {
        log::warn!("tanh rescale needs two nonzero contrasts, got {}", informative.len());
        return None;
    }

    let max_drift = finite.iter().map(|(_, y)| y.abs()).fold(0.0, f64::max);
    let bounds = Bounds::new(vec![0.0, 1e-4], vec![4.0 * max_drift + 1.0, 1.0])?;
    let sse = |p: &[f64]| -> f64 {
        finite
            .iter()
            .map(|(x, y)| (y - p[0] * (p[1] * x).tanh()).powi(2))
            .sum()
    };
    let optimizer = NelderMead {
        x_tolerance: 1e-9,
        f_tolerance: 1e-12,
        ..Default::default()
    };

    let scale = informative.iter().sum::<f64>() / informative.len() as f64;
    let starts = [[max_drift, 1.0 / scale], FALLBACK_START];
    let best = starts
        .iter()
        .map(|start| optimizer.minimize(sse, start, &bounds))
        .min_by(|a, b| a.value.total_cmp(&b.value))?;

    if !best.converged {
        log::warn!("tanh rescale stopped after {} iterations", best.iterations);
    }
    log::debug!(
        "tanh rescale: a = {:.4}, b = {:.5}, sse = {:.3e}",
        best.x[0],
        best.x[1],
        best.value
    );
    Some(TanhFit {
        a: best.x[0],
        b: best.x[1],
        sse: best.value,
        converged: best.converged,
    })
}

/// Drift points with their rescaled contrast.
pub fn write_rescaled(path: &Path, points: &[DriftPoint], fit: Option<&TanhFit>) -> Result<()> {
    let rows: Vec<Vec<String>> = points
        .iter()
        .map(|p| {
            vec![
                p.contrast.to_string(),
                p.drift.to_string(),
                p.n_subjects.to_string(),
                fmt_opt(fit.map(|f| f.rescale(p.contrast))),
            ]
        })
        .collect();
    write_table(path, &["signed_contrast", "drift", "n_subjects", "new_contrast"], &rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ddm::results_long_to_wide;

    const CONTRASTS: [f64; 11] = [
        -100.0, -50.0, -25.0, -12.5, -6.25, 0.0, 6.25, 12.5, 25.0, 50.0, 100.0,
    ];

    fn points(a: f64, b: f64) -> Vec<DriftPoint> {
        CONTRASTS
            .iter()
            .map(|&x| DriftPoint {
                contrast: x,
                drift: a * (b * x).tanh(),
                n_subjects: 1,
            })
            .collect()
    }

    #[test]
    fn test_drift_by_contrast_averages_subjects() {
        let entries: Vec<(String, f64)> = [
            ("v_subj(-12.5).a", -1.0),
            ("v_subj(-12.5).b", -2.0),
            ("v_subj(100.0).a", 3.0),
            ("v_subj(0.0).b", 0.1),
            ("z_subj(0.0).a", 0.5),
            ("v_Intercept_subj.a", 9.0),
        ]
        .iter()
        .map(|(n, v)| (n.to_string(), *v))
        .collect();
        let wide = results_long_to_wide(&entries);
        let pts = drift_by_contrast(&wide, "v");
        let got: Vec<(f64, f64, usize)> = pts.iter().map(|p| (p.contrast, p.drift, p.n_subjects)).collect();
        assert_eq!(got, vec![(-12.5, -1.5, 2), (0.0, 0.1, 1), (100.0, 3.0, 1)]);
    }

    #[test]
    fn test_fit_recovers_saturating_drift() {
        let fit = fit_tanh(&points(2.137, 0.0532)).unwrap();
        assert!((fit.a - 2.137).abs() < 1e-3, "a = {}", fit.a);
        assert!((fit.b - 0.0532).abs() < 1e-4, "b = {}", fit.b);
        assert!(fit.sse < 1e-6);
        assert!((fit.rescale(100.0) - 2.137 * (5.32f64).tanh()).abs() < 1e-2);
        assert_eq!(fit.rescale(0.0), 0.0);
    }

    #[test]
    fn test_fit_with_noise_stays_close() {
        let mut pts = points(1.5, 0.08);
        let noise = [0.02, -0.01, 0.015, -0.02, 0.01, 0.0, -0.01, 0.02, -0.015, 0.01, -0.02];
        for (p, e) in pts.iter_mut().zip(noise) {
            p.drift += e;
        }
        let fit = fit_tanh(&pts).unwrap();
        assert!((fit.a - 1.5).abs() < 0.05, "a = {}", fit.a);
        assert!((fit.b - 0.08).abs() < 0.01, "b = {}", fit.b);
        // The truth cannot beat the least-squares optimum.
        let truth: f64 = pts
            .iter()
            .map(|p| (p.drift - 1.5 * (0.08 * p.contrast).tanh()).powi(2))
            .sum();
        assert!(fit.sse <= truth + 1e-9);
    }

    #[test]
    fn test_fit_needs_two_nonzero_contrasts() {
        let pts = vec![
            DriftPoint { contrast: 0.0, drift: 0.0, n_subjects: 1 },
            DriftPoint { contrast: 25.0, drift: 1.0, n_subjects: 1 },
            DriftPoint { contrast: f64::NAN, drift: 1.0, n_subjects: 1 },
        ];
        assert!(fit_tanh(&pts).is_none());
        assert!(fit_tanh(&[]).is_none());
    }

    #[test]
    fn test_write_rescaled() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("rescale.csv");
        let pts = points(2.0, 0.05);
        write_rescaled(&path, &pts, None).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("signed_contrast,drift,n_subjects,new_contrast"));
        assert!(lines.next().unwrap().ends_with(",1,"));
        assert_eq!(lines.count(), 10);
    }
}
