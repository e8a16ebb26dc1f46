//! Maximum-likelihood fit of a two-lapse psychometric function.
//!
//! Observations are collapsed to one [`LevelSummary`] per distinct stimulus
//! value; the binomial likelihood weights each level by its trial count.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::optimize::{Bounds, NelderMead};
use crate::sigmoid::{PsychometricParams, SigmoidFamily};
use crate::{LevelSummary, aggregate_levels};

/// Minimum number of distinct stimulus levels for a fit to be attempted.
pub const MIN_LEVELS: usize = 4;

/// Settings for [`fit_psychometric`]. Defaults reproduce the standard
/// behavioral-paper fit: start `[0, 20, 0.05, 0.05]`, threshold in `[5, 40]`,
/// lapses in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitSettings {
    pub family: SigmoidFamily,
    pub min_levels: usize,
    pub start: PsychometricParams,
    pub threshold_bounds: (f64, f64),
    pub lapse_bounds: (f64, f64),
    /// Extra starts drawn uniformly inside the bounds after the first one.
    pub restarts: usize,
    /// Seed for restart starting points.
    pub seed: u64,
    pub optimizer: NelderMead,
}

impl Default for FitSettings {
    fn default() -> Self {
        Self {
            family: SigmoidFamily::Erf,
            min_levels: MIN_LEVELS,
            start: PsychometricParams::new(0.0, 20.0, 0.05, 0.05),
            threshold_bounds: (5.0, 40.0),
            lapse_bounds: (0.0, 1.0),
            restarts: 4,
            seed: 0x5EED_C401CE,
            optimizer: NelderMead::default(),
        }
    }
}

/// Outcome category of a fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FitStatus {
    Converged,
    /// Fewer distinct stimulus levels than required.
    InsufficientLevels,
    /// The optimizer hit its iteration cap from every start.
    NonConvergence,
    /// The fit could not be run at all (invalid bounds, panic in a batch).
    Failed,
}

impl std::fmt::Display for FitStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Converged => write!(f, "converged"),
            Self::InsufficientLevels => write!(f, "insufficient_levels"),
            Self::NonConvergence => write!(f, "non_convergence"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Result of fitting one group of trials. Parameters are `None` unless the
/// fit converged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PsychometricFit {
    pub bias: Option<f64>,
    pub threshold: Option<f64>,
    pub lapse_low: Option<f64>,
    pub lapse_high: Option<f64>,
    /// Non-missing choices the fit was based on.
    pub n_trials: usize,
    /// Distinct stimulus levels with at least one choice.
    pub n_levels: usize,
    pub neg_log_likelihood: Option<f64>,
    pub status: FitStatus,
}

impl PsychometricFit {
    /// A result with every parameter missing.
    pub fn missing(n_trials: usize, n_levels: usize, status: FitStatus) -> Self {
        Self {
            bias: None,
            threshold: None,
            lapse_low: None,
            lapse_high: None,
            n_trials,
            n_levels,
            neg_log_likelihood: None,
            status,
        }
    }

    fn converged(params: PsychometricParams, nll: f64, n_trials: usize, n_levels: usize) -> Self {
        Self {
            bias: Some(params.bias),
            threshold: Some(params.threshold),
            lapse_low: Some(params.lapse_low),
            lapse_high: Some(params.lapse_high),
            n_trials,
            n_levels,
            neg_log_likelihood: Some(nll),
            status: FitStatus::Converged,
        }
    }

    /// All four parameters, when every one of them is defined.
    pub fn params(&self) -> Option<PsychometricParams> {
        Some(PsychometricParams::new(
            self.bias?,
            self.threshold?,
            self.lapse_low?,
            self.lapse_high?,
        ))
    }

    /// Predicted rightward probability at `x`, if the fit has parameters.
    pub fn predict(&self, family: SigmoidFamily, x: f64) -> Option<f64> {
        self.params().map(|p| p.probability(family, x))
    }

    pub fn is_converged(&self) -> bool {
        self.status == FitStatus::Converged
    }
}

/// Binomial negative log-likelihood of `params` given per-level summaries.
pub fn negative_log_likelihood(
    params: &PsychometricParams,
    levels: &[LevelSummary],
    family: SigmoidFamily,
) -> f64 {
    let eps = f64::EPSILON;
    -levels
        .iter()
        .map(|l| {
            let p = params.probability(family, l.level).clamp(eps, 1.0 - eps);
            l.n_trials as f64 * (l.fraction * p.ln() + (1.0 - l.fraction) * (1.0 - p).ln())
        })
        .sum::<f64>()
}

/// Fit a psychometric function to paired stimulus values and choices
/// (`Some(0.0)` left, `Some(1.0)` right, `None` no response).
pub fn fit_psychometric(x: &[f64], y: &[Option<f64>], settings: &FitSettings) -> PsychometricFit {
    fit_levels(&aggregate_levels(x, y), settings)
}

/// Fit a psychometric function to already aggregated levels.
pub fn fit_levels(levels: &[LevelSummary], settings: &FitSettings) -> PsychometricFit {
    let n_trials: usize = levels.iter().map(|l| l.n_trials).sum();
    let levels: Vec<LevelSummary> = levels.iter().filter(|l| l.n_trials > 0).copied().collect();
    let n_levels = levels.len();

    if n_levels < settings.min_levels.max(1) {
        log::debug!(
            "skipping fit: {n_levels} stimulus level(s), need {}",
            settings.min_levels
        );
        return PsychometricFit::missing(n_trials, n_levels, FitStatus::InsufficientLevels);
    }

    let min_level = levels.iter().map(|l| l.level).fold(f64::INFINITY, f64::min);
    let max_level = levels
        .iter()
        .map(|l| l.level)
        .fold(f64::NEG_INFINITY, f64::max);
    let (t_lo, t_hi) = settings.threshold_bounds;
    let (l_lo, l_hi) = settings.lapse_bounds;
    let Some(bounds) = Bounds::new(
        vec![min_level, t_lo, l_lo, l_lo],
        vec![max_level, t_hi, l_hi, l_hi],
    ) else {
        log::warn!(
            "invalid fit bounds: threshold {:?}, lapses {:?}",
            settings.threshold_bounds,
            settings.lapse_bounds
        );
        return PsychometricFit::missing(n_trials, n_levels, FitStatus::Failed);
    };

    let family = settings.family;
    let objective = |x: &[f64]| match PsychometricParams::from_slice(x) {
        Some(p) => negative_log_likelihood(&p, &levels, family),
        None => f64::INFINITY,
    };

    let mut rng = StdRng::seed_from_u64(settings.seed);
    let mut starts = vec![settings.start.to_array().to_vec()];
    for _ in 0..settings.restarts {
        let t: Vec<f64> = (0..bounds.dim()).map(|_| rng.random::<f64>()).collect();
        starts.push(bounds.interpolate(&t));
    }

    let best = starts
        .iter()
        .map(|start| settings.optimizer.minimize(objective, start, &bounds))
        .filter(|m| m.converged)
        .min_by(|a, b| a.value.total_cmp(&b.value));

    match best.and_then(|m| PsychometricParams::from_slice(&m.x).map(|p| (p, m.value))) {
        Some((params, nll)) => PsychometricFit::converged(params, nll, n_trials, n_levels),
        None => {
            log::warn!(
                "psychometric fit did not converge from {} start(s) ({n_trials} trials, {n_levels} levels)",
                starts.len()
            );
            PsychometricFit::missing(n_trials, n_levels, FitStatus::NonConvergence)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LEVELS: [f64; 11] = [
        -100.0, -50.0, -25.0, -12.5, -6.25, 0.0, 6.25, 12.5, 25.0, 50.0, 100.0,
    ];

    /// Exact expected fractions, `n` trials per level.
    fn noiseless(params: PsychometricParams, n: usize) -> Vec<LevelSummary> {
        LEVELS
            .iter()
            .map(|&level| LevelSummary {
                level,
                n_trials: n,
                fraction: params.probability(SigmoidFamily::Erf, level),
            })
            .collect()
    }

    /// Binomial samples from `params` using a seeded RNG.
    fn sampled(params: PsychometricParams, n: usize, seed: u64) -> (Vec<f64>, Vec<Option<f64>>) {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut x = Vec::new();
        let mut y = Vec::new();
        for &level in &LEVELS {
            let p = params.probability(SigmoidFamily::Erf, level);
            for _ in 0..n {
                x.push(level);
                y.push(Some(if rng.random_bool(p) { 1.0 } else { 0.0 }));
            }
        }
        (x, y)
    }

    #[test]
    fn test_three_levels_gives_missing_parameters() {
        let x = [-25.0, 0.0, 25.0, -25.0, 0.0, 25.0];
        let y = [Some(0.0), Some(1.0), Some(1.0), Some(0.0), Some(0.0), Some(1.0)];
        let fit = fit_psychometric(&x, &y, &FitSettings::default());
        assert_eq!(fit.status, FitStatus::InsufficientLevels);
        assert!(fit.params().is_none());
        assert!(fit.bias.is_none() && fit.threshold.is_none());
        assert!(fit.lapse_low.is_none() && fit.lapse_high.is_none());
        assert_eq!(fit.n_trials, 6);
        assert_eq!(fit.n_levels, 3);
    }

    #[test]
    fn test_levels_without_choices_do_not_count() {
        // Four levels present, but one has only no-response trials.
        let x = [-50.0, -25.0, 25.0, 50.0];
        let y = [Some(0.0), Some(0.0), Some(1.0), None];
        let fit = fit_psychometric(&x, &y, &FitSettings::default());
        assert_eq!(fit.status, FitStatus::InsufficientLevels);
        assert_eq!(fit.n_trials, 3);
    }

    #[test]
    fn test_noiseless_recovery() {
        let truth = PsychometricParams::new(2.0, 15.0, 0.02, 0.03);
        let fit = fit_levels(&noiseless(truth, 200), &FitSettings::default());
        assert!(fit.is_converged(), "{:?}", fit.status);
        let p = fit.params().unwrap();
        assert!((p.bias - 2.0).abs() < 0.5, "bias {}", p.bias);
        assert!((p.threshold - 15.0).abs() < 1.0, "threshold {}", p.threshold);
        assert!((p.lapse_low - 0.02).abs() < 0.01, "lapse_low {}", p.lapse_low);
        assert!((p.lapse_high - 0.03).abs() < 0.01, "lapse_high {}", p.lapse_high);
    }

    #[test]
    fn test_noisy_recovery() {
        let truth = PsychometricParams::new(2.0, 15.0, 0.02, 0.03);
        let (x, y) = sampled(truth, 500, 42);
        let fit = fit_psychometric(&x, &y, &FitSettings::default());
        assert!(fit.is_converged(), "{:?}", fit.status);
        let nll_truth =
            negative_log_likelihood(&truth, &aggregate_levels(&x, &y), SigmoidFamily::Erf);
        assert!(fit.neg_log_likelihood.unwrap() <= nll_truth + 1e-2);
        let p = fit.params().unwrap();
        assert!((p.bias - 2.0).abs() <= 3.0, "bias {}", p.bias);
        assert!((p.threshold - 15.0).abs() <= 5.0, "threshold {}", p.threshold);
        assert!((p.lapse_low - 0.02).abs() <= 0.05, "lapse_low {}", p.lapse_low);
        assert!((p.lapse_high - 0.03).abs() <= 0.05, "lapse_high {}", p.lapse_high);
        assert_eq!(fit.n_trials, 11 * 500);
        assert_eq!(fit.n_levels, 11);
    }

    #[test]
    fn test_fit_is_deterministic() {
        let truth = PsychometricParams::new(-5.0, 20.0, 0.1, 0.05);
        let (x, y) = sampled(truth, 100, 7);
        let a = fit_psychometric(&x, &y, &FitSettings::default());
        let b = fit_psychometric(&x, &y, &FitSettings::default());
        assert_eq!(a, b);
    }

    #[test]
    fn test_parameters_respect_bounds() {
        // A step function wants threshold → 0; the bound holds it at 5.
        let levels: Vec<LevelSummary> = LEVELS
            .iter()
            .map(|&level| LevelSummary {
                level,
                n_trials: 50,
                fraction: if level > 0.0 { 1.0 } else if level < 0.0 { 0.0 } else { 0.5 },
            })
            .collect();
        let fit = fit_levels(&levels, &FitSettings::default());
        let p = fit.params().unwrap();
        assert!(p.threshold >= 5.0 && p.threshold <= 40.0);
        assert!(p.bias >= -100.0 && p.bias <= 100.0);
        assert!((0.0..=1.0).contains(&p.lapse_low));
        assert!((0.0..=1.0).contains(&p.lapse_high));
    }

    #[test]
    fn test_bias_bounded_by_observed_levels() {
        let levels: Vec<LevelSummary> = [25.0, 50.0, 75.0, 100.0]
            .iter()
            .map(|&level| LevelSummary {
                level,
                n_trials: 40,
                fraction: 0.9,
            })
            .collect();
        let fit = fit_levels(&levels, &FitSettings::default());
        if let Some(bias) = fit.bias {
            assert!((25.0..=100.0).contains(&bias), "bias {bias}");
        }
    }

    #[test]
    fn test_non_convergence_reports_missing() {
        let truth = PsychometricParams::new(2.0, 15.0, 0.02, 0.03);
        let settings = FitSettings {
            optimizer: NelderMead {
                max_iterations: 2,
                ..Default::default()
            },
            ..Default::default()
        };
        let fit = fit_levels(&noiseless(truth, 100), &settings);
        assert_eq!(fit.status, FitStatus::NonConvergence);
        assert!(fit.params().is_none());
        assert_eq!(fit.n_trials, 1100);
    }

    #[test]
    fn test_invalid_bounds_fail_gracefully() {
        let truth = PsychometricParams::new(0.0, 15.0, 0.02, 0.03);
        let settings = FitSettings {
            threshold_bounds: (40.0, 5.0),
            ..Default::default()
        };
        let fit = fit_levels(&noiseless(truth, 10), &settings);
        assert_eq!(fit.status, FitStatus::Failed);
    }

    #[test]
    fn test_negative_log_likelihood_prefers_truth() {
        let truth = PsychometricParams::new(2.0, 15.0, 0.02, 0.03);
        let levels = noiseless(truth, 100);
        let at_truth = negative_log_likelihood(&truth, &levels, SigmoidFamily::Erf);
        let off = PsychometricParams::new(20.0, 30.0, 0.2, 0.2);
        assert!(at_truth < negative_log_likelihood(&off, &levels, SigmoidFamily::Erf));
    }

    #[test]
    fn test_settings_serde_defaults() {
        let s: FitSettings = serde_json::from_str(r#"{"restarts": 0}"#).unwrap();
        assert_eq!(s.restarts, 0);
        assert_eq!(s.min_levels, MIN_LEVELS);
        assert_eq!(s.threshold_bounds, (5.0, 40.0));
    }
}
