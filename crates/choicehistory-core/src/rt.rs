//! Reaction-time sanitizing.
//!
//! RTs outside a plausible window become missing. The default window is
//! `[0, 60]` seconds, 60 s being the inter-trial interval of the task.

use serde::{Deserialize, Serialize};

use crate::stats::median;
use crate::trial::Trial;

/// Plausible range for a reaction time, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RtLimits {
    /// Values below this are removed.
    pub floor: f64,
    /// Values above this are removed.
    pub ceiling: f64,
    /// Optional extra lower cutoff (e.g. 0.08 s to drop anticipatory moves).
    pub cutoff: Option<f64>,
}

impl Default for RtLimits {
    fn default() -> Self {
        Self {
            floor: 0.0,
            ceiling: 60.0,
            cutoff: None,
        }
    }
}

impl RtLimits {
    pub fn with_cutoff(mut self, cutoff: f64) -> Self {
        self.cutoff = Some(cutoff);
        self
    }

    /// Apply the limits to one value.
    pub fn apply(&self, rt: Option<f64>) -> Option<f64> {
        let v = rt.filter(|v| v.is_finite())?;
        if v < self.floor || v > self.ceiling {
            return None;
        }
        if self.cutoff.is_some_and(|c| v < c) {
            return None;
        }
        Some(v)
    }
}

/// Remove out-of-range reaction times.
pub fn clean(rts: &[Option<f64>], limits: &RtLimits) -> Vec<Option<f64>> {
    rts.iter().map(|&rt| limits.apply(rt)).collect()
}

/// Like [`clean`], and also drop an RT when `reference - rt > tolerance`.
///
/// `reference` is usually the stopwatch trial duration; a sensor RT that falls
/// far short of it is not trusted. A missing reference never invalidates.
pub fn clean_against_reference(
    rts: &[Option<f64>],
    reference: &[Option<f64>],
    tolerance: f64,
    limits: &RtLimits,
) -> Vec<Option<f64>> {
    rts.iter()
        .enumerate()
        .map(|(i, &rt)| {
            let rt = limits.apply(rt)?;
            match reference.get(i).copied().flatten() {
                Some(r) if r - rt > tolerance => None,
                _ => Some(rt),
            }
        })
        .collect()
}

/// Counts from [`clean_trials`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RtCleaningReport {
    pub n_trials: usize,
    pub rt_removed: usize,
    pub duration_removed: usize,
    pub median_rt: Option<f64>,
}

/// Median RT outside this open interval (seconds) is suspicious.
pub const PLAUSIBLE_MEDIAN_RT: (f64, f64) = (0.0, 3.0);

/// Clean the `rt` and `trial_duration` columns of a trial table.
///
/// With `reference_tolerance`, an RT is also dropped when the (cleaned) trial
/// duration exceeds it by more than the tolerance.
pub fn clean_trials(
    trials: &[Trial],
    limits: &RtLimits,
    reference_tolerance: Option<f64>,
) -> (Vec<Trial>, RtCleaningReport) {
    let mut report = RtCleaningReport {
        n_trials: trials.len(),
        ..Default::default()
    };

    let cleaned: Vec<Trial> = trials
        .iter()
        .map(|t| {
            let duration = limits.apply(t.trial_duration);
            let mut rt = limits.apply(t.rt);
            if let (Some(tol), Some(r), Some(d)) = (reference_tolerance, rt, duration) {
                if d - r > tol {
                    rt = None;
                }
            }
            if t.rt.is_some() && rt.is_none() {
                report.rt_removed += 1;
            }
            if t.trial_duration.is_some() && duration.is_none() {
                report.duration_removed += 1;
            }
            Trial {
                rt,
                trial_duration: duration,
                ..t.clone()
            }
        })
        .collect();

    report.median_rt = median(cleaned.iter().filter_map(|t| t.rt));
    if let Some(m) = report.median_rt {
        let (lo, hi) = PLAUSIBLE_MEDIAN_RT;
        if !(m > lo && m < hi) {
            log::warn!("median RT {m:.3}s is outside the plausible range ({lo}, {hi})");
        }
    }
    log::info!(
        "RT cleaning: {} of {} RTs and {} trial durations removed",
        report.rt_removed,
        report.n_trials,
        report.duration_removed
    );
    (cleaned, report)
}
