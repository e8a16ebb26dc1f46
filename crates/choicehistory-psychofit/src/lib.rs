//! Psychometric function fitting for two-alternative choice data.
//!
//! Choices at each stimulus value are collapsed into a [`LevelSummary`], and a
//! four-parameter sigmoid (bias, threshold, low lapse, high lapse) is fit by
//! maximum likelihood inside box bounds. The optimizer is a deterministic
//! Nelder–Mead with seeded restarts, so identical input always yields an
//! identical [`PsychometricFit`].
//!
//! ```
//! use choicehistory_psychofit::{FitSettings, fit_psychometric};
//!
//! let x = [-100.0, -25.0, 0.0, 25.0, 100.0];
//! let y = [Some(0.0), Some(0.0), Some(1.0), Some(1.0), Some(1.0)];
//! let fit = fit_psychometric(&x, &y, &FitSettings::default());
//! assert_eq!(fit.n_levels, 5);
//! ```

pub mod comparison;
pub mod correlation;
pub mod mle;
pub mod optimize;
pub mod sigmoid;

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

pub use comparison::{aic, bic, deltas};
pub use correlation::{Correlation, DependentCorrelationTest, spearman, steiger_dependent};
pub use mle::{
    FitSettings, FitStatus, MIN_LEVELS, PsychometricFit, fit_levels, fit_psychometric,
    negative_log_likelihood,
};
pub use optimize::{Bounds, Minimum, NelderMead};
pub use sigmoid::{PsychometricParams, SigmoidFamily};

// ---------------------------------------------------------------------------
// Stimulus levels
// ---------------------------------------------------------------------------

/// A real value usable as an exact grouping key.
///
/// Ordering is `f64::total_cmp`, and `-0.0` is folded into `0.0` so that both
/// zero contrasts land in the same group.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Level(f64);

impl Level {
    pub fn new(value: f64) -> Self {
        Self(if value == 0.0 { 0.0 } else { value })
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

impl PartialEq for Level {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Level {}

impl PartialOrd for Level {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Level {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl Hash for Level {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.to_bits().hash(state);
    }
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Choices observed at one stimulus value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LevelSummary {
    pub level: f64,
    /// Non-missing choices at this level.
    pub n_trials: usize,
    /// Mean of the choices (fraction rightward).
    pub fraction: f64,
}

/// Collapse paired stimulus values and choices into per-level summaries,
/// sorted by level. Missing or non-finite choices and non-finite stimulus
/// values are skipped. Pairs are zipped, so extra trailing values are ignored.
pub fn aggregate_levels(x: &[f64], y: &[Option<f64>]) -> Vec<LevelSummary> {
    let mut acc: BTreeMap<Level, (usize, f64)> = BTreeMap::new();
    for (&xi, yi) in x.iter().zip(y) {
        let Some(choice) = yi.filter(|v| v.is_finite()) else {
            continue;
        };
        if !xi.is_finite() {
            continue;
        }
        let entry = acc.entry(Level::new(xi)).or_insert((0, 0.0));
        entry.0 += 1;
        entry.1 += choice;
    }
    acc.into_iter()
        .map(|(level, (n, sum))| LevelSummary {
            level: level.value(),
            n_trials: n,
            fraction: sum / n as f64,
        })
        .collect()
}
