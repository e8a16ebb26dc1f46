//! Seeded synthetic choice data.
//!
//! Each simulated subject answers according to a fixed psychometric function
//! whose bias moves toward the previous choice by `repetition_shift` percent
//! contrast. Useful for demos and for checking that analyses recover known
//! effects.

use choicehistory_psychofit::{PsychometricParams, SigmoidFamily};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::{AnalysisError, Result};
use crate::trial::{LEFT, RIGHT, Trial};

/// Contrast set of the basic training task.
pub const TRAINING_CONTRASTS: [f64; 9] = [-100.0, -25.0, -12.5, -6.25, 0.0, 6.25, 12.5, 25.0, 100.0];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub n_subjects: usize,
    pub sessions_per_subject: usize,
    pub trials_per_session: usize,
    pub contrasts: Vec<f64>,
    pub params: PsychometricParams,
    pub family: SigmoidFamily,
    /// Bias shift (percent contrast) toward the previous choice.
    pub repetition_shift: f64,
    /// Probability that a trial gets no response.
    pub miss_rate: f64,
    pub seed: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            n_subjects: 4,
            sessions_per_subject: 1,
            trials_per_session: 500,
            contrasts: TRAINING_CONTRASTS.to_vec(),
            params: PsychometricParams::new(0.0, 15.0, 0.05, 0.05),
            family: SigmoidFamily::Erf,
            repetition_shift: 0.0,
            miss_rate: 0.0,
            seed: 42,
        }
    }
}

impl SimulationConfig {
    /// Reject settings that would give undefined choice probabilities.
    pub fn validate(&self) -> Result<()> {
        let bad = |msg: String| -> Result<()> { Err(AnalysisError::Config(msg)) };
        let p = &self.params;
        if !p.to_array().iter().all(|v| v.is_finite()) || !(p.threshold > 0.0) {
            return bad(format!("invalid simulation parameters {p:?}"));
        }
        if !(0.0..=1.0).contains(&p.lapse_low) || !(0.0..=1.0).contains(&p.lapse_high) {
            return bad(format!("lapse rates must lie in [0, 1], got {p:?}"));
        }
        if !self.repetition_shift.is_finite() {
            return bad(format!("repetition shift must be finite, got {}", self.repetition_shift));
        }
        if !(0.0..=1.0).contains(&self.miss_rate) {
            return bad(format!("miss rate must lie in [0, 1], got {}", self.miss_rate));
        }
        if let Some(c) = self.contrasts.iter().find(|c| !c.is_finite()) {
            return bad(format!("contrast {c} is not finite"));
        }
        Ok(())
    }
}

/// Generate trials ordered by subject, session and trial index.
///
/// An invalid config (see [`SimulationConfig::validate`]) yields no trials.
pub fn simulate(config: &SimulationConfig) -> Vec<Trial> {
    if let Err(e) = config.validate() {
        log::warn!("not simulating: {e}");
        return Vec::new();
    }
    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut trials =
        Vec::with_capacity(config.n_subjects * config.sessions_per_subject * config.trials_per_session);
    if config.contrasts.is_empty() {
        return trials;
    }

    for s in 0..config.n_subjects {
        let subject = format!("sim_{:03}", s + 1);
        for k in 0..config.sessions_per_subject {
            let session_id = format!("{subject}-s{:02}", k + 1);
            let start = format!("2020-01-{:02}T10:00:00", (k % 28) + 1);
            let mut previous: Option<f64> = None;

            for i in 0..config.trials_per_session {
                let contrast = config.contrasts[rng.random_range(0..config.contrasts.len())];
                let mut params = config.params;
                if let Some(prev) = previous {
                    params.bias -= config.repetition_shift * (2.0 * prev - 1.0);
                }

                let response = if rng.random_bool(config.miss_rate) {
                    None
                } else {
                    let p = params.probability(config.family, contrast).clamp(0.0, 1.0);
                    Some(if rng.random_bool(p) { RIGHT } else { LEFT })
                };

                let feedback = response.map(|r| {
                    let correct = if contrast == 0.0 {
                        rng.random_bool(0.5)
                    } else {
                        (contrast > 0.0) == (r == RIGHT)
                    };
                    if correct { 1.0 } else { -1.0 }
                });

                let rt = response.map(|_| 0.15 - 0.3 * (1.0 - rng.random::<f64>()).ln());

                trials.push(Trial {
                    subject: subject.clone(),
                    trial_index: i as i64,
                    session_id: Some(session_id.clone()),
                    session_start: Some(start.clone()),
                    signed_contrast: contrast,
                    response,
                    feedback: feedback.or(Some(-1.0)),
                    rt,
                    trial_duration: rt.map(|r| r + 0.05),
                    task_protocol: Some("trainingChoiceWorld".to_string()),
                });
                previous = response;
            }
        }
    }
    log::debug!("simulated {} trials", trials.len());
    trials
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simulate_shape() {
        let cfg = SimulationConfig {
            n_subjects: 2,
            sessions_per_subject: 2,
            trials_per_session: 10,
            ..Default::default()
        };
        let trials = simulate(&cfg);
        assert_eq!(trials.len(), 40);
        assert_eq!(trials[0].subject, "sim_001");
        assert_eq!(trials[10].trial_index, 0);
        assert_ne!(trials[0].session_id, trials[10].session_id);
    }

    #[test]
    fn test_simulate_is_seeded() {
        let cfg = SimulationConfig::default();
        assert_eq!(simulate(&cfg), simulate(&cfg));
        let other = SimulationConfig {
            seed: 7,
            ..Default::default()
        };
        assert_ne!(simulate(&cfg), simulate(&other));
    }

    #[test]
    fn test_miss_rate() {
        let cfg = SimulationConfig {
            n_subjects: 1,
            trials_per_session: 200,
            miss_rate: 1.0,
            ..Default::default()
        };
        let trials = simulate(&cfg);
        assert!(trials.iter().all(|t| t.response.is_none() && t.rt.is_none()));
        assert!(trials.iter().all(|t| t.feedback == Some(-1.0)));
    }

    #[test]
    fn test_feedback_matches_stimulus_side() {
        let trials = simulate(&SimulationConfig::default());
        for t in trials.iter().filter(|t| t.signed_contrast != 0.0) {
            let r = t.response.unwrap();
            let correct = (t.signed_contrast > 0.0) == (r == RIGHT);
            assert_eq!(t.feedback == Some(1.0), correct);
        }
    }

    #[test]
    fn test_non_finite_settings_are_rejected() {
        let nan_shift = SimulationConfig {
            repetition_shift: f64::NAN,
            ..Default::default()
        };
        assert!(matches!(nan_shift.validate(), Err(AnalysisError::Config(_))));
        assert!(simulate(&nan_shift).is_empty());

        let inf_bias = SimulationConfig {
            params: PsychometricParams::new(f64::INFINITY, 15.0, 0.05, 0.05),
            ..Default::default()
        };
        assert!(inf_bias.validate().is_err());
        assert!(simulate(&inf_bias).is_empty());

        let bad_lapse = SimulationConfig {
            params: PsychometricParams::new(0.0, 15.0, 1.5, 0.05),
            ..Default::default()
        };
        assert!(bad_lapse.validate().is_err());
        assert!(SimulationConfig::default().validate().is_ok());
    }

    #[test]
    fn test_empty_contrasts() {
        let cfg = SimulationConfig {
            contrasts: Vec::new(),
            ..Default::default()
        };
        assert!(simulate(&cfg).is_empty());
    }
}
