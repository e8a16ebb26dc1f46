//! Per-trial records and conversion from raw rig quantities.

use serde::{Deserialize, Serialize};

/// Rightward choice code.
pub const RIGHT: f64 = 1.0;
/// Leftward choice code.
pub const LEFT: f64 = 0.0;

/// One behavioral trial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trial {
    pub subject: String,
    /// Position of the trial inside its session; consecutive trials differ by 1.
    pub trial_index: i64,
    pub session_id: Option<String>,
    /// Session start time as recorded by the rig (ISO-8601 text).
    pub session_start: Option<String>,
    /// Signed stimulus contrast in percent, positive means right.
    pub signed_contrast: f64,
    /// `0.0` left, `1.0` right, `None` no response.
    pub response: Option<f64>,
    /// `+1` correct, `-1` incorrect.
    pub feedback: Option<f64>,
    /// Reaction time in seconds (first wheel movement).
    pub rt: Option<f64>,
    /// Go cue to response time in seconds.
    pub trial_duration: Option<f64>,
    pub task_protocol: Option<String>,
}

impl Trial {
    /// A trial with only the required fields set.
    pub fn new(subject: impl Into<String>, trial_index: i64, signed_contrast: f64) -> Self {
        Self {
            subject: subject.into(),
            trial_index,
            session_id: None,
            session_start: None,
            signed_contrast,
            response: None,
            feedback: None,
            rt: None,
            trial_duration: None,
            task_protocol: None,
        }
    }

    pub fn with_session(mut self, id: impl Into<String>, start: impl Into<String>) -> Self {
        self.session_id = Some(id.into());
        self.session_start = Some(start.into());
        self
    }

    pub fn with_response(mut self, response: Option<f64>) -> Self {
        self.response = response;
        self
    }

    pub fn with_feedback(mut self, feedback: Option<f64>) -> Self {
        self.feedback = feedback;
        self
    }

    pub fn with_rt(mut self, rt: Option<f64>) -> Self {
        self.rt = rt;
        self
    }

    /// True when the response matches the side of the stimulus.
    /// Zero-contrast trials have no correct side and return `None`.
    pub fn is_correct(&self) -> Option<bool> {
        if let Some(fb) = self.feedback {
            return Some(fb > 0.0);
        }
        let response = self.response?;
        if self.signed_contrast == 0.0 {
            return None;
        }
        Some((self.signed_contrast > 0.0) == (response == RIGHT))
    }
}

/// Lagged and leading covariates attached to one trial.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct History {
    pub previous_choice: Option<f64>,
    pub previous_outcome: Option<f64>,
    /// Absolute contrast of the previous trial.
    pub previous_contrast: Option<f64>,
    pub next_choice: Option<f64>,
    pub next_outcome: Option<f64>,
    pub next_contrast: Option<f64>,
}

/// A trial with its history covariates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotatedTrial {
    pub trial: Trial,
    pub history: History,
}

// ---------------------------------------------------------------------------
// Raw conversion
// ---------------------------------------------------------------------------

/// `100 * (right - left)`, missing sides counted as zero contrast.
pub fn signed_contrast_from_sides(left: Option<f64>, right: Option<f64>) -> f64 {
    let side = |c: Option<f64>| c.filter(|v| v.is_finite()).unwrap_or(0.0);
    100.0 * (side(right) - side(left))
}

/// Map the rig's wheel choice code onto a response.
///
/// The wheel reports `+1` for a leftward response, `-1` for rightward and `0`
/// when the animal did not respond.
pub fn response_from_wheel(choice: f64) -> Option<f64> {
    if choice == 1.0 {
        Some(LEFT)
    } else if choice == -1.0 {
        Some(RIGHT)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signed_contrast_from_sides() {
        assert_eq!(signed_contrast_from_sides(Some(0.25), None), -25.0);
        assert_eq!(signed_contrast_from_sides(None, Some(1.0)), 100.0);
        assert_eq!(signed_contrast_from_sides(Some(f64::NAN), Some(0.0625)), 6.25);
        assert_eq!(signed_contrast_from_sides(None, None), 0.0);
    }

    #[test]
    fn test_response_from_wheel() {
        assert_eq!(response_from_wheel(1.0), Some(LEFT));
        assert_eq!(response_from_wheel(-1.0), Some(RIGHT));
        assert_eq!(response_from_wheel(0.0), None);
        assert_eq!(response_from_wheel(f64::NAN), None);
    }

    #[test]
    fn test_is_correct_prefers_feedback() {
        let t = Trial::new("m1", 0, -25.0)
            .with_response(Some(RIGHT))
            .with_feedback(Some(1.0));
        assert_eq!(t.is_correct(), Some(true));
    }

    #[test]
    fn test_is_correct_from_stimulus() {
        let right = Trial::new("m1", 0, 50.0).with_response(Some(RIGHT));
        assert_eq!(right.is_correct(), Some(true));
        let wrong = Trial::new("m1", 1, 50.0).with_response(Some(LEFT));
        assert_eq!(wrong.is_correct(), Some(false));
        let zero = Trial::new("m1", 2, 0.0).with_response(Some(LEFT));
        assert_eq!(zero.is_correct(), None);
        let none = Trial::new("m1", 3, 50.0);
        assert_eq!(none.is_correct(), None);
    }
}
