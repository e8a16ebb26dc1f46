//! Trial-history covariates.
//!
//! Each trial gets the choice, outcome and absolute contrast of its
//! predecessor and successor within the same subject. The previous-trial
//! covariates are only defined when the predecessor is the immediately
//! preceding trial of the same session (trial index difference of exactly 1).
//! The next-trial covariates are filled from the successor row regardless of
//! gaps; they exist to estimate the slow-drift confound in history effects and
//! are never read causally.

use std::cmp::Ordering;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::trial::{AnnotatedTrial, History, Trial};

/// Indices of `trials` grouped by subject, subjects in first-appearance order.
pub fn subject_groups(trials: &[Trial]) -> Vec<(&str, Vec<usize>)> {
    let mut position: HashMap<&str, usize> = HashMap::new();
    let mut groups: Vec<(&str, Vec<usize>)> = Vec::new();
    for (i, t) in trials.iter().enumerate() {
        let slot = *position.entry(t.subject.as_str()).or_insert_with(|| {
            groups.push((t.subject.as_str(), Vec::new()));
            groups.len() - 1
        });
        groups[slot].1.push(i);
    }
    groups
}

/// Two rows belong to different sessions when their session ids or their
/// session start times are both known and differ.
fn session_changes(previous: &Trial, current: &Trial) -> bool {
    fn differs(a: &Option<String>, b: &Option<String>) -> bool {
        matches!((a, b), (Some(a), Some(b)) if a != b)
    }
    differs(&previous.session_id, &current.session_id)
        || differs(&previous.session_start, &current.session_start)
}

/// True when `current` directly follows `previous` in the same session.
fn is_consecutive(previous: &Trial, current: &Trial) -> bool {
    previous.subject == current.subject
        && !session_changes(previous, current)
        && previous.trial_index.checked_add(1) == Some(current.trial_index)
}

/// History for one subject's trials, taken in the given order.
pub fn annotate_subject(trials: &[&Trial]) -> Vec<History> {
    (0..trials.len())
        .map(|i| {
            let mut h = History::default();
            if i > 0 && is_consecutive(trials[i - 1], trials[i]) {
                let prev = trials[i - 1];
                h.previous_choice = prev.response;
                h.previous_outcome = prev.feedback;
                h.previous_contrast = Some(prev.signed_contrast.abs());
            }
            if let Some(next) = trials.get(i + 1) {
                h.next_choice = next.response;
                h.next_outcome = next.feedback;
                h.next_contrast = Some(next.signed_contrast.abs());
            }
            h
        })
        .collect()
}

/// Attach history covariates to every trial. Output order equals input order.
///
/// Within each subject the rows are taken in input order; sort with
/// [`crate::table::sort_trials`] first when the input is not already ordered.
pub fn annotate(trials: &[Trial]) -> Vec<AnnotatedTrial> {
    let mut histories = vec![History::default(); trials.len()];
    for (_, indices) in subject_groups(trials) {
        let rows: Vec<&Trial> = indices.iter().map(|&i| &trials[i]).collect();
        for (&i, h) in indices.iter().zip(annotate_subject(&rows)) {
            histories[i] = h;
        }
    }
    trials
        .iter()
        .cloned()
        .zip(histories)
        .map(|(trial, history)| AnnotatedTrial { trial, history })
        .collect()
}

// ---------------------------------------------------------------------------
// Sequence validation
// ---------------------------------------------------------------------------

/// Irregularities found in one subject's trial sequence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectSequence {
    pub subject: String,
    pub n_trials: usize,
    pub n_sessions: usize,
    /// Forward jumps larger than one trial.
    pub gaps: usize,
    /// Repeated trial indices.
    pub duplicates: usize,
    /// Backward jumps inside one session.
    pub reversals: usize,
}

impl SubjectSequence {
    pub fn is_clean(&self) -> bool {
        self.gaps == 0 && self.duplicates == 0 && self.reversals == 0
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceReport {
    pub subjects: Vec<SubjectSequence>,
}

impl SequenceReport {
    pub fn is_clean(&self) -> bool {
        self.subjects.iter().all(SubjectSequence::is_clean)
    }

    /// Trials whose previous-trial covariates are nulled by an irregularity.
    pub fn n_irregular(&self) -> usize {
        self.subjects
            .iter()
            .map(|s| s.gaps + s.duplicates + s.reversals)
            .sum()
    }
}

/// Scan each subject's trial sequence for gaps, duplicates and reversals.
/// Subjects with irregular sequences are logged at warn level.
pub fn validate_sequence(trials: &[Trial]) -> SequenceReport {
    let mut report = SequenceReport::default();
    for (subject, indices) in subject_groups(trials) {
        let mut seq = SubjectSequence {
            subject: subject.to_string(),
            n_trials: indices.len(),
            n_sessions: 1,
            ..Default::default()
        };
        for pair in indices.windows(2) {
            let (prev, cur) = (&trials[pair[0]], &trials[pair[1]]);
            if session_changes(prev, cur) {
                seq.n_sessions += 1;
                continue;
            }
            match cur.trial_index.cmp(&prev.trial_index) {
                Ordering::Equal => seq.duplicates += 1,
                Ordering::Less => seq.reversals += 1,
                Ordering::Greater if is_consecutive(prev, cur) => {}
                Ordering::Greater => seq.gaps += 1,
            }
        }
        if !seq.is_clean() {
            log::warn!(
                "subject {}: {} gap(s), {} duplicate(s), {} reversal(s) in trial sequence",
                seq.subject,
                seq.gaps,
                seq.duplicates,
                seq.reversals
            );
        }
        report.subjects.push(seq);
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trial(subject: &str, index: i64, contrast: f64, response: f64, feedback: f64) -> Trial {
        Trial::new(subject, index, contrast)
            .with_response(Some(response))
            .with_feedback(Some(feedback))
    }

    #[test]
    fn test_basic_shift() {
        let trials = vec![
            trial("m", 0, -25.0, 0.0, 1.0),
            trial("m", 1, 50.0, 1.0, 1.0),
            trial("m", 2, -6.25, 1.0, -1.0),
        ];
        let out = annotate(&trials);
        assert_eq!(out[0].history.previous_choice, None);
        assert_eq!(out[1].history.previous_choice, Some(0.0));
        assert_eq!(out[1].history.previous_outcome, Some(1.0));
        assert_eq!(out[1].history.previous_contrast, Some(25.0));
        assert_eq!(out[1].history.next_choice, Some(1.0));
        assert_eq!(out[1].history.next_outcome, Some(-1.0));
        assert_eq!(out[1].history.next_contrast, Some(6.25));
        assert_eq!(out[2].history.next_choice, None);
    }

    #[test]
    fn test_gap_nulls_previous_only() {
        let trials = vec![
            trial("m", 0, 25.0, 1.0, 1.0),
            trial("m", 1, 25.0, 1.0, 1.0),
            trial("m", 5, -25.0, 0.0, 1.0),
        ];
        let out = annotate(&trials);
        assert_eq!(out[2].history.previous_choice, None);
        assert_eq!(out[2].history.previous_outcome, None);
        assert_eq!(out[2].history.previous_contrast, None);
        // The trial before the gap still sees the trial after it.
        assert_eq!(out[1].history.next_choice, Some(0.0));
    }

    #[test]
    fn test_session_change_nulls_previous() {
        let trials = vec![
            trial("m", 0, 25.0, 1.0, 1.0).with_session("a", "2020-01-01"),
            trial("m", 1, 25.0, 1.0, 1.0).with_session("b", "2020-01-02"),
        ];
        let out = annotate(&trials);
        assert_eq!(out[1].history.previous_choice, None);
    }

    #[test]
    fn test_session_start_change_nulls_previous() {
        let trials = vec![
            trial("m", 0, 25.0, 1.0, 1.0).with_session("a", "2020-01-01T09:00:00"),
            trial("m", 1, 25.0, 1.0, 1.0).with_session("a", "2020-01-01T15:00:00"),
        ];
        let out = annotate(&trials);
        assert_eq!(out[1].history.previous_choice, None);
        assert_eq!(validate_sequence(&trials).subjects[0].n_sessions, 2);
    }

    #[test]
    fn test_extreme_trial_indices_do_not_overflow() {
        let trials = vec![
            trial("m", i64::MIN, 25.0, 1.0, 1.0),
            trial("m", i64::MAX, 25.0, 0.0, 1.0),
            trial("m", i64::MIN, 25.0, 1.0, 1.0),
        ];
        let out = annotate(&trials);
        assert!(out.iter().all(|a| a.history.previous_choice.is_none()));
        let m = &validate_sequence(&trials).subjects[0];
        assert_eq!(m.gaps, 1);
        assert_eq!(m.reversals, 1);
    }

    #[test]
    fn test_missing_response_propagates_as_missing() {
        let trials = vec![
            Trial::new("m", 0, 0.0).with_feedback(Some(-1.0)),
            trial("m", 1, 0.0, 1.0, 1.0),
        ];
        let out = annotate(&trials);
        assert_eq!(out[1].history.previous_choice, None);
        assert_eq!(out[1].history.previous_outcome, Some(-1.0));
    }

    #[test]
    fn test_subject_groups_first_appearance() {
        let trials = vec![
            Trial::new("b", 0, 0.0),
            Trial::new("a", 0, 0.0),
            Trial::new("b", 1, 0.0),
        ];
        let groups = subject_groups(&trials);
        assert_eq!(groups[0], ("b", vec![0, 2]));
        assert_eq!(groups[1], ("a", vec![1]));
    }

    #[test]
    fn test_validate_sequence() {
        let trials = vec![
            Trial::new("m", 0, 0.0).with_session("a", "t0"),
            Trial::new("m", 1, 0.0).with_session("a", "t0"),
            Trial::new("m", 1, 0.0).with_session("a", "t0"),
            Trial::new("m", 4, 0.0).with_session("a", "t0"),
            Trial::new("m", 2, 0.0).with_session("a", "t0"),
            Trial::new("m", 0, 0.0).with_session("b", "t1"),
            Trial::new("n", 0, 0.0),
            Trial::new("n", 1, 0.0),
        ];
        let report = validate_sequence(&trials);
        let m = &report.subjects[0];
        assert_eq!(m.n_sessions, 2);
        assert_eq!(m.duplicates, 1);
        assert_eq!(m.gaps, 1);
        assert_eq!(m.reversals, 1);
        assert!(report.subjects[1].is_clean());
        assert!(!report.is_clean());
        assert_eq!(report.n_irregular(), 3);
    }
}
