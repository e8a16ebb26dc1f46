//! Choice repetition probability per subject.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::table::{fmt_opt, quote_field, write_table};
use crate::trial::AnnotatedTrial;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepetitionSummary {
    pub subject: String,
    /// Trials with both a response and a previous choice.
    pub n_trials: usize,
    pub repeat: Option<f64>,
    pub repeat_prevcorrect: Option<f64>,
    pub repeat_preverror: Option<f64>,
}

#[derive(Default)]
struct Tally {
    n: usize,
    repeats: usize,
}

impl Tally {
    fn add(&mut self, repeated: bool) {
        self.n += 1;
        self.repeats += usize::from(repeated);
    }

    fn fraction(&self) -> Option<f64> {
        (self.n > 0).then(|| self.repeats as f64 / self.n as f64)
    }
}

/// P(repeat) per subject, overall and split by the previous outcome.
/// Subjects come out sorted by name.
pub fn repetition(trials: &[AnnotatedTrial]) -> Vec<RepetitionSummary> {
    let mut acc: BTreeMap<&str, [Tally; 3]> = BTreeMap::new();
    for a in trials {
        let (Some(response), Some(previous)) = (a.trial.response, a.history.previous_choice) else {
            continue;
        };
        let repeated = response == previous;
        let tallies = acc.entry(a.trial.subject.as_str()).or_default();
        tallies[0].add(repeated);
        match a.history.previous_outcome {
            Some(o) if o > 0.0 => tallies[1].add(repeated),
            Some(o) if o < 0.0 => tallies[2].add(repeated),
            _ => {}
        }
    }
    acc.into_iter()
        .map(|(subject, [all, correct, error])| RepetitionSummary {
            subject: subject.to_string(),
            n_trials: all.n,
            repeat: all.fraction(),
            repeat_prevcorrect: correct.fraction(),
            repeat_preverror: error.fraction(),
        })
        .collect()
}

pub fn write_repetition(path: &Path, rows: &[RepetitionSummary]) -> Result<()> {
    let table: Vec<Vec<String>> = rows
        .iter()
        .map(|r| {
            vec![
                quote_field(&r.subject),
                r.n_trials.to_string(),
                fmt_opt(r.repeat),
                fmt_opt(r.repeat_prevcorrect),
                fmt_opt(r.repeat_preverror),
            ]
        })
        .collect();
    write_table(
        path,
        &["subj_idx", "ntrials", "repeat", "repeat_prevcorrect", "repeat_preverror"],
        &table,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::annotate;
    use crate::trial::Trial;

    fn t(i: i64, response: Option<f64>, feedback: f64) -> Trial {
        Trial::new("m", i, 0.0)
            .with_response(response)
            .with_feedback(Some(feedback))
    }

    #[test]
    fn test_repetition_split_by_outcome() {
        let trials = vec![
            t(0, Some(1.0), 1.0),
            t(1, Some(1.0), -1.0), // repeat after correct
            t(2, Some(0.0), 1.0),  // switch after error
            t(3, Some(0.0), 1.0),  // repeat after correct
            t(4, None, -1.0),      // no response: excluded
            t(5, Some(1.0), 1.0),  // previous choice missing: excluded
        ];
        let rows = repetition(&annotate(&trials));
        assert_eq!(rows.len(), 1);
        let r = &rows[0];
        assert_eq!(r.n_trials, 3);
        assert!((r.repeat.unwrap() - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(r.repeat_prevcorrect, Some(1.0));
        assert_eq!(r.repeat_preverror, Some(0.0));
    }

    #[test]
    fn test_repetition_without_history() {
        let rows = repetition(&annotate(&[t(0, Some(1.0), 1.0)]));
        assert!(rows.is_empty());
    }
}
