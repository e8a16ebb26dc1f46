//! History shifts read off fitted diffusion parameters.
//!
//! A model that lets drift bias (`dc`) and starting point (`z`) depend on the
//! previous response yields one estimate per previous-response level. The
//! shift is the repeat-level estimate minus the alternate-level estimate,
//! optionally split by the previous outcome. Across subjects, each shift is
//! rank-correlated with P(repeat), and the two correlations are compared with
//! Steiger's test since they share the repetition variable.

use std::collections::BTreeMap;
use std::path::Path;

use choicehistory_psychofit::{
    Correlation, DependentCorrelationTest, spearman, steiger_dependent,
};
use serde::{Deserialize, Serialize};

use crate::ddm::WideTable;
use crate::error::Result;
use crate::repetition::RepetitionSummary;
use crate::table::{fmt_opt, quote_field, write_table};

/// Condition labels the backend used for previous response and outcome.
///
/// A split condition is labelled `{response}.{outcome}`, e.g. `1.0.-1.0`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConditionLabels {
    pub repeat: String,
    pub alternate: String,
    pub correct: String,
    pub error: String,
}

impl Default for ConditionLabels {
    fn default() -> Self {
        Self {
            repeat: "1.0".to_string(),
            alternate: "0.0".to_string(),
            correct: "1.0".to_string(),
            error: "-1.0".to_string(),
        }
    }
}

/// Which trials a shift (or repetition probability) is conditioned on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreviousOutcome {
    Any,
    Correct,
    Error,
}

impl PreviousOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Any => "any",
            Self::Correct => "correct",
            Self::Error => "error",
        }
    }

    /// The matching P(repeat) of a repetition summary.
    pub fn repeat(self, summary: &RepetitionSummary) -> Option<f64> {
        match self {
            Self::Any => summary.repeat,
            Self::Correct => summary.repeat_prevcorrect,
            Self::Error => summary.repeat_preverror,
        }
    }

    fn condition(self, response: &str, labels: &ConditionLabels) -> String {
        match self {
            Self::Any => response.to_string(),
            Self::Correct => format!("{response}.{}", labels.correct),
            Self::Error => format!("{response}.{}", labels.error),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DdmShift {
    pub subject: String,
    pub outcome: PreviousOutcome,
    pub dc_shift: Option<f64>,
    pub z_shift: Option<f64>,
}

fn shift(table: &WideTable, subject: &str, parameter: &str, repeat: &str, alternate: &str) -> Option<f64> {
    let r = table.get(subject, &format!("{parameter}({repeat})"))?;
    let a = table.get(subject, &format!("{parameter}({alternate})"))?;
    Some(r - a)
}

/// `dc` and `z` shifts per subject. With `by_outcome` there are two rows per
/// subject (after a correct and after an error trial), otherwise one.
pub fn history_shifts(table: &WideTable, labels: &ConditionLabels, by_outcome: bool) -> Vec<DdmShift> {
    let outcomes: &[PreviousOutcome] = if by_outcome {
        &[PreviousOutcome::Correct, PreviousOutcome::Error]
    } else {
        &[PreviousOutcome::Any]
    };

    let mut out = Vec::new();
    for (subject, _) in &table.rows {
        for &outcome in outcomes {
            let repeat = outcome.condition(&labels.repeat, labels);
            let alternate = outcome.condition(&labels.alternate, labels);
            out.push(DdmShift {
                subject: subject.clone(),
                outcome,
                dc_shift: shift(table, subject, "dc", &repeat, &alternate),
                z_shift: shift(table, subject, "z", &repeat, &alternate),
            });
        }
    }
    let missing = out
        .iter()
        .filter(|s| s.dc_shift.is_none() && s.z_shift.is_none())
        .count();
    if missing > 0 {
        log::warn!("{missing} of {} shift row(s) have neither a dc nor a z estimate", out.len());
    }
    out
}

/// Shift-versus-repetition correlations for one previous-outcome condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryCorrelation {
    pub outcome: PreviousOutcome,
    /// Subjects with a shift row and a repetition summary.
    pub n_subjects: usize,
    pub z_repeat: Option<Correlation>,
    pub dc_repeat: Option<Correlation>,
    pub z_dc: Option<Correlation>,
    /// `rho(z, repeat) - rho(dc, repeat)`.
    pub delta_rho: Option<f64>,
    pub steiger: Option<DependentCorrelationTest>,
}

/// Correlate shifts with P(repeat), joined on subject, per outcome condition.
pub fn history_correlations(
    shifts: &[DdmShift],
    repetition: &[RepetitionSummary],
) -> Vec<HistoryCorrelation> {
    let by_subject: BTreeMap<&str, &RepetitionSummary> =
        repetition.iter().map(|r| (r.subject.as_str(), r)).collect();

    let mut per_outcome: BTreeMap<PreviousOutcome, Vec<(Option<f64>, Option<f64>, Option<f64>)>> =
        BTreeMap::new();
    for s in shifts {
        let Some(summary) = by_subject.get(s.subject.as_str()) else {
            log::debug!("subject {} has no repetition summary", s.subject);
            continue;
        };
        per_outcome
            .entry(s.outcome)
            .or_default()
            .push((s.z_shift, s.dc_shift, s.outcome.repeat(summary)));
    }

    per_outcome
        .into_iter()
        .map(|(outcome, rows)| {
            let z: Vec<Option<f64>> = rows.iter().map(|r| r.0).collect();
            let dc: Vec<Option<f64>> = rows.iter().map(|r| r.1).collect();
            let rep: Vec<Option<f64>> = rows.iter().map(|r| r.2).collect();

            let z_repeat = spearman(&z, &rep);
            let dc_repeat = spearman(&dc, &rep);
            let z_dc = spearman(&z, &dc);
            let complete = rows
                .iter()
                .filter(|(z, dc, rep)| [z, dc, rep].iter().all(|v| v.is_some_and(f64::is_finite)))
                .count();

            let delta_rho = z_repeat.zip(dc_repeat).map(|(a, b)| a.rho - b.rho);
            let steiger = match (z_repeat, dc_repeat, z_dc) {
                (Some(xy), Some(xz), Some(yz)) => steiger_dependent(xy.rho, xz.rho, yz.rho, complete),
                _ => None,
            };
            HistoryCorrelation {
                outcome,
                n_subjects: rows.len(),
                z_repeat,
                dc_repeat,
                z_dc,
                delta_rho,
                steiger,
            }
        })
        .collect()
}

/// Per-subject shifts joined with the matching P(repeat).
pub fn write_shifts(path: &Path, shifts: &[DdmShift], repetition: &[RepetitionSummary]) -> Result<()> {
    let rows: Vec<Vec<String>> = shifts
        .iter()
        .map(|s| {
            let repeat = repetition
                .iter()
                .find(|r| r.subject == s.subject)
                .and_then(|r| s.outcome.repeat(r));
            vec![
                quote_field(&s.subject),
                s.outcome.as_str().to_string(),
                fmt_opt(s.dc_shift),
                fmt_opt(s.z_shift),
                fmt_opt(repeat),
            ]
        })
        .collect();
    write_table(path, &["subj_idx", "previous_outcome", "dcshift", "zshift", "repeat"], &rows)
}

pub fn write_correlations(path: &Path, rows: &[HistoryCorrelation]) -> Result<()> {
    let rho = |c: &Option<Correlation>| fmt_opt(c.map(|c| c.rho));
    let p = |c: &Option<Correlation>| fmt_opt(c.and_then(|c| c.p_value));
    let table: Vec<Vec<String>> = rows
        .iter()
        .map(|r| {
            vec![
                r.outcome.as_str().to_string(),
                r.n_subjects.to_string(),
                rho(&r.z_repeat),
                p(&r.z_repeat),
                rho(&r.dc_repeat),
                p(&r.dc_repeat),
                rho(&r.z_dc),
                fmt_opt(r.delta_rho),
                fmt_opt(r.steiger.map(|s| s.t)),
                fmt_opt(r.steiger.map(|s| s.p_value)),
            ]
        })
        .collect();
    write_table(
        path,
        &[
            "previous_outcome",
            "n_subjects",
            "rho_z_repeat",
            "p_z_repeat",
            "rho_dc_repeat",
            "p_dc_repeat",
            "rho_z_dc",
            "delta_rho",
            "steiger_t",
            "steiger_p",
        ],
        &table,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ddm::{parse_results, results_long_to_wide};

    fn summary(subject: &str, repeat: f64, correct: f64, error: f64) -> RepetitionSummary {
        RepetitionSummary {
            subject: subject.to_string(),
            n_trials: 100,
            repeat: Some(repeat),
            repeat_prevcorrect: Some(correct),
            repeat_preverror: Some(error),
        }
    }

    fn table(entries: &[(&str, f64)]) -> WideTable {
        let owned: Vec<(String, f64)> = entries.iter().map(|(n, v)| (n.to_string(), *v)).collect();
        results_long_to_wide(&owned)
    }

    #[test]
    fn test_overall_shifts() {
        let text = ",mean\n\
                    dc_subj(1.0).a,0.5\n\
                    dc_subj(0.0).a,0.2\n\
                    z_subj(1.0).a,0.56\n\
                    z_subj(0.0).a,0.50\n\
                    dc_subj(1.0).b,0.1\n";
        let wide = results_long_to_wide(&parse_results(text).unwrap());
        let shifts = history_shifts(&wide, &ConditionLabels::default(), false);
        assert_eq!(shifts.len(), 2);
        assert_eq!(shifts[0].subject, "a");
        assert_eq!(shifts[0].outcome, PreviousOutcome::Any);
        assert!((shifts[0].dc_shift.unwrap() - 0.3).abs() < 1e-12);
        assert!((shifts[0].z_shift.unwrap() - 0.06).abs() < 1e-12);
        // b has no alternate-level dc and no z at all.
        assert_eq!(shifts[1].dc_shift, None);
        assert_eq!(shifts[1].z_shift, None);
    }

    #[test]
    fn test_shifts_split_by_previous_outcome() {
        let wide = table(&[
            ("dc_subj(1.0.1.0).a", 0.4),
            ("dc_subj(0.0.1.0).a", 0.1),
            ("dc_subj(1.0.-1.0).a", -0.2),
            ("dc_subj(0.0.-1.0).a", 0.3),
            ("z_subj(1.0.1.0).a", 0.6),
            ("z_subj(0.0.1.0).a", 0.5),
        ]);
        let shifts = history_shifts(&wide, &ConditionLabels::default(), true);
        assert_eq!(shifts.len(), 2);
        let correct = &shifts[0];
        assert_eq!(correct.outcome, PreviousOutcome::Correct);
        assert!((correct.dc_shift.unwrap() - 0.3).abs() < 1e-12);
        assert!((correct.z_shift.unwrap() - 0.1).abs() < 1e-12);
        let error = &shifts[1];
        assert_eq!(error.outcome, PreviousOutcome::Error);
        assert!((error.dc_shift.unwrap() + 0.5).abs() < 1e-12);
        assert_eq!(error.z_shift, None);
    }

    #[test]
    fn test_custom_condition_labels() {
        let wide = table(&[("z_subj(1).a", 0.7), ("z_subj(-1).a", 0.4)]);
        let labels = ConditionLabels {
            repeat: "1".to_string(),
            alternate: "-1".to_string(),
            ..Default::default()
        };
        let shifts = history_shifts(&wide, &labels, false);
        assert!((shifts[0].z_shift.unwrap() - 0.3).abs() < 1e-12);
    }

    fn shifts_for(values: &[(&str, f64, f64)], outcome: PreviousOutcome) -> Vec<DdmShift> {
        values
            .iter()
            .map(|(s, dc, z)| DdmShift {
                subject: s.to_string(),
                outcome,
                dc_shift: Some(*dc),
                z_shift: Some(*z),
            })
            .collect()
    }

    #[test]
    fn test_correlations_rank_subjects() {
        // z tracks repetition exactly, dc runs against it.
        let shifts = shifts_for(
            &[
                ("a", 0.4, 0.01),
                ("b", 0.3, 0.02),
                ("c", 0.2, 0.03),
                ("d", 0.1, 0.04),
                ("e", 0.0, 0.05),
            ],
            PreviousOutcome::Any,
        );
        let rep = vec![
            summary("a", 0.50, 0.5, 0.5),
            summary("b", 0.55, 0.5, 0.5),
            summary("c", 0.60, 0.5, 0.5),
            summary("d", 0.65, 0.5, 0.5),
            summary("e", 0.70, 0.5, 0.5),
        ];
        let rows = history_correlations(&shifts, &rep);
        assert_eq!(rows.len(), 1);
        let r = &rows[0];
        assert_eq!(r.n_subjects, 5);
        assert!((r.z_repeat.unwrap().rho - 1.0).abs() < 1e-12);
        assert!((r.dc_repeat.unwrap().rho + 1.0).abs() < 1e-12);
        assert!((r.delta_rho.unwrap() - 2.0).abs() < 1e-12);
        // A perfectly collinear matrix leaves Steiger's test undefined.
        assert!(r.steiger.is_none());
    }

    #[test]
    fn test_correlations_use_outcome_specific_repetition() {
        let mut shifts = shifts_for(
            &[("a", 0.1, 0.1), ("b", 0.2, 0.3), ("c", 0.3, 0.2), ("d", 0.4, 0.5), ("e", 0.5, 0.4)],
            PreviousOutcome::Error,
        );
        shifts.push(DdmShift {
            subject: "unknown".to_string(),
            outcome: PreviousOutcome::Error,
            dc_shift: Some(1.0),
            z_shift: Some(1.0),
        });
        // repeat_preverror increases with dc; the overall repeat runs backwards.
        let rep = vec![
            summary("a", 0.9, 0.5, 0.1),
            summary("b", 0.8, 0.5, 0.2),
            summary("c", 0.7, 0.5, 0.3),
            summary("d", 0.6, 0.5, 0.4),
            summary("e", 0.5, 0.5, 0.5),
        ];
        let rows = history_correlations(&shifts, &rep);
        assert_eq!(rows.len(), 1);
        let r = &rows[0];
        assert_eq!(r.outcome, PreviousOutcome::Error);
        assert_eq!(r.n_subjects, 5);
        assert!((r.dc_repeat.unwrap().rho - 1.0).abs() < 1e-12);
        // z ranks [1, 3, 2, 5, 4]: rho = 1 - 6 * 4 / 120.
        assert!((r.z_repeat.unwrap().rho - 0.8).abs() < 1e-12);
        assert!((r.z_dc.unwrap().rho - 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_steiger_on_realistic_shifts() {
        let subjects = ["a", "b", "c", "d", "e", "f", "g", "h"];
        let z = [0.01, 0.03, 0.02, 0.05, 0.04, 0.07, 0.06, 0.08];
        let dc = [0.2, 0.1, 0.4, 0.3, 0.1, 0.2, 0.4, 0.3];
        let shifts: Vec<DdmShift> = subjects
            .iter()
            .enumerate()
            .map(|(i, s)| DdmShift {
                subject: s.to_string(),
                outcome: PreviousOutcome::Any,
                dc_shift: Some(dc[i]),
                z_shift: Some(z[i]),
            })
            .collect();
        let rep: Vec<RepetitionSummary> = subjects
            .iter()
            .enumerate()
            .map(|(i, s)| summary(s, 0.5 + 0.02 * i as f64, 0.5, 0.5))
            .collect();
        let r = &history_correlations(&shifts, &rep)[0];
        let test = r.steiger.unwrap();
        assert_eq!(test.df, 5.0);
        assert!(test.t > 0.0, "z correlates more strongly with repetition");
        assert!(test.p_value > 0.0 && test.p_value <= 1.0);
    }

    #[test]
    fn test_write_outputs() {
        let tmp = tempfile::tempdir().unwrap();
        let shifts = shifts_for(&[("a", 0.1, 0.2)], PreviousOutcome::Correct);
        let rep = vec![summary("a", 0.6, 0.7, 0.4)];

        let path = tmp.path().join("shifts.csv");
        write_shifts(&path, &shifts, &rep).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("subj_idx,previous_outcome,dcshift,zshift,repeat"));
        assert_eq!(lines.next(), Some("a,correct,0.1,0.2,0.7"));

        let path = tmp.path().join("corr.csv");
        write_correlations(&path, &history_correlations(&shifts, &rep)).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 2);
    }
}
