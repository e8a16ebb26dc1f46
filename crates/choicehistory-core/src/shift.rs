//! History-dependent choice shifts.
//!
//! For every subject and previous outcome, psychometric curves are fit
//! separately after leftward and after rightward choices. The shift is the
//! difference in rightward choices (percent) between the two curves at zero
//! contrast. The same computation on the next-trial covariates gives the
//! "future shift", which measures slow drifts in bias that masquerade as
//! history effects; subtracting it gives the corrected shift.

use std::collections::BTreeMap;
use std::path::Path;

use choicehistory_psychofit::{FitSettings, Level, PsychometricFit, SigmoidFamily};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::grouping::ConditionField;
use crate::psychometric::fit_groups;
use crate::table::{fmt_opt, quote_field, write_table};
use crate::trial::{AnnotatedTrial, LEFT, RIGHT};

/// Which neighbouring trial the condition covariates come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lag {
    Previous,
    Next,
}

impl Lag {
    fn fields(self, by_contrast: bool) -> Vec<ConditionField> {
        let mut fields = match self {
            Self::Previous => vec![ConditionField::PreviousChoice, ConditionField::PreviousOutcome],
            Self::Next => vec![ConditionField::NextChoice, ConditionField::NextOutcome],
        };
        if by_contrast {
            fields.push(match self {
                Self::Previous => ConditionField::PreviousContrast,
                Self::Next => ConditionField::NextContrast,
            });
        }
        fields
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShiftOptions {
    /// Also split on the absolute contrast of the neighbouring trial.
    pub by_contrast: bool,
    /// Contrast-resolved fits need more than this many trials to be kept.
    pub min_trials: usize,
}

impl Default for ShiftOptions {
    fn default() -> Self {
        Self {
            by_contrast: false,
            min_trials: 50,
        }
    }
}

/// Choice shift for one (subject, outcome[, contrast]) cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShiftRow {
    pub subject: String,
    pub outcome: f64,
    pub contrast: Option<f64>,
    /// Percent rightward at zero contrast after a leftward choice.
    pub after_left: Option<f64>,
    /// Percent rightward at zero contrast after a rightward choice.
    pub after_right: Option<f64>,
    pub shift: Option<f64>,
}

/// Percent rightward choices predicted at zero contrast.
pub fn percent_right_at_zero(fit: &PsychometricFit, family: SigmoidFamily) -> Option<f64> {
    fit.predict(family, 0.0).map(|p| 100.0 * p)
}

type CellKey = (String, Level, Option<Level>);

/// Fit the per-choice curves and compute the shift for every cell.
pub fn choice_shift(
    trials: &[AnnotatedTrial],
    lag: Lag,
    options: &ShiftOptions,
    settings: &FitSettings,
) -> Vec<ShiftRow> {
    let fields = lag.fields(options.by_contrast);
    let fits = fit_groups(trials, &fields, settings);

    let mut cells: BTreeMap<CellKey, (Option<f64>, Option<f64>)> = BTreeMap::new();
    for g in &fits {
        if options.by_contrast && g.fit.n_trials <= options.min_trials {
            log::debug!(
                "dropping {} group with {} trials",
                g.key.subject,
                g.fit.n_trials
            );
            continue;
        }
        let (Some(choice), Some(outcome)) = (g.key.level(0), g.key.level(1)) else {
            continue;
        };
        let contrast = g.key.levels.get(2).copied();
        let value = percent_right_at_zero(&g.fit, settings.family);
        let cell = cells
            .entry((g.key.subject.clone(), Level::new(outcome), contrast))
            .or_insert((None, None));
        if choice == RIGHT {
            cell.1 = value;
        } else if choice == LEFT {
            cell.0 = value;
        }
    }

    cells
        .into_iter()
        .map(|((subject, outcome, contrast), (after_left, after_right))| ShiftRow {
            subject,
            outcome: outcome.value(),
            contrast: contrast.map(Level::value),
            after_left,
            after_right,
            shift: after_right.zip(after_left).map(|(r, l)| r - l),
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Correction and strategy
// ---------------------------------------------------------------------------

/// History shift with the matching future shift subtracted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrectedShift {
    pub subject: String,
    pub outcome: f64,
    pub contrast: Option<f64>,
    pub history_shift: Option<f64>,
    pub future_shift: Option<f64>,
    pub corrected: Option<f64>,
}

/// Join history and future shifts on (subject, outcome, contrast). Cells
/// present on only one side are dropped.
pub fn correct_shifts(history: &[ShiftRow], future: &[ShiftRow]) -> Vec<CorrectedShift> {
    let key = |r: &ShiftRow| {
        (
            r.subject.clone(),
            Level::new(r.outcome),
            r.contrast.map(Level::new),
        )
    };
    let future: BTreeMap<CellKey, Option<f64>> = future.iter().map(|r| (key(r), r.shift)).collect();
    history
        .iter()
        .filter_map(|h| {
            let future_shift = *future.get(&key(h))?;
            Some(CorrectedShift {
                subject: h.subject.clone(),
                outcome: h.outcome,
                contrast: h.contrast,
                history_shift: h.shift,
                future_shift,
                corrected: h.shift.zip(future_shift).map(|(a, b)| a - b),
            })
        })
        .collect()
}

/// One subject's position in history-strategy space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyPoint {
    pub subject: String,
    pub after_correct: Option<f64>,
    pub after_error: Option<f64>,
}

/// Shift after rewarded and after unrewarded trials, per subject.
/// Contrast-resolved rows are ignored.
pub fn strategy(rows: &[ShiftRow]) -> Vec<StrategyPoint> {
    let mut by_subject: BTreeMap<&str, StrategyPoint> = BTreeMap::new();
    for r in rows.iter().filter(|r| r.contrast.is_none()) {
        let point = by_subject
            .entry(r.subject.as_str())
            .or_insert_with(|| StrategyPoint {
                subject: r.subject.clone(),
                after_correct: None,
                after_error: None,
            });
        if r.outcome > 0.0 {
            point.after_correct = r.shift;
        } else if r.outcome < 0.0 {
            point.after_error = r.shift;
        }
    }
    by_subject.into_values().collect()
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

pub fn write_shifts(path: &Path, rows: &[ShiftRow]) -> Result<()> {
    let table: Vec<Vec<String>> = rows
        .iter()
        .map(|r| {
            vec![
                quote_field(&r.subject),
                r.outcome.to_string(),
                fmt_opt(r.contrast),
                fmt_opt(r.after_left),
                fmt_opt(r.after_right),
                fmt_opt(r.shift),
            ]
        })
        .collect();
    write_table(
        path,
        &["subj_idx", "outcome", "contrast", "after_left", "after_right", "shift"],
        &table,
    )
}

pub fn write_corrected(path: &Path, rows: &[CorrectedShift]) -> Result<()> {
    let table: Vec<Vec<String>> = rows
        .iter()
        .map(|r| {
            vec![
                quote_field(&r.subject),
                r.outcome.to_string(),
                fmt_opt(r.contrast),
                fmt_opt(r.history_shift),
                fmt_opt(r.future_shift),
                fmt_opt(r.corrected),
            ]
        })
        .collect();
    write_table(
        path,
        &[
            "subj_idx",
            "previous_outcome",
            "previous_contrast",
            "history_shift",
            "future_shift",
            "history_shift_corrected",
        ],
        &table,
    )
}

pub fn write_strategy(path: &Path, points: &[StrategyPoint]) -> Result<()> {
    let table: Vec<Vec<String>> = points
        .iter()
        .map(|p| {
            vec![
                quote_field(&p.subject),
                fmt_opt(p.after_correct),
                fmt_opt(p.after_error),
            ]
        })
        .collect();
    write_table(path, &["subj_idx", "after_correct", "after_error"], &table)
}
