//! Grouped psychometric fits and per-contrast summary points.

use std::collections::BTreeMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::Path;

use choicehistory_psychofit::{
    FitSettings, FitStatus, Level, LevelSummary, PsychometricFit, fit_levels, fit_psychometric,
};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::grouping::{ConditionField, GroupKey, group_by};
use crate::stats::{mean, sem};
use crate::table::{fmt_opt, quote_field, write_table};
use crate::trial::{AnnotatedTrial, Trial};

// ---------------------------------------------------------------------------
// Grouped fits
// ---------------------------------------------------------------------------

/// Fit result for one (subject, condition levels) group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupFit {
    pub key: GroupKey,
    pub fit: PsychometricFit,
}

/// Fit one group of trials (stimulus = signed contrast, choice = response).
pub fn fit_trials<'a>(
    trials: impl IntoIterator<Item = &'a Trial>,
    settings: &FitSettings,
) -> PsychometricFit {
    let (x, y): (Vec<f64>, Vec<Option<f64>>) = trials
        .into_iter()
        .map(|t| (t.signed_contrast, t.response))
        .unzip();
    fit_psychometric(&x, &y, settings)
}

/// Fit every (subject, condition) group independently.
///
/// A panic inside one group's fit is caught and recorded as a `Failed` group
/// with missing parameters; the remaining groups are still fitted.
pub fn fit_groups(
    trials: &[AnnotatedTrial],
    fields: &[ConditionField],
    settings: &FitSettings,
) -> Vec<GroupFit> {
    let groups = group_by(trials, fields);
    log::info!("fitting {} psychometric group(s)", groups.len());

    groups
        .into_iter()
        .map(|(key, rows)| {
            let fit = match catch_unwind(AssertUnwindSafe(|| {
                fit_trials(rows.iter().map(|a| &a.trial), settings)
            })) {
                Ok(fit) => fit,
                Err(_) => {
                    log::warn!("psychometric fit panicked for subject {}", key.subject);
                    let n = rows.iter().filter(|a| a.trial.response.is_some()).count();
                    PsychometricFit::missing(n, 0, FitStatus::Failed)
                }
            };
            GroupFit { key, fit }
        })
        .collect()
}

/// Header and rows of a group-fit table.
pub fn group_fit_table(
    fields: &[ConditionField],
    fits: &[GroupFit],
) -> (Vec<String>, Vec<Vec<String>>) {
    let mut header = vec!["subj_idx".to_string()];
    header.extend(fields.iter().map(|f| f.name().to_string()));
    header.extend(
        [
            "bias",
            "threshold",
            "lapselow",
            "lapsehigh",
            "ntrials",
            "nlevels",
            "neg_log_likelihood",
            "status",
        ]
        .map(String::from),
    );

    let rows = fits
        .iter()
        .map(|g| {
            let mut row = vec![quote_field(&g.key.subject)];
            row.extend(g.key.levels.iter().map(|l| l.value().to_string()));
            row.extend([
                fmt_opt(g.fit.bias),
                fmt_opt(g.fit.threshold),
                fmt_opt(g.fit.lapse_low),
                fmt_opt(g.fit.lapse_high),
                g.fit.n_trials.to_string(),
                g.fit.n_levels.to_string(),
                fmt_opt(g.fit.neg_log_likelihood),
                g.fit.status.to_string(),
            ]);
            row
        })
        .collect();
    (header, rows)
}

pub fn write_group_fits(path: &Path, fields: &[ConditionField], fits: &[GroupFit]) -> Result<()> {
    let (header, rows) = group_fit_table(fields, fits);
    let header: Vec<&str> = header.iter().map(String::as_str).collect();
    write_table(path, &header, &rows)
}

// ---------------------------------------------------------------------------
// Summary points
// ---------------------------------------------------------------------------

/// Choices of one subject at one contrast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PsychometricPoint {
    pub subject: String,
    pub signed_contrast: f64,
    pub n_trials: usize,
    pub fraction_right: f64,
}

/// Across-subject summary at one contrast.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContrastSummary {
    pub signed_contrast: f64,
    /// Mean over subjects of the per-subject value.
    pub mean: f64,
    pub sem: Option<f64>,
    pub n_subjects: usize,
    /// Mean over subjects of the per-subject trial count.
    pub mean_trials: f64,
}

/// Per (contrast, subject) trial count and fraction of rightward choices.
/// Trials without a response are ignored.
pub fn subject_points<'a>(trials: impl IntoIterator<Item = &'a Trial>) -> Vec<PsychometricPoint> {
    let mut acc: BTreeMap<(Level, &str), (usize, f64)> = BTreeMap::new();
    for t in trials {
        let Some(r) = t.response else { continue };
        let e = acc
            .entry((Level::new(t.signed_contrast), t.subject.as_str()))
            .or_insert((0, 0.0));
        e.0 += 1;
        e.1 += r;
    }
    acc.into_iter()
        .map(|((level, subject), (n, sum))| PsychometricPoint {
            subject: subject.to_string(),
            signed_contrast: level.value(),
            n_trials: n,
            fraction_right: sum / n as f64,
        })
        .collect()
}

/// Average subject points per contrast.
pub fn average_points(points: &[PsychometricPoint]) -> Vec<ContrastSummary> {
    let mut by_contrast: BTreeMap<Level, Vec<&PsychometricPoint>> = BTreeMap::new();
    for p in points {
        by_contrast
            .entry(Level::new(p.signed_contrast))
            .or_default()
            .push(p);
    }
    by_contrast
        .into_iter()
        .filter_map(|(level, ps)| {
            Some(ContrastSummary {
                signed_contrast: level.value(),
                mean: mean(ps.iter().map(|p| p.fraction_right))?,
                sem: sem(ps.iter().map(|p| p.fraction_right)),
                n_subjects: ps.len(),
                mean_trials: mean(ps.iter().map(|p| p.n_trials as f64))?,
            })
        })
        .collect()
}

/// Fit one curve to the subject-averaged points, weighting each contrast by
/// the mean per-subject trial count (rounded, at least one).
pub fn fit_average(summaries: &[ContrastSummary], settings: &FitSettings) -> PsychometricFit {
    let levels: Vec<LevelSummary> = summaries
        .iter()
        .map(|s| LevelSummary {
            level: s.signed_contrast,
            n_trials: (s.mean_trials.round() as usize).max(1),
            fraction: s.mean,
        })
        .collect();
    fit_levels(&levels, settings)
}

pub fn write_points(path: &Path, points: &[PsychometricPoint]) -> Result<()> {
    let rows: Vec<Vec<String>> = points
        .iter()
        .map(|p| {
            vec![
                quote_field(&p.subject),
                p.signed_contrast.to_string(),
                p.n_trials.to_string(),
                p.fraction_right.to_string(),
            ]
        })
        .collect();
    write_table(
        path,
        &["subj_idx", "signed_contrast", "ntrials", "fraction"],
        &rows,
    )
}
