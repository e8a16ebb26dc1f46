//! Chronometric function: reaction time as a function of signed contrast.

use std::collections::BTreeMap;
use std::path::Path;

use choicehistory_psychofit::Level;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::psychometric::ContrastSummary;
use crate::stats::{mean, median, sem};
use crate::table::{fmt_opt, quote_field, write_table};
use crate::trial::Trial;

/// Median RT of one subject at one contrast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChronometricPoint {
    pub subject: String,
    pub signed_contrast: f64,
    pub n_trials: usize,
    pub median_rt: f64,
}

/// Per (contrast, subject) median over trials with a reaction time.
pub fn subject_medians<'a>(trials: impl IntoIterator<Item = &'a Trial>) -> Vec<ChronometricPoint> {
    let mut acc: BTreeMap<(Level, &str), Vec<f64>> = BTreeMap::new();
    for t in trials {
        if let Some(rt) = t.rt.filter(|v| v.is_finite()) {
            acc.entry((Level::new(t.signed_contrast), t.subject.as_str()))
                .or_default()
                .push(rt);
        }
    }
    acc.into_iter()
        .filter_map(|((level, subject), rts)| {
            Some(ChronometricPoint {
                subject: subject.to_string(),
                signed_contrast: level.value(),
                n_trials: rts.len(),
                median_rt: median(rts)?,
            })
        })
        .collect()
}

/// Per contrast: mean of subject medians, its standard error and subject count.
pub fn summarize(points: &[ChronometricPoint]) -> Vec<ContrastSummary> {
    let mut by_contrast: BTreeMap<Level, Vec<&ChronometricPoint>> = BTreeMap::new();
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
                mean: mean(ps.iter().map(|p| p.median_rt))?,
                sem: sem(ps.iter().map(|p| p.median_rt)),
                n_subjects: ps.len(),
                mean_trials: mean(ps.iter().map(|p| p.n_trials as f64))?,
            })
        })
        .collect()
}

pub fn write_points(path: &Path, points: &[ChronometricPoint]) -> Result<()> {
    let rows: Vec<Vec<String>> = points
        .iter()
        .map(|p| {
            vec![
                quote_field(&p.subject),
                p.signed_contrast.to_string(),
                p.n_trials.to_string(),
                p.median_rt.to_string(),
            ]
        })
        .collect();
    write_table(path, &["subj_idx", "signed_contrast", "ntrials", "rt"], &rows)
}

pub fn write_summary(path: &Path, summary: &[ContrastSummary]) -> Result<()> {
    let rows: Vec<Vec<String>> = summary
        .iter()
        .map(|s| {
            vec![
                s.signed_contrast.to_string(),
                s.mean.to_string(),
                fmt_opt(s.sem),
                s.n_subjects.to_string(),
            ]
        })
        .collect();
    write_table(path, &["signed_contrast", "mean", "sem", "n_subjects"], &rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rt_trial(subject: &str, i: i64, contrast: f64, rt: Option<f64>) -> Trial {
        Trial::new(subject, i, contrast).with_rt(rt)
    }

    #[test]
    fn test_subject_medians_skip_missing() {
        let trials = vec![
            rt_trial("a", 0, 25.0, Some(0.2)),
            rt_trial("a", 1, 25.0, Some(0.4)),
            rt_trial("a", 2, 25.0, None),
            rt_trial("a", 3, 25.0, Some(1.0)),
            rt_trial("a", 4, 0.0, None),
        ];
        let points = subject_medians(&trials);
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].n_trials, 3);
        assert_eq!(points[0].median_rt, 0.4);
    }

    #[test]
    fn test_summarize_mean_of_medians() {
        let trials = vec![
            rt_trial("a", 0, 0.0, Some(0.2)),
            rt_trial("a", 1, 0.0, Some(0.4)),
            rt_trial("b", 0, 0.0, Some(0.6)),
        ];
        let summary = summarize(&subject_medians(&trials));
        assert_eq!(summary.len(), 1);
        assert!((summary[0].mean - 0.45).abs() < 1e-12);
        assert_eq!(summary[0].n_subjects, 2);
        assert!(summary[0].sem.is_some());
    }

    #[test]
    fn test_write_summary() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("chrono.csv");
        let summary = vec![ContrastSummary {
            signed_contrast: -25.0,
            mean: 0.3,
            sem: None,
            n_subjects: 1,
            mean_trials: 4.0,
        }];
        write_summary(&path, &summary).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "signed_contrast,mean,sem,n_subjects\n-25,0.3,,1\n");
    }
}
