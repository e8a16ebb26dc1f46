//! Condition fields and group keys for per-subject analyses.

use std::collections::BTreeMap;

use choicehistory_psychofit::Level;
use serde::{Deserialize, Serialize};

use crate::error::{AnalysisError, Result};
use crate::trial::{AnnotatedTrial, History};

/// A history covariate that trials can be split on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionField {
    PreviousChoice,
    PreviousOutcome,
    PreviousContrast,
    NextChoice,
    NextOutcome,
    NextContrast,
}

impl ConditionField {
    pub const ALL: [ConditionField; 6] = [
        Self::PreviousChoice,
        Self::PreviousOutcome,
        Self::PreviousContrast,
        Self::NextChoice,
        Self::NextOutcome,
        Self::NextContrast,
    ];

    /// Column name in annotated tables.
    pub fn name(self) -> &'static str {
        match self {
            Self::PreviousChoice => "previous_choice",
            Self::PreviousOutcome => "previous_outcome",
            Self::PreviousContrast => "previous_contrast",
            Self::NextChoice => "next_choice",
            Self::NextOutcome => "next_outcome",
            Self::NextContrast => "next_contrast",
        }
    }

    /// Parse a column name; the short drift-diffusion names are accepted too.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "previous_choice" | "prevresp" => Some(Self::PreviousChoice),
            "previous_outcome" | "prevfb" => Some(Self::PreviousOutcome),
            "previous_contrast" | "prevcontrast" => Some(Self::PreviousContrast),
            "next_choice" | "nextresp" => Some(Self::NextChoice),
            "next_outcome" | "nextfb" => Some(Self::NextOutcome),
            "next_contrast" | "nextcontrast" => Some(Self::NextContrast),
            _ => None,
        }
    }

    pub fn value(self, h: &History) -> Option<f64> {
        match self {
            Self::PreviousChoice => h.previous_choice,
            Self::PreviousOutcome => h.previous_outcome,
            Self::PreviousContrast => h.previous_contrast,
            Self::NextChoice => h.next_choice,
            Self::NextOutcome => h.next_outcome,
            Self::NextContrast => h.next_contrast,
        }
    }
}

impl std::fmt::Display for ConditionField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Parse a comma-separated list of condition fields. An empty string yields
/// no fields (one group per subject).
pub fn parse_fields(list: &str) -> Result<Vec<ConditionField>> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            ConditionField::parse(s)
                .ok_or_else(|| AnalysisError::Config(format!("unknown condition field: {s}")))
        })
        .collect()
}

/// Subject plus one level per condition field.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GroupKey {
    pub subject: String,
    pub levels: Vec<Level>,
}

impl GroupKey {
    pub fn level(&self, i: usize) -> Option<f64> {
        self.levels.get(i).map(|l| l.value())
    }
}

/// Split trials into groups keyed by subject and the given fields.
///
/// Trials with a missing value in any of the fields belong to no group.
pub fn group_by<'a>(
    trials: &'a [AnnotatedTrial],
    fields: &[ConditionField],
) -> BTreeMap<GroupKey, Vec<&'a AnnotatedTrial>> {
    let mut groups: BTreeMap<GroupKey, Vec<&AnnotatedTrial>> = BTreeMap::new();
    for t in trials {
        let levels: Option<Vec<Level>> = fields
            .iter()
            .map(|f| f.value(&t.history).map(Level::new))
            .collect();
        let Some(levels) = levels else {
            continue;
        };
        groups
            .entry(GroupKey {
                subject: t.trial.subject.clone(),
                levels,
            })
            .or_default()
            .push(t);
    }
    groups
}
