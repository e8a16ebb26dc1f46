//! Trial sources and session selection.
//!
//! A [`TrialSource`] stands in for the remote session database: it lists the
//! sessions it knows about and loads the trials of those passing a
//! [`SessionFilter`]. [`CsvTrialSource`] serves a local trial export.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::table::{read_trials, sort_trials};
use crate::trial::Trial;

/// Session with known data-quality problems, excluded by default.
pub const EXCLUDED_SESSION: &str = "a9fb578a-9d7d-42b4-8dbc-3b419ce9f424";

/// Criteria a session must meet to be analyzed. Dates compare as ISO-8601
/// text, so `"2020-03"` works as a month bound.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionFilter {
    /// Minimum percent correct among responded trials.
    pub min_performance: Option<f64>,
    /// Substring the session's task protocol must contain.
    pub task_protocol: Option<String>,
    /// Sessions starting at or after this time.
    pub start_after: Option<String>,
    /// Sessions starting before this time.
    pub start_before: Option<String>,
    pub excluded_sessions: Vec<String>,
}

impl Default for SessionFilter {
    fn default() -> Self {
        Self {
            min_performance: None,
            task_protocol: None,
            start_after: None,
            start_before: None,
            excluded_sessions: vec![EXCLUDED_SESSION.to_string()],
        }
    }
}

/// One session as seen by a [`TrialSource`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: Option<String>,
    pub subject: String,
    pub start: Option<String>,
    pub task_protocol: Option<String>,
    pub n_trials: usize,
    pub performance: Option<f64>,
}

impl SessionFilter {
    pub fn accepts(&self, s: &SessionSummary) -> bool {
        if let Some(id) = &s.session_id {
            if self.excluded_sessions.iter().any(|x| x == id) {
                return false;
            }
        }
        if let Some(min) = self.min_performance {
            if !s.performance.is_some_and(|p| p >= min) {
                return false;
            }
        }
        if let Some(protocol) = &self.task_protocol {
            if !s
                .task_protocol
                .as_deref()
                .is_some_and(|p| p.contains(protocol.as_str()))
            {
                return false;
            }
        }
        if let Some(after) = &self.start_after {
            if !s.start.as_deref().is_some_and(|t| t >= after.as_str()) {
                return false;
            }
        }
        if let Some(before) = &self.start_before {
            if !s.start.as_deref().is_some_and(|t| t < before.as_str()) {
                return false;
            }
        }
        true
    }
}

/// Percent correct among trials with a response and a defined correct side.
pub fn session_performance(trials: &[&Trial]) -> Option<f64> {
    let graded: Vec<bool> = trials
        .iter()
        .filter(|t| t.response.is_some())
        .filter_map(|t| t.is_correct())
        .collect();
    if graded.is_empty() {
        return None;
    }
    let correct = graded.iter().filter(|c| **c).count();
    Some(100.0 * correct as f64 / graded.len() as f64)
}

type SessionKey = (String, Option<String>, Option<String>);

fn session_key(t: &Trial) -> SessionKey {
    (t.subject.clone(), t.session_start.clone(), t.session_id.clone())
}

/// Split trials into sessions, summarized in sorted order.
pub fn summarize_sessions(trials: &[Trial]) -> Vec<(SessionSummary, Vec<&Trial>)> {
    let mut sessions: BTreeMap<SessionKey, Vec<&Trial>> = BTreeMap::new();
    for t in trials {
        sessions.entry(session_key(t)).or_default().push(t);
    }
    sessions
        .into_iter()
        .map(|((subject, start, session_id), rows)| {
            let summary = SessionSummary {
                session_id,
                subject,
                start,
                task_protocol: rows.iter().find_map(|t| t.task_protocol.clone()),
                n_trials: rows.len(),
                performance: session_performance(&rows),
            };
            (summary, rows)
        })
        .collect()
}

/// A provider of session-organized trial data.
pub trait TrialSource {
    fn sessions(&self) -> Result<Vec<SessionSummary>>;

    /// Trials of every accepted session, sorted for history annotation.
    fn load(&self, filter: &SessionFilter) -> Result<Vec<Trial>>;
}

/// A trial export on the local filesystem.
pub struct CsvTrialSource {
    path: PathBuf,
}

impl CsvTrialSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TrialSource for CsvTrialSource {
    fn sessions(&self) -> Result<Vec<SessionSummary>> {
        let trials = read_trials(&self.path)?;
        Ok(summarize_sessions(&trials)
            .into_iter()
            .map(|(summary, _)| summary)
            .collect())
    }

    fn load(&self, filter: &SessionFilter) -> Result<Vec<Trial>> {
        let trials = read_trials(&self.path)?;
        let sessions = summarize_sessions(&trials);
        let total = sessions.len();

        let mut kept: Vec<Trial> = Vec::with_capacity(trials.len());
        let mut n_sessions = 0usize;
        for (summary, rows) in &sessions {
            if filter.accepts(summary) {
                n_sessions += 1;
                kept.extend(rows.iter().map(|t| (*t).clone()));
            } else {
                log::debug!(
                    "skipping session {:?} of {}",
                    summary.session_id,
                    summary.subject
                );
            }
        }
        sort_trials(&mut kept);
        log::info!(
            "{}: kept {n_sessions} of {total} sessions ({} trials)",
            self.path.display(),
            kept.len()
        );
        Ok(kept)
    }
}
