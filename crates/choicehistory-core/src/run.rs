//! Run manifests: a `run.json` describing one analysis run.
//!
//! A [`RunRecorder`] is started when a command begins, collects the files it
//! writes and the counts it wants to report, and is finished into a
//! [`RunManifest`] next to the outputs.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::AnalysisConfig;
use crate::error::Result;

pub const MANIFEST_FILE: &str = "run.json";

// ---------------------------------------------------------------------------
// Manifest (run.json)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunManifest {
    pub version: u32,
    pub id: String,
    pub started_at: String,
    pub ended_at: String,
    pub duration_ms: u64,
    pub command: String,
    pub input: Option<String>,
    pub outputs: Vec<String>,
    pub counts: BTreeMap<String, u64>,
    pub config: AnalysisConfig,
    pub choicehistory_version: String,
}

// ---------------------------------------------------------------------------
// Recorder
// ---------------------------------------------------------------------------

pub struct RunRecorder {
    id: String,
    command: String,
    input: Option<PathBuf>,
    outputs: Vec<PathBuf>,
    counts: BTreeMap<String, u64>,
    config: AnalysisConfig,
    started_at: SystemTime,
    started_instant: Instant,
}

impl RunRecorder {
    pub fn start(command: &str, input: Option<&Path>, config: &AnalysisConfig) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            command: command.to_string(),
            input: input.map(Path::to_path_buf),
            outputs: Vec::new(),
            counts: BTreeMap::new(),
            config: config.clone(),
            started_at: SystemTime::now(),
            started_instant: Instant::now(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn add_output(&mut self, path: &Path) {
        self.outputs.push(path.to_path_buf());
    }

    pub fn count(&mut self, name: &str, value: usize) {
        self.counts.insert(name.to_string(), value as u64);
    }

    /// Build the manifest without writing it.
    pub fn manifest(&self) -> RunManifest {
        let ended_at = SystemTime::now();
        RunManifest {
            version: 1,
            id: self.id.clone(),
            started_at: utc_timestamp(
                self.started_at.duration_since(UNIX_EPOCH).unwrap_or_default(),
            ),
            ended_at: utc_timestamp(ended_at.duration_since(UNIX_EPOCH).unwrap_or_default()),
            duration_ms: self.started_instant.elapsed().as_millis() as u64,
            command: self.command.clone(),
            input: self.input.as_ref().map(|p| p.display().to_string()),
            outputs: self.outputs.iter().map(|p| p.display().to_string()).collect(),
            counts: self.counts.clone(),
            config: self.config.clone(),
            choicehistory_version: crate::VERSION.to_string(),
        }
    }

    /// Write `run.json` into `dir`, returning its path.
    pub fn finish(self, dir: &Path) -> Result<PathBuf> {
        let manifest = self.manifest();
        std::fs::create_dir_all(dir)?;
        let path = dir.join(MANIFEST_FILE);
        std::fs::write(&path, serde_json::to_string_pretty(&manifest)?)?;
        log::info!("run {} written to {}", manifest.id, path.display());
        Ok(path)
    }
}

pub fn read_manifest(path: &Path) -> Result<RunManifest> {
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

/// UTC timestamp with second resolution, e.g. `2026-02-15T01:30:00Z`.
fn utc_timestamp(since_epoch: Duration) -> String {
    let secs = since_epoch.as_secs();
    let (year, month, day) = civil_date(secs / 86_400);
    let time_of_day = secs % 86_400;
    format!(
        "{year:04}-{month:02}-{day:02}T{:02}:{:02}:{:02}Z",
        time_of_day / 3600,
        time_of_day / 60 % 60,
        time_of_day % 60,
    )
}

/// Proleptic Gregorian (year, month, day) of a day count since 1970-01-01.
///
/// Counts in 400-year eras starting on March 1st so that the leap day falls
/// at the end of each shifted year.
fn civil_date(days_since_epoch: u64) -> (u64, u64, u64) {
    // 1970-01-01 is day 719_468 counted from 0000-03-01.
    let days = days_since_epoch + 719_468;
    let era = days / 146_097;
    let day_of_era = days % 146_097;
    let year_of_era =
        (day_of_era - day_of_era / 1460 + day_of_era / 36_524 - day_of_era / 146_096) / 365;
    let day_of_year = day_of_era - (365 * year_of_era + year_of_era / 4 - year_of_era / 100);
    let shifted_month = (5 * day_of_year + 2) / 153;
    let day = day_of_year - (153 * shifted_month + 2) / 5 + 1;
    let month = if shifted_month < 10 { shifted_month + 3 } else { shifted_month - 9 };
    let year = era * 400 + year_of_era + u64::from(month <= 2);
    (year, month, day)
}
