//! Drift-diffusion model specifications and the seam to a fitting backend.
//!
//! The diffusion fits themselves run in an external sequential-sampling
//! library. This module owns what surrounds them: a registry of named model
//! specifications, the trial table the backend consumes, per-subject fitting
//! with failure isolation, information criteria, and reshaping of the
//! backend's long-format parameter summaries into one row per subject.

use std::collections::{BTreeMap, BTreeSet};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::Path;

use choicehistory_psychofit::{aic, bic};
use serde::{Deserialize, Serialize};

use crate::error::{AnalysisError, Result};
use crate::table::{fmt_opt, quote_field, split_record, write_table};
use crate::trial::AnnotatedTrial;

// ---------------------------------------------------------------------------
// Model specifications
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Link {
    #[default]
    Identity,
}

/// One regression applied to a diffusion parameter, in Patsy-style notation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Regressor {
    pub parameter: String,
    pub formula: String,
    pub link: Link,
}

impl Regressor {
    fn identity(parameter: &str, formula: &str) -> Self {
        Self {
            parameter: parameter.to_string(),
            formula: formula.to_string(),
            link: Link::Identity,
        }
    }

    /// Right-hand-side terms of the formula (`1` for the intercept).
    pub fn terms(&self) -> Vec<&str> {
        self.formula
            .split_once('~')
            .map(|(_, rhs)| rhs.split('+').map(str::trim).filter(|t| !t.is_empty()).collect())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DdmModelSpec {
    pub name: String,
    pub base_model: String,
    pub regressors: Vec<Regressor>,
    /// Free parameters beyond the default set.
    pub include: Vec<String>,
    pub p_outlier: f64,
    pub is_group_model: bool,
    pub group_only_regressors: bool,
    pub informative: bool,
}

impl DdmModelSpec {
    fn ddm(name: &str, regressors: Vec<Regressor>) -> Self {
        Self {
            name: name.to_string(),
            base_model: "ddm".to_string(),
            regressors,
            include: default_include("ddm"),
            p_outlier: 0.05,
            is_group_model: true,
            group_only_regressors: false,
            informative: false,
        }
    }

    /// Trial-table columns the regressors read.
    pub fn covariates(&self) -> BTreeSet<String> {
        self.regressors
            .iter()
            .flat_map(|r| r.terms())
            .filter(|t| *t != "1")
            .map(|t| t.trim_start_matches("C:").to_string())
            .collect()
    }
}

/// Extra parameters the backend frees for a base model.
pub fn default_include(base_model: &str) -> Vec<String> {
    match base_model {
        "ddm" => vec!["z".to_string()],
        _ => Vec::new(),
    }
}

pub type ModelBuilder = fn() -> DdmModelSpec;

fn ddm_nohist() -> DdmModelSpec {
    DdmModelSpec::ddm(
        "ddm_nohist",
        vec![
            Regressor::identity("v", "v ~ 1 + signed_contrast"),
            Regressor::identity("z", "z ~ 1"),
        ],
    )
}

fn ddm_nohist_stimcat() -> DdmModelSpec {
    DdmModelSpec::ddm(
        "ddm_nohist_stimcat",
        vec![
            Regressor::identity("v", "v ~ 1 + C:signed_contrast"),
            Regressor::identity("z", "z ~ 1"),
        ],
    )
}

fn ddm_prevresp_dcz() -> DdmModelSpec {
    DdmModelSpec::ddm(
        "ddm_prevresp_dcz",
        vec![
            Regressor::identity("v", "v ~ 1 + stimulus + prevresp"),
            Regressor::identity("z", "z ~ 1 + prevresp"),
        ],
    )
}

fn ddm_prevresp_dc() -> DdmModelSpec {
    DdmModelSpec::ddm(
        "ddm_prevresp_dc",
        vec![
            Regressor::identity("v", "v ~ 1 + stimulus + prevresp"),
            Regressor::identity("z", "z ~ 1"),
        ],
    )
}

fn ddm_prevresp_z() -> DdmModelSpec {
    DdmModelSpec::ddm(
        "ddm_prevresp_z",
        vec![
            Regressor::identity("v", "v ~ 1 + stimulus"),
            Regressor::identity("z", "z ~ 1 + prevresp"),
        ],
    )
}

const REGISTRY: [(&str, ModelBuilder); 5] = [
    ("ddm_nohist", ddm_nohist),
    ("ddm_nohist_stimcat", ddm_nohist_stimcat),
    ("ddm_prevresp_dcz", ddm_prevresp_dcz),
    ("ddm_prevresp_dc", ddm_prevresp_dc),
    ("ddm_prevresp_z", ddm_prevresp_z),
];

/// Registered model tags, baseline first.
pub fn model_tags() -> impl Iterator<Item = &'static str> {
    REGISTRY.iter().map(|(tag, _)| *tag)
}

/// Build the specification registered under `tag`.
pub fn build_model(tag: &str) -> Result<DdmModelSpec> {
    REGISTRY
        .iter()
        .find(|(t, _)| *t == tag)
        .map(|(_, build)| build())
        .ok_or_else(|| AnalysisError::UnknownModel(tag.to_string()))
}

// ---------------------------------------------------------------------------
// Dataset
// ---------------------------------------------------------------------------

/// One trial as the diffusion backend sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DdmRow {
    pub subject: String,
    pub rt: f64,
    /// `0` left, `1` right.
    pub response: f64,
    pub signed_contrast: f64,
    /// Stimulus side: `-1` left, `0` none, `+1` right.
    pub stimulus: f64,
    /// Previous choice coded `-1` left, `+1` right.
    pub prevresp: f64,
    /// Previous feedback, `-1` or `+1`.
    pub prevfb: f64,
}

/// Keep trials with RT, response, previous choice and previous outcome, and
/// recode them for the backend.
pub fn prepare_dataset(trials: &[AnnotatedTrial]) -> Vec<DdmRow> {
    let rows: Vec<DdmRow> = trials
        .iter()
        .filter_map(|a| {
            let t = &a.trial;
            let rt = t.rt.filter(|v| v.is_finite())?;
            let response = t.response?;
            let prevresp = a.history.previous_choice?;
            let prevfb = a.history.previous_outcome?;
            if !t.signed_contrast.is_finite() {
                return None;
            }
            Some(DdmRow {
                subject: t.subject.clone(),
                rt,
                response,
                signed_contrast: t.signed_contrast,
                stimulus: if t.signed_contrast == 0.0 {
                    0.0
                } else {
                    t.signed_contrast.signum()
                },
                prevresp: 2.0 * prevresp - 1.0,
                prevfb,
            })
        })
        .collect();
    log::info!(
        "diffusion dataset: kept {} of {} trials",
        rows.len(),
        trials.len()
    );
    rows
}

pub fn write_dataset(path: &Path, rows: &[DdmRow]) -> Result<()> {
    let table: Vec<Vec<String>> = rows
        .iter()
        .map(|r| {
            vec![
                quote_field(&r.subject),
                r.rt.to_string(),
                r.response.to_string(),
                r.signed_contrast.to_string(),
                r.stimulus.to_string(),
                r.prevresp.to_string(),
                r.prevfb.to_string(),
            ]
        })
        .collect();
    write_table(
        path,
        &[
            "subj_idx",
            "rt",
            "response",
            "signed_contrast",
            "stimulus",
            "prevresp",
            "prevfb",
        ],
        &table,
    )
}

// ---------------------------------------------------------------------------
// Backend seam
// ---------------------------------------------------------------------------

/// What a backend reports for one fitted dataset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BackendFit {
    /// Point estimate per parameter node.
    pub parameters: BTreeMap<String, f64>,
    /// Summed log-likelihood of the observed nodes.
    pub log_likelihood: Option<f64>,
    /// Number of free (stochastic) parameters.
    pub n_free: usize,
}

/// A library that fits sequential-sampling models to a trial table.
pub trait SequentialSamplingBackend {
    fn name(&self) -> &str;

    fn fit(&self, spec: &DdmModelSpec, data: &[DdmRow]) -> Result<BackendFit>;
}

/// Fit outcome for one subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectFit {
    pub subject: String,
    pub n_trials: usize,
    pub parameters: BTreeMap<String, f64>,
    pub log_likelihood: Option<f64>,
    pub n_free: usize,
    pub aic: Option<f64>,
    pub bic: Option<f64>,
    /// Set when the backend failed for this subject.
    pub error: Option<String>,
}

impl SubjectFit {
    fn failed(subject: &str, n_trials: usize, error: String) -> Self {
        Self {
            subject: subject.to_string(),
            n_trials,
            parameters: BTreeMap::new(),
            log_likelihood: None,
            n_free: 0,
            aic: None,
            bic: None,
            error: Some(error),
        }
    }
}

/// Fit `spec` separately to each subject's rows. A backend error or panic
/// for one subject is recorded on that subject only.
pub fn fit_per_subject(
    backend: &dyn SequentialSamplingBackend,
    spec: &DdmModelSpec,
    rows: &[DdmRow],
) -> Vec<SubjectFit> {
    let mut by_subject: BTreeMap<&str, Vec<DdmRow>> = BTreeMap::new();
    for r in rows {
        by_subject.entry(r.subject.as_str()).or_default().push(r.clone());
    }

    by_subject
        .into_iter()
        .map(|(subject, data)| {
            log::debug!("{}: fitting {} for {subject}", backend.name(), spec.name);
            let n = data.len();
            match catch_unwind(AssertUnwindSafe(|| backend.fit(spec, &data))) {
                Ok(Ok(fit)) => SubjectFit {
                    subject: subject.to_string(),
                    n_trials: n,
                    aic: aic(fit.n_free, fit.log_likelihood),
                    bic: bic(fit.n_free, n, fit.log_likelihood),
                    parameters: fit.parameters,
                    log_likelihood: fit.log_likelihood,
                    n_free: fit.n_free,
                    error: None,
                },
                Ok(Err(e)) => {
                    log::warn!("{} failed for {subject}: {e}", spec.name);
                    SubjectFit::failed(subject, n, e.to_string())
                }
                Err(_) => {
                    log::warn!("{} panicked for {subject}", spec.name);
                    SubjectFit::failed(subject, n, "backend panicked".to_string())
                }
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Model comparison
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelScore {
    pub model: String,
    pub aic: Option<f64>,
    pub bic: Option<f64>,
}

impl ModelScore {
    /// Criteria over all subjects: summed log-likelihood, summed free
    /// parameters and total trials. Missing when any subject failed.
    pub fn from_fits(model: &str, fits: &[SubjectFit]) -> Self {
        let logp: Option<f64> = fits.iter().map(|f| f.log_likelihood).sum();
        let k: usize = fits.iter().map(|f| f.n_free).sum();
        let n: usize = fits.iter().map(|f| f.n_trials).sum();
        let logp = logp.filter(|_| !fits.is_empty());
        Self {
            model: model.to_string(),
            aic: aic(k, logp),
            bic: bic(k, n, logp),
        }
    }
}

/// Subtract the baseline model's criteria from every other model.
pub fn relative_to_baseline(scores: &[ModelScore], baseline: &str) -> Result<Vec<ModelScore>> {
    let base = scores
        .iter()
        .find(|s| s.model == baseline)
        .ok_or_else(|| AnalysisError::UnknownModel(baseline.to_string()))?;
    let diff = |a: Option<f64>, b: Option<f64>| -> Option<f64> { Some(a? - b?) };
    Ok(scores
        .iter()
        .filter(|s| s.model != baseline)
        .map(|s| ModelScore {
            model: s.model.clone(),
            aic: diff(s.aic, base.aic),
            bic: diff(s.bic, base.bic),
        })
        .collect())
}

// ---------------------------------------------------------------------------
// Long-to-wide reshaping
// ---------------------------------------------------------------------------

/// A per-subject parameter node name split into its parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeName {
    pub parameter: String,
    pub condition: Option<String>,
    pub subject: String,
}

impl NodeName {
    /// Column label in the wide table, `param` or `param(cond)`.
    pub fn column(&self) -> String {
        match &self.condition {
            Some(c) => format!("{}({c})", self.parameter),
            None => self.parameter.clone(),
        }
    }
}

/// Parse `param_subj.ID`, `param_subj(cond).ID` or `param(cond)_subj.ID`.
/// Group-level nodes return `None`.
pub fn parse_node_name(name: &str) -> Option<NodeName> {
    let idx = name.rfind("_subj")?;
    let (head, tail) = (&name[..idx], &name[idx + "_subj".len()..]);

    let (condition, subject) = if let Some(rest) = tail.strip_prefix('.') {
        (None, rest)
    } else if let Some(rest) = tail.strip_prefix('(') {
        let close = rest.rfind(").")?;
        (Some(&rest[..close]), &rest[close + 2..])
    } else {
        return None;
    };

    let (parameter, condition) = match (condition, head.strip_suffix(')')) {
        (None, Some(inner)) => match inner.split_once('(') {
            Some((p, c)) => (p, Some(c)),
            None => (head, None),
        },
        _ => (head, condition),
    };

    if parameter.is_empty() || subject.is_empty() {
        return None;
    }
    Some(NodeName {
        parameter: parameter.to_string(),
        condition: condition.map(str::to_string),
        subject: subject.to_string(),
    })
}

/// One row per subject, one column per parameter (and condition).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WideTable {
    pub columns: Vec<String>,
    pub rows: Vec<(String, Vec<Option<f64>>)>,
}

impl WideTable {
    pub fn get(&self, subject: &str, column: &str) -> Option<f64> {
        let c = self.columns.iter().position(|x| x == column)?;
        let (_, values) = self.rows.iter().find(|(s, _)| s == subject)?;
        values[c]
    }
}

/// Pivot `(node name, mean)` pairs into a [`WideTable`]. Rows and columns are
/// sorted; names that are not per-subject nodes are skipped.
pub fn results_long_to_wide(entries: &[(String, f64)]) -> WideTable {
    let mut cells: BTreeMap<String, BTreeMap<String, f64>> = BTreeMap::new();
    let mut columns: BTreeSet<String> = BTreeSet::new();
    for (name, value) in entries {
        let Some(node) = parse_node_name(name) else {
            continue;
        };
        columns.insert(node.column());
        cells
            .entry(node.subject.clone())
            .or_default()
            .insert(node.column(), *value);
    }
    let columns: Vec<String> = columns.into_iter().collect();
    let rows = cells
        .into_iter()
        .map(|(subject, values)| {
            let row = columns.iter().map(|c| values.get(c).copied()).collect();
            (subject, row)
        })
        .collect();
    WideTable { columns, rows }
}

/// Read `(node name, mean)` pairs from a backend summary CSV. The node name
/// is the first column; the estimate is the `mean` column.
pub fn parse_results(text: &str) -> Result<Vec<(String, f64)>> {
    let mut lines = text.lines().filter(|l| !l.trim().is_empty());
    let header = split_record(lines.next().ok_or(AnalysisError::EmptyInput)?);
    let mean_col = header
        .iter()
        .position(|h| h.trim() == "mean")
        .ok_or_else(|| AnalysisError::MissingColumn("mean".to_string()))?;

    let mut out = Vec::new();
    for (i, line) in lines.enumerate() {
        let fields = split_record(line);
        let name = fields.first().cloned().unwrap_or_default();
        let cell = fields.get(mean_col).map(String::as_str).unwrap_or("");
        let value: f64 = cell.trim().parse().map_err(|_| AnalysisError::InvalidValue {
            row: i + 2,
            column: "mean".to_string(),
            value: cell.to_string(),
        })?;
        out.push((name, value));
    }
    Ok(out)
}

/// Read a backend summary CSV straight into a [`WideTable`].
pub fn read_wide(path: &Path) -> Result<WideTable> {
    let text = std::fs::read_to_string(path)?;
    Ok(results_long_to_wide(&parse_results(&text)?))
}

pub fn write_wide(path: &Path, table: &WideTable) -> Result<()> {
    let mut header = vec!["subj_idx"];
    header.extend(table.columns.iter().map(String::as_str));
    let rows: Vec<Vec<String>> = table
        .rows
        .iter()
        .map(|(subject, values)| {
            let mut row = vec![quote_field(subject)];
            row.extend(values.iter().map(|v| fmt_opt(*v)));
            row
        })
        .collect();
    write_table(path, &header, &rows)
}
