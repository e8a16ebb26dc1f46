//! # choicehistory-core
//!
//! Choice-history analysis of two-alternative forced-choice behavior.
//!
//! Trials are loaded from a CSV export, sorted per subject and session, and
//! annotated with what happened on the previous and the next trial. The
//! annotated table then feeds grouped psychometric fits, chronometric
//! summaries, history-shift and repetition analyses, and the dataset handed to
//! a drift-diffusion fitting backend. Parameters fitted by that backend come
//! back as per-subject history shifts and a contrast rescaling.
//!
//! ## Quick Start
//!
//! ```
//! use choicehistory_core::{ConditionField, FitSettings, SimulationConfig, annotate, fit_groups, simulate};
//!
//! let trials = simulate(&SimulationConfig { n_subjects: 1, ..Default::default() });
//! let annotated = annotate(&trials);
//! let fits = fit_groups(&annotated, &[ConditionField::PreviousChoice], &FitSettings::default());
//! assert_eq!(fits.len(), 2);
//! ```
//!
//! ## Architecture
//!
//! TrialSource → sort → annotate → group → fit → tables / run manifest
//!
//! Missing values are `Option<f64>` everywhere. Per-row and per-group
//! problems never abort a run; only structural failures surface as
//! [`AnalysisError`].

pub mod chronometric;
pub mod config;
pub mod curve;
pub mod ddm;
pub mod ddm_shift;
pub mod error;
pub mod grouping;
pub mod history;
pub mod psychometric;
pub mod rescale;
pub mod repetition;
pub mod rt;
pub mod run;
pub mod shift;
pub mod simulate;
pub mod source;
pub mod stats;
pub mod table;
pub mod trial;

pub use choicehistory_psychofit::{
    FitSettings, FitStatus, Level, PsychometricFit, PsychometricParams, SigmoidFamily,
};
pub use chronometric::{ChronometricPoint, subject_medians};
pub use config::{AnalysisConfig, load_config_from_path, parse_sigmoid};
pub use curve::{CurvePoint, CurveStyle};
pub use ddm::{
    BackendFit, DdmModelSpec, DdmRow, ModelScore, SequentialSamplingBackend, SubjectFit,
    WideTable, build_model, fit_per_subject, model_tags, prepare_dataset, read_wide,
    relative_to_baseline, results_long_to_wide,
};
pub use ddm_shift::{
    ConditionLabels, DdmShift, HistoryCorrelation, PreviousOutcome, history_correlations,
    history_shifts,
};
pub use error::{AnalysisError, Result};
pub use grouping::{ConditionField, GroupKey, group_by, parse_fields};
pub use history::{SequenceReport, SubjectSequence, annotate, validate_sequence};
pub use psychometric::{
    ContrastSummary, GroupFit, PsychometricPoint, average_points, fit_average, fit_groups,
    fit_trials, subject_points,
};
pub use repetition::{RepetitionSummary, repetition};
pub use rescale::{DriftPoint, TanhFit, drift_by_contrast, fit_tanh};
pub use rt::{RtCleaningReport, RtLimits, clean, clean_against_reference, clean_trials};
pub use run::{RunManifest, RunRecorder};
pub use shift::{CorrectedShift, Lag, ShiftOptions, ShiftRow, StrategyPoint, choice_shift};
pub use simulate::{SimulationConfig, TRAINING_CONTRASTS, simulate};
pub use source::{CsvTrialSource, SessionFilter, SessionSummary, TrialSource};
pub use table::{read_trials, sort_trials, write_annotated, write_trials};
pub use trial::{AnnotatedTrial, History, Trial};

/// Library version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
