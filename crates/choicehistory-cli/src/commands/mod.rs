pub mod annotate;
pub mod chrono;
pub mod clean_rt;
pub mod ddm_data;
pub mod ddm_shift;
pub mod fit;
pub mod models;
pub mod repeat;
pub mod rescale;
pub mod shift;
pub mod simulate;

use std::path::{Path, PathBuf};

use choicehistory_core::run::RunRecorder;
use choicehistory_core::{
    AnalysisConfig, AnnotatedTrial, CsvTrialSource, Result, Trial, TrialSource, annotate,
    load_config_from_path, validate_sequence,
};

/// Print an error and exit with status 1.
pub fn exit_on_error<T>(result: Result<T>, context: &str) -> T {
    match result {
        Ok(v) => v,
        Err(e) => {
            eprintln!("Error {context}: {e}");
            std::process::exit(1);
        }
    }
}

/// The config at `path`, or defaults when no path is given.
pub fn try_load_config(path: Option<&str>) -> Result<AnalysisConfig> {
    match path {
        Some(p) => load_config_from_path(Path::new(p)),
        None => Ok(AnalysisConfig::default()),
    }
}

pub fn load_config(path: Option<&str>) -> AnalysisConfig {
    exit_on_error(try_load_config(path), "loading config")
}

/// Trials of the sessions accepted by the config's session filter, sorted.
pub fn load_trials(input: &str, config: &AnalysisConfig) -> Vec<Trial> {
    let source = CsvTrialSource::new(input);
    let trials = exit_on_error(source.load(&config.sessions), &format!("reading {input}"));
    if trials.is_empty() {
        eprintln!("No sessions in {input} pass the session filter.");
        std::process::exit(1);
    }
    log::debug!("loaded {} trials from {input}", trials.len());
    trials
}

/// Load, sort and annotate; irregular trial sequences are reported.
pub fn load_annotated(input: &str, config: &AnalysisConfig) -> Vec<AnnotatedTrial> {
    let trials = load_trials(input, config);
    let report = validate_sequence(&trials);
    if !report.is_clean() {
        println!(
            "  {} trial(s) follow a gap, duplicate or reversal; their previous-trial fields are empty",
            report.n_irregular()
        );
    }
    annotate(&trials)
}

/// Directory that holds the outputs of a single-file command.
pub fn parent_dir(output: &str) -> PathBuf {
    Path::new(output)
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

pub fn finish_run(recorder: RunRecorder, dir: &Path) {
    let path = exit_on_error(recorder.finish(dir), "writing run manifest");
    println!("\nRun manifest: {}", path.display());
}

/// Table cell for an optional value.
pub fn cell(value: Option<f64>, precision: usize) -> String {
    match value {
        Some(v) if v.is_finite() => format!("{v:.precision$}"),
        _ => "-".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_formats_missing() {
        assert_eq!(cell(None, 2), "-");
        assert_eq!(cell(Some(f64::NAN), 2), "-");
        assert_eq!(cell(Some(1.23456), 2), "1.23");
        assert_eq!(cell(Some(15.0), 1), "15.0");
    }

    #[test]
    fn test_parent_dir() {
        assert_eq!(parent_dir("out/trials.csv"), PathBuf::from("out"));
        assert_eq!(parent_dir("trials.csv"), PathBuf::from("."));
    }

    #[test]
    fn test_default_config_without_path() {
        let cfg = try_load_config(None).unwrap();
        assert_eq!(cfg, AnalysisConfig::default());
    }

    #[test]
    fn test_config_from_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.json");
        std::fs::write(&path, r#"{"shift": {"min_trials": 20}}"#).unwrap();
        let cfg = try_load_config(path.to_str()).unwrap();
        assert_eq!(cfg.shift.min_trials, 20);
    }

    #[test]
    fn test_bad_config_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.json");
        std::fs::write(&path, r#"{"rt_limits": {"floor": 5, "ceiling": 1}}"#).unwrap();
        assert!(try_load_config(path.to_str()).is_err());
    }
}
