//! Analysis configuration, loaded from JSON.
//!
//! Every field has a default, so a config file only needs the values it
//! changes:
//!
//! ```json
//! { "rt_limits": { "cutoff": 0.08 }, "fit": { "restarts": 8 } }
//! ```

use std::path::Path;

use choicehistory_psychofit::{FitSettings, SigmoidFamily};
use serde::{Deserialize, Serialize};

use crate::curve::CurveStyle;
use crate::ddm_shift::ConditionLabels;
use crate::error::{AnalysisError, Result};
use crate::rt::RtLimits;
use crate::shift::ShiftOptions;
use crate::source::SessionFilter;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub rt_limits: RtLimits,
    /// Drop an RT when the trial duration exceeds it by more than this.
    pub rt_reference_tolerance: Option<f64>,
    pub fit: FitSettings,
    pub shift: ShiftOptions,
    pub sessions: SessionFilter,
    pub curve: CurveStyle,
    /// Condition labels of previous-response parameters in backend results.
    pub ddm_conditions: ConditionLabels,
}

impl AnalysisConfig {
    /// Reject settings that cannot produce meaningful results.
    pub fn validate(&self) -> Result<()> {
        let bad = |msg: String| -> Result<()> { Err(AnalysisError::Config(msg)) };
        let rt = &self.rt_limits;
        if !(rt.floor <= rt.ceiling) {
            return bad(format!("rt floor {} above ceiling {}", rt.floor, rt.ceiling));
        }
        if self.rt_reference_tolerance.is_some_and(|t| !(t >= 0.0)) {
            return bad("rt_reference_tolerance must be non-negative".to_string());
        }
        let (t_lo, t_hi) = self.fit.threshold_bounds;
        if !(t_lo > 0.0 && t_lo <= t_hi) {
            return bad(format!("invalid threshold bounds ({t_lo}, {t_hi})"));
        }
        let (l_lo, l_hi) = self.fit.lapse_bounds;
        if !(0.0 <= l_lo && l_lo <= l_hi && l_hi <= 1.0) {
            return bad(format!("invalid lapse bounds ({l_lo}, {l_hi})"));
        }
        if self.fit.min_levels == 0 {
            return bad("fit.min_levels must be at least 1".to_string());
        }
        let labels = &self.ddm_conditions;
        if labels.repeat == labels.alternate || labels.correct == labels.error {
            return bad("ddm_conditions labels must differ".to_string());
        }
        if self.fit.optimizer.max_iterations == 0 {
            return bad("fit.optimizer.max_iterations must be at least 1".to_string());
        }
        Ok(())
    }
}

/// Load and validate a config file.
pub fn load_config_from_path(path: &Path) -> Result<AnalysisConfig> {
    let raw = std::fs::read_to_string(path)?;
    let config: AnalysisConfig = serde_json::from_str(&raw)?;
    config.validate()?;
    log::debug!("loaded config from {}", path.display());
    Ok(config)
}

/// Parse a sigmoid family name.
pub fn parse_sigmoid(name: &str) -> Result<SigmoidFamily> {
    SigmoidFamily::parse(name).ok_or_else(|| AnalysisError::UnknownSigmoid(name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let cfg = AnalysisConfig::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.rt_limits.ceiling, 60.0);
        assert_eq!(cfg.shift.min_trials, 50);
        assert_eq!(cfg.fit.threshold_bounds, (5.0, 40.0));
    }

    #[test]
    fn test_partial_json() {
        let cfg: AnalysisConfig =
            serde_json::from_str(r#"{"rt_limits": {"cutoff": 0.08}, "fit": {"family": "logistic"}}"#)
                .unwrap();
        assert_eq!(cfg.rt_limits.cutoff, Some(0.08));
        assert_eq!(cfg.rt_limits.ceiling, 60.0);
        assert_eq!(cfg.fit.family, SigmoidFamily::Logistic);
        assert_eq!(cfg.fit.restarts, 4);
    }

    #[test]
    fn test_ddm_condition_labels() {
        let cfg: AnalysisConfig =
            serde_json::from_str(r#"{"ddm_conditions": {"alternate": "-1.0"}}"#).unwrap();
        assert_eq!(cfg.ddm_conditions.repeat, "1.0");
        assert_eq!(cfg.ddm_conditions.alternate, "-1.0");
        cfg.validate().unwrap();

        let clash: AnalysisConfig =
            serde_json::from_str(r#"{"ddm_conditions": {"alternate": "1.0"}}"#).unwrap();
        assert!(matches!(clash.validate(), Err(AnalysisError::Config(_))));
    }

    #[test]
    fn test_load_config_from_path() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.json");
        std::fs::write(&path, r#"{"sessions": {"min_performance": 80}}"#).unwrap();
        let cfg = load_config_from_path(&path).unwrap();
        assert_eq!(cfg.sessions.min_performance, Some(80.0));
        assert_eq!(cfg.sessions.excluded_sessions.len(), 1);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.json");
        std::fs::write(&path, r#"{"fit": {"lapse_bounds": [0.5, 0.1]}}"#).unwrap();
        assert!(matches!(
            load_config_from_path(&path),
            Err(AnalysisError::Config(_))
        ));
    }

    #[test]
    fn test_malformed_json() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(load_config_from_path(&path), Err(AnalysisError::Json(_))));
    }

    #[test]
    fn test_missing_file() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(matches!(
            load_config_from_path(&tmp.path().join("nope.json")),
            Err(AnalysisError::Io(_))
        ));
    }

    #[test]
    fn test_parse_sigmoid() {
        assert_eq!(parse_sigmoid("probit").unwrap(), SigmoidFamily::NormalCdf);
        assert!(matches!(parse_sigmoid("weibull"), Err(AnalysisError::UnknownSigmoid(_))));
    }
}
