//! Curve samples for a downstream renderer.
//!
//! Training contrasts cluster near zero with a lone ±100 % level far out.
//! When 0 % is among the tested levels, the x-axis is drawn broken: a central
//! segment plus two short stubs around ±100 that are displayed next to the
//! central segment. Without 0 % the full range is drawn continuously.

use std::path::Path;

use choicehistory_psychofit::{PsychometricParams, SigmoidFamily};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::table::write_table;

/// Axis layout for sampled curves.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CurveStyle {
    /// `None` breaks the axis exactly when 0 % contrast was tested.
    pub broken_axis: Option<bool>,
    /// Half-open central range sampled on a broken axis.
    pub central: (f64, f64),
    /// Half-open outer range sampled around +100 (mirrored for -100).
    pub outer: (f64, f64),
    /// Display position of the ±100 data points on a broken axis.
    pub outer_display: f64,
    /// Distance the outer curve stubs are moved toward zero on a broken axis.
    pub outer_shift: f64,
    /// Half-open range sampled on a continuous axis.
    pub full: (f64, f64),
    pub step: f64,
}

impl Default for CurveStyle {
    fn default() -> Self {
        Self {
            broken_axis: None,
            central: (-27.0, 27.0),
            outer: (98.0, 103.0),
            outer_display: 35.0,
            outer_shift: 67.0,
            full: (-103.0, 103.0),
            step: 1.0,
        }
    }
}

/// One sampled point; `segment` separates pieces that must not be joined.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurvePoint {
    pub segment: usize,
    /// Stimulus value the curve was evaluated at.
    pub x: f64,
    /// Position on the drawn axis.
    pub x_display: f64,
    pub p_right: f64,
}

impl CurveStyle {
    pub fn is_broken(&self, tested_contrasts: &[f64]) -> bool {
        self.broken_axis
            .unwrap_or_else(|| tested_contrasts.iter().any(|&c| c == 0.0))
    }

    fn range(&self, (lo, hi): (f64, f64)) -> Vec<f64> {
        if !(self.step > 0.0) {
            return Vec::new();
        }
        let n = ((hi - lo) / self.step).ceil().max(0.0) as usize;
        (0..n).map(|i| lo + i as f64 * self.step).collect()
    }

    /// Sample a fitted curve for drawing.
    pub fn sample(
        &self,
        params: &PsychometricParams,
        family: SigmoidFamily,
        tested_contrasts: &[f64],
    ) -> Vec<CurvePoint> {
        let point = |segment: usize, x: f64, x_display: f64| CurvePoint {
            segment,
            x,
            x_display,
            p_right: params.probability(family, x),
        };

        if !self.is_broken(tested_contrasts) {
            return self.range(self.full).into_iter().map(|x| point(0, x, x)).collect();
        }

        let offset = self.outer_shift;
        let mut points: Vec<CurvePoint> = self
            .range((-self.outer.1, -self.outer.0))
            .into_iter()
            .map(|x| point(0, x, x + offset))
            .collect();
        points.extend(self.range(self.central).into_iter().map(|x| point(1, x, x)));
        points.extend(
            self.range(self.outer)
                .into_iter()
                .map(|x| point(2, x, x - offset)),
        );
        points
    }

    /// Where a data point at `contrast` is drawn, or `None` when it is hidden
    /// (±50 % on a broken axis).
    pub fn display_contrast(&self, contrast: f64, broken: bool) -> Option<f64> {
        if !broken {
            return Some(contrast);
        }
        match contrast {
            c if c.abs() == 50.0 => None,
            c if c.abs() == 100.0 => Some(self.outer_display.copysign(c)),
            c => Some(c),
        }
    }
}

pub fn write_curve(path: &Path, points: &[CurvePoint]) -> Result<()> {
    let rows: Vec<Vec<String>> = points
        .iter()
        .map(|p| {
            vec![
                p.segment.to_string(),
                p.x.to_string(),
                p.x_display.to_string(),
                p.p_right.to_string(),
            ]
        })
        .collect();
    write_table(path, &["segment", "x", "x_display", "p_right"], &rows)
}
