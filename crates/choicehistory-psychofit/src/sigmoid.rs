//! Sigmoid families for psychometric curves with two lapse rates.
//!
//! Every family maps a standardized stimulus `z = (x - bias) / threshold` onto
//! `[0, 1]`. The lapse rates then squeeze that S-curve between
//! `lapse_low` and `1 - lapse_high`.

use serde::{Deserialize, Serialize};
use statrs::function::erf::{erf, erfc};
use std::f64::consts::SQRT_2;

/// Shape of the S-curve underlying the psychometric function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SigmoidFamily {
    /// `(erf(z) + 1) / 2`, the erf psychometric with two lapse rates.
    #[default]
    Erf,
    /// Standard normal CDF `Φ(z)`.
    NormalCdf,
    /// Logistic `1 / (1 + e^-z)`.
    Logistic,
}

impl std::fmt::Display for SigmoidFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Erf => write!(f, "erf"),
            Self::NormalCdf => write!(f, "normal_cdf"),
            Self::Logistic => write!(f, "logistic"),
        }
    }
}

impl SigmoidFamily {
    /// All supported families, default first.
    pub const ALL: [SigmoidFamily; 3] = [Self::Erf, Self::NormalCdf, Self::Logistic];

    /// Parse a family name. Accepts a few common aliases.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "erf" | "erf_psycho_2gammas" => Some(Self::Erf),
            "normal_cdf" | "normal" | "probit" => Some(Self::NormalCdf),
            "logistic" | "logit" => Some(Self::Logistic),
            _ => None,
        }
    }

    /// Evaluate the unit S-curve at `z`.
    pub fn unit(self, z: f64) -> f64 {
        match self {
            Self::Erf => (erf(z) + 1.0) / 2.0,
            Self::NormalCdf => 0.5 * erfc(-z / SQRT_2),
            Self::Logistic => 1.0 / (1.0 + (-z).exp()),
        }
    }
}

/// The four parameters of a two-lapse psychometric function.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PsychometricParams {
    /// Stimulus value at the midpoint of the S-curve.
    pub bias: f64,
    /// Inverse slope; larger means a shallower curve.
    pub threshold: f64,
    /// Floor of the curve (rightward choices at strong leftward evidence).
    pub lapse_low: f64,
    /// Distance of the ceiling from 1.
    pub lapse_high: f64,
}

impl PsychometricParams {
    pub const fn new(bias: f64, threshold: f64, lapse_low: f64, lapse_high: f64) -> Self {
        Self {
            bias,
            threshold,
            lapse_low,
            lapse_high,
        }
    }

    pub fn to_array(self) -> [f64; 4] {
        [self.bias, self.threshold, self.lapse_low, self.lapse_high]
    }

    pub fn from_slice(values: &[f64]) -> Option<Self> {
        match values {
            [bias, threshold, lapse_low, lapse_high] => {
                Some(Self::new(*bias, *threshold, *lapse_low, *lapse_high))
            }
            _ => None,
        }
    }

    /// Probability of a rightward choice at stimulus `x`.
    pub fn probability(&self, family: SigmoidFamily, x: f64) -> f64 {
        let z = (x - self.bias) / self.threshold;
        self.lapse_low + (1.0 - self.lapse_low - self.lapse_high) * family.unit(z)
    }

    /// Evaluate the curve at every stimulus in `xs`.
    pub fn curve(&self, family: SigmoidFamily, xs: &[f64]) -> Vec<f64> {
        xs.iter().map(|&x| self.probability(family, x)).collect()
    }
}
