//! Rule-based state classification
//!
//! Maps an entity's [`RollingProfile`] onto one of three labels. The rules are
//! evaluated in order and the first match wins:
//!
//! 1. missing average or recent intensity: `STAGNANT`
//! 2. missing decay signal is read as `0.0`
//! 3. `|avg| < stagnant_threshold`: `STAGNANT`
//! 4. `decay < decay_threshold` and `recent < avg`: `DECAYING`
//! 5. otherwise `HEALTHY`

use crate::rolling::RollingProfile;
use crate::{MathError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Default absolute average below which an entity is stagnant
pub const STAGNANT_THRESHOLD: f64 = 1e-6;

/// Default decay signal below which an entity may be decaying
pub const DECAY_THRESHOLD: f64 = -0.01;

/// Categorical state of an entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Classification {
    Healthy,
    Decaying,
    Stagnant,
}

impl Classification {
    /// Label as written to the classification table
    pub fn as_str(&self) -> &'static str {
        match self {
            Classification::Healthy => "HEALTHY",
            Classification::Decaying => "DECAYING",
            Classification::Stagnant => "STAGNANT",
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Classification {
    type Err = MathError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "HEALTHY" => Ok(Classification::Healthy),
            "DECAYING" => Ok(Classification::Decaying),
            "STAGNANT" => Ok(Classification::Stagnant),
            other => Err(MathError::InvalidInput(format!(
                "Unknown classification: {}",
                other
            ))),
        }
    }
}

/// Tunable thresholds for [`StateClassifier`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierThresholds {
    pub stagnant_threshold: f64,
    pub decay_threshold: f64,
}

impl ClassifierThresholds {
    /// Create validated thresholds
    pub fn new(stagnant_threshold: f64, decay_threshold: f64) -> Result<Self> {
        let thresholds = Self {
            stagnant_threshold,
            decay_threshold,
        };
        thresholds.validate()?;
        Ok(thresholds)
    }

    /// Check that both thresholds are usable
    pub fn validate(&self) -> Result<()> {
        if !self.stagnant_threshold.is_finite() || self.stagnant_threshold < 0.0 {
            return Err(MathError::InvalidInput(format!(
                "Stagnant threshold must be a non-negative number, got {}",
                self.stagnant_threshold
            )));
        }
        if !self.decay_threshold.is_finite() {
            return Err(MathError::InvalidInput(format!(
                "Decay threshold must be finite, got {}",
                self.decay_threshold
            )));
        }
        Ok(())
    }
}

impl Default for ClassifierThresholds {
    fn default() -> Self {
        Self {
            stagnant_threshold: STAGNANT_THRESHOLD,
            decay_threshold: DECAY_THRESHOLD,
        }
    }
}

/// Pure classifier over rolling statistics
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StateClassifier {
    thresholds: ClassifierThresholds,
}

impl StateClassifier {
    pub fn new(thresholds: ClassifierThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &ClassifierThresholds {
        &self.thresholds
    }

    /// Classify from raw statistics. `NaN` marks a missing value.
    pub fn classify(
        &self,
        avg_intensity: f64,
        recent_intensity: f64,
        decay_signal: f64,
    ) -> Classification {
        if avg_intensity.is_nan() || recent_intensity.is_nan() {
            return Classification::Stagnant;
        }

        let decay_signal = if decay_signal.is_nan() { 0.0 } else { decay_signal };

        if avg_intensity.abs() < self.thresholds.stagnant_threshold {
            return Classification::Stagnant;
        }

        if decay_signal < self.thresholds.decay_threshold && recent_intensity < avg_intensity {
            return Classification::Decaying;
        }

        Classification::Healthy
    }

    /// Classify with `None` standing in for a missing statistic
    pub fn classify_optional(
        &self,
        avg_intensity: Option<f64>,
        recent_intensity: Option<f64>,
        decay_signal: Option<f64>,
    ) -> Classification {
        self.classify(
            avg_intensity.unwrap_or(f64::NAN),
            recent_intensity.unwrap_or(f64::NAN),
            decay_signal.unwrap_or(f64::NAN),
        )
    }

    pub fn classify_profile(&self, profile: &RollingProfile) -> Classification {
        self.classify(
            profile.avg_intensity,
            profile.recent_intensity,
            profile.decay_signal,
        )
    }
}

/// Classify with the default thresholds
pub fn classify(avg_intensity: f64, recent_intensity: f64, decay_signal: f64) -> Classification {
    StateClassifier::default().classify(avg_intensity, recent_intensity, decay_signal)
}
