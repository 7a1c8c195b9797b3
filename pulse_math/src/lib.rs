//! # Pulse Math
//!
//! Rolling statistics over monthly update-intensity series and the rule-based
//! classifier that labels an entity as healthy, decaying or stagnant.
//!
//! ```
//! use pulse_math::{classify, Classification, RollingProfile};
//!
//! let profile = RollingProfile::from_values(&[12.0, 10.0, 8.0], 3);
//! assert_eq!(profile.decay_signal, -2.0);
//! assert_eq!(
//!     classify(profile.avg_intensity, profile.recent_intensity, profile.decay_signal),
//!     Classification::Decaying
//! );
//! ```

use thiserror::Error;

pub mod classify;
pub mod rolling;

pub use crate::classify::{classify, Classification, ClassifierThresholds, StateClassifier};
pub use crate::rolling::{decay_signal, rolling_average, RollingProfile, SimpleMovingAverage};

/// Default trailing window for the rolling average
pub const DEFAULT_ROLLING_WINDOW: usize = 3;

/// Errors that can occur in metric and classification calculations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MathError {
    #[error("Insufficient data for calculation: {0}")]
    InsufficientData(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Calculation error: {0}")]
    CalculationError(String),
}

/// Result type for metric operations
pub type Result<T> = std::result::Result<T, MathError>;
