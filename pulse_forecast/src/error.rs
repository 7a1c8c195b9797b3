//! Error types for the pulse_forecast crate

use crate::models::arima::ArimaOrder;
use thiserror::Error;

/// Custom error types for the pulse_forecast crate
#[derive(Debug, Error)]
pub enum ForecastError {
    /// Error related to data validation or processing
    #[error("Data error: {0}")]
    DataError(String),

    /// Error related to forecasting operations
    #[error("Forecasting error: {0}")]
    ForecastingError(String),

    /// Error related to parameter validation
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Error from invalid parameters
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Too few valid observations to attempt a forecast
    #[error("Insufficient data: need at least {needed} valid observations, got {got}")]
    InsufficientData { needed: usize, got: usize },

    /// A single candidate order could not be fitted
    #[error("ARIMA{order} fit failed: {reason}")]
    FitFailure { order: ArimaOrder, reason: String },

    /// No forecast could be produced for an entity
    #[error("Forecast unavailable: {0}")]
    Unavailable(String),

    /// Error from metric calculations
    #[error("Math error: {0}")]
    MathError(#[from] pulse_math::MathError),

    /// Error from IO operations
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Error from CSV reading or writing
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    /// Error from JSON serialization
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl ForecastError {
    /// Whether this error only means "no forecast for this entity"
    pub fn is_entity_local(&self) -> bool {
        matches!(
            self,
            ForecastError::InsufficientData { .. }
                | ForecastError::Unavailable(_)
                | ForecastError::FitFailure { .. }
        )
    }
}

/// Result type with our custom error
pub type Result<T> = std::result::Result<T, ForecastError>;
