//! Forecasting models for time series data

use crate::error::{ForecastError, Result};
use std::fmt::Debug;

/// Forecast result containing predicted values
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastResult {
    /// Forecasted values
    values: Vec<f64>,
    /// Number of periods forecasted
    horizons: usize,
    /// Interval bounds as `(lower, upper)` per horizon step
    intervals: Vec<(f64, f64)>,
    /// Information criterion of the fit, lower is better
    aic: f64,
}

impl ForecastResult {
    /// Create a new forecast result with confidence intervals
    pub fn new_with_intervals(
        values: Vec<f64>,
        horizons: usize,
        intervals: Vec<(f64, f64)>,
        aic: f64,
    ) -> Result<Self> {
        if values.len() != horizons {
            return Err(ForecastError::ValidationError(format!(
                "Values length ({}) doesn't match horizons ({})",
                values.len(),
                horizons
            )));
        }

        if values.len() != intervals.len() {
            return Err(ForecastError::ValidationError(format!(
                "Values length ({}) doesn't match intervals length ({})",
                values.len(),
                intervals.len()
            )));
        }

        Ok(Self {
            values,
            horizons,
            intervals,
            aic,
        })
    }

    /// Flat forecast of `value` with a symmetric interval of `half_width`
    pub fn flat(value: f64, half_width: f64, horizons: usize, aic: f64) -> Self {
        Self {
            values: vec![value; horizons],
            horizons,
            intervals: vec![(value - half_width, value + half_width); horizons],
            aic,
        }
    }

    /// Get the forecasted values
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Get the number of periods forecasted
    pub fn horizons(&self) -> usize {
        self.horizons
    }

    pub fn intervals(&self) -> &[(f64, f64)] {
        &self.intervals
    }

    pub fn lower_bounds(&self) -> Vec<f64> {
        self.intervals.iter().map(|(lower, _)| *lower).collect()
    }

    pub fn upper_bounds(&self) -> Vec<f64> {
        self.intervals.iter().map(|(_, upper)| *upper).collect()
    }

    /// Get the fit-quality score
    pub fn aic(&self) -> f64 {
        self.aic
    }

    /// Whether every value and bound is a finite number
    pub fn is_finite(&self) -> bool {
        self.values.iter().all(|v| v.is_finite())
            && self
                .intervals
                .iter()
                .all(|(lower, upper)| lower.is_finite() && upper.is_finite())
    }
}

/// Trained forecast model
pub trait TrainedForecastModel: Debug {
    /// Generate forecast for future periods
    fn forecast(&self, horizons: usize) -> Result<ForecastResult>;

    /// Name of the model
    fn name(&self) -> &str;
}

/// Forecast model that can be trained on an ordered series of values
pub trait ForecastModel: Debug + Clone {
    /// The type of trained model produced
    type Trained: TrainedForecastModel;

    /// Train the model on time series values
    fn train(&self, data: &[f64]) -> Result<Self::Trained>;

    /// Get the name of the model
    fn name(&self) -> &str;
}

pub mod arima;
pub mod moving_average;
