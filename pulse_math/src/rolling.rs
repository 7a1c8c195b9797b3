//! Rolling intensity metrics
//!
//! Contains the trailing moving average used for display smoothing, the decay
//! signal (mean month-over-month change) and the [`RollingProfile`] that feeds
//! the state classifier. Missing observations are carried as `NaN` and are
//! skipped by every calculation in this module.

use crate::{MathError, Result};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Trailing Simple Moving Average with a minimum of one observation
///
/// Unlike a strict SMA, a partially filled window already yields a value: the
/// first update returns itself, the second the mean of two, and so on.
#[derive(Debug, Clone)]
pub struct SimpleMovingAverage {
    period: usize,
    values: VecDeque<f64>,
}

impl SimpleMovingAverage {
    /// Create a new moving average over the specified period
    pub fn new(period: usize) -> Result<Self> {
        if period == 0 {
            return Err(MathError::InvalidInput(
                "Period must be greater than zero".to_string(),
            ));
        }

        Ok(Self::at_least_one(period))
    }

    /// Window of `period` observations, widened to one when `period` is zero
    fn at_least_one(period: usize) -> Self {
        let period = period.max(1);
        Self {
            period,
            values: VecDeque::with_capacity(period),
        }
    }

    /// Push a new observation, evicting the oldest once the window is full
    pub fn update(&mut self, value: f64) {
        self.values.push_back(value);
        if self.values.len() > self.period {
            self.values.pop_front();
        }
    }

    /// Average of the valid observations currently in the window
    pub fn value(&self) -> Result<f64> {
        let (sum, count) = self
            .values
            .iter()
            .filter(|v| v.is_finite())
            .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));

        if count == 0 {
            return Err(MathError::InsufficientData(format!(
                "No valid observations in the last {} values",
                self.values.len()
            )));
        }

        Ok(sum / count as f64)
    }

    /// Get the current period
    pub fn period(&self) -> usize {
        self.period
    }

    /// Reset the average, clearing all values
    pub fn reset(&mut self) {
        self.values.clear();
    }
}

/// Trailing moving average over `values`, same length as the input.
///
/// Position `i` averages the valid values among the trailing
/// `min(window, i + 1)` entries. A window containing no valid value yields
/// `NaN`. A `window` of zero is treated as one.
pub fn rolling_average(values: &[f64], window: usize) -> Vec<f64> {
    let mut sma = SimpleMovingAverage::at_least_one(window);

    values
        .iter()
        .map(|&value| {
            sma.update(value);
            sma.value().unwrap_or(f64::NAN)
        })
        .collect()
}

/// Mean of consecutive differences `values[i] - values[i - 1]`.
///
/// A difference touching a missing value is itself missing. Fewer than two
/// points, or no valid difference at all, gives `0.0`.
pub fn decay_signal(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }

    let (sum, count) = values
        .windows(2)
        .map(|w| w[1] - w[0])
        .filter(|d| d.is_finite())
        .fold((0.0, 0usize), |(sum, count), d| (sum + d, count + 1));

    if count == 0 {
        return 0.0;
    }

    let mean = sum / count as f64;
    if mean.is_nan() {
        0.0
    } else {
        mean
    }
}

/// Derived intensity statistics for one entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollingProfile {
    /// Mean of all valid values (`NaN` when there are none)
    pub avg_intensity: f64,
    /// Last valid value (`NaN` when there are none)
    pub recent_intensity: f64,
    /// Mean period-over-period change, never `NaN`
    pub decay_signal: f64,
    /// Trailing moving average, aligned with the input
    pub rolling: Vec<f64>,
}

impl RollingProfile {
    /// Build a profile from a chronologically ordered series
    pub fn from_values(values: &[f64], window: usize) -> Self {
        let (sum, count) = values
            .iter()
            .filter(|v| v.is_finite())
            .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));

        let avg_intensity = if count == 0 {
            f64::NAN
        } else {
            sum / count as f64
        };

        let recent_intensity = values
            .iter()
            .rev()
            .copied()
            .find(|v| v.is_finite())
            .unwrap_or(f64::NAN);

        Self {
            avg_intensity,
            recent_intensity,
            decay_signal: decay_signal(values),
            rolling: rolling_average(values, window),
        }
    }

    /// Whether both intensities could be computed
    pub fn is_complete(&self) -> bool {
        self.avg_intensity.is_finite() && self.recent_intensity.is_finite()
    }
}
