//! Moving average fallback model
//!
//! Used when no ARIMA order can be fitted: the forecast is flat at the mean of
//! the last `window` observations and the interval spans `z` sample standard
//! deviations of the whole series.

use crate::error::{ForecastError, Result};
use crate::models::{ForecastModel, ForecastResult, TrainedForecastModel};
use statrs::statistics::Statistics;

/// Fit-quality score attached to fallback forecasts, worse than any real fit
pub const FALLBACK_SCORE: f64 = f64::INFINITY;

/// Simple Moving Average model
#[derive(Debug, Clone)]
pub struct SimpleMA {
    /// Name of the model
    name: String,
    /// Window size
    window: usize,
    z_score: f64,
}

/// Trained Simple Moving Average model
#[derive(Debug, Clone)]
pub struct TrainedSimpleMA {
    /// Name of the model
    name: String,
    /// Mean of the trailing window
    last_average: f64,
    /// Sample standard deviation of the full series
    std_dev: f64,
    z_score: f64,
}

impl SimpleMA {
    /// Create a new Simple Moving Average model
    pub fn new(window: usize) -> Result<Self> {
        if window == 0 {
            return Err(ForecastError::InvalidParameter(
                "Window size must be positive".to_string(),
            ));
        }

        Ok(Self {
            name: format!("Simple Moving Average (window={})", window),
            window,
            z_score: 1.96,
        })
    }

    /// Set the normal quantile for forecast intervals
    pub fn z_score(mut self, z_score: f64) -> Self {
        self.z_score = z_score;
        self
    }

    pub fn window(&self) -> usize {
        self.window
    }
}

impl ForecastModel for SimpleMA {
    type Trained = TrainedSimpleMA;

    fn train(&self, data: &[f64]) -> Result<Self::Trained> {
        if data.is_empty() {
            return Err(ForecastError::Unavailable(
                "Moving average needs at least one observation".to_string(),
            ));
        }

        let tail = &data[data.len().saturating_sub(self.window)..];
        let last_average = tail.iter().mean();
        let std_dev = data.iter().std_dev();

        if !last_average.is_finite() || !std_dev.is_finite() {
            return Err(ForecastError::Unavailable(format!(
                "Moving average statistics are not finite (mean={}, std={})",
                last_average, std_dev
            )));
        }

        Ok(TrainedSimpleMA {
            name: self.name.clone(),
            last_average,
            std_dev,
            z_score: self.z_score,
        })
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl TrainedSimpleMA {
    pub fn last_average(&self) -> f64 {
        self.last_average
    }

    pub fn std_dev(&self) -> f64 {
        self.std_dev
    }
}

impl TrainedForecastModel for TrainedSimpleMA {
    fn forecast(&self, horizon: usize) -> Result<ForecastResult> {
        // Forecast is constant at the last average
        Ok(ForecastResult::flat(
            self.last_average,
            self.z_score * self.std_dev,
            horizon,
            FALLBACK_SCORE,
        ))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_flat_forecast_from_tail() {
        let data = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let trained = SimpleMA::new(3).unwrap().train(&data).unwrap();
        let forecast = trained.forecast(3).unwrap();

        assert_eq!(forecast.values(), &[5.0, 5.0, 5.0]);
        assert!(forecast.aic().is_infinite());

        // Sample std of 1..=6 is sqrt(3.5)
        let half_width = 1.96 * 3.5_f64.sqrt();
        for (lower, upper) in forecast.intervals() {
            assert_relative_eq!(*lower, 5.0 - half_width, epsilon = 1e-12);
            assert_relative_eq!(*upper, 5.0 + half_width, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_invalid_window() {
        assert!(SimpleMA::new(0).is_err());
    }

    #[test]
    fn test_single_point_is_unavailable() {
        let err = SimpleMA::new(3).unwrap().train(&[4.0]).unwrap_err();
        assert!(matches!(err, ForecastError::Unavailable(_)));
    }
}
