//! Utility functions for the pulse_forecast crate

use crate::error::{ForecastError, Result};
use chrono::{Datelike, Months, NaiveDate};
use statrs::distribution::{ContinuousCDF, Normal};

/// Create future month labels for forecasting.
///
/// Returns `horizon` consecutive first-of-month dates starting one month
/// after `last_period`.
pub fn future_periods(last_period: NaiveDate, horizon: usize) -> Result<Vec<NaiveDate>> {
    let anchor = last_period.with_day(1).unwrap_or(last_period);

    (1..=horizon)
        .map(|step| {
            u32::try_from(step)
                .ok()
                .and_then(|step| anchor.checked_add_months(Months::new(step)))
                .ok_or_else(|| {
                    ForecastError::ValidationError(format!(
                        "Cannot advance {} by {} months",
                        anchor, step
                    ))
                })
        })
        .collect()
}

/// Two-sided normal quantile for a confidence level in (0, 1)
pub fn z_score_for(confidence_level: f64) -> Result<f64> {
    if !(confidence_level > 0.0 && confidence_level < 1.0) {
        return Err(ForecastError::ValidationError(
            "Confidence level must be between 0 and 1".to_string(),
        ));
    }

    let normal = Normal::new(0.0, 1.0)
        .map_err(|e| ForecastError::ForecastingError(e.to_string()))?;
    Ok(normal.inverse_cdf((1.0 + confidence_level) / 2.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_future_periods() {
        assert_eq!(
            future_periods(date(2024, 6, 1), 3).unwrap(),
            vec![date(2024, 7, 1), date(2024, 8, 1), date(2024, 9, 1)]
        );
        assert_eq!(
            future_periods(date(2024, 11, 20), 2).unwrap(),
            vec![date(2024, 12, 1), date(2025, 1, 1)]
        );
        assert!(future_periods(date(2024, 6, 1), 0).unwrap().is_empty());
    }

    #[test]
    fn test_z_score_for() {
        assert_relative_eq!(z_score_for(0.95).unwrap(), 1.959964, epsilon = 1e-5);
        assert!(z_score_for(1.0).is_err());
        assert!(z_score_for(f64::NAN).is_err());
    }
}
