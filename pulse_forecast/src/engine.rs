//! Per-entity forecast engine
//!
//! One call to [`ForecastEngine::forecast`] walks a fixed decision path:
//!
//! 1. fewer than `min_observations` valid points: [`ForecastError::InsufficientData`]
//! 2. near-constant series: flat mean forecast, no model fit
//! 3. candidate ARIMA orders in priority order, stopping at the first fit
//! 4. moving-average fallback tagged with an infinite quality score
//! 5. if the fallback cannot be computed: [`ForecastError::Unavailable`]

use crate::data::EntityTimeSeries;
use crate::error::{ForecastError, Result};
use crate::models::arima::{ArimaModel, ArimaOrder};
use crate::models::moving_average::SimpleMA;
use crate::models::{ForecastModel, ForecastResult, TrainedForecastModel};
use crate::utils::{future_periods, z_score_for};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use std::fmt;
use tracing::{debug, warn};

/// Candidate orders in the order they are tried
pub const DEFAULT_CANDIDATE_ORDERS: [ArimaOrder; 5] = [
    ArimaOrder::new(1, 0, 1),
    ArimaOrder::new(1, 1, 1),
    ArimaOrder::new(0, 1, 1),
    ArimaOrder::new(1, 0, 0),
    ArimaOrder::new(0, 0, 1),
];

/// Quality score recorded for the degenerate-series path
pub const DEGENERATE_SCORE: f64 = 0.0;

/// Tunable parameters of the forecast engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    /// Number of future months to forecast
    pub horizon: usize,
    /// Valid observations required before anything is attempted
    pub min_observations: usize,
    /// Standard deviation below which a series counts as constant
    pub degenerate_epsilon: f64,
    /// Minimum interval half-width for constant series, as a share of the mean
    pub degenerate_floor_ratio: f64,
    /// Trailing observations averaged by the fallback
    pub fallback_window: usize,
    /// Normal quantile for interval bounds
    pub z_score: f64,
    pub candidate_orders: Vec<ArimaOrder>,
    /// Optimizer iteration cap for each candidate fit
    pub max_fit_iterations: usize,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            horizon: 3,
            min_observations: 6,
            degenerate_epsilon: 0.001,
            degenerate_floor_ratio: 0.1,
            fallback_window: 3,
            z_score: 1.96,
            candidate_orders: DEFAULT_CANDIDATE_ORDERS.to_vec(),
            max_fit_iterations: 1000,
        }
    }
}

impl ForecastConfig {
    /// Replace the fixed z-score with the quantile of a confidence level
    pub fn with_confidence_level(mut self, confidence_level: f64) -> Result<Self> {
        self.z_score = z_score_for(confidence_level)?;
        Ok(self)
    }

    pub fn with_horizon(mut self, horizon: usize) -> Self {
        self.horizon = horizon;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.horizon == 0 {
            return Err(ForecastError::InvalidParameter(
                "Forecast horizon must be positive".to_string(),
            ));
        }
        if self.min_observations < 2 {
            return Err(ForecastError::InvalidParameter(format!(
                "At least 2 observations are required, got {}",
                self.min_observations
            )));
        }
        if !self.degenerate_epsilon.is_finite() || self.degenerate_epsilon < 0.0 {
            return Err(ForecastError::InvalidParameter(format!(
                "Degenerate epsilon must be a non-negative number, got {}",
                self.degenerate_epsilon
            )));
        }
        if !self.degenerate_floor_ratio.is_finite() || self.degenerate_floor_ratio < 0.0 {
            return Err(ForecastError::InvalidParameter(format!(
                "Degenerate floor ratio must be a non-negative number, got {}",
                self.degenerate_floor_ratio
            )));
        }
        if self.fallback_window == 0 {
            return Err(ForecastError::InvalidParameter(
                "Fallback window must be positive".to_string(),
            ));
        }
        if !self.z_score.is_finite() || self.z_score <= 0.0 {
            return Err(ForecastError::InvalidParameter(format!(
                "z-score must be positive, got {}",
                self.z_score
            )));
        }
        if self.max_fit_iterations == 0 {
            return Err(ForecastError::InvalidParameter(
                "Fit iteration cap must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Fits one candidate order and forecasts `config.horizon` steps
pub trait CandidateFitter {
    fn fit_candidate(
        &self,
        order: ArimaOrder,
        values: &[f64],
        config: &ForecastConfig,
    ) -> Result<ForecastResult>;
}

/// Default fitter backed by [`ArimaModel`]
#[derive(Debug, Clone, Copy, Default)]
pub struct ArimaFitter;

impl CandidateFitter for ArimaFitter {
    fn fit_candidate(
        &self,
        order: ArimaOrder,
        values: &[f64],
        config: &ForecastConfig,
    ) -> Result<ForecastResult> {
        ArimaModel::with_order(order)
            .z_score(config.z_score)
            .max_iterations(config.max_fit_iterations)
            .train(values)?
            .forecast(config.horizon)
    }
}

impl<F> CandidateFitter for F
where
    F: Fn(ArimaOrder, &[f64], &ForecastConfig) -> Result<ForecastResult>,
{
    fn fit_candidate(
        &self,
        order: ArimaOrder,
        values: &[f64],
        config: &ForecastConfig,
    ) -> Result<ForecastResult> {
        self(order, values, config)
    }
}

/// Result of trying one candidate order
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AttemptOutcome {
    Fitted { aic: f64 },
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FitAttempt {
    pub order: ArimaOrder,
    pub outcome: AttemptOutcome,
}

/// Which path produced a forecast
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "order", rename_all = "snake_case")]
pub enum ForecastMethod {
    Arima(ArimaOrder),
    Degenerate,
    MovingAverageFallback,
}

impl fmt::Display for ForecastMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ForecastMethod::Arima(order) => write!(f, "ARIMA{}", order),
            ForecastMethod::Degenerate => f.write_str("constant mean"),
            ForecastMethod::MovingAverageFallback => f.write_str("moving average fallback"),
        }
    }
}

/// Forecast for one entity together with the history it was built from
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastOutcome {
    pub entity_id: String,
    pub history: Vec<(NaiveDate, f64)>,
    pub forecast_periods: Vec<NaiveDate>,
    pub forecast_values: Vec<f64>,
    pub lower_bounds: Vec<f64>,
    pub upper_bounds: Vec<f64>,
    /// Information criterion of the fit; `0.0` for constant series and
    /// `+inf` for the moving-average fallback
    pub quality_score: f64,
    pub method: ForecastMethod,
    pub attempts: Vec<FitAttempt>,
}

impl ForecastOutcome {
    /// Whether the forecast came from a fitted model
    pub fn is_model_fit(&self) -> bool {
        matches!(self.method, ForecastMethod::Arima(_))
    }

    pub fn horizon(&self) -> usize {
        self.forecast_periods.len()
    }
}

/// Forecasts one entity at a time
#[derive(Debug, Clone)]
pub struct ForecastEngine<F = ArimaFitter> {
    config: ForecastConfig,
    fitter: F,
}

impl ForecastEngine<ArimaFitter> {
    pub fn new(config: ForecastConfig) -> Result<Self> {
        Self::with_fitter(config, ArimaFitter)
    }
}

impl<F: CandidateFitter> ForecastEngine<F> {
    /// Create an engine that fits candidates with `fitter`
    pub fn with_fitter(config: ForecastConfig, fitter: F) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, fitter })
    }

    pub fn config(&self) -> &ForecastConfig {
        &self.config
    }

    /// Forecast `config.horizon` months past the end of `series`
    pub fn forecast(&self, series: &EntityTimeSeries) -> Result<ForecastOutcome> {
        let entity_id = series.entity_id();
        let history = series.valid_points();

        if history.len() < self.config.min_observations {
            warn!(
                entity = %entity_id,
                valid = history.len(),
                needed = self.config.min_observations,
                "skipping forecast: not enough valid observations"
            );
            return Err(ForecastError::InsufficientData {
                needed: self.config.min_observations,
                got: history.len(),
            });
        }

        let values: Vec<f64> = history.iter().map(|(_, value)| *value).collect();
        let last_period = history
            .last()
            .map(|(period, _)| *period)
            .ok_or_else(|| ForecastError::DataError(format!("{} has no observations", entity_id)))?;
        let periods = future_periods(last_period, self.config.horizon)?;

        let std_dev = values.iter().std_dev();
        if std_dev < self.config.degenerate_epsilon {
            warn!(entity = %entity_id, std_dev, "near-constant series, using mean forecast");
            let mean = values.iter().mean();
            let spread = std_dev.max(self.config.degenerate_floor_ratio * mean);
            let result = ForecastResult::flat(
                mean,
                self.config.z_score * spread,
                self.config.horizon,
                DEGENERATE_SCORE,
            );
            return Ok(self.outcome(
                series,
                history,
                periods,
                result,
                ForecastMethod::Degenerate,
                Vec::new(),
            ));
        }

        let mut attempts = Vec::with_capacity(self.config.candidate_orders.len());
        for &order in &self.config.candidate_orders {
            match self.try_candidate(order, &values) {
                Ok(result) => {
                    debug!(
                        entity = %entity_id,
                        order = %order,
                        aic = result.aic(),
                        "candidate fitted"
                    );
                    attempts.push(FitAttempt {
                        order,
                        outcome: AttemptOutcome::Fitted { aic: result.aic() },
                    });
                    return Ok(self.outcome(
                        series,
                        history,
                        periods,
                        result,
                        ForecastMethod::Arima(order),
                        attempts,
                    ));
                }
                Err(err) => {
                    debug!(entity = %entity_id, order = %order, error = %err, "candidate failed");
                    attempts.push(FitAttempt {
                        order,
                        outcome: AttemptOutcome::Failed {
                            reason: err.to_string(),
                        },
                    });
                }
            }
        }

        warn!(
            entity = %entity_id,
            attempts = attempts.len(),
            "all candidate orders failed, using moving average fallback"
        );
        let result = SimpleMA::new(self.config.fallback_window)?
            .z_score(self.config.z_score)
            .train(&values)
            .and_then(|trained| trained.forecast(self.config.horizon))
            .map_err(|err| {
                ForecastError::Unavailable(format!("{}: fallback failed: {}", entity_id, err))
            })?;

        Ok(self.outcome(
            series,
            history,
            periods,
            result,
            ForecastMethod::MovingAverageFallback,
            attempts,
        ))
    }

    fn try_candidate(&self, order: ArimaOrder, values: &[f64]) -> Result<ForecastResult> {
        let result = self.fitter.fit_candidate(order, values, &self.config)?;
        if result.horizons() != self.config.horizon {
            return Err(ForecastError::FitFailure {
                order,
                reason: format!(
                    "expected {} forecast steps, got {}",
                    self.config.horizon,
                    result.horizons()
                ),
            });
        }
        if !result.is_finite() || result.aic().is_nan() {
            return Err(ForecastError::FitFailure {
                order,
                reason: "forecast contains non-finite values".to_string(),
            });
        }
        Ok(result)
    }

    fn outcome(
        &self,
        series: &EntityTimeSeries,
        history: Vec<(NaiveDate, f64)>,
        forecast_periods: Vec<NaiveDate>,
        result: ForecastResult,
        method: ForecastMethod,
        attempts: Vec<FitAttempt>,
    ) -> ForecastOutcome {
        ForecastOutcome {
            entity_id: series.entity_id().to_string(),
            history,
            forecast_periods,
            forecast_values: result.values().to_vec(),
            lower_bounds: result.lower_bounds(),
            upper_bounds: result.upper_bounds(),
            quality_score: result.aic(),
            method,
            attempts,
        }
    }
}
