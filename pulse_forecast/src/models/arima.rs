//! ARIMA models for time series forecasting
//!
//! Parameters are estimated by conditional sum of squares (CSS) with a
//! Nelder-Mead search. AR and MA coefficients are searched as `tanh(u)`, so
//! every estimate stays strictly inside the stationary and invertible region.
//! A constant is estimated only when the series is not differenced. Forecast
//! intervals come from the psi-weight expansion of the fitted process, so they
//! widen with the horizon.

use crate::error::{ForecastError, Result};
use crate::models::{ForecastModel, ForecastResult, TrainedForecastModel};
use crate::optimization::{nelder_mead, NelderMeadConfig};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fmt;
use tracing::trace;

/// Bound on the unconstrained coefficient parameter `u`; `|tanh(5)| < 0.9999`
const TRANSFORM_BOUND: f64 = 5.0;

/// Starting value for every AR and MA coefficient
const INITIAL_COEFFICIENT: f64 = 0.1;

/// ARIMA order `(p, d, q)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArimaOrder {
    /// AR order (p)
    pub p: usize,
    /// Differencing order (d)
    pub d: usize,
    /// MA order (q)
    pub q: usize,
}

impl ArimaOrder {
    pub const fn new(p: usize, d: usize, q: usize) -> Self {
        Self { p, d, q }
    }

    fn has_constant(&self) -> bool {
        self.d == 0
    }

    /// AR, MA and constant terms estimated by the optimizer
    fn coefficient_count(&self) -> usize {
        self.p + self.q + usize::from(self.has_constant())
    }
}

impl fmt::Display for ArimaOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{},{})", self.p, self.d, self.q)
    }
}

/// ARIMA model (AutoRegressive Integrated Moving Average)
#[derive(Debug, Clone)]
pub struct ArimaModel {
    /// Name of the model
    name: String,
    order: ArimaOrder,
    /// Normal quantile used for interval bounds
    z_score: f64,
    /// Optimizer iteration cap
    max_iterations: usize,
}

/// Trained ARIMA model
#[derive(Debug, Clone)]
pub struct TrainedArimaModel {
    name: String,
    order: ArimaOrder,
    z_score: f64,
    /// Constant of the differenced series (zero when `d > 0`)
    intercept: f64,
    ar_coefficients: Vec<f64>,
    ma_coefficients: Vec<f64>,
    /// Undifferenced observations
    historical_data: Vec<f64>,
    /// Series after `d` differences
    differenced: Vec<f64>,
    /// One-step residuals on the differenced scale
    residuals: Vec<f64>,
    /// Residual variance estimate
    sigma2: f64,
    aic: f64,
    /// Whether the optimizer met its tolerance before the iteration cap
    converged: bool,
}

impl ArimaModel {
    /// Create a new ARIMA model
    pub fn new(p: usize, d: usize, q: usize) -> Self {
        Self::with_order(ArimaOrder::new(p, d, q))
    }

    pub fn with_order(order: ArimaOrder) -> Self {
        Self {
            name: format!("ARIMA{}", order),
            order,
            z_score: 1.96,
            max_iterations: NelderMeadConfig::default().max_iter,
        }
    }

    /// Set the normal quantile for forecast intervals
    pub fn z_score(mut self, z_score: f64) -> Self {
        self.z_score = z_score;
        self
    }

    /// Cap the number of optimizer iterations per fit
    pub fn max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn order(&self) -> ArimaOrder {
        self.order
    }

    fn failure(&self, reason: impl Into<String>) -> ForecastError {
        ForecastError::FitFailure {
            order: self.order,
            reason: reason.into(),
        }
    }
}

/// Difference a series `d` times
pub fn difference(series: &[f64], d: usize) -> Vec<f64> {
    let mut result = series.to_vec();
    for _ in 0..d {
        result = result.windows(2).map(|w| w[1] - w[0]).collect();
    }
    result
}

/// Undo `d` differences of a forecast, anchored on the end of `history`
fn integrate(forecast: &[f64], history: &[f64], d: usize) -> Vec<f64> {
    let mut result = forecast.to_vec();
    for level in (0..d).rev() {
        let mut level_value = difference(history, level).last().copied().unwrap_or(0.0);
        result = result
            .iter()
            .map(|step| {
                level_value += step;
                level_value
            })
            .collect();
    }
    result
}

/// Residuals of an ARMA(p, q) recursion over `series` around `intercept`
fn arma_residuals(series: &[f64], intercept: f64, ar: &[f64], ma: &[f64]) -> Vec<f64> {
    let start = ar.len().max(ma.len());
    let mut residuals = vec![0.0; series.len()];

    for t in start..series.len() {
        let mut prediction = intercept;
        for (i, phi) in ar.iter().enumerate() {
            prediction += phi * (series[t - 1 - i] - intercept);
        }
        for (i, theta) in ma.iter().enumerate() {
            prediction += theta * residuals[t - 1 - i];
        }
        residuals[t] = series[t] - prediction;
    }

    residuals
}

/// Map optimizer parameters to `(intercept, ar, ma)`; coefficients pass
/// through `tanh`
fn split_params(params: &[f64], order: ArimaOrder) -> (f64, Vec<f64>, Vec<f64>) {
    let offset = usize::from(order.has_constant());
    let intercept = if order.has_constant() { params[0] } else { 0.0 };
    let ar = params[offset..offset + order.p].iter().map(|u| u.tanh()).collect();
    let ma = params[offset + order.p..offset + order.p + order.q]
        .iter()
        .map(|u| u.tanh())
        .collect();
    (intercept, ar, ma)
}

impl ForecastModel for ArimaModel {
    type Trained = TrainedArimaModel;

    fn train(&self, data: &[f64]) -> Result<TrainedArimaModel> {
        let order = self.order;

        if data.iter().any(|v| !v.is_finite()) {
            return Err(self.failure("series contains non-finite values"));
        }

        let differenced = difference(data, order.d);
        let start = order.p.max(order.q);
        let residual_count = differenced.len().saturating_sub(start);
        if residual_count <= order.coefficient_count() {
            return Err(self.failure(format!(
                "{} observations leave too few residuals for {} coefficients",
                data.len(),
                order.coefficient_count()
            )));
        }

        let mean = differenced.iter().sum::<f64>() / differenced.len() as f64;
        let mut initial = Vec::with_capacity(order.coefficient_count());
        let mut bounds = Vec::with_capacity(order.coefficient_count());
        if order.has_constant() {
            initial.push(mean);
            bounds.push((f64::NEG_INFINITY, f64::INFINITY));
        }
        for _ in 0..order.p + order.q {
            initial.push(INITIAL_COEFFICIENT.atanh());
            bounds.push((-TRANSFORM_BOUND, TRANSFORM_BOUND));
        }

        let config = NelderMeadConfig {
            max_iter: self.max_iterations,
            ..Default::default()
        };

        let css = |params: &[f64]| -> f64 {
            let (intercept, ar, ma) = split_params(params, order);
            arma_residuals(&differenced, intercept, &ar, &ma)[start..]
                .iter()
                .map(|e| e * e)
                .sum()
        };

        let minimum = nelder_mead(css, &initial, &bounds, &config);
        trace!(
            order = %order,
            iterations = minimum.iterations,
            converged = minimum.converged,
            css = minimum.value,
            "optimizer finished"
        );

        if !minimum.value.is_finite() {
            return Err(self.failure("objective is not finite"));
        }
        // The best point found is kept when the iteration cap is hit
        if !minimum.converged {
            trace!(
                order = %order,
                iterations = minimum.iterations,
                "using best point before convergence"
            );
        }

        let (intercept, ar, ma) = split_params(&minimum.point, order);
        let residuals = arma_residuals(&differenced, intercept, &ar, &ma);
        let sigma2 = minimum.value / residual_count as f64;
        if !sigma2.is_finite() || sigma2 <= f64::EPSILON {
            return Err(self.failure(format!("degenerate residual variance {}", sigma2)));
        }

        // Gaussian log-likelihood of the conditional residuals; k counts sigma2
        let n = residual_count as f64;
        let log_likelihood = -0.5 * n * ((2.0 * PI * sigma2).ln() + 1.0);
        let k = (order.coefficient_count() + 1) as f64;
        let aic = -2.0 * log_likelihood + 2.0 * k;

        Ok(TrainedArimaModel {
            name: self.name.clone(),
            order,
            z_score: self.z_score,
            intercept,
            ar_coefficients: ar,
            ma_coefficients: ma,
            historical_data: data.to_vec(),
            differenced,
            residuals,
            sigma2,
            aic,
            converged: minimum.converged,
        })
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl TrainedArimaModel {
    pub fn order(&self) -> ArimaOrder {
        self.order
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    pub fn ar_coefficients(&self) -> &[f64] {
        &self.ar_coefficients
    }

    pub fn ma_coefficients(&self) -> &[f64] {
        &self.ma_coefficients
    }

    pub fn residuals(&self) -> &[f64] {
        &self.residuals
    }

    pub fn sigma2(&self) -> f64 {
        self.sigma2
    }

    pub fn aic(&self) -> f64 {
        self.aic
    }

    pub fn converged(&self) -> bool {
        self.converged
    }

    /// Point forecasts on the differenced scale
    fn forecast_differenced(&self, horizon: usize) -> Vec<f64> {
        let mut series = self.differenced.clone();
        let mut residuals = self.residuals.clone();

        for _ in 0..horizon {
            let t = series.len();
            let mut prediction = self.intercept;
            for (i, phi) in self.ar_coefficients.iter().enumerate() {
                if t > i {
                    prediction += phi * (series[t - 1 - i] - self.intercept);
                }
            }
            for (i, theta) in self.ma_coefficients.iter().enumerate() {
                if t > i {
                    prediction += theta * residuals[t - 1 - i];
                }
            }
            series.push(prediction);
            residuals.push(0.0);
        }

        series.split_off(self.differenced.len())
    }

    /// Psi weights of the integrated process, `psi[0] == 1`
    fn psi_weights(&self, horizon: usize) -> Vec<f64> {
        let mut psi = vec![0.0; horizon];
        if horizon == 0 {
            return psi;
        }
        psi[0] = 1.0;
        for j in 1..horizon {
            let mut weight = self.ma_coefficients.get(j - 1).copied().unwrap_or(0.0);
            for (i, phi) in self.ar_coefficients.iter().enumerate() {
                if j > i {
                    weight += phi * psi[j - 1 - i];
                }
            }
            psi[j] = weight;
        }

        for _ in 0..self.order.d {
            let mut running = 0.0;
            for weight in psi.iter_mut() {
                running += *weight;
                *weight = running;
            }
        }

        psi
    }
}

impl TrainedForecastModel for TrainedArimaModel {
    fn forecast(&self, horizon: usize) -> Result<ForecastResult> {
        if self.historical_data.is_empty() {
            return Err(ForecastError::ForecastingError(
                "Model has not been fitted to data".to_string(),
            ));
        }

        let point = integrate(
            &self.forecast_differenced(horizon),
            &self.historical_data,
            self.order.d,
        );

        let mut cumulative = 0.0;
        let intervals = self
            .psi_weights(horizon)
            .iter()
            .zip(&point)
            .map(|(psi, value)| {
                cumulative += psi * psi;
                let half_width = self.z_score * (self.sigma2 * cumulative).sqrt();
                (value - half_width, value + half_width)
            })
            .collect();

        let result = ForecastResult::new_with_intervals(point, horizon, intervals, self.aic)?;
        if !result.is_finite() {
            return Err(ForecastError::FitFailure {
                order: self.order,
                reason: "forecast contains non-finite values".to_string(),
            });
        }
        Ok(result)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn ar_series(phi: f64, n: usize) -> Vec<f64> {
        // Deterministic pseudo-noise keeps the test reproducible
        let mut value = 0.0;
        (0..n)
            .map(|t| {
                value = phi * value + noise(t);
                50.0 + value
            })
            .collect()
    }

    fn noise(t: usize) -> f64 {
        ((t as f64 * 12.9898).sin() * 43758.5453).fract().abs() - 0.5
    }

    fn random_walk(n: usize) -> Vec<f64> {
        let mut level = 100.0;
        (0..n)
            .map(|t| {
                level += noise(t);
                level
            })
            .collect()
    }

    #[test]
    fn test_difference_and_integrate() {
        let series = [1.0, 3.0, 6.0, 10.0];
        assert_eq!(difference(&series, 1), vec![2.0, 3.0, 4.0]);
        assert_eq!(difference(&series, 2), vec![1.0, 1.0]);

        // Continue the second difference at 1.0: diffs 5, 6 then levels 15, 21
        assert_eq!(integrate(&[1.0, 1.0], &series, 2), vec![15.0, 21.0]);
        assert_eq!(integrate(&[2.0], &series, 1), vec![12.0]);
    }

    #[test]
    fn test_order_display() {
        assert_eq!(ArimaOrder::new(1, 0, 1).to_string(), "(1,0,1)");
        assert_eq!(ArimaModel::new(0, 1, 1).name(), "ARIMA(0,1,1)");
    }

    #[test]
    fn test_ar1_recovers_positive_coefficient() {
        let data = ar_series(0.6, 120);
        let trained = ArimaModel::new(1, 0, 0).train(&data).unwrap();

        assert!(trained.ar_coefficients()[0] > 0.3);
        assert!(trained.ar_coefficients()[0] < 0.9);
        assert_relative_eq!(trained.intercept(), 50.0, epsilon = 0.5);
        assert!(trained.aic().is_finite());
    }

    #[test]
    fn test_intervals_widen_with_horizon() {
        let data = random_walk(80);
        let trained = ArimaModel::new(0, 1, 1).train(&data).unwrap();
        let forecast = trained.forecast(4).unwrap();

        assert_eq!(forecast.horizons(), 4);
        let widths: Vec<f64> = forecast.intervals().iter().map(|(l, u)| u - l).collect();
        for pair in widths.windows(2) {
            assert!(pair[1] >= pair[0]);
        }
        for ((lower, upper), value) in forecast.intervals().iter().zip(forecast.values()) {
            assert!(lower < value && value < upper);
        }
    }

    #[test]
    fn test_coefficients_stay_inside_unit_interval() {
        // CSS for this MA(1) keeps falling as theta approaches -1
        let trained = ArimaModel::new(0, 1, 1).train(&[3.0, 5.0, 4.0, 7.0]).unwrap();
        let theta = trained.ma_coefficients()[0];
        assert!(theta < -0.9 && theta > -1.0);
        assert!(trained.forecast(3).unwrap().is_finite());

        let trained = ArimaModel::new(1, 0, 1)
            .train(&[3.0, 4.0, 2.0, 5.0, 4.5, 3.5])
            .unwrap();
        for coefficient in trained.ar_coefficients().iter().chain(trained.ma_coefficients()) {
            assert!(coefficient.abs() < 1.0);
        }
    }

    #[test]
    fn test_iteration_cap_keeps_best_point() {
        let data = ar_series(0.6, 40);
        let trained = ArimaModel::new(1, 0, 1).max_iterations(3).train(&data).unwrap();
        assert!(!trained.converged());
        assert!(trained.sigma2().is_finite());
        assert!(trained.forecast(3).unwrap().is_finite());
    }

    #[test]
    fn test_too_short_series_fails() {
        let err = ArimaModel::new(1, 1, 1).train(&[1.0, 2.0, 3.0]).unwrap_err();
        assert!(matches!(err, ForecastError::FitFailure { .. }));
    }

    #[test]
    fn test_non_finite_series_fails() {
        let err = ArimaModel::new(1, 0, 0)
            .train(&[1.0, 2.0, f64::NAN, 3.0, 4.0, 5.0])
            .unwrap_err();
        assert!(matches!(err, ForecastError::FitFailure { .. }));
    }
}
