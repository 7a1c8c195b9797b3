//! # Pulse Forecast
//!
//! Short-horizon forecasting of monthly update intensity for every tracked
//! state or union territory.
//!
//! ## Features
//!
//! - Typed ingestion of monthly feature files with malformed rows dropped at the boundary
//! - Entity name normalization through a static alias table
//! - ARIMA fitting over a fixed, priority-ordered list of candidate orders
//! - Constant-series shortcut and moving-average fallback, each tagged in the output
//! - Batch orchestration where one entity's failure never affects another
//!
//! ## Quick Start
//!
//! ```no_run
//! use pulse_forecast::batch::BatchForecaster;
//! use pulse_forecast::data::DataLoader;
//! use pulse_forecast::engine::ForecastConfig;
//!
//! let series = DataLoader::from_csv("data/feature_engineered_monthly.csv")?.into_series();
//! let report = BatchForecaster::new(ForecastConfig::default())?.run_all(&series);
//!
//! println!("forecasted {} of {} states", report.succeeded, report.attempted);
//! report.save_csv("data/state_forecasts_3month.csv")?;
//! # Ok::<(), pulse_forecast::ForecastError>(())
//! ```

pub mod batch;
pub mod data;
pub mod engine;
pub mod error;
pub mod models;
pub mod normalize;
pub mod optimization;
pub mod utils;

// Re-export commonly used types
pub use crate::batch::{BatchForecaster, BatchReport, ForecastRow};
pub use crate::data::{DataLoader, EntityTimeSeries, Observation};
pub use crate::engine::{ForecastConfig, ForecastEngine, ForecastMethod, ForecastOutcome};
pub use crate::error::ForecastError;
pub use crate::models::arima::ArimaOrder;
pub use crate::models::{ForecastModel, ForecastResult};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
