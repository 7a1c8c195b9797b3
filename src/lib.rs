//! # UIDAI Pulse
//!
//! `uidai_pulse` ties the metric and forecasting crates into one pipeline:
//! load the monthly feature table, label every state by its update-intensity
//! trend, forecast the next few months, and write both tables back out.
//!
//! ## Example
//!
//! ```no_run
//! use uidai_pulse::{Pipeline, PulseConfig, Stage};
//!
//! let config = PulseConfig::default().with_env()?;
//! let summary = Pipeline::new(config)?.run(Stage::All)?;
//! println!("{} states classified", summary.classified);
//! # Ok::<(), uidai_pulse::PulseError>(())
//! ```

use pulse_forecast::ForecastError;
use pulse_math::MathError;
use thiserror::Error;

pub mod config;
pub mod pipeline;

pub use crate::config::{Environment, PulseConfig};
pub use crate::pipeline::{Pipeline, PipelineSummary, Stage};

/// Errors surfaced by a pipeline run
#[derive(Error, Debug)]
pub enum PulseError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Forecast(#[from] ForecastError),

    #[error(transparent)]
    Math(#[from] MathError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, PulseError>;
