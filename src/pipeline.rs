//! End-to-end run: load, classify, forecast, persist

use crate::config::PulseConfig;
use crate::Result;
use pulse_forecast::batch::{profile_all, write_classifications_csv, ClassificationRow};
use pulse_forecast::data::{filter_with_history, DataLoader, LoadReport};
use pulse_forecast::{BatchForecaster, BatchReport, EntityTimeSeries, ForecastMethod};
use pulse_math::Classification;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::path::PathBuf;
use tracing::{info, warn};

/// Which part of the pipeline to run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Classify,
    Forecast,
    All,
}

impl Stage {
    fn classifies(self) -> bool {
        matches!(self, Stage::Classify | Stage::All)
    }

    fn forecasts(self) -> bool {
        matches!(self, Stage::Forecast | Stage::All)
    }
}

/// What a run did, for the caller to report
#[derive(Debug, Clone, Default, Serialize)]
pub struct PipelineSummary {
    pub load: LoadReport,
    /// Entities left after the history filter
    pub entities: usize,
    pub classified: usize,
    pub label_counts: BTreeMap<Classification, usize>,
    pub forecast_attempted: usize,
    pub forecast_succeeded: usize,
    /// Entities forecast by the moving-average fallback
    pub fallback_entities: Vec<String>,
    pub written: Vec<PathBuf>,
}

/// Runs the configured stages against the data directory
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: PulseConfig,
}

impl Pipeline {
    pub fn new(config: PulseConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &PulseConfig {
        &self.config
    }

    /// Load the monthly feature table and drop entities with short history
    pub fn load(&self) -> Result<(LoadReport, BTreeMap<String, EntityTimeSeries>)> {
        let loaded = DataLoader::from_csv(self.config.monthly_features_path())?;
        let report = loaded.report.clone();
        let total = DataLoader::entity_count(&loaded.observations);
        let series = filter_with_history(loaded.into_series(), self.config.min_history_months);

        if series.len() < total {
            info!(
                kept = series.len(),
                dropped = total - series.len(),
                min_months = self.config.min_history_months,
                "filtered entities by history length"
            );
        }
        Ok((report, series))
    }

    pub fn classify(&self, series: &BTreeMap<String, EntityTimeSeries>) -> Vec<ClassificationRow> {
        profile_all(series, self.config.classifier, self.config.rolling_window)
    }

    pub fn forecast(&self, series: &BTreeMap<String, EntityTimeSeries>) -> Result<BatchReport> {
        let forecaster = BatchForecaster::new(self.config.forecast.clone())?;
        Ok(forecaster.run_all(series))
    }

    /// Run the requested stages and write their tables into the data directory
    pub fn run(&self, stage: Stage) -> Result<PipelineSummary> {
        info!(
            environment = %self.config.environment,
            data_dir = %self.config.data_dir.display(),
            ?stage,
            "starting pipeline"
        );
        let (load, series) = self.load()?;
        let mut summary = PipelineSummary {
            load,
            entities: series.len(),
            ..Default::default()
        };

        if series.is_empty() {
            warn!(
                path = %self.config.monthly_features_path().display(),
                "no entity has enough history; nothing to do"
            );
        }

        if let Some(dir) = &self.config.output_dir {
            fs::create_dir_all(dir)?;
        }

        if stage.classifies() {
            let rows = self.classify(&series);
            for row in &rows {
                *summary.label_counts.entry(row.classification).or_insert(0) += 1;
            }
            summary.classified = rows.len();

            let path = self.config.classifications_path();
            write_classifications_csv(&rows, File::create(&path)?)?;
            info!(path = %path.display(), rows = rows.len(), "classification table written");
            summary.written.push(path);
        }

        if stage.forecasts() {
            let report = self.forecast(&series)?;
            summary.forecast_attempted = report.attempted;
            summary.forecast_succeeded = report.succeeded;
            summary.fallback_entities = report
                .outcomes
                .values()
                .filter(|outcome| outcome.method == ForecastMethod::MovingAverageFallback)
                .map(|outcome| outcome.entity_id.clone())
                .collect();

            for (entity_id, reason) in &report.failures {
                warn!(entity = %entity_id, %reason, "no forecast");
            }

            let csv_path = self.config.forecasts_path();
            report.save_csv(&csv_path)?;
            summary.written.push(csv_path);

            let json_path = self.config.forecasts_json_path();
            fs::write(&json_path, report.to_json()?)?;
            summary.written.push(json_path);
        }

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PulseError;

    #[test]
    fn test_stage_selection() {
        assert!(Stage::All.classifies() && Stage::All.forecasts());
        assert!(!Stage::Classify.forecasts());
        assert!(!Stage::Forecast.classifies());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = PulseConfig {
            rolling_window: 0,
            ..Default::default()
        };
        assert!(Pipeline::new(config).is_err());
    }

    #[test]
    fn test_missing_input_is_io_error() {
        let config = PulseConfig {
            data_dir: PathBuf::from("/nonexistent/uidai"),
            ..Default::default()
        };
        let pipeline = Pipeline::new(config).unwrap();
        assert!(matches!(
            pipeline.run(Stage::All),
            Err(PulseError::Forecast(pulse_forecast::ForecastError::IoError(_)))
        ));
    }
}
