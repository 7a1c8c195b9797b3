//! Batch forecasting and classification across all entities

use crate::data::EntityTimeSeries;
use crate::engine::{ArimaFitter, CandidateFitter, ForecastConfig, ForecastEngine, ForecastOutcome};
use crate::error::Result;
use chrono::NaiveDate;
use pulse_math::{Classification, ClassifierThresholds, RollingProfile, StateClassifier};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use tracing::{info, warn};

/// Column names of the forecast table
pub const FORECAST_HEADER: [&str; 5] = [
    "state",
    "forecast_month",
    "forecast_value",
    "lower_bound",
    "upper_bound",
];

/// Column names of the classification table
pub const CLASSIFICATION_HEADER: [&str; 5] = [
    "state",
    "avg_update_intensity",
    "recent_update_intensity",
    "decay_signal",
    "classification",
];

/// Write `header` followed by `rows`; the header is present even with no rows
fn write_table<W, T>(writer: W, header: &[&str], rows: impl IntoIterator<Item = T>) -> Result<()>
where
    W: Write,
    T: Serialize,
{
    let mut csv_writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);
    csv_writer.write_record(header)?;
    for row in rows {
        csv_writer.serialize(row)?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// One row of the persisted forecast table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastRow {
    #[serde(rename = "state")]
    pub entity_id: String,
    #[serde(rename = "forecast_month")]
    pub forecast_period: NaiveDate,
    pub forecast_value: f64,
    pub lower_bound: f64,
    pub upper_bound: f64,
}

/// Everything produced by one batch run
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    /// Successful forecasts keyed by entity
    pub outcomes: BTreeMap<String, ForecastOutcome>,
    /// Reason each remaining entity has no forecast
    pub failures: BTreeMap<String, String>,
    pub attempted: usize,
    pub succeeded: usize,
}

impl BatchReport {
    /// Flatten into one row per (entity, horizon step)
    pub fn rows(&self) -> Vec<ForecastRow> {
        self.outcomes
            .values()
            .flat_map(|outcome| {
                outcome
                    .forecast_periods
                    .iter()
                    .enumerate()
                    .map(move |(i, period)| ForecastRow {
                        entity_id: outcome.entity_id.clone(),
                        forecast_period: *period,
                        forecast_value: outcome.forecast_values[i],
                        lower_bound: outcome.lower_bounds[i],
                        upper_bound: outcome.upper_bounds[i],
                    })
            })
            .collect()
    }

    /// Write the forecast table with a header row
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        write_table(writer, &FORECAST_HEADER, self.rows())
    }

    pub fn save_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path.as_ref())?;
        self.write_csv(file)?;
        info!(path = %path.as_ref().display(), rows = self.rows().len(), "forecast table written");
        Ok(())
    }

    /// Serialize the full outcomes, including history and fit attempts
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.outcomes)?)
    }
}

/// Runs the forecast engine over every entity independently
#[derive(Debug, Clone)]
pub struct BatchForecaster<F = ArimaFitter> {
    engine: ForecastEngine<F>,
}

impl BatchForecaster<ArimaFitter> {
    pub fn new(config: ForecastConfig) -> Result<Self> {
        Ok(Self {
            engine: ForecastEngine::new(config)?,
        })
    }
}

impl<F: CandidateFitter> BatchForecaster<F> {
    pub fn with_engine(engine: ForecastEngine<F>) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &ForecastEngine<F> {
        &self.engine
    }

    /// Forecast every entity; failures stay local to their entity
    pub fn run_all(&self, series_by_entity: &BTreeMap<String, EntityTimeSeries>) -> BatchReport {
        let mut report = BatchReport::default();

        for (entity_id, series) in series_by_entity {
            report.attempted += 1;
            match self.engine.forecast(series) {
                Ok(outcome) => {
                    report.outcomes.insert(entity_id.clone(), outcome);
                }
                Err(err) => {
                    if !err.is_entity_local() {
                        warn!(entity = %entity_id, error = %err, "unexpected forecast error");
                    }
                    report.failures.insert(entity_id.clone(), err.to_string());
                }
            }
        }

        report.succeeded = report.outcomes.len();
        info!(
            attempted = report.attempted,
            succeeded = report.succeeded,
            "forecasted {} out of {} entities",
            report.succeeded,
            report.attempted
        );
        report
    }
}

/// One row of the persisted classification table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationRow {
    pub state: String,
    pub avg_update_intensity: f64,
    pub recent_update_intensity: f64,
    pub decay_signal: f64,
    pub classification: Classification,
}

/// Rolling profile and label for every entity
pub fn profile_all(
    series_by_entity: &BTreeMap<String, EntityTimeSeries>,
    thresholds: ClassifierThresholds,
    window: usize,
) -> Vec<ClassificationRow> {
    let classifier = StateClassifier::new(thresholds);

    series_by_entity
        .iter()
        .map(|(entity_id, series)| {
            let profile = RollingProfile::from_values(series.values(), window);
            ClassificationRow {
                state: entity_id.clone(),
                avg_update_intensity: profile.avg_intensity,
                recent_update_intensity: profile.recent_intensity,
                decay_signal: profile.decay_signal,
                classification: classifier.classify_profile(&profile),
            }
        })
        .collect()
}

/// Label for every entity
pub fn classify_all(
    series_by_entity: &BTreeMap<String, EntityTimeSeries>,
    thresholds: ClassifierThresholds,
    window: usize,
) -> BTreeMap<String, Classification> {
    profile_all(series_by_entity, thresholds, window)
        .into_iter()
        .map(|row| (row.state, row.classification))
        .collect()
}

/// Write classification rows with a header row
pub fn write_classifications_csv<W: Write>(rows: &[ClassificationRow], writer: W) -> Result<()> {
    write_table(writer, &CLASSIFICATION_HEADER, rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::arima::ArimaOrder;
    use crate::models::ForecastResult;

    fn series(entity: &str, values: &[f64]) -> EntityTimeSeries {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        EntityTimeSeries::from_values(entity, start, values).unwrap()
    }

    #[test]
    fn test_counts_and_failures() {
        let fitter =
            |_: ArimaOrder, values: &[f64], config: &ForecastConfig| -> Result<ForecastResult> {
                Ok(ForecastResult::flat(values[0], 1.0, config.horizon, 1.0))
            };
        let engine = ForecastEngine::with_fitter(ForecastConfig::default(), fitter).unwrap();
        let batch = BatchForecaster::with_engine(engine);

        let mut input = BTreeMap::new();
        input.insert("A".to_string(), series("A", &[1.0, 2.0, 3.0, 2.0, 1.0, 2.0]));
        input.insert("B".to_string(), series("B", &[1.0, 2.0]));

        let report = batch.run_all(&input);
        assert_eq!(report.attempted, 2);
        assert_eq!(report.succeeded, 1);
        assert!(report.outcomes.contains_key("A"));
        assert!(report.failures["B"].contains("Insufficient data"));
        assert_eq!(report.rows().len(), 3);
    }

    #[test]
    fn test_classify_all() {
        let mut input = BTreeMap::new();
        input.insert("UP".to_string(), series("UP", &[1.0, 2.0, 3.0]));
        input.insert("DOWN".to_string(), series("DOWN", &[3.0, 2.0, 1.0]));
        input.insert("ZERO".to_string(), series("ZERO", &[0.0, 0.0]));

        let labels = classify_all(&input, ClassifierThresholds::default(), 3);
        assert_eq!(labels["UP"], Classification::Healthy);
        assert_eq!(labels["DOWN"], Classification::Decaying);
        assert_eq!(labels["ZERO"], Classification::Stagnant);
    }

    #[test]
    fn test_write_classifications_header() {
        let mut input = BTreeMap::new();
        input.insert("GOA".to_string(), series("GOA", &[2.0, 1.0]));
        let rows = profile_all(&input, ClassifierThresholds::default(), 3);

        let mut buffer = Vec::new();
        write_classifications_csv(&rows, &mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("state,avg_update_intensity,recent_update_intensity,decay_signal,classification")
        );
        assert_eq!(lines.next(), Some("GOA,1.5,1.0,-1.0,DECAYING"));
    }

    #[test]
    fn test_empty_tables_keep_header() {
        let mut input = BTreeMap::new();
        input.insert("LADAKH".to_string(), series("LADAKH", &[]));
        let report = BatchForecaster::new(ForecastConfig::default())
            .unwrap()
            .run_all(&input);
        assert_eq!(report.succeeded, 0);
        assert!(report.failures["LADAKH"].contains("Insufficient data"));

        let mut buffer = Vec::new();
        report.write_csv(&mut buffer).unwrap();
        assert_eq!(
            String::from_utf8(buffer).unwrap(),
            "state,forecast_month,forecast_value,lower_bound,upper_bound\n"
        );

        let mut buffer = Vec::new();
        write_classifications_csv(&[], &mut buffer).unwrap();
        assert_eq!(
            String::from_utf8(buffer).unwrap(),
            "state,avg_update_intensity,recent_update_intensity,decay_signal,classification\n"
        );
    }
}
