//! Time series data handling for forecasting
//!
//! This is the ingestion boundary: raw CSV rows are parsed into typed
//! [`Observation`]s here, malformed rows are dropped, and the survivors are
//! grouped into one [`EntityTimeSeries`] per entity. Nothing past this module
//! looks at column names.

use crate::error::{ForecastError, Result};
use crate::normalize::normalize_entity;
use chrono::{Datelike, Months, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};

/// Column holding the entity name
pub const ENTITY_COLUMN: &str = "state";
/// Column holding the observation month
pub const PERIOD_COLUMN: &str = "year_month";
/// Column holding the update intensity
pub const VALUE_COLUMN: &str = "update_intensity";

/// One monthly measurement for one entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub entity_id: String,
    /// First day of the observed month
    pub period: NaiveDate,
    /// Update intensity, `NaN` when the source value was missing
    pub value: f64,
}

impl Observation {
    pub fn new(entity_id: impl Into<String>, period: NaiveDate, value: f64) -> Self {
        Self {
            entity_id: entity_id.into(),
            period: first_of_month(period),
            value,
        }
    }
}

/// Parse a period string into the first day of its month.
///
/// Accepts `YYYY-MM-DD`, `YYYY-MM`, `YYYY-MM-DD HH:MM:SS` and
/// `YYYY-MM-DDTHH:MM:SS`.
pub fn parse_period(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(first_of_month(date));
    }

    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(datetime) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(first_of_month(datetime.date()));
        }
    }

    NaiveDate::parse_from_str(&format!("{}-01", raw), "%Y-%m-%d").ok()
}

fn first_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// Ordered monthly series for one entity.
///
/// Periods are strictly increasing and unique.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityTimeSeries {
    entity_id: String,
    periods: Vec<NaiveDate>,
    values: Vec<f64>,
}

impl EntityTimeSeries {
    /// Build a series from unordered `(period, value)` points.
    ///
    /// Points are sorted by period. When a period repeats, the point that
    /// appears last in the input wins.
    pub fn new(
        entity_id: impl Into<String>,
        points: impl IntoIterator<Item = (NaiveDate, f64)>,
    ) -> Self {
        let by_period: BTreeMap<NaiveDate, f64> = points
            .into_iter()
            .map(|(period, value)| (first_of_month(period), value))
            .collect();

        let (periods, values) = by_period.into_iter().unzip();

        Self {
            entity_id: entity_id.into(),
            periods,
            values,
        }
    }

    /// Build a series of consecutive months starting at `start`
    pub fn from_values(
        entity_id: impl Into<String>,
        start: NaiveDate,
        values: &[f64],
    ) -> Result<Self> {
        let start = first_of_month(start);
        let points = values
            .iter()
            .enumerate()
            .map(|(i, &value)| {
                start
                    .checked_add_months(Months::new(i as u32))
                    .map(|period| (period, value))
                    .ok_or_else(|| {
                        ForecastError::DataError(format!(
                            "Period {} months after {} is out of range",
                            i, start
                        ))
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self::new(entity_id, points))
    }

    /// Build a series from the observations of `entity_id`, ignoring any
    /// that belong to another entity
    pub fn from_observations<'a>(
        entity_id: impl Into<String>,
        observations: impl IntoIterator<Item = &'a Observation>,
    ) -> Self {
        let entity_id = entity_id.into();
        let points: Vec<(NaiveDate, f64)> = observations
            .into_iter()
            .filter(|obs| obs.entity_id == entity_id)
            .map(|obs| (obs.period, obs.value))
            .collect();
        Self::new(entity_id, points)
    }

    pub fn entity_id(&self) -> &str {
        &self.entity_id
    }

    pub fn periods(&self) -> &[NaiveDate] {
        &self.periods
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn last_period(&self) -> Option<NaiveDate> {
        self.periods.last().copied()
    }

    /// Points with a finite value, in period order
    pub fn valid_points(&self) -> Vec<(NaiveDate, f64)> {
        self.periods
            .iter()
            .copied()
            .zip(self.values.iter().copied())
            .filter(|(_, value)| value.is_finite())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.periods.is_empty()
    }

    pub fn len(&self) -> usize {
        self.periods.len()
    }
}

/// Group observations into one series per entity
pub fn group_by_entity(
    observations: impl IntoIterator<Item = Observation>,
) -> BTreeMap<String, EntityTimeSeries> {
    let mut grouped: BTreeMap<String, Vec<(NaiveDate, f64)>> = BTreeMap::new();
    for obs in observations {
        grouped
            .entry(obs.entity_id)
            .or_default()
            .push((obs.period, obs.value));
    }

    grouped
        .into_iter()
        .map(|(entity_id, points)| {
            let series = EntityTimeSeries::new(entity_id.clone(), points);
            (entity_id, series)
        })
        .collect()
}

/// Keep only entities covering at least `min_months` distinct periods
pub fn filter_with_history(
    series: BTreeMap<String, EntityTimeSeries>,
    min_months: usize,
) -> BTreeMap<String, EntityTimeSeries> {
    series
        .into_iter()
        .filter(|(entity_id, s)| {
            let keep = s.len() >= min_months;
            if !keep {
                debug!(
                    entity = %entity_id,
                    months = s.len(),
                    min_months,
                    "dropping entity with short history"
                );
            }
            keep
        })
        .collect()
}

/// Counts collected while loading a monthly feature file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    pub rows_read: usize,
    pub rows_kept: usize,
    pub invalid_periods: usize,
    /// Unparsable values, kept as missing
    pub invalid_values: usize,
    pub invalid_entities: usize,
}

/// Loaded and validated monthly observations
#[derive(Debug, Clone)]
pub struct LoadedData {
    pub observations: Vec<Observation>,
    pub report: LoadReport,
}

impl LoadedData {
    pub fn into_series(self) -> BTreeMap<String, EntityTimeSeries> {
        group_by_entity(self.observations)
    }
}

#[derive(Debug, Deserialize)]
struct RawRow {
    state: Option<String>,
    year_month: Option<String>,
    update_intensity: Option<String>,
}

enum ParsedValue {
    Present(f64),
    Missing,
    Malformed,
}

fn parse_value(raw: Option<&str>) -> ParsedValue {
    let raw = match raw.map(str::trim) {
        None | Some("") => return ParsedValue::Missing,
        Some(raw) => raw,
    };

    match raw.to_ascii_lowercase().as_str() {
        "nan" | "na" | "null" | "none" => return ParsedValue::Missing,
        _ => {}
    }

    match raw.parse::<f64>() {
        Ok(value) if value.is_finite() => ParsedValue::Present(value),
        _ => ParsedValue::Malformed,
    }
}

/// Data loader for monthly update-intensity files
#[derive(Debug)]
pub struct DataLoader;

impl DataLoader {
    /// Load observations from a CSV file
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<LoadedData> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let loaded = Self::from_reader(file)?;
        info!(
            path = %path.display(),
            rows = loaded.report.rows_read,
            kept = loaded.report.rows_kept,
            "loaded monthly features"
        );
        Ok(loaded)
    }

    /// Load observations from any CSV source with a header row
    pub fn from_reader<R: Read>(reader: R) -> Result<LoadedData> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(reader);

        let headers = csv_reader.headers()?.clone();
        for required in [ENTITY_COLUMN, PERIOD_COLUMN, VALUE_COLUMN] {
            if !headers.iter().any(|h| h == required) {
                return Err(ForecastError::DataError(format!(
                    "Missing required column '{}'",
                    required
                )));
            }
        }

        let mut report = LoadReport::default();
        let mut observations = Vec::new();

        for row in csv_reader.deserialize::<RawRow>() {
            let row = row?;
            report.rows_read += 1;

            let Some(entity_id) = row.state.as_deref().and_then(normalize_entity) else {
                report.invalid_entities += 1;
                continue;
            };

            let Some(period) = row.year_month.as_deref().and_then(parse_period) else {
                report.invalid_periods += 1;
                continue;
            };

            let value = match parse_value(row.update_intensity.as_deref()) {
                ParsedValue::Present(value) => value,
                ParsedValue::Missing => f64::NAN,
                ParsedValue::Malformed => {
                    report.invalid_values += 1;
                    f64::NAN
                }
            };

            observations.push(Observation::new(entity_id, period, value));
        }

        report.rows_kept = observations.len();
        if report.rows_kept < report.rows_read || report.invalid_values > 0 {
            debug!(
                invalid_periods = report.invalid_periods,
                invalid_values = report.invalid_values,
                invalid_entities = report.invalid_entities,
                "dropped or blanked malformed rows"
            );
        }

        Ok(LoadedData {
            observations,
            report,
        })
    }

    /// Number of distinct entities in a set of observations
    pub fn entity_count(observations: &[Observation]) -> usize {
        observations
            .iter()
            .map(|o| o.entity_id.as_str())
            .collect::<BTreeSet<_>>()
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_parse_period_formats() {
        assert_eq!(parse_period("2024-06-01"), Some(date(2024, 6, 1)));
        assert_eq!(parse_period("2024-06-17"), Some(date(2024, 6, 1)));
        assert_eq!(parse_period("2024-06"), Some(date(2024, 6, 1)));
        assert_eq!(parse_period("2024-06-01 00:00:00"), Some(date(2024, 6, 1)));
        assert_eq!(parse_period("2024-06-30T12:00:00"), Some(date(2024, 6, 1)));
        assert_eq!(parse_period(""), None);
        assert_eq!(parse_period("June 2024"), None);
        assert_eq!(parse_period("2024-13"), None);
    }

    #[test]
    fn test_series_sorted_and_deduplicated() {
        let series = EntityTimeSeries::new(
            "KERALA",
            vec![
                (date(2024, 3, 1), 3.0),
                (date(2024, 1, 1), 1.0),
                (date(2024, 2, 1), 2.0),
                (date(2024, 1, 15), 10.0),
            ],
        );

        assert_eq!(series.periods(), &[date(2024, 1, 1), date(2024, 2, 1), date(2024, 3, 1)]);
        assert_eq!(series.values(), &[10.0, 2.0, 3.0]);
        assert_eq!(series.last_period(), Some(date(2024, 3, 1)));
    }

    #[test]
    fn test_from_values_crosses_year_boundary() {
        let series =
            EntityTimeSeries::from_values("GOA", date(2023, 11, 1), &[1.0, 2.0, 3.0]).unwrap();
        assert_eq!(series.periods()[2], date(2024, 1, 1));
    }

    #[test]
    fn test_from_observations_keeps_last_duplicate() {
        let observations = vec![
            Observation::new("GOA", date(2024, 2, 1), 2.0),
            Observation::new("KERALA", date(2024, 1, 1), 9.0),
            Observation::new("GOA", date(2024, 1, 1), 1.0),
            Observation::new("GOA", date(2024, 2, 1), 2.5),
        ];
        let series = EntityTimeSeries::from_observations("GOA", &observations);
        assert_eq!(series.periods(), &[date(2024, 1, 1), date(2024, 2, 1)]);
        assert_eq!(series.values(), &[1.0, 2.5]);
    }

    #[test]
    fn test_valid_points_skip_missing() {
        let series =
            EntityTimeSeries::from_values("GOA", date(2024, 1, 1), &[1.0, f64::NAN, 3.0]).unwrap();
        let valid = series.valid_points();
        assert_eq!(valid.len(), 2);
        assert_eq!(valid[1], (date(2024, 3, 1), 3.0));
    }

    #[test]
    fn test_reader_handles_malformed_rows() {
        let csv = "state,year_month,update_intensity,extra\n\
                   Kerala,2024-01-01,1.5,x\n\
                   Kerala,not-a-date,2.0,x\n\
                   Orissa,2024-01,,x\n\
                   Orissa,2024-02,abc,x\n\
                   Jaipur,2024-01-01,4.0,x\n";

        let loaded = DataLoader::from_reader(csv.as_bytes()).unwrap();
        assert_eq!(loaded.report.rows_read, 5);
        assert_eq!(loaded.report.rows_kept, 3);
        assert_eq!(loaded.report.invalid_periods, 1);
        assert_eq!(loaded.report.invalid_values, 1);
        assert_eq!(loaded.report.invalid_entities, 1);

        assert_eq!(loaded.observations[0].entity_id, "KERALA");
        assert_eq!(loaded.observations[1].entity_id, "ODISHA");
        assert!(loaded.observations[1].value.is_nan());
        assert!(loaded.observations[2].value.is_nan());
        assert_eq!(DataLoader::entity_count(&loaded.observations), 2);
    }

    #[test]
    fn test_reader_requires_columns() {
        let csv = "state,month,value\nKerala,2024-01-01,1.0\n";
        assert!(matches!(
            DataLoader::from_reader(csv.as_bytes()),
            Err(ForecastError::DataError(_))
        ));
    }

    #[test]
    fn test_filter_with_history() {
        let observations = vec![
            Observation::new("A", date(2024, 1, 1), 1.0),
            Observation::new("A", date(2024, 2, 1), 1.0),
            Observation::new("B", date(2024, 1, 1), 1.0),
        ];
        let kept = filter_with_history(group_by_entity(observations), 2);
        assert_eq!(kept.keys().collect::<Vec<_>>(), vec!["A"]);
    }
}
