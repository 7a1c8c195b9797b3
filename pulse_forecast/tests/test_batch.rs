use chrono::NaiveDate;
use pretty_assertions::assert_eq;
use pulse_forecast::batch::{BatchForecaster, ForecastRow};
use pulse_forecast::engine::ForecastConfig;
use pulse_forecast::EntityTimeSeries;
use std::collections::BTreeMap;
use tempfile::tempdir;

fn start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2023, 7, 1).unwrap()
}

fn healthy_batch() -> BTreeMap<String, EntityTimeSeries> {
    let mut batch = BTreeMap::new();
    let rising: Vec<f64> = (0..12).map(|t| 10.0 + t as f64 + 0.7 * ((t * 7 % 5) as f64)).collect();
    let flat = vec![2.5; 12];
    let noisy: Vec<f64> = (0..12).map(|t| 20.0 + 4.0 * ((t as f64) * 2.1).cos()).collect();

    for (name, values) in [("KERALA", rising), ("GOA", flat), ("BIHAR", noisy)] {
        batch.insert(
            name.to_string(),
            EntityTimeSeries::from_values(name, start(), &values).unwrap(),
        );
    }
    batch
}

#[test]
fn test_pathological_entity_does_not_change_others() {
    let forecaster = BatchForecaster::new(ForecastConfig::default()).unwrap();

    let clean = forecaster.run_all(&healthy_batch());

    let mut polluted_input = healthy_batch();
    polluted_input.insert(
        "LADAKH".to_string(),
        EntityTimeSeries::new("LADAKH", Vec::<(NaiveDate, f64)>::new()),
    );
    polluted_input.insert(
        "SIKKIM".to_string(),
        EntityTimeSeries::from_values("SIKKIM", start(), &[f64::NAN; 12]).unwrap(),
    );
    let polluted = forecaster.run_all(&polluted_input);

    assert_eq!(clean.attempted, 3);
    assert_eq!(polluted.attempted, 5);
    assert_eq!(clean.succeeded, 3);
    assert_eq!(polluted.succeeded, 3);
    assert!(polluted.failures.contains_key("LADAKH"));
    assert!(polluted.failures.contains_key("SIKKIM"));
    assert_eq!(clean.outcomes, polluted.outcomes);
}

#[test]
fn test_forecast_table_round_trip() {
    let forecaster = BatchForecaster::new(ForecastConfig::default()).unwrap();
    let report = forecaster.run_all(&healthy_batch());

    let dir = tempdir().unwrap();
    let path = dir.path().join("state_forecasts_3month.csv");
    report.save_csv(&path).unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    assert_eq!(
        text.lines().next(),
        Some("state,forecast_month,forecast_value,lower_bound,upper_bound")
    );

    let mut reader = csv::Reader::from_path(&path).unwrap();
    let rows: Vec<ForecastRow> = reader.deserialize().map(|r| r.unwrap()).collect();
    assert_eq!(rows.len(), 9);
    assert_eq!(rows, report.rows());

    let goa: Vec<&ForecastRow> = rows.iter().filter(|r| r.entity_id == "GOA").collect();
    assert_eq!(goa[0].forecast_period, NaiveDate::from_ymd_opt(2024, 7, 1).unwrap());
    assert_eq!(goa[0].forecast_value, 2.5);
}

#[test]
fn test_json_export_contains_method() {
    let forecaster = BatchForecaster::new(ForecastConfig::default()).unwrap();
    let report = forecaster.run_all(&healthy_batch());

    let json = report.to_json().unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed["GOA"]["method"]["kind"], "degenerate");
    assert_eq!(parsed["GOA"]["forecast_periods"][0], "2024-07-01");
}
