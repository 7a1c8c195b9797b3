//! Configuration for a pipeline run
//!
//! Values come from, in increasing priority: built-in defaults, an optional
//! JSON file, the `UIDAI_DATA_DIR` / `UIDAI_ENV` environment variables, and
//! finally command-line flags applied by the binary.

use crate::{PulseError, Result};
use pulse_forecast::engine::ForecastConfig;
use pulse_math::{ClassifierThresholds, DEFAULT_ROLLING_WINDOW};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Environment variable overriding [`PulseConfig::data_dir`]
pub const DATA_DIR_VAR: &str = "UIDAI_DATA_DIR";
/// Environment variable overriding [`PulseConfig::environment`]
pub const ENV_VAR: &str = "UIDAI_ENV";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl FromStr for Environment {
    type Err = PulseError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            other => Err(PulseError::Config(format!("Unknown environment: {}", other))),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Environment::Development => f.write_str("development"),
            Environment::Production => f.write_str("production"),
        }
    }
}

/// All tunables of a pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PulseConfig {
    pub environment: Environment,
    /// Directory holding the input table, and the outputs unless `output_dir` is set
    pub data_dir: PathBuf,
    pub output_dir: Option<PathBuf>,
    pub monthly_features_file: String,
    pub classifications_file: String,
    pub forecasts_file: String,
    /// Full forecast outcomes (history, bounds, fit attempts) for the dashboard
    pub forecasts_json_file: String,
    pub rolling_window: usize,
    /// Entities with fewer distinct months are dropped before analysis
    pub min_history_months: usize,
    pub classifier: ClassifierThresholds,
    pub forecast: ForecastConfig,
}

impl Default for PulseConfig {
    fn default() -> Self {
        Self {
            environment: Environment::default(),
            data_dir: PathBuf::from("data"),
            output_dir: None,
            monthly_features_file: "feature_engineered_monthly.csv".to_string(),
            classifications_file: "state_classification.csv".to_string(),
            forecasts_file: "state_forecasts_3month.csv".to_string(),
            forecasts_json_file: "state_forecasts.json".to_string(),
            rolling_window: DEFAULT_ROLLING_WINDOW,
            min_history_months: 4,
            classifier: ClassifierThresholds::default(),
            forecast: ForecastConfig::default(),
        }
    }
}

impl PulseConfig {
    /// Read a JSON config file; missing fields keep their defaults
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let body = fs::read_to_string(path.as_ref())?;
        let config = serde_json::from_str(&body)?;
        Ok(config)
    }

    /// Apply `UIDAI_DATA_DIR` and `UIDAI_ENV` from the process environment
    pub fn with_env(self) -> Result<Self> {
        self.with_env_from(|key| std::env::var(key).ok())
    }

    /// Apply environment overrides from an arbitrary lookup
    pub fn with_env_from<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup(DATA_DIR_VAR).filter(|d| !d.trim().is_empty()) {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(env) = lookup(ENV_VAR) {
            self.environment = env.parse()?;
        }
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.rolling_window == 0 {
            return Err(PulseError::Config(
                "Rolling window must be positive".to_string(),
            ));
        }
        for (name, file) in [
            ("monthly_features_file", &self.monthly_features_file),
            ("classifications_file", &self.classifications_file),
            ("forecasts_file", &self.forecasts_file),
            ("forecasts_json_file", &self.forecasts_json_file),
        ] {
            if file.trim().is_empty() {
                return Err(PulseError::Config(format!("{} must not be empty", name)));
            }
        }
        self.classifier.validate()?;
        self.forecast.validate()?;
        Ok(())
    }

    pub fn monthly_features_path(&self) -> PathBuf {
        self.data_dir.join(&self.monthly_features_file)
    }

    fn output_root(&self) -> &Path {
        self.output_dir.as_deref().unwrap_or(&self.data_dir)
    }

    pub fn classifications_path(&self) -> PathBuf {
        self.output_root().join(&self.classifications_file)
    }

    pub fn forecasts_path(&self) -> PathBuf {
        self.output_root().join(&self.forecasts_file)
    }

    pub fn forecasts_json_path(&self) -> PathBuf {
        self.output_root().join(&self.forecasts_json_file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = PulseConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.forecast.horizon, 3);
        assert_eq!(config.classifier.decay_threshold, -0.01);
        assert_eq!(
            config.forecasts_path(),
            PathBuf::from("data/state_forecasts_3month.csv")
        );

        let config = PulseConfig {
            output_dir: Some(PathBuf::from("out")),
            ..Default::default()
        };
        assert_eq!(
            config.monthly_features_path(),
            PathBuf::from("data/feature_engineered_monthly.csv")
        );
        assert_eq!(
            config.classifications_path(),
            PathBuf::from("out/state_classification.csv")
        );
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let body = r#"{
            "data_dir": "/srv/uidai",
            "forecast": {"horizon": 6},
            "classifier": {"decay_threshold": -0.05}
        }"#;
        file.write_all(body.as_bytes()).unwrap();

        let config = PulseConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/srv/uidai"));
        assert_eq!(config.forecast.horizon, 6);
        assert_eq!(config.forecast.min_observations, 6);
        assert_eq!(config.classifier.decay_threshold, -0.05);
        assert_eq!(config.classifier.stagnant_threshold, 1e-6);
    }

    #[test]
    fn test_env_overrides() {
        let config = PulseConfig::default()
            .with_env_from(|key| match key {
                DATA_DIR_VAR => Some("/tmp/pulse".to_string()),
                ENV_VAR => Some("Production".to_string()),
                _ => None,
            })
            .unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/tmp/pulse"));
        assert_eq!(config.environment, Environment::Production);

        let bad = PulseConfig::default()
            .with_env_from(|key| (key == ENV_VAR).then(|| "staging".to_string()));
        assert!(bad.is_err());
    }

    #[test]
    fn test_invalid_values_rejected() {
        let config = PulseConfig {
            rolling_window: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let mut config = PulseConfig::default();
        config.forecast.fallback_window = 0;
        assert!(matches!(config.validate(), Err(PulseError::Forecast(_))));
    }
}
