//! Configuration management for QueryLens

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

/// Prefix for environment overrides, e.g. `QUERYLENS__STORAGE__MAX_METRICS=500`
pub const ENV_PREFIX: &str = "QUERYLENS";

/// Main configuration struct
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Persistence configuration
    pub storage: StorageConfig,

    /// Report, pattern and insight configuration
    pub analytics: AnalyticsConfig,

    /// Quality test configuration
    pub quality: QualityConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from defaults, an optional TOML file and the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        // A missing .env file is normal.
        let _ = dotenvy::dotenv();

        let defaults = ::config::Config::try_from(&Self::default())
            .map_err(|e| Error::config(e.to_string()))?;

        let mut builder = ::config::Config::builder().add_source(defaults);
        if let Some(path) = path {
            debug!(path = %path.display(), "Loading configuration file");
            builder = builder.add_source(::config::File::from(path).required(true));
        }
        builder = builder.add_source(
            ::config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__"),
        );

        let config: Self = builder
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| Error::config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.storage.max_metrics == 0 {
            return Err(Error::validation("storage.max_metrics must be greater than 0"));
        }
        if self.storage.max_suite_results == 0 {
            return Err(Error::validation(
                "storage.max_suite_results must be greater than 0",
            ));
        }
        if self.analytics.insight_window.is_zero() {
            return Err(Error::validation("analytics.insight_window must not be zero"));
        }
        if chrono::Duration::from_std(self.analytics.insight_window).is_err() {
            return Err(Error::validation("analytics.insight_window is out of range"));
        }
        if self.analytics.pattern_max_length < 4 {
            return Err(Error::validation(
                "analytics.pattern_max_length must be at least 4",
            ));
        }
        if self.quality.request_timeout.is_zero() {
            return Err(Error::validation("quality.request_timeout must not be zero"));
        }
        Ok(())
    }
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory for the file-backed store (platform data dir if unset)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
    /// Key holding the query metric log
    pub metrics_key: String,
    /// Key holding the quality suite history
    pub results_key: String,
    /// Maximum number of retained query metrics
    pub max_metrics: usize,
    /// Maximum number of retained suite results
    pub max_suite_results: usize,
}

impl StorageConfig {
    /// Directory used by the file-backed store
    pub fn resolve_data_dir(&self) -> PathBuf {
        if let Some(dir) = &self.data_dir {
            return dir.clone();
        }
        ProjectDirs::from("dev", "querylens", "querylens")
            .map(|dirs| dirs.data_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from(".querylens"))
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            metrics_key: "querylens:metrics".to_string(),
            results_key: "querylens:test_results".to_string(),
            max_metrics: 1000,
            max_suite_results: 10,
        }
    }
}

/// Analytics configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    /// Trailing window the insight engine reports over
    #[serde(with = "humantime_serde")]
    pub insight_window: Duration,
    /// Maximum entries in the popular query list
    pub popular_query_limit: usize,
    /// Maximum length of a pattern template
    pub pattern_max_length: usize,
    /// Maximum example queries kept per pattern
    pub pattern_example_limit: usize,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            insight_window: Duration::from_secs(7 * 24 * 60 * 60),
            popular_query_limit: 10,
            pattern_max_length: 100,
            pattern_example_limit: 3,
        }
    }
}

/// Quality test configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityConfig {
    /// HTTP endpoint answering queries for the CLI runner
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer_endpoint: Option<String>,
    /// Transport-level timeout for the HTTP answer client
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            answer_endpoint: None,
            request_timeout: Duration::from_secs(120),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level
    pub level: String,
    /// Log format (json or pretty)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.storage.max_metrics, 1000);
        assert_eq!(config.storage.max_suite_results, 10);
        assert_eq!(config.analytics.popular_query_limit, 10);
    }

    #[test]
    fn test_zero_cap_rejected() {
        let mut config = Config::default();
        config.storage.max_metrics = 0;
        assert!(matches!(config.validate(), Err(Error::Validation(_))));
    }

    #[test]
    fn test_unrepresentable_insight_window_rejected() {
        let mut config = Config::default();
        config.analytics.insight_window = Duration::MAX;
        assert!(matches!(config.validate(), Err(Error::Validation(_))));
    }

    #[test]
    fn test_load_from_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[storage]\nmax_metrics = 250\n\n[analytics]\ninsight_window = \"24h\""
        )
        .unwrap();

        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.storage.max_metrics, 250);
        assert_eq!(config.storage.max_suite_results, 10);
        assert_eq!(config.analytics.insight_window, Duration::from_secs(86_400));
    }

    #[test]
    fn test_explicit_data_dir_wins() {
        let config = StorageConfig {
            data_dir: Some(PathBuf::from("/tmp/querylens-test")),
            ..StorageConfig::default()
        };
        assert_eq!(config.resolve_data_dir(), PathBuf::from("/tmp/querylens-test"));
    }
}
