//! Application configuration.

use crate::error::{AppError, AppResult};
use emaflow_pipeline::PipelineConfig;
use emaflow_replay::SyntheticConfig;
use emaflow_tracker::TrackerConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default configuration file location.
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Where batches come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// JSON Lines recording at `source.path`.
    Replay,
    /// Generated stream shaped by `source.synthetic`.
    #[default]
    Synthetic,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceConfig {
    #[serde(default)]
    pub kind: SourceKind,
    /// Recording to replay. Required for `kind = "replay"`.
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub synthetic: SyntheticConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkConfig {
    /// Output JSON Lines file.
    #[serde(default = "default_sink_path")]
    pub path: String,
}

fn default_sink_path() -> String {
    "output/results.jsonl".to_string()
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            path: default_sink_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Log filter used when RUST_LOG is unset.
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
    /// Print the Prometheus text dump after the run.
    #[serde(default)]
    pub dump_metrics: bool,
}

fn default_log_filter() -> String {
    "info,emaflow=debug".to_string()
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_filter: default_log_filter(),
            dump_metrics: false,
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub tracker: TrackerConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub sink: SinkConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Where the loaded configuration came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigOrigin {
    File(String),
    /// No file was named and the default path does not exist.
    Defaults,
}

impl ConfigOrigin {
    fn resolve(explicit: Option<String>, default_present: bool) -> Self {
        match explicit {
            Some(path) => Self::File(path),
            None if default_present => Self::File(DEFAULT_CONFIG_PATH.to_string()),
            None => Self::Defaults,
        }
    }
}

impl AppConfig {
    /// Load from `path` if given, else from `EMAFLOW_CONFIG`, else from the
    /// default location. A missing default file yields built-in defaults;
    /// an explicitly named file must exist.
    ///
    /// Nothing is logged here: this runs before the subscriber is installed,
    /// so the caller reports the returned origin once logging is up.
    pub fn load(path: Option<&str>) -> AppResult<(Self, ConfigOrigin)> {
        let explicit = path
            .map(str::to_string)
            .or_else(|| std::env::var("EMAFLOW_CONFIG").ok());
        let origin = ConfigOrigin::resolve(explicit, Path::new(DEFAULT_CONFIG_PATH).exists());

        let config = match &origin {
            ConfigOrigin::File(path) => Self::from_file(path)?,
            ConfigOrigin::Defaults => Self::default(),
        };
        Ok((config, origin))
    }

    /// Load from a specific file.
    pub fn from_file(path: &str) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Failed to read config {path}: {e}")))?;

        toml::from_str(&content)
            .map_err(|e| AppError::Config(format!("Failed to parse config {path}: {e}")))
    }

    /// Validate every section.
    pub fn validate(&self) -> AppResult<()> {
        self.pipeline.validate()?;
        self.tracker
            .validate()
            .map_err(|e| AppError::Config(e.to_string()))?;

        match self.source.kind {
            SourceKind::Replay if self.source.path.is_none() => {
                return Err(AppError::Config(
                    "source.path is required for replay sources".to_string(),
                ));
            }
            SourceKind::Synthetic => self.source.synthetic.validate()?,
            SourceKind::Replay => {}
        }

        if self.sink.path.trim().is_empty() {
            return Err(AppError::Config("sink.path must not be empty".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use emaflow_tracker::WindowGapPolicy;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.pipeline.num_shards, 4);
        assert_eq!(config.tracker.window_secs, 300);
        assert_eq!(config.source.kind, SourceKind::Synthetic);
        assert_eq!(config.sink.path, "output/results.jsonl");
        assert!(!config.telemetry.dump_metrics);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_sections() {
        let config: AppConfig = toml::from_str(
            r#"
            [pipeline]
            num_shards = 8
            queue_capacity = 5

            [tracker]
            gap_policy = "replay_stale"

            [source]
            kind = "replay"
            path = "data/batches.jsonl"

            [telemetry]
            dump_metrics = true
            "#,
        )
        .unwrap();

        assert_eq!(config.pipeline.num_shards, 8);
        assert_eq!(config.pipeline.num_producers, 4);
        assert_eq!(config.pipeline.queue_capacity, 5);
        assert_eq!(config.tracker.gap_policy, WindowGapPolicy::ReplayStale);
        assert_eq!(config.source.kind, SourceKind::Replay);
        assert_eq!(config.source.path.as_deref(), Some("data/batches.jsonl"));
        assert!(config.telemetry.dump_metrics);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_replay_requires_path() {
        let mut config = AppConfig::default();
        config.source.kind = SourceKind::Replay;
        assert!(matches!(config.validate(), Err(AppError::Config(_))));
    }

    #[test]
    fn test_invalid_pipeline_rejected() {
        let mut config = AppConfig::default();
        config.pipeline.num_producers = 0;
        assert!(matches!(config.validate(), Err(AppError::Pipeline(_))));
    }

    #[test]
    fn test_from_file_and_missing_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("emaflow.toml");
        std::fs::write(&path, "[sink]\npath = \"out.jsonl\"\n").unwrap();

        let config = AppConfig::from_file(path.to_str().unwrap()).unwrap();
        assert_eq!(config.sink.path, "out.jsonl");

        let missing = dir.path().join("missing.toml");
        assert!(AppConfig::from_file(missing.to_str().unwrap()).is_err());
    }

    #[test]
    fn test_config_origin_resolution() {
        assert_eq!(
            ConfigOrigin::resolve(Some("a.toml".to_string()), true),
            ConfigOrigin::File("a.toml".to_string())
        );
        assert_eq!(
            ConfigOrigin::resolve(None, true),
            ConfigOrigin::File(DEFAULT_CONFIG_PATH.to_string())
        );
        assert_eq!(ConfigOrigin::resolve(None, false), ConfigOrigin::Defaults);
    }

    #[test]
    fn test_load_reports_file_origin() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("emaflow.toml");
        std::fs::write(&path, "[pipeline]\nnum_shards = 2\n").unwrap();
        let path = path.to_str().unwrap();

        let (config, origin) = AppConfig::load(Some(path)).unwrap();
        assert_eq!(config.pipeline.num_shards, 2);
        assert_eq!(origin, ConfigOrigin::File(path.to_string()));
    }

    #[test]
    fn test_config_serialization() {
        let toml_str = toml::to_string(&AppConfig::default()).unwrap();
        assert!(toml_str.contains("num_shards"));
        assert!(toml_str.contains("gap_policy"));
    }
}
