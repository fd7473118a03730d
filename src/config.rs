use crate::engine::deletion::CleanupMode;
use crate::errors::EngineError;
use crate::http::PlaybackBackend;
use serde::Deserialize;
use std::{path::Path, time::Duration};

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub engine: EngineConfig,
    pub jellyfin: JellyfinConfig,
    pub playback_stats: PlaybackStatsConfig,
    pub sonarr: SonarrConfig,
    pub radarr: RadarrConfig,
    #[serde(default, rename = "libraries")]
    pub libraries: Vec<LibraryConfig>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    #[serde(default)]
    pub dry_run: bool,
    pub cleanup_schedule: String,
    pub cleanup_mode: CleanupMode,
    pub keep_count: u32,
    #[serde(default = "default_adapter_concurrency")]
    pub adapter_concurrency: usize,
    pub history_db_path: String,
}

fn default_adapter_concurrency() -> usize {
    1
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JellyfinConfig {
    pub base_url: String,
    pub api_key: String,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlaybackStatsConfig {
    pub backend: PlaybackBackend,
    pub base_url: String,
    pub api_key: String,
    #[serde(default)]
    pub server_id: String,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SonarrConfig {
    pub base_url: String,
    pub api_key: String,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RadarrConfig {
    pub base_url: String,
    pub api_key: String,
}

#[derive(Deserialize, Clone, Debug)]
#[serde(deny_unknown_fields)]
pub struct LibraryConfig {
    pub name: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(with = "humantime_serde")]
    pub content_age_threshold: Duration,
    #[serde(with = "humantime_serde")]
    pub last_stream_threshold: Duration,
    #[serde(with = "humantime_serde")]
    pub cleanup_delay: Duration,
    #[serde(default)]
    pub exclude_tags: Vec<String>,
    #[serde(default)]
    pub disk_usage_thresholds: Vec<DiskUsageThreshold>,
    #[serde(default)]
    pub roots: Vec<String>,
}

fn default_true() -> bool {
    true
}

#[derive(Deserialize, Clone, Debug, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct DiskUsageThreshold {
    pub usage_percent: f64,
    #[serde(with = "humantime_serde")]
    pub max_cleanup_delay: Duration,
}

impl Config {
    pub async fn load(path: &Path) -> anyhow::Result<Self> {
        let config_str = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| EngineError::Configuration(format!("failed to read config at {path:?}: {e}")))?;
        let config: Config = toml::from_str(&config_str)
            .map_err(|e| EngineError::Configuration(format!("failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Structural checks only — this has no network access, so it cannot
    /// cross-check `[[libraries]]` names against the streaming server. That
    /// cross-check (spec §9's library-naming Open Question: an unresolvable
    /// library is startup-fatal, never a silent default) happens once in
    /// `main::validate_libraries_against_server` after the Jellyfin client is
    /// constructed.
    fn validate(&self) -> Result<(), EngineError> {
        if self.libraries.is_empty() {
            return Err(EngineError::Configuration(
                "at least one [[libraries]] entry is required".into(),
            ));
        }
        for library in &self.libraries {
            if library.name.trim().is_empty() {
                return Err(EngineError::Configuration(
                    "library entries must have a non-empty name".into(),
                ));
            }
        }
        if self.engine.keep_count == 0 && self.engine.cleanup_mode != CleanupMode::All {
            return Err(EngineError::Configuration(
                "engine.keep_count must be > 0 unless cleanup_mode is \"all\"".into(),
            ));
        }
        Ok(())
    }

    pub fn library(&self, name: &str) -> Option<&LibraryConfig> {
        self.libraries.iter().find(|l| l.name == name)
    }
}

#[cfg(test)]
mod test {
    use std::path::PathBuf;

    use super::*;

    #[tokio::test]
    async fn test_parse_config() -> anyhow::Result<()> {
        let cfg = Config::load(&PathBuf::from("example.config.toml")).await?;

        assert_eq!(cfg.jellyfin.api_key, "api-key-foo");
        assert_eq!(cfg.jellyfin.base_url, "http://localhost:8096");

        assert_eq!(cfg.sonarr.base_url, "http://localhost:8989");
        assert_eq!(cfg.radarr.base_url, "http://localhost:7878");

        assert_eq!(cfg.engine.cleanup_mode, CleanupMode::KeepSeasons);
        assert_eq!(cfg.engine.keep_count, 2);

        let tv = cfg.library("TV Shows").expect("TV Shows library");
        assert_eq!(tv.content_age_threshold, Duration::from_secs(90 * 86400));
        assert_eq!(tv.disk_usage_thresholds.len(), 2);

        Ok(())
    }

    #[test]
    fn test_missing_libraries_is_configuration_error() {
        let toml = r#"
            [engine]
            cleanup_schedule = "0 0 3 * * *"
            cleanup_mode = "all"
            keep_count = 1
            history_db_path = "x.db"
            [jellyfin]
            base_url = "http://localhost:8096"
            api_key = "k"
            [playback_stats]
            backend = "jellystat"
            base_url = "http://localhost:3000"
            api_key = "k"
            [sonarr]
            base_url = "http://localhost:8989"
            api_key = "k"
            [radarr]
            base_url = "http://localhost:7878"
            api_key = "k"
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert!(config.validate().is_err());
    }
}
