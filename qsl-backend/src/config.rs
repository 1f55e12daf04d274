use anyhow::Context;
use chrono::TimeDelta;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use crate::module::map::MapConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,

    /// Rolled log files older than this are deleted
    #[serde(default = "default_log_retention_days")]
    pub log_retention_days: u64,

    /// ADIF log to publish
    pub adif_path: PathBuf,

    /// How often the ADIF file is re-read
    #[serde(default = "default_reload_interval_secs")]
    pub reload_interval_secs: u64,

    /// Allowed distance between the looked-up time and the logged time
    #[serde(default = "default_search_tolerance_minutes")]
    pub search_tolerance_minutes: i64,

    /// Bearer token for `POST /api/reload`; the endpoint is disabled without one
    #[serde(default)]
    pub reload_token: Option<String>,

    /// Length of the "latest QSOs" list
    #[serde(default = "default_latest_count")]
    pub latest_count: usize,

    #[serde(default = "default_map_dir")]
    pub map_dir: PathBuf,

    #[serde(default = "default_static_dir")]
    pub static_dir: PathBuf,

    #[serde(default = "default_map_width")]
    pub map_width: u32,

    #[serde(default = "default_map_height")]
    pub map_height: u32,

    /// 0 = fit both stations
    #[serde(default)]
    pub map_zoom: u32,

    #[serde(default = "default_map_cleanup_interval_hours")]
    pub map_cleanup_interval_hours: u64,

    /// Cached maps older than this are deleted; 0 keeps them forever
    #[serde(default = "default_map_retention_days")]
    pub map_retention_days: i64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_log_retention_days() -> u64 {
    3
}

fn default_reload_interval_secs() -> u64 {
    5 * 60
}

fn default_search_tolerance_minutes() -> i64 {
    10
}

fn default_latest_count() -> usize {
    30
}

fn default_map_dir() -> PathBuf {
    PathBuf::from("maps")
}

fn default_static_dir() -> PathBuf {
    PathBuf::from("static")
}

fn default_map_width() -> u32 {
    600
}

fn default_map_height() -> u32 {
    400
}

fn default_map_cleanup_interval_hours() -> u64 {
    24
}

fn default_map_retention_days() -> i64 {
    30
}

impl AppConfig {
    /// Config with defaults for everything but the ADIF path
    pub fn new(adif_path: impl Into<PathBuf>) -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
            log_dir: default_log_dir(),
            log_retention_days: default_log_retention_days(),
            adif_path: adif_path.into(),
            reload_interval_secs: default_reload_interval_secs(),
            search_tolerance_minutes: default_search_tolerance_minutes(),
            reload_token: None,
            latest_count: default_latest_count(),
            map_dir: default_map_dir(),
            static_dir: default_static_dir(),
            map_width: default_map_width(),
            map_height: default_map_height(),
            map_zoom: 0,
            map_cleanup_interval_hours: default_map_cleanup_interval_hours(),
            map_retention_days: default_map_retention_days(),
        }
    }

    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
        Self::parse(&content).with_context(|| format!("Failed to parse config file '{}'", path.display()))
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let config: AppConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the service cannot work with.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.search_tolerance_minutes < 0 || TimeDelta::try_minutes(self.search_tolerance_minutes).is_none() {
            anyhow::bail!(
                "search_tolerance_minutes must be between 0 and {}, got {}",
                TimeDelta::MAX.num_minutes(),
                self.search_tolerance_minutes
            );
        }
        if self.reload_token.as_deref().is_some_and(|t| t.trim().is_empty()) {
            anyhow::bail!("reload_token must not be empty; remove it to disable /api/reload");
        }
        Ok(())
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Map settings for a map written to `map_dir/file_name`
    pub fn map_config(&self, file_name: &str) -> MapConfig {
        MapConfig {
            width: self.map_width,
            height: self.map_height,
            zoom: self.map_zoom,
            output_path: self.map_dir.join(file_name),
        }
    }
}

pub static CONFIG: OnceLock<AppConfig> = OnceLock::new();

/// Load the config file named by `QSL_CONFIG` (default `config.toml`).
pub fn read_config() -> anyhow::Result<&'static AppConfig> {
    let path = std::env::var("QSL_CONFIG").unwrap_or_else(|_| "config.toml".to_string());
    let config = AppConfig::from_file(&path)?;
    Ok(CONFIG.get_or_init(|| config))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_config_uses_defaults() {
        let config = AppConfig::parse(r#"adif_path = "log.adi""#).unwrap();
        assert_eq!(config.adif_path, PathBuf::from("log.adi"));
        assert_eq!(config.server_address(), "0.0.0.0:8080");
        assert_eq!(config.reload_interval_secs, 300);
        assert_eq!(config.search_tolerance_minutes, 10);
        assert_eq!(config.latest_count, 30);
        assert_eq!(config.map_zoom, 0);
        assert_eq!(config.log_retention_days, 3);
    }

    #[test]
    fn test_parse_overrides() {
        let config = AppConfig::parse(
            r#"
            adif_path = "/srv/qsl/log.adi"
            port = 9000
            log_level = "debug"
            reload_interval_secs = 30
            map_width = 800
            map_zoom = 5
            "#,
        )
        .unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.reload_interval_secs, 30);

        let map = config.map_config("W1AW-1.png");
        assert_eq!(map.width, 800);
        assert_eq!(map.height, 400);
        assert_eq!(map.zoom, 5);
        assert_eq!(map.output_path, PathBuf::from("maps/W1AW-1.png"));
    }

    #[test]
    fn test_adif_path_is_required() {
        assert!(AppConfig::parse("port = 8080").is_err());
    }

    #[test]
    fn test_out_of_range_tolerance_is_rejected() {
        let err = AppConfig::parse("adif_path = \"log.adi\"\nsearch_tolerance_minutes = 9223372036854775807")
            .unwrap_err();
        assert!(err.to_string().contains("search_tolerance_minutes"));

        assert!(AppConfig::parse("adif_path = \"log.adi\"\nsearch_tolerance_minutes = -5").is_err());
        assert!(AppConfig::parse("adif_path = \"log.adi\"\nsearch_tolerance_minutes = 1440").is_ok());
    }

    #[test]
    fn test_reload_token() {
        let config = AppConfig::parse("adif_path = \"log.adi\"").unwrap();
        assert!(config.reload_token.is_none());

        let config = AppConfig::parse("adif_path = \"log.adi\"\nreload_token = \"s3cret\"").unwrap();
        assert_eq!(config.reload_token.as_deref(), Some("s3cret"));

        assert!(AppConfig::parse("adif_path = \"log.adi\"\nreload_token = \" \"").is_err());
    }

    #[test]
    fn test_missing_file() {
        assert!(AppConfig::from_file("/nonexistent/config.toml").is_err());
    }
}
