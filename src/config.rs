use crate::clients::rate_limit::RateLimitPolicy;
use crate::domain::KindSelection;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// Environment variable that overrides `general.database_url`.
pub const DATABASE_URL_ENV: &str = "ANISYNC_DATABASE_URL";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,

    pub catalog: CatalogConfig,

    pub import: ImportConfig,

    pub scheduler: SchedulerConfig,

    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub database_url: String,

    pub log_level: String,

    /// Number of tokio worker threads (default: 2)
    /// Set to 0 to use the number of CPU cores
    pub worker_threads: usize,

    pub max_db_connections: u32,

    pub min_db_connections: u32,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite:data/anisync.db".to_string(),
            log_level: "info".to_string(),
            worker_threads: 2,
            max_db_connections: 5,
            min_db_connections: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub endpoint: String,

    pub user_agent: String,

    /// Per-request timeout; a hung request fails the page instead of the run hanging.
    pub request_timeout_seconds: u64,

    /// Records per page, AniList caps this at 50.
    pub per_page: u32,

    /// Remaining request budget under which the client starts waiting.
    pub low_water_mark: u32,

    pub max_wait_seconds: u64,

    /// Pause after an HTTP 429 before the same page is retried.
    pub cooldown_seconds: u64,

    /// Fixed pause between page requests.
    pub request_delay_ms: u64,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://graphql.anilist.co".to_string(),
            user_agent: "anisync/0.1".to_string(),
            request_timeout_seconds: 30,
            per_page: 50,
            low_water_mark: 10,
            max_wait_seconds: 60,
            cooldown_seconds: 60,
            request_delay_ms: 700,
        }
    }
}

impl CatalogConfig {
    #[must_use]
    pub const fn rate_limit_policy(&self) -> RateLimitPolicy {
        RateLimitPolicy {
            low_water_mark: self.low_water_mark,
            max_wait: Duration::from_secs(self.max_wait_seconds),
            cooldown: Duration::from_secs(self.cooldown_seconds),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    /// Records persisted per store round-trip and per transaction.
    pub batch_size: usize,

    /// Directory holding the per-kind crawl checkpoints.
    pub progress_dir: String,

    pub log_every_pages: u32,

    /// Safety cap for a full crawl.
    pub max_pages: u32,

    /// Page budget of the daily/scheduled runs.
    pub daily_pages: u32,

    /// Records tagged with any of these genres are never imported.
    pub blocked_genres: Vec<String>,

    pub kinds: KindSelection,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            progress_dir: "data".to_string(),
            log_every_pages: 10,
            max_pages: 5000,
            daily_pages: 5,
            blocked_genres: vec!["Hentai".to_string()],
            kinds: KindSelection::All,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub enabled: bool,

    /// Six-field cron expression (seconds first).
    pub cron_expression: String,

    /// Page budget per scheduled run; falls back to `import.daily_pages` when 0.
    pub pages: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cron_expression: "0 0 3 * * *".to_string(),
            pages: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub metrics_enabled: bool,

    pub metrics_port: Option<u16>,

    pub loki_enabled: bool,

    pub loki_url: String,

    /// Value of the `env` label attached to every Loki stream.
    pub loki_environment: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: false,
            metrics_port: None,
            loki_enabled: false,
            loki_url: "http://localhost:3100".to_string(),
            loki_environment: "production".to_string(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let paths = Self::config_paths();

        let mut config = paths
            .iter()
            .find(|p| p.exists())
            .map_or_else(
                || {
                    info!("No config file found, using defaults");
                    Ok(Self::default())
                },
                |path| {
                    info!("Loading config from: {}", path.display());
                    Self::load_from_path(path)
                },
            )?;

        config.apply_env();
        Ok(config)
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Ok(url) = std::env::var(DATABASE_URL_ENV)
            && !url.trim().is_empty()
        {
            self.general.database_url = url;
        }
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Config saved to: {}", path.display());
        Ok(())
    }

    fn config_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("config.toml")];

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("anisync").join("config.toml"));
        }

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".anisync").join("config.toml"));
        }

        paths
    }

    fn default_config_path() -> PathBuf {
        PathBuf::from("config.toml")
    }

    pub fn create_default_if_missing() -> Result<bool> {
        let path = Self::default_config_path();
        if path.exists() {
            Ok(false)
        } else {
            Self::default().save_to_path(&path)?;
            info!("Created default config file: {}", path.display());
            Ok(true)
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.import.batch_size == 0 {
            anyhow::bail!("import.batch_size must be > 0");
        }

        if !(1..=50).contains(&self.catalog.per_page) {
            anyhow::bail!("catalog.per_page must be between 1 and 50");
        }

        url::Url::parse(&self.catalog.endpoint)
            .with_context(|| format!("Invalid catalog endpoint: {}", self.catalog.endpoint))?;

        if self.scheduler.enabled && self.scheduler.cron_expression.trim().is_empty() {
            anyhow::bail!("scheduler.cron_expression must be set when the scheduler is enabled");
        }

        Ok(())
    }

    /// Page budget for scheduled runs.
    #[must_use]
    pub const fn scheduled_pages(&self) -> u32 {
        if self.scheduler.pages > 0 {
            self.scheduler.pages
        } else {
            self.import.daily_pages
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.import.batch_size, 10);
        assert_eq!(config.catalog.endpoint, "https://graphql.anilist.co");
        assert_eq!(config.import.blocked_genres, vec!["Hentai".to_string()]);
        assert_eq!(config.observability.loki_environment, "production");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn config_serialization() {
        let config = Config::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[catalog]"));
        assert!(toml_str.contains("[import]"));
        assert!(toml_str.contains("[scheduler]"));
    }

    #[test]
    fn config_deserialization() {
        let toml_str = r#"
            [general]
            log_level = "debug"

            [import]
            batch_size = 25
            kinds = "manga"

            [catalog]
            low_water_mark = 20

            [observability]
            loki_environment = "staging"
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.import.batch_size, 25);
        assert_eq!(config.import.kinds, KindSelection::Manga);
        assert_eq!(config.catalog.rate_limit_policy().low_water_mark, 20);

        assert_eq!(config.catalog.per_page, 50);
        assert_eq!(config.observability.loki_environment, "staging");
        assert!(!config.observability.loki_enabled);
    }

    #[test]
    fn validation_rejects_bad_values() {
        let mut config = Config::default();
        config.import.batch_size = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.catalog.per_page = 80;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.catalog.endpoint = "not a url".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn scheduled_pages_fallback() {
        let mut config = Config::default();
        assert_eq!(config.scheduled_pages(), config.import.daily_pages);
        config.scheduler.pages = 12;
        assert_eq!(config.scheduled_pages(), 12);
    }
}
