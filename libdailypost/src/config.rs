//! Configuration management for Dailypost

use chrono::NaiveTime;
use chrono_tz::Tz;
use secrecy::SecretString;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::{ConfigError, Result};
use crate::scheduling::parse_time_of_day;

pub const CONFIG_ENV_VAR: &str = "DAILYPOST_CONFIG";
pub const TOKEN_ENV_VAR: &str = "DAILYPOST_PUBLISH_TOKEN";

const DEFAULT_TIMEZONE: &str = "Europe/Paris";
const DEFAULT_PUBLISH_AT: &str = "09:00";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub store: StoreConfig,
    #[serde(default)]
    pub publisher: Option<PublisherConfig>,
    #[serde(default)]
    pub schedule: ScheduleConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    pub path: String,
}

/// Which document store holds the catalog and the audit log
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// SQLite database (posts table + publication_history table)
    #[default]
    Sqlite,
    /// JSON files on local disk
    Local,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PublisherConfig {
    pub endpoint: String,
    #[serde(default)]
    pub token: Option<SecretString>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default = "default_publish_at")]
    pub publish_at: String,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
            publish_at: default_publish_at(),
        }
    }
}

fn default_timezone() -> String {
    DEFAULT_TIMEZONE.to_string()
}

fn default_publish_at() -> String {
    DEFAULT_PUBLISH_AT.to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl Config {
    /// Load configuration from `DAILYPOST_CONFIG` or the default location
    ///
    /// A path named by `DAILYPOST_CONFIG` must exist. Only the default
    /// location falls back to [`Config::default_config`] when absent.
    pub fn load() -> Result<Self> {
        let config_path = resolve_config_path()?;
        if std::env::var_os(CONFIG_ENV_VAR).is_some() {
            return Self::load_from_path(&config_path);
        }
        Self::load_or_default(&config_path)
    }

    fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            return Self::default_config();
        }
        Self::load_from_path(path)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        Self::parse(&content)
    }

    /// Parse and check a TOML document
    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).map_err(ConfigError::ParseError)?;
        config.validate()?;
        Ok(config)
    }

    /// Create a default configuration: SQLite under the platform data directory
    pub fn default_config() -> Result<Self> {
        let db_path = resolve_data_path()?.join("posts.db");
        Ok(Self {
            store: StoreConfig {
                backend: StoreBackend::Sqlite,
                path: db_path.to_string_lossy().into_owned(),
            },
            publisher: None,
            schedule: ScheduleConfig::default(),
        })
    }

    fn validate(&self) -> Result<()> {
        if self.store.path.trim().is_empty() {
            return Err(ConfigError::MissingField("store.path".to_string()).into());
        }
        if let Some(publisher) = &self.publisher {
            if publisher.endpoint.trim().is_empty() {
                return Err(ConfigError::MissingField("publisher.endpoint".to_string()).into());
            }
            if publisher.timeout_secs == 0 {
                return Err(ConfigError::InvalidValue {
                    field: "publisher.timeout_secs".to_string(),
                    reason: "must be greater than zero".to_string(),
                }
                .into());
            }
        }
        self.schedule.timezone()?;
        self.schedule.publish_time()?;
        Ok(())
    }

    /// Publisher settings, required for any run that actually publishes
    pub fn require_publisher(&self) -> Result<&PublisherConfig> {
        self.publisher
            .as_ref()
            .ok_or_else(|| ConfigError::MissingField("publisher.endpoint".to_string()).into())
    }
}

impl StoreConfig {
    /// Store path with `~` expanded
    pub fn expanded_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.path).to_string())
    }
}

impl PublisherConfig {
    /// Bearer token for the publish endpoint; the environment wins over the file
    pub fn token(&self) -> Option<SecretString> {
        match std::env::var(TOKEN_ENV_VAR) {
            Ok(token) if !token.is_empty() => Some(SecretString::from(token)),
            _ => self.token.clone(),
        }
    }
}

impl ScheduleConfig {
    pub fn timezone(&self) -> Result<Tz> {
        self.timezone.parse::<Tz>().map_err(|e| {
            ConfigError::InvalidValue {
                field: "schedule.timezone".to_string(),
                reason: e.to_string(),
            }
            .into()
        })
    }

    pub fn publish_time(&self) -> Result<NaiveTime> {
        parse_time_of_day(&self.publish_at).map_err(|e| {
            ConfigError::InvalidValue {
                field: "schedule.publish_at".to_string(),
                reason: e.to_string(),
            }
            .into()
        })
    }
}

/// Resolve the configuration file path following XDG Base Directory spec
pub fn resolve_config_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        return Ok(PathBuf::from(shellexpand::tilde(&path).to_string()));
    }

    let config_dir = dirs::config_dir()
        .ok_or_else(|| ConfigError::MissingField("config directory".to_string()))?;

    Ok(config_dir.join("dailypost").join("config.toml"))
}

/// Resolve the data directory path following XDG Base Directory spec
pub fn resolve_data_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
        .ok_or_else(|| ConfigError::MissingField("data directory".to_string()))?;

    Ok(data_dir.join("dailypost"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DailypostError;
    use secrecy::ExposeSecret;
    use serial_test::serial;

    const FULL: &str = r#"
[store]
backend = "local"
path = "/tmp/dailypost/posts.json"

[publisher]
endpoint = "https://example.com/functions/v1/publish-instagram"
token = "file-token"
timeout_secs = 10

[schedule]
timezone = "America/New_York"
publish_at = "18:30"
"#;

    #[test]
    fn test_parse_full_config() {
        let config = Config::parse(FULL).unwrap();
        assert_eq!(config.store.backend, StoreBackend::Local);
        let publisher = config.require_publisher().unwrap();
        assert_eq!(publisher.timeout_secs, 10);
        assert_eq!(config.schedule.timezone().unwrap(), chrono_tz::America::New_York);
        assert_eq!(
            config.schedule.publish_time().unwrap(),
            NaiveTime::from_hms_opt(18, 30, 0).unwrap()
        );
    }

    #[test]
    fn test_parse_minimal_config_uses_defaults() {
        let config = Config::parse("[store]\npath = \"posts.db\"\n").unwrap();
        assert_eq!(config.store.backend, StoreBackend::Sqlite);
        assert!(config.publisher.is_none());
        assert_eq!(config.schedule.timezone().unwrap(), chrono_tz::Europe::Paris);
        assert_eq!(config.schedule.publish_at, "09:00");
    }

    #[test]
    fn test_missing_publisher_is_reported() {
        let config = Config::parse("[store]\npath = \"posts.db\"\n").unwrap();
        let err = config.require_publisher().unwrap_err();
        assert!(err.to_string().contains("publisher.endpoint"));
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_default_timeout() {
        let config = Config::parse(
            "[store]\npath = \"p.db\"\n[publisher]\nendpoint = \"http://localhost:9/publish\"\n",
        )
        .unwrap();
        assert_eq!(config.require_publisher().unwrap().timeout_secs, 30);
    }

    #[test]
    fn test_rejects_unknown_timezone() {
        let err = Config::parse("[store]\npath = \"p.db\"\n[schedule]\ntimezone = \"Mars/Olympus\"\n")
            .unwrap_err();
        assert!(matches!(
            err,
            DailypostError::Config(ConfigError::InvalidValue { ref field, .. }) if field == "schedule.timezone"
        ));
    }

    #[test]
    fn test_rejects_bad_publish_time() {
        let err = Config::parse("[store]\npath = \"p.db\"\n[schedule]\npublish_at = \"9am\"\n")
            .unwrap_err();
        assert!(err.to_string().contains("schedule.publish_at"));
    }

    #[test]
    fn test_rejects_zero_timeout() {
        let err = Config::parse(
            "[store]\npath = \"p.db\"\n[publisher]\nendpoint = \"http://x\"\ntimeout_secs = 0\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("publisher.timeout_secs"));
    }

    #[test]
    fn test_rejects_unknown_backend() {
        let err = Config::parse("[store]\nbackend = \"postgres\"\npath = \"p.db\"\n").unwrap_err();
        assert!(matches!(err, DailypostError::Config(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_load_missing_file() {
        let err = Config::load_from_path(Path::new("/nonexistent/dailypost.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn test_token_debug_is_redacted() {
        let config = Config::parse(FULL).unwrap();
        let debug = format!("{:?}", config.publisher);
        assert!(!debug.contains("file-token"));
    }

    #[test]
    #[serial]
    fn test_token_env_overrides_file() {
        let config = Config::parse(FULL).unwrap();
        let publisher = config.require_publisher().unwrap();

        std::env::remove_var(TOKEN_ENV_VAR);
        assert_eq!(publisher.token().unwrap().expose_secret(), "file-token");

        std::env::set_var(TOKEN_ENV_VAR, "env-token");
        assert_eq!(publisher.token().unwrap().expose_secret(), "env-token");
        std::env::remove_var(TOKEN_ENV_VAR);
    }

    #[test]
    #[serial]
    fn test_config_path_env_override() {
        std::env::set_var(CONFIG_ENV_VAR, "/tmp/custom-dailypost.toml");
        assert_eq!(
            resolve_config_path().unwrap(),
            PathBuf::from("/tmp/custom-dailypost.toml")
        );
        std::env::remove_var(CONFIG_ENV_VAR);
    }

    #[test]
    #[serial]
    fn test_load_explicit_missing_path_fails() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        std::env::set_var(CONFIG_ENV_VAR, temp_dir.path().join("typo.toml"));

        let err = Config::load().unwrap_err();
        std::env::remove_var(CONFIG_ENV_VAR);

        assert!(matches!(err, DailypostError::Config(ConfigError::ReadError(_))));
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_default_location_without_file_uses_defaults() {
        let temp_dir = tempfile::TempDir::new().unwrap();

        let config = Config::load_or_default(&temp_dir.path().join("config.toml")).unwrap();
        assert_eq!(config.store.backend, StoreBackend::Sqlite);
        assert!(config.publisher.is_none());
        assert_eq!(config.schedule.timezone, "Europe/Paris");
        assert_eq!(
            PathBuf::from(&config.store.path),
            resolve_data_path().unwrap().join("posts.db")
        );
    }

    #[test]
    fn test_expanded_path_replaces_tilde() {
        let store = StoreConfig {
            backend: StoreBackend::Local,
            path: "~/posts.json".to_string(),
        };
        assert!(!store.expanded_path().to_string_lossy().starts_with('~'));
    }
}
