use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::core::RankerSettings;
use crate::realtime::RealtimeSettings;

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    pub auth: AuthSettings,
    #[serde(default)]
    pub discovery: DiscoverySettings,
    #[serde(default)]
    pub realtime: RealtimeConfig,
    #[serde(default)]
    pub presence: PresenceSettings,
    #[serde(default)]
    pub store: StoreSettings,
    #[serde(default)]
    pub appwrite: Option<AppwriteSettings>,
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
}

/// Which `Store` implementation backs the service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    #[serde(default = "default_backend")]
    pub backend: StoreBackend,
    #[serde(default)]
    pub url: String,
    pub max_connections: Option<u32>,
    pub min_connections: Option<u32>,
    pub acquire_timeout_secs: Option<u64>,
    pub idle_timeout_secs: Option<u64>,
}

fn default_backend() -> StoreBackend { StoreBackend::Postgres }

#[derive(Debug, Clone, Deserialize)]
pub struct AuthSettings {
    pub secret: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DiscoverySettings {
    #[serde(default = "default_completion_threshold")]
    pub completion_threshold: u8,
    #[serde(default = "default_window_size")]
    pub window_size: usize,
}

impl Default for DiscoverySettings {
    fn default() -> Self {
        Self {
            completion_threshold: default_completion_threshold(),
            window_size: default_window_size(),
        }
    }
}

impl DiscoverySettings {
    pub fn ranker_settings(&self) -> RankerSettings {
        RankerSettings {
            completion_threshold: self.completion_threshold,
            window_size: self.window_size,
        }
    }
}

fn default_completion_threshold() -> u8 { 60 }
fn default_window_size() -> usize { 10 }

#[derive(Debug, Clone, Deserialize)]
pub struct RealtimeConfig {
    #[serde(default = "default_ping_secs")]
    pub ping_secs: u64,
    #[serde(default = "default_match_poll_secs")]
    pub match_poll_secs: u64,
    #[serde(default = "default_message_poll_secs")]
    pub message_poll_secs: u64,
    #[serde(default = "default_fallback_poll_secs")]
    pub fallback_poll_secs: u64,
    #[serde(default = "default_late_commit_secs")]
    pub late_commit_secs: u64,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            ping_secs: default_ping_secs(),
            match_poll_secs: default_match_poll_secs(),
            message_poll_secs: default_message_poll_secs(),
            fallback_poll_secs: default_fallback_poll_secs(),
            late_commit_secs: default_late_commit_secs(),
        }
    }
}

impl RealtimeConfig {
    pub fn intervals(&self) -> RealtimeSettings {
        RealtimeSettings {
            ping_interval: Duration::from_secs(self.ping_secs),
            match_poll_interval: Duration::from_secs(self.match_poll_secs),
            message_poll_interval: Duration::from_secs(self.message_poll_secs),
            fallback_interval: Duration::from_secs(self.fallback_poll_secs),
            late_commit_window: Duration::from_secs(self.late_commit_secs),
        }
    }
}

fn default_ping_secs() -> u64 { 15 }
fn default_match_poll_secs() -> u64 { 3 }
fn default_message_poll_secs() -> u64 { 2 }
fn default_fallback_poll_secs() -> u64 { 7 }
fn default_late_commit_secs() -> u64 { 30 }

#[derive(Debug, Clone, Deserialize)]
pub struct PresenceSettings {
    #[serde(default = "default_typing_ttl_secs")]
    pub typing_ttl_secs: u64,
    #[serde(default = "default_sweep_secs")]
    pub sweep_secs: u64,
}

impl Default for PresenceSettings {
    fn default() -> Self {
        Self {
            typing_ttl_secs: default_typing_ttl_secs(),
            sweep_secs: default_sweep_secs(),
        }
    }
}

fn default_typing_ttl_secs() -> u64 { 5 }
fn default_sweep_secs() -> u64 { 5 }

#[derive(Debug, Clone, Deserialize)]
pub struct StoreSettings {
    #[serde(default = "default_store_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            timeout_ms: default_store_timeout_ms(),
        }
    }
}

fn default_store_timeout_ms() -> u64 { 3000 }

#[derive(Debug, Clone, Deserialize)]
pub struct AppwriteSettings {
    pub endpoint: String,
    pub api_key: String,
    pub project_id: String,
    pub database_id: String,
    #[serde(default = "default_photos_collection")]
    pub photos_collection: String,
    #[serde(default = "default_appwrite_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_photos_collection() -> String { "photos".to_string() }
fn default_appwrite_timeout_ms() -> u64 { 2000 }

#[derive(Debug, Clone, Deserialize)]
pub struct CacheSettings {
    pub ttl_secs: Option<u64>,
    pub max_entries: Option<u64>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            ttl_secs: Some(300),
            max_entries: Some(1000),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String { "info".to_string() }
fn default_log_format() -> String { "json".to_string() }

fn environment() -> Environment {
    Environment::with_prefix("KINDRED")
        .prefix_separator("__")
        .separator("__")
        .try_parsing(true)
}

impl Settings {
    /// Load configuration from file and environment variables
    ///
    /// Configuration is loaded in the following order (later overrides earlier):
    /// 1. Default values in the struct
    /// 2. Configuration files (config/default.toml, then config/local.toml)
    /// 3. Environment variables (prefixed with KINDRED__)
    /// 4. DATABASE_URL and KINDRED_AUTH_SECRET
    pub fn load() -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            // e.g., KINDRED__SERVER__PORT -> server.port
            .add_source(environment())
            .build()?;

        apply_env_overrides(settings)?.try_deserialize()
    }

    /// Load configuration from a custom path
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(environment())
            .build()?;

        settings.try_deserialize()
    }
}

/// Apply the conventional unprefixed variables on top of the layered config
fn apply_env_overrides(settings: Config) -> Result<Config, ConfigError> {
    use std::env;

    let mut builder = Config::builder().add_source(settings);

    if let Ok(url) = env::var("DATABASE_URL") {
        builder = builder.set_override("database.url", url)?;
    }
    if let Ok(secret) = env::var("KINDRED_AUTH_SECRET") {
        builder = builder.set_override("auth.secret", secret)?;
    }

    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_logging() {
        let level = default_log_level();
        let format = default_log_format();
        assert_eq!(level, "info");
        assert_eq!(format, "json");
    }

    #[test]
    fn test_default_intervals() {
        let realtime = RealtimeConfig::default().intervals();
        assert_eq!(realtime.ping_interval, Duration::from_secs(15));
        assert_eq!(realtime.match_poll_interval, Duration::from_secs(3));
        assert_eq!(realtime.message_poll_interval, Duration::from_secs(2));
        assert_eq!(realtime.fallback_interval, Duration::from_secs(7));
        assert_eq!(realtime.late_commit_window, Duration::from_secs(30));

        let ranker = DiscoverySettings::default().ranker_settings();
        assert_eq!(ranker.completion_threshold, 60);
        assert_eq!(ranker.window_size, 10);
        assert_eq!(StoreSettings::default().timeout_ms, 3000);
        assert_eq!(PresenceSettings::default().typing_ttl_secs, 5);
    }

    #[test]
    fn test_load_minimal_file() {
        let path = std::env::temp_dir().join(format!("kindred-{}.toml", uuid::Uuid::new_v4()));
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            r#"
[server]
host = "127.0.0.1"
port = 9090

[database]
backend = "memory"

[auth]
secret = "s3cret"

[discovery]
window_size = 25
"#
        )
        .unwrap();

        let settings = Settings::load_from(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(settings.server.port, 9090);
        assert_eq!(settings.database.backend, StoreBackend::Memory);
        assert_eq!(settings.discovery.window_size, 25);
        assert_eq!(settings.discovery.completion_threshold, 60);
        assert!(settings.appwrite.is_none());
        assert_eq!(settings.cache.ttl_secs, Some(300));
    }
}
