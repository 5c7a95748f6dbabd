//! # Configuration
//!
//! Settings are layered, later layers winning:
//!
//! 1. Built-in defaults
//! 2. TOML file (`escape-room.toml` in the working directory, or `--config`)
//! 3. Environment variables
//! 4. CLI flags
//!
//! ## Environment Variables
//!
//! - `ESCAPE_CORS_ORIGINS`: Comma-separated allowed origins, or "*" for all
//! - `ESCAPE_RATE_LIMIT`: Requests per second (0 disables rate limiting)
//! - `ESCAPE_API_KEY`: If set, requires Bearer token authentication
//! - `ESCAPE_SERVER_URL`: Server the play client persists to
//!
//! ## Example
//!
//! ```toml
//! database = "escape-room.db"
//! backend = "redb"
//!
//! [server]
//! host = "0.0.0.0"
//! port = 8080
//! cors_origins = ["http://localhost:3000"]
//! rate_limit = 50
//!
//! [client]
//! server_url = "http://127.0.0.1:8080"
//! sync_policy = "outbox"
//! ```

use clap::ValueEnum;
use escape_core::{EscapeError, SyncPolicy};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Config file looked up in the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "escape-room.toml";

/// Default database path.
pub const DEFAULT_DATABASE: &str = "escape-room.db";

/// Default rate limit: 100 requests per second.
pub const DEFAULT_RATE_LIMIT: u32 = 100;

pub const ENV_CORS_ORIGINS: &str = "ESCAPE_CORS_ORIGINS";
pub const ENV_RATE_LIMIT: &str = "ESCAPE_RATE_LIMIT";
pub const ENV_API_KEY: &str = "ESCAPE_API_KEY";
pub const ENV_SERVER_URL: &str = "ESCAPE_SERVER_URL";

// =============================================================================
// VALUE TYPES
// =============================================================================

/// Storage backend for the server and local play.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// ACID database file.
    #[default]
    Redb,
    /// Volatile, lost on exit.
    Memory,
}

/// Sync policy as written in config files and flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum SyncMode {
    #[default]
    BestEffort,
    Outbox,
}

impl From<SyncMode> for SyncPolicy {
    fn from(mode: SyncMode) -> Self {
        match mode {
            SyncMode::BestEffort => SyncPolicy::BestEffort,
            SyncMode::Outbox => SyncPolicy::Outbox,
        }
    }
}

/// Allowed CORS origins.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CorsOrigins {
    /// Localhost on the usual dev ports.
    #[default]
    Localhost,
    /// Any origin.
    Any,
    /// An explicit list.
    List(Vec<String>),
}

impl CorsOrigins {
    /// Parse the `ESCAPE_CORS_ORIGINS` format.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        if value.trim() == "*" {
            return Self::Any;
        }
        Self::from_list(value.split(',').map(str::to_string).collect())
    }

    fn from_list(origins: Vec<String>) -> Self {
        let origins: Vec<String> = origins
            .into_iter()
            .map(|o| o.trim().to_string())
            .filter(|o| !o.is_empty())
            .collect();
        if origins.iter().any(|o| o == "*") {
            Self::Any
        } else if origins.is_empty() {
            Self::Localhost
        } else {
            Self::List(origins)
        }
    }
}

/// HTTP security settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityConfig {
    pub cors_origins: CorsOrigins,
    /// Requests per second; 0 disables rate limiting.
    pub rate_limit: u32,
    /// Bearer key required on every route except `/health`.
    pub api_key: Option<String>,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            cors_origins: CorsOrigins::Localhost,
            rate_limit: DEFAULT_RATE_LIMIT,
            api_key: None,
        }
    }
}

// =============================================================================
// FILE LAYER
// =============================================================================

/// Shape of the TOML file. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub database: Option<PathBuf>,
    pub backend: Option<Backend>,
    pub server: ServerSection,
    pub client: ClientSection,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerSection {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub cors_origins: Option<Vec<String>>,
    pub rate_limit: Option<u32>,
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClientSection {
    pub server_url: Option<String>,
    pub sync_policy: Option<SyncMode>,
}

impl FileConfig {
    /// Load a TOML config file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, EscapeError> {
        let path = path.as_ref();
        tracing::debug!(path = %path.display(), "loading config file");
        let content = std::fs::read_to_string(path).map_err(|e| {
            EscapeError::IoError(format!("Failed to read config file '{}': {}", path.display(), e))
        })?;
        Self::from_toml(&content)
    }

    /// Parse TOML config text.
    pub fn from_toml(content: &str) -> Result<Self, EscapeError> {
        toml::from_str(content)
            .map_err(|e| EscapeError::Validation(format!("Failed to parse config: {}", e)))
    }
}

// =============================================================================
// RESOLVED SETTINGS
// =============================================================================

/// Fully resolved settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub database: PathBuf,
    pub backend: Backend,
    pub host: String,
    pub port: u16,
    pub security: SecurityConfig,
    /// Server the play client persists to; `None` plays against local storage.
    pub server_url: Option<String>,
    pub sync_policy: SyncMode,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database: PathBuf::from(DEFAULT_DATABASE),
            backend: Backend::Redb,
            host: "127.0.0.1".to_string(),
            port: 8080,
            security: SecurityConfig::default(),
            server_url: None,
            sync_policy: SyncMode::BestEffort,
        }
    }
}

/// Values given on the command line. `None` leaves lower layers in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CliOverrides {
    pub database: Option<PathBuf>,
    pub backend: Option<Backend>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub server_url: Option<String>,
    pub sync_policy: Option<SyncMode>,
}

impl Settings {
    /// Resolve settings from every layer.
    ///
    /// An explicit `config_path` must exist; the default file is optional.
    pub fn load(config_path: Option<&Path>, cli: &CliOverrides) -> Result<Self, EscapeError> {
        let file = match config_path {
            Some(path) => FileConfig::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).is_file() => {
                FileConfig::from_file(DEFAULT_CONFIG_FILE)?
            }
            None => FileConfig::default(),
        };

        let mut settings = Self::default();
        settings.apply_file(file);
        settings.apply_env(|key| std::env::var(key).ok());
        settings.apply_cli(cli);
        Ok(settings)
    }

    /// Layer a parsed config file.
    pub fn apply_file(&mut self, file: FileConfig) {
        if let Some(database) = file.database {
            self.database = database;
        }
        if let Some(backend) = file.backend {
            self.backend = backend;
        }
        if let Some(host) = file.server.host {
            self.host = host;
        }
        if let Some(port) = file.server.port {
            self.port = port;
        }
        if let Some(origins) = file.server.cors_origins {
            self.security.cors_origins = CorsOrigins::from_list(origins);
        }
        if let Some(rate) = file.server.rate_limit {
            self.security.rate_limit = rate;
        }
        if let Some(key) = file.server.api_key.filter(|k| !k.is_empty()) {
            self.security.api_key = Some(key);
        }
        if let Some(url) = file.client.server_url {
            self.server_url = Some(url);
        }
        if let Some(policy) = file.client.sync_policy {
            self.sync_policy = policy;
        }
    }

    /// Layer environment variables read through `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(origins) = lookup(ENV_CORS_ORIGINS) {
            self.security.cors_origins = CorsOrigins::parse(&origins);
        }
        if let Some(rate) = lookup(ENV_RATE_LIMIT) {
            match rate.trim().parse() {
                Ok(rate) => self.security.rate_limit = rate,
                Err(_) => tracing::warn!(value = %rate, "ignoring invalid {}", ENV_RATE_LIMIT),
            }
        }
        if let Some(key) = lookup(ENV_API_KEY).filter(|k| !k.is_empty()) {
            self.security.api_key = Some(key);
        }
        if let Some(url) = lookup(ENV_SERVER_URL).filter(|u| !u.is_empty()) {
            self.server_url = Some(url);
        }
    }

    /// Layer command-line flags.
    pub fn apply_cli(&mut self, cli: &CliOverrides) {
        if let Some(database) = &cli.database {
            self.database = database.clone();
        }
        if let Some(backend) = cli.backend {
            self.backend = backend;
        }
        if let Some(host) = &cli.host {
            self.host = host.clone();
        }
        if let Some(port) = cli.port {
            self.port = port;
        }
        if let Some(url) = &cli.server_url {
            self.server_url = Some(url.clone());
        }
        if let Some(policy) = cli.sync_policy {
            self.sync_policy = policy;
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: BTreeMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn file_layer_parses_sections() {
        let file = FileConfig::from_toml(
            r#"
            database = "data/rooms.db"
            backend = "memory"

            [server]
            port = 9000
            cors_origins = ["https://example.org"]

            [client]
            sync_policy = "outbox"
            "#,
        )
        .expect("parse");

        let mut settings = Settings::default();
        settings.apply_file(file);
        assert_eq!(settings.database, PathBuf::from("data/rooms.db"));
        assert_eq!(settings.backend, Backend::Memory);
        assert_eq!(settings.port, 9000);
        assert_eq!(settings.host, "127.0.0.1");
        assert_eq!(
            settings.security.cors_origins,
            CorsOrigins::List(vec!["https://example.org".to_string()])
        );
        assert_eq!(settings.sync_policy, SyncMode::Outbox);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(FileConfig::from_toml("colour = \"red\"").is_err());
    }

    #[test]
    fn env_overrides_file() {
        let mut settings = Settings::default();
        settings.apply_file(FileConfig {
            server: ServerSection {
                rate_limit: Some(5),
                ..ServerSection::default()
            },
            ..FileConfig::default()
        });
        settings.apply_env(env(&[
            (ENV_RATE_LIMIT, "0"),
            (ENV_CORS_ORIGINS, "*"),
            (ENV_API_KEY, "secret"),
        ]));
        assert_eq!(settings.security.rate_limit, 0);
        assert_eq!(settings.security.cors_origins, CorsOrigins::Any);
        assert_eq!(settings.security.api_key.as_deref(), Some("secret"));
    }

    #[test]
    fn invalid_env_values_are_ignored() {
        let mut settings = Settings::default();
        settings.apply_env(env(&[(ENV_RATE_LIMIT, "fast"), (ENV_API_KEY, "")]));
        assert_eq!(settings.security.rate_limit, DEFAULT_RATE_LIMIT);
        assert!(settings.security.api_key.is_none());
    }

    #[test]
    fn cli_overrides_everything() {
        let mut settings = Settings::default();
        settings.apply_env(env(&[(ENV_SERVER_URL, "http://env:1")]));
        settings.apply_cli(&CliOverrides {
            server_url: Some("http://flag:2".to_string()),
            port: Some(3000),
            ..CliOverrides::default()
        });
        assert_eq!(settings.server_url.as_deref(), Some("http://flag:2"));
        assert_eq!(settings.port, 3000);
    }

    #[test]
    fn cors_origin_parsing() {
        assert_eq!(CorsOrigins::parse("*"), CorsOrigins::Any);
        assert_eq!(CorsOrigins::parse(" , "), CorsOrigins::Localhost);
        assert_eq!(
            CorsOrigins::parse("http://a, http://b"),
            CorsOrigins::List(vec!["http://a".to_string(), "http://b".to_string()])
        );
    }

    #[test]
    fn explicit_missing_config_file_fails() {
        let temp = tempfile::tempdir().expect("temp dir");
        let missing = temp.path().join("nope.toml");
        assert!(Settings::load(Some(&missing), &CliOverrides::default()).is_err());
    }
}
