//! Application configuration module
//!
//! Handles loading and validating configuration from environment variables.
//! Validation happens once at startup; a missing or malformed variable stops
//! the process before any listener is bound.

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("Invalid value for {var}: {reason}")]
    InvalidValue { var: &'static str, reason: String },
}

/// Server configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: Ipv4Addr,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: Ipv4Addr::new(0, 0, 0, 0), // Bind to 0.0.0.0 for Render/Docker
            port: 5000,
        }
    }
}

/// Which data store backs the guestbook table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Supabase,
    Postgres,
    Memory,
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "supabase" | "rest" => Ok(Self::Supabase),
            "postgres" | "postgresql" => Ok(Self::Postgres),
            "memory" => Ok(Self::Memory),
            other => Err(format!(
                "unknown backend '{}' (expected supabase, postgres or memory)",
                other
            )),
        }
    }
}

/// Hosted REST endpoint credentials
#[derive(Clone, PartialEq, Eq)]
pub struct SupabaseConfig {
    pub url: url::Url,
    pub key: String,
    pub timeout: Duration,
}

// Keeps the access key out of logs.
impl fmt::Debug for SupabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SupabaseConfig")
            .field("url", &self.url.as_str())
            .field("key", &"<redacted>")
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Direct Postgres connection settings
#[derive(Clone, PartialEq, Eq)]
pub struct PostgresConfig {
    pub database_url: String,
    pub max_pool_size: usize,
}

impl fmt::Debug for PostgresConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostgresConfig")
            .field("database_url", &"<redacted>")
            .field("max_pool_size", &self.max_pool_size)
            .finish()
    }
}

/// Data store configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreConfig {
    Supabase(SupabaseConfig),
    Postgres(PostgresConfig),
    Memory,
}

impl StoreConfig {
    pub fn kind(&self) -> BackendKind {
        match self {
            StoreConfig::Supabase(_) => BackendKind::Supabase,
            StoreConfig::Postgres(_) => BackendKind::Postgres,
            StoreConfig::Memory => BackendKind::Memory,
        }
    }
}

/// Complete application settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub table: String,
}

pub const DEFAULT_TABLE: &str = "guestbook";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_MAX_POOL_SIZE: usize = 10;

impl Settings {
    /// Load settings from environment variables
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if it exists (ignore errors if file not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build settings from an arbitrary variable lookup.
    ///
    /// Empty values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let defaults = ServerConfig::default();
        let server = ServerConfig {
            host: parse_or("HOST", var("HOST"), defaults.host)?,
            port: parse_or("PORT", var("PORT"), defaults.port)?,
        };

        let backend = match var("STORE_BACKEND") {
            Some(raw) => raw.parse::<BackendKind>().map_err(|reason| {
                ConfigError::InvalidValue {
                    var: "STORE_BACKEND",
                    reason,
                }
            })?,
            None => BackendKind::Supabase,
        };

        let store = match backend {
            BackendKind::Supabase => {
                let raw_url = var("SUPABASE_URL").ok_or(ConfigError::MissingVar("SUPABASE_URL"))?;
                let key = var("SUPABASE_KEY").ok_or(ConfigError::MissingVar("SUPABASE_KEY"))?;
                let timeout_secs = non_zero(
                    "STORE_TIMEOUT_SECS",
                    parse_or("STORE_TIMEOUT_SECS", var("STORE_TIMEOUT_SECS"), DEFAULT_TIMEOUT_SECS)?,
                )?;

                StoreConfig::Supabase(SupabaseConfig {
                    url: parse_supabase_url(&raw_url)?,
                    key: key.trim().to_string(),
                    timeout: Duration::from_secs(timeout_secs),
                })
            }
            BackendKind::Postgres => {
                let database_url =
                    var("DATABASE_URL").ok_or(ConfigError::MissingVar("DATABASE_URL"))?;
                let max_pool_size = non_zero(
                    "DB_MAX_CONNECTIONS",
                    parse_or("DB_MAX_CONNECTIONS", var("DB_MAX_CONNECTIONS"), DEFAULT_MAX_POOL_SIZE)?,
                )?;

                StoreConfig::Postgres(PostgresConfig {
                    database_url,
                    max_pool_size,
                })
            }
            BackendKind::Memory => StoreConfig::Memory,
        };

        let table = var("GUESTBOOK_TABLE")
            .map(|t| t.trim().to_string())
            .unwrap_or_else(|| DEFAULT_TABLE.to_string());

        Ok(Self {
            server,
            store,
            table,
        })
    }
}

fn parse_or<T>(var: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match raw {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::InvalidValue {
                var,
                reason: e.to_string(),
            }),
        None => Ok(default),
    }
}

/// Pool size and timeout must be positive
fn non_zero<T>(var: &'static str, value: T) -> Result<T, ConfigError>
where
    T: Default + PartialEq,
{
    if value == T::default() {
        return Err(ConfigError::InvalidValue {
            var,
            reason: "must be greater than zero".to_string(),
        });
    }
    Ok(value)
}

/// Parse the project URL (https://<project>.supabase.co)
fn parse_supabase_url(raw: &str) -> Result<url::Url, ConfigError> {
    let parsed = url::Url::parse(raw.trim()).map_err(|e| ConfigError::InvalidValue {
        var: "SUPABASE_URL",
        reason: e.to_string(),
    })?;

    match parsed.scheme() {
        "http" | "https" if parsed.host_str().is_some() => Ok(parsed),
        _ => Err(ConfigError::InvalidValue {
            var: "SUPABASE_URL",
            reason: "expected an http(s) URL such as https://<project>.supabase.co".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn settings_from(vars: &[(&str, &str)]) -> Result<Settings, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|name| map.get(name).cloned())
    }

    #[test]
    fn test_default_server_config() {
        let config = ServerConfig::default();
        assert_eq!(config.host, Ipv4Addr::new(0, 0, 0, 0));
        assert_eq!(config.port, 5000);
    }

    #[test]
    fn test_supabase_defaults() {
        let settings = settings_from(&[
            ("SUPABASE_URL", "https://abc.supabase.co"),
            ("SUPABASE_KEY", "anon-key"),
        ])
        .unwrap();

        assert_eq!(settings.server, ServerConfig::default());
        assert_eq!(settings.table, "guestbook");
        match settings.store {
            StoreConfig::Supabase(cfg) => {
                assert_eq!(cfg.url.as_str(), "https://abc.supabase.co/");
                assert_eq!(cfg.key, "anon-key");
                assert_eq!(cfg.timeout, Duration::from_secs(30));
            }
            other => panic!("unexpected store config: {:?}", other),
        }
    }

    #[test]
    fn test_missing_supabase_key_fails() {
        let err = settings_from(&[("SUPABASE_URL", "https://abc.supabase.co")]).unwrap_err();
        assert_eq!(err, ConfigError::MissingVar("SUPABASE_KEY"));
    }

    #[test]
    fn test_missing_supabase_url_fails() {
        let err = settings_from(&[("SUPABASE_KEY", "k")]).unwrap_err();
        assert_eq!(err, ConfigError::MissingVar("SUPABASE_URL"));
    }

    #[test]
    fn test_blank_value_counts_as_missing() {
        let err = settings_from(&[("SUPABASE_URL", "https://abc.supabase.co"), ("SUPABASE_KEY", "  ")])
            .unwrap_err();
        assert_eq!(err, ConfigError::MissingVar("SUPABASE_KEY"));
    }

    #[test]
    fn test_non_http_url_rejected() {
        let err = settings_from(&[("SUPABASE_URL", "postgres://db"), ("SUPABASE_KEY", "k")])
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { var: "SUPABASE_URL", .. }));
    }

    #[test]
    fn test_port_and_host_override() {
        let settings = settings_from(&[
            ("STORE_BACKEND", "memory"),
            ("PORT", "8080"),
            ("HOST", "127.0.0.1"),
        ])
        .unwrap();
        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.server.host, Ipv4Addr::new(127, 0, 0, 1));
        assert_eq!(settings.store, StoreConfig::Memory);
    }

    #[test]
    fn test_invalid_port_fails() {
        let err = settings_from(&[("STORE_BACKEND", "memory"), ("PORT", "eighty")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { var: "PORT", .. }));
    }

    #[test]
    fn test_postgres_backend() {
        let settings = settings_from(&[
            ("STORE_BACKEND", "Postgres"),
            ("DATABASE_URL", "postgres://u:p@localhost/db"),
            ("DB_MAX_CONNECTIONS", "4"),
            ("GUESTBOOK_TABLE", "entries"),
        ])
        .unwrap();
        assert_eq!(settings.store.kind(), BackendKind::Postgres);
        assert_eq!(settings.table, "entries");
        match settings.store {
            StoreConfig::Postgres(cfg) => assert_eq!(cfg.max_pool_size, 4),
            other => panic!("unexpected store config: {:?}", other),
        }
    }

    #[test]
    fn test_zero_pool_size_fails() {
        let err = settings_from(&[
            ("STORE_BACKEND", "postgres"),
            ("DATABASE_URL", "postgres://u:p@localhost/db"),
            ("DB_MAX_CONNECTIONS", "0"),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { var: "DB_MAX_CONNECTIONS", .. }));
    }

    #[test]
    fn test_zero_timeout_fails() {
        let err = settings_from(&[
            ("SUPABASE_URL", "https://abc.supabase.co"),
            ("SUPABASE_KEY", "k"),
            ("STORE_TIMEOUT_SECS", "0"),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { var: "STORE_TIMEOUT_SECS", .. }));
    }

    #[test]
    fn test_postgres_requires_database_url() {
        let err = settings_from(&[("STORE_BACKEND", "postgres")]).unwrap_err();
        assert_eq!(err, ConfigError::MissingVar("DATABASE_URL"));
    }

    #[test]
    fn test_unknown_backend_fails() {
        let err = settings_from(&[("STORE_BACKEND", "sqlite")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { var: "STORE_BACKEND", .. }));
    }

    #[test]
    fn test_debug_redacts_key() {
        let settings = settings_from(&[
            ("SUPABASE_URL", "https://abc.supabase.co"),
            ("SUPABASE_KEY", "super-secret"),
        ])
        .unwrap();
        assert!(!format!("{:?}", settings).contains("super-secret"));
    }
}
