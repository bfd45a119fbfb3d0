//! Environment-driven configuration, read once at startup.

use std::env;
use std::fmt::Display;
use std::net::IpAddr;
use std::path::PathBuf;
use std::str::FromStr;

/// Errors for unparseable configuration values.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value:?} ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Where formatted logs go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogMode {
    Stdout,
    File,
}

impl FromStr for LogMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stdout" => Ok(Self::Stdout),
            "file" => Ok(Self::File),
            other => Err(format!("expected 'stdout' or 'file', got '{other}'")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: IpAddr,
    pub port: u16,
    pub db_path: PathBuf,
    pub model_dir: PathBuf,
    pub require_manifest: bool,
    /// Allowed CORS origins; empty allows any origin.
    pub cors_origins: Vec<String>,
    pub log_mode: LogMode,
    pub log_file: PathBuf,
}

impl Config {
    /// Read the process environment.
    ///
    /// # Errors
    /// Returns `ConfigError` for any value that does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (the environment in production).
    ///
    /// # Errors
    /// Returns `ConfigError` for any value that does not parse.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            bind_addr: try_load(&lookup, "GLIMPSE_BIND_ADDR", "0.0.0.0")?,
            port: try_load(&lookup, "GLIMPSE_PORT", "5000")?,
            db_path: try_load(&lookup, "GLIMPSE_DB_PATH", "glimpse.db")?,
            model_dir: try_load(&lookup, "GLIMPSE_MODEL_DIR", "ai_models/resources")?,
            require_manifest: parse_bool(&lookup, "GLIMPSE_REQUIRE_MANIFEST")?,
            cors_origins: lookup("GLIMPSE_CORS_ORIGINS")
                .map(|v| {
                    v.split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(String::from)
                        .collect()
                })
                .unwrap_or_default(),
            log_mode: try_load(&lookup, "GLIMPSE_LOG_MODE", "stdout")?,
            log_file: try_load(&lookup, "GLIMPSE_LOG_FILE", "glimpse.log")?,
        })
    }
}

fn try_load<T, F>(lookup: &F, key: &'static str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    let value = lookup(key).unwrap_or_else(|| default.to_string());
    let parsed = value.trim().parse::<T>();
    parsed.map_err(|e| ConfigError::Invalid {
        key,
        reason: e.to_string(),
        value,
    })
}

fn parse_bool<F>(lookup: &F, key: &'static str) -> Result<bool, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(false),
        Some(v) => match v.trim() {
            "1" | "true" | "TRUE" | "yes" | "YES" => Ok(true),
            "" | "0" | "false" | "FALSE" | "no" | "NO" => Ok(false),
            _ => Err(ConfigError::Invalid {
                key,
                value: v,
                reason: "expected a boolean".into(),
            }),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let cfg = config(&[]).expect("defaults");
        assert_eq!(cfg.port, 5000);
        assert_eq!(cfg.bind_addr.to_string(), "0.0.0.0");
        assert_eq!(cfg.model_dir, PathBuf::from("ai_models/resources"));
        assert!(!cfg.require_manifest);
        assert!(cfg.cors_origins.is_empty());
        assert_eq!(cfg.log_mode, LogMode::Stdout);
    }

    #[test]
    fn test_overrides() {
        let cfg = config(&[
            ("GLIMPSE_PORT", "8080"),
            ("GLIMPSE_REQUIRE_MANIFEST", "yes"),
            ("GLIMPSE_CORS_ORIGINS", "http://a.test, http://b.test,"),
            ("GLIMPSE_LOG_MODE", "FILE"),
        ])
        .expect("config");
        assert_eq!(cfg.port, 8080);
        assert!(cfg.require_manifest);
        assert_eq!(cfg.cors_origins, vec!["http://a.test", "http://b.test"]);
        assert_eq!(cfg.log_mode, LogMode::File);
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            config(&[("GLIMPSE_PORT", "eighty")]),
            Err(ConfigError::Invalid { key: "GLIMPSE_PORT", .. })
        ));
        assert!(config(&[("GLIMPSE_BIND_ADDR", "localhost:1")]).is_err());
        assert!(config(&[("GLIMPSE_REQUIRE_MANIFEST", "maybe")]).is_err());
        assert!(config(&[("GLIMPSE_LOG_MODE", "syslog")]).is_err());
    }
}
