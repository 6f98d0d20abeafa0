//! Configuration file parsing.
//!
//! Reads optional `schema-sync.toml` files. Every value can be overridden
//! on the command line; the file just keeps invocations short.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::provider::Dialect;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Validation(String),
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub connection: ConnectionConfig,

    #[serde(default)]
    pub schemas: SchemasConfig,

    #[serde(default)]
    pub lock: LockConfig,

    #[serde(default)]
    pub apply: ApplyConfig,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ConnectionConfig {
    /// Connection URL. `postgres://…` or a SQLite path/URL.
    pub url: Option<String>,

    /// Explicit dialect; inferred from the URL when omitted.
    pub dialect: Option<Dialect>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SchemasConfig {
    /// Managed-schema allow-list. The first entry is the default schema
    /// for unqualified names.
    #[serde(default = "default_managed")]
    pub managed: Vec<String>,
}

impl Default for SchemasConfig {
    fn default() -> Self {
        Self {
            managed: default_managed(),
        }
    }
}

fn default_managed() -> Vec<String> {
    vec!["public".to_string()]
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LockConfig {
    /// Advisory lock name. Locking is disabled when unset.
    pub name: Option<String>,

    /// Acquisition timeout in milliseconds.
    #[serde(default = "default_lock_timeout")]
    pub timeout_ms: u64,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            name: None,
            timeout_ms: default_lock_timeout(),
        }
    }
}

fn default_lock_timeout() -> u64 {
    30_000
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ApplyConfig {
    /// Skip the confirmation prompt.
    #[serde(default)]
    pub auto_approve: bool,
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.schemas.managed.is_empty() {
            return Err(ConfigError::Validation(
                "schemas.managed must name at least one schema".to_string(),
            ));
        }
        if let (Some(url), Some(dialect)) = (&self.connection.url, self.connection.dialect) {
            if let Some(inferred) = Dialect::from_url(url) {
                if inferred != dialect {
                    return Err(ConfigError::Validation(format!(
                        "connection.url looks like {} but connection.dialect says {}",
                        inferred, dialect
                    )));
                }
            }
        }
        Ok(())
    }
}
