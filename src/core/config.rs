//! Runtime configuration loaded from `phaselock.toml`.
//!
//! A missing file means defaults. `PHASELOCK_DB` and `PHASELOCK_ACTOR` override the
//! file after it is parsed.

use crate::core::error::{Result, WorkflowError};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = "phaselock.toml";
pub const DEFAULT_DB_NAME: &str = "phaselock.db";
pub const DEFAULT_TOKEN_TTL_SECS: u64 = 600;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Recorded in audit metadata for every operation.
    pub actor: String,
    pub store: StoreConfig,
    pub confirm: ConfirmConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StoreConfig {
    pub path: PathBuf,
    pub busy_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ConfirmConfig {
    pub token_ttl_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            actor: "phaselock".to_string(),
            store: StoreConfig::default(),
            confirm: ConfirmConfig::default(),
            log: LogConfig::default(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_DB_NAME),
            busy_timeout_secs: 5,
        }
    }
}

impl Default for ConfirmConfig {
    fn default() -> Self {
        Self {
            token_ttl_secs: DEFAULT_TOKEN_TTL_SECS,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}

impl Config {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| {
            WorkflowError::ValidationError(format!("invalid {}: {}", CONFIG_FILE_NAME, e))
        })
    }

    /// Load `<dir>/phaselock.toml`, then apply environment overrides.
    pub fn load(dir: &Path) -> Result<Self> {
        let config_path = dir.join(CONFIG_FILE_NAME);
        let mut config = if config_path.exists() {
            let content = fs::read_to_string(&config_path)?;
            Self::from_toml_str(&content)?
        } else {
            Self::default()
        };

        if config.store.path.is_relative() {
            config.store.path = dir.join(&config.store.path);
        }

        if let Some(db) = env_override("PHASELOCK_DB")? {
            config.store.path = PathBuf::from(db);
        }
        if let Some(actor) = env_override("PHASELOCK_ACTOR")? {
            config.actor = actor;
        }

        Ok(config)
    }
}

fn env_override(key: &str) -> Result<Option<String>> {
    match env::var(key) {
        Ok(v) if !v.trim().is_empty() => Ok(Some(v)),
        Ok(_) | Err(env::VarError::NotPresent) => Ok(None),
        Err(e) => Err(e.into()),
    }
}
