//! Server configuration

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use conquest_core::{GameRules, RulesError};
use serde::{Deserialize, Serialize};

/// Server configuration. Every field has a default, so a partial YAML file is enough.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the TCP adapter listens on
    pub bind_address: SocketAddr,
    /// Longest wait for a session lock before answering "busy"
    pub lock_timeout_ms: u64,
    /// Period of the decay/reap ticker
    pub tick_interval_secs: u64,
    /// Sessions without activity for this long are removed
    pub idle_timeout_secs: u64,
    /// Events buffered per session before slow observers start missing them
    pub observer_buffer: usize,
    /// Map file; the bundled province map when unset
    pub map_path: Option<PathBuf>,
    /// Rules applied to every new session
    pub rules: GameRules,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([0, 0, 0, 0], 7777)),
            lock_timeout_ms: 2_000,
            tick_interval_secs: 60,
            idle_timeout_secs: 2 * 60 * 60,
            observer_buffer: 64,
            map_path: None,
            rules: GameRules::default(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid rules: {0}")]
    Rules(#[from] RulesError),

    #[error("{0} must be positive")]
    Zero(&'static str),
}

impl ServerConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        Self::from_yaml_str(&std::fs::read_to_string(path)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.lock_timeout_ms == 0 {
            return Err(ConfigError::Zero("lock_timeout_ms"));
        }
        if self.tick_interval_secs == 0 {
            return Err(ConfigError::Zero("tick_interval_secs"));
        }
        if self.observer_buffer == 0 {
            return Err(ConfigError::Zero("observer_buffer"));
        }
        self.rules.validate()?;
        Ok(())
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval_secs)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}
