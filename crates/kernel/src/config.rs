use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config `{path}`: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0} must be greater than zero")]
    Zero(&'static str),
}

/// Order in which READY processes are dispatched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchedulingPolicy {
    /// Round robin in the order processes became ready.
    #[default]
    Fifo,
    /// Highest priority first; ties fall back to ready order, then pid.
    Priority,
}

impl SchedulingPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            SchedulingPolicy::Fifo => "fifo",
            SchedulingPolicy::Priority => "priority",
        }
    }
}

/// Kernel tunables. Every field has a default, so an empty TOML document is
/// a valid configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Bytes of simulated memory.
    pub memory_size: usize,
    /// Cells per row in memory snapshots.
    pub row_width: usize,
    /// Op-codes a process may execute per dispatch.
    pub quantum: usize,
    pub policy: SchedulingPolicy,
    /// Evict idle processes to disk when a load does not fit.
    pub swap: bool,
    /// Byte limit for the swap disk; `None` is unbounded.
    pub disk_capacity: Option<usize>,
    pub default_priority: u8,
}

impl Config {
    pub const DEFAULT_MEMORY_SIZE: usize = 769;
    pub const DEFAULT_ROW_WIDTH: usize = 8;
    pub const DEFAULT_QUANTUM: usize = 4;

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.memory_size == 0 {
            return Err(ConfigError::Zero("memory_size"));
        }
        if self.row_width == 0 {
            return Err(ConfigError::Zero("row_width"));
        }
        if self.quantum == 0 {
            return Err(ConfigError::Zero("quantum"));
        }
        if self.disk_capacity == Some(0) {
            return Err(ConfigError::Zero("disk_capacity"));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            memory_size: Self::DEFAULT_MEMORY_SIZE,
            row_width: Self::DEFAULT_ROW_WIDTH,
            quantum: Self::DEFAULT_QUANTUM,
            policy: SchedulingPolicy::Fifo,
            swap: true,
            disk_capacity: None,
            default_priority: 0,
        }
    }
}
