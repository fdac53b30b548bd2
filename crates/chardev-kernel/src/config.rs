use std::{fmt::Display, str::FromStr};

use log::LevelFilter;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("`{field}` must be at least 1")]
    Zero { field: &'static str },
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for LevelFilter {
    fn from(value: LogLevel) -> Self {
        match value {
            LogLevel::Trace => LevelFilter::Trace,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Error => LevelFilter::Error,
        }
    }
}

/// Load-time parameters of one driver module.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct ModuleConfig {
    /// Device base file name; nodes are called `<name><minor>`.
    pub name: String,
    /// Number of instances (minor numbers).
    pub instances: u32,
    /// Mailbox capacity in bytes.
    pub capacity: usize,
    /// Initial timer period in milliseconds, 0 keeps the timer suspended.
    pub period_ms: u64,
    pub log_level: LogLevel,
}

impl Default for ModuleConfig {
    fn default() -> Self {
        Self {
            name: "poll".into(),
            instances: 2,
            capacity: 16,
            period_ms: 1000,
            log_level: LogLevel::Info,
        }
    }
}

impl ModuleConfig {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.instances == 0 {
            return Err(ConfigError::Zero { field: "instances" });
        }
        if self.capacity == 0 {
            return Err(ConfigError::Zero { field: "capacity" });
        }
        Ok(())
    }
}

impl Display for ModuleConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = toml::to_string(self).map_err(|_| std::fmt::Error)?;
        write!(f, "{}", text)
    }
}

impl FromStr for ModuleConfig {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let config: ModuleConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }
}
