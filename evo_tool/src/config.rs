//! Settings of the configurator itself, read from `configurator.toml`.
//!
//! ```toml
//! log_level = "info"
//!
//! [project]
//! tool_file = "tool.json"
//! pretty = true
//! ```
//!
//! Every key is optional; unknown keys are rejected so a misspelled
//! setting does not silently fall back to its default.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::consts::DEFAULT_TOOL_FILE;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("configuration file {} not found", .0.display())]
    FileNotFound(PathBuf),

    #[error("cannot use configuration file {}: {message}", .path.display())]
    Parse { path: PathBuf, message: String },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Default verbosity of the CLI; `-v` and `RUST_LOG` override it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Self::TRACE,
            LogLevel::Debug => Self::DEBUG,
            LogLevel::Info => Self::INFO,
            LogLevel::Warn => Self::WARN,
            LogLevel::Error => Self::ERROR,
        }
    }
}

/// Where the tool tree lives and how it is written back.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProjectConfig {
    /// Tree file used when the command line names none.
    pub tool_file: PathBuf,
    /// Indent JSON written back to disk.
    pub pretty: bool,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            tool_file: PathBuf::from(DEFAULT_TOOL_FILE),
            pretty: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolConfig {
    pub log_level: LogLevel,
    pub project: ProjectConfig,
}

impl ToolConfig {
    /// Read, parse and validate `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::FileNotFound(path.to_path_buf())
            } else {
                ConfigError::Parse {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                }
            }
        })?;
        let config = Self::from_toml(&text).map_err(|e| match e {
            ConfigError::Parse { message, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                message,
            },
            other => other,
        })?;
        Ok(config)
    }

    /// Parse and validate TOML text.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text).map_err(|e| ConfigError::Parse {
            path: PathBuf::new(),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.project.tool_file.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("project.tool_file is empty".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_gives_defaults() {
        let config = ToolConfig::from_toml("").unwrap();
        assert_eq!(config, ToolConfig::default());
        assert_eq!(config.log_level, LogLevel::Info);
        assert_eq!(config.project.tool_file, PathBuf::from(DEFAULT_TOOL_FILE));
        assert!(config.project.pretty);
    }

    #[test]
    fn log_levels_parse_lowercase() {
        for (text, level) in [
            ("trace", LogLevel::Trace),
            ("debug", LogLevel::Debug),
            ("warn", LogLevel::Warn),
            ("error", LogLevel::Error),
        ] {
            let config = ToolConfig::from_toml(&format!("log_level = \"{text}\"")).unwrap();
            assert_eq!(config.log_level, level);
        }
        assert!(ToolConfig::from_toml("log_level = \"loud\"").is_err());
        assert_eq!(tracing::Level::from(LogLevel::Warn), tracing::Level::WARN);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        for text in ["loglevel = \"info\"", "[project]\ntool = \"a.json\"\n"] {
            assert!(matches!(
                ToolConfig::from_toml(text),
                Err(ConfigError::Parse { .. })
            ));
        }
    }

    #[test]
    fn empty_tool_file_is_invalid() {
        assert!(matches!(
            ToolConfig::from_toml("[project]\ntool_file = \"\"\n"),
            Err(ConfigError::Invalid(_))
        ));
    }
}
