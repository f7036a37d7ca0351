//! Configuration loading traits and types.
//!
//! This module provides a standardized way to load TOML configuration files
//! and the error type used for malformed caller input.
//!
//! # Usage
//!
//! ```rust,no_run
//! use s626_common::config::{ConfigLoader, SharedConfig, ConfigError};
//! use serde::Deserialize;
//! use std::path::Path;
//!
//! #[derive(Debug, Deserialize)]
//! struct MyAppConfig {
//!     shared: SharedConfig,
//!     port: u16,
//! }
//!
//! fn main() -> Result<(), ConfigError> {
//!     let config = MyAppConfig::load(Path::new("config.toml"))?;
//!     println!("Service: {}", config.shared.service_name);
//!     Ok(())
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Error type for configuration loading and caller input validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Configuration file not found at specified path.
    #[error("Configuration file not found")]
    FileNotFound,

    /// TOML parsing failed.
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// Semantic validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationError(String),

    /// A channel, bank or encoder index outside the board's range.
    #[error("{kind} index {index} out of range (0..{count})")]
    ChannelOutOfRange {
        /// Channel family ("DIO bank", "ADC", ...).
        kind: &'static str,
        /// Index supplied by the caller.
        index: usize,
        /// Number of channels of that family.
        count: usize,
    },

    /// A bulk initializer with the wrong number of elements.
    #[error("initializer needs {expected} values, got {actual}")]
    InitializerLength {
        /// Required element count.
        expected: usize,
        /// Supplied element count.
        actual: usize,
    },

    /// A port batch shorter than its selector requires.
    #[error("{port} batch needs {expected} values, got {actual}")]
    BatchLength {
        /// Port the batch arrived on.
        port: &'static str,
        /// Element count implied by the selector.
        expected: usize,
        /// Supplied element count.
        actual: usize,
    },
}

/// Log level for application logging.
///
/// Uses lowercase serde values for TOML compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Most verbose, detailed tracing information.
    Trace,
    /// Debug information useful during development.
    Debug,
    /// General information about application operation.
    #[default]
    Info,
    /// Warning messages for potentially problematic situations.
    Warn,
    /// Error messages for serious problems.
    Error,
}

impl LogLevel {
    /// Directive string understood by `tracing_subscriber::EnvFilter`.
    pub const fn as_directive(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Common configuration fields shared across applications.
///
/// # TOML Example
///
/// ```toml
/// [shared]
/// log_level = "debug"
/// service_name = "s626-bench-01"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharedConfig {
    /// Logging verbosity level.
    #[serde(default)]
    pub log_level: LogLevel,

    /// Application instance identifier.
    pub service_name: String,
}

impl Default for SharedConfig {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            service_name: "s626".to_string(),
        }
    }
}

impl SharedConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if `service_name` is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service_name.is_empty() {
            return Err(ConfigError::ValidationError(
                "service_name cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Trait for loading configuration from TOML files.
///
/// # Contract
///
/// - Returns `ConfigError::FileNotFound` if the file does not exist
/// - Returns `ConfigError::ParseError` if TOML syntax is invalid
pub trait ConfigLoader: Sized + serde::de::DeserializeOwned {
    /// Load configuration from a TOML file.
    fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::FileNotFound
            } else {
                ConfigError::ParseError(e.to_string())
            }
        })?;

        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}

// Blanket implementation: any serde-deserializable struct can be loaded.
impl<T: serde::de::DeserializeOwned> ConfigLoader for T {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_log_level_default() {
        assert_eq!(LogLevel::default(), LogLevel::Info);
    }

    #[test]
    fn test_log_level_deserialization() {
        #[derive(Debug, Deserialize, PartialEq)]
        struct TestWrapper {
            level: LogLevel,
        }

        for (text, level) in [
            ("trace", LogLevel::Trace),
            ("debug", LogLevel::Debug),
            ("info", LogLevel::Info),
            ("warn", LogLevel::Warn),
            ("error", LogLevel::Error),
        ] {
            let parsed = toml::from_str::<TestWrapper>(&format!("level = \"{text}\""))
                .unwrap()
                .level;
            assert_eq!(parsed, level);
            assert_eq!(level.as_directive(), text);
        }
    }

    #[test]
    fn test_shared_config_validation_empty_service_name() {
        let config = SharedConfig {
            log_level: LogLevel::Info,
            service_name: "".to_string(),
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));
        assert!(SharedConfig::default().validate().is_ok());
    }

    #[test]
    fn test_config_loader_file_not_found() {
        #[allow(dead_code)]
        #[derive(Debug, Deserialize)]
        struct TestConfig {
            value: String,
        }

        let result = TestConfig::load(Path::new("/nonexistent/path/s626.toml"));
        assert!(matches!(result, Err(ConfigError::FileNotFound)));
    }

    #[test]
    fn test_config_loader_parse_error() {
        #[allow(dead_code)]
        #[derive(Debug, Deserialize)]
        struct TestConfig {
            value: String,
        }

        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "invalid toml {{{{").unwrap();

        let result = TestConfig::load(file.path());
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_config_loader_success() {
        #[derive(Debug, Deserialize)]
        struct TestConfig {
            shared: SharedConfig,
            port: u16,
        }

        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"port = 8080

[shared]
log_level = "debug"
service_name = "test-service"
"#
        )
        .unwrap();
        file.flush().unwrap();

        let config = TestConfig::load(file.path()).unwrap();
        assert_eq!(config.shared.log_level, LogLevel::Debug);
        assert_eq!(config.shared.service_name, "test-service");
        assert_eq!(config.port, 8080);
    }

    #[test]
    fn test_channel_error_display() {
        let err = ConfigError::ChannelOutOfRange {
            kind: "ADC",
            index: 16,
            count: 16,
        };
        assert_eq!(err.to_string(), "ADC index 16 out of range (0..16)");

        let err = ConfigError::InitializerLength {
            expected: 6,
            actual: 4,
        };
        assert!(err.to_string().contains("6"));
    }
}
