//! # Config Loader
//!
//! Configuration loading and parsing module.
//!
//! Responsibilities:
//! - Parse TOML/JSON configuration files
//! - Validate configuration legality
//! - Produce `SdkConfig`
//!
//! # Example
//!
//! ```no_run
//! use config_loader::ConfigLoader;
//! use std::path::Path;
//!
//! let file = ConfigLoader::load_from_path(Path::new("config.toml")).unwrap();
//! let config = file.into_sdk_config();
//! println!("Account: {}", config.account);
//! ```

mod parser;
mod validator;

pub use parser::{
    AccountSection, ConfigFormat, DispatchSection, LoggingSection, SdkFileConfig, SessionSection,
};

use contracts::CoreError;
use std::path::Path;

/// Configuration loader
///
/// Provides static methods to load configuration from files or strings.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from file path
    ///
    /// Automatically detects format from file extension (.toml / .json).
    ///
    /// # Errors
    /// - File read failure
    /// - Unsupported format
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_path(path: &Path) -> Result<SdkFileConfig, CoreError> {
        let format = Self::detect_format(path)?;
        let content = Self::read_file(path)?;
        Self::load_from_str(&content, format)
    }

    /// Load configuration from string
    ///
    /// # Errors
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_str(content: &str, format: ConfigFormat) -> Result<SdkFileConfig, CoreError> {
        Self::parse_and_validate(content, format)
    }

    /// Serialize a config document to a TOML string
    pub fn to_toml(config: &SdkFileConfig) -> Result<String, CoreError> {
        toml::to_string_pretty(config)
            .map_err(|e| CoreError::config_parse(format!("TOML serialize error: {e}")))
    }

    /// Serialize a config document to a JSON string
    pub fn to_json(config: &SdkFileConfig) -> Result<String, CoreError> {
        serde_json::to_string_pretty(config)
            .map_err(|e| CoreError::config_parse(format!("JSON serialize error: {e}")))
    }
}

impl ConfigLoader {
    /// Infer configuration format from file extension
    fn detect_format(path: &Path) -> Result<ConfigFormat, CoreError> {
        let ext = path.extension().and_then(|e| e.to_str()).ok_or_else(|| {
            CoreError::config_parse("cannot determine file format from extension")
        })?;

        ConfigFormat::from_extension(ext)
            .ok_or_else(|| CoreError::config_parse(format!("unsupported config format: .{ext}")))
    }

    /// Read configuration file content
    fn read_file(path: &Path) -> Result<String, CoreError> {
        Ok(std::fs::read_to_string(path)?)
    }

    /// Parse and validate configuration content
    fn parse_and_validate(content: &str, format: ConfigFormat) -> Result<SdkFileConfig, CoreError> {
        let config = parser::parse(content, format)?;
        validator::validate(&config)?;
        Ok(config)
    }
}
