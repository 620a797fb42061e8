//! Config parsing module
//!
//! Supports TOML (primary) and JSON (optional) formats.

use serde::{Deserialize, Serialize};

use contracts::{CoreError, SdkConfig};

/// Config file format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// TOML format (recommended)
    Toml,
    /// JSON format
    Json,
}

impl ConfigFormat {
    /// Infer format from a file extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// On-disk configuration document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SdkFileConfig {
    pub account: AccountSection,
    #[serde(default)]
    pub dispatch: DispatchSection,
    #[serde(default)]
    pub session: SessionSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountSection {
    pub account: String,
    pub profile: String,
    pub environment: String,
    #[serde(default)]
    pub datasource: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DispatchSection {
    #[serde(default)]
    pub max_queue_size: Option<i64>,
    #[serde(default)]
    pub batch_size: Option<usize>,
    #[serde(default)]
    pub events_before_auto_dispatch: Option<usize>,
    #[serde(default)]
    pub batching_enabled: Option<bool>,
    #[serde(default)]
    pub batching_bypass_events: Vec<String>,
    #[serde(default)]
    pub batch_expiration_days: Option<i64>,
    #[serde(default)]
    pub battery_saver_enabled: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionSection {
    #[serde(default)]
    pub seconds_between_track_events: Option<u64>,
    #[serde(default)]
    pub tag_management_enabled: Option<bool>,
}

/// Logging preferences for the composition root; not consumed by the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSection {
    #[serde(default = "default_log_format")]
    pub format: String,
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub metrics_port: Option<u16>,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            format: default_log_format(),
            level: default_log_level(),
            metrics_port: None,
        }
    }
}

fn default_log_format() -> String {
    "json".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl SdkFileConfig {
    /// Flatten the sectioned document into the core config.
    pub fn into_sdk_config(self) -> SdkConfig {
        let mut config = SdkConfig::new(
            self.account.account,
            self.account.profile,
            self.account.environment,
        );
        config.datasource = self.account.datasource;
        config.max_queue_size = self.dispatch.max_queue_size;
        if let Some(batch_size) = self.dispatch.batch_size {
            config.batch_size = batch_size;
        }
        if let Some(events) = self.dispatch.events_before_auto_dispatch {
            config.events_before_auto_dispatch = events;
        }
        if let Some(enabled) = self.dispatch.batching_enabled {
            config.batching_enabled = enabled;
        }
        config.batching_bypass_events = self.dispatch.batching_bypass_events;
        if let Some(days) = self.dispatch.batch_expiration_days {
            config.batch_expiration_days = days;
        }
        if let Some(enabled) = self.dispatch.battery_saver_enabled {
            config.battery_saver_enabled = enabled;
        }
        if let Some(seconds) = self.session.seconds_between_track_events {
            config.seconds_between_track_events = seconds;
        }
        if let Some(enabled) = self.session.tag_management_enabled {
            config.tag_management_enabled = enabled;
        }
        config
    }
}

/// Parse TOML configuration
pub fn parse_toml(content: &str) -> Result<SdkFileConfig, CoreError> {
    toml::from_str(content).map_err(|e| CoreError::config_parse(format!("TOML parse error: {e}")))
}

/// Parse JSON configuration
pub fn parse_json(content: &str) -> Result<SdkFileConfig, CoreError> {
    serde_json::from_str(content)
        .map_err(|e| CoreError::config_parse(format!("JSON parse error: {e}")))
}

/// Parse configuration for the given format
pub fn parse(content: &str, format: ConfigFormat) -> Result<SdkFileConfig, CoreError> {
    match format {
        ConfigFormat::Toml => parse_toml(content),
        ConfigFormat::Json => parse_json(content),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL_TOML: &str = r#"
[account]
account = "acme"
profile = "main"
environment = "dev"
"#;

    #[test]
    fn test_parse_toml_minimal() {
        let file = parse_toml(MINIMAL_TOML).unwrap();
        assert_eq!(file.account.account, "acme");
        let config = file.into_sdk_config();
        assert!(config.batching_enabled);
        assert_eq!(config.batch_size, contracts::defaults::BATCH_SIZE);
    }

    #[test]
    fn test_dispatch_overrides_applied() {
        let content = r#"
[account]
account = "acme"
profile = "main"
environment = "prod"

[dispatch]
max_queue_size = 40
batch_size = 5
batching_enabled = false
batching_bypass_events = ["checkout"]

[session]
tag_management_enabled = true
"#;
        let config = parse_toml(content).unwrap().into_sdk_config();
        assert_eq!(config.max_queue_size, Some(40));
        assert_eq!(config.batch_size, 5);
        assert!(!config.batching_enabled);
        assert_eq!(config.batching_bypass_events, ["checkout"]);
        assert!(config.tag_management_enabled);
    }

    #[test]
    fn test_format_detection() {
        assert_eq!(ConfigFormat::from_extension("toml"), Some(ConfigFormat::Toml));
        assert_eq!(ConfigFormat::from_extension("JSON"), Some(ConfigFormat::Json));
        assert_eq!(ConfigFormat::from_extension("yaml"), None);
    }
}
