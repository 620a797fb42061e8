//! Config validation module
//!
//! Validation rules:
//! - account / profile / environment non-empty
//! - batch_size >= 1 when supplied
//! - batch_expiration_days >= 1 when supplied
//! - bypass event names non-empty
//! - seconds_between_track_events > 0 when supplied

use contracts::CoreError;

use crate::parser::SdkFileConfig;

/// Validate a parsed configuration document.
///
/// Returns the first violation encountered, or Ok(()).
pub fn validate(config: &SdkFileConfig) -> Result<(), CoreError> {
    validate_account(config)?;
    validate_dispatch(config)?;
    validate_session(config)?;
    Ok(())
}

fn validate_account(config: &SdkFileConfig) -> Result<(), CoreError> {
    for (field, value) in [
        ("account.account", &config.account.account),
        ("account.profile", &config.account.profile),
        ("account.environment", &config.account.environment),
    ] {
        if value.trim().is_empty() {
            return Err(CoreError::config_validation(field, "must not be empty"));
        }
    }
    Ok(())
}

fn validate_dispatch(config: &SdkFileConfig) -> Result<(), CoreError> {
    if let Some(batch_size) = config.dispatch.batch_size {
        if batch_size < 1 {
            return Err(CoreError::config_validation(
                "dispatch.batch_size",
                "must be >= 1",
            ));
        }
    }
    if let Some(days) = config.dispatch.batch_expiration_days {
        if days < 1 {
            return Err(CoreError::config_validation(
                "dispatch.batch_expiration_days",
                format!("must be >= 1, got {days}"),
            ));
        }
    }
    for name in &config.dispatch.batching_bypass_events {
        if name.trim().is_empty() {
            return Err(CoreError::config_validation(
                "dispatch.batching_bypass_events",
                "event names must not be empty",
            ));
        }
    }
    Ok(())
}

fn validate_session(config: &SdkFileConfig) -> Result<(), CoreError> {
    if let Some(seconds) = config.session.seconds_between_track_events {
        if seconds == 0 {
            return Err(CoreError::config_validation(
                "session.seconds_between_track_events",
                "must be > 0",
            ));
        }
    }
    Ok(())
}
