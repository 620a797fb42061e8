//! Layered error definitions
//!
//! Categorized by source: config / storage / dispatch / connectivity

use thiserror::Error;

/// Unified error type
#[derive(Debug, Error)]
pub enum CoreError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse { message: String },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Storage Errors =====
    /// Persistence failure; the in-memory view stays authoritative
    #[error("storage error at '{path}': {message}")]
    Storage { path: String, message: String },

    // ===== Dispatch Errors (scoped to one dispatcher attempt) =====
    /// Batch request contained no events
    #[error("batch request contained no events")]
    InvalidBatch,

    /// Dispatcher received a request before it finished initializing
    #[error("dispatcher '{dispatcher}' not initialized")]
    DestinationNotInitialized { dispatcher: String },

    /// Delivery endpoint returned a non-success status
    #[error("dispatcher '{dispatcher}' non-success response: {message}")]
    NonSuccessResponse { dispatcher: String, message: String },

    /// Delivery endpoint accepted the request but reported a payload error
    #[error("dispatcher '{dispatcher}' server reported error: {message}")]
    ServerReportedError { dispatcher: String, message: String },

    /// Nothing to deliver
    #[error("no data to send")]
    NoDataToSend,

    // ===== Connectivity Errors =====
    /// Connectivity check failed
    #[error("connectivity error: {message}")]
    ConnectivityError { message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl CoreError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create storage error
    pub fn storage(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Storage {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create non-success response error
    pub fn non_success(dispatcher: impl Into<String>, message: impl Into<String>) -> Self {
        Self::NonSuccessResponse {
            dispatcher: dispatcher.into(),
            message: message.into(),
        }
    }

    /// Create connectivity error
    pub fn connectivity(message: impl Into<String>) -> Self {
        Self::ConnectivityError {
            message: message.into(),
        }
    }

    /// Classification reported through dispatch completion callbacks.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::InvalidBatch => Some(ErrorKind::InvalidBatch),
            Self::DestinationNotInitialized { .. } => Some(ErrorKind::DestinationNotInitialized),
            Self::NonSuccessResponse { .. } => Some(ErrorKind::NonSuccessResponse),
            Self::ServerReportedError { .. } => Some(ErrorKind::ServerReportedError),
            Self::NoDataToSend => Some(ErrorKind::NoDataToSend),
            Self::ConnectivityError { .. } => Some(ErrorKind::ConnectivityError),
            _ => None,
        }
    }
}

/// Error classes scoped to a single dispatcher attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidBatch,
    DestinationNotInitialized,
    NonSuccessResponse,
    ServerReportedError,
    NoDataToSend,
    ConnectivityError,
}
