//! Error types and handling for pvbridge
//!
//! This module defines the error types used throughout the application,
//! providing consistent error handling and reporting.

use thiserror::Error;

/// Result type alias for pvbridge operations
pub type Result<T> = std::result::Result<T, PvBridgeError>;

/// Main error type for pvbridge
#[derive(Debug, Error)]
pub enum PvBridgeError {
    /// Configuration-related errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// HTTP/Web server errors
    #[error("Web server error: {message}")]
    Web { message: String },

    /// Serialization/deserialization errors
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// File I/O errors
    #[error("I/O error: {message}")]
    Io { message: String },

    /// Network-related errors (device unreachable, connection refused)
    #[error("Network error: {message}")]
    Network { message: String },

    /// Remote API answered with an error status (PVOutput, Open-Meteo, meters)
    #[error("API error: {message}")]
    Api { message: String },

    /// Validation errors, including malformed upstream responses
    #[error("Validation error: {field} - {message}")]
    Validation { field: String, message: String },

    /// Timeout errors
    #[error("Timeout error: {message}")]
    Timeout { message: String },
}

impl PvBridgeError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        PvBridgeError::Config {
            message: message.into(),
        }
    }

    /// Create a new web error
    pub fn web<S: Into<String>>(message: S) -> Self {
        PvBridgeError::Web {
            message: message.into(),
        }
    }

    /// Create a new validation error
    pub fn validation<F: Into<String>, S: Into<String>>(field: F, message: S) -> Self {
        PvBridgeError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a new I/O error
    pub fn io<S: Into<String>>(message: S) -> Self {
        PvBridgeError::Io {
            message: message.into(),
        }
    }

    /// Create a new network error
    pub fn network<S: Into<String>>(message: S) -> Self {
        PvBridgeError::Network {
            message: message.into(),
        }
    }

    /// Create a new API error
    pub fn api<S: Into<String>>(message: S) -> Self {
        PvBridgeError::Api {
            message: message.into(),
        }
    }

    /// Create a new timeout error
    pub fn timeout<S: Into<String>>(message: S) -> Self {
        PvBridgeError::Timeout {
            message: message.into(),
        }
    }

    /// Whether this error came from bad caller or upstream data rather than transport
    pub fn is_validation(&self) -> bool {
        matches!(self, PvBridgeError::Validation { .. })
    }
}

impl From<std::io::Error> for PvBridgeError {
    fn from(err: std::io::Error) -> Self {
        PvBridgeError::io(err.to_string())
    }
}

impl From<serde_yaml::Error> for PvBridgeError {
    fn from(err: serde_yaml::Error) -> Self {
        PvBridgeError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for PvBridgeError {
    fn from(err: serde_json::Error) -> Self {
        PvBridgeError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<reqwest::Error> for PvBridgeError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            PvBridgeError::timeout(err.to_string())
        } else if err.is_status() {
            PvBridgeError::api(err.to_string())
        } else if err.is_decode() {
            PvBridgeError::Serialization {
                message: err.to_string(),
            }
        } else {
            PvBridgeError::network(err.to_string())
        }
    }
}
