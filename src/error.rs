//! Error types and handling for the charge controller
//!
//! Protocol faults reported by the station or the BMS are not errors; they
//! are state transitions of the charging session. The types here cover the
//! I/O boundaries only: bus transceivers, signal lines, configuration files
//! and logging setup.

use thiserror::Error;

/// Result type alias for controller operations
pub type Result<T> = std::result::Result<T, ChademoError>;

/// Main error type for the charge controller
#[derive(Debug, Error)]
pub enum ChademoError {
    /// Configuration-related errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Validation errors
    #[error("Validation error: {field} - {message}")]
    Validation { field: String, message: String },

    /// File I/O errors
    #[error("I/O error: {message}")]
    Io { message: String },

    /// Serialization/deserialization errors
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// Bus transceiver errors (send/receive of frames)
    #[error("Bus error: {message}")]
    Bus { message: String },

    /// Digital signal line errors
    #[error("Signal error: {message}")]
    Signal { message: String },

    /// Frame encode/decode errors
    #[error("Codec error: frame 0x{id:03X} - {message}")]
    Codec { id: u32, message: String },
}

impl ChademoError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        ChademoError::Config {
            message: message.into(),
        }
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(field: S, message: S) -> Self {
        ChademoError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a new I/O error
    pub fn io<S: Into<String>>(message: S) -> Self {
        ChademoError::Io {
            message: message.into(),
        }
    }

    /// Create a new bus error
    pub fn bus<S: Into<String>>(message: S) -> Self {
        ChademoError::Bus {
            message: message.into(),
        }
    }

    /// Create a new signal line error
    pub fn signal<S: Into<String>>(message: S) -> Self {
        ChademoError::Signal {
            message: message.into(),
        }
    }

    /// Create a new codec error for the given frame id
    pub fn codec<S: Into<String>>(id: u32, message: S) -> Self {
        ChademoError::Codec {
            id,
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for ChademoError {
    fn from(err: std::io::Error) -> Self {
        ChademoError::io(err.to_string())
    }
}

impl From<serde_yaml::Error> for ChademoError {
    fn from(err: serde_yaml::Error) -> Self {
        ChademoError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for ChademoError {
    fn from(err: serde_json::Error) -> Self {
        ChademoError::Serialization {
            message: err.to_string(),
        }
    }
}
