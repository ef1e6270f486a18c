//! Error types for core module
//!
//! Covers command-line and environment configuration of the client.

use shared::ProtocolError;
use thiserror::Error;

/// Errors that can occur while configuring a client
#[derive(Error, Debug)]
pub enum CoreError {
    /// Missing or contradictory configuration
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// A setting that could not be parsed
    #[error("Invalid value {value:?} for {name}")]
    InvalidSetting { name: &'static str, value: String },

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// Result type alias for core operations
pub type CoreResult<T> = Result<T, CoreError>;
