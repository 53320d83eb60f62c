use std::fmt;
use thiserror::Error;
use tutorslot_config::ConfigLoadError;

/// Process exit codes used by the command-line surface.
pub mod exit_code {
    pub const SUCCESS: i32 = 0;
    pub const USAGE: i32 = 2;
    pub const NOT_FOUND: i32 = 3;
    pub const REJECTED: i32 = 4;
    pub const REMOTE: i32 = 5;
    pub const CONFIG: i32 = 6;
}

/// Errors raised outside the booking state machine: setup, usage and glue.
#[derive(Error, Debug)]
pub enum TutorslotError {
    /// Missing or invalid configuration
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Bad command-line input
    #[error("Usage error: {0}")]
    UsageError(String),

    /// Failure talking to an external service outside a slot transition
    #[error("External service error: {service_name} - {message}")]
    ExternalServiceError {
        service_name: String,
        message: String,
    },
}

/// A trait for converting errors to process exit codes.
///
/// Implemented by every error type that can reach `main`, so the CLI maps them
/// consistently.
pub trait ExitStatus {
    /// Returns the process exit code for this error. Never zero.
    fn exit_code(&self) -> i32;
}

impl ExitStatus for TutorslotError {
    fn exit_code(&self) -> i32 {
        match self {
            TutorslotError::ConfigError(_) => exit_code::CONFIG,
            TutorslotError::UsageError(_) => exit_code::USAGE,
            TutorslotError::ExternalServiceError { .. } => exit_code::REMOTE,
        }
    }
}

impl From<ConfigLoadError> for TutorslotError {
    fn from(err: ConfigLoadError) -> Self {
        TutorslotError::ConfigError(err.to_string())
    }
}

// Utility functions for error handling
pub fn config_error<T: fmt::Display>(message: T) -> TutorslotError {
    TutorslotError::ConfigError(message.to_string())
}

pub fn usage_error<T: fmt::Display>(message: T) -> TutorslotError {
    TutorslotError::UsageError(message.to_string())
}

pub fn external_service_error<T: fmt::Display>(service_name: &str, message: T) -> TutorslotError {
    TutorslotError::ExternalServiceError {
        service_name: service_name.to_string(),
        message: message.to_string(),
    }
}
