//! Binding error types

use crate::handle::Handle;
use thiserror::Error;

/// Errors surfaced by wrapper operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The wrapper has been disposed, or never received a handle
    #[error("Cannot access a disposed object: {0}")]
    ObjectDisposed(&'static str),

    /// A native create call returned a null handle
    #[error("Unable to create a new {0} instance.")]
    CreateFailed(&'static str),

    /// A required argument was absent
    #[error("Value cannot be null: {0}")]
    NullArgument(&'static str),

    /// An argument was rejected before reaching native code
    #[error("Invalid argument `{name}`: {reason}")]
    InvalidArgument { name: &'static str, reason: String },

    /// The call is not valid in the object's current state
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// A handle is already wrapped by a proxy of another type
    #[error("Handle {handle} is registered as {actual}, not {expected}")]
    TypeMismatch {
        handle: Handle,
        expected: &'static str,
        actual: &'static str,
    },
}

impl Error {
    pub fn invalid_argument(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            name,
            reason: reason.into(),
        }
    }
}

/// Result type for binding operations
pub type Result<T> = std::result::Result<T, Error>;

/// Configuration loading errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to parse binding configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize binding configuration: {0}")]
    Serialize(#[from] toml::ser::Error),
}
