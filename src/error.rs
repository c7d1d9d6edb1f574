//! Engine error types

use asus_smc_platform::{PlatformError, ValueType};
use thiserror::Error;

/// Errors surfaced by the engine handle and the key registry
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SmcError {
    /// Collaborator failure
    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),

    /// The engine loop has shut down
    #[error("Engine stopped")]
    EngineStopped,

    /// No registry key with this name
    #[error("Unknown key: {0:?}")]
    UnknownKey(String),

    /// Key exists but is not writable
    #[error("Key {0:?} is read-only")]
    ReadOnlyKey(String),

    /// Computed key with no write path
    #[error("Key {0:?} has no setter")]
    NoSetter(String),

    /// Written value doesn't match the key's type
    #[error("Key {key:?} expects {expected}, got {actual}")]
    TypeMismatch {
        key: String,
        expected: &'static str,
        actual: &'static str,
    },

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl SmcError {
    pub(crate) fn type_mismatch(key: &str, expected: ValueType, actual: ValueType) -> Self {
        SmcError::TypeMismatch {
            key: key.to_string(),
            expected: expected.name(),
            actual: actual.name(),
        }
    }
}
