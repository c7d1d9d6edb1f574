//! Platform error types

use thiserror::Error;

/// Errors reported by platform collaborators
///
/// `Unsupported` is the "capability absent" status: the engine disables the
/// feature instead of treating it as a failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlatformError {
    // Firmware
    #[error("Method not supported: {0}")]
    Unsupported(String),

    #[error("Method {method} failed with status 0x{status:08X}")]
    Status { method: String, status: u32 },

    #[error("Unexpected firmware value from {method}: {detail}")]
    InvalidValue { method: String, detail: String },

    // Transport-level
    #[error("I/O error: {0}")]
    Io(String),

    #[error("Operation timed out")]
    Timeout,

    #[error("Collaborator unavailable: {0}")]
    Unavailable(String),

    // Storage
    #[error("Storage error: {0}")]
    Storage(String),
}

impl PlatformError {
    /// True when the error means the capability is absent rather than broken
    pub fn is_unsupported(&self) -> bool {
        matches!(self, PlatformError::Unsupported(_))
    }
}

impl From<std::io::Error> for PlatformError {
    fn from(e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::TimedOut => PlatformError::Timeout,
            std::io::ErrorKind::NotFound => PlatformError::Unavailable(e.to_string()),
            _ => PlatformError::Io(e.to_string()),
        }
    }
}

impl From<sled::Error> for PlatformError {
    fn from(e: sled::Error) -> Self {
        PlatformError::Storage(e.to_string())
    }
}
