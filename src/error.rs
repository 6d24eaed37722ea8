//! Error types for the sniffer
//!
//! Two layers are kept apart on purpose:
//! - [`SnifferError`] covers everything that can stop the process or a
//!   snapshot write (source open/read failures, configuration, file I/O).
//! - [`FrameError`] covers benign, per-frame rejections. These never leave
//!   the processing loop; they are counted and logged.

use std::path::Path;

use thiserror::Error;

/// Result type alias for sniffer operations.
pub type SnifferResult<T> = std::result::Result<T, SnifferError>;

/// Errors surfaced by the sniffer outside of frame processing.
#[derive(Error, Debug)]
pub enum SnifferError {
    /// General I/O error (reading the byte source, pidfile, replay file)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serial port could not be opened or configured
    #[error("Serial port error: {0}")]
    Serial(#[from] tokio_serial::Error),

    /// Invalid command line or runtime configuration
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the problem
        message: String,
    },

    /// Snapshot file could not be created, written or renamed
    #[error("Snapshot error ({path}): {message}")]
    Snapshot {
        /// Destination path of the snapshot
        path: String,
        /// Underlying failure
        message: String,
    },

    /// Snapshot serialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SnifferError {
    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        SnifferError::Configuration {
            message: message.into(),
        }
    }

    /// Create a snapshot error for `path`
    pub fn snapshot(path: &Path, message: impl std::fmt::Display) -> Self {
        SnifferError::Snapshot {
            path: path.display().to_string(),
            message: message.to_string(),
        }
    }

    /// Whether a read loop may simply retry after this error
    pub fn is_retryable(&self) -> bool {
        matches!(self, SnifferError::Io(e) if e.kind() == std::io::ErrorKind::Interrupted)
    }
}

/// Reasons a candidate frame is dropped.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    /// Stored CRC does not match the computed one
    #[error("CRC mismatch: computed {expected:#06x}, frame carries {actual:#06x}")]
    CrcMismatch {
        /// CRC computed over the frame body
        expected: u16,
        /// CRC carried in the frame trailer
        actual: u16,
    },

    /// Slave ID outside the accepted battery range
    #[error("Slave ID {0} outside accepted range")]
    InvalidSlaveId(u8),
}
