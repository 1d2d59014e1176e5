//! Error types for the InsightX tracker.
//!
//! Each module owns a focused error enum. [`TrackerError`] gathers them for
//! callers that drive the pipeline from the outside (the binary, replay
//! harnesses). Nothing inside the tracking pipeline returns these to a
//! tracker or the shell: emission failures are logged and dropped.

use thiserror::Error;

use crate::config::ConfigError;
use crate::replay::ReplayError;
use crate::session::StorageError;
use crate::transport::TransportError;

/// Errors that can occur while setting up or driving the tracker.
///
/// # Examples
///
/// ```
/// use insightx_tracker::error::{Result, TrackerError};
///
/// fn parse_meta(raw: &str) -> Result<serde_json::Value> {
///     Ok(serde_json::from_str(raw)?)
/// }
///
/// assert!(matches!(parse_meta("{"), Err(TrackerError::Json(_))));
/// ```
#[derive(Error, Debug)]
pub enum TrackerError {
    /// Configuration-related error.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Persisted session slot could not be read or written.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Transport could not be built or a delivery failed.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Replay script could not be loaded.
    #[error("replay error: {0}")]
    Replay(#[from] ReplayError),

    /// File system I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing or serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A specialized `Result` type for tracker operations.
pub type Result<T> = std::result::Result<T, TrackerError>;
