//! Custom error types for the application.
//!
//! This module defines the primary error type, `ScopeError`, for the entire
//! application. Using the `thiserror` crate, it provides a centralized and
//! consistent way to handle the ways a run can fail, from an unreadable run
//! counter to a garbled instrument response.
//!
//! Every variant is terminal for the run: the controller fails fast rather
//! than continuing against an instrument whose state it can no longer trust.
//! The status file is left at whatever value was last successfully published.

use std::path::PathBuf;

use thiserror::Error;

use crate::status::RunStatus;

/// Convenience alias for results using the application error type.
pub type AppResult<T> = std::result::Result<T, ScopeError>;

/// All failure modes of a capture run.
#[derive(Error, Debug)]
pub enum ScopeError {
    /// The shared run-counter file is missing, unreadable, or not an integer.
    /// Raised before any instrument contact.
    #[error("run counter unavailable at {path}: {detail}")]
    CounterUnavailable {
        /// Location of the counter file.
        path: PathBuf,
        /// What went wrong reading or parsing it.
        detail: String,
    },

    /// A session send or query failed at the protocol layer.
    #[error("transport failure during '{command}': {source}")]
    Transport {
        /// The command or query being exchanged when the link failed.
        command: String,
        /// Underlying I/O failure.
        source: std::io::Error,
    },

    /// An instrument response did not parse as the expected type.
    #[error("malformed response to '{query}': '{response}'")]
    Protocol {
        /// The query whose response was garbled.
        query: String,
        /// The raw response as received.
        response: String,
    },

    /// A per-channel save never acknowledged completion. Aborts the export
    /// without attempting subsequent channels.
    #[error("export of channel {channel} failed: {detail}")]
    Export {
        /// Channel whose save failed.
        channel: u8,
        /// Failure description.
        detail: String,
    },

    /// The run status file could not be written. Status visibility is a hard
    /// requirement for external consumers.
    #[error("status write to {path} failed: {source}")]
    Status {
        /// Location of the status file.
        path: PathBuf,
        /// Underlying I/O failure.
        source: std::io::Error,
    },

    /// An attempt to move the run status backwards or repeat it.
    #[error("status regression: {from} -> {to}")]
    StatusRegression {
        /// Last successfully published status.
        from: RunStatus,
        /// The rejected status.
        to: RunStatus,
    },

    /// Settings file parsing or merging error.
    #[error("configuration error: {0}")]
    Config(#[from] figment::Error),

    /// Semantic errors in run parameters that parse but are logically
    /// invalid (e.g. a non-positive event count).
    #[error("configuration validation error: {0}")]
    Configuration(String),

    /// Filesystem errors outside the counter/status paths (e.g. logbook).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
