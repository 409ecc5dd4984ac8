//! Externally observable run status.
//!
//! External monitors watch a single shared file for one of three tokens:
//! `busy` while the acquisition is in flight, `writing` while captured
//! segments are exported, `ready` once the run is over. Within a run the
//! sequence is strictly `busy -> writing -> ready` and never reverses.
//!
//! [`StatusPublisher`] owns the file. Other components request transitions
//! through it and never write the file directly; the publisher rejects any
//! transition that would repeat or reverse the order.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{AppResult, ScopeError};

/// Lifecycle token of the current run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RunStatus {
    /// Acquisition armed or in progress.
    Busy,
    /// Acquisition finished; segment export in progress.
    Writing,
    /// Run over; data (if saved) is on disk.
    Ready,
}

impl RunStatus {
    /// The literal token external monitors look for.
    pub fn token(&self) -> &'static str {
        match self {
            RunStatus::Busy => "busy",
            RunStatus::Writing => "writing",
            RunStatus::Ready => "ready",
        }
    }

    /// File record for this status. The non-initial transitions carry a
    /// trailing newline; `busy` does not.
    fn record(&self) -> String {
        match self {
            RunStatus::Busy => self.token().to_string(),
            RunStatus::Writing | RunStatus::Ready => format!("{}\n", self.token()),
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// Sole writer of the shared status file.
pub struct StatusPublisher {
    path: PathBuf,
    published: Vec<RunStatus>,
}

impl StatusPublisher {
    /// Create a publisher for the given status file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            published: Vec::new(),
        }
    }

    /// Persist a status transition, truncating any prior content. Fails on
    /// a repeated or reversed transition, and on any write error: status
    /// visibility must not be silently dropped.
    pub fn publish(&mut self, status: RunStatus) -> AppResult<()> {
        if let Some(&last) = self.published.last() {
            if status <= last {
                return Err(ScopeError::StatusRegression {
                    from: last,
                    to: status,
                });
            }
        }
        fs::write(&self.path, status.record()).map_err(|source| ScopeError::Status {
            path: self.path.clone(),
            source,
        })?;
        info!(status = %status, "run status published");
        self.published.push(status);
        Ok(())
    }

    /// Transitions published so far, in order.
    pub fn history(&self) -> &[RunStatus] {
        &self.published
    }

    /// Location of the status file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}
