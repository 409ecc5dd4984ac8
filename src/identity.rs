//! Run identification.
//!
//! Every invocation controls exactly one run, identified by an integer run
//! number. The number comes either from an explicit operator override or
//! from a shared counter file maintained by the run-coordination side. The
//! counter is only ever read here; advancing it for the next run is owned
//! externally, so two back-to-back invocations without an override will see
//! the same number unless something else bumps the file.
//!
//! The run number is resolved exactly once, before any instrument contact,
//! and never re-resolved mid-run.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

use crate::error::{AppResult, ScopeError};

/// Resolves the run number for the current invocation.
pub struct RunIdentifier {
    counter_path: PathBuf,
}

impl RunIdentifier {
    /// Create an identifier backed by the shared counter file.
    pub fn new(counter_path: impl Into<PathBuf>) -> Self {
        Self {
            counter_path: counter_path.into(),
        }
    }

    /// Resolve the run number. A non-negative `explicit` value is returned
    /// verbatim (the caller owns uniqueness); a negative value or `None`
    /// reads the shared counter.
    pub fn resolve(&self, explicit: Option<i64>) -> AppResult<u32> {
        if let Some(number) = explicit {
            if number >= 0 {
                return u32::try_from(number).map_err(|_| {
                    ScopeError::Configuration(format!("run number override {number} out of range"))
                });
            }
        }
        let raw = fs::read_to_string(&self.counter_path).map_err(|err| {
            ScopeError::CounterUnavailable {
                path: self.counter_path.clone(),
                detail: err.to_string(),
            }
        })?;
        raw.trim()
            .parse::<u32>()
            .map_err(|_| ScopeError::CounterUnavailable {
                path: self.counter_path.clone(),
                detail: format!("counter is not a non-negative integer: '{}'", raw.trim()),
            })
    }

    /// Location of the counter file.
    pub fn counter_path(&self) -> &Path {
        &self.counter_path
    }
}

/// The resolved identity of one run: its number and when it was initiated.
/// Created once per invocation, immutable thereafter.
#[derive(Debug, Clone)]
pub struct RunIdentity {
    /// Resolved run number.
    pub number: u32,
    /// Wall-clock time at which the run was initiated.
    pub started_at: DateTime<Local>,
}

impl RunIdentity {
    /// Resolve the run number and stamp the start time.
    pub fn resolve(identifier: &RunIdentifier, explicit: Option<i64>) -> AppResult<Self> {
        Ok(Self {
            number: identifier.resolve(explicit)?,
            started_at: Local::now(),
        })
    }
}
