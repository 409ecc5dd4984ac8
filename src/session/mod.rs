//! Instrument session abstraction.
//!
//! All device I/O goes through the [`InstrumentSession`] trait: a textual
//! command/query exchange over one shared link. Commands are fire-and-forget
//! writes; queries block for a single line of response. The instrument's
//! command interpreter is not assumed to support overlapping commands, so
//! callers hold exactly one exchange in flight at a time.
//!
//! Two implementations ship with the crate: [`tcp::TcpSession`] for the real
//! SCPI-over-TCP (LXI) link, and [`mock::MockSession`] for testing without
//! hardware.

use async_trait::async_trait;

use crate::error::{AppResult, ScopeError};

pub mod mock;
pub mod tcp;

/// A command/response link to the instrument.
#[async_trait]
pub trait InstrumentSession: Send + Sync {
    /// Send a command without expecting a response.
    async fn command(&self, command: &str) -> AppResult<()>;

    /// Send a query and return the response line.
    async fn query(&self, command: &str) -> AppResult<String>;
}

/// Send a query whose response must parse as an integer.
pub async fn query_int(session: &dyn InstrumentSession, command: &str) -> AppResult<i64> {
    let response = session.query(command).await?;
    response
        .trim()
        .parse::<i64>()
        .map_err(|_| ScopeError::Protocol {
            query: command.to_string(),
            response: response.trim().to_string(),
        })
}

/// Halt any in-progress acquisition and wait for the operation-complete
/// acknowledgment. Idempotent on an idle instrument.
pub async fn halt_confirmed(session: &dyn InstrumentSession) -> AppResult<()> {
    session.query(":STOP;*OPC?").await?;
    Ok(())
}
