//! Export of captured segments to instrument-side storage.
//!
//! After the acquisition reaches a terminal state, each enabled channel's
//! segments are saved to a binary waveform file on the instrument. The
//! instrument's command channel is single, so channels export strictly one
//! after another: save, wait for the operation-complete acknowledgment,
//! settle, next.
//!
//! A save that never acknowledges is fatal for that channel and every
//! subsequent one; continuing against a half-configured disk subsystem
//! could corrupt later exports. Timed-out runs still export: partial
//! segmented data is valid data.

use std::time::Duration;

use tokio::time::sleep;
use tracing::info;

use crate::config::{ChannelId, ExportSettings, Settings};
use crate::error::{AppResult, ScopeError};
use crate::identity::RunIdentity;
use crate::session::InstrumentSession;

/// Settle after the prepare-all-segments acknowledgment.
const PREPARE_SETTLE: Duration = Duration::from_millis(500);

/// Settle after each per-channel save acknowledgment.
const SAVE_SETTLE: Duration = Duration::from_secs(1);

/// Instrument-side files written by one export.
#[derive(Debug, Clone)]
pub struct ExportReport {
    /// Destination paths, one per exported channel, in export order.
    pub files: Vec<String>,
}

/// Saves captured segments channel by channel.
pub struct WaveformExporter<'a> {
    session: &'a dyn InstrumentSession,
    export: &'a ExportSettings,
}

impl<'a> WaveformExporter<'a> {
    /// Create an exporter over an open session.
    pub fn new(session: &'a dyn InstrumentSession, settings: &'a Settings) -> Self {
        Self {
            session,
            export: &settings.export,
        }
    }

    /// Export `channels` for the identified run. The channel set must be
    /// non-empty; channels are processed in the given order.
    pub async fn export(
        &self,
        identity: &RunIdentity,
        channels: &[ChannelId],
    ) -> AppResult<ExportReport> {
        if channels.is_empty() {
            return Err(ScopeError::Configuration(
                "export requires at least one channel".to_string(),
            ));
        }

        // Stage all segments once, not just the current one.
        self.session.command(":DISK:SEGMented ALL").await?;
        self.session.query("*OPC?").await?;
        sleep(PREPARE_SETTLE).await;

        let mut files = Vec::with_capacity(channels.len());
        for &channel in channels {
            let destination = self.export.waveform_destination(channel, identity.number);
            self.session
                .command(&format!(
                    ":DISK:SAVE:WAVeform {},\"{}\",BIN,ON",
                    channel.scpi(),
                    destination
                ))
                .await?;
            self.session
                .query("*OPC?")
                .await
                .map_err(|err| ScopeError::Export {
                    channel: channel.0,
                    detail: err.to_string(),
                })?;
            info!(channel = channel.0, path = %destination, "segment data saved");
            sleep(SAVE_SETTLE).await;
            files.push(destination);
        }

        Ok(ExportReport { files })
    }
}
