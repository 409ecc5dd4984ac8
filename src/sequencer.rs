//! Ordered instrument configuration.
//!
//! The setup protocol is a fixed sequence of seven phases, each a
//! precondition for the next:
//!
//! 1. halt any in-progress acquisition (confirmed)
//! 2. horizontal time range, trigger reference point, sample-rate selection
//! 3. horizontal position (trigger-path delay compensation)
//! 4. segmented acquisition mode, segment count, point count, interpolation
//!    off
//! 5. analog bandwidth ceiling
//! 6. per-channel vertical scale and offset
//! 7. edge trigger: source, level, slope
//!
//! Only the halt is confirmed with an operation-complete query; every other
//! write is fire-and-forget. A transport failure at any step aborts the run
//! before arming. Interpolation must stay off in segmented mode; leaving it
//! on corrupts downstream sample timing.

use tracing::{debug, info};

use crate::config::{AcquisitionSettings, RunConfig, Settings};
use crate::error::AppResult;
use crate::session::{halt_confirmed, InstrumentSession};

/// Applies a [`RunConfig`] to the instrument in dependency order.
pub struct ConfigurationSequencer<'a> {
    session: &'a dyn InstrumentSession,
    acquisition: &'a AcquisitionSettings,
}

impl<'a> ConfigurationSequencer<'a> {
    /// Create a sequencer over an open session.
    pub fn new(session: &'a dyn InstrumentSession, settings: &'a Settings) -> Self {
        Self {
            session,
            acquisition: &settings.acquisition,
        }
    }

    /// Issue the full configuration sequence. Returns the instrument's
    /// realized sample rate verbatim; it is reported for the operator and
    /// never validated against the requested rate.
    pub async fn apply(&self, config: &RunConfig) -> AppResult<String> {
        let session = self.session;

        // 1. Idempotent stop, confirmed before any reconfiguration.
        halt_confirmed(session).await?;

        // 2. Horizontal window and sample-rate selection.
        session
            .command(&format!(":TIMebase:RANGe {}", config.horizontal_window))
            .await?;
        session
            .command(&format!(
                ":TIMebase:REFerence:PERCent {}",
                self.acquisition.reference_percent
            ))
            .await?;
        if self.acquisition.force_sample_rate {
            session
                .command(&format!(":ACQuire:SRATe:ANALog {}", config.sample_rate))
                .await?;
        } else {
            session.command(":ACQuire:SRATe:ANALog:AUTO ON").await?;
        }
        let realized_rate = session.query(":ACQuire:SRATe:ANALog?").await?;
        debug!(realized_rate = %realized_rate.trim(), "sample rate reported by instrument");

        // 3. Horizontal position.
        session
            .command(&format!(":TIMebase:POSition {}", config.time_offset))
            .await?;

        // 4. Segmented capture setup.
        session.command(":ACQuire:MODE SEGMented").await?;
        session
            .command(&format!(":ACQuire:SEGMented:COUNt {}", config.event_count))
            .await?;
        session.command(":ACQuire:POINts:ANALog AUTO").await?;
        session.command(":ACQuire:INTerpolate 0").await?;

        // 5. Bandwidth ceiling.
        session
            .command(&format!(":ACQuire:BANDwidth {}", self.acquisition.bandwidth_hz))
            .await?;

        // 6. Vertical setup per enabled channel.
        for setup in &config.channels {
            session
                .command(&format!("{}:SCALe {}", setup.channel.scpi(), setup.scale))
                .await?;
            session
                .command(&format!("{}:OFFSet {}", setup.channel.scpi(), setup.offset))
                .await?;
        }

        // 7. Edge trigger.
        let source = config.trigger.source.scpi();
        session.command("TRIGger:MODE EDGE").await?;
        session
            .command(&format!(":TRIGger:EDGE:SOURce {source}"))
            .await?;
        session
            .command(&format!(":TRIGger:LEVel {source},{}", config.trigger.level))
            .await?;
        session
            .command(&format!(
                ":TRIGger:EDGE:SLOPe {}",
                config.trigger.slope.scpi()
            ))
            .await?;

        info!("horizontal, vertical, and trigger settings configured");
        Ok(realized_rate)
    }
}
