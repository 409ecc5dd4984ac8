//! One complete capture run, end to end.
//!
//! The control flow is fixed: configure the instrument, publish `busy`, arm
//! and wait for the capture, publish `writing`, export segments if the run
//! asked for them, publish `ready`. The run identity is resolved by the
//! caller before this function is entered; nothing here touches the run
//! counter.

use tracing::info;

use crate::acquisition::{AcquisitionStateMachine, RunResult};
use crate::config::{RunConfig, Settings};
use crate::error::AppResult;
use crate::export::{ExportReport, WaveformExporter};
use crate::identity::RunIdentity;
use crate::logbook;
use crate::sequencer::ConfigurationSequencer;
use crate::session::InstrumentSession;
use crate::status::{RunStatus, StatusPublisher};

/// Everything a finished run reports back.
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// The run's number.
    pub run_number: u32,
    /// Acquisition outcome, duration, and trigger rate.
    pub result: RunResult,
    /// Export report, when the run saved waveforms.
    pub export: Option<ExportReport>,
}

/// Execute one run over an open session. Any error is terminal: the run
/// aborts at the point of failure and the status file keeps its last
/// successfully published value.
pub async fn execute_run(
    session: &dyn InstrumentSession,
    settings: &Settings,
    config: &RunConfig,
    identity: &RunIdentity,
    publisher: &mut StatusPublisher,
) -> AppResult<RunSummary> {
    config.validate()?;
    logbook::append_run_header(&settings.paths.logbook, identity, config, settings)?;
    info!(run = identity.number, "######## starting run ########");

    let sequencer = ConfigurationSequencer::new(session, settings);
    let realized_rate = sequencer.apply(config).await?;
    info!(realized_sample_rate = %realized_rate.trim(), "instrument configured");

    publisher.publish(RunStatus::Busy)?;

    let mut machine = AcquisitionStateMachine::new(session);
    let result = machine.run(config.event_count, config.timeout).await?;

    publisher.publish(RunStatus::Writing)?;

    match result.trigger_rate {
        Some(rate) => info!(
            duration_s = result.duration.as_secs_f64(),
            trigger_rate_hz = rate,
            "acquisition finished"
        ),
        None => info!(
            duration_s = result.duration.as_secs_f64(),
            "acquisition finished, trigger rate unknown"
        ),
    }

    let export = if config.save_waveforms {
        let exporter = WaveformExporter::new(session, settings);
        Some(exporter.export(identity, &config.channel_ids()).await?)
    } else {
        None
    };

    publisher.publish(RunStatus::Ready)?;

    Ok(RunSummary {
        run_number: identity.number,
        result,
        export,
    })
}
