//! Append-only run logbook.
//!
//! A human-readable record of each run's parameters, appended before the
//! instrument is configured. Never read by this system.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use crate::config::{RunConfig, Settings};
use crate::error::AppResult;
use crate::identity::RunIdentity;

/// Append the run header and parameter block for one run.
pub fn append_run_header(
    path: &Path,
    identity: &RunIdentity,
    config: &RunConfig,
    settings: &Settings,
) -> AppResult<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;

    writeln!(file, "\n#### ACQUISITION LOGBOOK -- RUN {} ####", identity.number)?;
    writeln!(file, "Date: {}", identity.started_at.format("%Y-%m-%d %H:%M:%S"))?;
    writeln!(file, "Events per run: {}", config.event_count)?;
    writeln!(
        file,
        "Horizontal: range {} s, position {} s",
        config.horizontal_window, config.time_offset
    )?;
    writeln!(file, "Bandwidth: {} Hz", settings.acquisition.bandwidth_hz)?;
    for channel in &config.channels {
        writeln!(
            file,
            "- {}: scale {} V/div, offset {} div",
            channel.channel, channel.scale, channel.offset
        )?;
    }
    writeln!(
        file,
        "Trigger: {} edge @ {} V, {}",
        config.trigger.source.scpi(),
        config.trigger.level,
        config.trigger.slope.scpi()
    )?;
    Ok(())
}
