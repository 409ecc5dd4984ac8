//! CLI entry point for scope-daq.
//!
//! Parses the run parameters, connects to the instrument, and executes one
//! segmented-capture run: configure, arm, wait, export, publish status.
//! Operator-facing units follow the control-room convention (GS/s and
//! nanoseconds); everything past the CLI boundary is SI.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

use scope_daq::config::{
    ChannelId, ChannelSetup, RunConfig, Settings, TriggerConfig, TriggerSlope, TriggerSource,
};
use scope_daq::identity::{RunIdentifier, RunIdentity};
use scope_daq::run;
use scope_daq::session::tcp::{SessionConfig, TcpSession};
use scope_daq::session::InstrumentSession;
use scope_daq::status::StatusPublisher;

/// Run info.
#[derive(Parser)]
#[command(name = "scope-daq")]
#[command(about = "Segmented-capture run control for a remote oscilloscope", long_about = None)]
struct Cli {
    /// Number of events (segments) to capture.
    #[arg(long)]
    num_events: u32,

    /// Requested sample rate in GS/s.
    #[arg(long)]
    sample_rate: f64,

    /// Horizontal window (full-scale time range) in ns.
    #[arg(long)]
    horizontal_window: f64,

    /// Run number override; negative allocates from the shared counter.
    #[arg(long, default_value_t = -1, allow_negative_numbers = true)]
    run_number: i64,

    /// Trigger channel: AUX or a channel number.
    #[arg(long, default_value = "1", value_parser = TriggerSource::from_str)]
    trig_ch: TriggerSource,

    /// Trigger level in volts.
    #[arg(long, default_value_t = -0.0023, allow_negative_numbers = true)]
    trig: f64,

    /// Trigger slope: rising or falling.
    #[arg(long, default_value = "falling", value_parser = TriggerSlope::from_str)]
    trig_slope: TriggerSlope,

    /// Enabled channel as CH[:SCALE[:OFFSET]] (V/div and divisions).
    /// Repeat for additional channels.
    #[arg(long = "channel", value_parser = parse_channel, default_value = "1:0.005:0.016")]
    channels: Vec<ChannelSetup>,

    /// Horizontal position in ns, compensating the trigger-path delay.
    #[arg(long, default_value_t = -53.0, allow_negative_numbers = true)]
    time_offset: f64,

    /// Save captured waveforms after the run.
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    save: bool,

    /// Max run duration in seconds; non-positive runs unbounded.
    #[arg(long, default_value_t = -1.0, allow_negative_numbers = true)]
    timeout: f64,

    /// Settings file (TOML); defaults to scope-daq.toml next to the binary.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Instrument address override (host:port).
    #[arg(long)]
    address: Option<String>,
}

impl Cli {
    fn run_config(&self) -> RunConfig {
        RunConfig {
            event_count: self.num_events,
            sample_rate: self.sample_rate * 1.0e9,
            horizontal_window: self.horizontal_window * 1.0e-9,
            time_offset: self.time_offset * 1.0e-9,
            channels: self.channels.clone(),
            trigger: TriggerConfig {
                source: self.trig_ch,
                level: self.trig,
                slope: self.trig_slope,
            },
            save_waveforms: self.save,
            timeout: (self.timeout > 0.0).then(|| Duration::from_secs_f64(self.timeout)),
        }
    }
}

fn parse_channel(value: &str) -> Result<ChannelSetup, String> {
    let mut parts = value.split(':');
    let channel = parts
        .next()
        .ok_or_else(|| "empty channel spec".to_string())?
        .parse::<u8>()
        .map_err(|_| format!("channel must be a number in '{value}'"))?;
    let scale = match parts.next() {
        Some(text) => text
            .parse::<f64>()
            .map_err(|_| format!("bad vertical scale in '{value}'"))?,
        None => 0.005,
    };
    let offset = match parts.next() {
        Some(text) => text
            .parse::<f64>()
            .map_err(|_| format!("bad vertical offset in '{value}'"))?,
        None => 0.0,
    };
    if parts.next().is_some() {
        return Err(format!("too many fields in channel spec '{value}'"));
    }
    Ok(ChannelSetup {
        channel: ChannelId(channel),
        scale,
        offset,
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut settings = match &cli.config {
        Some(path) => Settings::load_from(path)?,
        None => Settings::load()?,
    };
    if let Some(address) = &cli.address {
        settings.instrument.address = address.clone();
    }

    let config = cli.run_config();

    // The run number is fixed before any instrument contact.
    let identifier = RunIdentifier::new(&settings.paths.run_counter);
    let identity = RunIdentity::resolve(&identifier, Some(cli.run_number))?;

    let session_config = SessionConfig {
        connect_timeout: settings.instrument.connect_timeout,
        io_timeout: settings.instrument.io_timeout,
        ..SessionConfig::default()
    };
    let session = TcpSession::connect(&settings.instrument.address, session_config).await?;
    let idn = session.query("*IDN?").await?;
    info!(instrument = %idn.trim(), address = %settings.instrument.address, "instrument connected");

    let mut publisher = StatusPublisher::new(settings.paths.status_file.clone());
    let summary = run::execute_run(&session, &settings, &config, &identity, &mut publisher).await?;

    info!(
        run = summary.run_number,
        outcome = ?summary.result.outcome,
        duration_s = summary.result.duration.as_secs_f64(),
        "run finished"
    );
    Ok(())
}
