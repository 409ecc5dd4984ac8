//! Run parameters and application settings.
//!
//! Two layers live here:
//!
//! - [`RunConfig`] is the immutable parameter set for a single run: how many
//!   segments to capture, the horizontal and vertical setup, the trigger, and
//!   the run timeout. All quantities are SI (seconds, hertz, volts); unit
//!   conversion from operator-friendly CLI units happens at the CLI boundary.
//! - [`Settings`] is site configuration: instrument address, fixed
//!   acquisition constants, export destinations, and the shared file paths.
//!   Settings load from a TOML file merged with `SCOPE_DAQ_*` environment
//!   variables.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::error::{AppResult, ScopeError};

/// Default settings file, looked up relative to the working directory.
pub const DEFAULT_SETTINGS_FILE: &str = "scope-daq.toml";

/// An analog input channel of the instrument (1-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ChannelId(pub u8);

impl ChannelId {
    /// Full SCPI channel reference, e.g. `CHANnel1`.
    pub fn scpi(&self) -> String {
        format!("CHANnel{}", self.0)
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CH{}", self.0)
    }
}

/// Vertical setup for one enabled channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelSetup {
    /// Which channel this applies to.
    pub channel: ChannelId,
    /// Vertical scale in volts per division.
    pub scale: f64,
    /// Vertical offset in divisions.
    pub offset: f64,
}

/// Edge direction the trigger fires on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerSlope {
    /// Rising edge.
    Rising,
    /// Falling edge.
    Falling,
}

impl TriggerSlope {
    /// SCPI slope token.
    pub fn scpi(&self) -> &'static str {
        match self {
            TriggerSlope::Rising => "POSitive",
            TriggerSlope::Falling => "NEGative",
        }
    }
}

impl FromStr for TriggerSlope {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "rising" | "rise" | "positive" | "pos" => Ok(TriggerSlope::Rising),
            "falling" | "fall" | "negative" | "neg" => Ok(TriggerSlope::Falling),
            other => Err(format!("unknown trigger slope '{other}'")),
        }
    }
}

/// What the trigger listens to. The auxiliary input passes through as the
/// literal `AUX` token; any other identifier resolves to a full channel
/// reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerSource {
    /// The dedicated auxiliary trigger input.
    Aux,
    /// One of the analog channels.
    Channel(ChannelId),
}

impl TriggerSource {
    /// SCPI source token (`AUX` or `CHANnel<n>`).
    pub fn scpi(&self) -> String {
        match self {
            TriggerSource::Aux => "AUX".to_string(),
            TriggerSource::Channel(ch) => ch.scpi(),
        }
    }
}

impl FromStr for TriggerSource {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if value.eq_ignore_ascii_case("aux") {
            return Ok(TriggerSource::Aux);
        }
        value
            .parse::<u8>()
            .map(|n| TriggerSource::Channel(ChannelId(n)))
            .map_err(|_| format!("trigger source must be 'AUX' or a channel number, got '{value}'"))
    }
}

/// Trigger configuration for the run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TriggerConfig {
    /// Trigger source.
    pub source: TriggerSource,
    /// Trigger level in volts.
    pub level: f64,
    /// Edge direction.
    pub slope: TriggerSlope,
}

/// Immutable parameter set for one capture run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Number of segments to capture.
    pub event_count: u32,
    /// Requested sample rate in Hz. Only issued to the instrument when
    /// [`AcquisitionSettings::force_sample_rate`] is set; otherwise the
    /// instrument selects its own rate.
    pub sample_rate: f64,
    /// Full-scale horizontal time range in seconds.
    pub horizontal_window: f64,
    /// Horizontal position in seconds; compensates the fixed trigger-path
    /// delay, so it is usually negative.
    pub time_offset: f64,
    /// Vertical setup for each enabled channel.
    pub channels: Vec<ChannelSetup>,
    /// Trigger configuration.
    pub trigger: TriggerConfig,
    /// Whether captured segments are exported after the run.
    pub save_waveforms: bool,
    /// Maximum run duration. `None` polls until completion.
    pub timeout: Option<Duration>,
}

impl RunConfig {
    /// Channels enabled for this run, in configuration order.
    pub fn channel_ids(&self) -> Vec<ChannelId> {
        self.channels.iter().map(|c| c.channel).collect()
    }

    /// Checks the parameter set for values that parse but cannot drive a
    /// valid acquisition.
    pub fn validate(&self) -> AppResult<()> {
        if self.event_count == 0 {
            return Err(ScopeError::Configuration(
                "event count must be positive".to_string(),
            ));
        }
        if self.sample_rate <= 0.0 {
            return Err(ScopeError::Configuration(format!(
                "sample rate must be positive, got {}",
                self.sample_rate
            )));
        }
        if self.horizontal_window <= 0.0 {
            return Err(ScopeError::Configuration(format!(
                "horizontal window must be positive, got {}",
                self.horizontal_window
            )));
        }
        if self.channels.is_empty() {
            return Err(ScopeError::Configuration(
                "at least one channel must be enabled".to_string(),
            ));
        }
        for setup in &self.channels {
            validate_channel(setup.channel)?;
            if setup.scale <= 0.0 {
                return Err(ScopeError::Configuration(format!(
                    "vertical scale for {} must be positive, got {}",
                    setup.channel, setup.scale
                )));
            }
        }
        if let TriggerSource::Channel(ch) = self.trigger.source {
            validate_channel(ch)?;
        }
        Ok(())
    }
}

fn validate_channel(channel: ChannelId) -> AppResult<()> {
    if (1..=4).contains(&channel.0) {
        Ok(())
    } else {
        Err(ScopeError::Configuration(format!(
            "channel number must be 1-4, got {}",
            channel.0
        )))
    }
}

/// Instrument link settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstrumentSettings {
    /// `host:port` of the SCPI-over-TCP (LXI) socket.
    pub address: String,
    /// Timeout for establishing the TCP connection.
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,
    /// Timeout for individual command/query exchanges. Export
    /// acknowledgments on long runs can take minutes, so this is generous.
    #[serde(with = "humantime_serde")]
    pub io_timeout: Duration,
}

impl Default for InstrumentSettings {
    fn default() -> Self {
        Self {
            address: "192.168.0.182:5025".to_string(),
            connect_timeout: Duration::from_secs(5),
            io_timeout: Duration::from_secs(3000),
        }
    }
}

/// Fixed acquisition constants of the installation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcquisitionSettings {
    /// Analog bandwidth ceiling in Hz.
    pub bandwidth_hz: f64,
    /// Screen location of the trigger reference point, percent.
    pub reference_percent: u8,
    /// Issue the explicit sample-rate command instead of enabling automatic
    /// selection. Off by default; the instrument's automatic choice is
    /// logged either way.
    pub force_sample_rate: bool,
}

impl Default for AcquisitionSettings {
    fn default() -> Self {
        Self {
            bandwidth_hz: 5.0e10,
            reference_percent: 70,
            force_sample_rate: false,
        }
    }
}

/// Where the instrument writes exported waveform files. The destination is
/// a path on the instrument side, not the controller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportSettings {
    /// Instrument-side directory, including any trailing separator.
    pub destination_dir: String,
    /// File-name prefix for saved waveforms.
    pub file_prefix: String,
}

impl ExportSettings {
    /// Destination path for one channel of one run, e.g.
    /// `C:\Waveforms\Wavenewscope_CH1_run42`.
    pub fn waveform_destination(&self, channel: ChannelId, run_number: u32) -> String {
        format!(
            "{}{}_CH{}_run{}",
            self.destination_dir, self.file_prefix, channel.0, run_number
        )
    }
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            destination_dir: "C:\\Waveforms\\".to_string(),
            file_prefix: "Wavenewscope".to_string(),
        }
    }
}

/// Shared files on the controller side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathSettings {
    /// Plain-text file holding the next run number. Read-only from this
    /// system's perspective; allocation is owned elsewhere.
    pub run_counter: PathBuf,
    /// Single-word run status file consumed by external monitors.
    pub status_file: PathBuf,
    /// Append-only human-readable record of run parameters.
    pub logbook: PathBuf,
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            run_counter: PathBuf::from("runNumber.txt"),
            status_file: PathBuf::from("RunLog.txt"),
            logbook: PathBuf::from("Logbook.txt"),
        }
    }
}

/// Top-level application settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Instrument link settings.
    pub instrument: InstrumentSettings,
    /// Fixed acquisition constants.
    pub acquisition: AcquisitionSettings,
    /// Export destinations.
    pub export: ExportSettings,
    /// Shared controller-side files.
    pub paths: PathSettings,
}

impl Settings {
    /// Load settings from the default file location and environment.
    pub fn load() -> AppResult<Self> {
        Self::load_from(DEFAULT_SETTINGS_FILE)
    }

    /// Load settings from a specific TOML file, merged over the built-in
    /// defaults and under `SCOPE_DAQ_*` environment variables
    /// (e.g. `SCOPE_DAQ_INSTRUMENT__ADDRESS=10.0.0.5:5025`).
    pub fn load_from(path: impl AsRef<std::path::Path>) -> AppResult<Self> {
        let settings = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("SCOPE_DAQ_").split("__"))
            .extract()?;
        Ok(settings)
    }
}
