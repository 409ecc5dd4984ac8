//! Shared fixtures for integration tests.

use std::fs;
use std::path::Path;
use std::time::Duration;

use scope_daq::config::{
    ChannelId, ChannelSetup, RunConfig, Settings, TriggerConfig, TriggerSlope, TriggerSource,
};

/// Settings whose shared files all live under `dir`, with a counter file
/// seeded to 42.
pub fn site_settings(dir: &Path) -> Settings {
    let mut settings = Settings::default();
    settings.paths.run_counter = dir.join("runNumber.txt");
    settings.paths.status_file = dir.join("RunLog.txt");
    settings.paths.logbook = dir.join("Logbook.txt");
    fs::write(&settings.paths.run_counter, "42").unwrap();
    settings
}

/// The reference run: 1000 segments at 4 GS/s over a 200 ns window,
/// channel 1 only, unbounded, saving waveforms.
pub fn base_config() -> RunConfig {
    RunConfig {
        event_count: 1000,
        sample_rate: 4.0e9,
        horizontal_window: 200.0e-9,
        time_offset: -53.0e-9,
        channels: vec![ChannelSetup {
            channel: ChannelId(1),
            scale: 0.005,
            offset: 0.016,
        }],
        trigger: TriggerConfig {
            source: TriggerSource::Channel(ChannelId(1)),
            level: -0.0023,
            slope: TriggerSlope::Falling,
        },
        save_waveforms: true,
        timeout: None,
    }
}

/// `base_config` with a deadline.
#[allow(dead_code)]
pub fn config_with_timeout(timeout: Duration) -> RunConfig {
    let mut config = base_config();
    config.timeout = Some(timeout);
    config
}
