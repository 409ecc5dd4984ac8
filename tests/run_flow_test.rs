//! End-to-end run scenarios against a scripted instrument.

mod common;

use std::fs;
use std::time::Duration;

use tempfile::tempdir;

use scope_daq::acquisition::RunOutcome;
use scope_daq::error::ScopeError;
use scope_daq::identity::{RunIdentifier, RunIdentity};
use scope_daq::run::execute_run;
use scope_daq::session::mock::MockSession;
use scope_daq::status::{RunStatus, StatusPublisher};

#[tokio::test(start_paused = true)]
async fn completed_run_end_to_end() {
    let dir = tempdir().unwrap();
    let settings = common::site_settings(dir.path());
    let config = common::base_config();

    let identifier = RunIdentifier::new(&settings.paths.run_counter);
    let identity = RunIdentity::resolve(&identifier, Some(-1)).unwrap();
    assert_eq!(identity.number, 42);

    let session = MockSession::new();
    session.complete_after(3);
    let mut publisher = StatusPublisher::new(settings.paths.status_file.clone());

    let summary = execute_run(&session, &settings, &config, &identity, &mut publisher)
        .await
        .unwrap();

    assert_eq!(summary.run_number, 42);
    assert_eq!(summary.result.outcome, RunOutcome::Completed);
    // Two idle polls of 100 ms before the third reports done.
    assert_eq!(summary.result.duration, Duration::from_millis(200));
    assert_eq!(summary.result.trigger_rate, Some(5000.0));

    // Exactly one save command, for channel 1, with the run number in the
    // destination path.
    let saves: Vec<_> = session
        .writes()
        .into_iter()
        .filter(|w| w.starts_with(":DISK:SAVE:WAVeform"))
        .collect();
    assert_eq!(saves.len(), 1);
    assert!(saves[0].contains("CHANnel1"));
    assert!(saves[0].contains("run42"));
    let export = summary.export.unwrap();
    assert_eq!(export.files.len(), 1);
    assert!(export.files[0].ends_with("Wavenewscope_CH1_run42"));

    // Status sequence is exactly busy -> writing -> ready.
    assert_eq!(
        publisher.history(),
        &[RunStatus::Busy, RunStatus::Writing, RunStatus::Ready]
    );
    assert_eq!(
        fs::read_to_string(&settings.paths.status_file).unwrap(),
        "ready\n"
    );

    // The logbook got this run's record.
    let logbook = fs::read_to_string(&settings.paths.logbook).unwrap();
    assert!(logbook.contains("RUN 42"));
    assert!(logbook.contains("Events per run: 1000"));
}

#[tokio::test(start_paused = true)]
async fn timed_out_run_still_exports() {
    let dir = tempdir().unwrap();
    let settings = common::site_settings(dir.path());
    let config = common::config_with_timeout(Duration::from_millis(50));

    let identifier = RunIdentifier::new(&settings.paths.run_counter);
    let identity = RunIdentity::resolve(&identifier, None).unwrap();

    // The completion register never reports done.
    let session = MockSession::new();
    let mut publisher = StatusPublisher::new(settings.paths.status_file.clone());

    let summary = execute_run(&session, &settings, &config, &identity, &mut publisher)
        .await
        .unwrap();

    assert_eq!(summary.result.outcome, RunOutcome::TimedOut);
    assert!(summary.result.trigger_rate.is_none());
    // Deadline plus at most one polling interval.
    assert!(summary.result.duration <= Duration::from_millis(150));

    // The acquisition was stopped with confirmation.
    assert!(session.queries().contains(&":STOP;*OPC?".to_string()));

    // Partial segmented data is still exported.
    assert!(summary.export.is_some());
    assert!(session
        .writes()
        .iter()
        .any(|w| w.starts_with(":DISK:SAVE:WAVeform")));

    assert_eq!(
        publisher.history(),
        &[RunStatus::Busy, RunStatus::Writing, RunStatus::Ready]
    );
}

#[tokio::test(start_paused = true)]
async fn save_disabled_skips_export() {
    let dir = tempdir().unwrap();
    let settings = common::site_settings(dir.path());
    let mut config = common::base_config();
    config.save_waveforms = false;

    let identifier = RunIdentifier::new(&settings.paths.run_counter);
    let identity = RunIdentity::resolve(&identifier, Some(7)).unwrap();
    assert_eq!(identity.number, 7);

    let session = MockSession::new();
    session.complete_after(1);
    let mut publisher = StatusPublisher::new(settings.paths.status_file.clone());

    let summary = execute_run(&session, &settings, &config, &identity, &mut publisher)
        .await
        .unwrap();

    assert!(summary.export.is_none());
    assert!(!session.writes().iter().any(|w| w.starts_with(":DISK:")));
    // Status still walks the full sequence.
    assert_eq!(
        publisher.history(),
        &[RunStatus::Busy, RunStatus::Writing, RunStatus::Ready]
    );
}

#[tokio::test(start_paused = true)]
async fn transport_failure_during_configuration_aborts_before_arming() {
    let dir = tempdir().unwrap();
    let settings = common::site_settings(dir.path());
    let config = common::base_config();

    let identifier = RunIdentifier::new(&settings.paths.run_counter);
    let identity = RunIdentity::resolve(&identifier, None).unwrap();

    let session = MockSession::new();
    session.fail_on(":ACQuire:MODE SEGMented");
    let mut publisher = StatusPublisher::new(settings.paths.status_file.clone());

    let err = execute_run(&session, &settings, &config, &identity, &mut publisher)
        .await
        .unwrap_err();

    assert!(matches!(err, ScopeError::Transport { .. }));
    // Never armed, never published a status.
    assert!(!session.writes().contains(&":SINGle".to_string()));
    assert!(publisher.history().is_empty());
    assert!(!settings.paths.status_file.exists());
}

#[tokio::test(start_paused = true)]
async fn garbled_completion_response_leaves_status_busy() {
    let dir = tempdir().unwrap();
    let settings = common::site_settings(dir.path());
    let config = common::base_config();

    let identifier = RunIdentifier::new(&settings.paths.run_counter);
    let identity = RunIdentity::resolve(&identifier, None).unwrap();

    let session = MockSession::new();
    session.set_response(":ADER?", "???");
    let mut publisher = StatusPublisher::new(settings.paths.status_file.clone());

    let err = execute_run(&session, &settings, &config, &identity, &mut publisher)
        .await
        .unwrap_err();

    assert!(matches!(err, ScopeError::Protocol { .. }));
    // The status file keeps the last successfully published value.
    assert_eq!(publisher.history(), &[RunStatus::Busy]);
    assert_eq!(
        fs::read_to_string(&settings.paths.status_file).unwrap(),
        "busy"
    );
}

#[test]
fn missing_counter_aborts_before_any_instrument_contact() {
    let dir = tempdir().unwrap();
    let identifier = RunIdentifier::new(dir.path().join("absent.txt"));
    let err = RunIdentity::resolve(&identifier, Some(-1)).unwrap_err();
    assert!(matches!(err, ScopeError::CounterUnavailable { .. }));
}
