//! Arm/poll/timeout state machine for a single segmented capture.
//!
//! The machine walks `Idle -> Armed -> Polling -> {Completed, TimedOut}`.
//! Arming clears the event status register and issues a single-acquisition
//! command, both fire-and-forget. Polling queries the acquisition-done event
//! register at a fixed cadence; a configured deadline is the only
//! cancellation mechanism. Once polling starts, the machine always reaches
//! one of the two terminal states.
//!
//! A non-integer response from the completion register is fatal. There is
//! no tolerance for garbled responses.

use std::time::Duration;

use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use crate::error::AppResult;
use crate::session::{halt_confirmed, query_int, InstrumentSession};

/// Interval between completion-register polls.
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Settle time between clearing the display and arming.
pub const ARM_SETTLE: Duration = Duration::from_secs(2);

/// Acquisition-done event register query.
const ACQ_DONE_QUERY: &str = ":ADER?";

/// States of the acquisition machine. `Completed` and `TimedOut` are
/// terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcqState {
    /// Nothing armed yet.
    Idle,
    /// Arm command issued.
    Armed,
    /// Waiting on the completion register.
    Polling,
    /// The instrument reported acquisition complete.
    Completed,
    /// The deadline elapsed and the acquisition was stopped.
    TimedOut,
}

/// How the run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// All requested segments were captured.
    Completed,
    /// The run was stopped at the deadline with an unknown number of
    /// segments captured.
    TimedOut,
}

/// Result of one acquisition, constructible only after the machine reaches
/// a terminal state.
#[derive(Debug, Clone, Copy)]
pub struct RunResult {
    /// Terminal outcome.
    pub outcome: RunOutcome,
    /// Time from arming to the terminal state.
    pub duration: Duration,
    /// Observed trigger rate in events/second. Present only for completed
    /// runs of nonzero duration; a timed-out run captured an unknown number
    /// of segments, so no rate is defined.
    pub trigger_rate: Option<f64>,
}

impl RunResult {
    fn new(outcome: RunOutcome, duration: Duration, event_count: u32) -> Self {
        let trigger_rate = match outcome {
            RunOutcome::Completed if duration > Duration::ZERO => {
                Some(f64::from(event_count) / duration.as_secs_f64())
            }
            _ => None,
        };
        Self {
            outcome,
            duration,
            trigger_rate,
        }
    }
}

/// A wall-clock deadline consumed by the poll loop. An unbounded run never
/// expires.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    expires_at: Option<Instant>,
}

impl Deadline {
    /// Deadline `limit` from now; `None` never expires.
    pub fn after(limit: Option<Duration>) -> Self {
        Self {
            expires_at: limit.map(|limit| Instant::now() + limit),
        }
    }

    /// Whether the deadline has passed.
    pub fn expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Instant::now() >= at)
    }
}

/// Drives one capture from arm to a terminal state.
pub struct AcquisitionStateMachine<'a> {
    session: &'a dyn InstrumentSession,
    state: AcqState,
}

impl<'a> AcquisitionStateMachine<'a> {
    /// Create an idle machine over an open session.
    pub fn new(session: &'a dyn InstrumentSession) -> Self {
        Self {
            session,
            state: AcqState::Idle,
        }
    }

    /// Current state.
    pub fn state(&self) -> AcqState {
        self.state
    }

    /// Arm a single capture and poll until it completes or the deadline
    /// elapses.
    pub async fn run(
        &mut self,
        event_count: u32,
        timeout: Option<Duration>,
    ) -> AppResult<RunResult> {
        // Clear the display and let the instrument settle before arming.
        self.session.command(":CDISplay").await?;
        sleep(ARM_SETTLE).await;

        self.session.command("*CLS").await?;
        self.session.command(":SINGle").await?;
        self.state = AcqState::Armed;
        let armed_at = Instant::now();
        let deadline = Deadline::after(timeout);
        debug!(?timeout, "acquisition armed");

        self.state = AcqState::Polling;
        loop {
            if query_int(self.session, ACQ_DONE_QUERY).await? == 1 {
                self.state = AcqState::Completed;
                info!("acquisition complete");
                break;
            }
            sleep(POLL_INTERVAL).await;
            if deadline.expired() {
                halt_confirmed(self.session).await?;
                self.state = AcqState::TimedOut;
                warn!("run deadline elapsed, acquisition stopped");
                break;
            }
        }

        let duration = armed_at.elapsed();
        let outcome = match self.state {
            AcqState::Completed => RunOutcome::Completed,
            _ => RunOutcome::TimedOut,
        };
        Ok(RunResult::new(outcome, duration, event_count))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ScopeError;
    use crate::session::mock::MockSession;

    #[tokio::test(start_paused = true)]
    async fn completes_when_register_reports_done() {
        let session = MockSession::new();
        session.complete_after(3);
        let mut machine = AcquisitionStateMachine::new(&session);

        let result = machine.run(1000, None).await.unwrap();

        assert_eq!(machine.state(), AcqState::Completed);
        assert_eq!(result.outcome, RunOutcome::Completed);
        // Two idle polls of 100 ms each before the third reports done.
        assert_eq!(result.duration, Duration::from_millis(200));
        assert_eq!(result.trigger_rate, Some(5000.0));
    }

    #[tokio::test(start_paused = true)]
    async fn unbounded_run_never_times_out() {
        let session = MockSession::new();
        // Completion only on the 50th poll; no deadline configured.
        session.complete_after(50);
        let mut machine = AcquisitionStateMachine::new(&session);

        let result = machine.run(100, None).await.unwrap();
        assert_eq!(result.outcome, RunOutcome::Completed);
        assert!(!session.queries().contains(&":STOP;*OPC?".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_stops_a_run_that_never_completes() {
        let session = MockSession::new();
        let mut machine = AcquisitionStateMachine::new(&session);

        let result = machine
            .run(1000, Some(Duration::from_millis(50)))
            .await
            .unwrap();

        assert_eq!(machine.state(), AcqState::TimedOut);
        assert_eq!(result.outcome, RunOutcome::TimedOut);
        assert!(result.trigger_rate.is_none());
        // Bounded by the polling granularity: deadline + one interval.
        assert!(result.duration <= Duration::from_millis(150));
        // The stop was confirmed.
        assert!(session.queries().contains(&":STOP;*OPC?".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn arm_issues_clear_then_single() {
        let session = MockSession::new();
        session.complete_after(1);
        let mut machine = AcquisitionStateMachine::new(&session);
        machine.run(10, None).await.unwrap();

        assert_eq!(
            session.writes(),
            vec![
                ":CDISplay".to_string(),
                "*CLS".to_string(),
                ":SINGle".to_string(),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn garbled_completion_register_is_fatal() {
        let session = MockSession::new();
        session.set_response(":ADER?", "definitely-not-a-number");
        let mut machine = AcquisitionStateMachine::new(&session);

        let err = machine.run(10, None).await.unwrap_err();
        assert!(matches!(err, ScopeError::Protocol { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn instant_completion_has_no_rate() {
        let session = MockSession::new();
        session.complete_after(1);
        let mut machine = AcquisitionStateMachine::new(&session);

        // First poll reports done: zero elapsed time under the paused
        // clock, so the rate is undefined rather than a division by zero.
        let result = machine.run(10, None).await.unwrap();
        assert_eq!(result.outcome, RunOutcome::Completed);
        assert_eq!(result.duration, Duration::ZERO);
        assert!(result.trigger_rate.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_expiry_is_observable() {
        let deadline = Deadline::after(Some(Duration::from_millis(10)));
        assert!(!deadline.expired());
        sleep(Duration::from_millis(11)).await;
        assert!(deadline.expired());

        let unbounded = Deadline::after(None);
        sleep(Duration::from_secs(3600)).await;
        assert!(!unbounded.expired());
    }
}
