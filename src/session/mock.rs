//! Scriptable instrument session for testing without hardware.
//!
//! `MockSession` records every exchange in order and answers queries from a
//! per-query response script. Tests assert on the transcript to check
//! command ordering, and enqueue responses (or faults) to drive the
//! controller down specific paths.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;

use super::InstrumentSession;
use crate::error::{AppResult, ScopeError};

/// One recorded exchange with the mock instrument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Exchange {
    /// Fire-and-forget command.
    Write(String),
    /// Query and the response the mock returned.
    Query(String),
}

#[derive(Default)]
struct MockInner {
    transcript: Vec<Exchange>,
    queued: HashMap<String, VecDeque<String>>,
    defaults: HashMap<String, String>,
    failing: HashSet<String>,
}

/// A scripted in-memory instrument.
pub struct MockSession {
    inner: Mutex<MockInner>,
}

impl Default for MockSession {
    fn default() -> Self {
        Self::new()
    }
}

impl MockSession {
    /// Create a mock with benign defaults: operation-complete queries
    /// acknowledge immediately, the acquisition-done register reads 0, and
    /// the identity/sample-rate queries return plausible values.
    pub fn new() -> Self {
        let mut defaults = HashMap::new();
        defaults.insert("*OPC?".to_string(), "1".to_string());
        defaults.insert(":STOP;*OPC?".to_string(), "1".to_string());
        defaults.insert("*IDN?".to_string(), "MOCK,SCOPE,0,1.0".to_string());
        defaults.insert(":ADER?".to_string(), "0".to_string());
        defaults.insert(":ACQuire:SRATe:ANALog?".to_string(), "4.0E+09".to_string());
        Self {
            inner: Mutex::new(MockInner {
                defaults,
                ..MockInner::default()
            }),
        }
    }

    /// Replace the standing response for a query.
    pub fn set_response(&self, query: &str, response: &str) {
        let mut inner = self.lock();
        inner.defaults.insert(query.to_string(), response.to_string());
    }

    /// Queue a one-shot response for a query; queued responses are consumed
    /// before the standing one.
    pub fn enqueue_response(&self, query: &str, response: &str) {
        let mut inner = self.lock();
        inner
            .queued
            .entry(query.to_string())
            .or_default()
            .push_back(response.to_string());
    }

    /// Script the acquisition-done register to report completion on the
    /// `polls`-th poll.
    pub fn complete_after(&self, polls: usize) {
        for _ in 1..polls {
            self.enqueue_response(":ADER?", "0");
        }
        self.enqueue_response(":ADER?", "1");
    }

    /// Make every subsequent exchange of `command` fail at the transport
    /// layer. Queued one-shot responses are consumed first, so a script can
    /// let early exchanges succeed before the link "goes down".
    pub fn fail_on(&self, command: &str) {
        let mut inner = self.lock();
        inner.failing.insert(command.to_string());
    }

    /// All exchanges, in order.
    pub fn transcript(&self) -> Vec<Exchange> {
        self.lock().transcript.clone()
    }

    /// All fire-and-forget commands, in order.
    pub fn writes(&self) -> Vec<String> {
        self.lock()
            .transcript
            .iter()
            .filter_map(|e| match e {
                Exchange::Write(text) => Some(text.clone()),
                Exchange::Query(_) => None,
            })
            .collect()
    }

    /// All queries, in order.
    pub fn queries(&self) -> Vec<String> {
        self.lock()
            .transcript
            .iter()
            .filter_map(|e| match e {
                Exchange::Query(text) => Some(text.clone()),
                Exchange::Write(_) => None,
            })
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockInner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn fault(command: &str) -> ScopeError {
        ScopeError::Transport {
            command: command.to_string(),
            source: std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "scripted transport failure",
            ),
        }
    }
}

#[async_trait]
impl InstrumentSession for MockSession {
    async fn command(&self, command: &str) -> AppResult<()> {
        let mut inner = self.lock();
        if inner.failing.contains(command) {
            return Err(Self::fault(command));
        }
        inner.transcript.push(Exchange::Write(command.to_string()));
        Ok(())
    }

    async fn query(&self, command: &str) -> AppResult<String> {
        let mut inner = self.lock();
        if let Some(response) = inner
            .queued
            .get_mut(command)
            .and_then(|queue| queue.pop_front())
        {
            inner.transcript.push(Exchange::Query(command.to_string()));
            return Ok(response);
        }
        if inner.failing.contains(command) {
            return Err(Self::fault(command));
        }
        inner.transcript.push(Exchange::Query(command.to_string()));
        Ok(inner
            .defaults
            .get(command)
            .cloned()
            .unwrap_or_else(|| "1".to_string()))
    }
}
