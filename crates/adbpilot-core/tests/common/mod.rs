//! Shared test helpers for adbpilot-core integration tests.
//!
//! Provides a scripted [`CommandRunner`] that replays canned outputs and
//! records every issued command, plus a clock that records sleeps instead of
//! waiting. Together they let the session and lifecycle paths run without a
//! device, an adb server, or real wall-clock time.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use adbpilot_core::adb::{CommandRunner, TransportError};
use adbpilot_core::poll::{Clock, Poller};

struct Rule {
    pattern: String,
    responses: VecDeque<Result<String, String>>,
}

/// Command channel fake: commands are matched by substring against
/// registered rules, in registration order. Sequenced rules pop one response
/// per call and keep repeating the last; a missing rule is a scripting bug
/// and fails the command loudly.
#[derive(Default)]
pub struct ScriptedRunner {
    rules: Mutex<Vec<Rule>>,
    log: Mutex<Vec<String>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a fixed response for every command containing `pattern`.
    pub fn on(self, pattern: &str, response: &str) -> Self {
        self.push(pattern, VecDeque::from([Ok(response.to_string())]));
        self
    }

    /// Registers a sequence of responses, one per matching call; the last
    /// response repeats once the sequence is exhausted.
    pub fn on_seq(self, pattern: &str, responses: &[&str]) -> Self {
        self.push(
            pattern,
            responses.iter().map(|r| Ok(r.to_string())).collect(),
        );
        self
    }

    /// Registers a transport failure for commands containing `pattern`.
    pub fn fail(self, pattern: &str, stderr: &str) -> Self {
        self.push(pattern, VecDeque::from([Err(stderr.to_string())]));
        self
    }

    fn push(&self, pattern: &str, responses: VecDeque<Result<String, String>>) {
        self.rules.lock().unwrap().push(Rule {
            pattern: pattern.to_string(),
            responses,
        });
    }

    /// All commands issued so far, in order.
    pub fn issued(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    /// How many issued commands contain `pattern`.
    pub fn count_issued(&self, pattern: &str) -> usize {
        self.issued().iter().filter(|c| c.contains(pattern)).count()
    }
}

impl CommandRunner for ScriptedRunner {
    fn exec(&self, cmd: &str) -> Result<String, TransportError> {
        self.log.lock().unwrap().push(cmd.to_string());

        let mut rules = self.rules.lock().unwrap();
        for rule in rules.iter_mut() {
            if cmd.contains(&rule.pattern) {
                let response = if rule.responses.len() > 1 {
                    rule.responses.pop_front().unwrap()
                } else {
                    rule.responses.front().cloned().unwrap()
                };
                return response.map_err(TransportError::CommandFailed);
            }
        }

        Err(TransportError::CommandFailed(format!(
            "unscripted command: {cmd}"
        )))
    }
}

/// Clock that records requested sleeps without waiting.
#[derive(Default)]
pub struct FakeClock {
    sleeps: Mutex<Vec<Duration>>,
}

impl FakeClock {
    pub fn sleep_count(&self) -> usize {
        self.sleeps.lock().unwrap().len()
    }

    pub fn total_slept(&self) -> Duration {
        self.sleeps.lock().unwrap().iter().sum()
    }
}

impl Clock for FakeClock {
    fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
    }
}

/// Convenience: a poller on a fake clock, plus the clock for assertions.
pub fn fake_poller() -> (Poller, Arc<FakeClock>) {
    let clock = Arc::new(FakeClock::default());
    (Poller::with_clock(clock.clone()), clock)
}
