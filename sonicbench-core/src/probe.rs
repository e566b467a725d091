// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Readiness probing for the disposable responder.
//!
//! Polling is a small state machine: Starting → Polling → Ready | TimedOut.
//! Every poll outcome maps to exactly one transition, and both the per-attempt
//! timeout and the backoff sleep are clamped to the remaining budget, so
//! `wait_ready` returns within `deadline + backoff` even against a port with
//! no listener.

use std::time::{Duration, Instant};

use crate::config::ProbeConfig;
use crate::error::ProbeError;

/// Lower bound for a single attempt's timeout near the deadline.
const MIN_ATTEMPT_TIMEOUT: Duration = Duration::from_millis(50);

/// Probe lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeState {
    /// No attempt issued yet.
    Starting,
    /// At least one attempt failed transiently; still within the deadline.
    Polling,
    /// The server answered. Terminal.
    Ready,
    /// The deadline passed without an answer. Terminal.
    TimedOut,
}

impl ProbeState {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Starting => "Starting",
            Self::Polling => "Polling",
            Self::Ready => "Ready",
            Self::TimedOut => "TimedOut",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Ready | Self::TimedOut)
    }
}

/// Result of a single poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// Any HTTP response, whatever its status.
    Answered { status: u16 },
    /// Connection refused, timeout or any other transport failure.
    Transient { reason: String },
}

/// Deterministic transition table for the probe.
#[derive(Debug)]
pub struct ProbeMachine {
    state: ProbeState,
    deadline: Duration,
    attempts: u32,
}

impl ProbeMachine {
    pub fn new(deadline: Duration) -> Self {
        Self {
            state: ProbeState::Starting,
            deadline,
            attempts: 0,
        }
    }

    pub fn state(&self) -> ProbeState {
        self.state
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Feed one poll outcome observed `elapsed` after the first attempt began.
    pub fn observe(&mut self, outcome: &PollOutcome, elapsed: Duration) -> ProbeState {
        if self.state.is_terminal() {
            return self.state;
        }

        self.attempts += 1;
        let next = match outcome {
            PollOutcome::Answered { .. } => ProbeState::Ready,
            PollOutcome::Transient { .. } if elapsed >= self.deadline => ProbeState::TimedOut,
            PollOutcome::Transient { .. } => ProbeState::Polling,
        };

        tracing::debug!(
            from = self.state.name(),
            to = next.name(),
            attempt = self.attempts,
            elapsed_ms = elapsed.as_millis() as u64,
            "Probe transition"
        );

        self.state = next;
        next
    }

    /// Time left before the deadline.
    pub fn remaining(&self, elapsed: Duration) -> Duration {
        self.deadline.saturating_sub(elapsed)
    }
}

/// Summary of a successful probe.
#[derive(Debug, Clone, Copy)]
pub struct ProbeReport {
    pub attempts: u32,
    pub elapsed: Duration,
    pub status: u16,
}

/// Blocks until a URL answers or the deadline passes.
pub struct ReadinessProber {
    config: ProbeConfig,
}

impl ReadinessProber {
    pub fn new(config: ProbeConfig) -> Self {
        Self { config }
    }

    /// Poll `url` with blocking HTTP GETs until it answers.
    ///
    /// Must not be called from inside an async runtime.
    pub fn wait_ready(&self, url: &str) -> Result<ProbeReport, ProbeError> {
        let client = reqwest::blocking::Client::builder()
            .pool_max_idle_per_host(0)
            .build()
            .map_err(|e| ProbeError::Client {
                reason: e.to_string(),
            })?;

        self.wait_with(url, |timeout| match client.get(url).timeout(timeout).send() {
            Ok(response) => PollOutcome::Answered {
                status: response.status().as_u16(),
            },
            Err(e) => PollOutcome::Transient {
                reason: e.to_string(),
            },
        })
    }

    /// Drive the state machine with a caller-supplied poll function.
    ///
    /// `poll` receives the timeout it must honour for that attempt.
    pub fn wait_with<F>(&self, url: &str, mut poll: F) -> Result<ProbeReport, ProbeError>
    where
        F: FnMut(Duration) -> PollOutcome,
    {
        let mut machine = ProbeMachine::new(self.config.deadline);
        let start = Instant::now();

        loop {
            let remaining = machine.remaining(start.elapsed());
            let attempt_timeout = self.config.backoff.min(remaining).max(MIN_ATTEMPT_TIMEOUT);

            let outcome = poll(attempt_timeout);
            let elapsed = start.elapsed();

            match machine.observe(&outcome, elapsed) {
                ProbeState::Ready => {
                    let status = match outcome {
                        PollOutcome::Answered { status } => status,
                        PollOutcome::Transient { .. } => 0,
                    };
                    tracing::info!(
                        url,
                        attempts = machine.attempts(),
                        elapsed_ms = elapsed.as_millis() as u64,
                        status,
                        "Server ready"
                    );
                    return Ok(ProbeReport {
                        attempts: machine.attempts(),
                        elapsed,
                        status,
                    });
                }
                ProbeState::TimedOut => {
                    tracing::error!(
                        url,
                        attempts = machine.attempts(),
                        deadline_ms = self.config.deadline.as_millis() as u64,
                        "Server did not become ready"
                    );
                    return Err(ProbeError::StartupTimeout {
                        url: url.to_string(),
                        deadline: self.config.deadline,
                        attempts: machine.attempts(),
                    });
                }
                ProbeState::Polling | ProbeState::Starting => {
                    if let PollOutcome::Transient { reason } = &outcome {
                        tracing::debug!(url, reason = %reason, "Server not ready yet");
                    }
                    let pause = self.config.backoff.min(machine.remaining(elapsed));
                    std::thread::sleep(pause);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    fn transient() -> PollOutcome {
        PollOutcome::Transient {
            reason: "connection refused".to_string(),
        }
    }

    #[test]
    fn test_machine_initial_state() {
        let machine = ProbeMachine::new(Duration::from_secs(5));
        assert_eq!(machine.state(), ProbeState::Starting);
        assert_eq!(machine.attempts(), 0);
    }

    #[test]
    fn test_machine_transitions() {
        let mut machine = ProbeMachine::new(Duration::from_secs(5));

        assert_eq!(
            machine.observe(&transient(), Duration::from_secs(1)),
            ProbeState::Polling
        );
        assert_eq!(
            machine.observe(&PollOutcome::Answered { status: 503 }, Duration::from_secs(2)),
            ProbeState::Ready
        );
        assert_eq!(machine.attempts(), 2);

        // Terminal states absorb further outcomes
        assert_eq!(
            machine.observe(&transient(), Duration::from_secs(9)),
            ProbeState::Ready
        );
        assert_eq!(machine.attempts(), 2);
    }

    #[test]
    fn test_machine_times_out_at_deadline() {
        let mut machine = ProbeMachine::new(Duration::from_secs(5));
        assert_eq!(
            machine.observe(&transient(), Duration::from_millis(4999)),
            ProbeState::Polling
        );
        assert_eq!(
            machine.observe(&transient(), Duration::from_secs(5)),
            ProbeState::TimedOut
        );
    }

    #[test]
    fn test_any_status_counts_as_ready() {
        let prober = ReadinessProber::new(ProbeConfig::default());
        let report = prober
            .wait_with("http://test", |_| PollOutcome::Answered { status: 404 })
            .unwrap();
        assert_eq!(report.attempts, 1);
        assert_eq!(report.status, 404);
    }

    #[test]
    fn test_retries_until_answer() {
        let prober = ReadinessProber::new(ProbeConfig {
            deadline: Duration::from_secs(2),
            backoff: Duration::from_millis(10),
        });
        let mut calls = 0;
        let report = prober
            .wait_with("http://test", |_| {
                calls += 1;
                if calls < 3 {
                    transient()
                } else {
                    PollOutcome::Answered { status: 200 }
                }
            })
            .unwrap();
        assert_eq!(report.attempts, 3);
    }

    #[test]
    fn test_attempt_timeout_never_exceeds_backoff() {
        let backoff = Duration::from_millis(100);
        let prober = ReadinessProber::new(ProbeConfig {
            deadline: Duration::from_millis(300),
            backoff,
        });
        let result = prober.wait_with("http://test", |timeout| {
            assert!(timeout <= backoff);
            assert!(timeout >= MIN_ATTEMPT_TIMEOUT);
            transient()
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_no_listener_times_out_within_bound() {
        // Bind then drop to get a port that nothing listens on
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let config = ProbeConfig {
            deadline: Duration::from_millis(600),
            backoff: Duration::from_millis(200),
        };
        let prober = ReadinessProber::new(config);

        let start = Instant::now();
        let result = prober.wait_ready(&format!("http://127.0.0.1:{}/", port));
        let elapsed = start.elapsed();

        assert!(matches!(result, Err(ProbeError::StartupTimeout { .. })));
        assert!(
            elapsed <= config.deadline + config.backoff,
            "probe took {:?}",
            elapsed
        );
    }

    #[test]
    fn test_real_listener_is_ready() {
        use std::io::{Read, Write};

        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut buf = [0u8; 1024];
            let _ = stream.read(&mut buf);
            stream
                .write_all(b"HTTP/1.1 500 Internal Server Error\r\ncontent-length: 0\r\n\r\n")
                .unwrap();
        });

        let prober = ReadinessProber::new(ProbeConfig::default());
        let report = prober
            .wait_ready(&format!("http://127.0.0.1:{}/", port))
            .unwrap();
        assert_eq!(report.status, 500);
        server.join().unwrap();
    }
}
