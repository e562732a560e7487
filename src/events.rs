//! Structured events emitted by the engine.
//!
//! The engine reports progress through an [`EventSink`] handed to it by the
//! caller instead of writing to a global logger. The binary installs
//! [`TracingSink`]; tests can pass a closure and inspect what was emitted.

use std::time::Duration;

use hyper::Method;

/// How a single attempt ended.
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptOutcome {
    Success { status: u16 },
    /// Status >= 400. Terminal, not retried.
    HttpFailure { status: u16 },
    /// Body did not match the response pattern. Terminal, not retried.
    PatternMismatch { status: u16 },
    /// The request could not be built. Retried.
    InvalidRequest(String),
    /// Connection or body read error. Retried.
    Transport(String),
    /// No complete response within the per-attempt timeout. Retried.
    TimedOut,
}

impl AttemptOutcome {
    /// Whether the executor moves on to the next attempt after this outcome.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AttemptOutcome::InvalidRequest(_)
                | AttemptOutcome::Transport(_)
                | AttemptOutcome::TimedOut
        )
    }

    /// Status code of the response, if one was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            AttemptOutcome::Success { status }
            | AttemptOutcome::HttpFailure { status }
            | AttemptOutcome::PatternMismatch { status } => Some(*status),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RunEvent {
    RunStarted {
        url: String,
        method: Method,
        requests: usize,
        workers: usize,
        retry_limit: usize,
        threshold_time: f64,
        threshold_success: f64,
    },
    WarmupStarted {
        requests: usize,
    },
    WarmupFinished {
        elapsed: Duration,
    },
    StormStarted {
        requests: usize,
        workers: usize,
    },
    StormFinished {
        elapsed: Duration,
    },
    Attempt {
        /// 1-based attempt index.
        attempt: usize,
        retry_limit: usize,
        duration: Duration,
        outcome: AttemptOutcome,
    },
    RetriesExhausted {
        retry_limit: usize,
    },
    /// Units of work that never reported completion, e.g. after a panic.
    UnitsLost {
        count: usize,
    },
}

/// Receiver of engine events. Implementations must tolerate concurrent calls.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &RunEvent);
}

impl<F> EventSink for F
where
    F: Fn(&RunEvent) + Send + Sync,
{
    fn emit(&self, event: &RunEvent) {
        self(event)
    }
}

/// Forwards events to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: &RunEvent) {
        match event {
            RunEvent::RunStarted {
                url,
                method,
                requests,
                workers,
                retry_limit,
                threshold_time,
                threshold_success,
            } => {
                tracing::info!(
                    "Starting load test with {} requests and {} threads",
                    requests,
                    workers
                );
                tracing::info!("URL: {}", url);
                tracing::info!("Method: {}", method);
                tracing::info!("Retry limit: {}", retry_limit);
                tracing::info!("Threshold time: {:.2} seconds", threshold_time);
                tracing::info!("Threshold success rate: {:.2}%", threshold_success);
            }
            RunEvent::WarmupStarted { requests } => {
                tracing::info!("Starting warmup with {} requests", requests);
            }
            RunEvent::WarmupFinished { elapsed } => {
                tracing::info!("Warmup complete in {:.2}s", elapsed.as_secs_f64());
            }
            RunEvent::StormStarted { requests, workers } => {
                tracing::info!(
                    "Starting the storm: {} requests over {} workers",
                    requests,
                    workers
                );
            }
            RunEvent::StormFinished { elapsed } => {
                tracing::info!("Storm finished in {:.2}s", elapsed.as_secs_f64());
            }
            RunEvent::Attempt {
                attempt,
                retry_limit,
                duration,
                outcome,
            } => {
                let secs = duration.as_secs_f64();
                match outcome {
                    AttemptOutcome::Success { status } => {
                        tracing::info!(
                            status,
                            "Successful request: Status {}, Time: {:.2}s",
                            status,
                            secs
                        );
                    }
                    AttemptOutcome::HttpFailure { status } => {
                        tracing::warn!(
                            status,
                            "Failed request: Status {}, Time: {:.2}s (Attempt {}/{})",
                            status,
                            secs,
                            attempt,
                            retry_limit
                        );
                    }
                    AttemptOutcome::PatternMismatch { status } => {
                        tracing::warn!(
                            status,
                            "Response doesn't match the expected pattern, Time: {:.2}s",
                            secs
                        );
                    }
                    AttemptOutcome::InvalidRequest(e) => {
                        tracing::warn!(
                            "Error creating request: {} (Attempt {}/{})",
                            e,
                            attempt,
                            retry_limit
                        );
                    }
                    AttemptOutcome::Transport(e) => {
                        tracing::warn!(
                            "Request error: {} (Attempt {}/{})",
                            e,
                            attempt,
                            retry_limit
                        );
                    }
                    AttemptOutcome::TimedOut => {
                        tracing::warn!(
                            "Request timeout after {:.2}s (Attempt {}/{})",
                            secs,
                            attempt,
                            retry_limit
                        );
                    }
                }
            }
            RunEvent::RetriesExhausted { retry_limit } => {
                tracing::error!("Request failed after {} attempts", retry_limit);
            }
            RunEvent::UnitsLost { count } => {
                tracing::error!("{} units of work never completed", count);
            }
        }
    }
}
