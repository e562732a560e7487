//! Concurrent HTTP load generator.
//!
//! [`run`] sends a warmup round of requests, then fires the configured number
//! of requests through a fixed-size [`WorkerPool`], and returns the
//! aggregated, finalized [`Results`].

pub mod charts;
pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod executor;
pub mod logging;
pub mod pool;
pub mod report;
pub mod runner;
pub mod stats;

pub use config::{Args, LoadConfig};
pub use error::{Error, Result};
pub use events::{AttemptOutcome, EventSink, RunEvent, TracingSink};
pub use executor::RequestExecutor;
pub use pool::WorkerPool;
pub use report::Summary;
pub use runner::run;
pub use stats::{Results, FAILED_LATENCY};
