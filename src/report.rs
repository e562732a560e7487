//! Console summary, threshold verdicts and JSON output of finalized results.

use std::fmt;
use std::fs;
use std::path::Path;

use hdrhistogram::Histogram;

use crate::config::LoadConfig;
use crate::error::Result;
use crate::stats::Results;

/// Latency quantiles in seconds, taken from a microsecond histogram.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Distribution {
    pub p50: f64,
    pub p90: f64,
    pub p99: f64,
    pub max: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub success_rate: f64,
    pub average_time: f64,
    pub median_time: f64,
    pub percentile_time_90: f64,
    pub min_time: f64,
    pub max_time: f64,
    pub total_duration: f64,
    pub distribution: Distribution,
    /// Average response time above the threshold.
    pub slow: bool,
    /// Success rate below the threshold.
    pub unreliable: bool,
}

impl Summary {
    pub fn from_results(results: &Results, config: &LoadConfig) -> Self {
        let success_rate = results.success_rate();
        Summary {
            total_requests: results.total_requests,
            successful_requests: results.successful_requests,
            failed_requests: results.failed_requests,
            success_rate,
            average_time: results.average_time,
            median_time: results.median_time,
            percentile_time_90: results.percentile_time_90,
            min_time: results.min_time,
            max_time: results.max_time,
            total_duration: results.total_duration,
            distribution: distribution(results.valid_times()),
            slow: results.average_time > config.threshold_time,
            unreliable: success_rate < config.threshold_success,
        }
    }

    /// Logs the figures through `tracing`, threshold violations as warnings.
    pub fn log(&self) {
        tracing::info!(
            total = self.total_requests,
            successful = self.successful_requests,
            failed = self.failed_requests,
            "Test results"
        );
        tracing::info!(
            "Average {:.2}s, median {:.2}s, p90 {:.2}s, min {:.2}s, max {:.2}s",
            self.average_time,
            self.median_time,
            self.percentile_time_90,
            self.min_time,
            self.max_time
        );
        tracing::info!("Success rate: {:.2}%", self.success_rate);
        if self.slow {
            tracing::warn!("Average response time is higher than the threshold");
        }
        if self.unreliable {
            tracing::warn!("Success rate is lower than the threshold");
        }
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "========================================")?;
        writeln!(f, "RESULTS:")?;
        writeln!(f, "- Total requests: {}", self.total_requests)?;
        writeln!(f, "- Successful requests: {}", self.successful_requests)?;
        writeln!(f, "- Failed requests: {}", self.failed_requests)?;
        writeln!(f, "- Average response time: {:.2} seconds", self.average_time)?;
        writeln!(f, "- Median response time: {:.2} seconds", self.median_time)?;
        writeln!(
            f,
            "- 90th percentile response time: {:.2} seconds",
            self.percentile_time_90
        )?;
        writeln!(f, "- Min response time: {:.2} seconds", self.min_time)?;
        writeln!(f, "- Max response time: {:.2} seconds", self.max_time)?;
        writeln!(f, "- Success rate: {:.2}%", self.success_rate)?;
        writeln!(f, "- Storm duration: {:.2} seconds", self.total_duration)?;
        if self.total_duration > 0.0 {
            writeln!(
                f,
                "- Requests/sec: {:.2}",
                self.total_requests as f64 / self.total_duration
            )?;
        }
        writeln!(f)?;
        writeln!(f, "Latency distribution:")?;
        writeln!(f, "  50%: {:.2}ms", self.distribution.p50 * 1000.0)?;
        writeln!(f, "  90%: {:.2}ms", self.distribution.p90 * 1000.0)?;
        writeln!(f, "  99%: {:.2}ms", self.distribution.p99 * 1000.0)?;
        writeln!(f, "  Max: {:.2}ms", self.distribution.max * 1000.0)?;
        writeln!(f)?;
        if self.slow {
            writeln!(f, "- Average response time is higher than the threshold.")?;
        } else {
            writeln!(f, "- Average response time is within the acceptable range.")?;
        }
        if self.unreliable {
            writeln!(f, "- Success rate is lower than the threshold.")?;
        } else {
            writeln!(f, "- Success rate meets the threshold.")?;
        }
        writeln!(f, "========================================")
    }
}

/// Highest trackable latency, one hour in microseconds.
const MAX_TRACKED_MICROS: u64 = 3_600_000_000;

fn distribution(samples: &[f64]) -> Distribution {
    let mut histogram = match Histogram::<u64>::new_with_bounds(1, MAX_TRACKED_MICROS, 3) {
        Ok(histogram) => histogram,
        Err(_) => return Distribution::default(),
    };
    for secs in samples {
        let micros = (secs * 1_000_000.0).round() as u64;
        histogram.saturating_record(micros.max(1));
    }
    if histogram.is_empty() {
        return Distribution::default();
    }
    let secs = |micros: u64| micros as f64 / 1_000_000.0;
    Distribution {
        p50: secs(histogram.value_at_quantile(0.5)),
        p90: secs(histogram.value_at_quantile(0.9)),
        p99: secs(histogram.value_at_quantile(0.99)),
        max: secs(histogram.max()),
    }
}

/// Writes the results as pretty-printed JSON.
pub fn write_json(results: &Results, path: impl AsRef<Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(results)?;
    fs::write(path, json)?;
    Ok(())
}
