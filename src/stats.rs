use std::time::Duration;

use serde::Serialize;

/// Latency entry recorded for a request that produced no valid timed success.
pub const FAILED_LATENCY: f64 = -1.0;

/// Aggregate outcome of a run.
///
/// Workers never share one `Results`: each unit of work records into its own
/// shard, and shards are folded together with [`Results::merge`] on a single
/// task. [`Results::finalize`] derives the summary fields once all shards are in.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Results {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    /// Seconds per request, [`FAILED_LATENCY`] for failures. Sorted by `finalize`.
    pub response_times: Vec<f64>,
    /// One entry per failure that reached the server.
    pub failed_status_codes: Vec<u16>,
    pub min_time: f64,
    pub max_time: f64,
    pub median_time: f64,
    pub percentile_time_90: f64,
    pub average_time: f64,
    /// Wall-clock seconds of the storm phase.
    pub total_duration: f64,
}

impl Default for Results {
    fn default() -> Self {
        Results {
            total_requests: 0,
            successful_requests: 0,
            failed_requests: 0,
            response_times: Vec::new(),
            failed_status_codes: Vec::new(),
            min_time: f64::INFINITY,
            max_time: 0.0,
            median_time: 0.0,
            percentile_time_90: 0.0,
            average_time: 0.0,
            total_duration: 0.0,
        }
    }
}

impl Results {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(requests: usize) -> Self {
        Results {
            response_times: Vec::with_capacity(requests),
            ..Self::default()
        }
    }

    pub fn record_success(&mut self, latency: Duration) {
        let secs = latency.as_secs_f64();
        self.response_times.push(secs);
        self.min_time = self.min_time.min(secs);
        self.max_time = self.max_time.max(secs);
        self.total_requests += 1;
        self.successful_requests += 1;
    }

    /// Records a failed request, with the status code when a response was received.
    pub fn record_failure(&mut self, status: Option<u16>) {
        if let Some(status) = status {
            self.failed_status_codes.push(status);
        }
        self.response_times.push(FAILED_LATENCY);
        self.total_requests += 1;
        self.failed_requests += 1;
    }

    /// Folds a shard into this record. Entries are appended in arrival order.
    pub fn merge(&mut self, other: Results) {
        self.total_requests += other.total_requests;
        self.successful_requests += other.successful_requests;
        self.failed_requests += other.failed_requests;
        self.response_times.extend(other.response_times);
        self.failed_status_codes.extend(other.failed_status_codes);
        self.min_time = self.min_time.min(other.min_time);
        self.max_time = self.max_time.max(other.max_time);
    }

    /// Valid (non-sentinel) latencies of a finalized record, ascending.
    pub fn valid_times(&self) -> &[f64] {
        let first_valid = self.response_times.partition_point(|t| *t < 0.0);
        &self.response_times[first_valid..]
    }

    /// Sorts the latencies and derives median, p90, mean and duration.
    ///
    /// Median is the element at `count / 2` of the valid samples (the upper of
    /// the two middle elements for even counts), p90 the element at
    /// `floor(0.9 * count)`. The mean divides by every recorded request,
    /// failures included. Running this twice yields the same values.
    pub fn finalize(&mut self, storm_duration: Duration) {
        self.response_times.sort_by(f64::total_cmp);

        let valid = self.valid_times();
        let median = percentile_at(valid, valid.len() / 2);
        let p90 = percentile_at(valid, (valid.len() as f64 * 0.9) as usize);
        let sum: f64 = valid.iter().sum();
        let no_samples = valid.is_empty();

        self.median_time = median;
        self.percentile_time_90 = p90;
        self.average_time = if self.response_times.is_empty() {
            0.0
        } else {
            sum / self.response_times.len() as f64
        };
        if no_samples {
            self.min_time = 0.0;
            self.max_time = 0.0;
        }
        self.total_duration = storm_duration.as_secs_f64();
    }

    /// Successful requests as a percentage of all recorded requests.
    pub fn success_rate(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.successful_requests as f64 / self.total_requests as f64 * 100.0
        }
    }
}

fn percentile_at(sorted: &[f64], index: usize) -> f64 {
    match sorted.len() {
        0 => 0.0,
        len => sorted[index.min(len - 1)],
    }
}
