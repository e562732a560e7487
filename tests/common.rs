use std::net::TcpListener;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use stormforce::{AttemptOutcome, EventSink, LoadConfig, Results, RunEvent, FAILED_LATENCY};

// Not all helpers are used by every test file.

/// Collects every event emitted during a run.
#[derive(Default, Clone)]
pub struct Recorder {
    events: Arc<Mutex<Vec<RunEvent>>>,
}

#[allow(dead_code)]
impl Recorder {
    pub fn sink(&self) -> Arc<dyn EventSink> {
        let events = self.events.clone();
        Arc::new(move |event: &RunEvent| events.lock().unwrap().push(event.clone()))
    }

    pub fn events(&self) -> Vec<RunEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn outcomes(&self) -> Vec<AttemptOutcome> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                RunEvent::Attempt { outcome, .. } => Some(outcome),
                _ => None,
            })
            .collect()
    }

    pub fn exhausted(&self) -> usize {
        self.events()
            .iter()
            .filter(|event| matches!(event, RunEvent::RetriesExhausted { .. }))
            .count()
    }
}

/// Storm-only configuration: warmup traffic is kept out of the statistics.
#[allow(dead_code)]
pub fn build_configuration(url: String, requests: usize, workers: usize) -> LoadConfig {
    let mut config = LoadConfig::new(url);
    config.requests = requests;
    config.workers = workers;
    config.timeout = Duration::from_secs(5);
    config.include_warmup_in_stats = false;
    config
}

/// A URL on a local port nothing listens on.
#[allow(dead_code)]
pub fn closed_port_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("failed to bind a local port");
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{}/", port)
}

/// Checks the invariants every finalized run must satisfy.
#[allow(dead_code)]
pub fn assert_consistent(results: &Results) {
    assert_eq!(
        results.successful_requests + results.failed_requests,
        results.total_requests
    );
    assert_eq!(results.response_times.len() as u64, results.total_requests);

    let sentinels = results
        .response_times
        .iter()
        .filter(|t| **t == FAILED_LATENCY)
        .count() as u64;
    assert_eq!(sentinels, results.failed_requests);
    assert!(results
        .response_times
        .iter()
        .all(|t| *t >= 0.0 || *t == FAILED_LATENCY));

    if results.successful_requests > 0 {
        for t in results.valid_times() {
            assert!(results.min_time <= *t && *t <= results.max_time);
        }
    }
}
