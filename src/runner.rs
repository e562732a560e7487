//! Run orchestration: warmup, storm, finalize.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::client::build_client;
use crate::config::LoadConfig;
use crate::error::Result;
use crate::events::{EventSink, RunEvent};
use crate::executor::RequestExecutor;
use crate::pool::WorkerPool;
use crate::stats::Results;

/// Runs a complete load test and returns the finalized results.
///
/// Only an invalid configuration or a broken worker pool produce an error;
/// failing requests are part of the returned statistics.
pub async fn run(config: LoadConfig, events: Arc<dyn EventSink>) -> Result<Results> {
    config.validate()?;
    let config = Arc::new(config);
    let executor = RequestExecutor::new(build_client(), config.clone(), events.clone());

    events.emit(&RunEvent::RunStarted {
        url: config.url.clone(),
        method: config.method.clone(),
        requests: config.requests,
        workers: config.workers,
        retry_limit: config.retry_limit,
        threshold_time: config.threshold_time,
        threshold_success: config.threshold_success,
    });

    let mut results = Results::with_capacity(config.requests + config.workers);
    if config.warmup {
        warmup(&executor, &config, events.as_ref(), &mut results).await;
    }

    let elapsed = storm(&executor, &config, events.as_ref(), &mut results).await?;
    events.emit(&RunEvent::StormFinished { elapsed });

    results.finalize(elapsed);
    Ok(results)
}

/// Sends `workers` requests one after another on the calling task.
async fn warmup(
    executor: &RequestExecutor,
    config: &LoadConfig,
    events: &dyn EventSink,
    results: &mut Results,
) {
    events.emit(&RunEvent::WarmupStarted {
        requests: config.workers,
    });
    let start = Instant::now();

    let mut discarded = Results::new();
    let target = if config.include_warmup_in_stats {
        results
    } else {
        &mut discarded
    };
    for _ in 0..config.workers {
        executor.execute(target).await;
    }

    events.emit(&RunEvent::WarmupFinished {
        elapsed: start.elapsed(),
    });
}

/// Pushes `requests` units of work through the pool and merges their shards.
///
/// Returns the time from the start of the phase to the last completion.
async fn storm(
    executor: &RequestExecutor,
    config: &LoadConfig,
    events: &dyn EventSink,
    results: &mut Results,
) -> Result<Duration> {
    events.emit(&RunEvent::StormStarted {
        requests: config.requests,
        workers: config.workers,
    });
    let start = Instant::now();

    let mut pool = WorkerPool::new(config.workers);
    pool.start();

    let (done_tx, done_rx) = flume::unbounded::<Results>();
    let mut completed = 0;
    for _ in 0..config.requests {
        let executor = executor.clone();
        let done = done_tx.clone();
        let submitted = {
            let submit = pool.submit(async move {
                let mut shard = Results::new();
                executor.execute(&mut shard).await;
                let _ = done.send(shard);
            });
            tokio::pin!(submit);

            // merge finished shards while waiting for queue space
            loop {
                tokio::select! {
                    submitted = &mut submit => break submitted,
                    Ok(shard) = done_rx.recv_async() => {
                        results.merge(shard);
                        completed += 1;
                    }
                }
            }
        };
        if let Err(e) = submitted {
            pool.stop().await;
            return Err(e);
        }
    }
    // Completion senders now live only inside queued units; a unit that
    // panics drops its sender, which ends the wait below instead of hanging.
    drop(done_tx);

    while completed < config.requests {
        match done_rx.recv_async().await {
            Ok(shard) => {
                results.merge(shard);
                completed += 1;
            }
            Err(_) => break,
        }
    }
    let elapsed = start.elapsed();
    pool.stop().await;

    if completed < config.requests {
        events.emit(&RunEvent::UnitsLost {
            count: config.requests - completed,
        });
    }
    Ok(elapsed)
}
