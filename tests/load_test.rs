use httpmock::Method::{GET, POST};
use httpmock::MockServer;
use std::time::Duration;

mod common;

use common::{assert_consistent, build_configuration, closed_port_url, Recorder};
use stormforce::{AttemptOutcome, RunEvent, FAILED_LATENCY};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn every_request_succeeds_against_a_healthy_target() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/");
            then.status(200).body("ok");
        })
        .await;

    let mut config = build_configuration(server.url("/"), 100, 10);
    config.retry_limit = 3;
    let results = stormforce::run(config, Recorder::default().sink())
        .await
        .unwrap();

    assert_eq!(results.successful_requests, 100);
    assert_eq!(results.failed_requests, 0);
    assert!(results.failed_status_codes.is_empty());
    assert!(results.response_times.iter().all(|t| *t >= 0.0));
    assert!(results.min_time <= results.median_time);
    assert!(results.median_time <= results.percentile_time_90);
    assert!(results.percentile_time_90 <= results.max_time);
    assert!(results.total_duration > 0.0);
    assert_consistent(&results);
    // warmup requests still hit the server
    assert_eq!(mock.calls_async().await, 110);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn server_errors_are_counted_without_retrying() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/");
            then.status(503);
        })
        .await;

    let recorder = Recorder::default();
    let results = stormforce::run(build_configuration(server.url("/"), 10, 2), recorder.sink())
        .await
        .unwrap();

    assert_eq!(results.successful_requests, 0);
    assert_eq!(results.failed_requests, 10);
    assert_eq!(results.failed_status_codes, vec![503; 10]);
    assert_eq!(results.response_times, vec![FAILED_LATENCY; 10]);
    assert_eq!(results.median_time, 0.0);
    assert_eq!(results.average_time, 0.0);
    assert_consistent(&results);

    // one attempt per request, warmup included
    assert_eq!(mock.calls_async().await, 12);
    assert_eq!(recorder.outcomes().len(), 12);
    assert_eq!(recorder.exhausted(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn pattern_mismatch_fails_a_successful_response() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/status");
            then.status(200).body("failure");
        })
        .await;

    let config = build_configuration(server.url("/status"), 5, 1)
        .with_response_pattern("success")
        .unwrap();
    let recorder = Recorder::default();
    let results = stormforce::run(config, recorder.sink()).await.unwrap();

    assert_eq!(results.successful_requests, 0);
    assert_eq!(results.failed_requests, 5);
    assert_eq!(results.failed_status_codes, vec![200; 5]);
    assert_consistent(&results);
    assert_eq!(mock.calls_async().await, 6);
    assert!(recorder
        .outcomes()
        .iter()
        .all(|o| *o == AttemptOutcome::PatternMismatch { status: 200 }));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn pattern_is_searched_not_fully_matched() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/");
            then.status(200).body(r#"{"status":"success","id":7}"#);
        })
        .await;

    let config = build_configuration(server.url("/"), 5, 2)
        .with_response_pattern(r#""status":"success""#)
        .unwrap();
    let results = stormforce::run(config, Recorder::default().sink())
        .await
        .unwrap();

    assert_eq!(results.successful_requests, 5);
    assert_consistent(&results);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn transport_errors_are_retried_up_to_the_limit() {
    let mut config = build_configuration(closed_port_url(), 5, 2);
    config.retry_limit = 3;
    config.warmup = false;

    let recorder = Recorder::default();
    let results = stormforce::run(config, recorder.sink()).await.unwrap();

    assert_eq!(results.total_requests, 5);
    assert_eq!(results.failed_requests, 5);
    assert!(results.failed_status_codes.is_empty());
    assert_consistent(&results);

    let outcomes = recorder.outcomes();
    assert_eq!(outcomes.len(), 15);
    assert!(outcomes
        .iter()
        .all(|o| matches!(o, AttemptOutcome::Transport(_))));
    assert_eq!(recorder.exhausted(), 5);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn timeouts_are_retried() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/slow");
            then.status(200).delay(Duration::from_millis(500));
        })
        .await;

    let mut config = build_configuration(server.url("/slow"), 2, 2);
    config.timeout = Duration::from_millis(50);
    config.retry_limit = 2;
    config.warmup = false;

    let recorder = Recorder::default();
    let results = stormforce::run(config, recorder.sink()).await.unwrap();

    assert_eq!(results.failed_requests, 2);
    assert!(results.failed_status_codes.is_empty());
    let outcomes = recorder.outcomes();
    assert_eq!(outcomes.len(), 4);
    assert!(outcomes.iter().all(|o| *o == AttemptOutcome::TimedOut));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn warmup_is_folded_in_by_default() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/");
            then.status(200).body("ok");
        })
        .await;

    let mut config = build_configuration(server.url("/"), 20, 5);
    config.include_warmup_in_stats = true;
    let results = stormforce::run(config, Recorder::default().sink())
        .await
        .unwrap();

    assert_eq!(results.total_requests, 25);
    assert_eq!(results.successful_requests, 25);
    assert_consistent(&results);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn phases_run_in_order() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/");
            then.status(204);
        })
        .await;

    let recorder = Recorder::default();
    let results = stormforce::run(build_configuration(server.url("/"), 8, 3), recorder.sink())
        .await
        .unwrap();
    assert_eq!(results.successful_requests, 8);
    assert_eq!(mock.calls_async().await, 11);

    let phases: Vec<_> = recorder
        .events()
        .iter()
        .filter_map(|event| match event {
            RunEvent::RunStarted { .. } => Some("run"),
            RunEvent::WarmupStarted { .. } => Some("warmup started"),
            RunEvent::WarmupFinished { .. } => Some("warmup finished"),
            RunEvent::StormStarted { .. } => Some("storm started"),
            RunEvent::StormFinished { .. } => Some("storm finished"),
            _ => None,
        })
        .collect();
    assert_eq!(
        phases,
        vec![
            "run",
            "warmup started",
            "warmup finished",
            "storm started",
            "storm finished"
        ]
    );

    // warmup attempts come before any storm attempt
    let events = recorder.events();
    let storm_start = events
        .iter()
        .position(|event| matches!(event, RunEvent::StormStarted { .. }))
        .unwrap();
    let warmup_attempts = events[..storm_start]
        .iter()
        .filter(|event| matches!(event, RunEvent::Attempt { .. }))
        .count();
    assert_eq!(warmup_attempts, 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn skipping_warmup_sends_exactly_the_storm() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/");
            then.status(200);
        })
        .await;

    let mut config = build_configuration(server.url("/"), 7, 4);
    config.warmup = false;
    let results = stormforce::run(config, Recorder::default().sink())
        .await
        .unwrap();

    assert_eq!(results.total_requests, 7);
    assert_eq!(mock.calls_async().await, 7);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn post_sends_body_headers_and_bearer_token() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/submit")
                .header("authorization", "Bearer token-123")
                .header("x-client", "stormforce")
                .body(r#"{"a":1}"#);
            then.status(201).body("created");
        })
        .await;

    let mut config = build_configuration(server.url("/submit"), 4, 2);
    config.method = hyper::Method::POST;
    config.body = Some(r#"{"a":1}"#.to_string());
    config.bearer_token = Some("token-123".to_string());
    config
        .headers
        .insert("Authorization".to_string(), "Basic ignored".to_string());
    config
        .headers
        .insert("X-Client".to_string(), "stormforce".to_string());
    config.warmup = false;

    let results = stormforce::run(config, Recorder::default().sink())
        .await
        .unwrap();

    assert_eq!(results.successful_requests, 4);
    assert_eq!(mock.calls_async().await, 4);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn zero_retry_limit_fails_without_sending() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/");
            then.status(200);
        })
        .await;

    let mut config = build_configuration(server.url("/"), 3, 1);
    config.retry_limit = 0;
    config.warmup = false;
    let recorder = Recorder::default();
    let results = stormforce::run(config, recorder.sink()).await.unwrap();

    assert_eq!(results.failed_requests, 3);
    assert_eq!(mock.calls_async().await, 0);
    assert_eq!(recorder.exhausted(), 3);
    assert_consistent(&results);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_updates_are_never_lost() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/");
            then.status(200).body("ok");
        })
        .await;

    let mut config = build_configuration(server.url("/"), 10_000, 50);
    config.warmup = false;
    let results = stormforce::run(config, Recorder::default().sink())
        .await
        .unwrap();

    assert_eq!(results.total_requests, 10_000);
    assert_eq!(results.successful_requests, 10_000);
    assert_eq!(results.response_times.len(), 10_000);
    assert_consistent(&results);
    assert_eq!(mock.calls_async().await, 10_000);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn redirects_are_followed_to_the_final_status() {
    let server = MockServer::start_async().await;
    let redirect = server
        .mock_async(|when, then| {
            when.method(GET).path("/");
            then.status(302).header("Location", "/broken");
        })
        .await;
    let broken = server
        .mock_async(|when, then| {
            when.method(GET).path("/broken");
            then.status(500);
        })
        .await;

    let mut config = build_configuration(server.url("/"), 5, 2);
    config.warmup = false;
    let recorder = Recorder::default();
    let results = stormforce::run(config, recorder.sink()).await.unwrap();

    assert_eq!(results.failed_requests, 5);
    assert_eq!(results.failed_status_codes, vec![500; 5]);
    assert_consistent(&results);
    assert_eq!(redirect.calls_async().await, 5);
    assert_eq!(broken.calls_async().await, 5);
    assert_eq!(recorder.outcomes().len(), 5);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn redirect_to_a_healthy_page_succeeds() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/old");
            then.status(301).header("Location", "/new");
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/new");
            then.status(200).body("moved here, success");
        })
        .await;

    let mut config = build_configuration(server.url("/old"), 4, 2)
        .with_response_pattern("success")
        .unwrap();
    config.warmup = false;
    let results = stormforce::run(config, Recorder::default().sink())
        .await
        .unwrap();

    assert_eq!(results.successful_requests, 4);
    assert_consistent(&results);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn redirect_loops_fail_as_transport_errors() {
    let server = MockServer::start_async().await;
    let looping = server
        .mock_async(|when, then| {
            when.method(GET).path("/loop");
            then.status(302).header("Location", "/loop");
        })
        .await;

    let mut config = build_configuration(server.url("/loop"), 2, 1);
    config.retry_limit = 2;
    config.warmup = false;
    let recorder = Recorder::default();
    let results = stormforce::run(config, recorder.sink()).await.unwrap();

    assert_eq!(results.failed_requests, 2);
    assert!(results.failed_status_codes.is_empty());
    assert_eq!(recorder.exhausted(), 2);
    let outcomes = recorder.outcomes();
    assert_eq!(outcomes.len(), 4);
    assert!(outcomes
        .iter()
        .all(|o| matches!(o, AttemptOutcome::Transport(e) if e.contains("redirects"))));
    // the first hop plus ten followed redirects per attempt
    assert_eq!(looping.calls_async().await, 4 * 11);
}
