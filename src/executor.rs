use std::error::Error as StdError;
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, LOCATION};
use hyper::{Method, Request, StatusCode, Uri};
use metrics::{counter, histogram};
use tokio::time;
use url::Url;

use crate::client::HttpClient;
use crate::config::LoadConfig;
use crate::events::{AttemptOutcome, EventSink, RunEvent};
use crate::stats::Results;

/// Redirect hops followed within one attempt.
const MAX_REDIRECTS: usize = 10;

/// Issues one logical request per `execute` call, retrying transport failures.
#[derive(Clone)]
pub struct RequestExecutor {
    client: HttpClient,
    config: Arc<LoadConfig>,
    events: Arc<dyn EventSink>,
}

impl RequestExecutor {
    pub fn new(client: HttpClient, config: Arc<LoadConfig>, events: Arc<dyn EventSink>) -> Self {
        RequestExecutor {
            client,
            config,
            events,
        }
    }

    /// Runs up to `retry_limit` attempts and records exactly one outcome in `results`.
    ///
    /// A received response ends the loop whatever its status; only attempts
    /// that never produced a response are retried.
    pub async fn execute(&self, results: &mut Results) {
        let retry_limit = self.config.retry_limit;

        for attempt in 1..=retry_limit {
            let start = Instant::now();
            let outcome = self.attempt().await;
            let duration = start.elapsed();

            counter!("stormforce_attempts_total", "outcome" => outcome_label(&outcome))
                .increment(1);
            self.events.emit(&RunEvent::Attempt {
                attempt,
                retry_limit,
                duration,
                outcome: outcome.clone(),
            });

            if outcome.is_retryable() {
                continue;
            }
            if let AttemptOutcome::Success { .. } = outcome {
                counter!("stormforce_requests_succeeded_total").increment(1);
                histogram!("stormforce_request_latency_seconds").record(duration.as_secs_f64());
                results.record_success(duration);
            } else {
                counter!("stormforce_requests_failed_total").increment(1);
                results.record_failure(outcome.status());
            }
            return;
        }

        counter!("stormforce_requests_failed_total").increment(1);
        self.events.emit(&RunEvent::RetriesExhausted { retry_limit });
        results.record_failure(None);
    }

    async fn attempt(&self) -> AttemptOutcome {
        let request = match self.build_request() {
            Ok(request) => request,
            Err(e) => return AttemptOutcome::InvalidRequest(e.to_string()),
        };

        match time::timeout(self.config.timeout, self.send(request)).await {
            Ok(Ok((status, body))) => self.classify(status, &body),
            Ok(Err(e)) => AttemptOutcome::Transport(e),
            Err(_) => AttemptOutcome::TimedOut,
        }
    }

    fn build_request(&self) -> Result<Request<Full<Bytes>>, hyper::http::Error> {
        let config = &self.config;
        let mut request = Request::builder()
            .method(config.method.clone())
            .uri(config.url.as_str())
            .body(self.body_for(&config.method))?;

        let headers = request.headers_mut();
        for (name, value) in &config.headers {
            headers.insert(
                HeaderName::from_bytes(name.as_bytes())?,
                HeaderValue::from_str(value)?,
            );
        }
        if let Some(token) = &config.bearer_token {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {}", token))?,
            );
        }

        Ok(request)
    }

    /// The configured body goes out with POST only.
    fn body_for(&self, method: &Method) -> Full<Bytes> {
        match &self.config.body {
            Some(body) if *method == Method::POST && !body.is_empty() => {
                Full::new(Bytes::from(body.clone()))
            }
            _ => Full::new(Bytes::new()),
        }
    }

    /// Sends `request`, following redirects, and reads the final body.
    async fn send(&self, mut request: Request<Full<Bytes>>) -> Result<(StatusCode, Bytes), String> {
        let mut redirects = 0;
        loop {
            let method = request.method().clone();
            let uri = request.uri().clone();
            let headers = request.headers().clone();

            let response = self
                .client
                .request(request)
                .await
                .map_err(|e| describe(&e))?;
            let status = response.status();
            let location = response
                .headers()
                .get(LOCATION)
                .filter(|_| status.is_redirection())
                .cloned();
            let body = response
                .into_body()
                .collect()
                .await
                .map_err(|e| describe(&e))?
                .to_bytes();

            let Some(location) = location else {
                return Ok((status, body));
            };
            if redirects == MAX_REDIRECTS {
                return Err(format!("stopped after {} redirects", MAX_REDIRECTS));
            }
            redirects += 1;
            request = self.follow(&method, &uri, headers, status, &location)?;
        }
    }

    /// Builds the next hop of a redirect chain.
    ///
    /// 307 and 308 repeat the method and body, other redirects continue as a
    /// bodyless GET. `Authorization` is dropped when the target origin changes.
    fn follow(
        &self,
        method: &Method,
        from: &Uri,
        mut headers: HeaderMap,
        status: StatusCode,
        location: &HeaderValue,
    ) -> Result<Request<Full<Bytes>>, String> {
        let base = Url::parse(&from.to_string()).map_err(|e| e.to_string())?;
        let location = location.to_str().map_err(|e| e.to_string())?;
        let target = base
            .join(location)
            .map_err(|e| format!("invalid redirect location {:?}: {}", location, e))?;

        let method = match status {
            StatusCode::TEMPORARY_REDIRECT | StatusCode::PERMANENT_REDIRECT => method.clone(),
            _ if *method == Method::HEAD => Method::HEAD,
            _ => Method::GET,
        };
        if target.host_str() != base.host_str()
            || target.port_or_known_default() != base.port_or_known_default()
        {
            headers.remove(AUTHORIZATION);
        }

        let body = self.body_for(&method);
        let mut request = Request::builder()
            .method(method)
            .uri(target.as_str())
            .body(body)
            .map_err(|e| e.to_string())?;
        *request.headers_mut() = headers;
        Ok(request)
    }

    fn classify(&self, status: StatusCode, body: &[u8]) -> AttemptOutcome {
        let status = status.as_u16();
        if status >= 400 {
            return AttemptOutcome::HttpFailure { status };
        }
        match &self.config.response_pattern {
            Some(pattern) if !pattern.is_match(body) => {
                AttemptOutcome::PatternMismatch { status }
            }
            _ => AttemptOutcome::Success { status },
        }
    }
}

fn outcome_label(outcome: &AttemptOutcome) -> &'static str {
    match outcome {
        AttemptOutcome::Success { .. } => "success",
        AttemptOutcome::HttpFailure { .. } => "http_failure",
        AttemptOutcome::PatternMismatch { .. } => "pattern_mismatch",
        AttemptOutcome::InvalidRequest(_) => "invalid_request",
        AttemptOutcome::Transport(_) => "transport",
        AttemptOutcome::TimedOut => "timeout",
    }
}

// hyper's top level errors are terse, the cause sits further down the chain.
fn describe(err: &dyn StdError) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
