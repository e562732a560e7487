//! Run configuration and the command-line / environment layer that produces it.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use hyper::Method;
use regex::bytes::Regex;
use url::Url;

use crate::error::{Error, Result};
use crate::logging::LogSettings;

/// Immutable configuration of a single load test run.
#[derive(Debug, Clone)]
pub struct LoadConfig {
    pub url: String,
    pub method: Method,
    /// Only sent with POST requests.
    pub body: Option<String>,
    /// Overrides any user supplied `Authorization` header.
    pub bearer_token: Option<String>,
    pub headers: BTreeMap<String, String>,
    /// Number of requests in the storm phase.
    pub requests: usize,
    /// Worker count; also the warmup request count and the pool queue capacity.
    pub workers: usize,
    /// Maximum attempts per request. Only transport level failures are retried.
    pub retry_limit: usize,
    /// Per-attempt timeout covering send and full body read.
    pub timeout: Duration,
    /// Searched (not fully matched) against each successful response body.
    pub response_pattern: Option<Regex>,
    /// Average latency threshold in seconds, used by the report only.
    pub threshold_time: f64,
    /// Success rate threshold in percent, used by the report only.
    pub threshold_success: f64,
    pub warmup: bool,
    /// Fold warmup requests into the final statistics.
    pub include_warmup_in_stats: bool,
}

impl LoadConfig {
    pub fn new(url: impl Into<String>) -> Self {
        LoadConfig {
            url: url.into(),
            method: Method::GET,
            body: None,
            bearer_token: None,
            headers: BTreeMap::new(),
            requests: 1000,
            workers: 10,
            retry_limit: 3,
            timeout: Duration::from_secs(10),
            response_pattern: None,
            threshold_time: 1.0,
            threshold_success: 95.0,
            warmup: true,
            include_warmup_in_stats: true,
        }
    }

    /// Compiles `pattern` once, failing fast on invalid syntax.
    pub fn with_response_pattern(mut self, pattern: &str) -> Result<Self> {
        self.response_pattern = Some(Regex::new(pattern)?);
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.url.trim().is_empty() {
            return Err(Error::Config("URL must not be empty".to_string()));
        }
        let url = Url::parse(&self.url)?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::Config(format!(
                "unsupported URL scheme {:?}",
                url.scheme()
            )));
        }
        if self.method != Method::GET && self.method != Method::POST {
            return Err(Error::Config(format!(
                "unsupported method {}, expected GET or POST",
                self.method
            )));
        }
        if self.requests == 0 {
            return Err(Error::Config("request count must be positive".to_string()));
        }
        if self.workers == 0 {
            return Err(Error::Config("worker count must be positive".to_string()));
        }
        if !self.threshold_time.is_finite() || !self.threshold_success.is_finite() {
            return Err(Error::Config("thresholds must be finite".to_string()));
        }
        Ok(())
    }
}

/// Parses `key1:value1,key2:value2`. Empty segments are skipped, later keys win.
pub fn parse_headers(input: &str) -> Result<BTreeMap<String, String>> {
    let mut headers = BTreeMap::new();
    for pair in input.split(',') {
        if pair.trim().is_empty() {
            continue;
        }
        let (key, value) = pair
            .split_once(':')
            .ok_or_else(|| Error::InvalidHeader(pair.to_string()))?;
        let key = key.trim();
        if key.is_empty() {
            return Err(Error::InvalidHeader(pair.to_string()));
        }
        headers.insert(key.to_string(), value.trim().to_string());
    }
    Ok(headers)
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Target URL
    #[arg(env = "URL")]
    pub url: String,

    /// HTTP method (GET or POST)
    #[arg(short = 'm', long, env = "METHOD", default_value = "GET")]
    pub method: String,

    /// Request body, sent with POST only
    #[arg(short = 'b', long = "body", env = "REQUEST_BODY")]
    pub body: Option<String>,

    /// Bearer token for the Authorization header
    #[arg(long, env = "BEARER_TOKEN")]
    pub bearer_token: Option<String>,

    /// Custom headers (key1:value1,key2:value2)
    #[arg(short = 'H', long, env = "HEADERS")]
    pub headers: Option<String>,

    /// Number of requests
    #[arg(short = 'n', long, env = "REQUESTS", default_value_t = 1000)]
    pub requests: usize,

    /// Number of concurrent workers
    #[arg(short = 't', long, env = "THREADS", default_value_t = 10)]
    pub threads: usize,

    /// Attempts per request on transport errors
    #[arg(short = 'r', long, env = "RETRY_LIMIT", default_value_t = 3)]
    pub retry_limit: usize,

    /// Timeout for each attempt in seconds
    #[arg(short = 'T', long, env = "TIMEOUT", default_value_t = 10)]
    pub timeout: u64,

    /// Regex that every successful response body must contain
    #[arg(short = 'p', long, env = "RESPONSE_PATTERN")]
    pub response_pattern: Option<String>,

    /// Average response time threshold in seconds
    #[arg(long, env = "THRESHOLD_TIME", default_value_t = 1.0)]
    pub threshold_time: f64,

    /// Success rate threshold in percent
    #[arg(long, env = "THRESHOLD_SUCCESS", default_value_t = 95.0)]
    pub threshold_success: f64,

    /// Skip the warmup phase
    #[arg(long, env = "NO_WARMUP")]
    pub no_warmup: bool,

    /// Keep warmup requests out of the statistics
    #[arg(long, env = "EXCLUDE_WARMUP")]
    pub exclude_warmup: bool,

    /// Append logs to this file
    #[arg(long, env = "LOG_FILE")]
    pub log_file: Option<PathBuf>,

    #[arg(long, env = "DISABLE_LOGGING")]
    pub disable_logging: bool,

    /// Write results.json after the run
    #[arg(long, env = "JSON_OUTPUT")]
    pub json_output: bool,

    /// Where the HTML charts are written
    #[arg(long, env = "CHART_FILE", default_value = "load_test_results.html")]
    pub chart_file: PathBuf,

    /// Skip writing the HTML charts
    #[arg(long, env = "NO_CHARTS")]
    pub no_charts: bool,
}

impl Args {
    pub fn into_config(self) -> Result<LoadConfig> {
        let method = self
            .method
            .trim()
            .to_ascii_uppercase()
            .parse::<Method>()
            .map_err(|e| Error::Config(format!("invalid method {:?}: {}", self.method, e)))?;

        let mut config = LoadConfig::new(self.url);
        config.method = method;
        config.body = non_empty(self.body);
        config.bearer_token = non_empty(self.bearer_token);
        if let Some(headers) = non_empty(self.headers) {
            config.headers = parse_headers(&headers)?;
        }
        config.requests = self.requests;
        config.workers = self.threads;
        config.retry_limit = self.retry_limit;
        config.timeout = Duration::from_secs(self.timeout);
        config.threshold_time = self.threshold_time;
        config.threshold_success = self.threshold_success;
        config.warmup = !self.no_warmup;
        config.include_warmup_in_stats = !self.exclude_warmup;
        if let Some(pattern) = non_empty(self.response_pattern) {
            config = config.with_response_pattern(&pattern)?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn log_settings(&self) -> LogSettings {
        LogSettings {
            file: self.log_file.clone(),
            disabled: self.disable_logging,
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}
