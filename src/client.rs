use std::time::Duration;

use bytes::Bytes;
use http_body_util::Full;
use hyper_tls::HttpsConnector;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client as HyperClient;
use hyper_util::rt::TokioExecutor;

/// Pooled HTTP(S) client shared by every worker. Cloning shares the pool.
pub type HttpClient = HyperClient<HttpsConnector<HttpConnector>, Full<Bytes>>;

pub fn build_client() -> HttpClient {
    let mut http = HttpConnector::new();
    http.enforce_http(false);
    let https = HttpsConnector::new_with_connector(http);
    HyperClient::builder(TokioExecutor::new())
        .pool_idle_timeout(Duration::from_secs(90))
        .pool_max_idle_per_host(100)
        .build(https)
}
