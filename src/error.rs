//! Error types for stormforce

use thiserror::Error;

/// Errors surfaced to the caller of the engine.
///
/// Individual request failures never show up here: they are recorded in
/// [`Results`](crate::stats::Results) and reported as events.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration rejected before the run started
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("invalid response pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("invalid header {0:?}: expected key:value")]
    InvalidHeader(String),

    /// Worker pool used outside its lifecycle
    #[error("worker pool error: {0}")]
    Pool(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
