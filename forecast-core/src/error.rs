use std::time::Duration;
use thiserror::Error;

/// Network-level failure of a single candidate request.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },
}

/// Payload arrived but could not be turned into a forecast.
#[derive(Debug, Error)]
pub enum ShapeError {
    #[error("response is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("no forecast array found in response")]
    MissingArray,

    #[error("forecast array is empty")]
    EmptyForecast,

    #[error("no forecast entry carried a usable date")]
    NoUsableDays,

    #[error("backend reported an error: {0}")]
    Backend(String),
}

/// Failure of one candidate endpoint. Both kinds mean "try the next one".
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("{endpoint}: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: TransportError,
    },

    #[error("{endpoint}: {source}")]
    Shape {
        endpoint: String,
        #[source]
        source: ShapeError,
    },
}

impl FetchError {
    pub fn endpoint(&self) -> &str {
        match self {
            FetchError::Transport { endpoint, .. } | FetchError::Shape { endpoint, .. } => endpoint,
        }
    }
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cache entry is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("cache entry is malformed: {0}")]
    Invalid(String),
}

pub(crate) fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    if body.len() > MAX {
        let mut end = MAX;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &body[..end])
    } else {
        body.to_string()
    }
}
