use async_trait::async_trait;
use std::fmt::Debug;

use crate::error::TransportError;

pub mod http;

pub use http::HttpTransport;

/// Fetches the raw body behind an endpoint path.
///
/// Implementations return `Err` for any non-success status; the caller
/// decides what a body means.
#[async_trait]
pub trait Transport: Send + Sync + Debug {
    async fn get(&self, path: &str) -> Result<String, TransportError>;
}
