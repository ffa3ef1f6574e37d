use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, header};
use std::time::Duration;
use tracing::debug;

use crate::error::{TransportError, truncate_body};

use super::Transport;

/// `reqwest`-backed transport rooted at a backend base URL.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    base_url: String,
    http: Client,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, TransportError> {
        let http = Client::builder()
            .user_agent(concat!("forecast-core/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;

        Ok(Self::with_client(base_url, http))
    }

    pub fn with_client(base_url: impl Into<String>, http: Client) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { base_url, http }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url_for(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, path: &str) -> Result<String, TransportError> {
        let url = self.url_for(path);
        // cache buster, some proxies in front of the backend ignore no-cache
        let buster = Utc::now().timestamp_millis().to_string();

        let res = self
            .http
            .get(&url)
            .query(&[("t", buster.as_str())])
            .header(header::CACHE_CONTROL, "no-cache")
            .header(header::PRAGMA, "no-cache")
            .send()
            .await?;

        let status = res.status();
        debug!(%url, %status, "response received");

        let body = res.text().await?;

        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
                body: truncate_body(&body),
            });
        }

        Ok(body)
    }
}
