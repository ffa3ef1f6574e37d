//! Fakes shared by the client and refresh tests.

use async_trait::async_trait;
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};

use crate::{
    client::{ClientOptions, ForecastClient, Render},
    error::TransportError,
    model::{FetchStatus, ForecastResponse},
    retry::RetryPolicy,
    transport::Transport,
    ForecastCache,
};

#[derive(Debug, Clone)]
pub enum Reply {
    Body(String),
    Status(u16),
    Hang,
}

#[derive(Debug, Default)]
pub struct FakeTransport {
    replies: HashMap<String, Reply>,
    delay: Duration,
    calls: Mutex<Vec<String>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(mut self, path: &str, reply: Reply) -> Self {
        self.replies.insert(path.to_string(), reply);
        self
    }

    pub fn body(self, path: &str, body: serde_json::Value) -> Self {
        self.reply(path, Reply::Body(body.to_string()))
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn get(&self, path: &str) -> Result<String, TransportError> {
        self.calls.lock().unwrap().push(path.to_string());

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        match self.replies.get(path).cloned().unwrap_or(Reply::Status(404)) {
            Reply::Body(body) => Ok(body),
            Reply::Status(status) => Err(TransportError::Status {
                status,
                body: String::new(),
            }),
            Reply::Hang => std::future::pending().await,
        }
    }
}

#[derive(Debug, Default)]
pub struct RecordingRender {
    seen: Mutex<Vec<(ForecastResponse, FetchStatus)>>,
}

impl RecordingRender {
    pub fn seen(&self) -> Vec<(ForecastResponse, FetchStatus)> {
        self.seen.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.seen.lock().unwrap().len()
    }
}

impl Render for RecordingRender {
    fn render(&self, response: &ForecastResponse, status: FetchStatus) {
        self.seen.lock().unwrap().push((response.clone(), status));
    }
}

/// No sleeping between rounds and a short per-request bound.
pub fn fast_options(max_attempts: u32) -> ClientOptions {
    ClientOptions {
        policy: RetryPolicy {
            max_attempts,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
            request_timeout: Duration::from_millis(200),
        },
        ..ClientOptions::default()
    }
}

pub fn client_with(
    transport: &Arc<FakeTransport>,
    cache: &Arc<dyn ForecastCache>,
    render: &Arc<RecordingRender>,
    options: ClientOptions,
) -> ForecastClient {
    ForecastClient::new(transport.clone(), cache.clone(), render.clone(), options)
}

pub fn day_json(date: &str, tavg: f64) -> serde_json::Value {
    serde_json::json!({
        "date": date, "tavg": tavg, "tmin": tavg - 5.0, "tmax": tavg + 5.0,
        "prcp": 0, "humidity": 60, "wspd": 5, "pres": 1012, "condition": "Sunny"
    })
}
