//! Core library for the `forecast` CLI.
//!
//! This crate defines:
//! - The forecast data model and payload normalization
//! - `ForecastClient`: candidate endpoints, retries, cache and offline fallback
//! - Cache and transport abstractions with file and HTTP implementations
//! - Configuration, periodic refresh and derived alerts
//!
//! It is used by `forecast-cli`, but can also be reused by other binaries or services.

pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod insights;
pub mod model;
pub mod normalize;
pub mod refresh;
pub mod retry;
pub mod synthetic;
pub mod transport;

#[cfg(test)]
pub(crate) mod test_support;

pub use cache::{CacheEntry, FileCache, ForecastCache, MemoryCache};
pub use client::{ClientOptions, ForecastClient, NoRender, Render};
pub use config::Config;
pub use error::{CacheError, FetchError, ShapeError, TransportError};
pub use model::{Condition, FetchOutcome, FetchStatus, ForecastDay, ForecastResponse, Horizon};
pub use refresh::{RefreshHandle, spawn_periodic_refresh};
pub use retry::RetryPolicy;
pub use transport::{HttpTransport, Transport};
