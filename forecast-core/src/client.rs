use chrono::{Local, Utc};
use std::{
    collections::HashMap,
    fmt,
    sync::{Arc, Mutex, MutexGuard},
};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::{
    cache::{CacheEntry, ForecastCache},
    error::{FetchError, TransportError},
    model::{FetchOutcome, FetchStatus, ForecastResponse, Horizon},
    normalize,
    retry::RetryPolicy,
    synthetic,
    transport::Transport,
};

/// Receives every completed fetch cycle.
///
/// Must be idempotent and must not panic: the same response rendered twice
/// should leave the same visible state.
pub trait Render: Send + Sync {
    fn render(&self, response: &ForecastResponse, status: FetchStatus);
}

impl<F> Render for F
where
    F: Fn(&ForecastResponse, FetchStatus) + Send + Sync,
{
    fn render(&self, response: &ForecastResponse, status: FetchStatus) {
        self(response, status)
    }
}

/// Render target that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoRender;

impl Render for NoRender {
    fn render(&self, _: &ForecastResponse, _: FetchStatus) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientOptions {
    pub policy: RetryPolicy,
    /// Cached data older than this is not served.
    pub cache_max_age: chrono::Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            policy: RetryPolicy::default(),
            cache_max_age: chrono::Duration::hours(24),
        }
    }
}

type InFlight = watch::Receiver<Option<FetchOutcome>>;

/// Fetches forecasts across candidate endpoints, falling back to the cache and
/// then to synthetic data. Cloning is cheap and clones share in-flight cycles.
#[derive(Clone)]
pub struct ForecastClient {
    inner: Arc<Inner>,
}

struct Inner {
    transport: Arc<dyn Transport>,
    cache: Arc<dyn ForecastCache>,
    render: Arc<dyn Render>,
    options: ClientOptions,
    in_flight: Mutex<HashMap<Horizon, InFlight>>,
}

impl fmt::Debug for ForecastClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ForecastClient")
            .field("transport", &self.inner.transport)
            .field("cache", &self.inner.cache)
            .field("options", &self.inner.options)
            .finish_non_exhaustive()
    }
}

enum Role {
    Leader(watch::Sender<Option<FetchOutcome>>),
    Follower(InFlight),
}

/// Frees the in-flight slot even if the driving future is dropped mid-cycle.
struct SlotGuard<'a> {
    inner: &'a Inner,
    horizon: Horizon,
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        self.inner.slots().remove(&self.horizon);
    }
}

impl Inner {
    fn slots(&self) -> MutexGuard<'_, HashMap<Horizon, InFlight>> {
        self.in_flight.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl ForecastClient {
    pub fn new(
        transport: Arc<dyn Transport>,
        cache: Arc<dyn ForecastCache>,
        render: Arc<dyn Render>,
        options: ClientOptions,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                transport,
                cache,
                render,
                options,
                in_flight: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn options(&self) -> &ClientOptions {
        &self.inner.options
    }

    /// Never fails: the worst case is synthetic data with
    /// `FetchStatus::SyntheticFallback`.
    ///
    /// Concurrent calls for the same horizon share one cycle; only the caller
    /// driving it invokes the renderer.
    pub async fn fetch_forecast(&self, horizon: Horizon) -> FetchOutcome {
        loop {
            match self.claim(horizon) {
                Role::Leader(tx) => {
                    let guard = SlotGuard {
                        inner: &self.inner,
                        horizon,
                    };
                    let outcome = self.run_cycle(horizon).await;
                    drop(guard);
                    tx.send_replace(Some(outcome.clone()));
                    return outcome;
                }
                Role::Follower(mut rx) => {
                    debug!(%horizon, "joining in-flight fetch");
                    let finished = rx
                        .wait_for(Option::is_some)
                        .await
                        .ok()
                        .and_then(|done| (*done).clone());
                    if let Some(outcome) = finished {
                        return outcome;
                    }
                    // driving caller was cancelled, take over
                    debug!(%horizon, "in-flight fetch abandoned, starting a new one");
                }
            }
        }
    }

    fn claim(&self, horizon: Horizon) -> Role {
        let mut slots = self.inner.slots();
        if let Some(rx) = slots.get(&horizon) {
            return Role::Follower(rx.clone());
        }

        let (tx, rx) = watch::channel(None);
        slots.insert(horizon, rx);
        Role::Leader(tx)
    }

    async fn run_cycle(&self, horizon: Horizon) -> FetchOutcome {
        let policy = self.inner.options.policy;
        let rounds = policy.rounds();

        for round in 0..rounds {
            match self.try_candidates(horizon).await {
                Ok(response) => {
                    let now = Utc::now();
                    self.persist(horizon, now, &response);
                    info!(%horizon, days = response.len(), "live forecast loaded");

                    return self.finish(FetchOutcome {
                        horizon,
                        status: FetchStatus::Live,
                        as_of: now,
                        notice: None,
                        response,
                    });
                }
                Err(errors) => {
                    warn!(
                        %horizon,
                        round = round + 1,
                        rounds,
                        failures = errors.len(),
                        "all candidate endpoints failed"
                    );

                    if let Some(delay) = policy.backoff_after(round) {
                        debug!(?delay, "backing off before next round");
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        let outcome = self.fallback(horizon);
        self.finish(outcome)
    }

    /// Tries each endpoint once, in preference order, without delay between them.
    async fn try_candidates(&self, horizon: Horizon) -> Result<ForecastResponse, Vec<FetchError>> {
        let mut errors = Vec::new();

        for endpoint in horizon.endpoints() {
            debug!(%horizon, endpoint, "trying endpoint");
            match self.fetch_candidate(endpoint).await {
                Ok(response) => return Ok(response),
                Err(err) => {
                    warn!(error = %err, "endpoint failed");
                    errors.push(err);
                }
            }
        }

        Err(errors)
    }

    async fn fetch_candidate(&self, endpoint: &str) -> Result<ForecastResponse, FetchError> {
        let timeout = self.inner.options.policy.request_timeout;

        let body = match tokio::time::timeout(timeout, self.inner.transport.get(endpoint)).await {
            Ok(Ok(body)) => body,
            Ok(Err(source)) => {
                return Err(FetchError::Transport {
                    endpoint: endpoint.to_string(),
                    source,
                });
            }
            Err(_) => {
                return Err(FetchError::Transport {
                    endpoint: endpoint.to_string(),
                    source: TransportError::Timeout(timeout),
                });
            }
        };

        normalize::parse_payload(&body)
            .map_err(|source| FetchError::Shape {
                endpoint: endpoint.to_string(),
                source,
            })
    }

    fn persist(&self, horizon: Horizon, now: chrono::DateTime<Utc>, response: &ForecastResponse) {
        let entry = CacheEntry::new(now, response.clone());
        if let Err(e) = self.inner.cache.store(horizon, &entry) {
            warn!(%horizon, error = %e, "could not cache forecast");
        }
    }

    /// Fresh cache first, synthetic data otherwise.
    fn fallback(&self, horizon: Horizon) -> FetchOutcome {
        let now = Utc::now();
        let max_age = self.inner.options.cache_max_age;

        match self.inner.cache.load(horizon) {
            Ok(Some(entry)) if entry.is_fresh(now, max_age) => {
                let as_of = entry.fetched_at().unwrap_or(now);
                info!(%horizon, %as_of, "serving cached forecast");

                return FetchOutcome {
                    horizon,
                    status: FetchStatus::StaleCache,
                    as_of,
                    notice: Some(format!(
                        "Using cached forecast data from {}",
                        as_of.with_timezone(&Local).format("%Y-%m-%d %H:%M")
                    )),
                    response: entry.data,
                };
            }
            Ok(Some(entry)) => {
                info!(%horizon, timestamp = entry.timestamp, "cached forecast too old to serve");
            }
            Ok(None) => debug!(%horizon, "no cached forecast"),
            Err(e) => warn!(%horizon, error = %e, "could not read cached forecast"),
        }

        warn!(%horizon, "falling back to synthetic forecast");
        FetchOutcome {
            horizon,
            status: FetchStatus::SyntheticFallback,
            as_of: now,
            notice: Some(
                "Unable to load live forecast data. Showing offline data instead.".to_string(),
            ),
            response: synthetic::synthesize(horizon, now.with_timezone(&Local).date_naive()),
        }
    }

    fn finish(&self, outcome: FetchOutcome) -> FetchOutcome {
        self.inner.render.render(&outcome.response, outcome.status);
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        cache::MemoryCache,
        test_support::{FakeTransport, RecordingRender, Reply, client_with, day_json, fast_options},
    };
    use serde_json::json;
    use std::time::Duration;

    const CSV: &str = "/api/csv-forecast";
    const SHORT: &str = "/api/forecast/short-term";
    const LEGACY: &str = "/api/short-term-forecast";

    fn week_payload() -> serde_json::Value {
        json!({"forecast": [
            day_json("2024-01-01", 25.0),
            day_json("2024-01-02", 26.0),
            day_json("2024-01-03", 27.0)
        ]})
    }

    fn all_failing() -> FakeTransport {
        FakeTransport::new()
            .reply(CSV, Reply::Status(500))
            .reply(SHORT, Reply::Status(500))
            .reply(LEGACY, Reply::Status(500))
            .reply("/long-term/api/forecast", Reply::Status(500))
    }

    fn cached_entry(age: chrono::Duration) -> CacheEntry {
        let data = normalize::normalize_payload(&week_payload()).unwrap();
        CacheEntry::new(Utc::now() - age, data)
    }

    #[tokio::test]
    async fn falls_through_to_next_candidate() {
        let transport = Arc::new(
            FakeTransport::new()
                .reply(CSV, Reply::Status(500))
                .body(SHORT, week_payload()),
        );
        let cache: Arc<dyn ForecastCache> = Arc::new(MemoryCache::new());
        let render = Arc::new(RecordingRender::default());
        let client = client_with(&transport, &cache, &render, fast_options(3));

        let outcome = client.fetch_forecast(Horizon::ShortTerm).await;

        assert_eq!(outcome.status, FetchStatus::Live);
        assert!(outcome.notice.is_none());
        assert_eq!(outcome.response.len(), 3);
        assert_eq!(transport.calls(), [CSV, SHORT]);

        let stored = cache.load(Horizon::ShortTerm).unwrap().unwrap();
        assert_eq!(stored.data, outcome.response);

        let seen = render.seen();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].1, FetchStatus::Live);
    }

    #[tokio::test]
    async fn shape_errors_fall_through_like_transport_errors() {
        let transport = Arc::new(
            FakeTransport::new()
                .body(CSV, json!({"forecast": []}))
                .reply(SHORT, Reply::Body("<html>oops</html>".into()))
                .body(LEGACY, json!({"weather": [day_json("2024-01-01", 20.0)]})),
        );
        let cache: Arc<dyn ForecastCache> = Arc::new(MemoryCache::new());
        let render = Arc::new(RecordingRender::default());
        let client = client_with(&transport, &cache, &render, fast_options(3));

        let outcome = client.fetch_forecast(Horizon::ShortTerm).await;

        assert_eq!(outcome.status, FetchStatus::Live);
        assert_eq!(outcome.response.days()[0].temperature_avg, 20.0);
        assert_eq!(transport.calls(), [CSV, SHORT, LEGACY]);
    }

    #[tokio::test]
    async fn all_500_without_cache_is_synthetic() {
        let transport = Arc::new(all_failing());
        let cache: Arc<dyn ForecastCache> = Arc::new(MemoryCache::new());
        let render = Arc::new(RecordingRender::default());
        let client = client_with(&transport, &cache, &render, fast_options(3));

        let outcome = client.fetch_forecast(Horizon::ShortTerm).await;

        assert_eq!(outcome.status, FetchStatus::SyntheticFallback);
        assert!(outcome.notice.is_some());
        assert_eq!(outcome.response.len(), 7);
        assert!(outcome.response.is_well_formed());
        // three rounds over three candidates
        assert_eq!(transport.calls().len(), 9);
        assert_eq!(render.seen()[0].1, FetchStatus::SyntheticFallback);
        // fallback data is never cached
        assert!(cache.load(Horizon::ShortTerm).unwrap().is_none());
    }

    #[tokio::test]
    async fn recent_cache_is_served_unchanged() {
        let entry = cached_entry(chrono::Duration::hours(1));
        let transport = Arc::new(all_failing());
        let cache: Arc<dyn ForecastCache> =
            Arc::new(MemoryCache::with_entry(Horizon::ShortTerm, entry.clone()));
        let render = Arc::new(RecordingRender::default());
        let client = client_with(&transport, &cache, &render, fast_options(2));

        let outcome = client.fetch_forecast(Horizon::ShortTerm).await;

        assert_eq!(outcome.status, FetchStatus::StaleCache);
        assert_eq!(outcome.response, entry.data);
        assert_eq!(outcome.as_of.timestamp_millis(), entry.timestamp);
        assert!(outcome.notice.unwrap().starts_with("Using cached forecast data from"));
    }

    #[tokio::test]
    async fn old_cache_is_ignored() {
        let entry = cached_entry(chrono::Duration::hours(30));
        let transport = Arc::new(all_failing());
        let cache: Arc<dyn ForecastCache> =
            Arc::new(MemoryCache::with_entry(Horizon::ShortTerm, entry.clone()));
        let render = Arc::new(RecordingRender::default());
        let client = client_with(&transport, &cache, &render, fast_options(2));

        let outcome = client.fetch_forecast(Horizon::ShortTerm).await;

        assert_eq!(outcome.status, FetchStatus::SyntheticFallback);
        assert_ne!(outcome.response, entry.data);
    }

    #[tokio::test]
    async fn far_future_cache_is_ignored() {
        let entry = cached_entry(-chrono::Duration::days(3650));
        let transport = Arc::new(all_failing());
        let cache: Arc<dyn ForecastCache> =
            Arc::new(MemoryCache::with_entry(Horizon::ShortTerm, entry.clone()));
        let render = Arc::new(RecordingRender::default());
        let client = client_with(&transport, &cache, &render, fast_options(1));

        let outcome = client.fetch_forecast(Horizon::ShortTerm).await;

        assert_eq!(outcome.status, FetchStatus::SyntheticFallback);
        assert_ne!(outcome.response, entry.data);
    }

    #[tokio::test]
    async fn hanging_endpoint_times_out_and_advances() {
        let transport = Arc::new(
            FakeTransport::new()
                .reply(CSV, Reply::Hang)
                .body(SHORT, week_payload()),
        );
        let cache: Arc<dyn ForecastCache> = Arc::new(MemoryCache::new());
        let render = Arc::new(RecordingRender::default());
        let client = client_with(&transport, &cache, &render, fast_options(1));

        let outcome = client.fetch_forecast(Horizon::ShortTerm).await;

        assert_eq!(outcome.status, FetchStatus::Live);
        assert_eq!(transport.calls(), [CSV, SHORT]);
    }

    #[tokio::test]
    async fn backs_off_between_rounds() {
        let transport = Arc::new(all_failing());
        let cache: Arc<dyn ForecastCache> = Arc::new(MemoryCache::new());
        let render = Arc::new(RecordingRender::default());
        let mut options = fast_options(2);
        options.policy.initial_backoff = Duration::from_millis(20);
        options.policy.max_backoff = Duration::from_millis(20);
        let client = client_with(&transport, &cache, &render, options);

        let started = std::time::Instant::now();
        let outcome = client.fetch_forecast(Horizon::ShortTerm).await;

        assert_eq!(outcome.status, FetchStatus::SyntheticFallback);
        assert!(started.elapsed() >= Duration::from_millis(20));
        assert_eq!(transport.calls().len(), 6);
    }

    #[tokio::test]
    async fn long_term_uses_its_single_endpoint() {
        let transport = Arc::new(
            FakeTransport::new()
                .body("/long-term/api/forecast", json!([day_json("2024-06-01", 30.0)]))
                .body(CSV, week_payload()),
        );
        let cache: Arc<dyn ForecastCache> = Arc::new(MemoryCache::new());
        let render = Arc::new(RecordingRender::default());
        let client = client_with(&transport, &cache, &render, fast_options(3));

        let outcome = client.fetch_forecast(Horizon::LongTerm).await;

        assert_eq!(outcome.status, FetchStatus::Live);
        assert_eq!(outcome.horizon, Horizon::LongTerm);
        assert_eq!(transport.calls(), ["/long-term/api/forecast"]);
        assert!(cache.load(Horizon::ShortTerm).unwrap().is_none());
        assert!(cache.load(Horizon::LongTerm).unwrap().is_some());
    }

    #[tokio::test]
    async fn long_term_synthetic_covers_six_months() {
        let transport = Arc::new(all_failing());
        let cache: Arc<dyn ForecastCache> = Arc::new(MemoryCache::new());
        let render = Arc::new(RecordingRender::default());
        let client = client_with(&transport, &cache, &render, fast_options(1));

        let outcome = client.fetch_forecast(Horizon::LongTerm).await;

        assert_eq!(outcome.status, FetchStatus::SyntheticFallback);
        assert_eq!(outcome.response.len(), 180);
    }

    #[tokio::test]
    async fn concurrent_calls_share_one_cycle() {
        let transport = Arc::new(
            FakeTransport::new()
                .body(CSV, week_payload())
                .delayed(Duration::from_millis(50)),
        );
        let cache: Arc<dyn ForecastCache> = Arc::new(MemoryCache::new());
        let render = Arc::new(RecordingRender::default());
        let client = client_with(&transport, &cache, &render, fast_options(3));

        let (a, b) = tokio::join!(
            client.fetch_forecast(Horizon::ShortTerm),
            client.fetch_forecast(Horizon::ShortTerm)
        );

        assert_eq!(a, b);
        assert_eq!(transport.calls(), [CSV]);
        assert_eq!(render.count(), 1);

        // finished cycles are not reused
        client.fetch_forecast(Horizon::ShortTerm).await;
        assert_eq!(transport.calls().len(), 2);
    }

    #[tokio::test]
    async fn horizons_do_not_share_cycles() {
        let transport = Arc::new(
            FakeTransport::new()
                .body(CSV, week_payload())
                .body("/long-term/api/forecast", week_payload())
                .delayed(Duration::from_millis(20)),
        );
        let cache: Arc<dyn ForecastCache> = Arc::new(MemoryCache::new());
        let render = Arc::new(RecordingRender::default());
        let client = client_with(&transport, &cache, &render, fast_options(1));

        let (short, long) = tokio::join!(
            client.fetch_forecast(Horizon::ShortTerm),
            client.fetch_forecast(Horizon::LongTerm)
        );

        assert_eq!(short.horizon, Horizon::ShortTerm);
        assert_eq!(long.horizon, Horizon::LongTerm);
        assert_eq!(transport.calls().len(), 2);
        assert_eq!(render.count(), 2);
    }

    #[tokio::test]
    async fn follower_takes_over_when_leader_is_dropped() {
        let transport = Arc::new(
            FakeTransport::new()
                .body(CSV, week_payload())
                .delayed(Duration::from_millis(60)),
        );
        let cache: Arc<dyn ForecastCache> = Arc::new(MemoryCache::new());
        let render = Arc::new(RecordingRender::default());
        let client = client_with(&transport, &cache, &render, fast_options(1));

        let (leader, follower) = tokio::join!(
            tokio::time::timeout(
                Duration::from_millis(10),
                client.fetch_forecast(Horizon::ShortTerm)
            ),
            client.fetch_forecast(Horizon::ShortTerm)
        );

        assert!(leader.is_err());
        assert_eq!(follower.status, FetchStatus::Live);
        assert_eq!(transport.calls().len(), 2);
        assert_eq!(render.count(), 1);
    }

    #[tokio::test]
    async fn closures_can_render() {
        let statuses = Arc::new(Mutex::new(Vec::new()));
        let sink = statuses.clone();
        let render = move |resp: &ForecastResponse, status: FetchStatus| {
            sink.lock().unwrap().push((resp.len(), status));
        };

        let client = ForecastClient::new(
            Arc::new(FakeTransport::new().body(CSV, week_payload())),
            Arc::new(MemoryCache::new()),
            Arc::new(render),
            fast_options(1),
        );

        client.fetch_forecast(Horizon::ShortTerm).await;
        assert_eq!(*statuses.lock().unwrap(), [(3, FetchStatus::Live)]);
    }

    #[test]
    fn client_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ForecastClient>();
    }
}
