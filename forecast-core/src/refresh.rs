//! Background refresh loop.

use std::{sync::Arc, time::Duration};
use tokio::{
    sync::Notify,
    task::JoinHandle,
    time::{MissedTickBehavior, interval},
};
use tracing::{debug, info};

use crate::{client::ForecastClient, model::Horizon};

/// Handle to a running refresh task.
#[derive(Debug)]
pub struct RefreshHandle {
    horizon: Horizon,
    wake: Arc<Notify>,
    task: JoinHandle<()>,
}

impl RefreshHandle {
    pub fn horizon(&self) -> Horizon {
        self.horizon
    }

    /// Request a refresh now. Requests arriving while a cycle runs collapse
    /// into a single follow-up cycle.
    pub fn trigger(&self) {
        self.wake.notify_one();
    }

    /// Stop the loop. An in-flight cycle is abandoned.
    pub async fn shutdown(self) {
        self.task.abort();
        let _ = self.task.await;
        info!(horizon = %self.horizon, "refresh loop stopped");
    }
}

/// Fetch immediately, then every `every`, until shut down.
///
/// Ticks missed while a slow cycle runs are skipped rather than replayed.
/// Callers fetching through the same client at the same time join the
/// running cycle instead of starting another.
pub fn spawn_periodic_refresh(
    client: ForecastClient,
    horizon: Horizon,
    every: Duration,
) -> RefreshHandle {
    let wake = Arc::new(Notify::new());
    let task_wake = wake.clone();

    let task = tokio::spawn(async move {
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(%horizon, ?every, "refresh loop started");

        loop {
            tokio::select! {
                _ = ticker.tick() => debug!(%horizon, "scheduled refresh"),
                _ = task_wake.notified() => {
                    debug!(%horizon, "manual refresh");
                    ticker.reset();
                }
            }

            let outcome = client.fetch_forecast(horizon).await;
            info!(
                %horizon,
                status = %outcome.status,
                days = outcome.response.len(),
                "refresh complete"
            );
        }
    });

    RefreshHandle {
        horizon,
        wake,
        task,
    }
}
