//! Snapshot builder: fetch every route and stop, then fuse forecasts with
//! live positions into the per-stop view served to clients.
//!
//! A build runs in two phases. All route feeds are fetched concurrently and
//! indexed into a [`LiveIndex`]; only once that index is complete are the stop
//! forecasts (fetched concurrently, bounded by `stop_concurrency`) resolved
//! against it. Output order always follows the requested stop order, never
//! completion order. The whole build is bounded by `build_deadline`; when it
//! expires every in-flight fetch is aborted.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{Instrument, debug, error, info, warn};

use crate::classify::Classifier;
use crate::config::{Config, FailurePolicy};
use crate::error::{Error, Result};
use crate::feeds::{fetch_route_feed, fetch_stop_forecast};
use crate::model::{BusTag, FusedEntry, RouteId, Stop, StopForecast, StopId};
use crate::resolver::LiveIndex;
use crate::upstream::{Resource, Upstream};

pub struct SnapshotBuilder<U: ?Sized> {
    upstream: Arc<U>,
    config: Arc<Config>,
    classifier: Classifier,
}

impl<U: Upstream + ?Sized + 'static> SnapshotBuilder<U> {
    pub fn new(upstream: Arc<U>, config: Arc<Config>) -> Self {
        let classifier = config.classifier();
        Self {
            upstream,
            config,
            classifier,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Builds the snapshot for the configured routes and stops.
    pub async fn build(&self) -> Result<Vec<Stop>> {
        self.build_for(&self.config.route_ids(), &self.config.stops).await
    }

    /// Builds a snapshot with one [`Stop`] per entry of `stops`, in order.
    ///
    /// # Errors
    ///
    /// [`Error::Deadline`] if the build outlives `build_deadline`. Under
    /// [`FailurePolicy::Strict`], [`Error::Upstream`] with every failed fetch
    /// of the failing phase. Under [`FailurePolicy::Degrade`] individual
    /// fetch failures never fail the build.
    #[tracing::instrument(skip_all, fields(routes = routes.len(), stops = stops.len()))]
    pub async fn build_for(&self, routes: &[RouteId], stops: &[StopId]) -> Result<Vec<Stop>> {
        let deadline = self.config.build_deadline;
        let started = Instant::now();

        let snapshot = tokio::time::timeout(deadline, self.assemble(routes, stops))
            .await
            .map_err(|_| {
                error!(deadline_ms = deadline.as_millis() as u64, "Snapshot build timed out");
                Error::Deadline(deadline)
            })??;

        let entries: usize = snapshot.iter().map(|s| s.entries.len()).sum();
        let located = snapshot
            .iter()
            .flat_map(|s| &s.entries)
            .filter(|e| !e.coordinate.is_unknown())
            .count();
        info!(
            stops = snapshot.len(),
            entries,
            located,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Snapshot built"
        );
        Ok(snapshot)
    }

    async fn assemble(&self, routes: &[RouteId], stops: &[StopId]) -> Result<Vec<Stop>> {
        let live = self.fetch_live_index(routes).await?;
        debug!(vehicles = live.vehicle_count(), "Live index ready");

        let forecasts = {
            let upstream = Arc::clone(&self.upstream);
            fetch_all(stops, self.config.stop_concurrency, move |stop| {
                let upstream = Arc::clone(&upstream);
                async move { fetch_stop_forecast(upstream.as_ref(), stop).await }
            })
            .await
        };

        let mut snapshot = Vec::with_capacity(stops.len());
        let mut failures = Vec::new();
        for (&stop, forecast) in stops.iter().zip(forecasts) {
            match forecast {
                Ok(forecast) => snapshot.push(fuse_stop(stop, forecast, &live, &self.classifier)),
                Err(e) => {
                    error!(%stop, error = %e, "Stop forecast unavailable");
                    failures.push(e);
                    snapshot.push(Stop::unavailable(stop));
                }
            }
        }
        self.check(failures)?;

        Ok(snapshot)
    }

    async fn fetch_live_index(&self, routes: &[RouteId]) -> Result<LiveIndex> {
        let upstream = Arc::clone(&self.upstream);
        let feeds = fetch_all(routes, routes.len(), move |route| {
            let upstream = Arc::clone(&upstream);
            async move { fetch_route_feed(upstream.as_ref(), route).await }
        })
        .await;

        let mut live = LiveIndex::new();
        let mut failures = Vec::new();
        for (&route, feed) in routes.iter().zip(feeds) {
            match feed {
                Ok(vehicles) => live.insert_feed(route, vehicles),
                Err(e) => {
                    error!(%route, error = %e, "Route feed unavailable, no live positions for it");
                    failures.push(e);
                }
            }
        }
        self.check(failures)?;

        Ok(live)
    }

    fn check(&self, failures: Vec<Error>) -> Result<()> {
        if failures.is_empty() {
            return Ok(());
        }
        match self.config.failure_policy {
            FailurePolicy::Strict => Err(Error::Upstream(failures)),
            FailurePolicy::Degrade => {
                warn!(failed = failures.len(), "Continuing with partial snapshot");
                Ok(())
            }
        }
    }
}

/// Joins one stop's forecast with the live index.
///
/// Entries keep forecast order; a forecast vehicle with no live report gets
/// the unknown coordinate.
pub fn fuse_stop(
    id: StopId,
    forecast: StopForecast,
    live: &LiveIndex,
    classifier: &Classifier,
) -> Stop {
    let entries = forecast
        .entries
        .into_iter()
        .map(|entry| FusedEntry {
            bus: BusTag {
                category: classifier.classify(entry.route),
                vehicle_id: entry.vehicle_id,
            },
            coordinate: live.resolve(entry.route, entry.vehicle_id),
            arrival_seconds: entry.arrival_seconds,
        })
        .collect();

    Stop {
        name: forecast.name,
        id,
        coordinate: forecast.coordinate,
        entries,
    }
}

/// Runs `fetch` for every key on its own task, at most `permits` at a time,
/// and returns the results in key order.
async fn fetch_all<K, T, F, Fut>(keys: &[K], permits: usize, fetch: F) -> Vec<Result<T>>
where
    K: Copy + Into<Resource> + Send + 'static,
    T: Send + 'static,
    F: Fn(K) -> Fut,
    Fut: Future<Output = Result<T>> + Send + 'static,
{
    let semaphore = Arc::new(Semaphore::new(permits.clamp(1, Semaphore::MAX_PERMITS)));
    let mut tasks = JoinSet::new();

    for (index, &key) in keys.iter().enumerate() {
        let semaphore = Arc::clone(&semaphore);
        let fut = fetch(key);
        tasks.spawn(
            async move {
                let Ok(_permit) = semaphore.acquire().await else {
                    return (index, Err(aborted(key.into())));
                };
                (index, fut.await)
            }
            .in_current_span(),
        );
    }

    let mut slots: Vec<Option<Result<T>>> = keys.iter().map(|_| None).collect();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((index, result)) => slots[index] = Some(result),
            Err(e) => error!(error = %e, "Fetch task did not complete"),
        }
    }

    slots
        .into_iter()
        .zip(keys)
        .map(|(slot, &key)| slot.unwrap_or_else(|| Err(aborted(key.into()))))
        .collect()
}

fn aborted(resource: Resource) -> Error {
    Error::Fetch {
        resource,
        message: "fetch task aborted".to_string(),
    }
}
