//! The transit-tracking API as seen by the core: resource id in, raw bytes out.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::warn;

use crate::error::{Error, Result};
use crate::fetch::{HttpClient, fetch_bytes};
use crate::model::{RouteId, StopId};

/// An upstream resource the core knows how to ask for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Resource {
    /// Live vehicles currently running on a route.
    RouteVehicles(RouteId),
    /// Forecast arrivals (plus name and geometry) for a stop.
    StopArrivals(StopId),
}

impl Resource {
    /// Path of this resource below the API base url.
    pub fn path(&self) -> String {
        match self {
            Self::RouteVehicles(route) => {
                format!("apigeo/routevariantvehicle/{route}/?format=json")
            }
            Self::StopArrivals(stop) => format!("api/platformbusarrival/{stop}/?format=json"),
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RouteVehicles(route) => write!(f, "vehicles for route {route}"),
            Self::StopArrivals(stop) => write!(f, "arrivals for stop {stop}"),
        }
    }
}

impl From<RouteId> for Resource {
    fn from(route: RouteId) -> Self {
        Self::RouteVehicles(route)
    }
}

impl From<StopId> for Resource {
    fn from(stop: StopId) -> Self {
        Self::StopArrivals(stop)
    }
}

/// Source of raw upstream payloads.
#[async_trait]
pub trait Upstream: Send + Sync {
    async fn fetch(&self, resource: &Resource) -> Result<Vec<u8>>;
}

/// [`Upstream`] backed by HTTP GETs against `base_url`.
pub struct HttpUpstream<C> {
    client: C,
    base_url: String,
    slow_after: Duration,
}

impl<C: HttpClient> HttpUpstream<C> {
    pub fn new(client: C, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            slow_after: Duration::from_secs(5),
        }
    }

    /// Calls slower than `threshold` are logged at `warn`.
    pub fn with_slow_threshold(mut self, threshold: Duration) -> Self {
        self.slow_after = threshold;
        self
    }

    pub fn url_for(&self, resource: &Resource) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), resource.path())
    }
}

#[async_trait]
impl<C: HttpClient> Upstream for HttpUpstream<C> {
    async fn fetch(&self, resource: &Resource) -> Result<Vec<u8>> {
        let url = self.url_for(resource);
        let started = Instant::now();
        let body = fetch_bytes(&self.client, resource, &url).await;

        let elapsed = started.elapsed();
        if elapsed > self.slow_after {
            warn!(%resource, elapsed_ms = elapsed.as_millis() as u64, "Upstream fetch was slow");
        }
        body
    }
}

/// In-memory [`Upstream`] serving recorded payloads. Anything not recorded
/// fails as a fetch error, the way an unreachable host would.
#[derive(Default)]
pub struct FixtureUpstream {
    bodies: HashMap<Resource, Vec<u8>>,
    calls: AtomicUsize,
}

impl FixtureUpstream {
    pub fn with(mut self, resource: Resource, body: impl AsRef<[u8]>) -> Self {
        self.bodies.insert(resource, body.as_ref().to_vec());
        self
    }

    /// Number of fetches served so far, failed ones included.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Upstream for FixtureUpstream {
    async fn fetch(&self, resource: &Resource) -> Result<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.bodies.get(resource).cloned().ok_or_else(|| Error::Fetch {
            resource: resource.clone(),
            message: "connection refused".to_string(),
        })
    }
}
