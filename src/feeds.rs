//! Single-resource fetchers: one route's live feed, one stop's forecast.
//!
//! Each performs exactly one upstream call and does not retry.

use tracing::debug;

use crate::error::Result;
use crate::model::{LiveVehicle, RouteId, StopForecast, StopId};
use crate::parser::{parse_route_vehicles, parse_stop_arrivals};
use crate::upstream::{Resource, Upstream};

/// Fetches the vehicles currently reported on `route`.
#[tracing::instrument(skip(upstream), fields(route = %route))]
pub async fn fetch_route_feed<U: Upstream + ?Sized>(
    upstream: &U,
    route: RouteId,
) -> Result<Vec<LiveVehicle>> {
    let bytes = upstream.fetch(&Resource::RouteVehicles(route)).await?;
    let vehicles = parse_route_vehicles(route, &bytes)?;
    debug!(vehicles = vehicles.len(), "Route feed decoded");
    Ok(vehicles)
}

/// Fetches the forecast arrivals, name and location of `stop`.
#[tracing::instrument(skip(upstream), fields(stop = %stop))]
pub async fn fetch_stop_forecast<U: Upstream + ?Sized>(
    upstream: &U,
    stop: StopId,
) -> Result<StopForecast> {
    let bytes = upstream.fetch(&Resource::StopArrivals(stop)).await?;
    let forecast = parse_stop_arrivals(stop, &bytes)?;
    debug!(entries = forecast.entries.len(), name = %forecast.name, "Stop forecast decoded");
    Ok(forecast)
}
