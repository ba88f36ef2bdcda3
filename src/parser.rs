//! Lenient decoders for the two upstream JSON payloads.
//!
//! Only the handful of fields the fusion needs are read; everything else in
//! the (large) responses is ignored. Missing optional fields fall back to
//! empty/zero values. An item without its identifying ids is skipped with a
//! warning instead of failing the whole payload.

use serde_json::Value;
use tracing::warn;

use crate::error::{Error, Result};
use crate::model::{
    Coordinate, LiveVehicle, RouteId, StopForecast, StopForecastEntry, StopId, VehicleId,
};
use crate::upstream::Resource;

/// Decodes a `routevariantvehicle` body into the route's live vehicles.
///
/// # Errors
///
/// Returns [`Error::Decode`] only if the body is not JSON at all. A missing
/// or non-array `vehicles` field yields an empty list.
pub fn parse_route_vehicles(route: RouteId, bytes: &[u8]) -> Result<Vec<LiveVehicle>> {
    let resource = Resource::RouteVehicles(route);
    let json = parse_json(&resource, bytes)?;

    let vehicles = items(&json["vehicles"])
        .enumerate()
        .filter_map(|(index, item)| {
            parse_vehicle(&resource, route, index, item)
                .inspect_err(|e| warn!(error = %e, "Skipping vehicle"))
                .ok()
        })
        .collect();

    Ok(vehicles)
}

/// Decodes a `platformbusarrival` body into the stop's name, location and
/// forecast entries (in upstream order).
///
/// The stop's own location is the first `geometry` element; when the list is
/// empty the coordinate is [`Coordinate::unknown`].
///
/// # Errors
///
/// Returns [`Error::Decode`] only if the body is not JSON at all.
pub fn parse_stop_arrivals(stop: StopId, bytes: &[u8]) -> Result<StopForecast> {
    let resource = Resource::StopArrivals(stop);
    let json = parse_json(&resource, bytes)?;

    let name = json["name"].as_str().unwrap_or_default().to_string();
    let coordinate = items(&json["geometry"])
        .next()
        .map(coordinate_of)
        .unwrap_or_else(Coordinate::unknown);

    let entries = items(&json["forecast"])
        .enumerate()
        .filter_map(|(index, item)| {
            parse_forecast(&resource, index, item)
                .inspect_err(|e| warn!(error = %e, "Skipping forecast entry"))
                .ok()
        })
        .collect();

    Ok(StopForecast {
        name,
        coordinate,
        entries,
    })
}

fn parse_json(resource: &Resource, bytes: &[u8]) -> Result<Value> {
    serde_json::from_slice(bytes).map_err(|e| Error::decode(resource, e.to_string()))
}

fn parse_vehicle(
    resource: &Resource,
    route: RouteId,
    index: usize,
    item: &Value,
) -> Result<LiveVehicle> {
    let vehicle_id = id_of(&item["vehicle_id"])
        .map(VehicleId)
        .ok_or_else(|| missing(resource, index, "vehicle_id"))?;

    Ok(LiveVehicle {
        route,
        vehicle_id,
        coordinate: coordinate_of(&item["position"]),
    })
}

fn parse_forecast(resource: &Resource, index: usize, item: &Value) -> Result<StopForecastEntry> {
    let route = id_of(&item["rv_id"])
        .map(RouteId)
        .ok_or_else(|| missing(resource, index, "rv_id"))?;
    let vehicle_id = id_of(&item["vehicle_id"])
        .map(VehicleId)
        .ok_or_else(|| missing(resource, index, "vehicle_id"))?;
    let arrival_seconds = number_of(&item["forecast_seconds"]).unwrap_or_default();

    Ok(StopForecastEntry {
        route,
        vehicle_id,
        arrival_seconds,
    })
}

fn missing(resource: &Resource, index: usize, field: &str) -> Error {
    Error::decode(resource, format!("item {index} has no usable `{field}`"))
}

/// Iterates an array value; anything else is treated as empty.
fn items(value: &Value) -> impl Iterator<Item = &Value> {
    value.as_array().into_iter().flatten()
}

/// Ids arrive as integers, occasionally as numeric strings.
fn id_of(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn number_of(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Reads `lat`/`lon` verbatim. Numbers keep their JSON text
/// (`arbitrary_precision` keeps the source digits in `Number`).
fn coordinate_of(value: &Value) -> Coordinate {
    Coordinate::new(text_of(&value["lat"]), text_of(&value["lon"]))
}

fn text_of(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    }
}
