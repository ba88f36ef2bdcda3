//! Live-location lookup for forecast entries.

use std::collections::HashMap;

use crate::model::{Coordinate, LiveVehicle, RouteId, VehicleId};

/// Per-route index of live vehicle positions for one polling cycle.
///
/// Built once after every route feed has been fetched and read-only after
/// that. A route that was never inserted (unconfigured, or its fetch failed)
/// has no live data: every lookup against it yields the unknown coordinate.
#[derive(Debug, Clone, Default)]
pub struct LiveIndex {
    routes: HashMap<RouteId, HashMap<VehicleId, Coordinate>>,
}

impl LiveIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Indexes one route's feed. If a vehicle id repeats within the feed,
    /// the first report wins.
    pub fn insert_feed(&mut self, route: RouteId, vehicles: Vec<LiveVehicle>) {
        let feed = self.routes.entry(route).or_default();
        for vehicle in vehicles {
            feed.entry(vehicle.vehicle_id).or_insert(vehicle.coordinate);
        }
    }

    /// Coordinate of `vehicle` on `route`, or [`Coordinate::unknown`].
    pub fn resolve(&self, route: RouteId, vehicle: VehicleId) -> Coordinate {
        self.routes
            .get(&route)
            .and_then(|feed| feed.get(&vehicle))
            .cloned()
            .unwrap_or_else(Coordinate::unknown)
    }

    pub fn has_route(&self, route: RouteId) -> bool {
        self.routes.contains_key(&route)
    }

    /// Total number of indexed vehicles across all routes.
    pub fn vehicle_count(&self) -> usize {
        self.routes.values().map(HashMap::len).sum()
    }
}

impl FromIterator<(RouteId, Vec<LiveVehicle>)> for LiveIndex {
    fn from_iter<I: IntoIterator<Item = (RouteId, Vec<LiveVehicle>)>>(feeds: I) -> Self {
        let mut index = Self::new();
        for (route, vehicles) in feeds {
            index.insert_feed(route, vehicles);
        }
        index
    }
}
