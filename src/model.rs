//! Identifiers, live and forecast records, and the fused stop snapshot.
//!
//! The fused types ([`Stop`], [`FusedEntry`], [`BusTag`]) serialize to the
//! JSON shape served on `/events`:
//!
//! ```json
//! [{"stopname": "...", "id": 378204, "coordinates": ["1.3", "103.8"],
//!   "data": [{"bus": {"TYPE": "RED", "id": 101},
//!             "coordinates": ["1.31", "103.81"], "arrive_in": 90.0}]}]
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }

        impl FromStr for $name {
            type Err = std::num::ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim().parse().map(Self)
            }
        }

        impl From<u64> for $name {
            fn from(id: u64) -> Self {
                Self(id)
            }
        }
    };
}

numeric_id!(
    /// A tracked bus route (the upstream "route variant" id).
    RouteId
);
numeric_id!(
    /// A physical vehicle. Only unique within one route feed of one cycle.
    VehicleId
);
numeric_id!(
    /// A physical bus stop (the upstream "platform" id).
    StopId
);

/// A latitude/longitude pair kept as the upstream's text.
///
/// Both parts empty is the "unknown location" sentinel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "[String; 2]", into = "[String; 2]")]
pub struct Coordinate {
    pub lat: String,
    pub lon: String,
}

impl Coordinate {
    pub fn new(lat: impl Into<String>, lon: impl Into<String>) -> Self {
        Self {
            lat: lat.into(),
            lon: lon.into(),
        }
    }

    /// The `("", "")` sentinel used when no location is available.
    pub fn unknown() -> Self {
        Self::default()
    }

    pub fn is_unknown(&self) -> bool {
        self.lat.is_empty() && self.lon.is_empty()
    }
}

impl From<[String; 2]> for Coordinate {
    fn from([lat, lon]: [String; 2]) -> Self {
        Self { lat, lon }
    }
}

impl From<Coordinate> for [String; 2] {
    fn from(c: Coordinate) -> Self {
        [c.lat, c.lon]
    }
}

/// Display category of a vehicle, derived from its route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VehicleCategory {
    Red,
    Blue,
    Green,
    Brown,
    Unknown,
}

impl VehicleCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Red => "RED",
            Self::Blue => "BLUE",
            Self::Green => "GREEN",
            Self::Brown => "BROWN",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for VehicleCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for VehicleCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "RED" => Ok(Self::Red),
            "BLUE" => Ok(Self::Blue),
            "GREEN" => Ok(Self::Green),
            "BROWN" => Ok(Self::Brown),
            "UNKNOWN" => Ok(Self::Unknown),
            other => Err(format!("unknown vehicle category '{other}'")),
        }
    }
}

/// One vehicle currently reported on a route's live feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LiveVehicle {
    pub route: RouteId,
    pub vehicle_id: VehicleId,
    pub coordinate: Coordinate,
}

/// One vehicle forecast to arrive at a stop.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StopForecastEntry {
    pub route: RouteId,
    pub vehicle_id: VehicleId,
    pub arrival_seconds: f64,
}

/// Everything the arrivals resource says about one stop, before fusion.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StopForecast {
    pub name: String,
    pub coordinate: Coordinate,
    pub entries: Vec<StopForecastEntry>,
}

/// The `bus` object of a fused entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusTag {
    #[serde(rename = "TYPE")]
    pub category: VehicleCategory,
    #[serde(rename = "id")]
    pub vehicle_id: VehicleId,
}

/// A forecast entry enriched with the vehicle's live location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusedEntry {
    pub bus: BusTag,
    #[serde(rename = "coordinates")]
    pub coordinate: Coordinate,
    #[serde(rename = "arrive_in")]
    pub arrival_seconds: f64,
}

impl FusedEntry {
    pub fn category(&self) -> VehicleCategory {
        self.bus.category
    }

    pub fn vehicle_id(&self) -> VehicleId {
        self.bus.vehicle_id
    }
}

/// A tracked stop and its inbound vehicles, in forecast order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stop {
    #[serde(rename = "stopname")]
    pub name: String,
    pub id: StopId,
    #[serde(rename = "coordinates")]
    pub coordinate: Coordinate,
    #[serde(rename = "data")]
    pub entries: Vec<FusedEntry>,
}

impl Stop {
    /// The placeholder reported for a stop whose upstream call failed.
    pub fn unavailable(id: StopId) -> Self {
        Self {
            name: String::new(),
            id,
            coordinate: Coordinate::unknown(),
            entries: Vec::new(),
        }
    }
}
