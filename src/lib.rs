//! Stop-centric live bus arrivals.
//!
//! Polls a transit-tracking API for live vehicle positions per route and
//! forecast arrivals per stop, and fuses the two into one snapshot: for every
//! tracked stop, the inbound vehicles with their live coordinates and ETA.
//! [`SnapshotBuilder::build`] is the entry point; everything it talks to
//! upstream goes through the [`Upstream`] trait.

pub mod classify;
pub mod config;
pub mod error;
pub mod feeds;
pub mod fetch;
pub mod model;
pub mod output;
pub mod parser;
pub mod resolver;
pub mod snapshot;
pub mod upstream;

pub use config::{Config, FailurePolicy};
pub use error::{Error, Result};
pub use snapshot::SnapshotBuilder;
pub use upstream::{FixtureUpstream, HttpUpstream, Resource, Upstream};
