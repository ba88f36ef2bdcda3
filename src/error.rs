//! Error types for fetching, decoding and building snapshots.

use std::time::Duration;

use thiserror::Error;

use crate::upstream::Resource;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Error, Debug)]
pub enum Error {
    /// The upstream could not be reached or the transfer broke off.
    #[error("fetching {resource} failed: {message}")]
    Fetch { resource: Resource, message: String },

    /// The upstream answered, but not with a success status.
    #[error("{resource} returned HTTP {status}")]
    Status { resource: Resource, status: u16 },

    /// The body (or one item of it) is not in the expected shape.
    #[error("decoding {resource} failed: {message}")]
    Decode { resource: Resource, message: String },

    #[error("snapshot build exceeded its {0:?} deadline")]
    Deadline(Duration),

    #[error("{} upstream request(s) failed: {}", .0.len(), summarize(.0))]
    Upstream(Vec<Error>),
}

impl Error {
    /// Whether this is a transport-level failure (as opposed to a bad payload).
    pub fn is_fetch(&self) -> bool {
        matches!(self, Self::Fetch { .. } | Self::Status { .. })
    }

    pub fn resource(&self) -> Option<&Resource> {
        match self {
            Self::Fetch { resource, .. }
            | Self::Status { resource, .. }
            | Self::Decode { resource, .. } => Some(resource),
            Self::Deadline(_) | Self::Upstream(_) => None,
        }
    }

    pub(crate) fn decode(resource: &Resource, message: impl Into<String>) -> Self {
        Self::Decode {
            resource: resource.clone(),
            message: message.into(),
        }
    }
}

fn summarize(errors: &[Error]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{RouteId, StopId};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_status_message_names_resource() {
        let err = Error::Status {
            resource: Resource::StopArrivals(StopId(378204)),
            status: 503,
        };

        assert_eq!(err.to_string(), "arrivals for stop 378204 returned HTTP 503");
        assert!(err.is_fetch());
    }

    #[test]
    fn test_upstream_aggregates_messages() {
        let err = Error::Upstream(vec![
            Error::Fetch {
                resource: Resource::RouteVehicles(RouteId(44478)),
                message: "connection refused".to_string(),
            },
            Error::decode(&Resource::StopArrivals(StopId(1)), "expected value"),
        ]);

        assert_eq!(
            err.to_string(),
            "2 upstream request(s) failed: fetching vehicles for route 44478 failed: \
             connection refused; decoding arrivals for stop 1 failed: expected value"
        );
        assert!(err.resource().is_none());
    }

    #[test]
    fn test_decode_is_not_fetch() {
        let err = Error::decode(&Resource::RouteVehicles(RouteId(7)), "bad");
        assert!(!err.is_fetch());
        assert_eq!(err.resource(), Some(&Resource::RouteVehicles(RouteId(7))));
    }
}
