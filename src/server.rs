//! HTTP transport: exposes the fused snapshot as JSON.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use bus_events::model::StopId;
use bus_events::{Error, SnapshotBuilder, Upstream};
use serde_json::json;
use tracing::{error, info};

pub type SharedBuilder = Arc<SnapshotBuilder<dyn Upstream>>;

pub fn create_router(builder: SharedBuilder) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/events", get(events))
        .route("/events/{stop_id}", get(stop_events))
        .with_state(builder)
}

async fn home() -> &'static str {
    info!("Endpoint hit: home");
    "Bus events service is up\n"
}

async fn events(State(builder): State<SharedBuilder>) -> Response {
    info!("Endpoint hit: events");
    match builder.build().await {
        Ok(snapshot) => Json(snapshot).into_response(),
        Err(e) => failure(e),
    }
}

async fn stop_events(
    State(builder): State<SharedBuilder>,
    Path(stop): Path<StopId>,
) -> Response {
    info!(%stop, "Endpoint hit: stop events");
    let routes = builder.config().route_ids();
    match builder.build_for(&routes, &[stop]).await {
        Ok(mut snapshot) => match snapshot.pop() {
            Some(stop) => Json(stop).into_response(),
            None => StatusCode::NOT_FOUND.into_response(),
        },
        Err(e) => failure(e),
    }
}

fn failure(e: Error) -> Response {
    error!(error = %e, "Snapshot build failed");
    let status = match e {
        Error::Deadline(_) => StatusCode::GATEWAY_TIMEOUT,
        _ => StatusCode::BAD_GATEWAY,
    };
    (status, Json(json!({ "error": e.to_string() }))).into_response()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use bus_events::model::{RouteId, Stop};
    use bus_events::{Config, FailurePolicy, FixtureUpstream, Resource};
    use pretty_assertions::assert_eq;
    use serde_json::Value;

    use super::*;

    /// Never answers.
    struct Stalled;

    #[async_trait]
    impl Upstream for Stalled {
        async fn fetch(&self, _resource: &Resource) -> bus_events::Result<Vec<u8>> {
            std::future::pending().await
        }
    }

    fn config(policy: FailurePolicy) -> Config {
        Config {
            routes: Config::default().routes.into_iter().take(1).collect(),
            stops: vec![StopId(378204), StopId(383050)],
            failure_policy: policy,
            ..Config::default()
        }
    }

    async fn serve(policy: FailurePolicy) -> String {
        let upstream = FixtureUpstream::default()
            .with(
                Resource::RouteVehicles(RouteId(44478)),
                r#"{"vehicles": [{"vehicle_id": 101, "position": {"lat": "10.0", "lon": "20.0"}}]}"#,
            )
            .with(
                Resource::StopArrivals(StopId(378204)),
                r#"{"name": "Kent Ridge", "geometry": [{"lat": "1.2", "lon": "103.7"}],
                    "forecast": [{"rv_id": 44478, "vehicle_id": 101, "forecast_seconds": 90}]}"#,
            );
        listen(Arc::new(upstream), config(policy)).await
    }

    async fn listen(upstream: Arc<dyn Upstream>, config: Config) -> String {
        let app = create_router(Arc::new(SnapshotBuilder::new(upstream, Arc::new(config))));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        format!("http://{addr}")
    }

    async fn get(url: &str) -> reqwest::Response {
        reqwest::Client::builder()
            .no_proxy()
            .build()
            .unwrap()
            .get(url)
            .send()
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_home_acknowledges() {
        let base = serve(FailurePolicy::Degrade).await;

        let resp = get(&base).await;

        assert_eq!(resp.status(), 200);
        assert_eq!(resp.text().await.unwrap(), "Bus events service is up\n");
    }

    #[tokio::test]
    async fn test_events_returns_snapshot_in_config_order() {
        let base = serve(FailurePolicy::Degrade).await;

        let resp = get(&format!("{base}/events")).await;
        assert_eq!(resp.status(), 200);
        let stops: Vec<Stop> = resp.json().await.unwrap();

        assert_eq!(
            stops.iter().map(|s| s.id).collect::<Vec<_>>(),
            vec![StopId(378204), StopId(383050)]
        );
        assert_eq!(stops[0].name, "Kent Ridge");
        assert_eq!(stops[0].entries[0].coordinate.lat, "10.0");
        assert!(stops[1].entries.is_empty());
    }

    #[tokio::test]
    async fn test_events_strict_failure_is_bad_gateway() {
        let base = serve(FailurePolicy::Strict).await;

        let resp = get(&format!("{base}/events")).await;

        assert_eq!(resp.status(), 502);
        let body: Value = resp.json().await.unwrap();
        assert!(body["error"].as_str().unwrap().contains("383050"));
    }

    #[tokio::test]
    async fn test_single_stop_events() {
        let base = serve(FailurePolicy::Degrade).await;

        let resp = get(&format!("{base}/events/378204")).await;
        let stop: Stop = resp.json().await.unwrap();
        assert_eq!(stop.id, StopId(378204));
        assert_eq!(stop.entries.len(), 1);

        let resp = get(&format!("{base}/events/not-a-stop")).await;
        assert_eq!(resp.status(), 400);
    }

    #[tokio::test]
    async fn test_events_deadline_is_gateway_timeout() {
        let config = Config {
            build_deadline: Duration::from_millis(50),
            ..config(FailurePolicy::Degrade)
        };
        let base = listen(Arc::new(Stalled), config).await;

        let resp = get(&format!("{base}/events")).await;

        assert_eq!(resp.status(), 504);
        let body: Value = resp.json().await.unwrap();
        assert!(body["error"].as_str().unwrap().contains("deadline"));
    }
}
