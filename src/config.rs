//! Service configuration.
//!
//! Built once at startup and then treated as immutable. Values come from the
//! built-in defaults, optionally overlaid by a JSON file, then by environment
//! variables:
//!
//! ```json
//! {
//!   "base_url": "https://baseride.com/routes",
//!   "routes": [{"id": 44478, "category": "RED"}, {"id": 44479, "category": "BLUE"}],
//!   "stops": [378204, 383050],
//!   "request_timeout_secs": 10,
//!   "failure_policy": "degrade"
//! }
//! ```

use std::net::SocketAddr;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use serde::Deserialize;
use tokio::sync::Semaphore;

use crate::classify::Classifier;
use crate::model::{RouteId, StopId, VehicleCategory};

pub const DEFAULT_BASE_URL: &str = "https://baseride.com/routes";

const DEFAULT_ROUTES: [(u64, VehicleCategory); 4] = [
    (44478, VehicleCategory::Red),
    (44479, VehicleCategory::Blue),
    (44480, VehicleCategory::Green),
    (44481, VehicleCategory::Brown),
];

const DEFAULT_STOPS: [u64; 32] = [
    378204, 383050, 378202, 383049, 382998, 378237, 378233, 378230, 378229, 378228, 378227,
    382995, 378224, 378226, 383010, 383009, 383006, 383004, 378234, 383003, 378222, 383048,
    378203, 382999, 378225, 383014, 383013, 383011, 377906, 383018, 383015, 378207,
];

/// What a snapshot build does when one route or stop cannot be fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Log it, report that entity empty, keep going.
    #[default]
    Degrade,
    /// Fail the whole build.
    Strict,
}

impl FromStr for FailurePolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "degrade" => Ok(Self::Degrade),
            "strict" => Ok(Self::Strict),
            other => Err(anyhow!("expected 'degrade' or 'strict', got '{other}'")),
        }
    }
}

/// A tracked route and the category its vehicles are shown as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct RouteConfig {
    pub id: RouteId,
    pub category: VehicleCategory,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub base_url: String,
    /// Polled in this order.
    pub routes: Vec<RouteConfig>,
    /// Reported in this order.
    pub stops: Vec<StopId>,
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
    pub build_deadline: Duration,
    pub stop_concurrency: usize,
    pub slow_fetch_threshold: Duration,
    pub failure_policy: FailurePolicy,
    pub listen_addr: SocketAddr,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            routes: DEFAULT_ROUTES
                .iter()
                .map(|&(id, category)| RouteConfig {
                    id: RouteId(id),
                    category,
                })
                .collect(),
            stops: DEFAULT_STOPS.iter().copied().map(StopId).collect(),
            request_timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(5),
            build_deadline: Duration::from_secs(30),
            stop_concurrency: 8,
            slow_fetch_threshold: Duration::from_secs(5),
            failure_policy: FailurePolicy::Degrade,
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 10000)),
        }
    }
}

/// On-disk overlay; every field is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    base_url: Option<String>,
    routes: Option<Vec<RouteConfig>>,
    stops: Option<Vec<StopId>>,
    request_timeout_secs: Option<u64>,
    connect_timeout_secs: Option<u64>,
    build_deadline_secs: Option<u64>,
    stop_concurrency: Option<usize>,
    slow_fetch_threshold_secs: Option<u64>,
    failure_policy: Option<FailurePolicy>,
    listen_addr: Option<SocketAddr>,
}

impl Config {
    /// Defaults, then `path` (if given), then the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(path) = path {
            config = config.merge_file(path)?;
        }
        config.merge_env(|key| std::env::var(key).ok())?.validated()
    }

    /// Overlays the JSON file at `path`.
    pub fn merge_file(self, path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        self.merge_json(&content)
            .with_context(|| format!("parsing config file {}", path.display()))
    }

    pub fn merge_json(mut self, content: &str) -> Result<Self> {
        let file: ConfigFile = serde_json::from_str(content)?;

        if let Some(v) = file.base_url {
            self.base_url = v;
        }
        if let Some(v) = file.routes {
            self.routes = v;
        }
        if let Some(v) = file.stops {
            self.stops = v;
        }
        if let Some(v) = file.request_timeout_secs {
            self.request_timeout = Duration::from_secs(v);
        }
        if let Some(v) = file.connect_timeout_secs {
            self.connect_timeout = Duration::from_secs(v);
        }
        if let Some(v) = file.build_deadline_secs {
            self.build_deadline = Duration::from_secs(v);
        }
        if let Some(v) = file.stop_concurrency {
            self.stop_concurrency = v;
        }
        if let Some(v) = file.slow_fetch_threshold_secs {
            self.slow_fetch_threshold = Duration::from_secs(v);
        }
        if let Some(v) = file.failure_policy {
            self.failure_policy = v;
        }
        if let Some(v) = file.listen_addr {
            self.listen_addr = v;
        }
        Ok(self)
    }

    /// Overlays `BUS_*` variables as returned by `lookup`.
    pub fn merge_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(v) = lookup("BUS_API_BASE_URL") {
            self.base_url = v;
        }
        if let Some(v) = lookup("BUS_ROUTES") {
            self.routes = parse_routes(&v).context("invalid BUS_ROUTES")?;
        }
        if let Some(v) = lookup("BUS_STOPS") {
            self.stops = parse_list(&v).context("invalid BUS_STOPS")?;
        }
        if let Some(v) = lookup("BUS_REQUEST_TIMEOUT_SECS") {
            self.request_timeout = secs(&v).context("invalid BUS_REQUEST_TIMEOUT_SECS")?;
        }
        if let Some(v) = lookup("BUS_BUILD_DEADLINE_SECS") {
            self.build_deadline = secs(&v).context("invalid BUS_BUILD_DEADLINE_SECS")?;
        }
        if let Some(v) = lookup("BUS_STOP_CONCURRENCY") {
            self.stop_concurrency = v.trim().parse().context("invalid BUS_STOP_CONCURRENCY")?;
        }
        if let Some(v) = lookup("BUS_FAILURE_POLICY") {
            self.failure_policy = v.parse().context("invalid BUS_FAILURE_POLICY")?;
        }
        if let Some(v) = lookup("BUS_LISTEN_ADDR") {
            self.listen_addr = v.trim().parse().context("invalid BUS_LISTEN_ADDR")?;
        }
        Ok(self)
    }

    /// Rejects values no build could run with.
    pub fn validated(self) -> Result<Self> {
        if self.base_url.trim().is_empty() {
            bail!("base_url must not be empty");
        }
        if !(1..=Semaphore::MAX_PERMITS).contains(&self.stop_concurrency) {
            bail!(
                "stop_concurrency must be between 1 and {}, got {}",
                Semaphore::MAX_PERMITS,
                self.stop_concurrency
            );
        }
        if self.build_deadline.is_zero() {
            bail!("build_deadline must be non-zero");
        }
        Ok(self)
    }

    pub fn route_ids(&self) -> Vec<RouteId> {
        self.routes.iter().map(|r| r.id).collect()
    }

    pub fn classifier(&self) -> Classifier {
        Classifier::new(self.routes.iter().map(|r| (r.id, r.category)))
    }
}

fn secs(v: &str) -> Result<Duration> {
    Ok(Duration::from_secs(v.trim().parse()?))
}

fn parse_list<T>(v: &str) -> Result<Vec<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    v.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<T>().with_context(|| format!("bad id '{s}'")))
        .collect()
}

/// Parses `44478=RED,44479=BLUE`.
fn parse_routes(v: &str) -> Result<Vec<RouteConfig>> {
    v.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|pair| {
            let (id, category) = pair
                .split_once('=')
                .ok_or_else(|| anyhow!("expected ROUTE=CATEGORY, got '{pair}'"))?;
            Ok(RouteConfig {
                id: id.parse().with_context(|| format!("bad route id '{id}'"))?,
                category: category.parse().map_err(|e: String| anyhow!(e))?,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_match_deployment() {
        let config = Config::default();

        assert_eq!(config.base_url, "https://baseride.com/routes");
        assert_eq!(
            config.route_ids(),
            vec![RouteId(44478), RouteId(44479), RouteId(44480), RouteId(44481)]
        );
        assert_eq!(config.stops.len(), 32);
        assert_eq!(config.stops[0], StopId(378204));
        assert_eq!(config.stops[31], StopId(378207));
        assert_eq!(config.failure_policy, FailurePolicy::Degrade);
        assert_eq!(config.listen_addr.port(), 10000);
    }

    #[test]
    fn test_default_classifier_colours() {
        let classifier = Config::default().classifier();

        assert_eq!(classifier.classify(RouteId(44478)), VehicleCategory::Red);
        assert_eq!(classifier.classify(RouteId(44481)), VehicleCategory::Brown);
        assert_eq!(classifier.len(), 4);
    }

    #[test]
    fn test_merge_json_overrides_given_fields_only() {
        let config = Config::default()
            .merge_json(
                r#"{
                    "routes": [{"id": 1, "category": "GREEN"}],
                    "stops": [10, 20],
                    "request_timeout_secs": 3,
                    "failure_policy": "strict"
                }"#,
            )
            .unwrap();

        assert_eq!(
            config.routes,
            vec![RouteConfig {
                id: RouteId(1),
                category: VehicleCategory::Green
            }]
        );
        assert_eq!(config.stops, vec![StopId(10), StopId(20)]);
        assert_eq!(config.request_timeout, Duration::from_secs(3));
        assert_eq!(config.failure_policy, FailurePolicy::Strict);
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn test_merge_json_rejects_unknown_fields() {
        assert!(Config::default().merge_json(r#"{"stop_ids": [1]}"#).is_err());
    }

    #[test]
    fn test_merge_env() {
        let config = Config::default()
            .merge_env(env(&[
                ("BUS_API_BASE_URL", "http://localhost:9000/routes"),
                ("BUS_ROUTES", "44478=red, 5=Brown"),
                ("BUS_STOPS", "1, 2,3,"),
                ("BUS_BUILD_DEADLINE_SECS", "12"),
                ("BUS_STOP_CONCURRENCY", "2"),
                ("BUS_FAILURE_POLICY", "STRICT"),
                ("BUS_LISTEN_ADDR", "127.0.0.1:8080"),
            ]))
            .unwrap();

        assert_eq!(config.base_url, "http://localhost:9000/routes");
        assert_eq!(
            config.routes,
            vec![
                RouteConfig {
                    id: RouteId(44478),
                    category: VehicleCategory::Red
                },
                RouteConfig {
                    id: RouteId(5),
                    category: VehicleCategory::Brown
                },
            ]
        );
        assert_eq!(config.stops, vec![StopId(1), StopId(2), StopId(3)]);
        assert_eq!(config.build_deadline, Duration::from_secs(12));
        assert_eq!(config.stop_concurrency, 2);
        assert_eq!(config.failure_policy, FailurePolicy::Strict);
        assert_eq!(config.listen_addr, "127.0.0.1:8080".parse::<SocketAddr>().unwrap());
    }

    #[test]
    fn test_merge_env_reports_variable() {
        let err = Config::default()
            .merge_env(env(&[("BUS_STOPS", "378204,abc")]))
            .unwrap_err();
        assert!(format!("{err:#}").contains("BUS_STOPS"));

        let err = Config::default()
            .merge_env(env(&[("BUS_ROUTES", "44478:RED")]))
            .unwrap_err();
        assert!(format!("{err:#}").contains("BUS_ROUTES"));
    }

    #[test]
    fn test_empty_lists_are_allowed() {
        let config = Config::default()
            .merge_env(env(&[("BUS_STOPS", ""), ("BUS_ROUTES", " ")]))
            .unwrap()
            .validated()
            .unwrap();

        assert!(config.stops.is_empty());
        assert!(config.routes.is_empty());
    }

    #[test]
    fn test_validated_rejects_zero_concurrency() {
        let config = Config {
            stop_concurrency: 0,
            ..Config::default()
        };
        assert!(config.validated().is_err());
    }

    #[test]
    fn test_validated_bounds_concurrency_by_semaphore_permits() {
        let max = usize::MAX.to_string();
        let err = Config::default()
            .merge_env(env(&[("BUS_STOP_CONCURRENCY", max.as_str())]))
            .unwrap()
            .validated()
            .unwrap_err();
        assert!(err.to_string().contains("stop_concurrency"));

        let config = Config {
            stop_concurrency: Semaphore::MAX_PERMITS,
            ..Config::default()
        };
        assert!(config.validated().is_ok());
    }
}
