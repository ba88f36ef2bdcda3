//! CLI entry point for the bus events service.
//!
//! `serve` runs the HTTP listener; the other subcommands build a snapshot or
//! fetch a single upstream resource once and print it.

mod server;

use std::ffi::OsStr;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use bus_events::feeds::{fetch_route_feed, fetch_stop_forecast};
use bus_events::fetch::BasicClient;
use bus_events::model::{RouteId, StopId};
use bus_events::output::{write_json, write_summary};
use bus_events::{Config, HttpUpstream, SnapshotBuilder, Upstream};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "bus_events")]
#[command(about = "Live bus positions fused with stop arrival forecasts", long_about = None)]
struct Cli {
    /// JSON config file overlaid on the built-in defaults
    #[arg(short, long, global = true, env = "BUS_EVENTS_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the snapshot over HTTP (`/` and `/events`)
    Serve {
        /// Address to listen on, overrides the configured one
        #[arg(short, long)]
        listen: Option<SocketAddr>,
    },
    /// Build one snapshot and print it
    Snapshot {
        /// Pretty-print the JSON
        #[arg(short, long, default_value_t = false)]
        pretty: bool,

        /// Print a human-readable summary instead of JSON
        #[arg(short, long, default_value_t = false)]
        summary: bool,
    },
    /// Fetch and print one route's live vehicles
    Route {
        #[arg(value_name = "ROUTE_ID")]
        route: RouteId,
    },
    /// Fetch and print one stop's forecast, without live positions
    Stop {
        #[arg(value_name = "STOP_ID")]
        stop: StopId,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // a missing .env is fine
    dotenvy::dotenv().ok();

    let _log_guard = init_logging();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref()).context("loading configuration")?;
    let upstream = http_upstream(&config)?;

    match cli.command {
        Commands::Serve { listen } => {
            let listen = listen.unwrap_or(config.listen_addr);
            serve(upstream, config, listen).await?;
        }
        Commands::Snapshot { pretty, summary } => {
            let builder = SnapshotBuilder::new(upstream, Arc::new(config));
            let snapshot = builder.build().await?;
            let mut out = std::io::stdout().lock();
            if summary {
                write_summary(&mut out, &snapshot)?;
            } else {
                write_json(&mut out, &snapshot, pretty)?;
            }
        }
        Commands::Route { route } => {
            let vehicles = fetch_route_feed(upstream.as_ref(), route).await?;
            write_json(&mut std::io::stdout().lock(), &vehicles, true)?;
        }
        Commands::Stop { stop } => {
            let forecast = fetch_stop_forecast(upstream.as_ref(), stop).await?;
            write_json(&mut std::io::stdout().lock(), &forecast, true)?;
        }
    }

    Ok(())
}

/// Colored stderr plus a JSON daily-rolling log file.
fn init_logging() -> tracing_appender::non_blocking::WorkerGuard {
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/bus_events.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("bus_events.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(env_filter("RUST_LOG", "info"));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(env_filter("RUST_LOG_JSON", "debug"));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    guard
}

/// `var` if set and valid, otherwise `default`.
fn env_filter(var: &str, default: &str) -> EnvFilter {
    EnvFilter::try_from_env(var).unwrap_or_else(|_| EnvFilter::new(default))
}

fn http_upstream(config: &Config) -> Result<Arc<dyn Upstream>> {
    let client = BasicClient::new(config.request_timeout, config.connect_timeout)
        .context("building HTTP client")?;
    let upstream = HttpUpstream::new(client, config.base_url.clone())
        .with_slow_threshold(config.slow_fetch_threshold);
    Ok(Arc::new(upstream))
}

async fn serve(upstream: Arc<dyn Upstream>, config: Config, listen: SocketAddr) -> Result<()> {
    info!(
        %listen,
        base_url = %config.base_url,
        routes = config.routes.len(),
        stops = config.stops.len(),
        policy = ?config.failure_policy,
        "Starting bus events server"
    );

    let builder = Arc::new(SnapshotBuilder::new(upstream, Arc::new(config)));
    let app = server::create_router(builder);

    let listener = tokio::net::TcpListener::bind(listen)
        .await
        .with_context(|| format!("binding {listen}"))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown requested");
        })
        .await
        .context("HTTP server failed")?;

    Ok(())
}
