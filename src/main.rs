//! muxlisten demo daemon.
//!
//! ```text
//! servers.toml ─▶ load ─▶ defaultize ─▶ validate ─▶ listen ─┬─▶ serve_http (echo router)
//!                                                          └─▶ serve_rpc  (empty routes)
//!                                   SIGINT / SIGTERM ─▶ cancel ─▶ drain ─▶ close
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use axum::http::{Method, Uri};
use axum::routing::any;
use axum::Router;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

use muxlisten::config::{duration, loader, Defaults, Fallbacks, Kind, RealFs, Server, Servers};
use muxlisten::lifecycle::{ServeOptions, Shutdown};
use muxlisten::observability::{metrics, Level, Logger, RpcLogLayer};

#[derive(Parser)]
#[command(name = "muxlisten")]
#[command(about = "Serve HTTP and gRPC on TCP and UNIX-socket listeners", long_about = None)]
struct Cli {
    /// Listener descriptors (.toml or .json)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Host for the first INET listener when the config leaves it empty
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Port of the first INET listener; overrides the config when given
    #[arg(short, long)]
    port: Option<u16>,

    /// Socket path for the first UNIX listener when the config leaves it empty
    #[arg(long)]
    unix_path: Option<String>,

    #[arg(long, default_value = "5s", value_parser = parse_duration)]
    shutdown_timeout: Duration,

    /// Prometheus scrape endpoint
    #[arg(long)]
    metrics_addr: Option<SocketAddr>,

    /// Print the effective descriptors before serving
    #[arg(long)]
    dump: bool,
}

fn parse_duration(text: &str) -> Result<Duration, String> {
    duration::parse(text).map_err(|err| err.to_string())
}

fn echo_router(server: &Server) -> Router {
    let served_by = format!("{} {}", server.log_prefix(), server.addr());
    let echo = move |method: Method, uri: Uri| {
        let served_by = served_by.clone();
        async move { format!("{method} {uri} (served by {served_by})\n") }
    };

    Router::new()
        .route("/", any(echo.clone()))
        .route("/{*path}", any(echo))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // The RPC bridge writes to stderr directly: events raised while another
    // event is being dispatched never reach the subscriber.
    let rpc_logger = Logger::from_fn(|level, line| eprintln!("[rpc {level}] {line}"));
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer().with_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "muxlisten=info,tower_http=debug".into()),
            ),
        )
        .with(RpcLogLayer::new(rpc_logger, Level::Warn))
        .init();

    tracing::info!("muxlisten v{} starting", env!("CARGO_PKG_VERSION"));

    if let Some(addr) = cli.metrics_addr {
        metrics::init_metrics(addr)?;
    }

    let defaults = Defaults {
        shutdown_timeout: cli.shutdown_timeout,
        ..Defaults::default()
    };
    let fallbacks = Fallbacks {
        inet_host: cli.host.clone(),
        inet_port: cli.port.unwrap_or(8080),
        unix_addr: cli.unix_path.clone().unwrap_or_default(),
    };

    let mut servers: Servers = match &cli.config {
        Some(path) => loader::load_servers(path)?,
        None => Servers::new(),
    };
    if servers.is_empty() {
        servers.push_inet_if_not_exists(&fallbacks.inet_host, fallbacks.inet_port, Kind::HTTP);
        if let Some(path) = &cli.unix_path {
            servers.push_unix_if_not_exists(path, Kind::HTTP);
        }
    }
    if let Some(port) = cli.port {
        servers.set_port_to_first_inet(port);
    }

    servers.interpolate(loader::expand_env);
    servers.defaultize(&fallbacks, &defaults);
    servers.validate(&RealFs)?;

    tracing::info!(count = servers.len(), "Configuration loaded");
    if cli.dump {
        print!("{}", servers.dump_to_string("servers", &defaults));
    }

    let shutdown = Shutdown::new();
    shutdown.spawn_signal_listener();

    let opts = ServeOptions::new()
        .with_defaults(defaults)
        .with_shutdown_timeout(cli.shutdown_timeout)
        .with_logger(Logger::tracing())
        .with_lifetime(shutdown.token());

    let (bound, bind_errors) = servers.listen(&opts).await;
    for err in &bind_errors {
        tracing::error!(error = %err, "Listener not started");
    }
    if bound.is_empty() {
        return Err("no listener could be bound".into());
    }

    let http = async {
        let result = bound.serve_http(echo_router, &opts).await;
        if result.is_err() {
            shutdown.trigger();
        }
        result
    };
    let rpc = async {
        let result = bound
            .serve_rpc(|_| tonic::service::Routes::default(), &opts)
            .await;
        if result.is_err() {
            shutdown.trigger();
        }
        result
    };
    let (http, rpc) = tokio::join!(http, rpc);

    for err in bound.close().await {
        tracing::warn!(error = %err, "Close failed");
    }

    http?;
    rpc?;

    tracing::info!("Shutdown complete");
    Ok(())
}
