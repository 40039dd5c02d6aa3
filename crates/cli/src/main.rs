use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use fleet_collect::Registry;
use fleet_kubehub::ReflectorConfig;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};

mod server;

#[derive(Parser, Debug)]
#[command(name = "fleetd", version, about = "Fleet metrics exporter")]
struct Cli {
    /// Address the /metrics endpoint listens on
    #[arg(long, env = "FLEET_LISTEN", default_value = "0.0.0.0:8080")]
    listen: SocketAddr,

    /// Restrict namespaced kinds to one namespace (default: all)
    #[arg(long = "ns", env = "FLEET_NAMESPACE")]
    namespace: Option<String>,

    /// Collectors to enable
    #[arg(
        long,
        env = "FLEET_COLLECTORS",
        value_delimiter = ',',
        default_value = "managedclusters,hostedclusters"
    )]
    collectors: Vec<String>,

    /// Seconds between store resyncs
    #[arg(long = "resync-secs", env = "FLEET_RESYNC_SECS", default_value_t = 300)]
    resync_secs: u64,

    /// Serve fleetd's own counters on a separate Prometheus listener
    #[arg(long = "telemetry-addr", env = "FLEET_TELEMETRY_ADDR")]
    telemetry_addr: Option<SocketAddr>,
}

fn init_tracing() {
    let env = std::env::var("FLEET_LOG").unwrap_or_else(|_| "info".to_string());
    let filter = tracing_subscriber::EnvFilter::from_str(&env).unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).init();
}

fn init_metrics(addr: Option<SocketAddr>) {
    let Some(sock) = addr else { return };
    let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
    match builder.with_http_listener(sock).install() {
        Ok(_) => info!(addr = %sock, "telemetry exporter listening"),
        Err(e) => warn!(error = %e, "failed to install telemetry exporter"),
    }
}

async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        error!(error = %e, "installing ctrl-c handler failed");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    init_metrics(cli.telemetry_addr);

    let registry = Registry::new();
    let wiring = registry.build_named(cli.collectors.as_slice())?;
    let client = fleet_kubehub::client().await?;
    let cfg = ReflectorConfig { namespace: cli.namespace.clone(), resync: Duration::from_secs(cli.resync_secs.max(1)) };

    let (stop_tx, stop_rx) = watch::channel(false);
    let mut tasks = Vec::with_capacity(wiring.feeds.len());
    for feed in &wiring.feeds {
        let (client, store, cfg, stop) = (client.clone(), feed.store.clone(), cfg.clone(), stop_rx.clone());
        let gvk = feed.gvk;
        tasks.push(tokio::spawn(async move {
            if let Err(e) = fleet_kubehub::run_reflector(client, gvk, store, cfg, stop).await {
                error!(gvk, error = ?e, "reflector failed");
            }
        }));
    }

    let listener = tokio::net::TcpListener::bind(cli.listen).await.with_context(|| format!("binding {}", cli.listen))?;
    info!(addr = %cli.listen, collectors = ?cli.collectors, "serving /metrics");
    axum::serve(listener, server::router(Arc::new(wiring.collector)))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("metrics server")?;

    let _ = stop_tx.send(true);
    for t in tasks {
        if let Err(e) = t.await {
            warn!(error = %e, "reflector task panicked");
        }
    }
    info!("bye");
    Ok(())
}
