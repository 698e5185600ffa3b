//! slircd-gate - admission core of the Straylight IRC daemon.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use slircd_gate::clock::SystemClock;
use slircd_gate::config::{Config, validate};
use slircd_gate::handlers::Registry;
use slircd_gate::{http, metrics};
use slircd_gate::state::Matrix;
use slircd_gate::state::actor::CoreActor;
use slircd_gate::state::observer::NullObserver;
use slircd_gate::state::outbox::Mailboxes;

/// Interval between maintenance passes.
const TICK: Duration = Duration::from_secs(1);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if std::env::var("SLIRCD_LOG_FORMAT").is_ok_and(|format| format == "json") {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());

    let config = Config::load(&config_path).map_err(|e| {
        error!(path = %config_path, error = %e, "Failed to load config");
        e
    })?;

    if let Err(errors) = validate(&config) {
        for e in &errors {
            error!(error = %e, "Invalid configuration");
        }
        anyhow::bail!("{} configuration error(s) in {config_path}", errors.len());
    }

    info!(
        server = %config.server.name,
        network = %config.server.network,
        sid = %config.server.sid,
        "Starting slircd-gate"
    );

    // Convention: metrics_port = 0 disables the endpoint.
    match config.server.metrics_port {
        Some(0) | None => info!("Metrics endpoint disabled"),
        Some(port) => {
            metrics::init();
            tokio::spawn(http::run_metrics_server(port));
        }
    }

    let mailboxes = Arc::new(Mailboxes::new());
    let matrix = Matrix::new(
        config,
        mailboxes.clone(),
        Arc::new(NullObserver),
        Arc::new(SystemClock),
    );
    let actor = CoreActor::new(matrix, Registry::new(), mailboxes, TICK);
    let (handle, task) = actor.spawn();

    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested");
    handle.shutdown().await?;

    let matrix = task.await?;
    info!(
        users = matrix.users.total(),
        xlines = matrix.xlines.len(),
        "Shutdown complete"
    );
    Ok(())
}
