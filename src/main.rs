mod cli;

use chrono::Utc;
use clap::Parser;
use cli::{Cli, Commands};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use meterbox::config::Config;
use meterbox::delivery::DeliveryTracker;
use meterbox::device::SimulatedReader;
use meterbox::health::FileHealthPing;
use meterbox::ledger::ReadingStore;
use meterbox::messaging::HttpTransport;
use meterbox::observability::Metrics;
use meterbox::server::{self, StatusState};
use meterbox::worker::{CycleOrchestrator, Scheduler};

type AnyError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[tokio::main]
async fn main() -> Result<ExitCode, AnyError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let config = match cli.config {
        Some(path) => Config::load_from_path(path)?,
        None => Config::load()?,
    };

    match cli.command {
        Commands::Run => run(config).await?,
        Commands::Cycle => {
            if !cycle(config).await? {
                return Ok(ExitCode::FAILURE);
            }
        }
        Commands::Stats => stats(&config)?,
    }

    Ok(ExitCode::SUCCESS)
}

/// Wired components shared by the `run` and `cycle` commands
struct Components {
    store: Arc<ReadingStore>,
    transport: Arc<HttpTransport>,
    metrics: Arc<Metrics>,
    orchestrator: Arc<CycleOrchestrator>,
}

fn open_store(config: &Config) -> Result<Arc<ReadingStore>, AnyError> {
    info!(path = %config.store.path.display(), "Opening reading store");
    let store = ReadingStore::open(&config.store.path)
        .map_err(|e| format!("Failed to open reading store: {}", e))?;
    Ok(Arc::new(store))
}

fn build(config: &Config) -> Result<Components, AnyError> {
    let store = open_store(config)?;
    let transport = Arc::new(HttpTransport::new(config.http_transport_config())?);
    let metrics = Arc::new(Metrics::new());

    let tracker = DeliveryTracker::new(
        store.clone(),
        transport.clone(),
        config.transport.topic.clone(),
        config.transport.publish_timeout.as_duration(),
        metrics.clone(),
    );

    // Bus access is provided by the deployment; the bench reader keeps the
    // pipeline runnable without hardware.
    let reader = Arc::new(SimulatedReader::default());

    let mut orchestrator = CycleOrchestrator::new(
        config.cycle_config(),
        reader,
        store.clone(),
        tracker,
        metrics.clone(),
    );
    if config.health.enabled {
        let ping = FileHealthPing::new(config.health.ping_path.clone());
        orchestrator = orchestrator.with_health(Arc::new(ping));
    }

    Ok(Components {
        store,
        transport,
        metrics,
        orchestrator: Arc::new(orchestrator),
    })
}

async fn run(config: Config) -> Result<(), AnyError> {
    let components = build(&config)?;

    components.transport.probe().await;
    let probe = components
        .transport
        .spawn_probe(config.transport.probe_interval.as_duration());

    let (stop_tx, mut stop_rx) = tokio::sync::watch::channel(false);
    let status = if config.status.enabled {
        let state = StatusState {
            store: components.store.clone(),
            transport: components.transport.clone(),
            metrics: components.metrics.clone(),
        };
        let stopped = async move {
            let _ = stop_rx.wait_for(|stop| *stop).await;
        };
        Some(tokio::spawn(server::run(config.status.bind_addr, state, stopped)))
    } else {
        None
    };

    Scheduler::new(
        components.orchestrator.clone(),
        config.schedule.interval.as_duration(),
    )
    .run(shutdown_signal())
    .await;

    let _ = stop_tx.send(true);
    probe.abort();

    if let Some(handle) = status {
        match handle.await {
            Ok(Err(e)) => error!(error = %e, "Status server failed"),
            Err(e) => error!(error = %e, "Status server task panicked"),
            Ok(Ok(())) => {}
        }
    }

    info!("meterbox stopped");
    Ok(())
}

/// Run one cycle; returns `false` when the cycle failed
async fn cycle(config: Config) -> Result<bool, AnyError> {
    let components = build(&config)?;
    components.transport.probe().await;

    let report = match components.orchestrator.run_cycle(Utc::now()).await {
        Ok(report) => report,
        Err(e) => {
            error!(error = %e, "Cycle failed");
            return Ok(false);
        }
    };
    info!(
        stored = report.stored,
        live = report.live,
        deferred = report.deferred,
        resent = report.resend.delivered,
        pruned = report.pruned.map(|p| p.removed).unwrap_or(0),
        "Cycle complete"
    );
    Ok(true)
}

fn stats(config: &Config) -> Result<(), AnyError> {
    let store = open_store(config)?;
    let stats = store.stats()?;
    let last_prune = store.last_prune()?;

    println!("{}", serde_json::to_string_pretty(&stats)?);
    match last_prune {
        Some(at) => println!("last prune: {}", at.to_rfc3339()),
        None => println!("last prune: never"),
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        let mut sigterm = signal(SignalKind::terminate())
            .expect("failed to install signal handler");
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
