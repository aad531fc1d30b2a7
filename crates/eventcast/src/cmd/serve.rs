//! Serve command - run the relay
//!
//! Wires the pipeline together: picks the configured sink, spawns its
//! drain task, connects the router to the cluster's event watch, and
//! tears everything down on SIGINT/SIGTERM.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use kube::Client;
use tokio::signal;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use eventcast_config::{Config, SinkSelection};
use eventcast_events::EventSink;
use eventcast_router::EventRouter;
use eventcast_sinks::OverflowPolicy;
use eventcast_sinks::seqlog::{HttpAppendClient, SeqLogConfig, SeqLogSink};
use eventcast_sinks::stdout::{StdoutConfig, StdoutSink};

use crate::watch::WatchSource;

/// How long shutdown waits for the watch and drain tasks
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Serve command arguments
#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Path to configuration file (defaults to eventcast.toml if present)
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

/// Run the serve command
pub async fn run(args: ServeArgs) -> Result<()> {
    let config_path = args
        .config
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "(default)".to_string());

    info!(
        version = env!("CARGO_PKG_VERSION"),
        platform = std::env::consts::OS,
        config = %config_path,
        "Eventcast starting"
    );

    let config = load_config(args.config)?;

    if let Err(e) = run_relay(config).await {
        error!(error = %e, "relay error");
        return Err(e);
    }

    info!("Eventcast shutdown complete");
    Ok(())
}

/// Load configuration from an explicit path, a default path, or defaults
fn load_config(path: Option<PathBuf>) -> Result<Config> {
    if let Some(path) = path {
        // User explicitly provided a config path - it must exist
        if !path.exists() {
            anyhow::bail!("config file not found: {}", path.display());
        }
        return Config::from_file(&path).context("failed to load configuration");
    }

    let default_paths = [
        PathBuf::from("eventcast.toml"),
        PathBuf::from("configs/eventcast.toml"),
    ];

    for path in &default_paths {
        if path.exists() {
            info!(config = %path.display(), "using config file");
            return Config::from_file(path).context("failed to load configuration");
        }
    }

    info!("no config file found, using defaults (stdout sink, all namespaces)");
    Ok(Config::default())
}

/// Main relay run loop
async fn run_relay(config: Config) -> Result<()> {
    // Coordinated shutdown for the watch and every drain task
    let cancel = CancellationToken::new();

    let (sink, sink_task) = build_sink(&config, cancel.clone())?;
    info!(sink = config.sink.type_name(), "sink selected");

    let router = EventRouter::new(sink);

    // Startup is the only fatal path: without a cluster connection
    // there is nothing to relay.
    let client = Client::try_default()
        .await
        .context("failed to connect to the cluster API")?;

    let watch = WatchSource::new(client, config.watch.namespace(), router);
    let watch_task = tokio::spawn(watch.run(cancel.clone()));

    info!(
        namespace = config.watch.namespace().unwrap_or("(all)"),
        "Eventcast running"
    );

    wait_for_shutdown().await;
    info!("shutdown signal received, stopping relay...");

    cancel.cancel();

    for (name, task) in [("watch", watch_task), ("sink", sink_task)] {
        match tokio::time::timeout(SHUTDOWN_TIMEOUT, task).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(task = name, error = %e, "task panicked during shutdown"),
            Err(_) => warn!(task = name, "task did not finish within timeout"),
        }
    }

    Ok(())
}

/// Construct the configured sink and spawn its drain task
///
/// Returns the producer handle for the router and the drain task's
/// join handle.
fn build_sink(
    config: &Config,
    cancel: CancellationToken,
) -> Result<(Arc<dyn EventSink>, JoinHandle<()>)> {
    let policy = if config.relay.drop_oldest {
        OverflowPolicy::DropOldest
    } else {
        OverflowPolicy::DropNewest
    };

    match &config.sink {
        SinkSelection::Stdout(stdout_config) => {
            let sink_config = StdoutConfig {
                color: stdout_config.color,
                relay_capacity: config.relay.capacity,
                overflow_policy: policy,
            };

            let sink = StdoutSink::new(sink_config);
            let handle = sink.handle();

            let task = tokio::spawn(async move {
                let snapshot = sink.run(cancel).await;
                info!(
                    received = snapshot.records_received,
                    printed = snapshot.records_printed,
                    "stdout sink finished"
                );
            });

            Ok((Arc::new(handle), task))
        }

        SinkSelection::Seqlog(seqlog_config) => {
            let client = HttpAppendClient::new(&seqlog_config.endpoint, &seqlog_config.log_group)
                .context("failed to build log service client")?;

            let sink_config = SeqLogConfig::new(&seqlog_config.log_stream)
                .with_upload_interval(Duration::from_secs(seqlog_config.upload_interval_secs))
                .with_max_message_size(seqlog_config.max_message_size)
                .with_relay_capacity(config.relay.capacity)
                .with_overflow_policy(policy);

            let sink = SeqLogSink::new(sink_config, Arc::new(client));
            let handle = sink.handle();

            let endpoint = seqlog_config.endpoint.clone();
            let task = tokio::spawn(async move {
                let snapshot = sink.run(cancel).await;
                info!(
                    endpoint = %endpoint,
                    staged = snapshot.records_staged,
                    appends = snapshot.appends,
                    failures = snapshot.upload_failures,
                    "seqlog sink finished"
                );
            });

            Ok((Arc::new(handle), task))
        }
    }
}

/// Wait for SIGINT or SIGTERM
async fn wait_for_shutdown() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
#[path = "serve_test.rs"]
mod serve_test;
