//! Tranche Engine Binary
//!
//! Reads newline-delimited JSON trading decisions from stdin and executes
//! them through the execution pool while the reconciler settles pending
//! trades in the background.
//!
//! # Usage
//!
//! ```bash
//! # Config path: first argument, then TRANCHE_CONFIG, then ./config.yaml
//! tranche-engine config.yaml < decisions.jsonl
//! ```

use std::sync::Arc;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use tranche_engine::application::ports::BrokerPort;
use tranche_engine::application::services::ReconciliationLoop;
use tranche_engine::config::{Config, DEFAULT_CONFIG_PATH, TradingMode, load_config};
use tranche_engine::domain::trade_execution::TradingDecision;
use tranche_engine::infrastructure::config::{Container, build_paper_broker, build_rest_broker};
use tranche_engine::observability::{MetricsConfig, init_logging, init_metrics};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();

    let path = config_path();
    let config = load_config(Some(path.as_str())).with_context(|| format!("loading {path}"))?;

    init_logging(
        Some(&config.observability.log_level),
        config.observability.json_logs,
    )?;
    if config.observability.metrics_enabled {
        init_metrics(&MetricsConfig::with_addr(config.metrics_addr()?))?;
    }

    tracing::info!(
        mode = %config.environment.mode,
        instruments = config.instruments.len(),
        calls_per_minute = config.gateway.calls_per_minute,
        "Starting tranche engine"
    );

    match config.environment.mode {
        TradingMode::Simulated => {
            let broker = Arc::new(build_paper_broker(&config.broker.simulated));
            run(config, broker).await
        }
        TradingMode::Paper | TradingMode::Live => {
            let broker = Arc::new(build_rest_broker(&config)?);
            run(config, broker).await
        }
    }
}

/// Wire the container around `broker` and process stdin until EOF or a signal.
async fn run<B>(config: Config, broker: Arc<B>) -> anyhow::Result<()>
where
    B: BrokerPort + 'static,
{
    let container = Container::new(config, broker);
    let shutdown = CancellationToken::new();

    let reconciliation = container.config().reconciliation.clone();
    let reconciler = reconciliation.enabled.then(|| {
        let reconciliation_loop = ReconciliationLoop::new(
            Arc::new(container.order_reconciler()),
            reconciliation.interval(),
            shutdown.clone(),
        );
        tokio::spawn(reconciliation_loop.run())
    });

    let pool = container.execution_pool();
    let mut outcomes = JoinSet::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    let signal = shutdown_signal();
    tokio::pin!(signal);

    loop {
        tokio::select! {
            () = &mut signal => break,
            line = lines.next_line() => {
                let Some(line) = line.context("reading stdin")? else {
                    tracing::info!("End of input, shutting down");
                    break;
                };
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let decision: TradingDecision = match serde_json::from_str(line) {
                    Ok(decision) => decision,
                    Err(e) => {
                        tracing::warn!(error = %e, "Skipping malformed decision");
                        continue;
                    }
                };
                let handle = pool.submit(decision).await.context("execution pool closed")?;
                outcomes.spawn(async move {
                    match handle.await {
                        Ok(outcome) => tracing::info!(
                            outcome = outcome.label(),
                            detail = ?outcome,
                            "Decision processed"
                        ),
                        Err(e) => tracing::error!(error = %e, "Execution task failed"),
                    }
                });
                while outcomes.try_join_next().is_some() {}
            }
        }
    }

    shutdown.cancel();
    pool.shutdown().await;
    while outcomes.join_next().await.is_some() {}

    if let Some(handle) = reconciler {
        match handle.await {
            Ok(passes) => tracing::info!(passes, "Reconciliation loop stopped"),
            Err(e) => tracing::error!(error = %e, "Reconciliation loop failed"),
        }
    }

    tracing::info!("Tranche engine stopped");
    Ok(())
}

fn config_path() -> String {
    std::env::args()
        .nth(1)
        .or_else(|| std::env::var("TRANCHE_CONFIG").ok())
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string())
}

/// Load `.env` from the working directory or the nearest ancestor that has one.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Wait for shutdown signal (SIGTERM or SIGINT).
///
/// # Panics
///
/// Panics if signal handlers cannot be installed; the process could not be
/// stopped cleanly otherwise.
#[allow(clippy::expect_used)]
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("signal handler installation is critical for graceful shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation is critical for graceful shutdown")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }
}
