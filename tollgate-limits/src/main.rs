#![forbid(unsafe_code)]

use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use clap::Parser;
use tokio::sync::watch;
use tollgate_lib::limiter::run_limits;
use tollgate_lib::server::shutdown_signal;
use tollgate_lib::telemetry::{init_metrics, init_tracing, start_observability_server};
use tollgate_lib::load_limits_config;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about = "Tollgate rate limiter service (token buckets)")]
struct Cli {
    /// Path to configuration TOML file
    #[arg(
        short,
        long,
        value_name = "FILE",
        env = "TOLLGATE_LIMITS_CONFIG",
        default_value = "config/limits.toml"
    )]
    config: PathBuf,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let cfg = match load_limits_config(&cli.config) {
        Ok(cfg) => Arc::new(cfg),
        Err(err) => {
            eprintln!("failed to load configuration from {}: {err}", cli.config.display());
            std::process::exit(1);
        }
    };

    if let Err(err) = init_tracing(&cfg.logging, &cfg.telemetry) {
        eprintln!("failed to initialize tracing: {err}");
        std::process::exit(1);
    }
    info!(
        ?cfg.listen,
        protected_prefix = %cfg.policy.protected_prefix,
        reset_seconds = cfg.reset_seconds,
        "configuration loaded"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let ready = Arc::new(AtomicBool::new(false));

    let metrics = match cfg.telemetry.metrics_port {
        Some(port) => match init_metrics("tollgate-limits") {
            Ok((metrics, registry)) => {
                let ready = Arc::clone(&ready);
                let timeout = cfg.timeout.clone();
                let mut rx = shutdown_rx.clone();
                tokio::spawn(async move {
                    let stop = async move {
                        let _ = rx.changed().await;
                    };
                    if let Err(err) =
                        start_observability_server(port, registry, ready, timeout, stop).await
                    {
                        error!(%err, "observability server exited with error");
                    }
                });
                Some(metrics)
            }
            Err(err) => {
                warn!(%err, "failed to initialize metrics, continuing without them");
                None
            }
        },
        None => None,
    };

    let shutdown = async move {
        if let Err(err) = shutdown_signal().await {
            error!(%err, "signal handling failed, shutting down");
        }
        let _ = shutdown_tx.send(true);
    };

    if let Err(err) = run_limits(cfg, metrics, ready, shutdown).await {
        error!(%err, "rate limiter exited with error");
        std::process::exit(1);
    }
}
