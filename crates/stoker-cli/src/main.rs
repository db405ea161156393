//! `stoker` binary: the `go` (Master) and `unit` (DelayMaterializer /
//! WorkerUnit) entrypoints (§6).

use std::sync::Arc;

use clap::Parser;
use tokio::signal;
use tracing::{error, info};

use stoker::{create_pool, DelayMaterializer, Master, RedisStore, StokerConfig, StokerResult, TokioProcessLauncher, UnitKind, WorkerUnit};
use stoker_cli::{local_host_identity, Cli, Commands, LoggingDispatcher};

#[tokio::main]
async fn main() {
    stoker_cli::init_logging();
    info!(version = env!("CARGO_PKG_VERSION"), "starting stoker");

    match run().await {
        Ok(()) => std::process::exit(0),
        Err(err) if err.is_benign_exit() => {
            info!(%err, "exiting");
            std::process::exit(0);
        }
        Err(err) => {
            error!(%err, "unrecoverable error");
            std::process::exit(1);
        }
    }
}

async fn run() -> StokerResult<()> {
    let cli = Cli::parse();
    let config = StokerConfig::load(&cli.config_dir)?;
    let pool = create_pool(&config.redis).await?;
    let store = Arc::new(RedisStore::new(pool));
    let host = local_host_identity();

    match cli.command {
        Commands::Go => {
            let launcher = Arc::new(TokioProcessLauncher);
            let master = Master::new(store, launcher, config, host);
            tokio::select! {
                result = master.run() => result,
                _ = shutdown_signal() => {
                    info!("received shutdown signal; letting the watch-hash TTL reclaim this host's keys");
                    Ok(())
                }
            }
        }
        Commands::Unit { kind, name } => {
            let config = StokerConfig { queue_name: name, ..config };
            match UnitKind::from(kind) {
                UnitKind::Delay => {
                    let materializer = DelayMaterializer::new(store, &config);
                    materializer.sweep().await.map(|_| ())
                }
                UnitKind::Realtime => {
                    let dispatcher = Arc::new(LoggingDispatcher);
                    let unit = WorkerUnit::new(store, dispatcher, config, host);
                    unit.run().await
                }
            }
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
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
        _ = ctrl_c => info!("received Ctrl+C"),
        _ = terminate => info!("received terminate signal"),
    }
}
