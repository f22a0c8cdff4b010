//! Interval-driven sync daemon

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::cli::build_engine;
use crate::client::ActivitySource;
use crate::config::{parse_interval, AppConfig};
use crate::error::{GarminError, Result};
use crate::storage::ActivityStore;
use crate::sync::SyncEngine;

/// Trigger a sync run every interval until Ctrl-C
pub async fn run(config: &AppConfig, interval: Option<String>) -> Result<()> {
    let interval = match interval {
        Some(s) => parse_interval(&s)?,
        None => config.interval,
    };
    let engine = Arc::new(build_engine(config, config.sync_options())?);

    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Interrupt received, shutting down");
                shutdown.cancel();
            }
        });
    }

    info!(
        interval_secs = interval.as_secs(),
        db = %config.db_path.display(),
        "Daemon started"
    );
    run_loop(engine, interval, shutdown).await;
    info!("Daemon stopped");
    Ok(())
}

/// Spawn a run on every tick; a tick that finds a run active does nothing.
///
/// On shutdown the active run is cancelled and awaited.
pub async fn run_loop<S, D>(
    engine: Arc<SyncEngine<S, D>>,
    interval: Duration,
    shutdown: CancellationToken,
) where
    S: ActivitySource + 'static,
    D: ActivityStore + 'static,
{
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut in_flight: Option<JoinHandle<()>> = None;

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {
                if engine.status().running {
                    info!("Sync already running, skipping this tick");
                    continue;
                }
                in_flight = Some(spawn_run(engine.clone(), shutdown.child_token()));
            }
        }
    }

    if let Some(handle) = in_flight {
        let _ = handle.await;
    }
}

fn spawn_run<S, D>(engine: Arc<SyncEngine<S, D>>, cancel: CancellationToken) -> JoinHandle<()>
where
    S: ActivitySource + 'static,
    D: ActivityStore + 'static,
{
    tokio::spawn(async move {
        match engine.run(&cancel).await {
            Ok(result) => info!(%result, "Scheduled sync finished"),
            Err(GarminError::AlreadyRunning) => info!("Sync already running"),
            Err(e) => error!(error = %e, "Scheduled sync failed"),
        }
    })
}
