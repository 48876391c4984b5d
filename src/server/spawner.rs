// src/server/spawner.rs

//! Spawns the server's long-running background tasks: the zombie reaper and,
//! if enabled, the ambient metrics endpoint.

use super::metrics_server;
use crate::core::state::BrokerInit;
use crate::core::tasks::reaper::ReaperTask;
use anyhow::Result;
use tracing::info;

/// Spawns every background task into the shared `JoinSet`.
pub async fn spawn_all(init: &mut BrokerInit) -> Result<()> {
    let state = &init.state;
    let shutdown_tx = &init.shutdown_tx;
    let background_tasks = &mut init.background_tasks;

    let reaper = ReaperTask::new(state.clone());
    let shutdown_rx_reaper = shutdown_tx.subscribe();
    background_tasks.spawn(async move {
        reaper.run(shutdown_rx_reaper).await;
        Ok(())
    });

    if state.config.metrics.enabled {
        let metrics_state = state.clone();
        let shutdown_rx_metrics = shutdown_tx.subscribe();
        background_tasks.spawn(async move {
            metrics_server::run(metrics_state, shutdown_rx_metrics).await;
            Ok(())
        });
    } else {
        info!("metrics endpoint disabled in configuration");
    }

    info!("all background tasks spawned");
    Ok(())
}
