// src/server/mod.rs

//! Orchestrates process startup: build the shared state, install the
//! dispatcher, spawn the zombie reaper and the ambient metrics endpoint, then
//! run until shutdown.

mod initialization;
mod metrics_server;
mod spawner;

use crate::config::Config;
use anyhow::Result;
use tracing::info;

/// The main server startup function, orchestrating all setup phases.
pub async fn run(config: Config) -> Result<()> {
    // 1. Build the shared process-wide context.
    let mut init = initialization::setup(config).await?;

    // 2. Install the eight SDK control-subject subscriptions.
    crate::core::dispatcher::install(&init.state);

    // 3. Spawn the zombie reaper and the ambient metrics endpoint.
    spawner::spawn_all(&mut init).await?;

    // 4. Run until a shutdown signal arrives, then join every task.
    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");
    let _ = init.shutdown_tx.send(());

    while let Some(result) = init.background_tasks.join_next().await {
        match result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!(error = %e, "background task exited with an error"),
            Err(e) => tracing::error!(error = %e, "background task panicked"),
        }
    }

    Ok(())
}
