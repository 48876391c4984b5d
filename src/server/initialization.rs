// src/server/initialization.rs

//! Builds the process-wide `BrokerState` before the dispatcher and
//! background tasks are started.

use crate::config::Config;
use crate::core::state::BrokerInit;
use anyhow::Result;
use tracing::info;

/// Initializes the broker's shared context.
pub async fn setup(config: Config) -> Result<BrokerInit> {
    log_startup_info(&config);
    let init = crate::core::state::BrokerState::initialize(config).await?;
    info!(deployment_id = %init.state.deployment_id, "broker state initialized");
    Ok(init)
}

fn log_startup_info(config: &Config) {
    if config.cluster.enabled {
        info!("broker starting in CLUSTERED mode");
    } else {
        info!("broker starting in STANDALONE mode");
    }
    info!(
        census_subject = %config.census.subject,
        census_timeout_secs = config.census.timeout_secs,
        reaper_tick_interval_secs = config.reaper.tick_interval_secs,
        "control-plane timers configured"
    );
}
