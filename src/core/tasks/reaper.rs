// src/core/tasks/reaper.rs

//! The zombie reaper (component C7): a single long-lived task, gated to the
//! cluster leader, that reconciles persisted connection/producer/consumer
//! activity against the connection census and sweeps stations whose backing
//! stream has disappeared.

use crate::core::BrokerError;
use crate::core::analytics::ActiveCountsEvent;
use crate::core::census;
use crate::core::metadata::{
    ConnectionFilter, ConnectionPatch, ConsumerFilter, ConsumerPatch, ProducerFilter,
    ProducerPatch, StationFilter, StationPatch,
};
use crate::core::state::BrokerState;
use crate::core::stream_probe::internal_stream_name;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// The background task struct for the zombie reaper.
pub struct ReaperTask {
    state: Arc<BrokerState>,
}

impl ReaperTask {
    pub fn new(state: Arc<BrokerState>) -> Self {
        Self { state }
    }

    /// The main run loop: startup leader gate, then one reconciliation pass
    /// every `reaper.tick_interval_secs`, until shutdown.
    pub async fn run(self, mut shutdown_rx: broadcast::Receiver<()>) {
        if self.state.config.cluster.enabled {
            info!("clustered deployment; waiting for leadership before starting zombie reaper");
            if !self.wait_for_leadership(&mut shutdown_rx).await {
                info!("leadership not acquired after polling; zombie reaper exiting");
                return;
            }
        }

        info!("zombie reaper started");
        let mut interval =
            tokio::time::interval(Duration::from_secs(self.state.config.reaper.tick_interval_secs));

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.run_pass().await {
                        warn!(error = %e, "zombie reaper pass failed");
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("zombie reaper shutting down");
                    return;
                }
            }
        }
    }

    /// Polls every `leader_poll_interval_secs` until this node is the
    /// leader, giving up after `leader_poll_max_attempts`. Returns `false`
    /// immediately on shutdown.
    async fn wait_for_leadership(&self, shutdown_rx: &mut broadcast::Receiver<()>) -> bool {
        let interval = Duration::from_secs(self.state.config.reaper.leader_poll_interval_secs);
        let max_attempts = self.state.config.reaper.leader_poll_max_attempts;

        for attempt in 1..=max_attempts {
            if self.state.transport.is_leader() {
                return true;
            }
            debug!(attempt, max_attempts, "not leader yet; polling again after interval");
            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = shutdown_rx.recv() => return false,
            }
        }

        self.state.transport.is_leader()
    }

    /// One full reconciliation pass: zombie-connection cascade, then
    /// stale-station sweep, then legacy telemetry. Each step is independently
    /// best-effort; a failure in one does not abort the others.
    pub async fn run_pass(&self) -> Result<(), BrokerError> {
        let (census_size, zombie_count) = self.reap_zombie_connections().await?;
        self.sweep_stale_stations().await;
        self.report_legacy_telemetry().await;
        self.state.metrics.record_reaper_pass(census_size, zombie_count);
        Ok(())
    }

    async fn reap_zombie_connections(&self) -> Result<(u64, u64), BrokerError> {
        let state = &self.state;

        let active_connections = state
            .metadata
            .find_all_connections(&ConnectionFilter {
                is_active: Some(true),
                ..Default::default()
            })
            .await?;

        if active_connections.is_empty() {
            return Ok((0, 0));
        }

        let persisted_ids: HashSet<String> =
            active_connections.iter().map(|c| c.id.clone()).collect();

        let census = census::run(
            state.transport.clone(),
            &state.config.census.subject,
            Duration::from_secs(state.config.census.timeout_secs),
        )
        .await?;
        let census_size = census.len() as u64;

        let zombies: Vec<String> = persisted_ids.difference(&census).cloned().collect();
        let zombie_count = zombies.len() as u64;
        if zombies.is_empty() {
            return Ok((census_size, zombie_count));
        }

        warn!(count = zombies.len(), "zombie connections detected");

        if let Err(e) = state
            .metadata
            .update_connections(
                &ConnectionFilter {
                    id_in: Some(zombies.clone()),
                    ..Default::default()
                },
                ConnectionPatch {
                    is_active: Some(false),
                },
            )
            .await
        {
            error!(error = %e, "failed to deactivate zombie connections");
        }

        if let Err(e) = state
            .metadata
            .update_producers(
                &ProducerFilter {
                    connection_id_in: Some(zombies.clone()),
                    ..Default::default()
                },
                ProducerPatch {
                    is_active: Some(false),
                },
            )
            .await
        {
            error!(error = %e, "failed to deactivate producers of zombie connections");
        }

        if let Err(e) = state
            .metadata
            .update_consumers(
                &ConsumerFilter {
                    connection_id_in: Some(zombies),
                    ..Default::default()
                },
                ConsumerPatch {
                    is_active: Some(false),
                },
            )
            .await
        {
            error!(error = %e, "failed to deactivate consumers of zombie connections");
        }

        Ok((census_size, zombie_count))
    }

    async fn sweep_stale_stations(&self) {
        let state = self.state.clone();
        let stations = match state
            .metadata
            .find_all_stations(&StationFilter {
                is_deleted: Some(false),
                ..Default::default()
            })
            .await
        {
            Ok(stations) => stations,
            Err(e) => {
                error!(error = %e, "failed to load stations for stale-station sweep");
                return;
            }
        };

        let mut probes = JoinSet::new();
        for station in stations {
            let state = state.clone();
            probes.spawn(async move {
                let internal_name = internal_stream_name(&station.name);
                match state.stream_probe.stream_info(&internal_name).await {
                    Ok(_) => {}
                    Err(BrokerError::StreamNotFound(_)) => {
                        if let Err(e) = state
                            .metadata
                            .update_stations(
                                &StationFilter {
                                    name: Some(station.name.clone()),
                                    ..Default::default()
                                },
                                StationPatch {
                                    is_deleted: Some(true),
                                    ..Default::default()
                                },
                            )
                            .await
                        {
                            error!(error = %e, station = %station.name, "failed to mark stale station deleted");
                        } else {
                            warn!(station = %station.name, "marked stale station deleted");
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, station = %station.name, "stream probe failed; leaving station untouched");
                    }
                }
            });
        }
        while probes.join_next().await.is_some() {}
    }

    async fn report_legacy_telemetry(&self) {
        let state = &self.state;
        let active_producers = state
            .metadata
            .find_all_producers(&ProducerFilter::default())
            .await
            .map(|producers| producers.iter().filter(|p| p.is_active).count() as u64)
            .unwrap_or(0);
        let active_consumers = state
            .metadata
            .find_all_consumers(&ConsumerFilter::default())
            .await
            .map(|consumers| consumers.iter().filter(|c| c.is_active).count() as u64)
            .unwrap_or(0);

        state
            .analytics
            .report_active_counts(
                &state.deployment_id,
                ActiveCountsEvent {
                    active_producers,
                    active_consumers,
                },
            )
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::core::analytics::NoopAnalyticsSink;
    use crate::core::metadata::{
        Connection, Consumer, InMemoryMetadataStore, MetadataStore, Producer, Station,
    };
    use crate::core::pubsub::LocalTransport;
    use crate::core::stream_probe::{InMemoryStreamProbe, StreamProbe};
    use async_trait::async_trait;

    fn test_state(transport: Arc<LocalTransport>) -> Arc<BrokerState> {
        Arc::new(BrokerState {
            config: Config::default(),
            metadata: Arc::new(InMemoryMetadataStore::new()),
            transport,
            stream_probe: Arc::new(InMemoryStreamProbe::new()),
            analytics: Arc::new(NoopAnalyticsSink),
            deployment_id: "test-deployment".into(),
            metrics: Arc::new(crate::core::metrics::Metrics::new()),
        })
    }

    #[tokio::test(start_paused = true)]
    async fn zombie_connection_cascade_deactivates_descendants() {
        let state = test_state(Arc::new(LocalTransport::new()));

        state
            .metadata
            .insert_connection(Connection {
                id: "c1".into(),
                is_active: true,
            })
            .await
            .unwrap();
        state
            .metadata
            .insert_producer(Producer {
                name: "p1".into(),
                station_name: "s1".into(),
                connection_id: "c1".into(),
                producer_type: "app".into(),
                is_active: true,
                req_version: None,
            })
            .await
            .unwrap();
        state
            .metadata
            .insert_producer(Producer {
                name: "p2".into(),
                station_name: "s1".into(),
                connection_id: "c1".into(),
                producer_type: "app".into(),
                is_active: true,
                req_version: None,
            })
            .await
            .unwrap();
        state
            .metadata
            .insert_consumer(Consumer {
                name: "cons1".into(),
                station_name: "s1".into(),
                connection_id: "c1".into(),
                consumer_type: "app".into(),
                consumers_group: "g1".into(),
                max_ack_time_ms: 1000,
                max_msg_deliveries: 5,
                is_active: true,
            })
            .await
            .unwrap();

        let reaper = ReaperTask::new(state.clone());
        // No peers ever answer the census subscription, so it returns empty
        // after the configured deadline.
        let handle = tokio::spawn(async move { reaper.run_pass().await });
        tokio::task::yield_now().await;
        tokio::time::advance(Duration::from_secs(state.config.census.timeout_secs)).await;
        handle.await.unwrap().unwrap();

        let conn = state
            .metadata
            .find_one_connection(&ConnectionFilter {
                id: Some("c1".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(!conn.is_active);

        let producers = state
            .metadata
            .find_all_producers(&ProducerFilter {
                station_name: Some("s1".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(producers.iter().all(|p| !p.is_active));

        let consumer = state
            .metadata
            .find_one_consumer(&ConsumerFilter {
                station_name: Some("s1".into()),
                name: Some("cons1".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(!consumer.is_active);
    }

    fn blank_station(name: &str) -> Station {
        Station {
            name: name.into(),
            schema_name: String::new(),
            retention_type: "age".into(),
            retention_value: 1,
            storage_type: "file".into(),
            replicas: 1,
            dedup_enabled: false,
            dedup_window_in_ms: 0,
            idempotency_window_in_ms: 0,
            dls_configuration: Default::default(),
            is_deleted: false,
        }
    }

    // s1's stream is genuinely absent (InMemoryStreamProbe's default:
    // nothing registered). s2's probe fails with a non-StreamNotFound
    // error, which must leave it untouched.
    struct FlakyProbe;
    #[async_trait]
    impl StreamProbe for FlakyProbe {
        async fn stream_info(
            &self,
            internal_name: &str,
        ) -> Result<crate::core::stream_probe::StreamInfo, BrokerError> {
            if internal_name == "s2" {
                Err(BrokerError::Transport("backend unreachable".into()))
            } else {
                Err(BrokerError::StreamNotFound(internal_name.to_string()))
            }
        }
    }

    #[tokio::test]
    async fn stale_station_sweep_only_deletes_on_stream_not_found() {
        let state = Arc::new(BrokerState {
            config: Config::default(),
            metadata: Arc::new(InMemoryMetadataStore::new()),
            transport: Arc::new(LocalTransport::new()),
            stream_probe: Arc::new(FlakyProbe),
            analytics: Arc::new(NoopAnalyticsSink),
            deployment_id: "test-deployment".into(),
            metrics: Arc::new(crate::core::metrics::Metrics::new()),
        });

        state
            .metadata
            .insert_station(blank_station("s1"))
            .await
            .unwrap();
        state
            .metadata
            .insert_station(blank_station("s2"))
            .await
            .unwrap();

        let reaper = ReaperTask::new(state.clone());
        reaper.run_pass().await.unwrap();

        let s1 = state
            .metadata
            .find_one_station(&StationFilter {
                name: Some("s1".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(s1.is_deleted);

        let s2 = state
            .metadata
            .find_one_station(&StationFilter {
                name: Some("s2".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(!s2.is_deleted);
    }

    #[tokio::test]
    async fn leadership_gate_blocks_standalone_reaper_not_at_all() {
        let state = test_state(Arc::new(LocalTransport::new()));
        assert!(state.transport.is_leader());
        assert!(!state.config.cluster.enabled);
    }
}
