// src/core/state/core.rs

//! Defines the central `BrokerState` struct, holding all shared, process-wide
//! context: the metadata store, transport, stream probe, analytics sink, and
//! the resolved configuration.

use crate::config::Config;
use crate::core::BrokerError;
use crate::core::analytics::{AnalyticsSink, LoggingAnalyticsSink, NoopAnalyticsSink};
use crate::core::metadata::model::system_key;
use crate::core::metadata::{InMemoryMetadataStore, MetadataStore};
use crate::core::metrics::Metrics;
use crate::core::pubsub::{LocalTransport, Transport};
use crate::core::stream_probe::{InMemoryStreamProbe, StreamProbe};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tracing::info;

/// Everything required to spawn the broker's background tasks, handed from
/// `initialization::setup` to `spawner::spawn_all`.
pub struct BrokerInit {
    /// The fully initialized, shared broker state.
    pub state: Arc<BrokerState>,
    /// Broadcasts the shutdown signal to every spawned task.
    pub shutdown_tx: broadcast::Sender<()>,
    /// Tracks every spawned background task for a clean join at shutdown.
    pub background_tasks: JoinSet<anyhow::Result<()>>,
}

/// The central struct holding all shared, process-wide context. Wrapped in
/// an `Arc` and passed to the dispatcher, the census, and the reaper.
pub struct BrokerState {
    /// The resolved, validated configuration this broker started with.
    pub config: Config,
    /// Typed access to stations, producers, consumers, connections, and system keys.
    pub metadata: Arc<dyn MetadataStore>,
    /// The pub/sub transport every control subject rides on.
    pub transport: Arc<dyn Transport>,
    /// Backend used by the reaper's stale-station sweep.
    pub stream_probe: Arc<dyn StreamProbe>,
    /// Legacy telemetry sink invoked once per reaper tick.
    pub analytics: Arc<dyn AnalyticsSink>,
    /// Minted once on first boot, persisted, and never rewritten thereafter.
    pub deployment_id: String,
    /// Ambient dispatch/reaper counters exposed by the metrics server.
    pub metrics: Arc<Metrics>,
}

impl BrokerState {
    /// Initializes the entire broker context from the given configuration.
    /// This is the main factory function for creating the shared context.
    pub async fn initialize(config: Config) -> Result<BrokerInit, BrokerError> {
        let metadata: Arc<dyn MetadataStore> = Arc::new(InMemoryMetadataStore::new());

        let local_transport = LocalTransport::new();
        local_transport.set_clustered(config.cluster.enabled);
        let transport: Arc<dyn Transport> = Arc::new(local_transport);

        let stream_probe: Arc<dyn StreamProbe> = Arc::new(InMemoryStreamProbe::new());

        let analytics: Arc<dyn AnalyticsSink> = if config.analytics.enabled {
            Arc::new(LoggingAnalyticsSink)
        } else {
            Arc::new(NoopAnalyticsSink)
        };

        let deployment_id = Self::mint_or_read_deployment_id(metadata.as_ref()).await?;
        Self::persist_analytics_flag(metadata.as_ref(), config.analytics.enabled).await?;

        let (shutdown_tx, _) = broadcast::channel(1);

        let state = Arc::new(Self {
            config,
            metadata,
            transport,
            stream_probe,
            analytics,
            deployment_id,
            metrics: Arc::new(Metrics::new()),
        });

        Ok(BrokerInit {
            state,
            shutdown_tx,
            background_tasks: JoinSet::new(),
        })
    }

    /// Reads the persisted `deployment_id`, minting and persisting a fresh one
    /// on first boot (S5). Once written it is never rewritten.
    async fn mint_or_read_deployment_id(metadata: &dyn MetadataStore) -> Result<String, BrokerError> {
        match metadata.get_system_key(system_key::DEPLOYMENT_ID).await {
            Ok(key) => Ok(key.value),
            Err(BrokerError::NotFound) => {
                let mut bytes = [0u8; 12];
                getrandom::fill(&mut bytes).map_err(|e| BrokerError::Internal(e.to_string()))?;
                let id = hex::encode(bytes);
                metadata
                    .set_system_key(system_key::DEPLOYMENT_ID, id.clone())
                    .await?;
                info!(deployment_id = %id, "minted new deployment id");
                Ok(id)
            }
            Err(e) => Err(e),
        }
    }

    /// Writes the `analytics` system key on first boot only; an operator that
    /// toggles `analytics.enabled` across restarts takes effect through the
    /// config, not by rewriting this key.
    async fn persist_analytics_flag(
        metadata: &dyn MetadataStore,
        enabled: bool,
    ) -> Result<(), BrokerError> {
        match metadata.get_system_key(system_key::ANALYTICS).await {
            Ok(_) => Ok(()),
            Err(BrokerError::NotFound) => {
                metadata
                    .set_system_key(system_key::ANALYTICS, enabled.to_string())
                    .await
            }
            Err(e) => Err(e),
        }
    }
}
