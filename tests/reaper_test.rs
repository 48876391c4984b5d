// tests/reaper_test.rs

//! Zombie-reaper reconciliation scenarios (S3, S4, S5): the cascade from a
//! zombie connection down to its producers and consumers, the stale-station
//! sweep's `StreamNotFound`-only deletion rule, and the leader gate that
//! keeps a non-leader clustered broker out of the reconciliation loop
//! entirely.

use async_trait::async_trait;
use stationd::config::Config;
use stationd::core::analytics::NoopAnalyticsSink;
use stationd::core::metadata::{
    Connection, ConnectionFilter, Consumer, ConsumerFilter, InMemoryMetadataStore, MetadataStore,
    Producer, ProducerFilter, Station, StationFilter,
};
use stationd::core::metrics::Metrics;
use stationd::core::pubsub::LocalTransport;
use stationd::core::state::BrokerState;
use stationd::core::stream_probe::{InMemoryStreamProbe, StreamInfo, StreamProbe};
use stationd::core::tasks::reaper::ReaperTask;
use stationd::core::BrokerError;
use std::sync::Arc;
use std::time::Duration;

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

// S3 / property 4 — cascade completeness.
#[tokio::test(start_paused = true)]
async fn a_zombie_connection_deactivates_its_producers_and_consumers() {
    let transport = Arc::new(LocalTransport::new());
    let state = Arc::new(BrokerState {
        config: Config::default(),
        metadata: Arc::new(InMemoryMetadataStore::new()),
        transport,
        stream_probe: Arc::new(InMemoryStreamProbe::new()),
        analytics: Arc::new(NoopAnalyticsSink),
        deployment_id: "test-deployment".into(),
        metrics: Arc::new(Metrics::new()),
    });

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

    let producer = state
        .metadata
        .find_one_producer(&ProducerFilter {
            station_name: Some("s1".into()),
            name: Some("p1".into()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(!producer.is_active);

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

// S4 / property 5 — stale-station soundness.
struct AlwaysNotFoundProbe;
#[async_trait]
impl StreamProbe for AlwaysNotFoundProbe {
    async fn stream_info(&self, internal_name: &str) -> Result<StreamInfo, BrokerError> {
        Err(BrokerError::StreamNotFound(internal_name.to_string()))
    }
}

#[tokio::test]
async fn a_station_whose_stream_is_gone_is_marked_deleted() {
    let state = Arc::new(BrokerState {
        config: Config::default(),
        metadata: Arc::new(InMemoryMetadataStore::new()),
        transport: Arc::new(LocalTransport::new()),
        stream_probe: Arc::new(AlwaysNotFoundProbe),
        analytics: Arc::new(NoopAnalyticsSink),
        deployment_id: "test-deployment".into(),
        metrics: Arc::new(Metrics::new()),
    });
    state
        .metadata
        .insert_station(blank_station("orders"))
        .await
        .unwrap();

    ReaperTask::new(state.clone()).run_pass().await.unwrap();

    let station = state
        .metadata
        .find_one_station(&StationFilter {
            name: Some("orders".into()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(station.is_deleted);
}

#[tokio::test]
async fn a_station_with_a_healthy_stream_is_left_untouched() {
    let probe = Arc::new(InMemoryStreamProbe::new());
    probe.put("orders", 10);
    let state = Arc::new(BrokerState {
        config: Config::default(),
        metadata: Arc::new(InMemoryMetadataStore::new()),
        transport: Arc::new(LocalTransport::new()),
        stream_probe: probe,
        analytics: Arc::new(NoopAnalyticsSink),
        deployment_id: "test-deployment".into(),
        metrics: Arc::new(Metrics::new()),
    });
    state
        .metadata
        .insert_station(blank_station("orders"))
        .await
        .unwrap();

    ReaperTask::new(state.clone()).run_pass().await.unwrap();

    let station = state
        .metadata
        .find_one_station(&StationFilter {
            name: Some("orders".into()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(!station.is_deleted);
}

// S5 / property 6 — leader exclusivity: a clustered broker that never
// becomes leader gives up after its poll budget without ever running a
// reconciliation pass.
#[tokio::test(start_paused = true)]
async fn a_broker_that_never_becomes_leader_exits_without_running_a_pass() {
    let transport = Arc::new(LocalTransport::new());
    transport.set_clustered(true);
    transport.set_leader(false);

    let mut config = Config::default();
    config.cluster.enabled = true;
    config.reaper.leader_poll_interval_secs = 1;
    config.reaper.leader_poll_max_attempts = 2;

    let state = Arc::new(BrokerState {
        config,
        metadata: Arc::new(InMemoryMetadataStore::new()),
        transport: transport.clone(),
        stream_probe: Arc::new(AlwaysNotFoundProbe),
        analytics: Arc::new(NoopAnalyticsSink),
        deployment_id: "test-deployment".into(),
        metrics: Arc::new(Metrics::new()),
    });
    state
        .metadata
        .insert_station(blank_station("orders"))
        .await
        .unwrap();

    let (_shutdown_tx, shutdown_rx) = tokio::sync::broadcast::channel(1);
    let reaper = ReaperTask::new(state.clone());
    let handle = tokio::spawn(async move { reaper.run(shutdown_rx).await });

    for _ in 0..3 {
        tokio::task::yield_now().await;
        tokio::time::advance(Duration::from_secs(1)).await;
    }
    tokio::task::yield_now().await;

    assert!(handle.is_finished());
    handle.await.unwrap();

    let station = state
        .metadata
        .find_one_station(&StationFilter {
            name: Some("orders".into()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(!station.is_deleted);
}

// S5 / property 6 — a clustered broker that is already leader proceeds
// straight into the reconciliation loop.
#[tokio::test(start_paused = true)]
async fn a_clustered_leader_runs_its_first_pass_on_schedule() {
    let transport = Arc::new(LocalTransport::new());
    transport.set_clustered(true);
    transport.set_leader(true);

    let mut config = Config::default();
    config.cluster.enabled = true;
    config.reaper.tick_interval_secs = 5;

    let state = Arc::new(BrokerState {
        config,
        metadata: Arc::new(InMemoryMetadataStore::new()),
        transport: transport.clone(),
        stream_probe: Arc::new(AlwaysNotFoundProbe),
        analytics: Arc::new(NoopAnalyticsSink),
        deployment_id: "test-deployment".into(),
        metrics: Arc::new(Metrics::new()),
    });
    state
        .metadata
        .insert_station(blank_station("orders"))
        .await
        .unwrap();

    let (_shutdown_tx, shutdown_rx) = tokio::sync::broadcast::channel(1);
    let reaper = ReaperTask::new(state.clone());
    let handle = tokio::spawn(async move { reaper.run(shutdown_rx).await });
    tokio::task::yield_now().await;
    tokio::time::advance(Duration::from_secs(5)).await;
    tokio::task::yield_now().await;

    let station = state
        .metadata
        .find_one_station(&StationFilter {
            name: Some("orders".into()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(station.is_deleted);

    assert!(!handle.is_finished());
    handle.abort();
}
