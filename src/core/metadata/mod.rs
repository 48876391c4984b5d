// src/core/metadata/mod.rs

//! Typed access to the persisted metadata collections: stations, producers,
//! consumers, connections, and system keys.
//!
//! The store itself is an external collaborator (see the crate's Non-goals);
//! this module fixes the typed contract the rest of the control plane calls
//! through, plus an in-memory reference implementation used by this crate's
//! own test suite and by any embedder that doesn't need durability.

mod memory;
pub mod model;

pub use memory::InMemoryMetadataStore;
pub use model::{Connection, Consumer, DlsConfiguration, Producer, Station, SystemKey};

use crate::core::BrokerError;
use async_trait::async_trait;

/// Filter for the `stations` collection. `None` fields are unconstrained.
#[derive(Debug, Clone, Default)]
pub struct StationFilter {
    pub name: Option<String>,
    pub is_deleted: Option<bool>,
}

/// Patch applied to all stations matched by a [`StationFilter`].
#[derive(Debug, Clone, Default)]
pub struct StationPatch {
    pub is_deleted: Option<bool>,
    pub schema_name: Option<String>,
}

/// Filter for the `producers` collection.
#[derive(Debug, Clone, Default)]
pub struct ProducerFilter {
    pub station_name: Option<String>,
    pub name: Option<String>,
    pub connection_id: Option<String>,
    pub connection_id_in: Option<Vec<String>>,
}

/// Patch applied to all producers matched by a [`ProducerFilter`].
#[derive(Debug, Clone, Default)]
pub struct ProducerPatch {
    pub is_active: Option<bool>,
}

/// Filter for the `consumers` collection.
#[derive(Debug, Clone, Default)]
pub struct ConsumerFilter {
    pub station_name: Option<String>,
    pub name: Option<String>,
    pub connection_id: Option<String>,
    pub connection_id_in: Option<Vec<String>>,
}

/// Patch applied to all consumers matched by a [`ConsumerFilter`].
#[derive(Debug, Clone, Default)]
pub struct ConsumerPatch {
    pub is_active: Option<bool>,
}

/// Filter for the `connections` collection.
#[derive(Debug, Clone, Default)]
pub struct ConnectionFilter {
    pub id: Option<String>,
    pub is_active: Option<bool>,
    pub id_in: Option<Vec<String>>,
}

/// Patch applied to all connections matched by a [`ConnectionFilter`].
#[derive(Debug, Clone, Default)]
pub struct ConnectionPatch {
    pub is_active: Option<bool>,
}

/// The metadata store adapter (component C1). Every operation is blocking-with-await
/// against an implementation-defined deadline; `NotFound` is a distinguished error
/// kind rather than a generic failure, per the store's error-handling contract.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    async fn find_one_station(&self, filter: &StationFilter) -> Result<Station, BrokerError>;
    async fn find_all_stations(&self, filter: &StationFilter) -> Result<Vec<Station>, BrokerError>;
    async fn insert_station(&self, station: Station) -> Result<(), BrokerError>;
    async fn update_stations(
        &self,
        filter: &StationFilter,
        patch: StationPatch,
    ) -> Result<u64, BrokerError>;

    async fn find_one_producer(&self, filter: &ProducerFilter) -> Result<Producer, BrokerError>;
    async fn find_all_producers(
        &self,
        filter: &ProducerFilter,
    ) -> Result<Vec<Producer>, BrokerError>;
    async fn insert_producer(&self, producer: Producer) -> Result<(), BrokerError>;
    async fn update_producers(
        &self,
        filter: &ProducerFilter,
        patch: ProducerPatch,
    ) -> Result<u64, BrokerError>;
    async fn count_producers(&self, filter: &ProducerFilter) -> Result<u64, BrokerError>;

    async fn find_one_consumer(&self, filter: &ConsumerFilter) -> Result<Consumer, BrokerError>;
    async fn find_all_consumers(
        &self,
        filter: &ConsumerFilter,
    ) -> Result<Vec<Consumer>, BrokerError>;
    async fn insert_consumer(&self, consumer: Consumer) -> Result<(), BrokerError>;
    async fn update_consumers(
        &self,
        filter: &ConsumerFilter,
        patch: ConsumerPatch,
    ) -> Result<u64, BrokerError>;
    async fn count_consumers(&self, filter: &ConsumerFilter) -> Result<u64, BrokerError>;

    async fn find_one_connection(
        &self,
        filter: &ConnectionFilter,
    ) -> Result<Connection, BrokerError>;
    async fn find_all_connections(
        &self,
        filter: &ConnectionFilter,
    ) -> Result<Vec<Connection>, BrokerError>;
    async fn insert_connection(&self, connection: Connection) -> Result<(), BrokerError>;
    async fn update_connections(
        &self,
        filter: &ConnectionFilter,
        patch: ConnectionPatch,
    ) -> Result<u64, BrokerError>;

    async fn get_system_key(&self, key: &str) -> Result<SystemKey, BrokerError>;
    async fn set_system_key(&self, key: &str, value: String) -> Result<(), BrokerError>;
}
