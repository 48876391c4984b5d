// src/core/metadata/memory.rs

//! An in-memory reference implementation of [`MetadataStore`], keyed the same
//! way `PubSubManager` keys its channel map: a `DashMap` guarding one logical
//! collection each. Suitable for single-process operation and for tests; it is
//! not a durability layer.

use super::model::{Connection, Consumer, Producer, Station, SystemKey};
use super::{
    ConnectionFilter, ConnectionPatch, ConsumerFilter, ConsumerPatch, MetadataStore,
    ProducerFilter, ProducerPatch, StationFilter, StationPatch,
};
use crate::core::BrokerError;
use async_trait::async_trait;
use dashmap::DashMap;

/// Natural key for a producer/consumer: `(station_name, name)`.
type AttachmentKey = (String, String);

#[derive(Debug, Default)]
pub struct InMemoryMetadataStore {
    stations: DashMap<String, Station>,
    producers: DashMap<AttachmentKey, Producer>,
    consumers: DashMap<AttachmentKey, Consumer>,
    connections: DashMap<String, Connection>,
    system_keys: DashMap<String, SystemKey>,
}

impl InMemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn station_matches(s: &Station, f: &StationFilter) -> bool {
    f.name.as_ref().is_none_or(|n| n == &s.name)
        && f.is_deleted.is_none_or(|d| d == s.is_deleted)
}

fn producer_matches(p: &Producer, f: &ProducerFilter) -> bool {
    f.station_name.as_ref().is_none_or(|v| v == &p.station_name)
        && f.name.as_ref().is_none_or(|v| v == &p.name)
        && f.connection_id.as_ref().is_none_or(|v| v == &p.connection_id)
        && f.connection_id_in
            .as_ref()
            .is_none_or(|set| set.iter().any(|v| v == &p.connection_id))
}

fn consumer_matches(c: &Consumer, f: &ConsumerFilter) -> bool {
    f.station_name.as_ref().is_none_or(|v| v == &c.station_name)
        && f.name.as_ref().is_none_or(|v| v == &c.name)
        && f.connection_id.as_ref().is_none_or(|v| v == &c.connection_id)
        && f.connection_id_in
            .as_ref()
            .is_none_or(|set| set.iter().any(|v| v == &c.connection_id))
}

fn connection_matches(c: &Connection, f: &ConnectionFilter) -> bool {
    f.id.as_ref().is_none_or(|v| v == &c.id)
        && f.is_active.is_none_or(|v| v == c.is_active)
        && f.id_in
            .as_ref()
            .is_none_or(|set| set.iter().any(|v| v == &c.id))
}

#[async_trait]
impl MetadataStore for InMemoryMetadataStore {
    async fn find_one_station(&self, filter: &StationFilter) -> Result<Station, BrokerError> {
        self.stations
            .iter()
            .find(|e| station_matches(e.value(), filter))
            .map(|e| e.value().clone())
            .ok_or(BrokerError::NotFound)
    }

    async fn find_all_stations(&self, filter: &StationFilter) -> Result<Vec<Station>, BrokerError> {
        Ok(self
            .stations
            .iter()
            .filter(|e| station_matches(e.value(), filter))
            .map(|e| e.value().clone())
            .collect())
    }

    async fn insert_station(&self, station: Station) -> Result<(), BrokerError> {
        self.stations.insert(station.name.clone(), station);
        Ok(())
    }

    async fn update_stations(
        &self,
        filter: &StationFilter,
        patch: StationPatch,
    ) -> Result<u64, BrokerError> {
        let mut updated = 0u64;
        for mut entry in self.stations.iter_mut() {
            if station_matches(entry.value(), filter) {
                if let Some(is_deleted) = patch.is_deleted {
                    entry.value_mut().is_deleted = is_deleted;
                }
                if let Some(schema_name) = patch.schema_name.clone() {
                    entry.value_mut().schema_name = schema_name;
                }
                updated += 1;
            }
        }
        Ok(updated)
    }

    async fn find_one_producer(&self, filter: &ProducerFilter) -> Result<Producer, BrokerError> {
        self.producers
            .iter()
            .find(|e| producer_matches(e.value(), filter))
            .map(|e| e.value().clone())
            .ok_or(BrokerError::NotFound)
    }

    async fn find_all_producers(
        &self,
        filter: &ProducerFilter,
    ) -> Result<Vec<Producer>, BrokerError> {
        Ok(self
            .producers
            .iter()
            .filter(|e| producer_matches(e.value(), filter))
            .map(|e| e.value().clone())
            .collect())
    }

    async fn insert_producer(&self, producer: Producer) -> Result<(), BrokerError> {
        let key = (producer.station_name.clone(), producer.name.clone());
        self.producers.insert(key, producer);
        Ok(())
    }

    async fn update_producers(
        &self,
        filter: &ProducerFilter,
        patch: ProducerPatch,
    ) -> Result<u64, BrokerError> {
        let mut updated = 0u64;
        for mut entry in self.producers.iter_mut() {
            if producer_matches(entry.value(), filter) {
                if let Some(is_active) = patch.is_active {
                    entry.value_mut().is_active = is_active;
                }
                updated += 1;
            }
        }
        Ok(updated)
    }

    async fn count_producers(&self, filter: &ProducerFilter) -> Result<u64, BrokerError> {
        Ok(self
            .producers
            .iter()
            .filter(|e| producer_matches(e.value(), filter))
            .count() as u64)
    }

    async fn find_one_consumer(&self, filter: &ConsumerFilter) -> Result<Consumer, BrokerError> {
        self.consumers
            .iter()
            .find(|e| consumer_matches(e.value(), filter))
            .map(|e| e.value().clone())
            .ok_or(BrokerError::NotFound)
    }

    async fn find_all_consumers(
        &self,
        filter: &ConsumerFilter,
    ) -> Result<Vec<Consumer>, BrokerError> {
        Ok(self
            .consumers
            .iter()
            .filter(|e| consumer_matches(e.value(), filter))
            .map(|e| e.value().clone())
            .collect())
    }

    async fn insert_consumer(&self, consumer: Consumer) -> Result<(), BrokerError> {
        let key = (consumer.station_name.clone(), consumer.name.clone());
        self.consumers.insert(key, consumer);
        Ok(())
    }

    async fn update_consumers(
        &self,
        filter: &ConsumerFilter,
        patch: ConsumerPatch,
    ) -> Result<u64, BrokerError> {
        let mut updated = 0u64;
        for mut entry in self.consumers.iter_mut() {
            if consumer_matches(entry.value(), filter) {
                if let Some(is_active) = patch.is_active {
                    entry.value_mut().is_active = is_active;
                }
                updated += 1;
            }
        }
        Ok(updated)
    }

    async fn count_consumers(&self, filter: &ConsumerFilter) -> Result<u64, BrokerError> {
        Ok(self
            .consumers
            .iter()
            .filter(|e| consumer_matches(e.value(), filter))
            .count() as u64)
    }

    async fn find_one_connection(
        &self,
        filter: &ConnectionFilter,
    ) -> Result<Connection, BrokerError> {
        self.connections
            .iter()
            .find(|e| connection_matches(e.value(), filter))
            .map(|e| e.value().clone())
            .ok_or(BrokerError::NotFound)
    }

    async fn find_all_connections(
        &self,
        filter: &ConnectionFilter,
    ) -> Result<Vec<Connection>, BrokerError> {
        Ok(self
            .connections
            .iter()
            .filter(|e| connection_matches(e.value(), filter))
            .map(|e| e.value().clone())
            .collect())
    }

    async fn insert_connection(&self, connection: Connection) -> Result<(), BrokerError> {
        self.connections.insert(connection.id.clone(), connection);
        Ok(())
    }

    async fn update_connections(
        &self,
        filter: &ConnectionFilter,
        patch: ConnectionPatch,
    ) -> Result<u64, BrokerError> {
        let mut updated = 0u64;
        for mut entry in self.connections.iter_mut() {
            if connection_matches(entry.value(), filter) {
                if let Some(is_active) = patch.is_active {
                    entry.value_mut().is_active = is_active;
                }
                updated += 1;
            }
        }
        Ok(updated)
    }

    async fn get_system_key(&self, key: &str) -> Result<SystemKey, BrokerError> {
        self.system_keys
            .get(key)
            .map(|e| e.value().clone())
            .ok_or(BrokerError::NotFound)
    }

    async fn set_system_key(&self, key: &str, value: String) -> Result<(), BrokerError> {
        self.system_keys.insert(
            key.to_string(),
            SystemKey {
                key: key.to_string(),
                value,
            },
        );
        Ok(())
    }
}
