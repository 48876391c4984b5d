// src/core/dispatcher/operations.rs

//! Reference implementations of the eight control operations. The actual
//! per-operation business logic (schema validation, storage provisioning,
//! notification fan-out) is an external collaborator; these implementations
//! do the minimum real work against the metadata store needed to exercise
//! the dispatch contract end to end, the same way `LocalTransport` stands
//! in for a real inter-broker transport.

use crate::core::BrokerError;
use crate::core::codec::{
    ConsumerCreationRequest, ConsumerDestructionRequest, ProducerCreationRequest,
    ProducerCreationResponse, ProducerDestructionRequest, SchemaAttachmentRequest,
    SchemaDetachmentRequest, StationCreationRequest, StationDestructionRequest,
};
use crate::core::metadata::{
    Consumer, ConsumerFilter, ConsumerPatch, MetadataStore, Producer, ProducerFilter,
    ProducerPatch, Station, StationFilter, StationPatch,
};
use crate::core::state::BrokerState;
use std::sync::Arc;

pub async fn create_station(
    state: Arc<BrokerState>,
    req: StationCreationRequest,
) -> Result<(), BrokerError> {
    let station = Station {
        name: req.name,
        schema_name: req.schema_name,
        retention_type: req.retention_type,
        retention_value: req.retention_value,
        storage_type: req.storage_type,
        replicas: req.replicas,
        dedup_enabled: req.dedup_enabled,
        dedup_window_in_ms: req.dedup_window_in_ms,
        idempotency_window_in_ms: req.idempotency_window_in_ms,
        dls_configuration: req.dls_configuration,
        is_deleted: false,
    };
    state.metadata.insert_station(station).await
}

pub async fn destroy_station(
    state: Arc<BrokerState>,
    req: StationDestructionRequest,
) -> Result<(), BrokerError> {
    state
        .metadata
        .find_one_station(&StationFilter {
            name: Some(req.station_name.clone()),
            ..Default::default()
        })
        .await?;
    state
        .metadata
        .update_stations(
            &StationFilter {
                name: Some(req.station_name),
                ..Default::default()
            },
            StationPatch {
                is_deleted: Some(true),
                ..Default::default()
            },
        )
        .await?;
    Ok(())
}

/// Creates the producer and, as a reference stand-in for real schema
/// resolution, reports a deterministic non-empty `schema_update` derived
/// from the station/producer pair.
pub async fn create_producer(
    state: Arc<BrokerState>,
    req: ProducerCreationRequest,
) -> Result<ProducerCreationResponse, BrokerError> {
    let producer = Producer {
        name: req.name.clone(),
        station_name: req.station_name.clone(),
        connection_id: req.connection_id,
        producer_type: req.producer_type,
        is_active: true,
        req_version: Some(req.version()),
    };
    state.metadata.insert_producer(producer).await?;

    Ok(ProducerCreationResponse {
        schema_update: format!("{}:{}", req.station_name, req.name),
        schemaverse_to_dls: false,
        send_notification: true,
        error: String::new(),
    })
}

pub async fn destroy_producer(
    state: Arc<BrokerState>,
    req: ProducerDestructionRequest,
) -> Result<(), BrokerError> {
    state
        .metadata
        .find_one_producer(&ProducerFilter {
            station_name: Some(req.station_name.clone()),
            name: Some(req.name.clone()),
            ..Default::default()
        })
        .await?;
    state
        .metadata
        .update_producers(
            &ProducerFilter {
                station_name: Some(req.station_name),
                name: Some(req.name),
                ..Default::default()
            },
            ProducerPatch {
                is_active: Some(false),
            },
        )
        .await?;
    Ok(())
}

pub async fn create_consumer(
    state: Arc<BrokerState>,
    req: ConsumerCreationRequest,
) -> Result<(), BrokerError> {
    let consumer = Consumer {
        name: req.name,
        station_name: req.station_name,
        connection_id: req.connection_id,
        consumer_type: req.consumer_type,
        consumers_group: req.consumers_group,
        max_ack_time_ms: req.max_ack_time_ms,
        max_msg_deliveries: req.max_msg_deliveries,
        is_active: true,
    };
    state.metadata.insert_consumer(consumer).await
}

pub async fn destroy_consumer(
    state: Arc<BrokerState>,
    req: ConsumerDestructionRequest,
) -> Result<(), BrokerError> {
    state
        .metadata
        .find_one_consumer(&ConsumerFilter {
            station_name: Some(req.station_name.clone()),
            name: Some(req.name.clone()),
            ..Default::default()
        })
        .await?;
    state
        .metadata
        .update_consumers(
            &ConsumerFilter {
                station_name: Some(req.station_name),
                name: Some(req.name),
                ..Default::default()
            },
            ConsumerPatch {
                is_active: Some(false),
            },
        )
        .await?;
    Ok(())
}

pub async fn attach_schema(
    state: Arc<BrokerState>,
    req: SchemaAttachmentRequest,
) -> Result<(), BrokerError> {
    let updated = state
        .metadata
        .update_stations(
            &StationFilter {
                name: Some(req.station_name),
                ..Default::default()
            },
            StationPatch {
                schema_name: Some(req.name),
                ..Default::default()
            },
        )
        .await?;
    if updated == 0 {
        return Err(BrokerError::NotFound);
    }
    Ok(())
}

pub async fn detach_schema(
    state: Arc<BrokerState>,
    req: SchemaDetachmentRequest,
) -> Result<(), BrokerError> {
    let updated = state
        .metadata
        .update_stations(
            &StationFilter {
                name: Some(req.station_name),
                ..Default::default()
            },
            StationPatch {
                schema_name: Some(String::new()),
                ..Default::default()
            },
        )
        .await?;
    if updated == 0 {
        return Err(BrokerError::NotFound);
    }
    Ok(())
}
