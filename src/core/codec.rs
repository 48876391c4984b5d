// src/core/codec.rs

//! Request/response types for the eight control subjects (component C4):
//! JSON in, JSON or bare-error out. Every response type can embed an error
//! via the shared [`ReplyPayload`] contract, mirroring the handler dispatch
//! convention used across the request subjects.

use crate::core::metadata::DlsConfiguration;
use serde::{Deserialize, Serialize};

/// Any response type the dispatcher can reply with must be able to carry an
/// error string. An empty string means success.
pub trait ReplyPayload {
    fn set_error(&mut self, error: String);
    fn error(&self) -> &str;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationCreationRequest {
    pub name: String,
    #[serde(default)]
    pub schema_name: String,
    pub retention_type: String,
    pub retention_value: i64,
    pub storage_type: String,
    pub replicas: i32,
    #[serde(default)]
    pub dedup_enabled: bool,
    #[serde(default)]
    pub dedup_window_in_ms: i64,
    #[serde(default)]
    pub idempotency_window_in_ms: i64,
    #[serde(default)]
    pub dls_configuration: DlsConfiguration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationDestructionRequest {
    pub station_name: String,
}

/// The producer-creation request has two wire shapes distinguished only by
/// the presence of `req_version`. Decoding tries v1 first, falling back to
/// v0 on absence of that field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProducerCreationRequest {
    pub name: String,
    pub station_name: String,
    pub connection_id: String,
    pub producer_type: String,
    #[serde(default)]
    pub req_version: Option<i32>,
}

impl ProducerCreationRequest {
    /// Version the request was submitted under: absence of `req_version`
    /// means version 0.
    pub fn version(&self) -> i32 {
        self.req_version.unwrap_or(0)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProducerCreationResponse {
    #[serde(default)]
    pub schema_update: String,
    #[serde(default)]
    pub schemaverse_to_dls: bool,
    #[serde(default)]
    pub send_notification: bool,
    #[serde(default)]
    pub error: String,
}

impl ReplyPayload for ProducerCreationResponse {
    fn set_error(&mut self, error: String) {
        self.error = error;
    }

    fn error(&self) -> &str {
        &self.error
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProducerDestructionRequest {
    pub station_name: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsumerCreationRequest {
    pub name: String,
    pub station_name: String,
    pub connection_id: String,
    pub consumer_type: String,
    pub consumers_group: String,
    pub max_ack_time_ms: i64,
    pub max_msg_deliveries: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsumerDestructionRequest {
    pub station_name: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaAttachmentRequest {
    pub name: String,
    pub station_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaDetachmentRequest {
    pub station_name: String,
}

/// Outbound, one-way configuration broadcast published to
/// `$memphis_sdk_configurations_updates`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigUpdate {
    #[serde(rename = "type")]
    pub update_type: String,
    pub update: serde_json::Value,
}
