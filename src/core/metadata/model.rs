// src/core/metadata/model.rs

//! Typed records persisted by the metadata store.

use serde::{Deserialize, Serialize};

/// Dead-letter-station configuration attached to a [`Station`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DlsConfiguration {
    #[serde(default)]
    pub poison: bool,
    #[serde(default)]
    pub schemaverse: bool,
}

/// A named, replicated stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Station {
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
    #[serde(default)]
    pub is_deleted: bool,
}

/// A client-side handle attached to a station via a [`Connection`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Producer {
    pub name: String,
    pub station_name: String,
    pub connection_id: String,
    pub producer_type: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
    /// Present only for producers created through the versioned (`req_version`) request shape.
    #[serde(default)]
    pub req_version: Option<i32>,
}

/// A client-side handle attached to a station via a [`Connection`], belonging to a group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Consumer {
    pub name: String,
    pub station_name: String,
    pub connection_id: String,
    pub consumer_type: String,
    pub consumers_group: String,
    pub max_ack_time_ms: i64,
    pub max_msg_deliveries: i32,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

/// A persisted record of a client's session, owned by the data plane.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    pub id: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

/// A single keyed string slot, used for process-wide configuration
/// (`deployment_id`, `analytics`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemKey {
    pub key: String,
    pub value: String,
}

pub(crate) fn default_true() -> bool {
    true
}

/// Well-known system key names.
pub mod system_key {
    pub const DEPLOYMENT_ID: &str = "deployment_id";
    pub const ANALYTICS: &str = "analytics";
}
