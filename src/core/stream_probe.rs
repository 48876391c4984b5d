// src/core/stream_probe.rs

//! The stream probe adapter (component C3): a trait boundary over the data
//! plane's stream storage, queried by the zombie reaper to decide whether a
//! station's backing stream still exists before declaring it stale.

use crate::core::BrokerError;
use async_trait::async_trait;
use dashmap::DashMap;

/// Minimal facts the reaper needs about a backing stream.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamInfo {
    pub name: String,
    pub message_count: u64,
}

/// The stream probe contract (component C3).
#[async_trait]
pub trait StreamProbe: Send + Sync {
    /// Looks up the backing stream for `internal_name`. Returns
    /// [`BrokerError::StreamNotFound`] (not a generic error) when the stream
    /// is absent, so callers can distinguish "gone" from "probe failed".
    async fn stream_info(&self, internal_name: &str) -> Result<StreamInfo, BrokerError>;
}

/// Maps a station's logical name to the internal stream name the data plane
/// stores it under: lowercased, with `.` replaced by `_`.
pub fn internal_stream_name(station_name: &str) -> String {
    station_name.to_lowercase().replace('.', "_")
}

/// An in-memory reference implementation of [`StreamProbe`], backed by a map
/// an embedder (or this crate's tests) populates directly.
#[derive(Debug, Default)]
pub struct InMemoryStreamProbe {
    streams: DashMap<String, StreamInfo>,
}

impl InMemoryStreamProbe {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a stream as present, keyed by its internal name.
    pub fn put(&self, internal_name: impl Into<String>, message_count: u64) {
        let name = internal_name.into();
        self.streams.insert(
            name.clone(),
            StreamInfo {
                name,
                message_count,
            },
        );
    }

    /// Removes a stream, simulating deletion by the data plane.
    pub fn remove(&self, internal_name: &str) {
        self.streams.remove(internal_name);
    }
}

#[async_trait]
impl StreamProbe for InMemoryStreamProbe {
    async fn stream_info(&self, internal_name: &str) -> Result<StreamInfo, BrokerError> {
        self.streams
            .get(internal_name)
            .map(|e| e.value().clone())
            .ok_or_else(|| BrokerError::StreamNotFound(internal_name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn internal_name_lowercases_and_replaces_dots() {
        assert_eq!(internal_stream_name("Orders.Created"), "orders_created");
        assert_eq!(internal_stream_name("plain"), "plain");
    }

    #[tokio::test]
    async fn missing_stream_is_distinguished_from_other_errors() {
        let probe = InMemoryStreamProbe::new();
        let err = probe.stream_info("orders_created").await.unwrap_err();
        assert_eq!(err, BrokerError::StreamNotFound("orders_created".into()));
    }

    #[tokio::test]
    async fn registered_stream_is_found() {
        let probe = InMemoryStreamProbe::new();
        probe.put("orders_created", 42);
        let info = probe.stream_info("orders_created").await.unwrap();
        assert_eq!(info.message_count, 42);
    }
}
