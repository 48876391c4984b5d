// src/core/analytics.rs

//! Legacy telemetry sink invoked once per reaper tick (see §4.7 step 5).
//! Kept for behavioral parity with the original system, gated behind the
//! `analytics` system key the same way the source code gates it.

use async_trait::async_trait;

/// A single telemetry event: active-producer and active-consumer counts as
/// observed by the most recent reaper pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveCountsEvent {
    pub active_producers: u64,
    pub active_consumers: u64,
}

#[async_trait]
pub trait AnalyticsSink: Send + Sync {
    async fn report_active_counts(&self, deployment_id: &str, event: ActiveCountsEvent);
}

/// Emits events via `tracing` rather than a real analytics backend. Used
/// whenever no analytics token is configured, or analytics is disabled.
#[derive(Debug, Default)]
pub struct LoggingAnalyticsSink;

#[async_trait]
impl AnalyticsSink for LoggingAnalyticsSink {
    async fn report_active_counts(&self, deployment_id: &str, event: ActiveCountsEvent) {
        tracing::debug!(
            deployment_id,
            active_producers = event.active_producers,
            active_consumers = event.active_consumers,
            "active resource counts"
        );
    }
}

/// Drops every event. Used when analytics is disabled entirely, so the
/// reaper's telemetry step is a no-op rather than a conditional at every
/// call site.
#[derive(Debug, Default)]
pub struct NoopAnalyticsSink;

#[async_trait]
impl AnalyticsSink for NoopAnalyticsSink {
    async fn report_active_counts(&self, _deployment_id: &str, _event: ActiveCountsEvent) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn logging_sink_accepts_events_without_panicking() {
        let sink = LoggingAnalyticsSink;
        sink.report_active_counts(
            "dep-1",
            ActiveCountsEvent {
                active_producers: 3,
                active_consumers: 1,
            },
        )
        .await;
    }
}
