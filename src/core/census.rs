// src/core/census.rs

//! Connection census (component C6): a scatter/gather protocol that
//! aggregates the set of connection IDs live across every broker in the
//! cluster, bounded by a fixed (configurable) wall-clock deadline.

use crate::core::BrokerError;
use crate::core::pubsub::Transport;
use bytes::Bytes;
use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{trace, warn};

/// Runs one scatter/gather round: publishes a census request on `subject`,
/// collects replies for `timeout`, then returns every connection ID seen.
///
/// Slow or missing peers are simply absent from the returned set rather than
/// failing the call: the census never fails partially (see the reaper's
/// treatment of the result as `persisted_active \ census`).
pub async fn run(
    transport: Arc<dyn Transport>,
    subject: &str,
    timeout: Duration,
) -> Result<HashSet<String>, BrokerError> {
    let reply_subject = format!("{subject}_reply_{}", uuid::Uuid::new_v4());
    let accumulator = Arc::new(Mutex::new(HashSet::new()));

    let acc = accumulator.clone();
    let subscription = transport.subscribe(
        &reply_subject,
        Arc::new(move |_ctx, _subject, _reply, payload| {
            let acc = acc.clone();
            let payload = payload.clone();
            tokio::spawn(async move {
                match serde_json::from_slice::<HashMap<String, serde_json::Value>>(&payload) {
                    Ok(ids) => {
                        let mut acc = acc.lock().await;
                        acc.extend(ids.into_keys());
                    }
                    Err(e) => {
                        warn!(error = %e, "failed to decode census reply; ignoring peer");
                    }
                }
            });
        }),
    );

    transport
        .publish_with_reply(subject, &reply_subject, Bytes::new())
        .await?;

    tokio::time::sleep(timeout).await;

    transport.unsubscribe(subscription);

    let result = accumulator.lock().await.clone();
    trace!(count = result.len(), "census complete");
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::pubsub::LocalTransport;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn census_accumulates_replies_from_multiple_peers() {
        // Each simulated peer direct-subscribes (not via queue group, so
        // both actually answer the scatter).
        let transport: Arc<dyn Transport> = Arc::new(LocalTransport::new());
        for peer_ids in [vec!["c1", "c2"], vec!["c2", "c3"]] {
            let t = transport.clone();
            transport.subscribe(
                "census",
                Arc::new(move |_ctx, _subject, reply, _payload| {
                    let t = t.clone();
                    let body: HashMap<&str, ()> = peer_ids.iter().map(|id| (*id, ())).collect();
                    let payload = Bytes::from(serde_json::to_vec(&body).unwrap());
                    tokio::spawn(async move {
                        let _ = t.reply(&reply, payload).await;
                    });
                }),
            );
        }

        let handle = tokio::spawn(run(transport.clone(), "census", Duration::from_secs(50)));
        tokio::task::yield_now().await;
        tokio::time::advance(Duration::from_secs(50)).await;
        let result = handle.await.unwrap().unwrap();

        let mut ids: Vec<_> = result.into_iter().collect();
        ids.sort();
        assert_eq!(ids, vec!["c1", "c2", "c3"]);
    }

    #[tokio::test(start_paused = true)]
    async fn census_with_no_peers_returns_empty_set_after_deadline() {
        let transport: Arc<dyn Transport> = Arc::new(LocalTransport::new());
        let handle = tokio::spawn(run(transport, "census", Duration::from_secs(50)));
        tokio::task::yield_now().await;
        tokio::time::advance(Duration::from_secs(50)).await;
        let result = handle.await.unwrap().unwrap();
        assert!(result.is_empty());
    }
}
