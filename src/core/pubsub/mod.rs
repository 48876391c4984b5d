// src/core/pubsub/mod.rs

//! The pub/sub transport adapter (component C2): a trait boundary over the
//! broker's internal messaging fabric, plus `LocalTransport`, an in-process
//! reference implementation built the same way this crate's other shared
//! collections are built: a concurrent map keyed by subject.
//!
//! A production deployment plugs a real inter-broker transport in behind the
//! `Transport` trait; `LocalTransport` is what this crate's own dispatcher,
//! census, and test suite run against.

use crate::core::BrokerError;
use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::Mutex as AsyncMutex;
use tokio::sync::oneshot;
use tracing::trace;

/// Per-message context handed to a subscription handler. `is_stream_api` marks
/// requests that originated from the stream-API bridge and must be replied to
/// through that bridge's error envelope rather than a plain reply publish.
#[derive(Debug, Clone, Default)]
pub struct ClientCtx {
    pub is_stream_api: bool,
}

/// A subscription handler: `(client_ctx, subject, reply_subject, payload)`.
/// Handlers are invoked synchronously by the transport and must spawn their
/// own task for any real work, per the transport's "return quickly" contract.
pub type Handler = Arc<dyn Fn(ClientCtx, String, String, Bytes) + Send + Sync>;

/// An opaque handle returned by [`Transport::subscribe`], passed back to
/// [`Transport::unsubscribe`].
#[derive(Debug, Clone)]
pub struct Subscription {
    pub(crate) id: u64,
    pub(crate) subject: String,
}

/// The pub/sub transport contract (component C2).
#[async_trait]
pub trait Transport: Send + Sync {
    /// Registers `handler` on `subject` under `group`. The transport guarantees
    /// that, cluster-wide, at most one handler in `group` receives each message
    /// published on `subject`.
    fn queue_subscribe(&self, subject: &str, group: &str, handler: Handler);

    /// Registers `handler` on `subject` without queue-group semantics; every
    /// subscriber receives every message. Returns a handle for unsubscribing.
    fn subscribe(&self, subject: &str, handler: Handler) -> Subscription;

    fn unsubscribe(&self, subscription: Subscription);

    /// Fire-and-forget publish on the system account.
    async fn publish_on_global(&self, subject: &str, payload: Bytes) -> Result<(), BrokerError>;

    /// As [`Transport::publish_on_global`], embedding a reply subject.
    async fn publish_with_reply(
        &self,
        subject: &str,
        reply_subject: &str,
        payload: Bytes,
    ) -> Result<(), BrokerError>;

    /// Convenience send on the system account, directed at a specific reply subject.
    async fn reply(&self, reply_subject: &str, payload: Bytes) -> Result<(), BrokerError>;

    /// Whether this node currently holds cluster leadership. Always `true` for
    /// a standalone deployment.
    fn is_leader(&self) -> bool;

    /// Whether this broker is part of a cluster at all.
    fn is_clustered(&self) -> bool;
}

type QueueKey = (String, String);

#[derive(Default)]
struct QueueGroup {
    handlers: Vec<Handler>,
    next: AtomicU64,
}

/// An in-process reference implementation of [`Transport`].
pub struct LocalTransport {
    queue_groups: DashMap<QueueKey, QueueGroup>,
    direct_subs: DashMap<String, Vec<(u64, Handler)>>,
    next_sid: AtomicU64,
    leader: AtomicBool,
    clustered: AtomicBool,
}

impl Default for LocalTransport {
    fn default() -> Self {
        Self {
            queue_groups: DashMap::new(),
            direct_subs: DashMap::new(),
            next_sid: AtomicU64::new(1),
            leader: AtomicBool::new(true),
            clustered: AtomicBool::new(false),
        }
    }
}

impl LocalTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Test/demo helper: configures whether `is_clustered()` reports true.
    pub fn set_clustered(&self, clustered: bool) {
        self.clustered.store(clustered, Ordering::SeqCst);
    }

    /// Test/demo helper: configures whether `is_leader()` reports true.
    pub fn set_leader(&self, leader: bool) {
        self.leader.store(leader, Ordering::SeqCst);
    }

    /// Test/demo helper implementing a synchronous request/reply round trip
    /// on top of the core contract: subscribes a fresh reply subject, publishes
    /// the request with that reply subject attached, and waits for the first
    /// reply. Not part of the `Transport` contract itself, a convenience this
    /// crate's tests and example clients use the same way the original
    /// `aggregateClientConnections` pattern builds its own reply subject.
    pub async fn request(
        &self,
        subject: &str,
        payload: Bytes,
        timeout: std::time::Duration,
    ) -> Result<Bytes, BrokerError> {
        let reply_subject = format!("{subject}_reply_{}", uuid::Uuid::new_v4());
        let (tx, rx) = oneshot::channel();
        let tx = Arc::new(AsyncMutex::new(Some(tx)));
        let sub = self.subscribe(
            &reply_subject,
            Arc::new(move |_ctx, _subject, _reply, payload| {
                let tx = tx.clone();
                tokio::spawn(async move {
                    if let Some(tx) = tx.lock().await.take() {
                        let _ = tx.send(payload);
                    }
                });
            }),
        );

        self.publish_with_reply(subject, &reply_subject, payload)
            .await?;

        let result = tokio::time::timeout(timeout, rx).await;
        self.unsubscribe(sub);

        match result {
            Ok(Ok(payload)) => Ok(payload),
            _ => Err(BrokerError::Transport(format!(
                "request on '{subject}' timed out after {timeout:?}"
            ))),
        }
    }

    fn deliver_direct(&self, subject: &str, ctx: &ClientCtx, reply: &str, payload: &Bytes) {
        if let Some(subs) = self.direct_subs.get(subject) {
            for (_, handler) in subs.iter() {
                handler(ctx.clone(), subject.to_string(), reply.to_string(), payload.clone());
            }
        }
    }

    fn deliver_queue_groups(&self, subject: &str, ctx: &ClientCtx, reply: &str, payload: &Bytes) {
        for mut entry in self
            .queue_groups
            .iter_mut()
            .filter(|e| e.key().0 == subject)
        {
            let group = entry.value_mut();
            if group.handlers.is_empty() {
                continue;
            }
            let idx = group.next.fetch_add(1, Ordering::Relaxed) as usize % group.handlers.len();
            trace!(subject, group = %entry.key().1, idx, "delivering to queue group member");
            group.handlers[idx](ctx.clone(), subject.to_string(), reply.to_string(), payload.clone());
        }
    }
}

#[async_trait]
impl Transport for LocalTransport {
    fn queue_subscribe(&self, subject: &str, group: &str, handler: Handler) {
        self.queue_groups
            .entry((subject.to_string(), group.to_string()))
            .or_default()
            .handlers
            .push(handler);
    }

    fn subscribe(&self, subject: &str, handler: Handler) -> Subscription {
        let id = self.next_sid.fetch_add(1, Ordering::SeqCst);
        self.direct_subs
            .entry(subject.to_string())
            .or_default()
            .push((id, handler));
        Subscription {
            id,
            subject: subject.to_string(),
        }
    }

    fn unsubscribe(&self, subscription: Subscription) {
        if let Some(mut subs) = self.direct_subs.get_mut(&subscription.subject) {
            subs.retain(|(id, _)| *id != subscription.id);
        }
    }

    async fn publish_on_global(&self, subject: &str, payload: Bytes) -> Result<(), BrokerError> {
        let ctx = ClientCtx::default();
        self.deliver_queue_groups(subject, &ctx, "", &payload);
        self.deliver_direct(subject, &ctx, "", &payload);
        Ok(())
    }

    async fn publish_with_reply(
        &self,
        subject: &str,
        reply_subject: &str,
        payload: Bytes,
    ) -> Result<(), BrokerError> {
        let ctx = ClientCtx::default();
        self.deliver_queue_groups(subject, &ctx, reply_subject, &payload);
        self.deliver_direct(subject, &ctx, reply_subject, &payload);
        Ok(())
    }

    async fn reply(&self, reply_subject: &str, payload: Bytes) -> Result<(), BrokerError> {
        let ctx = ClientCtx::default();
        self.deliver_direct(reply_subject, &ctx, "", &payload);
        Ok(())
    }

    fn is_leader(&self) -> bool {
        self.leader.load(Ordering::SeqCst)
    }

    fn is_clustered(&self) -> bool {
        self.clustered.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[tokio::test]
    async fn queue_group_delivers_exactly_once_across_n_subscribers() {
        let transport = LocalTransport::new();
        let hits = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let hits = hits.clone();
            transport.queue_subscribe(
                "subj",
                "group",
                Arc::new(move |_ctx, _subject, _reply, _payload| {
                    hits.fetch_add(1, Ordering::SeqCst);
                }),
            );
        }

        transport
            .publish_on_global("subj", Bytes::from_static(b"hello"))
            .await
            .unwrap();

        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn request_reply_round_trip() {
        let transport = Arc::new(LocalTransport::new());
        let t = transport.clone();
        transport.queue_subscribe(
            "echo",
            "echo_group",
            Arc::new(move |_ctx, _subject, reply, payload| {
                let t = t.clone();
                tokio::spawn(async move {
                    t.reply(&reply, payload).await.unwrap();
                });
            }),
        );

        let resp = transport
            .request("echo", Bytes::from_static(b"ping"), Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(resp, Bytes::from_static(b"ping"));
    }

    #[tokio::test]
    async fn standalone_transport_is_leader_by_default() {
        let transport = LocalTransport::new();
        assert!(transport.is_leader());
        assert!(!transport.is_clustered());
    }
}
