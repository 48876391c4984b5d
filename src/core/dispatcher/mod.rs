// src/core/dispatcher/mod.rs

//! The SDK dispatcher (component C5): installs the eight control-subject
//! subscriptions and owns the reply protocol (bare-error, structured, and
//! the stream-API bridge envelope).

pub mod operations;

use crate::core::BrokerError;
use crate::core::codec::{
    ConfigUpdate, ConsumerCreationRequest, ConsumerDestructionRequest, ProducerCreationRequest,
    ProducerCreationResponse, ProducerDestructionRequest, ReplyPayload, SchemaAttachmentRequest,
    SchemaDetachmentRequest, StationCreationRequest, StationDestructionRequest,
};
use crate::core::pubsub::ClientCtx;
use crate::core::state::BrokerState;
use bytes::Bytes;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::{debug, error, warn};

const STATION_CREATIONS_SUBJECT: &str = "$memphis_station_creations";
const STATION_CREATIONS_GROUP: &str = "memphis_station_creations_listeners_group";
const STATION_DESTRUCTIONS_SUBJECT: &str = "$memphis_station_destructions";
const STATION_DESTRUCTIONS_GROUP: &str = "memphis_station_destructions_listeners_group";
const PRODUCER_CREATIONS_SUBJECT: &str = "$memphis_producer_creations";
const PRODUCER_CREATIONS_GROUP: &str = "memphis_producer_creations_listeners_group";
const PRODUCER_DESTRUCTIONS_SUBJECT: &str = "$memphis_producer_destructions";
const PRODUCER_DESTRUCTIONS_GROUP: &str = "memphis_producer_destructions_listeners_group";
const CONSUMER_CREATIONS_SUBJECT: &str = "$memphis_consumer_creations";
const CONSUMER_CREATIONS_GROUP: &str = "memphis_consumer_creations_listeners_group";
const CONSUMER_DESTRUCTIONS_SUBJECT: &str = "$memphis_consumer_destructions";
const CONSUMER_DESTRUCTIONS_GROUP: &str = "memphis_consumer_destructions_listeners_group";
const SCHEMA_ATTACHMENTS_SUBJECT: &str = "$memphis_schema_attachments";
const SCHEMA_ATTACHMENTS_GROUP: &str = "memphis_schema_attachments_listeners_group";
const SCHEMA_DETACHMENTS_SUBJECT: &str = "$memphis_schema_detachments";
const SCHEMA_DETACHMENTS_GROUP: &str = "memphis_schema_detachments_listeners_group";
const CONFIG_UPDATES_SUBJECT: &str = "$memphis_sdk_configurations_updates";

/// The reply envelope used for requests that originated from the stream-API
/// bridge (detected via [`ClientCtx::is_stream_api`]), in place of a bare
/// error string.
#[derive(Debug, Serialize)]
struct StreamApiEnvelope {
    error: String,
}

fn decode<T: DeserializeOwned>(payload: &Bytes) -> Result<T, BrokerError> {
    serde_json::from_slice(payload).map_err(|e| {
        warn!(error = %e, "failed to decode request payload; dropping");
        BrokerError::Codec(e.to_string())
    })
}

async fn send_bare_reply(
    state: &Arc<BrokerState>,
    ctx: &ClientCtx,
    reply_subject: &str,
    result: Result<(), BrokerError>,
) {
    if reply_subject.is_empty() {
        return;
    }
    let payload = if ctx.is_stream_api {
        let error = result.err().map(|e| e.to_string()).unwrap_or_default();
        serde_json::to_vec(&StreamApiEnvelope { error })
            .map(Bytes::from)
            .unwrap_or_default()
    } else {
        match result {
            Ok(()) => Bytes::new(),
            Err(e) => Bytes::from(e.to_string()),
        }
    };
    if let Err(e) = state.transport.reply(reply_subject, payload).await {
        error!(error = %e, "failed to send bare-error reply");
    }
}

async fn send_structured_reply<Resp: Serialize + ReplyPayload>(
    state: &Arc<BrokerState>,
    reply_subject: &str,
    mut response: Resp,
    error: Option<BrokerError>,
) {
    if reply_subject.is_empty() {
        return;
    }
    if let Some(e) = error {
        response.set_error(e.to_string());
    }
    match serde_json::to_vec(&response) {
        Ok(bytes) => {
            if let Err(e) = state.transport.reply(reply_subject, Bytes::from(bytes)).await {
                error!(error = %e, "failed to send structured reply");
            }
        }
        Err(e) => {
            warn!(error = %e, "failed to encode structured response; sending no reply");
        }
    }
}

/// Installs the eight (subject, queue-group) subscriptions described in the
/// SDK dispatcher's component design.
pub fn install(state: &Arc<BrokerState>) {
    install_station_creations(state);
    install_station_destructions(state);
    install_producer_creations(state);
    install_producer_destructions(state);
    install_consumer_creations(state);
    install_consumer_destructions(state);
    install_schema_attachments(state);
    install_schema_detachments(state);
    debug!("installed all eight SDK control-subject subscriptions");
}

fn install_station_creations(state: &Arc<BrokerState>) {
    let transport = state.transport.clone();
    let state = state.clone();
    transport.queue_subscribe(
        STATION_CREATIONS_SUBJECT,
        STATION_CREATIONS_GROUP,
        Arc::new(move |ctx, _subject, reply, payload| {
            let state = state.clone();
            state.metrics.record_dispatch(STATION_CREATIONS_SUBJECT);
            tokio::spawn(async move {
                let req: StationCreationRequest = match decode(&payload) {
                    Ok(r) => r,
                    Err(_) => return,
                };
                let result = operations::create_station(state.clone(), req).await;
                send_bare_reply(&state, &ctx, &reply, result).await;
            });
        }),
    );
}

fn install_station_destructions(state: &Arc<BrokerState>) {
    let transport = state.transport.clone();
    let state = state.clone();
    transport.queue_subscribe(
        STATION_DESTRUCTIONS_SUBJECT,
        STATION_DESTRUCTIONS_GROUP,
        Arc::new(move |ctx, _subject, reply, payload| {
            let state = state.clone();
            state.metrics.record_dispatch(STATION_DESTRUCTIONS_SUBJECT);
            tokio::spawn(async move {
                let req: StationDestructionRequest = match decode(&payload) {
                    Ok(r) => r,
                    Err(_) => return,
                };
                let result = operations::destroy_station(state.clone(), req).await;
                send_bare_reply(&state, &ctx, &reply, result).await;
            });
        }),
    );
}

fn install_producer_creations(state: &Arc<BrokerState>) {
    let transport = state.transport.clone();
    let state = state.clone();
    transport.queue_subscribe(
        PRODUCER_CREATIONS_SUBJECT,
        PRODUCER_CREATIONS_GROUP,
        Arc::new(move |ctx, _subject, reply, payload| {
            let state = state.clone();
            state.metrics.record_dispatch(PRODUCER_CREATIONS_SUBJECT);
            tokio::spawn(async move {
                let req: ProducerCreationRequest = match decode(&payload) {
                    Ok(r) => r,
                    Err(_) => return,
                };
                if ctx.is_stream_api {
                    let result = operations::create_producer(state.clone(), req).await;
                    let err = result.as_ref().err().cloned();
                    send_bare_reply(&state, &ctx, &reply, err.map(Err).unwrap_or(Ok(()))).await;
                    return;
                }
                match operations::create_producer(state.clone(), req).await {
                    Ok(response) => send_structured_reply(&state, &reply, response, None).await,
                    Err(e) => {
                        send_structured_reply(
                            &state,
                            &reply,
                            ProducerCreationResponse::default(),
                            Some(e),
                        )
                        .await
                    }
                }
            });
        }),
    );
}

fn install_producer_destructions(state: &Arc<BrokerState>) {
    let transport = state.transport.clone();
    let state = state.clone();
    transport.queue_subscribe(
        PRODUCER_DESTRUCTIONS_SUBJECT,
        PRODUCER_DESTRUCTIONS_GROUP,
        Arc::new(move |ctx, _subject, reply, payload| {
            let state = state.clone();
            state.metrics.record_dispatch(PRODUCER_DESTRUCTIONS_SUBJECT);
            tokio::spawn(async move {
                let req: ProducerDestructionRequest = match decode(&payload) {
                    Ok(r) => r,
                    Err(_) => return,
                };
                let result = operations::destroy_producer(state.clone(), req).await;
                send_bare_reply(&state, &ctx, &reply, result).await;
            });
        }),
    );
}

fn install_consumer_creations(state: &Arc<BrokerState>) {
    let transport = state.transport.clone();
    let state = state.clone();
    transport.queue_subscribe(
        CONSUMER_CREATIONS_SUBJECT,
        CONSUMER_CREATIONS_GROUP,
        Arc::new(move |ctx, _subject, reply, payload| {
            let state = state.clone();
            state.metrics.record_dispatch(CONSUMER_CREATIONS_SUBJECT);
            tokio::spawn(async move {
                let req: ConsumerCreationRequest = match decode(&payload) {
                    Ok(r) => r,
                    Err(_) => return,
                };
                let result = operations::create_consumer(state.clone(), req).await;
                send_bare_reply(&state, &ctx, &reply, result).await;
            });
        }),
    );
}

fn install_consumer_destructions(state: &Arc<BrokerState>) {
    let transport = state.transport.clone();
    let state = state.clone();
    transport.queue_subscribe(
        CONSUMER_DESTRUCTIONS_SUBJECT,
        CONSUMER_DESTRUCTIONS_GROUP,
        Arc::new(move |ctx, _subject, reply, payload| {
            let state = state.clone();
            state.metrics.record_dispatch(CONSUMER_DESTRUCTIONS_SUBJECT);
            tokio::spawn(async move {
                let req: ConsumerDestructionRequest = match decode(&payload) {
                    Ok(r) => r,
                    Err(_) => return,
                };
                let result = operations::destroy_consumer(state.clone(), req).await;
                send_bare_reply(&state, &ctx, &reply, result).await;
            });
        }),
    );
}

fn install_schema_attachments(state: &Arc<BrokerState>) {
    let transport = state.transport.clone();
    let state = state.clone();
    transport.queue_subscribe(
        SCHEMA_ATTACHMENTS_SUBJECT,
        SCHEMA_ATTACHMENTS_GROUP,
        Arc::new(move |ctx, _subject, reply, payload| {
            let state = state.clone();
            state.metrics.record_dispatch(SCHEMA_ATTACHMENTS_SUBJECT);
            tokio::spawn(async move {
                let req: SchemaAttachmentRequest = match decode(&payload) {
                    Ok(r) => r,
                    Err(_) => return,
                };
                let result = operations::attach_schema(state.clone(), req).await;
                send_bare_reply(&state, &ctx, &reply, result).await;
            });
        }),
    );
}

fn install_schema_detachments(state: &Arc<BrokerState>) {
    let transport = state.transport.clone();
    let state = state.clone();
    transport.queue_subscribe(
        SCHEMA_DETACHMENTS_SUBJECT,
        SCHEMA_DETACHMENTS_GROUP,
        Arc::new(move |ctx, _subject, reply, payload| {
            let state = state.clone();
            state.metrics.record_dispatch(SCHEMA_DETACHMENTS_SUBJECT);
            tokio::spawn(async move {
                let req: SchemaDetachmentRequest = match decode(&payload) {
                    Ok(r) => r,
                    Err(_) => return,
                };
                let result = operations::detach_schema(state.clone(), req).await;
                send_bare_reply(&state, &ctx, &reply, result).await;
            });
        }),
    );
}

/// Publishes a one-way configuration update on the global account. No reply
/// is expected or awaited.
pub async fn broadcast_config_update(
    state: &Arc<BrokerState>,
    update: ConfigUpdate,
) -> Result<(), BrokerError> {
    let payload = serde_json::to_vec(&update)?;
    state
        .transport
        .publish_on_global(CONFIG_UPDATES_SUBJECT, Bytes::from(payload))
        .await
}
