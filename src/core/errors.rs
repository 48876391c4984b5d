// src/core/errors.rs

//! Defines the primary error type for the entire application.

use std::sync::Arc;
use thiserror::Error;

/// The main error enum, representing all possible failures within the broker's
/// control plane. Using `thiserror` allows for clean error definitions and
/// automatic `From` trait implementations.
#[derive(Error, Debug)]
pub enum BrokerError {
    #[error("IO error: {0}")]
    Io(Arc<std::io::Error>),

    /// Distinguished metadata-store signal: the requested document does not exist.
    #[error("not found")]
    NotFound,

    /// Distinguished stream-backend signal: the stream engine has no stream by this name.
    #[error("stream not found: {0}")]
    StreamNotFound(String),

    /// A failure of the pub/sub transport itself (publish/subscribe plumbing).
    #[error("transport error: {0}")]
    Transport(String),

    /// A non-`NotFound` failure from the metadata store.
    #[error("store error: {0}")]
    Store(String),

    /// A request or reply payload could not be decoded or encoded.
    #[error("codec error: {0}")]
    Codec(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Clone for BrokerError {
    fn clone(&self) -> Self {
        match self {
            BrokerError::Io(e) => BrokerError::Io(Arc::clone(e)),
            BrokerError::NotFound => BrokerError::NotFound,
            BrokerError::StreamNotFound(s) => BrokerError::StreamNotFound(s.clone()),
            BrokerError::Transport(s) => BrokerError::Transport(s.clone()),
            BrokerError::Store(s) => BrokerError::Store(s.clone()),
            BrokerError::Codec(s) => BrokerError::Codec(s.clone()),
            BrokerError::Internal(s) => BrokerError::Internal(s.clone()),
        }
    }
}

impl PartialEq for BrokerError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (BrokerError::Io(a), BrokerError::Io(b)) => a.to_string() == b.to_string(),
            (BrokerError::NotFound, BrokerError::NotFound) => true,
            (BrokerError::StreamNotFound(a), BrokerError::StreamNotFound(b)) => a == b,
            (BrokerError::Transport(a), BrokerError::Transport(b)) => a == b,
            (BrokerError::Store(a), BrokerError::Store(b)) => a == b,
            (BrokerError::Codec(a), BrokerError::Codec(b)) => a == b,
            (BrokerError::Internal(a), BrokerError::Internal(b)) => a == b,
            _ => false,
        }
    }
}

impl From<std::io::Error> for BrokerError {
    fn from(e: std::io::Error) -> Self {
        BrokerError::Io(Arc::new(e))
    }
}

impl From<serde_json::Error> for BrokerError {
    fn from(e: serde_json::Error) -> Self {
        BrokerError::Codec(e.to_string())
    }
}
