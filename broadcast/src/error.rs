// Copyright (c) 2024 Botho Foundation

//! Error types for broadcast verification and relay.

use displaydoc::Display;
use thiserror::Error;

/// Errors that can occur while handling signed broadcasts.
///
/// A broadcast that is well formed but fails verification is not an error:
/// verification returns `Ok(false)`. Errors are reserved for input that cannot
/// be interpreted as an envelope and for failures of the external
/// collaborators (membership directory, signature capability, store, peers).
#[derive(Debug, Display, Error)]
pub enum BroadcastError {
    /// Malformed broadcast envelope: {0}
    MalformedEnvelope(String),

    /// Membership lookup failed: {0}
    Membership(String),

    /// Signature check failed to run: {0}
    Signature(String),

    /// Message store error: {0}
    Store(String),

    /// Failed to send to peer {0}: {1}
    Send(String, String),

    /// Failed to serialize message: {0}
    Serialization(String),
}

impl From<serde_json::Error> for BroadcastError {
    fn from(err: serde_json::Error) -> Self {
        BroadcastError::Serialization(err.to_string())
    }
}

/// Result type for broadcast operations.
pub type BroadcastResult<T> = Result<T, BroadcastError>;
