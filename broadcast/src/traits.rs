// Copyright (c) 2024 Botho Foundation

//! Capabilities the broadcast core consumes from the rest of the node.
//!
//! Membership, signature checking, message storage, connection pools and the
//! peer transport all live outside this crate. They are passed in as trait
//! objects so that the node and the tests can supply their own.

use crate::{error::BroadcastResult, membership::NodeListEntry};
use async_trait::async_trait;
use serde_json::Value;
use std::{fmt::Debug, sync::Arc};

/// Source of the deterministic node list.
#[async_trait]
pub trait MembershipDirectory: Send + Sync {
    /// Look up the node list entries for a public key.
    ///
    /// May perform I/O. Errors are returned to the caller of the verifier
    /// unchanged.
    async fn lookup(&self, pubkey: &str) -> BroadcastResult<Vec<NodeListEntry>>;
}

/// Opaque signature checking capability.
#[async_trait]
pub trait SignatureVerifier: Send + Sync {
    /// Return `true` only if `signature` is a valid signature of `message` by
    /// `pubkey`.
    async fn verify(&self, message: &str, pubkey: &str, signature: &str) -> BroadcastResult<bool>;
}

/// Persistent, deduplicating store for application messages.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Store a running state message. Returns `true` if it is new and should
    /// be propagated.
    async fn store_running_state(&self, payload: &Value) -> BroadcastResult<bool>;

    /// Store a temporary application message. Returns `true` if it is new and
    /// should be propagated.
    async fn store_temporary(&self, payload: &Value, rebroadcast: bool) -> BroadcastResult<bool>;
}

/// A live connection to a peer.
#[async_trait]
pub trait PeerConnection: Send + Sync + Debug {
    /// Remote address as reported by the socket.
    fn remote_address(&self) -> &str;

    /// Send a serialized message over this connection.
    async fn send(&self, message: &str) -> BroadcastResult<()>;
}

/// A shared handle to a peer connection.
pub type SharedConnection = Arc<dyn PeerConnection>;

/// Access to the node's connection pools.
pub trait ConnectionRegistry: Send + Sync {
    /// Snapshot of connections this node opened, in pool order.
    fn outgoing(&self) -> Vec<SharedConnection>;

    /// Snapshot of connections peers opened to this node, in pool order.
    fn incoming(&self) -> Vec<SharedConnection>;
}

/// Sends one message to a batch of peers.
#[async_trait]
pub trait PeerSender: Send + Sync {
    /// Send `message` to every connection in `peers`.
    ///
    /// A failure on one peer must not prevent delivery to the rest.
    async fn send_all(&self, message: &str, peers: &[SharedConnection]) -> BroadcastResult<()>;
}
