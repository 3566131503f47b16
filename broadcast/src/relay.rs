// Copyright (c) 2024 Botho Foundation

//! Store-and-forward relay for accepted application messages.
//!
//! A relay first hands the payload to the message store. If the store reports
//! the message as new, the full envelope is flooded in two phases:
//!
//! 1. immediately to the outgoing pool (peers this node chose to connect to),
//! 2. after a fixed stagger, to the incoming pool (peers that connected here).
//!
//! The peer the message arrived from is skipped in both phases. Relaying is
//! best effort: every failure is logged and ends the relay without surfacing
//! to the caller.

use crate::{
    config::BroadcastConfig,
    connections::normalize_address,
    envelope::BroadcastEnvelope,
    error::BroadcastResult,
    traits::{ConnectionRegistry, MessageStore, PeerSender, SharedConnection},
};
use serde::{Deserialize, Serialize};
use std::{sync::Arc, time::Duration};
use tokio::{
    task::JoinHandle,
    time::{sleep_until, Instant},
};
use tracing::{error, trace};

/// The two kinds of relayed application messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelayKind {
    /// Node liveness and app running state
    RunningState,
    /// Short-lived application messages
    Temporary,
}

/// What a relay invocation ended up doing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayOutcome {
    /// The store already knew the message; nothing was sent.
    Suppressed,
    /// The message was flooded to this many outgoing and incoming peers.
    Propagated {
        /// Peers targeted in the outgoing phase
        outgoing: usize,
        /// Peers targeted in the incoming phase
        incoming: usize,
    },
    /// The relay stopped on an error.
    Failed(String),
}

/// Floods accepted messages to the node's peers in two staggered phases.
pub struct MessageRelay {
    kind: RelayKind,
    stagger: Duration,
    store: Arc<dyn MessageStore>,
    registry: Arc<dyn ConnectionRegistry>,
    sender: Arc<dyn PeerSender>,
}

impl MessageRelay {
    /// Create a relay of the given kind.
    pub fn new(
        kind: RelayKind,
        config: &BroadcastConfig,
        store: Arc<dyn MessageStore>,
        registry: Arc<dyn ConnectionRegistry>,
        sender: Arc<dyn PeerSender>,
    ) -> Self {
        Self {
            kind,
            stagger: config.stagger(kind),
            store,
            registry,
            sender,
        }
    }

    /// Create a relay for running state messages.
    pub fn running_state(
        config: &BroadcastConfig,
        store: Arc<dyn MessageStore>,
        registry: Arc<dyn ConnectionRegistry>,
        sender: Arc<dyn PeerSender>,
    ) -> Self {
        Self::new(RelayKind::RunningState, config, store, registry, sender)
    }

    /// Create a relay for temporary application messages.
    pub fn temporary(
        config: &BroadcastConfig,
        store: Arc<dyn MessageStore>,
        registry: Arc<dyn ConnectionRegistry>,
        sender: Arc<dyn PeerSender>,
    ) -> Self {
        Self::new(RelayKind::Temporary, config, store, registry, sender)
    }

    /// Get the relay kind.
    pub fn kind(&self) -> RelayKind {
        self.kind
    }

    /// Get the delay between the outgoing and incoming phase.
    pub fn stagger(&self) -> Duration {
        self.stagger
    }

    /// Store `message` and, if it is new, flood it to every peer except
    /// `from_ip`.
    ///
    /// Never fails; errors are logged and reported as [`RelayOutcome::Failed`].
    pub async fn relay(&self, message: &BroadcastEnvelope, from_ip: &str) -> RelayOutcome {
        match self.try_relay(message, from_ip).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(
                    kind = ?self.kind,
                    pub_key = %message.pub_key,
                    from_ip = %from_ip,
                    error = %e,
                    "Failed to relay broadcast"
                );
                RelayOutcome::Failed(e.to_string())
            }
        }
    }

    /// Run [`MessageRelay::relay`] as a detached task.
    pub fn spawn(
        self: &Arc<Self>,
        message: BroadcastEnvelope,
        from_ip: String,
    ) -> JoinHandle<RelayOutcome> {
        let relay = Arc::clone(self);
        tokio::spawn(async move { relay.relay(&message, &from_ip).await })
    }

    async fn store(&self, message: &BroadcastEnvelope) -> BroadcastResult<bool> {
        match self.kind {
            RelayKind::RunningState => self.store.store_running_state(&message.data).await,
            RelayKind::Temporary => self.store.store_temporary(&message.data, true).await,
        }
    }

    async fn try_relay(
        &self,
        message: &BroadcastEnvelope,
        from_ip: &str,
    ) -> BroadcastResult<RelayOutcome> {
        if !self.store(message).await? {
            trace!(kind = ?self.kind, pub_key = %message.pub_key, "Message already known, not relaying");
            return Ok(RelayOutcome::Suppressed);
        }

        let wire = message.to_wire()?;

        let outgoing: Vec<SharedConnection> = self
            .registry
            .outgoing()
            .into_iter()
            .filter(|c| c.remote_address() != from_ip)
            .collect();
        trace!(kind = ?self.kind, peers = outgoing.len(), "Relaying to outgoing peers");
        self.sender.send_all(&wire, &outgoing).await?;

        sleep_until(Instant::now() + self.stagger).await;

        let incoming: Vec<SharedConnection> = self
            .registry
            .incoming()
            .into_iter()
            .filter(|c| normalize_address(c.remote_address()) != from_ip)
            .collect();
        trace!(kind = ?self.kind, peers = incoming.len(), "Relaying to incoming peers");
        self.sender.send_all(&wire, &incoming).await?;

        Ok(RelayOutcome::Propagated {
            outgoing: outgoing.len(),
            incoming: incoming.len(),
        })
    }
}
