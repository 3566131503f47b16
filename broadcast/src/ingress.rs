// Copyright (c) 2024 Botho Foundation

//! Inbound broadcast pipeline: parse, verify, relay.
//!
//! Broadcasts that a node receives as the first hop go through
//! [`BroadcastIngress::handle`], which also enforces the five minute
//! freshness window. Broadcasts forwarded by another node go through
//! [`BroadcastIngress::handle_relayed`], which accepts them at any age.

use crate::{
    envelope::BroadcastEnvelope,
    error::BroadcastResult,
    relay::{MessageRelay, RelayKind, RelayOutcome},
    verifier::BroadcastVerifier,
};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

/// Result of handling one inbound broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngressOutcome {
    /// The input was not a broadcast envelope.
    Malformed(String),
    /// The verifier could not run (directory or signature failure).
    VerificationError(String),
    /// The broadcast is not trusted.
    Rejected,
    /// The broadcast was trusted and handed to the relay.
    Relayed(RelayOutcome),
}

/// Wires the verifier to the running state and temporary message relays.
pub struct BroadcastIngress {
    verifier: Arc<BroadcastVerifier>,
    running_state: Arc<MessageRelay>,
    temporary: Arc<MessageRelay>,
}

impl BroadcastIngress {
    /// Create a new ingress pipeline.
    pub fn new(
        verifier: Arc<BroadcastVerifier>,
        running_state: Arc<MessageRelay>,
        temporary: Arc<MessageRelay>,
    ) -> Self {
        Self {
            verifier,
            running_state,
            temporary,
        }
    }

    /// Get the verifier.
    pub fn verifier(&self) -> &Arc<BroadcastVerifier> {
        &self.verifier
    }

    fn relay_for(&self, kind: RelayKind) -> &MessageRelay {
        match kind {
            RelayKind::RunningState => &self.running_state,
            RelayKind::Temporary => &self.temporary,
        }
    }

    /// Handle a raw broadcast received from `from_ip`.
    pub async fn handle_raw(&self, raw: &[u8], from_ip: &str, kind: RelayKind) -> IngressOutcome {
        match BroadcastEnvelope::from_slice(raw) {
            Ok(envelope) => self.handle(&envelope, from_ip, kind).await,
            Err(e) => {
                debug!(from_ip = %from_ip, error = %e, "Dropping malformed broadcast");
                IngressOutcome::Malformed(e.to_string())
            }
        }
    }

    /// Handle an already decoded JSON broadcast received from `from_ip`.
    pub async fn handle_value(&self, value: Value, from_ip: &str, kind: RelayKind) -> IngressOutcome {
        match BroadcastEnvelope::from_value(value) {
            Ok(envelope) => self.handle(&envelope, from_ip, kind).await,
            Err(e) => {
                debug!(from_ip = %from_ip, error = %e, "Dropping malformed broadcast");
                IngressOutcome::Malformed(e.to_string())
            }
        }
    }

    /// Verify an original broadcast and relay it if trusted.
    ///
    /// Membership is not re-checked by the relay.
    pub async fn handle(
        &self,
        envelope: &BroadcastEnvelope,
        from_ip: &str,
        kind: RelayKind,
    ) -> IngressOutcome {
        let verdict = self.verifier.verify_original(envelope, None, None).await;
        self.dispatch(verdict, envelope, from_ip, kind).await
    }

    /// Verify a broadcast forwarded by another node and relay it if trusted.
    ///
    /// Unlike [`BroadcastIngress::handle`] the age of the broadcast is not
    /// checked; the future skew limit still applies.
    pub async fn handle_relayed(
        &self,
        envelope: &BroadcastEnvelope,
        from_ip: &str,
        kind: RelayKind,
    ) -> IngressOutcome {
        let verdict = self.verifier.verify(envelope, None, None).await;
        self.dispatch(verdict, envelope, from_ip, kind).await
    }

    async fn dispatch(
        &self,
        verdict: BroadcastResult<bool>,
        envelope: &BroadcastEnvelope,
        from_ip: &str,
        kind: RelayKind,
    ) -> IngressOutcome {
        match verdict {
            Ok(true) => IngressOutcome::Relayed(self.relay_for(kind).relay(envelope, from_ip).await),
            Ok(false) => IngressOutcome::Rejected,
            Err(e) => {
                warn!(
                    pub_key = %envelope.pub_key,
                    from_ip = %from_ip,
                    error = %e,
                    "Unable to verify broadcast"
                );
                IngressOutcome::VerificationError(e.to_string())
            }
        }
    }
}
