// Copyright (c) 2024 Botho Foundation

//! Verification of signed broadcasts.
//!
//! A broadcast is trusted when:
//!
//! - its envelope version is the supported one,
//! - its timestamp is not further in the future than the allowed clock skew,
//! - its public key is on the deterministic node list, and
//! - its signature over `version ++ data ++ timestamp` checks out.
//!
//! Original broadcasts (first hop) must additionally be younger than the
//! maximum age; see [`BroadcastVerifier::verify_original`].

use crate::{
    clock::{Clock, SystemClock},
    config::BroadcastConfig,
    envelope::BroadcastEnvelope,
    error::BroadcastResult,
    membership::{find_entry, NodeListEntry},
    traits::{MembershipDirectory, SignatureVerifier},
};
use std::sync::Arc;
use tracing::debug;

/// Check that a broadcast is younger than `max_age_ms` at time `now_ms`.
pub fn is_fresh(envelope: &BroadcastEnvelope, now_ms: u64, max_age_ms: u64) -> bool {
    i128::from(envelope.timestamp) + i128::from(max_age_ms) > i128::from(now_ms)
}

/// Check that a broadcast is not timestamped more than `max_skew_ms` after
/// `now_ms`.
pub fn within_future_skew(envelope: &BroadcastEnvelope, now_ms: u64, max_skew_ms: u64) -> bool {
    i128::from(envelope.timestamp) <= i128::from(now_ms) + i128::from(max_skew_ms)
}

/// Verifies broadcasts against the node list and the signature capability.
///
/// The verifier holds no mutable state and can be shared between tasks.
pub struct BroadcastVerifier {
    config: BroadcastConfig,
    membership: Arc<dyn MembershipDirectory>,
    signatures: Arc<dyn SignatureVerifier>,
    clock: Arc<dyn Clock>,
}

impl BroadcastVerifier {
    /// Create a verifier using the wall clock.
    pub fn new(
        config: BroadcastConfig,
        membership: Arc<dyn MembershipDirectory>,
        signatures: Arc<dyn SignatureVerifier>,
    ) -> Self {
        Self {
            config,
            membership,
            signatures,
            clock: Arc::new(SystemClock),
        }
    }

    /// Use `clock` when no explicit time is passed to a check.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Get the configuration.
    pub fn config(&self) -> &BroadcastConfig {
        &self.config
    }

    fn resolve_now(&self, now: Option<u64>) -> u64 {
        now.unwrap_or_else(|| self.clock.now_ms())
    }

    /// Verify a broadcast.
    ///
    /// If `node_list` is given, membership is checked against it; otherwise
    /// the membership directory is queried. Returns `Ok(false)` for any
    /// untrusted broadcast. Failures of the directory or of the signature
    /// capability are returned as errors.
    pub async fn verify(
        &self,
        envelope: &BroadcastEnvelope,
        node_list: Option<&[NodeListEntry]>,
        now: Option<u64>,
    ) -> BroadcastResult<bool> {
        if envelope.version != self.config.supported_version {
            debug!(version = envelope.version, "Rejecting broadcast with unsupported version");
            return Ok(false);
        }

        let now = self.resolve_now(now);
        if !within_future_skew(envelope, now, self.config.max_future_skew_ms) {
            debug!(
                pub_key = %envelope.pub_key,
                timestamp = envelope.timestamp,
                now,
                "Rejecting broadcast from the future"
            );
            return Ok(false);
        }

        let known = match node_list {
            Some(nodes) => find_entry(nodes, &envelope.pub_key).is_some(),
            None => {
                let nodes = self.membership.lookup(&envelope.pub_key).await?;
                find_entry(&nodes, &envelope.pub_key).is_some()
            }
        };
        if !known {
            debug!(pub_key = %envelope.pub_key, "Rejecting broadcast from unknown node");
            return Ok(false);
        }

        let message = envelope.signing_message();
        let valid = self
            .signatures
            .verify(&message, &envelope.pub_key, &envelope.signature)
            .await?;
        if !valid {
            debug!(pub_key = %envelope.pub_key, "Rejecting broadcast with invalid signature");
        }
        Ok(valid)
    }

    /// Check that a broadcast is younger than the configured maximum age.
    pub fn is_fresh(&self, envelope: &BroadcastEnvelope, now: Option<u64>) -> bool {
        is_fresh(envelope, self.resolve_now(now), self.config.max_age_ms)
    }

    /// Verify a broadcast received directly from its creator.
    ///
    /// Stale broadcasts are rejected before any lookup or signature check.
    pub async fn verify_original(
        &self,
        envelope: &BroadcastEnvelope,
        node_list: Option<&[NodeListEntry]>,
        now: Option<u64>,
    ) -> BroadcastResult<bool> {
        let now = self.resolve_now(now);
        if !self.is_fresh(envelope, Some(now)) {
            debug!(
                pub_key = %envelope.pub_key,
                timestamp = envelope.timestamp,
                now,
                "Rejecting stale original broadcast"
            );
            return Ok(false);
        }
        self.verify(envelope, node_list, Some(now)).await
    }
}
