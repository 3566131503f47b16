// Copyright (c) 2024 Botho Foundation

//! Configuration for broadcast verification and relay.

use crate::relay::RelayKind;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// The only envelope version accepted on the network.
pub const SUPPORTED_VERSION: i64 = 1;

/// How far in the future (ms) a broadcast timestamp may be.
pub const MAX_FUTURE_SKEW_MS: u64 = 120_000;

/// Maximum age (ms) of a broadcast accepted on the original broadcast path.
pub const MAX_AGE_MS: u64 = 300_000;

/// Delay between the outgoing and incoming flood for running state messages.
pub const RUNNING_STATE_STAGGER_MS: u64 = 2345;

/// Delay between the outgoing and incoming flood for temporary messages.
pub const TEMPORARY_STAGGER_MS: u64 = 100;

/// Configuration for the broadcast verifier and the message relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BroadcastConfig {
    /// Envelope version accepted by the verifier
    pub supported_version: i64,

    /// Allowed forward clock skew in milliseconds
    pub max_future_skew_ms: u64,

    /// Maximum age of an original broadcast in milliseconds
    pub max_age_ms: u64,

    /// Stagger between flood phases for running state messages (milliseconds)
    pub running_state_stagger_ms: u64,

    /// Stagger between flood phases for temporary messages (milliseconds)
    pub temporary_stagger_ms: u64,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            supported_version: SUPPORTED_VERSION,
            max_future_skew_ms: MAX_FUTURE_SKEW_MS,
            max_age_ms: MAX_AGE_MS,
            running_state_stagger_ms: RUNNING_STATE_STAGGER_MS,
            temporary_stagger_ms: TEMPORARY_STAGGER_MS,
        }
    }
}

impl BroadcastConfig {
    /// Get the stagger interval for a relay variant.
    pub fn stagger(&self, kind: RelayKind) -> Duration {
        match kind {
            RelayKind::RunningState => Duration::from_millis(self.running_state_stagger_ms),
            RelayKind::Temporary => Duration::from_millis(self.temporary_stagger_ms),
        }
    }

    /// Get the maximum original broadcast age as a Duration.
    pub fn max_age(&self) -> Duration {
        Duration::from_millis(self.max_age_ms)
    }

    /// Get the allowed forward clock skew as a Duration.
    pub fn max_future_skew(&self) -> Duration {
        Duration::from_millis(self.max_future_skew_ms)
    }
}

/// Builder for BroadcastConfig.
#[derive(Debug, Default)]
pub struct BroadcastConfigBuilder {
    config: BroadcastConfig,
}

impl BroadcastConfigBuilder {
    /// Create a new builder with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the accepted envelope version.
    pub fn supported_version(mut self, version: i64) -> Self {
        self.config.supported_version = version;
        self
    }

    /// Set the allowed forward clock skew in milliseconds.
    pub fn max_future_skew_ms(mut self, ms: u64) -> Self {
        self.config.max_future_skew_ms = ms;
        self
    }

    /// Set the maximum original broadcast age in milliseconds.
    pub fn max_age_ms(mut self, ms: u64) -> Self {
        self.config.max_age_ms = ms;
        self
    }

    /// Set the running state stagger in milliseconds.
    pub fn running_state_stagger_ms(mut self, ms: u64) -> Self {
        self.config.running_state_stagger_ms = ms;
        self
    }

    /// Set the temporary message stagger in milliseconds.
    pub fn temporary_stagger_ms(mut self, ms: u64) -> Self {
        self.config.temporary_stagger_ms = ms;
        self
    }

    /// Build the config.
    pub fn build(self) -> BroadcastConfig {
        self.config
    }
}
