// Copyright (c) 2024 Botho Foundation

//! Signed broadcast verification and staggered gossip relay for Botho.
//!
//! Nodes exchange application broadcasts wrapped in a signed envelope. This
//! crate decides whether an envelope can be trusted and, for application
//! messages, re-floods it to the node's other peers.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                    BroadcastIngress                      │
//! ├──────────────────────────────────────────────────────────┤
//! │  ┌───────────────────┐        ┌───────────────────────┐  │
//! │  │ BroadcastVerifier │  ───▶  │     MessageRelay      │  │
//! │  │ version / skew /  │        │ store ─▶ outgoing ─▶  │  │
//! │  │ membership / sig  │        │ stagger ─▶ incoming   │  │
//! │  └───────────────────┘        └───────────────────────┘  │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! Membership, signature checking, message storage, the connection pools and
//! the peer transport are supplied by the node through the traits in
//! [`traits`].
//!
//! # Usage
//!
//! ```ignore
//! use bth_broadcast::{BroadcastConfig, BroadcastVerifier, MessageRelay};
//!
//! let config = BroadcastConfig::default();
//! let verifier = BroadcastVerifier::new(config.clone(), membership, signatures);
//! let relay = MessageRelay::temporary(&config, store, pools, sender);
//!
//! let envelope = BroadcastEnvelope::from_slice(&bytes)?;
//! if verifier.verify_original(&envelope, None, None).await? {
//!     relay.relay(&envelope, &peer_ip).await;
//! }
//! ```
//!
//! # Trust rules
//!
//! - Only envelope version `1` is accepted.
//! - Timestamps may be at most 120 seconds in the future.
//! - Original broadcasts must be younger than 5 minutes.
//! - The sender must be on the deterministic node list.
//! - The signature must cover `version ++ data ++ timestamp`.

#![warn(missing_docs)]
#![warn(unused_extern_crates)]

pub mod clock;
pub mod config;
pub mod connections;
pub mod envelope;
pub mod error;
pub mod ingress;
pub mod membership;
pub mod relay;
pub mod signature;
pub mod traits;
pub mod verifier;

#[cfg(test)]
mod test_utils;

// Re-export main types for convenience
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{BroadcastConfig, BroadcastConfigBuilder};
pub use connections::{normalize_address, ConnectionPools, FanoutMetrics, FanoutSender};
pub use envelope::BroadcastEnvelope;
pub use error::{BroadcastError, BroadcastResult};
pub use ingress::{BroadcastIngress, IngressOutcome};
pub use membership::{NodeListEntry, StaticMembership};
pub use relay::{MessageRelay, RelayKind, RelayOutcome};
pub use signature::Ed25519SignatureVerifier;
pub use traits::{
    ConnectionRegistry, MembershipDirectory, MessageStore, PeerConnection, PeerSender,
    SharedConnection, SignatureVerifier,
};
pub use verifier::{is_fresh, BroadcastVerifier};
