// Copyright (c) 2024 Botho Foundation

//! Connection pools and batch sending.
//!
//! The node keeps two pools: outgoing connections it opened itself to a small
//! curated set of peers, and incoming connections opened by other peers. The
//! relay only ever reads snapshots of these pools.

use crate::{
    error::BroadcastResult,
    traits::{ConnectionRegistry, PeerSender, SharedConnection},
};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use tracing::warn;

/// Prefix the socket layer puts in front of IPv4 peers on a dual-stack
/// listener.
pub const IPV4_MAPPED_PREFIX: &str = "::ffff:";

/// Strip the IPv4-mapped IPv6 prefix from a remote address.
pub fn normalize_address(address: &str) -> &str {
    address.strip_prefix(IPV4_MAPPED_PREFIX).unwrap_or(address)
}

/// In-memory outgoing and incoming connection pools.
#[derive(Debug, Default)]
pub struct ConnectionPools {
    outgoing: RwLock<Vec<SharedConnection>>,
    incoming: RwLock<Vec<SharedConnection>>,
}

impl ConnectionPools {
    /// Create empty pools.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection this node opened.
    pub fn add_outgoing(&self, connection: SharedConnection) {
        self.outgoing.write().push(connection);
    }

    /// Add a connection a peer opened to this node.
    pub fn add_incoming(&self, connection: SharedConnection) {
        self.incoming.write().push(connection);
    }

    /// Remove every connection to `address` from both pools.
    ///
    /// Returns the number of connections removed.
    pub fn remove(&self, address: &str) -> usize {
        let address = normalize_address(address);
        let mut removed = 0;
        for pool in [&self.outgoing, &self.incoming] {
            let mut pool = pool.write();
            let before = pool.len();
            pool.retain(|c| normalize_address(c.remote_address()) != address);
            removed += before - pool.len();
        }
        removed
    }

    /// Number of outgoing connections.
    pub fn outgoing_count(&self) -> usize {
        self.outgoing.read().len()
    }

    /// Number of incoming connections.
    pub fn incoming_count(&self) -> usize {
        self.incoming.read().len()
    }
}

impl ConnectionRegistry for ConnectionPools {
    fn outgoing(&self) -> Vec<SharedConnection> {
        self.outgoing.read().clone()
    }

    fn incoming(&self) -> Vec<SharedConnection> {
        self.incoming.read().clone()
    }
}

/// Counters for the fan-out sender.
#[derive(Debug, Default)]
pub struct FanoutMetrics {
    /// Messages delivered to a peer.
    pub delivered: AtomicU64,
    /// Messages a peer failed to accept.
    pub failed: AtomicU64,
}

impl FanoutMetrics {
    /// Get the number of successful sends.
    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    /// Get the number of failed sends.
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }
}

/// Sends a message to every peer of a batch without waiting for delivery.
///
/// Each send runs as its own task. A failing peer is logged and counted, and
/// a peer that never completes a write holds up only its own task.
#[derive(Debug, Default)]
pub struct FanoutSender {
    metrics: Arc<FanoutMetrics>,
}

impl FanoutSender {
    /// Create a new sender.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a reference to the metrics.
    pub fn metrics(&self) -> Arc<FanoutMetrics> {
        Arc::clone(&self.metrics)
    }
}

#[async_trait]
impl PeerSender for FanoutSender {
    async fn send_all(&self, message: &str, peers: &[SharedConnection]) -> BroadcastResult<()> {
        let message: Arc<str> = Arc::from(message);
        for peer in peers {
            let peer = Arc::clone(peer);
            let message = Arc::clone(&message);
            let metrics = Arc::clone(&self.metrics);
            tokio::spawn(async move {
                match peer.send(&message).await {
                    Ok(()) => {
                        metrics.delivered.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(e) => {
                        metrics.failed.fetch_add(1, Ordering::Relaxed);
                        warn!(peer = %peer.remote_address(), error = %e, "Failed to send broadcast to peer");
                    }
                }
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{settle, MockPeer, StalledPeer};

    #[test]
    fn test_normalize_address() {
        assert_eq!(normalize_address("::ffff:10.0.0.1"), "10.0.0.1");
        assert_eq!(normalize_address("10.0.0.1"), "10.0.0.1");
        assert_eq!(normalize_address("2001:db8::1"), "2001:db8::1");
        // only a leading prefix is stripped
        assert_eq!(normalize_address("1::ffff:2"), "1::ffff:2");
    }

    #[test]
    fn test_pools_keep_order() {
        let pools = ConnectionPools::new();
        pools.add_outgoing(Arc::new(MockPeer::new("10.0.0.1")));
        pools.add_outgoing(Arc::new(MockPeer::new("10.0.0.2")));
        pools.add_incoming(Arc::new(MockPeer::new("::ffff:10.0.0.3")));

        let outgoing: Vec<_> = pools
            .outgoing()
            .iter()
            .map(|c| c.remote_address().to_string())
            .collect();
        assert_eq!(outgoing, vec!["10.0.0.1", "10.0.0.2"]);
        assert_eq!(pools.incoming_count(), 1);
    }

    #[test]
    fn test_remove_matches_mapped_addresses() {
        let pools = ConnectionPools::new();
        pools.add_outgoing(Arc::new(MockPeer::new("10.0.0.3")));
        pools.add_incoming(Arc::new(MockPeer::new("::ffff:10.0.0.3")));
        pools.add_incoming(Arc::new(MockPeer::new("10.0.0.4")));

        assert_eq!(pools.remove("10.0.0.3"), 2);
        assert_eq!(pools.outgoing_count(), 0);
        assert_eq!(pools.incoming_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fanout_survives_broken_peer() {
        let good_a = Arc::new(MockPeer::new("10.0.0.1"));
        let broken = Arc::new(MockPeer::broken("10.0.0.2"));
        let good_b = Arc::new(MockPeer::new("10.0.0.3"));
        let peers: Vec<SharedConnection> = vec![good_a.clone(), broken, good_b.clone()];

        let sender = FanoutSender::new();
        sender.send_all("hello", &peers).await.unwrap();
        settle().await;

        assert_eq!(good_a.received(), vec!["hello"]);
        assert_eq!(good_b.received(), vec!["hello"]);
        assert_eq!(sender.metrics().delivered(), 2);
        assert_eq!(sender.metrics().failed(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fanout_returns_while_peer_stalls() {
        let stalled = Arc::new(StalledPeer::new("10.0.0.1"));
        let good = Arc::new(MockPeer::new("10.0.0.2"));
        let peers: Vec<SharedConnection> = vec![stalled, good.clone()];

        let sender = FanoutSender::new();
        let sent = tokio::time::timeout(
            std::time::Duration::from_secs(60),
            sender.send_all("hello", &peers),
        )
        .await;
        assert!(matches!(sent, Ok(Ok(()))));

        settle().await;
        assert_eq!(good.received(), vec!["hello"]);
        assert_eq!(sender.metrics().delivered(), 1);
    }
}
