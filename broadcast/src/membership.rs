// Copyright (c) 2024 Botho Foundation

//! Node list entries and an in-memory membership directory.

use crate::{error::BroadcastResult, traits::MembershipDirectory};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One entry of the deterministic node list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeListEntry {
    /// Public key the node signs broadcasts with
    pub pubkey: String,

    /// Remaining node metadata (ip, tier, collateral, ...)
    #[serde(flatten)]
    pub metadata: Map<String, Value>,
}

impl NodeListEntry {
    /// Create an entry with no metadata.
    pub fn new(pubkey: impl Into<String>) -> Self {
        Self {
            pubkey: pubkey.into(),
            metadata: Map::new(),
        }
    }

    /// Attach a metadata field.
    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// Find the entry for `pubkey` in a node list.
pub fn find_entry<'a>(nodes: &'a [NodeListEntry], pubkey: &str) -> Option<&'a NodeListEntry> {
    nodes.iter().find(|entry| entry.pubkey == pubkey)
}

/// Membership directory over a node list held in memory.
///
/// The list is replaced wholesale whenever the node learns a new
/// deterministic list.
#[derive(Debug, Default)]
pub struct StaticMembership {
    nodes: RwLock<Vec<NodeListEntry>>,
}

impl StaticMembership {
    /// Create a directory from a node list.
    pub fn new(nodes: Vec<NodeListEntry>) -> Self {
        Self {
            nodes: RwLock::new(nodes),
        }
    }

    /// Replace the node list.
    pub fn replace(&self, nodes: Vec<NodeListEntry>) {
        let count = nodes.len();
        *self.nodes.write() = nodes;
        tracing::debug!(nodes = count, "Replaced deterministic node list");
    }

    /// Get the number of entries.
    pub fn len(&self) -> usize {
        self.nodes.read().len()
    }

    /// Check if the list is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl MembershipDirectory for StaticMembership {
    async fn lookup(&self, pubkey: &str) -> BroadcastResult<Vec<NodeListEntry>> {
        Ok(self
            .nodes
            .read()
            .iter()
            .filter(|entry| entry.pubkey == pubkey)
            .cloned()
            .collect())
    }
}
