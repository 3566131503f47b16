// Copyright (c) 2024 Botho Foundation

//! Mock collaborators shared by the unit tests.

use crate::{
    error::{BroadcastError, BroadcastResult},
    membership::NodeListEntry,
    traits::{MembershipDirectory, MessageStore, PeerConnection, SignatureVerifier},
};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::{
    sync::atomic::{AtomicUsize, Ordering},
    time::Duration,
};
use tokio::time::Instant;

pub struct CountingMembership {
    nodes: Vec<String>,
    fail: bool,
    calls: AtomicUsize,
}

impl CountingMembership {
    pub fn new(nodes: Vec<&str>) -> Self {
        Self {
            nodes: nodes.into_iter().map(String::from).collect(),
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new(vec![])
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MembershipDirectory for CountingMembership {
    async fn lookup(&self, pubkey: &str) -> BroadcastResult<Vec<NodeListEntry>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(BroadcastError::Membership("daemon unreachable".into()));
        }
        Ok(self
            .nodes
            .iter()
            .filter(|key| key.as_str() == pubkey)
            .map(|key| NodeListEntry::new(key.clone()))
            .collect())
    }
}

pub struct CountingSignatures {
    result: bool,
    fail: bool,
    calls: AtomicUsize,
    last: Mutex<Option<(String, String, String)>>,
}

impl CountingSignatures {
    fn with(result: bool, fail: bool) -> Self {
        Self {
            result,
            fail,
            calls: AtomicUsize::new(0),
            last: Mutex::new(None),
        }
    }

    pub fn accepting() -> Self {
        Self::with(true, false)
    }

    pub fn rejecting() -> Self {
        Self::with(false, false)
    }

    pub fn failing() -> Self {
        Self::with(false, true)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_call(&self) -> Option<(String, String, String)> {
        self.last.lock().clone()
    }
}

#[async_trait]
impl SignatureVerifier for CountingSignatures {
    async fn verify(&self, message: &str, pubkey: &str, signature: &str) -> BroadcastResult<bool> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last.lock() = Some((message.into(), pubkey.into(), signature.into()));
        if self.fail {
            return Err(BroadcastError::Signature("verifier offline".into()));
        }
        Ok(self.result)
    }
}

/// Store that answers every call with a fixed result and records payloads.
pub struct MockStore {
    propagate: bool,
    failure: Option<String>,
    pub running_state: Mutex<Vec<Value>>,
    pub temporary: Mutex<Vec<(Value, bool)>>,
}

impl MockStore {
    pub fn new(propagate: bool) -> Self {
        Self {
            propagate,
            failure: None,
            running_state: Mutex::new(vec![]),
            temporary: Mutex::new(vec![]),
        }
    }

    pub fn failing() -> Self {
        Self {
            failure: Some("database down".into()),
            ..Self::new(false)
        }
    }

    fn answer(&self) -> BroadcastResult<bool> {
        match &self.failure {
            Some(reason) => Err(BroadcastError::Store(reason.clone())),
            None => Ok(self.propagate),
        }
    }
}

#[async_trait]
impl MessageStore for MockStore {
    async fn store_running_state(&self, payload: &Value) -> BroadcastResult<bool> {
        self.running_state.lock().push(payload.clone());
        self.answer()
    }

    async fn store_temporary(&self, payload: &Value, rebroadcast: bool) -> BroadcastResult<bool> {
        self.temporary.lock().push((payload.clone(), rebroadcast));
        self.answer()
    }
}

/// Peer connection that records what it was sent and when.
#[derive(Debug)]
pub struct MockPeer {
    address: String,
    fail: bool,
    received: Mutex<Vec<(String, Instant)>>,
}

impl MockPeer {
    pub fn new(address: &str) -> Self {
        Self {
            address: address.into(),
            fail: false,
            received: Mutex::new(vec![]),
        }
    }

    pub fn broken(address: &str) -> Self {
        Self {
            fail: true,
            ..Self::new(address)
        }
    }

    pub fn received(&self) -> Vec<String> {
        self.received.lock().iter().map(|(m, _)| m.clone()).collect()
    }

    pub fn received_at(&self) -> Vec<Instant> {
        self.received.lock().iter().map(|(_, at)| *at).collect()
    }
}

#[async_trait]
impl PeerConnection for MockPeer {
    fn remote_address(&self) -> &str {
        &self.address
    }

    async fn send(&self, message: &str) -> BroadcastResult<()> {
        if self.fail {
            return Err(BroadcastError::Send(self.address.clone(), "socket closed".into()));
        }
        self.received.lock().push((message.to_string(), Instant::now()));
        Ok(())
    }
}

/// Peer connection whose writes never complete.
#[derive(Debug)]
pub struct StalledPeer {
    address: String,
}

impl StalledPeer {
    pub fn new(address: &str) -> Self {
        Self {
            address: address.into(),
        }
    }
}

#[async_trait]
impl PeerConnection for StalledPeer {
    fn remote_address(&self) -> &str {
        &self.address
    }

    async fn send(&self, _message: &str) -> BroadcastResult<()> {
        futures::future::pending::<()>().await;
        Ok(())
    }
}

/// Let spawned send tasks run to completion.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}
