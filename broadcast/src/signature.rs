// Copyright (c) 2024 Botho Foundation

//! Ed25519 implementation of the signature capability.

use crate::{error::BroadcastResult, traits::SignatureVerifier};
use async_trait::async_trait;
use ed25519_dalek::{Signature, Verifier, VerifyingKey};

/// Checks hex encoded ed25519 signatures against hex encoded public keys.
///
/// Keys or signatures that do not decode are treated as a failed check, not
/// as an error.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ed25519SignatureVerifier;

impl Ed25519SignatureVerifier {
    fn check(message: &str, pubkey: &str, signature: &str) -> bool {
        let key_bytes: [u8; 32] = match hex::decode(pubkey).ok().and_then(|b| b.try_into().ok()) {
            Some(bytes) => bytes,
            None => return false,
        };
        let Ok(key) = VerifyingKey::from_bytes(&key_bytes) else {
            return false;
        };
        let Ok(sig_bytes) = hex::decode(signature) else {
            return false;
        };
        let Ok(signature) = Signature::from_slice(&sig_bytes) else {
            return false;
        };
        key.verify(message.as_bytes(), &signature).is_ok()
    }
}

#[async_trait]
impl SignatureVerifier for Ed25519SignatureVerifier {
    async fn verify(&self, message: &str, pubkey: &str, signature: &str) -> BroadcastResult<bool> {
        let valid = Self::check(message, pubkey, signature);
        if !valid {
            tracing::trace!(pub_key = %pubkey, "Signature does not match");
        }
        Ok(valid)
    }
}
