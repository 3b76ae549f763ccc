//! Particles
//!
//! A particle is the signed envelope that carries a script into the network.
//! The gateway verifies the signature against `init_peer_id` and drops the
//! particle once `timestamp + ttl` has passed.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use libp2p::identity::{Keypair, PublicKey};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Milliseconds since the Unix epoch.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Particle {
    pub id: String,
    pub init_peer_id: String,
    /// Creation time, ms since epoch.
    pub timestamp: u64,
    /// Time to live, ms.
    pub ttl: u64,
    pub script: String,
    /// Argument values and the relay id, keyed by name.
    pub data: Map<String, Value>,
    /// Hex-encoded ed25519 signature.
    pub signature: String,
}

impl Particle {
    pub fn new(script: &str, ttl: u64, init_peer_id: String) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            init_peer_id,
            timestamp: now_ms(),
            ttl,
            script: script.to_string(),
            data: Map::new(),
            signature: String::new(),
        }
    }

    /// `id || timestamp (be) || ttl (be) || script`
    pub fn signing_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.id.len() + 16 + self.script.len());
        bytes.extend_from_slice(self.id.as_bytes());
        bytes.extend_from_slice(&self.timestamp.to_be_bytes());
        bytes.extend_from_slice(&self.ttl.to_be_bytes());
        bytes.extend_from_slice(self.script.as_bytes());
        bytes
    }

    pub fn sign(&mut self, keypair: &Keypair) -> Result<(), libp2p::identity::SigningError> {
        let signature = keypair.sign(&self.signing_bytes())?;
        self.signature = hex::encode(signature);
        Ok(())
    }

    pub fn verify(&self, public: &PublicKey) -> bool {
        match hex::decode(&self.signature) {
            Ok(signature) => public.verify(&self.signing_bytes(), &signature),
            Err(_) => false,
        }
    }

    pub fn deadline_ms(&self) -> u64 {
        self.timestamp.saturating_add(self.ttl)
    }

    pub fn is_expired_at(&self, now: u64) -> bool {
        self.deadline_ms() <= now
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(now_ms())
    }

    /// Time left before expiry, zero once expired.
    pub fn remaining(&self) -> Duration {
        Duration::from_millis(self.deadline_ms().saturating_sub(now_ms()))
    }
}
