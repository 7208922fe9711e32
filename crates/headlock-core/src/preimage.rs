use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::time::Duration;

use crate::error::CoreError;
use crate::hashlock::{HashLock, Preimage};

/// A registered secret and its published hash.
#[derive(Debug, Clone)]
pub struct PreimageRecord {
    /// The secret.
    pub secret: Preimage,
    /// BLAKE3 hash of the secret.
    pub hash: HashLock,
    /// When the record was registered.
    pub created_at: DateTime<Utc>,
    /// Whether the secret has been revealed to settle a payment.
    pub used: bool,
}

/// Registry of payment secrets, keyed by hash.
///
/// The orchestration engine only reads from this store; issuing and
/// marking records used is the owner's business. Thread-safe: uses
/// `DashMap` for concurrent access.
pub struct PreimageStore {
    records: DashMap<HashLock, PreimageRecord>,
}

impl PreimageStore {
    /// Create a new, empty store.
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
        }
    }

    /// Generate and register a fresh random secret.
    pub fn issue(&self) -> PreimageRecord {
        self.insert(Preimage::random())
    }

    /// Register an externally supplied secret.
    pub fn insert(&self, secret: Preimage) -> PreimageRecord {
        let record = PreimageRecord {
            secret,
            hash: secret.hash(),
            created_at: Utc::now(),
            used: false,
        };
        self.records.insert(record.hash, record.clone());
        tracing::debug!(hash = %record.hash, "preimage registered");
        record
    }

    /// Look up the secret for a hash. Read-only.
    pub fn secret_for(&self, hash: &HashLock) -> Option<Preimage> {
        self.records.get(hash).map(|entry| entry.secret)
    }

    /// Get a full record by hash.
    pub fn get(&self, hash: &HashLock) -> Option<PreimageRecord> {
        self.records.get(hash).map(|entry| entry.clone())
    }

    /// Mark a secret as used. Used records survive expiry purges.
    pub fn mark_used(&self, hash: &HashLock) -> Result<(), CoreError> {
        let mut entry = self
            .records
            .get_mut(hash)
            .ok_or(CoreError::UnknownHash(*hash))?;
        entry.used = true;
        tracing::debug!(hash = %hash, "preimage marked used");
        Ok(())
    }

    /// Remove unused records older than `ttl`. Used records are retained.
    ///
    /// Returns the number of records removed.
    pub fn purge_expired(&self, ttl: Duration) -> usize {
        let now = Utc::now();
        let before = self.records.len();

        self.records.retain(|_, record| {
            if record.used {
                return true;
            }
            let age = now.signed_duration_since(record.created_at);
            age.to_std().map_or(true, |a| a < ttl)
        });

        let removed = before - self.records.len();
        if removed > 0 {
            tracing::debug!(removed, "purged expired preimages");
        }
        removed
    }

    /// Get the number of tracked records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if the store has no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl Default for PreimageStore {
    fn default() -> Self {
        Self::new()
    }
}
