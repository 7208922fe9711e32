use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use headlock_core::hashlock::{HashLock, Preimage};
use headlock_core::types::{Amount, HeadId, OutputId, ParticipantId, TxId};

use crate::error::ClientError;

/// Where the funds of a hop lock are directed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Destination {
    /// Plain account of the user; no further lock.
    Account(ParticipantId),
    /// Another hash-locked contract for the user.
    HashLocked(ParticipantId),
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Account(user) => write!(f, "account:{}", user),
            Self::HashLocked(user) => write!(f, "hash-locked:{}", user),
        }
    }
}

/// Request to open one hash-locked contract on a head.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockRequest {
    pub head: HeadId,
    pub sender: ParticipantId,
    pub receiver: ParticipantId,
    pub amount: Amount,
    pub hash: HashLock,
    /// Lock lifetime in minutes; after this the sender may refund.
    pub timeout_minutes: f64,
    pub destination: Destination,
}

/// Response to a lock submission.
///
/// Heads may acknowledge a submission without a transaction id; the
/// executor treats that as a failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockReceipt {
    pub tx_id: Option<TxId>,
}

/// Request to claim a hash-locked output by revealing the secret.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimRequest {
    pub head: HeadId,
    pub output: OutputId,
    pub secret: Preimage,
    pub claimer: ParticipantId,
}

/// Response to a claim submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimReceipt {
    pub tx_id: Option<TxId>,
}

/// Kind of a UTXO entry on a head.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputKind {
    /// Plain spendable funds of a participant.
    Account,
    /// A pending hash-locked contract.
    HashLocked,
}

impl fmt::Display for OutputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Account => write!(f, "account"),
            Self::HashLocked => write!(f, "hash-locked"),
        }
    }
}

/// One entry of a head's current UTXO snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeadOutput {
    pub id: OutputId,
    pub kind: OutputKind,
    pub amount: Amount,
    /// Hash of the lock, for hash-locked outputs.
    pub hash: Option<HashLock>,
    /// Identity the output is payable to.
    pub receiver: Option<ParticipantId>,
}

impl HeadOutput {
    /// Whether this entry is a pending lock matching `hash`, payable to
    /// `receiver`, of at least `min_amount`.
    pub fn is_pending_lock_for(
        &self,
        hash: &HashLock,
        receiver: &ParticipantId,
        min_amount: Amount,
    ) -> bool {
        self.kind == OutputKind::HashLocked
            && self.hash.as_ref() == Some(hash)
            && self.receiver.as_ref() == Some(receiver)
            && self.amount >= min_amount
    }
}

/// Boundary to the ledger heads.
///
/// Each implementation bridges the engine to a concrete transaction
/// builder and head connection layer. Lock submission must be safe to
/// retry.
#[async_trait]
pub trait HeadClient: Send + Sync {
    /// Submit one hash-locked contract to a head.
    async fn submit_lock(&self, request: LockRequest) -> Result<LockReceipt, ClientError>;

    /// Query the current UTXO snapshot of a head.
    async fn list_outputs(&self, head: &HeadId) -> Result<Vec<HeadOutput>, ClientError>;

    /// Claim a hash-locked output by revealing the secret.
    async fn submit_claim(&self, request: ClaimRequest) -> Result<ClaimReceipt, ClientError>;
}
