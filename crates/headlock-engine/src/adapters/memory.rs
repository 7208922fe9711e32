//! In-memory head: a per-head UTXO ledger with hash-lock semantics and
//! optional artificial confirmation latency, for demos and tests.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use uuid::Uuid;

use headlock_core::hashlock::HashLock;
use headlock_core::types::{Amount, HeadId, OutputId, ParticipantId, TxId};
use headlock_topology::Topology;

use crate::error::ClientError;
use crate::traits::{
    ClaimReceipt, ClaimRequest, HeadClient, HeadOutput, LockReceipt, LockRequest, OutputKind,
};

/// One ledger entry. Outputs created by a transaction only enter the
/// queryable snapshot once `visible_at` has passed.
#[derive(Debug, Clone)]
struct StoredOutput {
    id: OutputId,
    head: HeadId,
    kind: OutputKind,
    receiver: ParticipantId,
    amount: Amount,
    hash: Option<HashLock>,
    /// Who funded the lock; refunds return here.
    sender: Option<ParticipantId>,
    /// When the lock's timeout path becomes spendable.
    expires_at: Option<DateTime<Utc>>,
    visible_at: DateTime<Utc>,
}

/// UTXO ledger covering every head of a topology.
///
/// Locks are consumed the moment a claim is accepted, so a lock's
/// disappearance from `list_outputs` is the claim signal the watcher
/// polls for.
pub struct MemoryLedger {
    topology: Arc<Topology>,
    outputs: DashMap<OutputId, StoredOutput>,
    delays: DashMap<HeadId, Duration>,
}

impl MemoryLedger {
    pub fn new(topology: Arc<Topology>) -> Self {
        Self {
            topology,
            outputs: DashMap::new(),
            delays: DashMap::new(),
        }
    }

    /// Delay before outputs created on `head` become visible to
    /// `list_outputs`, simulating confirmation latency.
    pub fn set_confirmation_delay(&self, head: HeadId, delay: Duration) {
        self.delays.insert(head, delay);
    }

    /// Credit `user` with spendable funds on `head`.
    ///
    /// Visible immediately, regardless of the head's confirmation delay.
    pub fn fund(
        &self,
        head: &HeadId,
        user: &ParticipantId,
        amount: Amount,
    ) -> Result<OutputId, ClientError> {
        self.ensure_hosted(head, user)?;

        let output = StoredOutput {
            id: OutputId::new(),
            head: head.clone(),
            kind: OutputKind::Account,
            receiver: user.clone(),
            amount,
            hash: None,
            sender: None,
            expires_at: None,
            visible_at: Utc::now(),
        };
        let id = output.id;
        self.outputs.insert(id, output);
        tracing::debug!(head = %head, user = %user, amount = %amount, "account funded");
        Ok(id)
    }

    /// Sum of `user`'s account outputs on `head`, including outputs
    /// still inside their confirmation delay.
    pub fn balance_of(&self, head: &HeadId, user: &ParticipantId) -> Amount {
        self.outputs
            .iter()
            .filter(|entry| {
                let o = entry.value();
                o.head == *head && o.kind == OutputKind::Account && o.receiver == *user
            })
            .fold(Amount::ZERO, |acc, entry| {
                acc.saturating_add(entry.value().amount)
            })
    }

    /// Refund an expired lock to its sender.
    ///
    /// The timeout path of the contract: invalid until `expires_at`
    /// has passed.
    pub fn refund(&self, output: OutputId) -> Result<TxId, ClientError> {
        let (head, sender, amount) = {
            let stored = self
                .outputs
                .get(&output)
                .ok_or(ClientError::UnknownOutput(output))?;
            if stored.kind != OutputKind::HashLocked {
                return Err(ClientError::NotClaimable {
                    output,
                    reason: "not a hash-locked output".into(),
                });
            }
            let expires_at = stored.expires_at.ok_or_else(|| ClientError::NotClaimable {
                output,
                reason: "lock has no expiry".into(),
            })?;
            if Utc::now() < expires_at {
                return Err(ClientError::LockNotExpired(output));
            }
            let sender = stored
                .sender
                .clone()
                .ok_or_else(|| ClientError::NotClaimable {
                    output,
                    reason: "lock has no recorded sender".into(),
                })?;
            (stored.head.clone(), sender, stored.amount)
        };

        self.outputs.remove(&output);
        self.mint_account(head.clone(), sender.clone(), amount);

        let tx_id = TxId::new(format!("tx-{}", Uuid::now_v7()));
        tracing::debug!(head = %head, sender = %sender, amount = %amount, tx = %tx_id, "expired lock refunded");
        Ok(tx_id)
    }

    fn ensure_hosted(&self, head: &HeadId, user: &ParticipantId) -> Result<(), ClientError> {
        let entry = self
            .topology
            .head(head)
            .ok_or_else(|| ClientError::UnknownHead(head.clone()))?;
        if !entry.hosts(user) {
            return Err(ClientError::UnknownParticipant {
                user: user.clone(),
                head: head.clone(),
            });
        }
        Ok(())
    }

    fn visibility_delay(&self, head: &HeadId) -> chrono::Duration {
        self.delays
            .get(head)
            .map(|entry| chrono::Duration::milliseconds(entry.value().as_millis() as i64))
            .unwrap_or_else(chrono::Duration::zero)
    }

    fn mint_account(&self, head: HeadId, receiver: ParticipantId, amount: Amount) -> OutputId {
        let visible_at = Utc::now() + self.visibility_delay(&head);
        let output = StoredOutput {
            id: OutputId::new(),
            head,
            kind: OutputKind::Account,
            receiver,
            amount,
            hash: None,
            sender: None,
            expires_at: None,
            visible_at,
        };
        let id = output.id;
        self.outputs.insert(id, output);
        id
    }
}

#[async_trait]
impl HeadClient for MemoryLedger {
    async fn submit_lock(&self, request: LockRequest) -> Result<LockReceipt, ClientError> {
        self.ensure_hosted(&request.head, &request.sender)?;
        self.ensure_hosted(&request.head, &request.receiver)?;

        let now = Utc::now();
        let spendable: Vec<(OutputId, Amount)> = self
            .outputs
            .iter()
            .filter(|entry| {
                let o = entry.value();
                o.head == request.head
                    && o.kind == OutputKind::Account
                    && o.receiver == request.sender
                    && o.visible_at <= now
            })
            .map(|entry| (entry.value().id, entry.value().amount))
            .collect();

        let available = spendable
            .iter()
            .fold(Amount::ZERO, |acc, (_, a)| acc.saturating_add(*a));
        if available < request.amount {
            return Err(ClientError::InsufficientFunds {
                user: request.sender.clone(),
                head: request.head.clone(),
                available,
                required: request.amount,
            });
        }

        let mut covered = Amount::ZERO;
        let mut consumed = Vec::new();
        for (id, amount) in spendable {
            if covered >= request.amount {
                break;
            }
            covered = covered.saturating_add(amount);
            consumed.push(id);
        }
        for id in &consumed {
            self.outputs.remove(id);
        }
        let change = covered.saturating_sub(request.amount);
        if !change.is_zero() {
            self.mint_account(request.head.clone(), request.sender.clone(), change);
        }

        let expires_at =
            now + chrono::Duration::milliseconds((request.timeout_minutes * 60_000.0) as i64);
        let lock = StoredOutput {
            id: OutputId::new(),
            head: request.head.clone(),
            kind: OutputKind::HashLocked,
            receiver: request.receiver.clone(),
            amount: request.amount,
            hash: Some(request.hash),
            sender: Some(request.sender.clone()),
            expires_at: Some(expires_at),
            visible_at: now + self.visibility_delay(&request.head),
        };
        let lock_id = lock.id;
        self.outputs.insert(lock_id, lock);

        let tx_id = TxId::new(format!("tx-{}", Uuid::now_v7()));
        tracing::debug!(
            head = %request.head,
            sender = %request.sender,
            receiver = %request.receiver,
            amount = %request.amount,
            destination = %request.destination,
            output = %lock_id,
            tx = %tx_id,
            "hash lock opened"
        );
        Ok(LockReceipt { tx_id: Some(tx_id) })
    }

    async fn list_outputs(&self, head: &HeadId) -> Result<Vec<HeadOutput>, ClientError> {
        if self.topology.head(head).is_none() {
            return Err(ClientError::UnknownHead(head.clone()));
        }

        let now = Utc::now();
        Ok(self
            .outputs
            .iter()
            .filter(|entry| {
                let o = entry.value();
                o.head == *head && o.visible_at <= now
            })
            .map(|entry| {
                let o = entry.value();
                HeadOutput {
                    id: o.id,
                    kind: o.kind,
                    amount: o.amount,
                    hash: o.hash,
                    receiver: Some(o.receiver.clone()),
                }
            })
            .collect())
    }

    async fn submit_claim(&self, request: ClaimRequest) -> Result<ClaimReceipt, ClientError> {
        let now = Utc::now();
        let (head, claimer, amount) = {
            let stored = self
                .outputs
                .get(&request.output)
                .ok_or(ClientError::UnknownOutput(request.output))?;
            if stored.kind != OutputKind::HashLocked {
                return Err(ClientError::NotClaimable {
                    output: request.output,
                    reason: "not a hash-locked output".into(),
                });
            }
            if stored.head != request.head {
                return Err(ClientError::NotClaimable {
                    output: request.output,
                    reason: format!("output lives on head {}", stored.head),
                });
            }
            if stored.receiver != request.claimer {
                return Err(ClientError::NotClaimable {
                    output: request.output,
                    reason: format!(
                        "lock is payable to {}, not {}",
                        stored.receiver, request.claimer
                    ),
                });
            }
            if stored.expires_at.map_or(false, |at| now >= at) {
                return Err(ClientError::LockExpired(request.output));
            }
            let hash = stored.hash.ok_or_else(|| ClientError::NotClaimable {
                output: request.output,
                reason: "lock has no hash".into(),
            })?;
            if !hash.matches(&request.secret) {
                return Err(ClientError::PreimageMismatch(request.output));
            }
            (stored.head.clone(), stored.receiver.clone(), stored.amount)
        };

        // The claim consumes the lock; its absence from the snapshot is
        // what the watcher reads as "claimed".
        self.outputs.remove(&request.output);
        self.mint_account(head.clone(), claimer.clone(), amount);

        let tx_id = TxId::new(format!("tx-{}", Uuid::now_v7()));
        tracing::debug!(head = %head, claimer = %claimer, amount = %amount, tx = %tx_id, "hash lock claimed");
        Ok(ClaimReceipt { tx_id: Some(tx_id) })
    }
}
