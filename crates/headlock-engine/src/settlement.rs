//! Post-completion settlement: watch the final hop, then claim every
//! intermediary lock with the revealed preimage.

use std::sync::Arc;

use tokio::task::JoinHandle;

use headlock_core::hashlock::{HashLock, Preimage};
use headlock_core::step::PaymentStep;
use headlock_core::types::{Amount, HeadId, ParticipantId, TxId};
use headlock_topology::Topology;

use crate::error::ClientError;
use crate::traits::{ClaimRequest, HeadClient};
use crate::watcher::ConfirmationWatcher;

/// Result of the background settlement task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettlementReport {
    /// No claims were attempted.
    Skipped { reason: String },
    /// A claim was attempted for every intermediary lock.
    Completed {
        claims_submitted: usize,
        claims_failed: usize,
    },
}

/// Awaitable handle on the settlement task.
///
/// The task runs detached; dropping the handle does not stop it.
#[derive(Debug)]
pub struct SettlementHandle {
    inner: JoinHandle<SettlementReport>,
}

impl SettlementHandle {
    /// Wait for settlement to finish and return its report.
    pub async fn wait(self) -> SettlementReport {
        match self.inner.await {
            Ok(report) => report,
            Err(e) => {
                tracing::error!(error = %e, "settlement task aborted");
                SettlementReport::Skipped {
                    reason: format!("settlement task panicked: {}", e),
                }
            }
        }
    }
}

/// Everything the settlement task needs, captured at spawn time.
pub(crate) struct SettlementContext {
    pub topology: Arc<Topology>,
    pub client: Arc<dyn HeadClient>,
    pub watcher: ConfirmationWatcher,
    pub path: Vec<PaymentStep>,
    pub hash: HashLock,
    pub amount: Amount,
    pub secret: Preimage,
}

pub(crate) fn spawn(ctx: SettlementContext) -> SettlementHandle {
    SettlementHandle {
        inner: tokio::spawn(run(ctx)),
    }
}

async fn run(ctx: SettlementContext) -> SettlementReport {
    let final_step = match ctx.path.last() {
        Some(step) => step,
        None => {
            return SettlementReport::Skipped {
                reason: "empty path".into(),
            }
        }
    };

    let claimed = ctx
        .watcher
        .wait_for_claimed(final_step, &ctx.hash, ctx.amount)
        .await;
    if !claimed {
        tracing::warn!(hash = %ctx.hash, "final hop not claimed, leaving intermediary locks");
        return SettlementReport::Skipped {
            reason: "final hop not claimed within watch budget".into(),
        };
    }

    tracing::info!(hash = %ctx.hash, "final hop claimed, settling intermediary locks");

    // The recipient's claim revealed the secret, so intermediary claims
    // are independent of each other and can run concurrently.
    let mut claims = Vec::new();
    for step in ctx
        .path
        .iter()
        .filter(|step| ctx.topology.is_intermediary_receiver(step))
    {
        claims.push(tokio::spawn(claim_intermediary_lock(
            Arc::clone(&ctx.client),
            step.clone(),
            ctx.hash,
            ctx.amount,
            ctx.secret,
        )));
    }

    let mut claims_submitted = 0;
    let mut claims_failed = 0;
    for claim in claims {
        match claim.await {
            Ok(Ok(_)) => claims_submitted += 1,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "intermediary claim failed");
                claims_failed += 1;
            }
            Err(e) => {
                tracing::error!(error = %e, "claim task aborted");
                claims_failed += 1;
            }
        }
    }

    SettlementReport::Completed {
        claims_submitted,
        claims_failed,
    }
}

#[derive(Debug, thiserror::Error)]
enum ClaimError {
    #[error("no pending hash-locked output for {user} on {head}")]
    LockNotFound { user: ParticipantId, head: HeadId },

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error("claim submitted but no transaction id returned")]
    MissingTxId,
}

async fn claim_intermediary_lock(
    client: Arc<dyn HeadClient>,
    step: PaymentStep,
    hash: HashLock,
    amount: Amount,
    secret: Preimage,
) -> Result<TxId, ClaimError> {
    let outputs = client.list_outputs(step.head()).await?;
    let lock = outputs
        .iter()
        .find(|o| o.is_pending_lock_for(&hash, &step.to.user, amount))
        .ok_or_else(|| ClaimError::LockNotFound {
            user: step.to.user.clone(),
            head: step.head().clone(),
        })?;

    let receipt = client
        .submit_claim(ClaimRequest {
            head: step.head().clone(),
            output: lock.id,
            secret,
            claimer: step.to.user.clone(),
        })
        .await?;
    let tx_id = receipt.tx_id.ok_or(ClaimError::MissingTxId)?;

    tracing::info!(user = %step.to.user, head = %step.head(), tx = %tx_id, "intermediary lock claimed");
    Ok(tx_id)
}
