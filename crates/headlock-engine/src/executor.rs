use std::sync::Arc;

use headlock_core::step::PaymentStep;
use headlock_core::types::TxId;

use crate::engine::PaymentConfig;
use crate::error::EngineError;
use crate::traits::{Destination, HeadClient, LockRequest};

/// Lock lifetime for the hop at `index`: `base * 0.95^index` minutes,
/// rounded to two decimals.
///
/// Each hop's lock expires strictly earlier than the hop before it, so
/// if the final hop times out, every earlier hop still has time for its
/// sender to reclaim funds via refund.
pub fn hop_timeout_minutes(base: f64, index: usize) -> f64 {
    let decayed = base * 0.95f64.powi(index as i32);
    (decayed * 100.0).round() / 100.0
}

/// Where the hop at `index` directs its funds: the last hop pays the
/// ultimate target's plain account; every other hop opens a further
/// hash-locked contract for the next hop's receiver.
pub fn destination_for(index: usize, path: &[PaymentStep]) -> Option<Destination> {
    let last = path.last()?;
    if index + 1 >= path.len() {
        Some(Destination::Account(last.to.user.clone()))
    } else {
        Some(Destination::HashLocked(path[index + 1].to.user.clone()))
    }
}

/// Submits single hop locks to the head boundary.
pub struct StepExecutor {
    client: Arc<dyn HeadClient>,
}

impl StepExecutor {
    pub fn new(client: Arc<dyn HeadClient>) -> Self {
        Self { client }
    }

    /// Submit the lock for one hop and return its transaction id.
    ///
    /// A response without a transaction id is a failure.
    pub async fn execute_step(
        &self,
        step: &PaymentStep,
        index: usize,
        path: &[PaymentStep],
        config: &PaymentConfig,
    ) -> Result<TxId, EngineError> {
        let timeout_minutes = hop_timeout_minutes(config.base_timeout_minutes, index);
        let destination = destination_for(index, path).ok_or(EngineError::EmptyPath)?;

        let request = LockRequest {
            head: step.head().clone(),
            sender: step.from.user.clone(),
            receiver: step.to.user.clone(),
            amount: config.amount,
            hash: config.hash,
            timeout_minutes,
            destination,
        };

        tracing::debug!(
            step = index,
            head = %request.head,
            sender = %request.sender,
            receiver = %request.receiver,
            timeout_minutes,
            destination = %request.destination,
            "submitting hop lock"
        );

        let receipt = self.client.submit_lock(request).await?;
        let tx_id = receipt.tx_id.ok_or(EngineError::MissingTxId)?;

        tracing::info!(step = index, tx_id = %tx_id, "hop lock submitted");
        Ok(tx_id)
    }
}
