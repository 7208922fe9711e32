use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use headlock_core::hashlock::HashLock;
use headlock_core::step::PaymentStep;
use headlock_core::types::Amount;

use crate::traits::HeadClient;

/// Serde helper to serialize/deserialize `std::time::Duration` as seconds (u64).
pub(crate) mod duration_secs {
    use serde::{self, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

/// Polling bounds for the confirmation watcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatcherConfig {
    /// Delay between successive UTXO queries.
    #[serde(with = "duration_secs", default = "default_poll_interval")]
    pub poll_interval: Duration,
    /// Query budget when waiting for a lock to appear.
    #[serde(default = "default_open_attempts")]
    pub open_attempts: u32,
    /// Query budget when waiting for a lock to disappear.
    #[serde(default = "default_claim_attempts")]
    pub claim_attempts: u32,
    /// Fixed delay before the first disappearance query.
    #[serde(with = "duration_secs", default = "default_claim_grace")]
    pub claim_grace: Duration,
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(2)
}
fn default_open_attempts() -> u32 {
    30
}
fn default_claim_attempts() -> u32 {
    60
}
fn default_claim_grace() -> Duration {
    Duration::from_secs(5)
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            poll_interval: default_poll_interval(),
            open_attempts: default_open_attempts(),
            claim_attempts: default_claim_attempts(),
            claim_grace: default_claim_grace(),
        }
    }
}

/// Polls a head's UTXO snapshot until a hop lock appears or disappears.
///
/// Both waits are bounded and return `false` on budget exhaustion rather
/// than erroring. Individual query failures are transient: the watcher
/// sleeps the interval and tries again.
#[derive(Clone)]
pub struct ConfirmationWatcher {
    client: Arc<dyn HeadClient>,
    config: WatcherConfig,
}

impl ConfirmationWatcher {
    pub fn new(client: Arc<dyn HeadClient>, config: WatcherConfig) -> Self {
        Self { client, config }
    }

    /// Wait until the lock of `step` is visible on its head: a pending
    /// hash-locked output matching `hash`, payable to the step receiver,
    /// of at least `amount`.
    pub async fn wait_for_opened(
        &self,
        step: &PaymentStep,
        hash: &HashLock,
        amount: Amount,
    ) -> bool {
        for attempt in 1..=self.config.open_attempts {
            match self.client.list_outputs(step.head()).await {
                Ok(outputs) => {
                    if outputs
                        .iter()
                        .any(|o| o.is_pending_lock_for(hash, &step.to.user, amount))
                    {
                        tracing::debug!(head = %step.head(), attempt, "hop lock observed open");
                        return true;
                    }
                }
                Err(e) => {
                    tracing::debug!(
                        head = %step.head(),
                        attempt,
                        error = %e,
                        "output query failed, retrying"
                    );
                }
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }

        tracing::warn!(
            head = %step.head(),
            attempts = self.config.open_attempts,
            "hop lock not observed within budget"
        );
        false
    }

    /// Wait until the lock of `step` has disappeared from its head's
    /// snapshot, meaning the receiver claimed it.
    ///
    /// The grace delay gives the final lock time to land before absence
    /// is read as a claim.
    pub async fn wait_for_claimed(
        &self,
        step: &PaymentStep,
        hash: &HashLock,
        amount: Amount,
    ) -> bool {
        tokio::time::sleep(self.config.claim_grace).await;

        for attempt in 1..=self.config.claim_attempts {
            match self.client.list_outputs(step.head()).await {
                Ok(outputs) => {
                    if !outputs
                        .iter()
                        .any(|o| o.is_pending_lock_for(hash, &step.to.user, amount))
                    {
                        tracing::debug!(head = %step.head(), attempt, "hop lock observed claimed");
                        return true;
                    }
                }
                Err(e) => {
                    tracing::debug!(
                        head = %step.head(),
                        attempt,
                        error = %e,
                        "output query failed, retrying"
                    );
                }
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }

        tracing::warn!(
            head = %step.head(),
            attempts = self.config.claim_attempts,
            "hop lock still pending after watch budget"
        );
        false
    }
}
