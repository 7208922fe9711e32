//! Payment engine: drives a multi-hop payment across heads, one step at
//! a time, with confirmation gating, retry, and background settlement.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use headlock_core::error::CoreError;
use headlock_core::hashlock::HashLock;
use headlock_core::preimage::PreimageStore;
use headlock_core::step::PaymentStep;
use headlock_core::step_state::{PaymentState, StepEvent, StepState, StepStatus};
use headlock_core::types::{Amount, TxId};
use headlock_topology::Topology;

use crate::error::EngineError;
use crate::executor::StepExecutor;
use crate::settlement::{self, SettlementContext, SettlementHandle};
use crate::traits::HeadClient;
use crate::watcher::{ConfirmationWatcher, WatcherConfig};

/// Parameters of one payment: how much moves and under which hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentConfig {
    /// Amount locked at every hop.
    pub amount: Amount,
    /// Hash shared by every lock of this payment.
    pub hash: HashLock,
    /// Lock lifetime of the first hop, in minutes. Later hops decay
    /// from it so that downstream locks always expire first.
    #[serde(default = "default_base_timeout_minutes")]
    pub base_timeout_minutes: f64,
}

fn default_base_timeout_minutes() -> f64 {
    60.0
}

impl PaymentConfig {
    pub fn new(amount: Amount, hash: HashLock) -> Self {
        Self {
            amount,
            hash,
            base_timeout_minutes: default_base_timeout_minutes(),
        }
    }
}

/// Tuning knobs of the payment engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Additional submission attempts per hop after the first.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Delay between submission attempts of one hop.
    #[serde(with = "crate::watcher::duration_secs", default = "default_retry_delay")]
    pub retry_delay: Duration,
    /// Confirmation polling bounds.
    #[serde(default)]
    pub watcher: WatcherConfig,
}

fn default_max_retries() -> u32 {
    3
}
fn default_retry_delay() -> Duration {
    Duration::from_secs(2)
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            retry_delay: default_retry_delay(),
            watcher: WatcherConfig::default(),
        }
    }
}

/// Snapshot of one step record, emitted after every status change.
#[derive(Debug, Clone)]
pub struct StepUpdate {
    pub index: usize,
    pub status: StepStatus,
    pub tx_id: Option<TxId>,
    pub error: Option<String>,
}

/// Receives step lifecycle updates as the engine makes progress.
///
/// Called outside the engine's state lock, so an observer may call back
/// into the engine (for example to cancel).
pub trait StepObserver: Send + Sync {
    fn on_step_update(&self, update: StepUpdate);
}

/// How a payment execution ended.
#[derive(Debug)]
pub enum ExecutionOutcome {
    /// Every hop locked. When the engine holds the preimage for the
    /// payment's hash, `settlement` is a handle to the background task
    /// that claims the intermediary locks once the recipient collects.
    Completed { settlement: Option<SettlementHandle> },
    /// Execution stopped at a cancellation checkpoint. `next_step` is
    /// the index of the first step that was not submitted.
    Cancelled { next_step: usize },
}

enum LoopOutcome {
    Finished,
    Cancelled(usize),
}

/// Orchestrates one payment at a time across the topology's heads.
///
/// Hops run strictly in sequence. Before an intermediary's hop is
/// submitted, the engine confirms the lock funding it is visible on the
/// previous head; after any non-final hop, it confirms that hop's lock
/// before advancing.
pub struct PaymentEngine {
    topology: Arc<Topology>,
    client: Arc<dyn HeadClient>,
    executor: StepExecutor,
    watcher: ConfirmationWatcher,
    preimages: Arc<PreimageStore>,
    config: EngineConfig,
    state: RwLock<Option<PaymentState>>,
    cancelled: AtomicBool,
}

impl PaymentEngine {
    pub fn new(
        topology: Arc<Topology>,
        client: Arc<dyn HeadClient>,
        preimages: Arc<PreimageStore>,
        config: EngineConfig,
    ) -> Self {
        let executor = StepExecutor::new(Arc::clone(&client));
        let watcher = ConfirmationWatcher::new(Arc::clone(&client), config.watcher.clone());
        Self {
            topology,
            client,
            executor,
            watcher,
            preimages,
            config,
            state: RwLock::new(None),
            cancelled: AtomicBool::new(false),
        }
    }

    /// Execute a payment along `path`. See [`Self::execute_with_observer`].
    pub async fn execute(
        &self,
        path: Vec<PaymentStep>,
        config: PaymentConfig,
    ) -> Result<ExecutionOutcome, EngineError> {
        self.execute_with_observer(path, config, None).await
    }

    /// Execute a payment along `path`, emitting a [`StepUpdate`] to
    /// `observer` after every step status change.
    ///
    /// Only one payment runs at a time; a second call while one is in
    /// flight fails with [`EngineError::AlreadyInProgress`]. Whatever
    /// the outcome, `is_executing` is cleared before this returns.
    pub async fn execute_with_observer(
        &self,
        path: Vec<PaymentStep>,
        config: PaymentConfig,
        observer: Option<&dyn StepObserver>,
    ) -> Result<ExecutionOutcome, EngineError> {
        {
            let mut guard = self.state.write().unwrap();
            if guard.as_ref().map_or(false, |s| s.is_executing) {
                return Err(EngineError::AlreadyInProgress);
            }
            if path.is_empty() {
                return Err(EngineError::EmptyPath);
            }
            *guard = Some(PaymentState::for_path(&path));
        }

        tracing::info!(
            hops = path.len(),
            amount = %config.amount,
            hash = %config.hash,
            "payment execution started"
        );

        let result = self.run_steps(&path, &config, observer).await;
        self.finish_execution();

        match result {
            Ok(LoopOutcome::Finished) => {
                tracing::info!(hops = path.len(), "all hops locked");
                let settlement = self.spawn_settlement(&path, &config);
                Ok(ExecutionOutcome::Completed { settlement })
            }
            Ok(LoopOutcome::Cancelled(next_step)) => {
                tracing::info!(next_step, "payment execution cancelled");
                Ok(ExecutionOutcome::Cancelled { next_step })
            }
            Err(e) => Err(e),
        }
    }

    async fn run_steps(
        &self,
        path: &[PaymentStep],
        config: &PaymentConfig,
        observer: Option<&dyn StepObserver>,
    ) -> Result<LoopOutcome, EngineError> {
        for (index, step) in path.iter().enumerate() {
            if self.cancelled.load(Ordering::SeqCst) {
                tracing::info!(index, "cancellation observed, stopping before step");
                return Ok(LoopOutcome::Cancelled(index));
            }

            self.set_current_step(index);

            // An intermediary forwards only once the lock funding it is
            // visible on the previous head.
            if index > 0 && self.topology.is_automated_step(step) {
                self.update_step(index, observer, |s| s.apply(StepEvent::Start))?;
                tracing::info!(index, step = %step, "waiting for previous hop lock");
                let funded = self
                    .watcher
                    .wait_for_opened(&path[index - 1], &config.hash, config.amount)
                    .await;
                if !funded {
                    let error = EngineError::PreviousStepUnconfirmed { index };
                    let message = error.to_string();
                    self.update_step(index, observer, |s| {
                        s.error = Some(message);
                        s.apply(StepEvent::Fail)
                    })?;
                    return Err(error);
                }
            }

            let tx_id = self
                .submit_with_retries(step, index, path, config, observer)
                .await?;

            self.update_step(index, observer, |s| {
                s.tx_id = Some(tx_id.clone());
                s.apply(StepEvent::Complete)
            })?;
            tracing::info!(index, step = %step, tx = %tx_id, "step completed");

            // Confirm-then-advance: the next hop is not attempted until
            // this hop's lock is visible on its head.
            if index + 1 < path.len() {
                let confirmed = self
                    .watcher
                    .wait_for_opened(step, &config.hash, config.amount)
                    .await;
                if !confirmed {
                    return Err(EngineError::StepUnconfirmed { index });
                }
            }
        }

        Ok(LoopOutcome::Finished)
    }

    async fn submit_with_retries(
        &self,
        step: &PaymentStep,
        index: usize,
        path: &[PaymentStep],
        config: &PaymentConfig,
        observer: Option<&dyn StepObserver>,
    ) -> Result<TxId, EngineError> {
        let mut last_error: Option<String> = None;

        for attempt in 0..=self.config.max_retries {
            if attempt == 0 {
                // Automated steps were already started by the funding gate.
                if self.step_status(index) == Some(StepStatus::Pending) {
                    self.update_step(index, observer, |s| s.apply(StepEvent::Start))?;
                }
            } else {
                self.update_step(index, observer, |s| s.apply(StepEvent::Retry))?;
                tokio::time::sleep(self.config.retry_delay).await;
            }

            match self.executor.execute_step(step, index, path, config).await {
                Ok(tx_id) => return Ok(tx_id),
                Err(e) => {
                    tracing::warn!(
                        index,
                        step = %step,
                        attempt = attempt + 1,
                        error = %e,
                        "hop submission attempt failed"
                    );
                    last_error = Some(e.to_string());
                }
            }
        }

        let attempts = self.config.max_retries + 1;
        let message = last_error.unwrap_or_else(|| "unknown submission error".into());
        let error = EngineError::StepFailed {
            index,
            attempts,
            last_error: message.clone(),
        };
        self.update_step(index, observer, |s| {
            s.error = Some(message);
            s.apply(StepEvent::Fail)
        })?;
        tracing::error!(index, step = %step, attempts, "step failed, payment aborted");
        Err(error)
    }

    /// Mutate the step record at `index` under the state lock, then
    /// emit the resulting snapshot to the observer outside the lock.
    fn update_step<F>(
        &self,
        index: usize,
        observer: Option<&dyn StepObserver>,
        f: F,
    ) -> Result<(), EngineError>
    where
        F: FnOnce(&mut StepState) -> Result<(), CoreError>,
    {
        let update = {
            let mut guard = self.state.write().unwrap();
            let state = guard.as_mut().ok_or(EngineError::NotExecuting)?;
            let record = &mut state.steps[index];
            f(record)?;
            StepUpdate {
                index,
                status: record.status,
                tx_id: record.tx_id.clone(),
                error: record.error.clone(),
            }
        };

        if let Some(observer) = observer {
            observer.on_step_update(update);
        }
        Ok(())
    }

    fn step_status(&self, index: usize) -> Option<StepStatus> {
        self.state
            .read()
            .unwrap()
            .as_ref()
            .and_then(|s| s.steps.get(index).map(|record| record.status))
    }

    fn set_current_step(&self, index: usize) {
        if let Some(state) = self.state.write().unwrap().as_mut() {
            state.current_step_index = Some(index);
        }
    }

    fn finish_execution(&self) {
        if let Some(state) = self.state.write().unwrap().as_mut() {
            state.is_executing = false;
        }
    }

    fn spawn_settlement(
        &self,
        path: &[PaymentStep],
        config: &PaymentConfig,
    ) -> Option<SettlementHandle> {
        let secret = match self.preimages.secret_for(&config.hash) {
            Some(secret) => secret,
            None => {
                tracing::debug!(hash = %config.hash, "no preimage recorded, skipping settlement");
                return None;
            }
        };

        Some(settlement::spawn(SettlementContext {
            topology: Arc::clone(&self.topology),
            client: Arc::clone(&self.client),
            watcher: self.watcher.clone(),
            path: path.to_vec(),
            hash: config.hash,
            amount: config.amount,
            secret,
        }))
    }

    /// Request cancellation. Takes effect at the next loop-iteration
    /// boundary; the step in flight still runs to completion. The flag
    /// persists until [`Self::reset`].
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        tracing::info!("payment cancellation requested");
    }

    /// Drop all payment state and clear the cancellation flag.
    ///
    /// Fails while a payment is executing.
    pub fn reset(&self) -> Result<(), EngineError> {
        let mut guard = self.state.write().unwrap();
        if guard.as_ref().map_or(false, |s| s.is_executing) {
            return Err(EngineError::AlreadyInProgress);
        }
        *guard = None;
        self.cancelled.store(false, Ordering::SeqCst);
        tracing::info!("engine state reset");
        Ok(())
    }

    /// Copy of the current payment state, if a payment was started.
    pub fn state_snapshot(&self) -> Option<PaymentState> {
        self.state.read().unwrap().clone()
    }

    pub fn is_executing(&self) -> bool {
        self.state
            .read()
            .unwrap()
            .as_ref()
            .map_or(false, |s| s.is_executing)
    }
}
