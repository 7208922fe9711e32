use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::step::PaymentStep;
use crate::types::TxId;

/// The 5 states of a payment step's lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StepStatus {
    /// Step has been planned but submission has not started.
    Pending,
    /// A submission attempt is underway.
    InProgress,
    /// A previous attempt failed; another attempt is underway.
    Retrying,
    /// A transaction id was obtained. Final state.
    Completed,
    /// Retries were exhausted. Final state.
    Failed,
}

impl StepStatus {
    /// Whether this is a final (terminal) state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::InProgress => write!(f, "in-progress"),
            Self::Retrying => write!(f, "retrying"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Events that drive step state transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepEvent {
    /// Submission has begun.
    Start,
    /// A further submission attempt has begun after a failure.
    Retry,
    /// Submission yielded a transaction id.
    Complete,
    /// Submission gave up.
    Fail,
}

/// Drives step status transitions.
///
/// Valid transitions:
/// - Pending → InProgress (Start)
/// - InProgress → Retrying (Retry)
/// - Retrying → Retrying (Retry)
/// - InProgress → Completed (Complete)
/// - Retrying → Completed (Complete)
/// - InProgress → Failed (Fail)
/// - Retrying → Failed (Fail)
pub struct StepStateMachine;

impl StepStateMachine {
    /// Attempt a state transition based on an event.
    /// Returns the new status on success, or an error for invalid transitions.
    pub fn transition(current: StepStatus, event: StepEvent) -> Result<StepStatus, CoreError> {
        let new_status = match (current, event) {
            (StepStatus::Pending, StepEvent::Start) => StepStatus::InProgress,

            (StepStatus::InProgress, StepEvent::Retry) => StepStatus::Retrying,
            (StepStatus::Retrying, StepEvent::Retry) => StepStatus::Retrying,

            (StepStatus::InProgress, StepEvent::Complete) => StepStatus::Completed,
            (StepStatus::Retrying, StepEvent::Complete) => StepStatus::Completed,

            (StepStatus::InProgress, StepEvent::Fail) => StepStatus::Failed,
            (StepStatus::Retrying, StepEvent::Fail) => StepStatus::Failed,

            // All other transitions are invalid
            _ => {
                let target = match event {
                    StepEvent::Start => StepStatus::InProgress,
                    StepEvent::Retry => StepStatus::Retrying,
                    StepEvent::Complete => StepStatus::Completed,
                    StepEvent::Fail => StepStatus::Failed,
                };
                return Err(CoreError::InvalidStepTransition {
                    from: current,
                    to: target,
                });
            }
        };

        tracing::debug!(
            from = %current,
            to = %new_status,
            event = ?event,
            "step state transition"
        );

        Ok(new_status)
    }

    /// Check if a transition is valid without performing it.
    pub fn can_transition(current: StepStatus, event: StepEvent) -> bool {
        Self::transition(current, event).is_ok()
    }
}

/// Mutable per-execution record for one step of a payment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepState {
    /// The hop this record tracks.
    pub step: PaymentStep,
    /// Position in the payment path.
    pub index: usize,
    /// Current lifecycle status.
    pub status: StepStatus,
    /// Transaction id of the submitted lock, once obtained.
    pub tx_id: Option<TxId>,
    /// Last recorded error message, if any.
    pub error: Option<String>,
    /// Number of retry attempts made so far.
    pub retry_count: u32,
}

impl StepState {
    pub fn new(step: PaymentStep, index: usize) -> Self {
        Self {
            step,
            index,
            status: StepStatus::Pending,
            tx_id: None,
            error: None,
            retry_count: 0,
        }
    }

    /// Apply an event to this step, advancing its status.
    ///
    /// `Retry` also bumps the retry counter.
    pub fn apply(&mut self, event: StepEvent) -> Result<(), CoreError> {
        self.status = StepStateMachine::transition(self.status, event)?;
        if event == StepEvent::Retry {
            self.retry_count += 1;
        }
        Ok(())
    }
}

/// The whole mutable state of one payment execution.
///
/// Created at the moment execution begins; owned exclusively by the engine
/// and replaced wholesale on reset. Observers see clones.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentState {
    /// Per-step records, in path order.
    pub steps: Vec<StepState>,
    /// Whether the execution loop is still running.
    pub is_executing: bool,
    /// Index of the step the loop is currently on.
    pub current_step_index: Option<usize>,
}

impl PaymentState {
    /// Build the initial state for a path: every step pending, executing.
    pub fn for_path(path: &[PaymentStep]) -> Self {
        Self {
            steps: path
                .iter()
                .enumerate()
                .map(|(index, step)| StepState::new(step.clone(), index))
                .collect(),
            is_executing: true,
            current_step_index: None,
        }
    }

    /// How many steps have reached `Completed`.
    pub fn completed_count(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| s.status == StepStatus::Completed)
            .count()
    }
}
