use crate::hashlock::HashLock;
use crate::step_state::StepStatus;

/// Core errors.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("invalid step transition from {from} to {to}")]
    InvalidStepTransition { from: StepStatus, to: StepStatus },

    #[error("no preimage recorded for hash {0}")]
    UnknownHash(HashLock),

    #[error("invalid hash encoding: {0}")]
    InvalidHex(String),
}
