use headlock_core::error::CoreError;
use headlock_core::types::{Amount, HeadId, OutputId, ParticipantId};

/// Errors surfaced by the head boundary (lock submission, UTXO queries,
/// claim submission).
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("head not found: {0}")]
    UnknownHead(HeadId),

    #[error("participant {user} is not hosted on head {head}")]
    UnknownParticipant { user: ParticipantId, head: HeadId },

    #[error("output not found: {0}")]
    UnknownOutput(OutputId),

    #[error("preimage does not match the hash lock of output {0}")]
    PreimageMismatch(OutputId),

    #[error("lock on output {0} has expired")]
    LockExpired(OutputId),

    #[error("lock on output {0} has not expired yet")]
    LockNotExpired(OutputId),

    #[error("output {output} is not claimable: {reason}")]
    NotClaimable { output: OutputId, reason: String },

    #[error("insufficient funds for {user} on {head}: available {available}, required {required}")]
    InsufficientFunds {
        user: ParticipantId,
        head: HeadId,
        available: Amount,
        required: Amount,
    },

    #[error("transport error: {0}")]
    Transport(String),
}

/// Payment orchestration errors.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("a payment is already in progress")]
    AlreadyInProgress,

    #[error("payment path is empty")]
    EmptyPath,

    #[error("no payment is executing")]
    NotExecuting,

    #[error("lock submission failed: {0}")]
    Submission(#[from] ClientError),

    #[error("lock submitted but no transaction id returned")]
    MissingTxId,

    #[error("step {index} failed after {attempts} attempts: {last_error}")]
    StepFailed {
        index: usize,
        attempts: u32,
        last_error: String,
    },

    #[error("step {index}: previous step was not confirmed in time")]
    PreviousStepUnconfirmed { index: usize },

    #[error("step {index} was not confirmed in time")]
    StepUnconfirmed { index: usize },

    #[error("state error: {0}")]
    State(#[from] CoreError),
}
