pub mod error;
pub mod hashlock;
pub mod preimage;
pub mod step;
pub mod step_state;
pub mod types;

pub use error::CoreError;
pub use hashlock::{HashLock, Preimage};
pub use preimage::{PreimageRecord, PreimageStore};
pub use step::{PaymentStep, StepParty};
pub use step_state::{PaymentState, StepEvent, StepState, StepStateMachine, StepStatus};
pub use types::{Amount, HeadId, OutputId, ParticipantId, TxId};
