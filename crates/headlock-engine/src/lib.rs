//! Headlock Payment Engine
//!
//! Drives multi-hop hash-locked payments across heads: sequential lock
//! submission with retry, confirmation polling at the UTXO boundary,
//! cancellation, and post-completion settlement of intermediary locks.

pub mod adapters;
pub mod engine;
pub mod error;
pub mod executor;
pub mod settlement;
pub mod traits;
pub mod watcher;

pub use adapters::MemoryLedger;
pub use engine::{
    EngineConfig, ExecutionOutcome, PaymentConfig, PaymentEngine, StepObserver, StepUpdate,
};
pub use error::{ClientError, EngineError};
pub use executor::StepExecutor;
pub use settlement::{SettlementHandle, SettlementReport};
pub use traits::{
    ClaimReceipt, ClaimRequest, Destination, HeadClient, HeadOutput, LockReceipt, LockRequest,
    OutputKind,
};
pub use watcher::{ConfirmationWatcher, WatcherConfig};
