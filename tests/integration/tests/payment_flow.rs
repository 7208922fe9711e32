//! Integration test: multi-hop payments driven end to end through the
//! engine, the topology, and the in-memory ledger.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use headlock_core::hashlock::{HashLock, Preimage};
use headlock_core::preimage::PreimageStore;
use headlock_core::step_state::StepStatus;
use headlock_core::types::{HeadId, OutputId, TxId};
use headlock_engine::{
    ClaimReceipt, ClaimRequest, ClientError, EngineError, ExecutionOutcome, HeadClient, HeadOutput,
    LockReceipt, LockRequest, MemoryLedger, OutputKind, PaymentConfig, PaymentEngine,
    SettlementReport, StepObserver, StepUpdate,
};
use headlock_topology::TopologyError;

use headlock_integration_tests::{
    alice_to_bob_path, amount, fast_engine_config, head, two_head_topology, user,
    RecordingObserver,
};

fn engine_on(client: Arc<dyn HeadClient>, store: Arc<PreimageStore>) -> PaymentEngine {
    PaymentEngine::new(two_head_topology(), client, store, fast_engine_config())
}

// =========================================================================
// Full payment: alice -> ida -> bob across two heads
// =========================================================================

#[tokio::test]
async fn test_two_hop_payment_end_to_end() {
    let topology = two_head_topology();
    let ledger = Arc::new(MemoryLedger::new(Arc::clone(&topology)));
    let store = Arc::new(PreimageStore::new());
    let record = store.issue();

    // Each hop sender holds exactly the hop amount.
    ledger
        .fund(&head("head-a"), &user("alice"), amount(10))
        .expect("fund alice");
    ledger
        .fund(&head("head-b"), &user("ida"), amount(10))
        .expect("fund ida");

    let engine = PaymentEngine::new(
        topology,
        Arc::clone(&ledger) as Arc<dyn HeadClient>,
        Arc::clone(&store),
        fast_engine_config(),
    );

    let observer = RecordingObserver::new();
    let outcome = engine
        .execute_with_observer(
            alice_to_bob_path(),
            PaymentConfig::new(amount(10), record.hash),
            Some(&observer),
        )
        .await
        .expect("payment executes");

    let settlement = match outcome {
        ExecutionOutcome::Completed { settlement } => {
            settlement.expect("preimage known, settlement spawned")
        }
        other => panic!("expected completion, got {:?}", other),
    };

    // Both steps went in-progress then completed, in order.
    assert_eq!(
        observer.statuses_for(0),
        vec![StepStatus::InProgress, StepStatus::Completed]
    );
    assert_eq!(
        observer.statuses_for(1),
        vec![StepStatus::InProgress, StepStatus::Completed]
    );

    let state = engine.state_snapshot().expect("state recorded");
    assert!(!state.is_executing);
    assert_eq!(state.current_step_index, Some(1));
    assert_eq!(state.completed_count(), 2);
    assert!(state.steps.iter().all(|s| s.tx_id.is_some()));

    // The recipient's wallet claims the final lock with the secret.
    let outputs = ledger
        .list_outputs(&head("head-b"))
        .await
        .expect("snapshot");
    let final_lock = outputs
        .iter()
        .find(|o| o.is_pending_lock_for(&record.hash, &user("bob"), amount(10)))
        .expect("final lock visible");
    ledger
        .submit_claim(ClaimRequest {
            head: head("head-b"),
            output: final_lock.id,
            secret: record.secret,
            claimer: user("bob"),
        })
        .await
        .expect("bob claims");

    let report = settlement.wait().await;
    assert_eq!(
        report,
        SettlementReport::Completed {
            claims_submitted: 1,
            claims_failed: 0,
        }
    );

    // Funds moved one hop each: alice paid, ida was made whole on
    // head-a, bob collected on head-b.
    assert_eq!(ledger.balance_of(&head("head-a"), &user("alice")), amount(0));
    assert_eq!(ledger.balance_of(&head("head-a"), &user("ida")), amount(10));
    assert_eq!(ledger.balance_of(&head("head-b"), &user("ida")), amount(0));
    assert_eq!(ledger.balance_of(&head("head-b"), &user("bob")), amount(10));
}

// =========================================================================
// Unconfigured direction fails fast
// =========================================================================

#[tokio::test]
async fn test_reverse_route_not_configured() {
    let topology = two_head_topology();

    let result = topology.get_path(&user("bob"), &head("head-b"), &user("alice"), &head("head-a"));
    assert!(matches!(
        result,
        Err(TopologyError::RouteNotFound { .. })
    ));

    // No engine state is created for a payment that never started.
    let ledger = Arc::new(MemoryLedger::new(Arc::clone(&topology)));
    let engine = PaymentEngine::new(
        topology,
        ledger as Arc<dyn HeadClient>,
        Arc::new(PreimageStore::new()),
        fast_engine_config(),
    );
    assert!(engine.state_snapshot().is_none());
}

// =========================================================================
// Confirmation timeout aborts the payment
// =========================================================================

/// Accepts every lock but never shows any output.
struct BlindClient {
    locks: AtomicU32,
    queries: AtomicU32,
}

impl BlindClient {
    fn new() -> Self {
        Self {
            locks: AtomicU32::new(0),
            queries: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl HeadClient for BlindClient {
    async fn submit_lock(&self, _request: LockRequest) -> Result<LockReceipt, ClientError> {
        let n = self.locks.fetch_add(1, Ordering::SeqCst);
        Ok(LockReceipt {
            tx_id: Some(TxId::new(format!("tx-{}", n))),
        })
    }

    async fn list_outputs(&self, _head: &HeadId) -> Result<Vec<HeadOutput>, ClientError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        Ok(Vec::new())
    }

    async fn submit_claim(&self, _request: ClaimRequest) -> Result<ClaimReceipt, ClientError> {
        Err(ClientError::Transport("no claims expected".into()))
    }
}

#[tokio::test]
async fn test_unconfirmed_step_aborts_payment() {
    let client = Arc::new(BlindClient::new());
    let engine = engine_on(
        Arc::clone(&client) as Arc<dyn HeadClient>,
        Arc::new(PreimageStore::new()),
    );
    let secret = Preimage::random();

    let result = engine
        .execute(
            alice_to_bob_path(),
            PaymentConfig::new(amount(10), secret.hash()),
        )
        .await;

    let error = result.expect_err("payment must abort");
    assert!(matches!(error, EngineError::StepUnconfirmed { index: 0 }));
    assert!(error.to_string().contains("not confirmed in time"));

    // The watcher polled exactly its budget, and only the first lock was
    // ever submitted.
    assert_eq!(
        client.queries.load(Ordering::SeqCst),
        fast_engine_config().watcher.open_attempts
    );
    assert_eq!(client.locks.load(Ordering::SeqCst), 1);

    let state = engine.state_snapshot().expect("state recorded");
    assert!(!state.is_executing);
    // The submitted step keeps its lock record; only the payment as a
    // whole is aborted.
    assert_eq!(state.steps[0].status, StepStatus::Completed);
    assert_eq!(state.steps[1].status, StepStatus::Pending);
}

// =========================================================================
// Retry bound
// =========================================================================

/// Refuses every lock submission.
struct RefusingClient {
    locks: AtomicU32,
}

#[async_trait]
impl HeadClient for RefusingClient {
    async fn submit_lock(&self, _request: LockRequest) -> Result<LockReceipt, ClientError> {
        self.locks.fetch_add(1, Ordering::SeqCst);
        Err(ClientError::Transport("connection refused".into()))
    }

    async fn list_outputs(&self, _head: &HeadId) -> Result<Vec<HeadOutput>, ClientError> {
        Ok(Vec::new())
    }

    async fn submit_claim(&self, _request: ClaimRequest) -> Result<ClaimReceipt, ClientError> {
        Err(ClientError::Transport("no claims expected".into()))
    }
}

#[tokio::test]
async fn test_retry_bound_and_status_sequence() {
    let client = Arc::new(RefusingClient {
        locks: AtomicU32::new(0),
    });
    let engine = engine_on(
        Arc::clone(&client) as Arc<dyn HeadClient>,
        Arc::new(PreimageStore::new()),
    );
    let secret = Preimage::random();

    let observer = RecordingObserver::new();
    let result = engine
        .execute_with_observer(
            alice_to_bob_path(),
            PaymentConfig::new(amount(10), secret.hash()),
            Some(&observer),
        )
        .await;

    match result.expect_err("payment must fail") {
        EngineError::StepFailed {
            index,
            attempts,
            last_error,
        } => {
            assert_eq!(index, 0);
            assert_eq!(attempts, 4);
            assert!(last_error.contains("connection refused"));
        }
        other => panic!("expected StepFailed, got {:?}", other),
    }

    // One initial attempt plus max_retries, then terminal failure.
    assert_eq!(client.locks.load(Ordering::SeqCst), 4);
    assert_eq!(
        observer.statuses_for(0),
        vec![
            StepStatus::InProgress,
            StepStatus::Retrying,
            StepStatus::Retrying,
            StepStatus::Retrying,
            StepStatus::Failed,
        ]
    );
    assert!(observer.statuses_for(1).is_empty());

    let state = engine.state_snapshot().expect("state recorded");
    assert_eq!(state.steps[0].retry_count, 3);
    assert_eq!(state.steps[1].status, StepStatus::Pending);
}

// =========================================================================
// Confirm-then-advance ordering
// =========================================================================

/// Scripted head: the first lock becomes visible on the third query.
/// Records every call so the test can assert ordering.
struct ScriptedHead {
    hash: HashLock,
    head_a_queries: AtomicU32,
    events: Mutex<Vec<String>>,
}

impl ScriptedHead {
    fn new(hash: HashLock) -> Self {
        Self {
            hash,
            head_a_queries: AtomicU32::new(0),
            events: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl HeadClient for ScriptedHead {
    async fn submit_lock(&self, request: LockRequest) -> Result<LockReceipt, ClientError> {
        self.events
            .lock()
            .unwrap()
            .push(format!("lock:{}", request.head));
        Ok(LockReceipt {
            tx_id: Some(TxId::new("tx")),
        })
    }

    async fn list_outputs(&self, head: &HeadId) -> Result<Vec<HeadOutput>, ClientError> {
        self.events.lock().unwrap().push(format!("list:{}", head));
        if head.as_str() == "head-a" {
            let query = self.head_a_queries.fetch_add(1, Ordering::SeqCst) + 1;
            if query >= 3 {
                return Ok(vec![HeadOutput {
                    id: OutputId::new(),
                    kind: OutputKind::HashLocked,
                    amount: amount(10),
                    hash: Some(self.hash),
                    receiver: Some(user("ida")),
                }]);
            }
        }
        Ok(Vec::new())
    }

    async fn submit_claim(&self, _request: ClaimRequest) -> Result<ClaimReceipt, ClientError> {
        Err(ClientError::Transport("no claims expected".into()))
    }
}

#[tokio::test]
async fn test_second_hop_waits_for_first_lock() {
    let secret = Preimage::random();
    let client = Arc::new(ScriptedHead::new(secret.hash()));
    let engine = engine_on(
        Arc::clone(&client) as Arc<dyn HeadClient>,
        Arc::new(PreimageStore::new()),
    );

    let outcome = engine
        .execute(
            alice_to_bob_path(),
            PaymentConfig::new(amount(10), secret.hash()),
        )
        .await
        .expect("payment executes");
    assert!(matches!(outcome, ExecutionOutcome::Completed { .. }));

    // The second hop's lock is only submitted after the first hop's lock
    // was observed: twice, in fact, once by the confirm-then-advance
    // wait and once by the intermediary's own funding check.
    let events = client.events.lock().unwrap().clone();
    assert_eq!(
        events,
        vec![
            "lock:head-a".to_string(),
            "list:head-a".to_string(),
            "list:head-a".to_string(),
            "list:head-a".to_string(),
            "list:head-a".to_string(),
            "lock:head-b".to_string(),
        ]
    );
}

// =========================================================================
// Cancellation between steps
// =========================================================================

/// Cancels the engine as soon as the first step completes.
struct CancelOnFirstComplete {
    engine: Arc<PaymentEngine>,
}

impl StepObserver for CancelOnFirstComplete {
    fn on_step_update(&self, update: StepUpdate) {
        if update.index == 0 && update.status == StepStatus::Completed {
            self.engine.cancel();
        }
    }
}

#[tokio::test]
async fn test_cancel_between_steps_leaves_rest_pending() {
    let topology = two_head_topology();
    let ledger = Arc::new(MemoryLedger::new(Arc::clone(&topology)));
    ledger
        .fund(&head("head-a"), &user("alice"), amount(10))
        .expect("fund alice");

    let secret = Preimage::random();
    let engine = Arc::new(PaymentEngine::new(
        topology,
        Arc::clone(&ledger) as Arc<dyn HeadClient>,
        Arc::new(PreimageStore::new()),
        fast_engine_config(),
    ));

    let observer = CancelOnFirstComplete {
        engine: Arc::clone(&engine),
    };
    let outcome = engine
        .execute_with_observer(
            alice_to_bob_path(),
            PaymentConfig::new(amount(10), secret.hash()),
            Some(&observer),
        )
        .await
        .expect("cancellation is not an error");

    assert!(matches!(
        outcome,
        ExecutionOutcome::Cancelled { next_step: 1 }
    ));

    let state = engine.state_snapshot().expect("state recorded");
    assert!(!state.is_executing);
    assert_eq!(state.steps[0].status, StepStatus::Completed);
    assert_eq!(state.steps[1].status, StepStatus::Pending);

    // The second hop was never funded or submitted.
    assert!(ledger
        .list_outputs(&head("head-b"))
        .await
        .expect("snapshot")
        .is_empty());
}
