//! Integration test: the settlement watcher that recovers intermediary
//! funds once the recipient reveals the preimage.

use std::sync::Arc;

use headlock_core::hashlock::{HashLock, Preimage};
use headlock_core::preimage::PreimageStore;
use headlock_engine::{
    ClaimRequest, ExecutionOutcome, HeadClient, MemoryLedger, PaymentConfig, PaymentEngine,
    SettlementReport,
};

use headlock_integration_tests::{
    alice_to_bob_path, amount, fast_engine_config, head, two_head_topology, user,
};

struct Scenario {
    ledger: Arc<MemoryLedger>,
    engine: PaymentEngine,
    store: Arc<PreimageStore>,
}

/// Funded two-head setup: alice and ida each hold one hop's amount.
fn funded_scenario() -> Scenario {
    let topology = two_head_topology();
    let ledger = Arc::new(MemoryLedger::new(Arc::clone(&topology)));
    ledger
        .fund(&head("head-a"), &user("alice"), amount(10))
        .expect("fund alice");
    ledger
        .fund(&head("head-b"), &user("ida"), amount(10))
        .expect("fund ida");

    let store = Arc::new(PreimageStore::new());
    let engine = PaymentEngine::new(
        topology,
        Arc::clone(&ledger) as Arc<dyn HeadClient>,
        Arc::clone(&store),
        fast_engine_config(),
    );

    Scenario {
        ledger,
        engine,
        store,
    }
}

async fn claim_as(
    ledger: &MemoryLedger,
    head_id: &str,
    claimer: &str,
    hash: &HashLock,
    secret: Preimage,
) {
    let outputs = ledger
        .list_outputs(&head(head_id))
        .await
        .expect("snapshot");
    let lock = outputs
        .iter()
        .find(|o| o.is_pending_lock_for(hash, &user(claimer), amount(10)))
        .expect("lock visible");
    ledger
        .submit_claim(ClaimRequest {
            head: head(head_id),
            output: lock.id,
            secret,
            claimer: user(claimer),
        })
        .await
        .expect("claim accepted");
}

// =========================================================================
// Recipient never claims
// =========================================================================

#[tokio::test]
async fn test_settlement_skipped_when_final_lock_unclaimed() {
    let scenario = funded_scenario();
    let record = scenario.store.issue();

    let outcome = scenario
        .engine
        .execute(
            alice_to_bob_path(),
            PaymentConfig::new(amount(10), record.hash),
        )
        .await
        .expect("payment executes");
    let settlement = match outcome {
        ExecutionOutcome::Completed { settlement } => settlement.expect("settlement spawned"),
        other => panic!("expected completion, got {:?}", other),
    };

    // Nobody reveals the secret, so the watch budget runs out.
    let report = settlement.wait().await;
    assert_eq!(
        report,
        SettlementReport::Skipped {
            reason: "final hop not claimed within watch budget".into(),
        }
    );

    // Both locks are untouched: the intermediary's funds stay locked
    // until the timeout, and the recipient was never paid.
    let head_a = scenario
        .ledger
        .list_outputs(&head("head-a"))
        .await
        .expect("snapshot");
    assert!(head_a
        .iter()
        .any(|o| o.is_pending_lock_for(&record.hash, &user("ida"), amount(10))));
    assert_eq!(
        scenario.ledger.balance_of(&head("head-b"), &user("bob")),
        amount(0)
    );
}

// =========================================================================
// Unknown preimage
// =========================================================================

#[tokio::test]
async fn test_no_settlement_without_preimage() {
    let scenario = funded_scenario();
    // The hash comes from outside: this node never stored its secret.
    let secret = Preimage::random();

    let outcome = scenario
        .engine
        .execute(
            alice_to_bob_path(),
            PaymentConfig::new(amount(10), secret.hash()),
        )
        .await
        .expect("payment executes");

    match outcome {
        ExecutionOutcome::Completed { settlement } => {
            assert!(settlement.is_none(), "no secret, nothing to claim with")
        }
        other => panic!("expected completion, got {:?}", other),
    }

    // The final lock sits unclaimed; releasing it is the recipient's
    // problem, not this node's.
    let head_b = scenario
        .ledger
        .list_outputs(&head("head-b"))
        .await
        .expect("snapshot");
    assert!(head_b
        .iter()
        .any(|o| o.is_pending_lock_for(&secret.hash(), &user("bob"), amount(10))));
    assert_eq!(
        scenario.ledger.balance_of(&head("head-b"), &user("bob")),
        amount(0)
    );
}

// =========================================================================
// Intermediary lock already gone
// =========================================================================

#[tokio::test]
async fn test_settlement_counts_missing_intermediary_lock() {
    let scenario = funded_scenario();
    let record = scenario.store.issue();

    let outcome = scenario
        .engine
        .execute(
            alice_to_bob_path(),
            PaymentConfig::new(amount(10), record.hash),
        )
        .await
        .expect("payment executes");
    let settlement = match outcome {
        ExecutionOutcome::Completed { settlement } => settlement.expect("settlement spawned"),
        other => panic!("expected completion, got {:?}", other),
    };

    // The intermediary's wallet races ahead and claims its own incoming
    // lock, then the recipient claims. By the time the watcher moves,
    // there is nothing left for it to do.
    claim_as(&scenario.ledger, "head-a", "ida", &record.hash, record.secret).await;
    claim_as(&scenario.ledger, "head-b", "bob", &record.hash, record.secret).await;

    let report = settlement.wait().await;
    assert_eq!(
        report,
        SettlementReport::Completed {
            claims_submitted: 0,
            claims_failed: 1,
        }
    );

    // The funds were not lost, they just moved outside the watcher.
    assert_eq!(
        scenario.ledger.balance_of(&head("head-a"), &user("ida")),
        amount(10)
    );
    assert_eq!(
        scenario.ledger.balance_of(&head("head-b"), &user("bob")),
        amount(10)
    );
}
