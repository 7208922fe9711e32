//! `headlock send`: execute a payment end to end on the in-memory ledger.
//!
//! Funds every hop sender, runs the engine, plays the recipient's wallet
//! by claiming the final lock, then waits for settlement and prints the
//! resulting balances.

use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use headlock_core::preimage::{PreimageRecord, PreimageStore};
use headlock_core::step::PaymentStep;
use headlock_core::types::{Amount, HeadId, ParticipantId};
use headlock_engine::{
    ClaimRequest, EngineConfig, ExecutionOutcome, HeadClient, MemoryLedger, PaymentConfig,
    PaymentEngine, SettlementReport, StepObserver, StepUpdate,
};
use headlock_topology::Topology;

use crate::demo::demo_config;

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Sender identity.
    #[arg(long, default_value = "alice")]
    pub from: String,

    /// Recipient identity.
    #[arg(long, default_value = "bob")]
    pub to: String,

    /// Head the sender pays from.
    #[arg(long, default_value = "head-a")]
    pub from_head: String,

    /// Head the recipient collects on.
    #[arg(long, default_value = "head-b")]
    pub to_head: String,

    /// Amount locked at every hop (in atomic units).
    #[arg(short, long, default_value_t = 10)]
    pub amount: u64,

    /// Lock lifetime of the first hop, in minutes.
    #[arg(long, default_value_t = 60.0)]
    pub base_timeout: f64,

    /// Artificial confirmation latency per head, in milliseconds.
    #[arg(long, default_value_t = 0)]
    pub confirm_delay_ms: u64,

    /// Path to the topology file (TOML).
    #[arg(short, long, default_value = "headlock.toml")]
    pub config: PathBuf,

    /// Use the built-in demo topology instead of a file.
    #[arg(long)]
    pub demo: bool,

    /// Print the final payment state as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Prints one line per step status change.
struct PrintObserver;

impl StepObserver for PrintObserver {
    fn on_step_update(&self, update: StepUpdate) {
        match (&update.tx_id, &update.error) {
            (_, Some(error)) => println!("  step {}: {} ({})", update.index, update.status, error),
            (Some(tx), None) => println!("  step {}: {} [{}]", update.index, update.status, tx),
            (None, None) => println!("  step {}: {}", update.index, update.status),
        }
    }
}

pub async fn run(args: &SendArgs) -> anyhow::Result<()> {
    let topology = if args.demo {
        Arc::new(Topology::from_config(demo_config())?)
    } else {
        Arc::new(Topology::load(&args.config)?)
    };

    let from = ParticipantId::new(args.from.clone());
    let to = ParticipantId::new(args.to.clone());
    let from_head = HeadId::new(args.from_head.clone());
    let to_head = HeadId::new(args.to_head.clone());
    let amount = Amount::new(args.amount);

    let path = topology
        .get_path(&from, &from_head, &to, &to_head)?
        .to_vec();

    let ledger = Arc::new(MemoryLedger::new(Arc::clone(&topology)));
    if args.confirm_delay_ms > 0 {
        for head in topology.heads() {
            ledger.set_confirmation_delay(
                head.id.clone(),
                Duration::from_millis(args.confirm_delay_ms),
            );
        }
    }

    // Every hop sender needs funds on its head before it can lock.
    for step in &path {
        ledger.fund(step.head(), &step.from.user, amount)?;
    }

    let store = Arc::new(PreimageStore::new());
    let record = store.issue();

    let mut payment = PaymentConfig::new(amount, record.hash);
    payment.base_timeout_minutes = args.base_timeout;

    let engine = PaymentEngine::new(
        Arc::clone(&topology),
        Arc::clone(&ledger) as Arc<dyn HeadClient>,
        Arc::clone(&store),
        EngineConfig::default(),
    );

    println!(
        "Sending {} from {}@{} to {}@{} ({} hops)",
        amount,
        from,
        from_head,
        to,
        to_head,
        path.len()
    );

    let observer = PrintObserver;
    let outcome = engine
        .execute_with_observer(path.clone(), payment, Some(&observer))
        .await?;

    match outcome {
        ExecutionOutcome::Cancelled { next_step } => {
            println!("Payment cancelled before step {}", next_step);
        }
        ExecutionOutcome::Completed { settlement } => {
            println!("All hops locked.");

            // Play the recipient's wallet: claim the final lock, which
            // reveals the secret and unblocks settlement.
            claim_final_lock(ledger.as_ref(), &path, &record, amount).await?;
            println!("{} claimed the final lock on {}", to, to_head);

            match settlement {
                Some(handle) => match handle.wait().await {
                    SettlementReport::Completed {
                        claims_submitted,
                        claims_failed,
                    } => {
                        println!(
                            "Settlement: {} intermediary claims submitted, {} failed",
                            claims_submitted, claims_failed
                        );
                    }
                    SettlementReport::Skipped { reason } => {
                        println!("Settlement skipped: {}", reason);
                    }
                },
                None => println!("No settlement task (no preimage on record)."),
            }

            store.mark_used(&record.hash)?;
        }
    }

    println!();
    println!("Final balances:");
    for (head, user) in parties_in_path_order(&path) {
        println!("  {}@{}: {}", user, head, ledger.balance_of(&head, &user));
    }

    if args.json {
        if let Some(state) = engine.state_snapshot() {
            println!();
            println!("{}", serde_json::to_string_pretty(&state)?);
        }
    }

    Ok(())
}

async fn claim_final_lock(
    ledger: &MemoryLedger,
    path: &[PaymentStep],
    record: &PreimageRecord,
    amount: Amount,
) -> anyhow::Result<()> {
    let final_step = path
        .last()
        .ok_or_else(|| anyhow::anyhow!("payment path is empty"))?;

    let outputs = ledger.list_outputs(final_step.head()).await?;
    let lock = outputs
        .iter()
        .find(|o| o.is_pending_lock_for(&record.hash, &final_step.to.user, amount))
        .ok_or_else(|| anyhow::anyhow!("final lock not visible on {}", final_step.head()))?;

    ledger
        .submit_claim(ClaimRequest {
            head: final_step.head().clone(),
            output: lock.id,
            secret: record.secret,
            claimer: final_step.to.user.clone(),
        })
        .await?;
    Ok(())
}

/// Distinct (head, user) pairs touched by the path, in path order.
fn parties_in_path_order(path: &[PaymentStep]) -> Vec<(HeadId, ParticipantId)> {
    let mut seen = Vec::new();
    for step in path {
        for party in [&step.from, &step.to] {
            let pair = (party.head.clone(), party.user.clone());
            if !seen.contains(&pair) {
                seen.push(pair);
            }
        }
    }
    seen
}
