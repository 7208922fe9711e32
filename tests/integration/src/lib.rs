//! Shared fixtures for the end-to-end payment tests.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use headlock_core::step::{PaymentStep, StepParty};
use headlock_core::step_state::StepStatus;
use headlock_core::types::{Amount, HeadId, ParticipantId};
use headlock_engine::{EngineConfig, StepObserver, StepUpdate, WatcherConfig};
use headlock_topology::{Head, RouteConfig, Topology, TopologyConfig};

pub fn hop(from: &str, to: &str, head: &str) -> PaymentStep {
    PaymentStep::new(StepParty::new(from, head), StepParty::new(to, head))
}

pub fn user(name: &str) -> ParticipantId {
    ParticipantId::new(name)
}

pub fn head(id: &str) -> HeadId {
    HeadId::new(id)
}

pub fn amount(value: u64) -> Amount {
    Amount::new(value)
}

/// Path of the configured route: alice -> ida on head-a, ida -> bob on
/// head-b.
pub fn alice_to_bob_path() -> Vec<PaymentStep> {
    vec![hop("alice", "ida", "head-a"), hop("ida", "bob", "head-b")]
}

/// Two heads bridged by the intermediary `ida`, with a single route
/// alice -> bob. The reverse direction is deliberately not configured.
pub fn two_head_topology() -> Arc<Topology> {
    let config = TopologyConfig {
        id: "itest".into(),
        heads: vec![
            Head::new("head-a", "Head A")
                .with_participant("alice", "http://localhost:4001")
                .with_participant("ida", "http://localhost:4001"),
            Head::new("head-b", "Head B")
                .with_participant("ida", "http://localhost:4002")
                .with_participant("bob", "http://localhost:4002"),
        ],
        intermediaries: vec![user("ida")],
        routes: vec![RouteConfig {
            from: user("alice"),
            to: user("bob"),
            steps: alice_to_bob_path(),
        }],
    };
    Arc::new(Topology::from_config(config).expect("fixture topology validates"))
}

/// Engine config with millisecond-scale polling so tests finish fast.
pub fn fast_engine_config() -> EngineConfig {
    EngineConfig {
        max_retries: 3,
        retry_delay: Duration::from_millis(1),
        watcher: WatcherConfig {
            poll_interval: Duration::from_millis(2),
            open_attempts: 25,
            claim_attempts: 100,
            claim_grace: Duration::from_millis(2),
        },
    }
}

/// Records every step update it receives.
#[derive(Default)]
pub struct RecordingObserver {
    updates: Mutex<Vec<StepUpdate>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn updates(&self) -> Vec<StepUpdate> {
        self.updates.lock().unwrap().clone()
    }

    pub fn statuses_for(&self, index: usize) -> Vec<StepStatus> {
        self.updates
            .lock()
            .unwrap()
            .iter()
            .filter(|u| u.index == index)
            .map(|u| u.status)
            .collect()
    }
}

impl StepObserver for RecordingObserver {
    fn on_step_update(&self, update: StepUpdate) {
        self.updates.lock().unwrap().push(update);
    }
}
