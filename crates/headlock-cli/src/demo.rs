//! Built-in two-head demo topology: alice pays bob through ida.

use headlock_core::step::{PaymentStep, StepParty};
use headlock_core::types::ParticipantId;
use headlock_topology::{Head, RouteConfig, TopologyConfig};

fn hop(from: &str, to: &str, head: &str) -> PaymentStep {
    PaymentStep::new(StepParty::new(from, head), StepParty::new(to, head))
}

/// Two heads bridged by one intermediary: `alice` and `ida` share
/// `head-a`, `ida` and `bob` share `head-b`. Routes run both ways.
pub fn demo_config() -> TopologyConfig {
    TopologyConfig {
        id: "demo".into(),
        heads: vec![
            Head::new("head-a", "Head A")
                .with_participant("alice", "http://localhost:4001")
                .with_participant("ida", "http://localhost:4001"),
            Head::new("head-b", "Head B")
                .with_participant("ida", "http://localhost:4002")
                .with_participant("bob", "http://localhost:4002"),
        ],
        intermediaries: vec![ParticipantId::new("ida")],
        routes: vec![
            RouteConfig {
                from: ParticipantId::new("alice"),
                to: ParticipantId::new("bob"),
                steps: vec![hop("alice", "ida", "head-a"), hop("ida", "bob", "head-b")],
            },
            RouteConfig {
                from: ParticipantId::new("bob"),
                to: ParticipantId::new("alice"),
                steps: vec![hop("bob", "ida", "head-b"), hop("ida", "alice", "head-a")],
            },
        ],
    }
}
