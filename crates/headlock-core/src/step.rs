use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::{HeadId, ParticipantId};

/// One endpoint of a hop: a participant on a specific head.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepParty {
    pub user: ParticipantId,
    pub head: HeadId,
}

impl StepParty {
    pub fn new(user: impl Into<String>, head: impl Into<String>) -> Self {
        Self {
            user: ParticipantId::new(user),
            head: HeadId::new(head),
        }
    }
}

impl fmt::Display for StepParty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.user, self.head)
    }
}

/// One hop of a payment path: a hash-locked transfer between two
/// participants of the same head.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentStep {
    pub from: StepParty,
    pub to: StepParty,
}

impl PaymentStep {
    pub fn new(from: StepParty, to: StepParty) -> Self {
        Self { from, to }
    }

    /// The head this hop settles on. Both parties sit on the same head;
    /// topology validation enforces it.
    pub fn head(&self) -> &HeadId {
        &self.from.head
    }
}

impl fmt::Display for PaymentStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.from, self.to)
    }
}
