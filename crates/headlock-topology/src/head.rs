use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use headlock_core::types::{HeadId, ParticipantId};

/// One ledger head: an identifier, a human-readable name, and the
/// participants it hosts with their connection endpoints.
///
/// Static, loaded at startup, immutable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Head {
    /// Unique identifier of this head.
    pub id: HeadId,
    /// Human-readable name.
    #[serde(default)]
    pub name: String,
    /// Participants hosted on this head, keyed by name, with their
    /// connection endpoints.
    #[serde(default)]
    pub participants: BTreeMap<ParticipantId, String>,
}

impl Head {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: HeadId::new(id),
            name: name.into(),
            participants: BTreeMap::new(),
        }
    }

    /// Register a participant with its connection endpoint.
    pub fn with_participant(
        mut self,
        user: impl Into<String>,
        endpoint: impl Into<String>,
    ) -> Self {
        self.participants
            .insert(ParticipantId::new(user), endpoint.into());
        self
    }

    /// Whether `user` is hosted on this head.
    pub fn hosts(&self, user: &ParticipantId) -> bool {
        self.participants.contains_key(user)
    }

    /// Connection endpoint of `user` on this head, if hosted.
    pub fn endpoint_of(&self, user: &ParticipantId) -> Option<&str> {
        self.participants.get(user).map(String::as_str)
    }
}
