//! Topology configuration loading.

use serde::{Deserialize, Serialize};
use std::path::Path;

use headlock_core::step::PaymentStep;
use headlock_core::types::ParticipantId;

use crate::error::TopologyError;
use crate::head::Head;

/// On-disk topology description (TOML).
///
/// Parsed verbatim; structural validation happens when the config is
/// turned into a [`Topology`](crate::Topology).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TopologyConfig {
    /// Identifier of the topology.
    #[serde(default = "default_id")]
    pub id: String,

    /// The ledger heads.
    #[serde(default)]
    pub heads: Vec<Head>,

    /// Participant names designated as intermediaries.
    #[serde(default)]
    pub intermediaries: Vec<ParticipantId>,

    /// Precomputed payment routes between real users.
    #[serde(default)]
    pub routes: Vec<RouteConfig>,
}

/// One configured route: the ordered hops from `from` to `to`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteConfig {
    pub from: ParticipantId,
    pub to: ParticipantId,
    #[serde(default)]
    pub steps: Vec<PaymentStep>,
}

fn default_id() -> String {
    "default".into()
}

impl TopologyConfig {
    /// Load a topology config from a TOML file.
    pub fn load(path: &Path) -> Result<Self, TopologyError> {
        let contents = std::fs::read_to_string(path)?;
        let config: TopologyConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save the config to a TOML file.
    pub fn save(&self, path: &Path) -> Result<(), TopologyError> {
        let contents = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, contents)?;
        Ok(())
    }
}
