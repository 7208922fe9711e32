use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use headlock_core::step::PaymentStep;
use headlock_core::types::{HeadId, ParticipantId};

use crate::config::TopologyConfig;
use crate::error::TopologyError;
use crate::head::Head;

/// A validated topology: heads, intermediary identities, and the
/// precomputed payment paths between real users.
///
/// Paths are validated when the topology is built, not searched at
/// runtime, so an invalid route is rejected immediately rather than
/// discovered mid-payment. Immutable once constructed.
#[derive(Debug, Clone)]
pub struct Topology {
    id: String,
    heads: BTreeMap<HeadId, Head>,
    intermediaries: BTreeSet<ParticipantId>,
    paths: BTreeMap<(ParticipantId, ParticipantId), Vec<PaymentStep>>,
}

impl Topology {
    /// Load and validate a topology from a TOML file.
    pub fn load(path: &Path) -> Result<Self, TopologyError> {
        let config = TopologyConfig::load(path)?;
        Self::from_config(config)
    }

    /// Validate a parsed config and build the topology.
    pub fn from_config(config: TopologyConfig) -> Result<Self, TopologyError> {
        if config.heads.is_empty() {
            return Err(TopologyError::NoHeads);
        }

        let mut heads = BTreeMap::new();
        for head in config.heads {
            if heads.contains_key(&head.id) {
                return Err(TopologyError::DuplicateHead(head.id));
            }
            heads.insert(head.id.clone(), head);
        }

        let intermediaries: BTreeSet<ParticipantId> =
            config.intermediaries.into_iter().collect();

        let mut paths = BTreeMap::new();
        for route in config.routes {
            validate_route(&route.from, &route.to, &route.steps, &heads, &intermediaries)?;

            let key = (route.from.clone(), route.to.clone());
            if paths.contains_key(&key) {
                return Err(TopologyError::DuplicateRoute {
                    from: route.from,
                    to: route.to,
                });
            }
            paths.insert(key, route.steps);
        }

        tracing::info!(
            topology = %config.id,
            heads = heads.len(),
            routes = paths.len(),
            "topology loaded"
        );

        Ok(Self {
            id: config.id,
            heads,
            intermediaries,
            paths,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Look up a head by id.
    pub fn head(&self, id: &HeadId) -> Option<&Head> {
        self.heads.get(id)
    }

    /// Iterate over all heads.
    pub fn heads(&self) -> impl Iterator<Item = &Head> {
        self.heads.values()
    }

    /// Whether `user` is a designated intermediary identity.
    pub fn is_intermediary(&self, user: &ParticipantId) -> bool {
        self.intermediaries.contains(user)
    }

    /// Look up the configured path for a (sender, receiver) pair.
    ///
    /// Fails if no path is configured, if the path is empty, or if the
    /// path's first hop does not start at `from_head` or its last hop
    /// does not end at `to_head`. No partial or rewritten paths: a
    /// mismatch is a hard failure.
    pub fn get_path(
        &self,
        from_user: &ParticipantId,
        from_head: &HeadId,
        to_user: &ParticipantId,
        to_head: &HeadId,
    ) -> Result<&[PaymentStep], TopologyError> {
        let key = (from_user.clone(), to_user.clone());
        let steps = self
            .paths
            .get(&key)
            .ok_or_else(|| TopologyError::RouteNotFound {
                from: from_user.clone(),
                to: to_user.clone(),
            })?;

        match (steps.first(), steps.last()) {
            (Some(first), Some(last)) => {
                if first.from.head != *from_head {
                    return Err(TopologyError::SourceHeadMismatch {
                        from: from_user.clone(),
                        to: to_user.clone(),
                        expected: from_head.clone(),
                        found: first.from.head.clone(),
                    });
                }
                if last.to.head != *to_head {
                    return Err(TopologyError::TargetHeadMismatch {
                        from: from_user.clone(),
                        to: to_user.clone(),
                        expected: to_head.clone(),
                        found: last.to.head.clone(),
                    });
                }
                Ok(steps.as_slice())
            }
            _ => Err(TopologyError::EmptyPath {
                from: from_user.clone(),
                to: to_user.clone(),
            }),
        }
    }

    /// Whether this step is initiated by the engine itself rather than
    /// by explicit user action: true iff its sender is an intermediary.
    pub fn is_automated_step(&self, step: &PaymentStep) -> bool {
        self.is_intermediary(&step.from.user)
    }

    /// Whether this step pays an intermediary. Such steps are settled
    /// back once the final hop is claimed.
    pub fn is_intermediary_receiver(&self, step: &PaymentStep) -> bool {
        self.is_intermediary(&step.to.user)
    }

    /// Iterate over all configured routes.
    pub fn routes(
        &self,
    ) -> impl Iterator<Item = (&ParticipantId, &ParticipantId, &[PaymentStep])> {
        self.paths
            .iter()
            .map(|((from, to), steps)| (from, to, steps.as_slice()))
    }
}

/// Structural checks for one configured route.
fn validate_route(
    from: &ParticipantId,
    to: &ParticipantId,
    steps: &[PaymentStep],
    heads: &BTreeMap<HeadId, Head>,
    intermediaries: &BTreeSet<ParticipantId>,
) -> Result<(), TopologyError> {
    if intermediaries.contains(from) {
        return Err(TopologyError::IntermediaryEndpoint(from.clone()));
    }
    if intermediaries.contains(to) {
        return Err(TopologyError::IntermediaryEndpoint(to.clone()));
    }

    if steps.is_empty() {
        return Err(TopologyError::EmptyPath {
            from: from.clone(),
            to: to.clone(),
        });
    }

    for (index, step) in steps.iter().enumerate() {
        if step.from.head != step.to.head {
            return Err(TopologyError::CrossHeadHop {
                from: from.clone(),
                to: to.clone(),
                index,
                a: step.from.head.clone(),
                b: step.to.head.clone(),
            });
        }

        let head = heads
            .get(step.head())
            .ok_or_else(|| TopologyError::UnknownHead {
                from: from.clone(),
                to: to.clone(),
                index,
                head: step.head().clone(),
            })?;

        for party in [&step.from, &step.to] {
            if !head.hosts(&party.user) {
                return Err(TopologyError::ParticipantNotOnHead {
                    user: party.user.clone(),
                    head: head.id.clone(),
                });
            }
        }
    }

    // Non-empty: first/last indexing is safe.
    let first = &steps[0];
    let last = &steps[steps.len() - 1];
    if first.from.user != *from || last.to.user != *to {
        return Err(TopologyError::RouteEndpointMismatch {
            from: from.clone(),
            to: to.clone(),
            first: first.from.user.clone(),
            last: last.to.user.clone(),
        });
    }

    for (index, window) in steps.windows(2).enumerate() {
        if window[0].to.user != window[1].from.user {
            return Err(TopologyError::NotContiguous {
                from: from.clone(),
                to: to.clone(),
                index: index + 1,
                prev_to: window[0].to.user.clone(),
                next_from: window[1].from.user.clone(),
            });
        }
    }

    Ok(())
}
