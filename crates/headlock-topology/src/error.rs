use headlock_core::types::{HeadId, ParticipantId};

/// Errors that can occur within the topology layer.
#[derive(Debug, thiserror::Error)]
pub enum TopologyError {
    #[error("no payment path configured from {from} to {to}")]
    RouteNotFound {
        from: ParticipantId,
        to: ParticipantId,
    },

    #[error("payment path from {from} to {to} is empty")]
    EmptyPath {
        from: ParticipantId,
        to: ParticipantId,
    },

    #[error("path {from}->{to} starts on head {found}, expected {expected}")]
    SourceHeadMismatch {
        from: ParticipantId,
        to: ParticipantId,
        expected: HeadId,
        found: HeadId,
    },

    #[error("path {from}->{to} ends on head {found}, expected {expected}")]
    TargetHeadMismatch {
        from: ParticipantId,
        to: ParticipantId,
        expected: HeadId,
        found: HeadId,
    },

    #[error("topology has no heads")]
    NoHeads,

    #[error("duplicate head id: {0}")]
    DuplicateHead(HeadId),

    #[error("duplicate route: {from}->{to}")]
    DuplicateRoute {
        from: ParticipantId,
        to: ParticipantId,
    },

    #[error("route {from}->{to} hop {index} references unknown head {head}")]
    UnknownHead {
        from: ParticipantId,
        to: ParticipantId,
        index: usize,
        head: HeadId,
    },

    #[error("participant {user} is not hosted on head {head}")]
    ParticipantNotOnHead {
        user: ParticipantId,
        head: HeadId,
    },

    #[error("route {from}->{to} hop {index} crosses heads {a}->{b}")]
    CrossHeadHop {
        from: ParticipantId,
        to: ParticipantId,
        index: usize,
        a: HeadId,
        b: HeadId,
    },

    #[error("route {from}->{to} does not match its hop endpoints {first}->{last}")]
    RouteEndpointMismatch {
        from: ParticipantId,
        to: ParticipantId,
        first: ParticipantId,
        last: ParticipantId,
    },

    #[error(
        "route {from}->{to} breaks at hop {index}: previous hop pays {prev_to} but next hop is sent by {next_from}"
    )]
    NotContiguous {
        from: ParticipantId,
        to: ParticipantId,
        index: usize,
        prev_to: ParticipantId,
        next_from: ParticipantId,
    },

    #[error("route endpoint {0} is a designated intermediary; paths connect real users")]
    IntermediaryEndpoint(ParticipantId),

    #[error("failed to read topology file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse topology file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize topology: {0}")]
    Serialize(#[from] toml::ser::Error),
}
