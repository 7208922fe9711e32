//! Headlock topology model.
//!
//! Describes the ledger heads, which participants sit on which head, the
//! designated intermediary identities, and the precomputed payment paths
//! between real users. Pure data plus lookup, no runtime path search.

pub mod config;
pub mod error;
pub mod head;
pub mod topology;

pub use config::{RouteConfig, TopologyConfig};
pub use error::TopologyError;
pub use head::Head;
pub use topology::Topology;
