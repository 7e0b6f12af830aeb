//! Topology construction: the transit partial mesh and the per-AS stars.

pub mod autonomous_system;
pub mod central_network;

pub use autonomous_system::AutonomousSystem;
pub use central_network::CentralNetwork;

use crate::addressing::AddressError;
use dpws_core::NetworkError;
use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum BuildError {
    #[error("the central network needs at least two nodes, found {count}")]
    TooFewTransitNodes { count: usize },
    #[error("AS {autonomous_system:?} needs at least one host besides the gateway")]
    EmptyAutonomousSystem { autonomous_system: String },
    #[error("AS {autonomous_system:?} has no free slot left for node {node:?}")]
    SlotsExhausted {
        autonomous_system: String,
        node: String,
    },
    #[error("attempt to connect AS {autonomous_system:?} to unknown central network node {node:?}")]
    UnknownAttachmentNode {
        autonomous_system: String,
        node: String,
    },
    #[error(transparent)]
    Address(#[from] AddressError),
    #[error(transparent)]
    Network(#[from] NetworkError),
    #[error("failed to create capture file: {0}")]
    Capture(#[from] std::io::Error),
}
