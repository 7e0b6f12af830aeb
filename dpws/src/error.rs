//! The top-level error surface of the simulator binary.

use crate::config::ConfigError;
use crate::topology::BuildError;
use dpws_core::NetworkError;
use thiserror::Error as ThisError;

/// Anything fatal: configuration violations, construction failures, and
/// network-level failures (bind, connect) surfaced by the run loop. These
/// abort the run with a non-zero exit; there is no partial success.
#[derive(Debug, ThisError)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Build(#[from] BuildError),
    #[error(transparent)]
    Network(#[from] NetworkError),
}
