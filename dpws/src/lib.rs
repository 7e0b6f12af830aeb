//! The distributed pulse-wave simulator.
//!
//! DPWS drives coordinated pulse-wave DDoS scenarios on top of the
//! deterministic discrete-event kernel in `dpws-core`. Operators describe an
//! internet-like topology and an attack campaign in a YAML file; the
//! simulator instantiates a randomized transit mesh with per-AS star
//! networks, places servers, benign clients, and attackers, and runs the
//! campaign to produce per-link packet captures and timing statistics.
//!
//! The pulse wave itself comes from composition: every attacker runs one
//! retargetable On/Off source per attack vector, all sources share one
//! derived [`schedule::AttackSchedule`], and chained retargets walk each
//! source across the target list so that each (vector, target) pair owns a
//! disjoint slice of a repeating cycle.

pub mod addressing;
pub mod applications;
pub mod cli;
pub mod config;
pub mod error;
pub mod mapper;
pub mod nodes;
pub mod partition;
pub mod schedule;
pub mod simulation;
pub mod topology;

pub use config::Configuration;
pub use error::Error;
pub use schedule::AttackSchedule;
pub use simulation::{Dpws, RunOptions};
