//! Static assignment of the topology to parallel workers.
//!
//! Every worker executes the full construction code so that all workers share
//! an identical picture of the topology and event times; only application
//! installation is gated on ownership. Worker 0 always owns the transit
//! network (it is also the only worker that writes transit captures), and the
//! AS overflow deliberately lands on worker 0 too, whose capture workload is
//! assumed lighter than traffic generation.

use dpws_core::Internet;
use rustc_hash::FxHasher;
use std::hash::{Hash, Hasher};

/// The worker-to-partition assignment for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionPlan {
    workers: u32,
    as_ranks: Vec<u32>,
}

impl PartitionPlan {
    pub fn new(workers: u32, num_ases: usize) -> Self {
        let workers = workers.max(1);
        let as_ranks = (0..num_ases)
            .map(|index| {
                let rank = index as u32 + 1;
                if num_ases as u32 + 1 <= workers {
                    rank
                } else {
                    rank % workers
                }
            })
            .collect();
        Self { workers, as_ranks }
    }

    pub fn workers(&self) -> u32 {
        self.workers
    }

    /// The transit network always belongs to worker 0.
    pub fn transit_rank(&self) -> u32 {
        0
    }

    pub fn as_rank(&self, as_index: usize) -> u32 {
        self.as_ranks[as_index]
    }

    pub fn owns_transit(&self, rank: u32) -> bool {
        rank == self.transit_rank()
    }

    pub fn owns_as(&self, rank: u32, as_index: usize) -> bool {
        rank == self.as_rank(as_index)
    }
}

/// Hashes the constructed topology: node labels, interface addresses, and the
/// link adjacency list. Every worker must compute the same value, which is
/// what makes the partitioned execution sound.
pub fn topology_fingerprint(internet: &Internet) -> u64 {
    let mut hasher = FxHasher::default();
    for node in 0..internet.node_count() {
        internet.node_label(node).hash(&mut hasher);
        for interface in internet.node_interfaces(node) {
            interface.link.hash(&mut hasher);
            interface.address.to_u32().hash(&mut hasher);
        }
    }
    for link in 0..internet.link_count() {
        internet.link(link).endpoints().hash(&mut hasher);
    }
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enough_workers_get_one_as_each() {
        // W=3, A=2: worker 0 owns transit, worker 1 owns AS 0, worker 2 AS 1
        let plan = PartitionPlan::new(3, 2);
        assert_eq!(plan.transit_rank(), 0);
        assert_eq!(plan.as_rank(0), 1);
        assert_eq!(plan.as_rank(1), 2);
        assert!(plan.owns_as(1, 0));
        assert!(!plan.owns_as(2, 0));
    }

    #[test]
    fn overflow_wraps_onto_worker_zero_first() {
        // W=3, A=4: ranks cycle 1, 2, 0, 1 so worker 0 takes the overflow
        let plan = PartitionPlan::new(3, 4);
        assert_eq!(plan.as_rank(0), 1);
        assert_eq!(plan.as_rank(1), 2);
        assert_eq!(plan.as_rank(2), 0);
        assert_eq!(plan.as_rank(3), 1);
    }

    #[test]
    fn single_worker_owns_everything() {
        let plan = PartitionPlan::new(1, 3);
        assert!(plan.owns_transit(0));
        for index in 0..3 {
            assert_eq!(plan.as_rank(index), 0);
            assert!(plan.owns_as(0, index));
        }
    }

    #[test]
    fn each_as_has_exactly_one_owner() {
        let plan = PartitionPlan::new(4, 7);
        for index in 0..7 {
            let owners = (0..plan.workers())
                .filter(|&rank| plan.owns_as(rank, index))
                .count();
            assert_eq!(owners, 1);
        }
    }
}
