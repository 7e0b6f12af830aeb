//! The randomized partial-mesh transit network.
//!
//! Connectivity and redundancy are both controlled by the configured seed, so
//! every worker derives the same physical topology. Construction runs in two
//! stages: a random spanning draw that guarantees connectivity, then a
//! redundancy stage that layers extra links on top, up to (or past) a full
//! mesh.

use crate::addressing::SubnetAllocator;
use crate::config::CentralNetworkConfig;
use crate::topology::BuildError;
use dpws_core::{Internet, LinkId, NodeId};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rustc_hash::FxHashMap;
use std::path::{Path, PathBuf};

/// One constructed transit link, as indices into the transit node list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct TransitLink {
    link: LinkId,
    first: usize,
    second: usize,
}

pub struct CentralNetwork {
    node_ids: Vec<String>,
    nodes: Vec<NodeId>,
    links: Vec<TransitLink>,
    spanning_count: usize,
    index_by_id: FxHashMap<String, usize>,
}

impl CentralNetwork {
    /// Draws the topology from the seed and materializes it.
    pub fn build(config: &CentralNetworkConfig, internet: &mut Internet) -> Result<Self, BuildError> {
        let count = config.nodes.len();
        // point-to-point mechanics need two endpoints, and a lone transit
        // node would leave every lookup a special case
        if count < 2 {
            return Err(BuildError::TooFewTransitNodes { count });
        }

        let mut rng = SmallRng::seed_from_u64(config.topology_seed);
        let spanning = spanning_draw(&mut rng, count);
        let extra = redundancy_draw(&mut rng, count, config.degree_of_redundancy);

        let node_ids: Vec<String> = config.nodes.iter().map(|node| node.id.clone()).collect();
        let index_by_id = node_ids
            .iter()
            .enumerate()
            .map(|(index, id)| (id.clone(), index))
            .collect();
        let nodes: Vec<NodeId> = node_ids
            .iter()
            .map(|id| internet.add_node(id.clone()))
            .collect();

        let mut pool = SubnetAllocator::new(config.network_address, config.network_mask);
        let spanning_count = spanning.len();
        let mut links = Vec::with_capacity(spanning.len() + extra.len());
        for (first, second) in spanning.into_iter().chain(extra) {
            let link = internet.connect(
                nodes[first],
                nodes[second],
                config.bandwidth,
                config.delay,
            );
            // each link in its own subnet, first endpoint .1, second .2
            let mut subnet = pool.reserve_subnet()?;
            internet.assign_address(nodes[first], link, subnet.allocate_host()?)?;
            internet.assign_address(nodes[second], link, subnet.allocate_host()?)?;
            links.push(TransitLink {
                link,
                first,
                second,
            });
        }

        Ok(Self {
            node_ids,
            nodes,
            links,
            spanning_count,
            index_by_id,
        })
    }

    pub fn node_by_id(&self, id: &str) -> Option<NodeId> {
        self.index_by_id.get(id).map(|&index| self.nodes[index])
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    /// All constructed connections as node-index pairs, spanning draw first.
    pub fn connections(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.links.iter().map(|link| (link.first, link.second))
    }

    pub fn spanning_connections(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.links[..self.spanning_count]
            .iter()
            .map(|link| (link.first, link.second))
    }

    pub fn redundant_connections(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.links[self.spanning_count..]
            .iter()
            .map(|link| (link.first, link.second))
    }

    /// Starts a capture on both directed endpoints of every transit link.
    /// Files are labeled `<prefix>__<src>-to-<dst>____` plus the node and
    /// device indices the kernel appends.
    pub fn enable_capture(
        &self,
        internet: &mut Internet,
        directory: &Path,
        prefix: &str,
    ) -> Result<Vec<PathBuf>, BuildError> {
        let mut created = Vec::with_capacity(self.links.len() * 2);
        for transit_link in &self.links {
            for (from, to) in [
                (transit_link.first, transit_link.second),
                (transit_link.second, transit_link.first),
            ] {
                let node = self.nodes[from];
                let device = internet
                    .device_index(transit_link.link, node)
                    .unwrap_or_default();
                let name = format!(
                    "{prefix}__{}-to-{}____{}-{}.pcap",
                    self.node_ids[from], self.node_ids[to], node, device
                );
                let path = directory.join(name);
                internet.enable_capture(transit_link.link, node, &path)?;
                created.push(path);
            }
        }
        Ok(created)
    }

    /// Dumps the drawn topology so a run can be reproduced and interpreted.
    pub fn print_topology(&self) {
        println!("-------------------------------------------------------");
        println!("Central Network Topology:");
        println!(
            "\tMinimal Topology Connections: ({})",
            self.spanning_count
        );
        let spanning: Vec<String> = self
            .spanning_connections()
            .map(|(first, second)| format!("({}, {})", self.node_ids[first], self.node_ids[second]))
            .collect();
        println!("\t\t{}", spanning.join(" "));
        println!(
            "Additional Redundant Connections: ({})",
            self.links.len() - self.spanning_count
        );
        let redundant: Vec<String> = self
            .redundant_connections()
            .map(|(first, second)| format!("({}, {})", self.node_ids[first], self.node_ids[second]))
            .collect();
        println!("\t\t{}", redundant.join(" "));
        println!("-------------------------------------------------------");
    }
}

/// Stage A: draw a random spanning set. `drawn` and `not_drawn` partition the
/// indices; each iteration links a uniformly drawn member of `drawn` to a
/// uniformly drawn member of `not_drawn`, with the very first draw accepted
/// unconditionally. Uniformity comes from rejection sampling over the full
/// index range.
fn spanning_draw(rng: &mut SmallRng, count: usize) -> Vec<(usize, usize)> {
    let mut drawn = vec![false; count];
    let mut drawn_any = false;
    let mut pairs = Vec::with_capacity(count - 1);

    for _ in 0..count - 1 {
        let first = loop {
            let candidate = rng.gen_range(0..count);
            if !drawn_any {
                drawn[candidate] = true;
                drawn_any = true;
                break candidate;
            }
            if drawn[candidate] {
                break candidate;
            }
        };
        let second = loop {
            let candidate = rng.gen_range(0..count);
            if !drawn[candidate] {
                break candidate;
            }
        };
        drawn[second] = true;
        pairs.push((first, second));
    }
    pairs
}

/// Stage B: `⌊(full_mesh − (N−1)) · degree⌋` additional pairs drawn uniformly
/// with only self-loops rejected. Duplicates are allowed and become parallel
/// links.
fn redundancy_draw(rng: &mut SmallRng, count: usize, degree: f64) -> Vec<(usize, usize)> {
    let full_mesh = count * (count - 1) / 2;
    let beyond_spanning = full_mesh - (count - 1);
    let additional = (beyond_spanning as f64 * degree).floor() as usize;

    let mut pairs = Vec::with_capacity(additional);
    for _ in 0..additional {
        let first = rng.gen_range(0..count);
        let mut second = rng.gen_range(0..count);
        while second == first {
            second = rng.gen_range(0..count);
        }
        pairs.push((first, second));
    }
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NodeConfig;
    use dpws_core::{DataRate, Time};

    fn config(count: usize, seed: u64, degree: f64) -> CentralNetworkConfig {
        CentralNetworkConfig {
            topology_seed: seed,
            degree_of_redundancy: degree,
            bandwidth: DataRate::from_bits_per_sec(1_000_000_000),
            delay: Time::from_millis(5),
            nodes: (1..=count)
                .map(|index| NodeConfig {
                    id: format!("cn-{index}"),
                })
                .collect(),
            ..Default::default()
        }
    }

    fn is_connected(count: usize, connections: &[(usize, usize)]) -> bool {
        let mut reached = vec![false; count];
        let mut stack = vec![0usize];
        reached[0] = true;
        while let Some(current) = stack.pop() {
            for &(first, second) in connections {
                for (a, b) in [(first, second), (second, first)] {
                    if a == current && !reached[b] {
                        reached[b] = true;
                        stack.push(b);
                    }
                }
            }
        }
        reached.into_iter().all(|flag| flag)
    }

    #[test]
    fn zero_redundancy_yields_a_spanning_tree() {
        // N=4, seed=47, degree=0: exactly N-1 links, connected
        let mut internet = Internet::new();
        let network = CentralNetwork::build(&config(4, 47, 0.0), &mut internet).unwrap();
        assert_eq!(network.link_count(), 3);
        assert_eq!(network.redundant_connections().count(), 0);
        let connections: Vec<_> = network.connections().collect();
        assert!(is_connected(4, &connections));
        // each link burned one /24: two interfaces per link
        assert_eq!(internet.link_count(), 3);
    }

    #[test]
    fn identical_seeds_draw_identical_topologies() {
        let mut first = Internet::new();
        let mut second = Internet::new();
        let a = CentralNetwork::build(&config(8, 47, 0.5), &mut first).unwrap();
        let b = CentralNetwork::build(&config(8, 47, 0.5), &mut second).unwrap();
        let connections_a: Vec<_> = a.connections().collect();
        let connections_b: Vec<_> = b.connections().collect();
        assert_eq!(connections_a, connections_b);
    }

    #[test]
    fn different_seeds_draw_different_topologies() {
        let mut first = Internet::new();
        let mut second = Internet::new();
        let a = CentralNetwork::build(&config(8, 47, 0.5), &mut first).unwrap();
        let b = CentralNetwork::build(&config(8, 48, 0.5), &mut second).unwrap();
        let connections_a: Vec<_> = a.connections().collect();
        let connections_b: Vec<_> = b.connections().collect();
        assert_ne!(connections_a, connections_b);
    }

    #[test]
    fn full_redundancy_reaches_full_mesh_size() {
        let mut internet = Internet::new();
        let network = CentralNetwork::build(&config(6, 3, 1.0), &mut internet).unwrap();
        // 5 spanning + (15 - 5) additional
        assert_eq!(network.link_count(), 15);
    }

    #[test]
    fn degrees_above_one_produce_parallel_links() {
        let mut internet = Internet::new();
        let network = CentralNetwork::build(&config(5, 9, 2.0), &mut internet).unwrap();
        // 4 spanning + floor((10 - 4) * 2) additional
        assert_eq!(network.link_count(), 16);
        let connections: Vec<_> = network.connections().collect();
        assert!(is_connected(5, &connections));
        // no self loops even with duplicates allowed
        assert!(network.connections().all(|(first, second)| first != second));
    }

    #[test]
    fn nodes_resolve_by_configured_id() {
        let mut internet = Internet::new();
        let network = CentralNetwork::build(&config(4, 47, 0.0), &mut internet).unwrap();
        let node = network.node_by_id("cn-2").unwrap();
        assert_eq!(internet.node_label(node), "cn-2");
        assert!(network.node_by_id("cn-9").is_none());
    }

    #[test]
    fn three_node_fractional_degree_stays_minimal() {
        // full mesh for 3 nodes is 3 links, one beyond spanning; floor
        // keeps fractional degrees from silently upgrading to full mesh
        let mut internet = Internet::new();
        let network = CentralNetwork::build(&config(3, 47, 0.5), &mut internet).unwrap();
        assert_eq!(network.link_count(), 2);
    }
}
