//! One autonomous system: a gateway plus the hosts placed inside it.
//!
//! The star model (the default) lays a point-to-point link from the gateway
//! to every host, each link in its own /24 subnet; collapsing them into one
//! subnet confuses global routing, so each link gets its own. The
//! shared-medium variant joins gateway and hosts on a single bus subnet
//! instead.

use crate::addressing::SubnetAllocator;
use crate::config::{
    AsLinkModel, AttackVectorConfig, AttackerNodeConfig, AutonomousSystemConfig,
    BenignNodeConfig, ServerNodeConfig,
};
use crate::nodes::{AttackerNode, BenignNode, ServerNode};
use crate::schedule::AttackSchedule;
use crate::topology::BuildError;
use dpws_core::protocols::ipv4::Ipv4Address;
use dpws_core::{Internet, LinkId, NodeId, SeedSource, Simulation, Time};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub struct AutonomousSystem {
    config: AutonomousSystemConfig,
    rank: u32,
    gateway: NodeId,
    members: Vec<NodeId>,
    member_addresses: Vec<Ipv4Address>,
    next_unclaimed: usize,
    attachment: Option<Attachment>,
    target_servers: Vec<ServerNode>,
    other_servers: Vec<ServerNode>,
    benign_clients: Vec<BenignNode>,
    attackers: Vec<AttackerNode>,
}

struct Attachment {
    link: LinkId,
    transit_node: NodeId,
}

impl AutonomousSystem {
    /// Creates the gateway and `num_members` host slots with their links and
    /// addresses. The slot count comes from the configuration layer: it must
    /// equal the number of placed applications this AS will receive.
    pub fn build(
        config: &AutonomousSystemConfig,
        num_members: usize,
        rank: u32,
        internet: &mut Internet,
    ) -> Result<Self, BuildError> {
        if num_members == 0 {
            // a gateway with no hosts behind it cannot host applications
            return Err(BuildError::EmptyAutonomousSystem {
                autonomous_system: config.id.clone(),
            });
        }

        let gateway = internet.add_node(format!("{}-gateway", config.id));
        let members: Vec<NodeId> = (0..num_members)
            .map(|index| internet.add_node(format!("{}-host-{}", config.id, index + 1)))
            .collect();

        let mut pool = SubnetAllocator::new(config.network_address, config.network_mask);
        let mut member_addresses = Vec::with_capacity(num_members);
        match config.model {
            AsLinkModel::Star => {
                for &member in &members {
                    let link =
                        internet.connect(gateway, member, config.bandwidth, config.delay);
                    let mut subnet = pool.reserve_subnet()?;
                    internet.assign_address(gateway, link, subnet.allocate_host()?)?;
                    let address = subnet.allocate_host()?;
                    internet.assign_address(member, link, address)?;
                    member_addresses.push(address);
                }
            }
            AsLinkModel::SharedMedium => {
                let mut attached = Vec::with_capacity(num_members + 1);
                attached.push(gateway);
                attached.extend_from_slice(&members);
                let link =
                    internet.add_shared_link(&attached, config.bandwidth, config.delay);
                let mut subnet = pool.reserve_subnet()?;
                internet.assign_address(gateway, link, subnet.allocate_host()?)?;
                for &member in &members {
                    let address = subnet.allocate_host()?;
                    internet.assign_address(member, link, address)?;
                    member_addresses.push(address);
                }
            }
        }

        Ok(Self {
            config: config.clone(),
            rank,
            gateway,
            members,
            member_addresses,
            next_unclaimed: 0,
            attachment: None,
            target_servers: Vec::new(),
            other_servers: Vec::new(),
            benign_clients: Vec::new(),
            attackers: Vec::new(),
        })
    }

    pub fn id(&self) -> &str {
        &self.config.id
    }

    pub fn rank(&self) -> u32 {
        self.rank
    }

    pub fn gateway(&self) -> NodeId {
        self.gateway
    }

    /// The configured id of the transit node this AS attaches to.
    pub fn attachment_node_id(&self) -> &str {
        &self.config.attachment.central_network_attachment_node
    }

    /// Attaches the gateway to a transit node via the shared inter-AS
    /// address pool.
    pub fn connect_to(
        &mut self,
        transit_node: NodeId,
        pool: &mut SubnetAllocator,
        internet: &mut Internet,
    ) -> Result<(), BuildError> {
        let attachment = &self.config.attachment;
        let link = internet.connect(
            self.gateway,
            transit_node,
            attachment.bandwidth,
            attachment.delay,
        );
        let mut subnet = pool.reserve_subnet()?;
        internet.assign_address(self.gateway, link, subnet.allocate_host()?)?;
        internet.assign_address(transit_node, link, subnet.allocate_host()?)?;
        self.attachment = Some(Attachment { link, transit_node });
        Ok(())
    }

    /// Starts a capture on the transit-side device of the attachment link,
    /// labeled `<prefix>__<attachment-node>-to-<as>____`.
    pub fn enable_attachment_capture(
        &self,
        internet: &mut Internet,
        directory: &Path,
        prefix: &str,
    ) -> Result<Option<PathBuf>, BuildError> {
        let Some(attachment) = &self.attachment else {
            return Ok(None);
        };
        let device = internet
            .device_index(attachment.link, attachment.transit_node)
            .unwrap_or_default();
        let name = format!(
            "{prefix}__{}-to-{}____{}-{}.pcap",
            self.config.attachment.central_network_attachment_node,
            self.config.id,
            attachment.transit_node,
            device
        );
        let path = directory.join(name);
        internet.enable_capture(attachment.link, attachment.transit_node, &path)?;
        Ok(Some(path))
    }

    /// Reserves the next unclaimed host slot for the given node id and labels
    /// it. Slot exhaustion means the configuration layer under-counted.
    fn claim_slot(
        &mut self,
        node_id: &str,
        internet: &mut Internet,
    ) -> Result<(NodeId, Ipv4Address), BuildError> {
        if self.next_unclaimed >= self.members.len() {
            return Err(BuildError::SlotsExhausted {
                autonomous_system: self.config.id.clone(),
                node: node_id.to_string(),
            });
        }
        let index = self.next_unclaimed;
        self.next_unclaimed += 1;
        let node = self.members[index];
        internet.set_node_label(node, node_id);
        Ok((node, self.member_addresses[index]))
    }

    fn owns(&self, rank: u32) -> bool {
        self.rank == rank
    }

    pub fn create_target_server_node(
        &mut self,
        config: &ServerNodeConfig,
        sim: &mut Simulation,
        rank: u32,
        record_arrivals: bool,
    ) -> Result<(), BuildError> {
        let (node, address) = self.claim_slot(&config.id, &mut sim.internet)?;
        let server = ServerNode::create(
            config,
            node,
            address,
            sim,
            self.owns(rank),
            record_arrivals,
        );
        self.target_servers.push(server);
        Ok(())
    }

    pub fn create_server_node(
        &mut self,
        config: &ServerNodeConfig,
        sim: &mut Simulation,
        rank: u32,
        record_arrivals: bool,
    ) -> Result<(), BuildError> {
        let (node, address) = self.claim_slot(&config.id, &mut sim.internet)?;
        let server = ServerNode::create(
            config,
            node,
            address,
            sim,
            self.owns(rank),
            record_arrivals,
        );
        self.other_servers.push(server);
        Ok(())
    }

    pub fn create_benign_node(
        &mut self,
        config: &BenignNodeConfig,
        peer: (Ipv4Address, u16),
        sim: &mut Simulation,
        rank: u32,
        seeds: &mut SeedSource,
    ) -> Result<(), BuildError> {
        let (node, address) = self.claim_slot(&config.id, &mut sim.internet)?;
        let client = BenignNode::create(config, node, address, peer, sim, self.owns(rank), seeds);
        self.benign_clients.push(client);
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    pub fn create_attacker_node(
        &mut self,
        config: &AttackerNodeConfig,
        sim: &mut Simulation,
        rank: u32,
        vectors: &[AttackVectorConfig],
        schedule: &Arc<AttackSchedule>,
        targets: &[Ipv4Address],
        start_time: Time,
        seeds: &mut SeedSource,
    ) -> Result<(), BuildError> {
        let (node, address) = self.claim_slot(&config.id, &mut sim.internet)?;
        let attacker = AttackerNode::create(
            config,
            node,
            address,
            sim,
            self.owns(rank),
            vectors,
            schedule,
            targets,
            start_time,
            seeds,
        );
        self.attackers.push(attacker);
        Ok(())
    }

    /// The serving endpoint of a server node in this AS.
    pub fn server_endpoint(&self, node_id: &str) -> Option<(Ipv4Address, u16)> {
        self.target_servers
            .iter()
            .chain(&self.other_servers)
            .find(|server| server.id == node_id)
            .map(|server| server.endpoint())
    }

    /// The address of any placed node in this AS.
    pub fn address_of(&self, node_id: &str) -> Option<Ipv4Address> {
        let servers = self
            .target_servers
            .iter()
            .chain(&self.other_servers)
            .find(|server| server.id == node_id)
            .map(|server| server.address);
        servers
            .or_else(|| {
                self.benign_clients
                    .iter()
                    .find(|client| client.id == node_id)
                    .map(|client| client.address)
            })
            .or_else(|| {
                self.attackers
                    .iter()
                    .find(|attacker| attacker.id == node_id)
                    .map(|attacker| attacker.address)
            })
    }

    /// The sink application of a server node, when this worker owns it.
    pub fn server_app(&self, node_id: &str) -> Option<dpws_core::AppId> {
        self.target_servers
            .iter()
            .chain(&self.other_servers)
            .find(|server| server.id == node_id)
            .and_then(|server| server.app)
    }

    /// The source applications of an attacker node, when this worker owns it.
    pub fn attacker_apps(&self, node_id: &str) -> Option<&[dpws_core::AppId]> {
        self.attackers
            .iter()
            .find(|attacker| attacker.id == node_id)
            .map(|attacker| attacker.apps.as_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AttachmentConfig;
    use dpws_core::protocols::ipv4::Ipv4Mask;
    use dpws_core::DataRate;

    fn as_config(model: AsLinkModel) -> AutonomousSystemConfig {
        AutonomousSystemConfig {
            id: "as-1".into(),
            network_address: Ipv4Address::new([30, 1, 1, 0]),
            network_mask: Ipv4Mask::from_bitcount(24),
            bandwidth: DataRate::from_bits_per_sec(100_000_000),
            delay: Time::from_millis(2),
            model,
            attachment: AttachmentConfig {
                central_network_attachment_node: "cn-1".into(),
                bandwidth: DataRate::from_bits_per_sec(100_000_000),
                delay: Time::from_millis(2),
            },
        }
    }

    #[test]
    fn star_gives_every_member_its_own_subnet() {
        let mut internet = Internet::new();
        let system =
            AutonomousSystem::build(&as_config(AsLinkModel::Star), 3, 0, &mut internet).unwrap();
        // one link per member, distinct /24s, gateway .1 and member .2
        assert_eq!(internet.link_count(), 3);
        assert_eq!(
            system.member_addresses,
            vec![
                Ipv4Address::new([30, 1, 1, 2]),
                Ipv4Address::new([30, 1, 2, 2]),
                Ipv4Address::new([30, 1, 3, 2]),
            ]
        );
        let gateway_addresses: Vec<Ipv4Address> = internet
            .node_interfaces(system.gateway())
            .iter()
            .map(|interface| interface.address)
            .collect();
        assert_eq!(
            gateway_addresses,
            vec![
                Ipv4Address::new([30, 1, 1, 1]),
                Ipv4Address::new([30, 1, 2, 1]),
                Ipv4Address::new([30, 1, 3, 1]),
            ]
        );
    }

    #[test]
    fn shared_medium_uses_one_subnet() {
        let mut internet = Internet::new();
        let system = AutonomousSystem::build(
            &as_config(AsLinkModel::SharedMedium),
            3,
            0,
            &mut internet,
        )
        .unwrap();
        assert_eq!(internet.link_count(), 1);
        assert_eq!(
            system.member_addresses,
            vec![
                Ipv4Address::new([30, 1, 1, 2]),
                Ipv4Address::new([30, 1, 1, 3]),
                Ipv4Address::new([30, 1, 1, 4]),
            ]
        );
    }

    #[test]
    fn empty_systems_are_rejected() {
        let mut internet = Internet::new();
        assert!(matches!(
            AutonomousSystem::build(&as_config(AsLinkModel::Star), 0, 0, &mut internet),
            Err(BuildError::EmptyAutonomousSystem { .. })
        ));
    }

    #[test]
    fn slots_are_claimed_in_order_and_bounded() {
        let mut internet = Internet::new();
        let mut system =
            AutonomousSystem::build(&as_config(AsLinkModel::Star), 2, 0, &mut internet).unwrap();
        let (first, first_address) = system.claim_slot("victim", &mut internet).unwrap();
        assert_eq!(internet.node_label(first), "victim");
        assert_eq!(first_address, Ipv4Address::new([30, 1, 1, 2]));
        let (_, second_address) = system.claim_slot("bot", &mut internet).unwrap();
        assert_eq!(second_address, Ipv4Address::new([30, 1, 2, 2]));
        assert!(matches!(
            system.claim_slot("excess", &mut internet),
            Err(BuildError::SlotsExhausted { .. })
        ));
    }
}
