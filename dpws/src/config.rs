//! The YAML configuration file: schema, defaults, and validation.
//!
//! Operators describe the whole scenario declaratively: the transit
//! ("central") network, the autonomous systems hanging off it, where servers,
//! benign clients, and attackers live, and how the attack campaign is shaped.
//! Parsing is strict about references: a dangling `owner_as`, `peer`, or
//! attachment node id aborts the run with a diagnostic naming the offender.
//!
//! Missing optional keys fall back to the defaults listed next to each field;
//! `--printConfiguration` dumps the resolved values.

use dpws_core::protocols::ipv4::{Ipv4Address, Ipv4Mask};
use dpws_core::{DataRate, Time};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error as ThisError;

/// One attack mode. Each vector crafts its packets differently and keeps its
/// own rate bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttackVector {
    UdpFlooding,
    IcmpFlooding,
    TcpSynFlooding,
}

impl AttackVector {
    /// The IP protocol number the vector's raw socket uses.
    pub fn protocol_number(self) -> u8 {
        match self {
            AttackVector::UdpFlooding => dpws_core::protocols::udp::PROTOCOL_NUMBER,
            AttackVector::IcmpFlooding => dpws_core::protocols::icmp::PROTOCOL_NUMBER,
            AttackVector::TcpSynFlooding => dpws_core::protocols::tcp::PROTOCOL_NUMBER,
        }
    }
}

impl fmt::Display for AttackVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AttackVector::UdpFlooding => "udp_flooding",
            AttackVector::IcmpFlooding => "icmp_flooding",
            AttackVector::TcpSynFlooding => "tcp_syn_flooding",
        };
        f.write_str(name)
    }
}

/// How an autonomous system wires its hosts to the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AsLinkModel {
    /// A point-to-point star: each host gets its own /24 toward the gateway.
    #[default]
    Star,
    /// One shared medium joining the gateway and every host in one subnet.
    SharedMedium,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Configuration {
    #[serde(default)]
    pub global_settings: GlobalSettings,
    #[serde(default)]
    pub central_network: CentralNetworkConfig,
    #[serde(default)]
    pub autonomous_systems: Vec<AutonomousSystemConfig>,
    #[serde(default)]
    pub target_server_nodes: Vec<ServerNodeConfig>,
    #[serde(default)]
    pub non_target_server_nodes: Vec<ServerNodeConfig>,
    #[serde(default)]
    pub attacker_nodes: Vec<AttackerNodeConfig>,
    #[serde(default)]
    pub benign_client_nodes: Vec<BenignNodeConfig>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GlobalSettings {
    #[serde(default)]
    pub capture: CaptureSettings,
    #[serde(default)]
    pub attack: AttackSettings,
    #[serde(default)]
    pub scheduling: SchedulingSettings,
    #[serde(default)]
    pub autonomous_systems_connections: AsConnectionSettings,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CaptureSettings {
    /// File-name prefix for capture outputs; empty disables captures.
    #[serde(default)]
    pub pcap_prefix: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttackSettings {
    /// Default burst duration for all vectors, seconds.
    #[serde(default = "default_burst_duration")]
    pub burst_duration_s: f64,
    /// Default idle gap between two targets, seconds.
    #[serde(default)]
    pub target_switch_duration_s: f64,
    /// Base seed for per-source port randomization. Absent means system
    /// entropy, so sources do not correlate; set it to make runs
    /// reproducible.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_seed: Option<u64>,
    #[serde(default)]
    pub attack_vectors: Vec<AttackVectorConfig>,
}

impl Default for AttackSettings {
    fn default() -> Self {
        Self {
            burst_duration_s: default_burst_duration(),
            target_switch_duration_s: 0.0,
            source_seed: None,
            attack_vectors: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulingSettings {
    /// Total virtual-time duration, seconds.
    #[serde(default = "default_sim_duration")]
    pub simulation_duration_s: f64,
}

impl Default for SchedulingSettings {
    fn default() -> Self {
        Self {
            simulation_duration_s: default_sim_duration(),
        }
    }
}

/// The shared address pool for AS-gateway to transit-node links. All
/// attachment links draw consecutive /24 subnets from this one base.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AsConnectionSettings {
    #[serde(default = "default_as_connection_base", with = "ipv4_string")]
    pub network_address: Ipv4Address,
    #[serde(default = "default_mask", with = "mask_string")]
    pub network_mask: Ipv4Mask,
}

impl Default for AsConnectionSettings {
    fn default() -> Self {
        Self {
            network_address: default_as_connection_base(),
            network_mask: default_mask(),
        }
    }
}

/// One attack vector, with optional overrides of the global attack defaults.
/// Sentinels mean "unset": `-1.0` durations, `-1` packet size, `-2` ports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttackVectorConfig {
    #[serde(rename = "type")]
    pub vector: AttackVector,
    #[serde(default = "unset_duration")]
    pub burst_duration_s: f64,
    #[serde(default = "unset_duration")]
    pub target_switch_duration_s: f64,
    #[serde(default, with = "optional_rate_string")]
    pub data_rate: Option<DataRate>,
    #[serde(default = "unset_size")]
    pub packet_size: i64,
    #[serde(default = "inherit_port")]
    pub source_port: i32,
    #[serde(default = "inherit_port")]
    pub destination_port: i32,
    #[serde(default = "unset_duration")]
    pub max_data_rate_fluctuation: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeConfig {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CentralNetworkConfig {
    /// Seed for the randomized partial mesh; every worker derives the same
    /// topology from it.
    #[serde(default = "default_topology_seed")]
    pub topology_seed: u64,
    #[serde(default = "default_central_base", with = "ipv4_string")]
    pub network_address: Ipv4Address,
    #[serde(default = "default_mask", with = "mask_string")]
    pub network_mask: Ipv4Mask,
    #[serde(default = "default_central_bandwidth", with = "rate_string")]
    pub bandwidth: DataRate,
    #[serde(default = "default_central_delay", with = "time_string")]
    pub delay: Time,
    /// 0.0 keeps the spanning tree; 1.0 adds as many extra links as a full
    /// mesh would; above 1.0 is legal and produces parallel links.
    #[serde(default = "default_degree_of_redundancy")]
    pub degree_of_redundancy: f64,
    #[serde(default)]
    pub nodes: Vec<NodeConfig>,
}

impl Default for CentralNetworkConfig {
    fn default() -> Self {
        Self {
            topology_seed: default_topology_seed(),
            network_address: default_central_base(),
            network_mask: default_mask(),
            bandwidth: default_central_bandwidth(),
            delay: default_central_delay(),
            degree_of_redundancy: default_degree_of_redundancy(),
            nodes: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutonomousSystemConfig {
    pub id: String,
    #[serde(with = "ipv4_string")]
    pub network_address: Ipv4Address,
    #[serde(default = "default_mask", with = "mask_string")]
    pub network_mask: Ipv4Mask,
    #[serde(default = "default_as_bandwidth", with = "rate_string")]
    pub bandwidth: DataRate,
    #[serde(default = "default_as_delay", with = "time_string")]
    pub delay: Time,
    #[serde(default)]
    pub model: AsLinkModel,
    pub attachment: AttachmentConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttachmentConfig {
    /// The transit node the AS gateway hangs off of.
    pub central_network_attachment_node: String,
    #[serde(default = "default_as_bandwidth", with = "rate_string")]
    pub bandwidth: DataRate,
    #[serde(default = "default_as_delay", with = "time_string")]
    pub delay: Time,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerNodeConfig {
    pub id: String,
    pub owner_as: String,
    #[serde(default = "default_http_server_port")]
    pub http_server_port: u16,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttackerNodeConfig {
    pub id: String,
    pub owner_as: String,
    #[serde(default = "default_attacker_data_rate", with = "rate_string")]
    pub data_rate: DataRate,
    #[serde(default = "default_attacker_packet_size")]
    pub packet_size: i64,
    #[serde(default = "random_port")]
    pub source_port: i32,
    #[serde(default = "random_port")]
    pub destination_port: i32,
    #[serde(default = "default_fluctuation")]
    pub max_data_rate_fluctuation: f64,
    /// Per-source byte budget across all vectors; 0 means unlimited.
    #[serde(default)]
    pub max_bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenignNodeConfig {
    pub id: String,
    pub owner_as: String,
    /// The server node this client talks to.
    pub peer: String,
    /// Upper bound on the pause between requests, seconds.
    #[serde(default = "default_max_reading_time")]
    pub max_reading_time: f64,
}

// Reference defaults, printed by `--printConfiguration` when they apply.

fn default_burst_duration() -> f64 {
    60.0
}

fn default_sim_duration() -> f64 {
    300.0
}

fn default_as_connection_base() -> Ipv4Address {
    Ipv4Address::new([20, 1, 1, 0])
}

fn default_central_base() -> Ipv4Address {
    Ipv4Address::new([10, 1, 1, 0])
}

fn default_mask() -> Ipv4Mask {
    Ipv4Mask::from_bitcount(24)
}

fn default_topology_seed() -> u64 {
    47
}

fn default_central_bandwidth() -> DataRate {
    DataRate::from_bits_per_sec(1_000_000_000_000)
}

fn default_central_delay() -> Time {
    Time::from_millis(5)
}

fn default_degree_of_redundancy() -> f64 {
    0.25
}

fn default_as_bandwidth() -> DataRate {
    DataRate::from_bits_per_sec(100_000_000)
}

fn default_as_delay() -> Time {
    Time::from_millis(2)
}

fn default_http_server_port() -> u16 {
    80
}

fn default_attacker_data_rate() -> DataRate {
    DataRate::from_bits_per_sec(1_000_000)
}

fn default_attacker_packet_size() -> i64 {
    156
}

fn default_fluctuation() -> f64 {
    0.2
}

fn default_max_reading_time() -> f64 {
    120.0
}

fn unset_duration() -> f64 {
    -1.0
}

fn unset_size() -> i64 {
    -1
}

fn inherit_port() -> i32 {
    -2
}

fn random_port() -> i32 {
    -1
}

impl Configuration {
    /// Reads, parses, and validates a configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        Self::from_yaml(&std::fs::read_to_string(path)?)
    }

    /// Parses and validates configuration text.
    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        let config: Configuration = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Emits the configuration back as YAML.
    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// The number of placed (non-gateway) hosts each AS must provide, which
    /// the builders need to know before construction.
    pub fn members_of(&self, as_id: &str) -> usize {
        let servers = self
            .target_server_nodes
            .iter()
            .chain(&self.non_target_server_nodes)
            .filter(|server| server.owner_as == as_id)
            .count();
        let attackers = self
            .attacker_nodes
            .iter()
            .filter(|attacker| attacker.owner_as == as_id)
            .count();
        let clients = self
            .benign_client_nodes
            .iter()
            .filter(|client| client.owner_as == as_id)
            .count();
        servers + attackers + clients
    }

    /// The vector list with the global burst and switch defaults filled into
    /// every entry that left them unset.
    pub fn resolved_vectors(&self) -> Vec<AttackVectorConfig> {
        let attack = &self.global_settings.attack;
        attack
            .attack_vectors
            .iter()
            .map(|vector| {
                let mut resolved = vector.clone();
                if resolved.burst_duration_s < 0.0 {
                    resolved.burst_duration_s = attack.burst_duration_s;
                }
                if resolved.target_switch_duration_s < 0.0 {
                    resolved.target_switch_duration_s = attack.target_switch_duration_s;
                }
                resolved
            })
            .collect()
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let scheduling = &self.global_settings.scheduling;
        if scheduling.simulation_duration_s <= 0.0 {
            return Err(ConfigError::NonPositiveDuration(
                scheduling.simulation_duration_s,
            ));
        }

        for vector in &self.global_settings.attack.attack_vectors {
            let entity = format!("attack vector {}", vector.vector);
            check_port(&entity, vector.source_port)?;
            check_port(&entity, vector.destination_port)?;
            if vector.packet_size != -1 && vector.packet_size < 1 {
                return Err(ConfigError::BadPacketSize {
                    entity,
                    size: vector.packet_size,
                });
            }
        }

        if self.central_network.degree_of_redundancy < 0.0 {
            return Err(ConfigError::NegativeRedundancy(
                self.central_network.degree_of_redundancy,
            ));
        }
        if !self.autonomous_systems.is_empty() && self.central_network.nodes.len() < 2 {
            return Err(ConfigError::TooFewCentralNodes {
                count: self.central_network.nodes.len(),
            });
        }

        for autonomous_system in &self.autonomous_systems {
            let attachment = &autonomous_system.attachment.central_network_attachment_node;
            if !self
                .central_network
                .nodes
                .iter()
                .any(|node| &node.id == attachment)
            {
                return Err(ConfigError::UnknownAttachmentNode {
                    autonomous_system: autonomous_system.id.clone(),
                    node: attachment.clone(),
                });
            }
        }

        let owner_known = |owner: &str| {
            self.autonomous_systems
                .iter()
                .any(|autonomous_system| autonomous_system.id == owner)
        };
        for server in self
            .target_server_nodes
            .iter()
            .chain(&self.non_target_server_nodes)
        {
            if !owner_known(&server.owner_as) {
                return Err(ConfigError::UnknownOwnerAs {
                    node: server.id.clone(),
                    owner_as: server.owner_as.clone(),
                });
            }
        }
        for attacker in &self.attacker_nodes {
            if !owner_known(&attacker.owner_as) {
                return Err(ConfigError::UnknownOwnerAs {
                    node: attacker.id.clone(),
                    owner_as: attacker.owner_as.clone(),
                });
            }
            let entity = format!("attacker node {}", attacker.id);
            check_port(&entity, attacker.source_port)?;
            check_port(&entity, attacker.destination_port)?;
            if attacker.packet_size < 1 {
                return Err(ConfigError::BadPacketSize {
                    entity,
                    size: attacker.packet_size,
                });
            }
        }
        for client in &self.benign_client_nodes {
            if !owner_known(&client.owner_as) {
                return Err(ConfigError::UnknownOwnerAs {
                    node: client.id.clone(),
                    owner_as: client.owner_as.clone(),
                });
            }
            let peer_known = self
                .target_server_nodes
                .iter()
                .chain(&self.non_target_server_nodes)
                .any(|server| server.id == client.peer);
            if !peer_known {
                return Err(ConfigError::UnknownPeer {
                    node: client.id.clone(),
                    peer: client.peer.clone(),
                });
            }
        }

        // an intra-AS link needs two endpoints, so an AS without hosts is
        // unbuildable; checked after the reference checks so a dangling
        // owner_as gets the more specific diagnostic
        for autonomous_system in &self.autonomous_systems {
            if self.members_of(&autonomous_system.id) == 0 {
                return Err(ConfigError::EmptyAutonomousSystem {
                    autonomous_system: autonomous_system.id.clone(),
                });
            }
        }

        if !self.attacker_nodes.is_empty() && self.target_server_nodes.is_empty() {
            return Err(ConfigError::NoTargets);
        }
        Ok(())
    }

    /// Dumps the resolved configuration to stdout.
    pub fn print(&self) {
        println!("-----------------------------");
        println!("Global Settings");
        println!("-----------------------------");
        println!(
            "Pcap prefix: {:?}",
            self.global_settings.capture.pcap_prefix
        );
        let attack = &self.global_settings.attack;
        println!("Burst duration (s): {}", attack.burst_duration_s);
        println!(
            "Target switch duration (s): {}",
            attack.target_switch_duration_s
        );
        if let Some(seed) = attack.source_seed {
            println!("Source seed: {seed}");
        }
        println!(
            "Simulation duration (s): {}",
            self.global_settings.scheduling.simulation_duration_s
        );
        let connections = &self.global_settings.autonomous_systems_connections;
        println!(
            "AS connection base: {} / {}",
            connections.network_address, connections.network_mask
        );
        for vector in &attack.attack_vectors {
            println!("- Attack vector {}", vector.vector);
            if vector.burst_duration_s >= 0.0 {
                println!("    burst duration override (s): {}", vector.burst_duration_s);
            }
            if vector.target_switch_duration_s >= 0.0 {
                println!(
                    "    target switch duration override (s): {}",
                    vector.target_switch_duration_s
                );
            }
            if let Some(rate) = vector.data_rate {
                println!("    data rate override: {rate}");
            }
            if vector.packet_size != -1 {
                println!("    packet size override: {}", vector.packet_size);
            }
            if vector.source_port != -2 {
                println!("    source port override: {}", vector.source_port);
            }
            if vector.destination_port != -2 {
                println!("    destination port override: {}", vector.destination_port);
            }
            if vector.max_data_rate_fluctuation >= 0.0 {
                println!(
                    "    data rate fluctuation override: {}",
                    vector.max_data_rate_fluctuation
                );
            }
        }
        println!("-----------------------------");
        println!("Central Network");
        println!("-----------------------------");
        let central = &self.central_network;
        println!("Topology seed: {}", central.topology_seed);
        println!(
            "Base: {} / {}",
            central.network_address, central.network_mask
        );
        println!("Bandwidth: {}", central.bandwidth);
        println!("Delay: {}", central.delay);
        println!("Degree of redundancy: {}", central.degree_of_redundancy);
        let ids: Vec<&str> = central.nodes.iter().map(|node| node.id.as_str()).collect();
        println!("Nodes: {}", ids.join(", "));
        for autonomous_system in &self.autonomous_systems {
            println!("-----------------------------");
            println!("AS {}", autonomous_system.id);
            println!(
                "  base {} / {}",
                autonomous_system.network_address, autonomous_system.network_mask
            );
            println!(
                "  bandwidth {}, delay {}",
                autonomous_system.bandwidth, autonomous_system.delay
            );
            println!(
                "  attached to {} (bandwidth {}, delay {})",
                autonomous_system.attachment.central_network_attachment_node,
                autonomous_system.attachment.bandwidth,
                autonomous_system.attachment.delay
            );
            println!("  placed hosts: {}", self.members_of(&autonomous_system.id));
        }
    }
}

fn check_port(entity: &str, port: i32) -> Result<(), ConfigError> {
    if !(-2..=65_535).contains(&port) {
        return Err(ConfigError::PortOutOfRange {
            entity: entity.to_string(),
            port,
        });
    }
    Ok(())
}

#[derive(Debug, ThisError)]
pub enum ConfigError {
    #[error("failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse configuration file: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("node {node:?} names unknown owner AS {owner_as:?}")]
    UnknownOwnerAs { node: String, owner_as: String },
    #[error("benign node {node:?} names unknown peer server {peer:?}")]
    UnknownPeer { node: String, peer: String },
    #[error("AS {autonomous_system:?} attaches to unknown central network node {node:?}")]
    UnknownAttachmentNode {
        autonomous_system: String,
        node: String,
    },
    #[error(
        "{entity} has out-of-range port {port}; use -1 to randomize, -2 to inherit, or 0..=65535"
    )]
    PortOutOfRange { entity: String, port: i32 },
    #[error("{entity} has invalid packet size {size}; sizes start at 1")]
    BadPacketSize { entity: String, size: i64 },
    #[error("the central network needs at least two nodes, found {count}")]
    TooFewCentralNodes { count: usize },
    #[error("AS {autonomous_system:?} has no hosts assigned to it")]
    EmptyAutonomousSystem { autonomous_system: String },
    #[error("degree_of_redundancy must be non-negative, got {0}")]
    NegativeRedundancy(f64),
    #[error("attacker nodes are configured but target_server_nodes is empty")]
    NoTargets,
    #[error("simulation_duration_s must be positive, got {0}")]
    NonPositiveDuration(f64),
}

// serde adapters between the kernel value types and their string spellings

mod ipv4_string {
    use super::*;
    use serde::{Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Ipv4Address, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Ipv4Address, D::Error> {
        let text = String::deserialize(deserializer)?;
        Ipv4Address::from_str(&text).map_err(serde::de::Error::custom)
    }
}

mod mask_string {
    use super::*;
    use serde::{Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Ipv4Mask, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Ipv4Mask, D::Error> {
        let text = String::deserialize(deserializer)?;
        Ipv4Mask::from_str(&text).map_err(serde::de::Error::custom)
    }
}

mod rate_string {
    use super::*;
    use serde::{Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &DataRate, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DataRate, D::Error> {
        let text = String::deserialize(deserializer)?;
        DataRate::from_str(&text).map_err(serde::de::Error::custom)
    }
}

mod optional_rate_string {
    use super::*;
    use serde::{Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<DataRate>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(rate) => serializer.serialize_some(&rate.to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DataRate>, D::Error> {
        let text = Option::<String>::deserialize(deserializer)?;
        text.map(|text| DataRate::from_str(&text).map_err(serde::de::Error::custom))
            .transpose()
    }
}

mod time_string {
    use super::*;
    use serde::{Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Time, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("{}ns", value.as_nanos()))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Time, D::Error> {
        let text = String::deserialize(deserializer)?;
        Time::from_str(&text).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
global_settings:
  capture:
    pcap_prefix: "run1"
  attack:
    burst_duration_s: 2.0
    target_switch_duration_s: 0.5
    attack_vectors:
      - type: udp_flooding
        destination_port: 80
      - type: tcp_syn_flooding
        burst_duration_s: 3.0
        source_port: -1
  scheduling:
    simulation_duration_s: 60.0
  autonomous_systems_connections:
    network_address: "20.1.1.0"
    network_mask: "255.255.255.0"
central_network:
  topology_seed: 47
  network_address: "10.1.1.0"
  bandwidth: "1000Gbps"
  delay: "5ms"
  degree_of_redundancy: 0.0
  nodes:
    - id: cn-1
    - id: cn-2
    - id: cn-3
autonomous_systems:
  - id: as-1
    network_address: "30.1.1.0"
    attachment:
      central_network_attachment_node: cn-1
  - id: as-2
    network_address: "40.1.1.0"
    bandwidth: "10Mbps"
    delay: "1ms"
    attachment:
      central_network_attachment_node: cn-3
target_server_nodes:
  - id: victim
    owner_as: as-1
attacker_nodes:
  - id: bot-1
    owner_as: as-2
    source_port: 4444
benign_client_nodes:
  - id: surfer
    owner_as: as-2
    peer: victim
    max_reading_time: 30
"#;

    #[test]
    fn parses_the_sample() {
        let config = Configuration::from_yaml(SAMPLE).unwrap();
        assert_eq!(config.central_network.nodes.len(), 3);
        assert_eq!(
            config.central_network.bandwidth,
            DataRate::from_bits_per_sec(1_000_000_000_000)
        );
        assert_eq!(config.central_network.delay, Time::from_millis(5));
        assert_eq!(config.autonomous_systems[0].model, AsLinkModel::Star);
        assert_eq!(
            config.autonomous_systems[1].bandwidth,
            DataRate::from_bits_per_sec(10_000_000)
        );
        // defaults fill in the blanks
        assert_eq!(
            config.autonomous_systems[0].bandwidth,
            DataRate::from_bits_per_sec(100_000_000)
        );
        assert_eq!(config.attacker_nodes[0].packet_size, 156);
        assert_eq!(config.attacker_nodes[0].max_data_rate_fluctuation, 0.2);
        assert_eq!(config.target_server_nodes[0].http_server_port, 80);
        assert_eq!(config.members_of("as-2"), 2);
        assert_eq!(config.members_of("as-1"), 1);
    }

    #[test]
    fn emit_and_reparse_round_trips() {
        let config = Configuration::from_yaml(SAMPLE).unwrap();
        let emitted = config.to_yaml().unwrap();
        let reparsed = Configuration::from_yaml(&emitted).unwrap();
        assert_eq!(config, reparsed);
    }

    #[test]
    fn global_defaults_flow_into_vectors() {
        let config = Configuration::from_yaml(SAMPLE).unwrap();
        let vectors = config.resolved_vectors();
        assert_eq!(vectors[0].burst_duration_s, 2.0);
        assert_eq!(vectors[0].target_switch_duration_s, 0.5);
        // the per-vector override survives
        assert_eq!(vectors[1].burst_duration_s, 3.0);
        assert_eq!(vectors[1].target_switch_duration_s, 0.5);
    }

    #[test]
    fn rejects_unknown_owner() {
        let text = SAMPLE.replace("owner_as: as-2", "owner_as: nowhere");
        match Configuration::from_yaml(&text) {
            Err(ConfigError::UnknownOwnerAs { owner_as, .. }) => {
                assert_eq!(owner_as, "nowhere");
            }
            other => panic!("expected UnknownOwnerAs, got {other:?}"),
        }
    }

    #[test]
    fn rejects_unknown_peer() {
        let text = SAMPLE.replace("peer: victim", "peer: ghost");
        assert!(matches!(
            Configuration::from_yaml(&text),
            Err(ConfigError::UnknownPeer { .. })
        ));
    }

    #[test]
    fn rejects_unknown_attachment() {
        let text = SAMPLE.replace(
            "central_network_attachment_node: cn-3",
            "central_network_attachment_node: cn-9",
        );
        assert!(matches!(
            Configuration::from_yaml(&text),
            Err(ConfigError::UnknownAttachmentNode { .. })
        ));
    }

    #[test]
    fn rejects_unknown_vector_type() {
        let text = SAMPLE.replace("type: udp_flooding", "type: dns_amplification");
        assert!(matches!(
            Configuration::from_yaml(&text),
            Err(ConfigError::Yaml(_))
        ));
    }

    #[test]
    fn rejects_out_of_range_ports() {
        let text = SAMPLE.replace("destination_port: 80", "destination_port: 65536");
        assert!(matches!(
            Configuration::from_yaml(&text),
            Err(ConfigError::PortOutOfRange { .. })
        ));
        let text = SAMPLE.replace("source_port: 4444", "source_port: -3");
        assert!(matches!(
            Configuration::from_yaml(&text),
            Err(ConfigError::PortOutOfRange { .. })
        ));
    }
}
