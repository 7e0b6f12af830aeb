//! The per-kind host bundles: servers, benign clients, and attackers.
//!
//! Each bundle pairs a claimed AS slot (a node plus its address) with the
//! applications that kind of host runs. Construction happens on every
//! worker so addresses agree everywhere; applications are only materialized
//! when the constructing worker owns the AS, which is why the `app` fields
//! are optional.

use crate::applications::{OnOffConfig, OnOffRetarget, PacketSink, PortPolicy, RequestClient};
use crate::config::{AttackVectorConfig, AttackerNodeConfig, BenignNodeConfig, ServerNodeConfig};
use crate::schedule::AttackSchedule;
use dpws_core::protocols::ipv4::Ipv4Address;
use dpws_core::{AppId, NodeId, SeedSource, Simulation, Time};
use std::sync::Arc;

/// A server host: a packet sink, and the flood destination when targeted.
pub struct ServerNode {
    pub id: String,
    pub node: NodeId,
    pub address: Ipv4Address,
    pub port: u16,
    pub app: Option<AppId>,
}

impl ServerNode {
    pub fn create(
        config: &ServerNodeConfig,
        node: NodeId,
        address: Ipv4Address,
        sim: &mut Simulation,
        owns: bool,
        record_arrivals: bool,
    ) -> Self {
        let app = owns.then(|| {
            let mut sink = PacketSink::new(node, config.http_server_port);
            if record_arrivals {
                sink = sink.with_history();
            }
            let app = sim.add_application(Box::new(sink));
            sim.internet.set_sink(node, app);
            sim.internet
                .schedule_at(Time::ZERO, app, PacketSink::TAG_START);
            app
        });
        Self {
            id: config.id.clone(),
            node,
            address,
            port: config.http_server_port,
            app,
        }
    }

    pub fn endpoint(&self) -> (Ipv4Address, u16) {
        (self.address, self.port)
    }
}

/// A background client pointed at one server peer.
pub struct BenignNode {
    pub id: String,
    pub node: NodeId,
    pub address: Ipv4Address,
    pub app: Option<AppId>,
}

impl BenignNode {
    pub fn create(
        config: &BenignNodeConfig,
        node: NodeId,
        address: Ipv4Address,
        peer: (Ipv4Address, u16),
        sim: &mut Simulation,
        owns: bool,
        seeds: &mut SeedSource,
    ) -> Self {
        let app = owns.then(|| {
            let client = RequestClient::new(
                node,
                peer.0,
                peer.1,
                Time::from_secs_f64(config.max_reading_time),
                seeds.next_seed(),
            );
            let app = sim.add_application(Box::new(client));
            sim.internet.set_sink(node, app);
            sim.internet
                .schedule_at(Time::ZERO, app, RequestClient::TAG_START);
            app
        });
        Self {
            id: config.id.clone(),
            node,
            address,
            app,
        }
    }
}

/// An attacker host: one retargetable On/Off source per configured vector,
/// all driven by the shared schedule.
pub struct AttackerNode {
    pub id: String,
    pub node: NodeId,
    pub address: Ipv4Address,
    pub apps: Vec<AppId>,
}

impl AttackerNode {
    /// Instantiates the sources, arms their starts at the per-vector offsets,
    /// and schedules the first retarget of each multi-target vector. The
    /// retarget chain then re-schedules itself inside the source.
    #[allow(clippy::too_many_arguments)]
    pub fn create(
        config: &AttackerNodeConfig,
        node: NodeId,
        address: Ipv4Address,
        sim: &mut Simulation,
        owns: bool,
        vectors: &[AttackVectorConfig],
        schedule: &Arc<AttackSchedule>,
        targets: &[Ipv4Address],
        start_time: Time,
        seeds: &mut SeedSource,
    ) -> Self {
        let mut apps = Vec::new();
        if owns {
            for (vector_index, vector) in vectors.iter().enumerate() {
                let timing = *schedule.timing(vector_index);
                let source = OnOffRetarget::new(OnOffConfig {
                    node,
                    vector: vector.vector,
                    data_rate: resolve_data_rate(vector, config),
                    packet_size: resolve_packet_size(vector, config),
                    source_port: resolve_port(vector.source_port, config.source_port),
                    destination_port: resolve_port(
                        vector.destination_port,
                        config.destination_port,
                    ),
                    on_time: timing.on_time,
                    off_time: timing.off_time,
                    skip_first_off: true,
                    skip_off_after_retarget: true,
                    max_data_rate_fluctuation: resolve_fluctuation(vector, config),
                    max_bytes: config.max_bytes,
                    targets: targets.to_vec(),
                    vector_index,
                    schedule: schedule.clone(),
                    seed: seeds.next_seed(),
                });
                let app = sim.add_application(Box::new(source));
                let start_at = start_time + timing.start_offset;
                sim.internet
                    .schedule_at(start_at, app, OnOffRetarget::TAG_START);
                if targets.len() > 1 {
                    // the first retarget fires one interval after this
                    // vector's start; the source chains the rest itself
                    let first_interval = schedule.retarget_interval(vector_index, 0);
                    sim.internet.schedule_at(
                        start_at + first_interval,
                        app,
                        OnOffRetarget::TAG_RETARGET,
                    );
                }
                apps.push(app);
            }
        }
        Self {
            id: config.id.clone(),
            node,
            address,
            apps,
        }
    }
}

// Attribute precedence: a vector-level value wins over the attacker-node
// value unless it is the "unset" sentinel.

fn resolve_data_rate(
    vector: &AttackVectorConfig,
    node: &AttackerNodeConfig,
) -> dpws_core::DataRate {
    vector.data_rate.unwrap_or(node.data_rate)
}

fn resolve_packet_size(vector: &AttackVectorConfig, node: &AttackerNodeConfig) -> u32 {
    let size = if vector.packet_size != -1 {
        vector.packet_size
    } else {
        node.packet_size
    };
    size.max(1) as u32
}

fn resolve_port(vector_port: i32, node_port: i32) -> PortPolicy {
    let resolved = if vector_port != -2 {
        vector_port
    } else {
        node_port
    };
    if (0..=u16::MAX as i32).contains(&resolved) {
        PortPolicy::Fixed(resolved as u16)
    } else {
        PortPolicy::Random
    }
}

fn resolve_fluctuation(vector: &AttackVectorConfig, node: &AttackerNodeConfig) -> f64 {
    if vector.max_data_rate_fluctuation >= 0.0 {
        vector.max_data_rate_fluctuation
    } else {
        node.max_data_rate_fluctuation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AttackVector;
    use dpws_core::DataRate;

    fn vector_config() -> AttackVectorConfig {
        AttackVectorConfig {
            vector: AttackVector::UdpFlooding,
            burst_duration_s: 1.0,
            target_switch_duration_s: 0.0,
            data_rate: None,
            packet_size: -1,
            source_port: -2,
            destination_port: -2,
            max_data_rate_fluctuation: -1.0,
        }
    }

    fn node_config() -> AttackerNodeConfig {
        AttackerNodeConfig {
            id: "bot".into(),
            owner_as: "as-1".into(),
            data_rate: DataRate::from_bits_per_sec(1_000_000),
            packet_size: 156,
            source_port: 4444,
            destination_port: -1,
            max_data_rate_fluctuation: 0.2,
            max_bytes: 0,
        }
    }

    #[test]
    fn vector_values_win_over_node_values() {
        let mut vector = vector_config();
        vector.data_rate = Some(DataRate::from_bits_per_sec(5_000_000));
        vector.packet_size = 512;
        vector.max_data_rate_fluctuation = 0.05;
        let node = node_config();
        assert_eq!(
            resolve_data_rate(&vector, &node),
            DataRate::from_bits_per_sec(5_000_000)
        );
        assert_eq!(resolve_packet_size(&vector, &node), 512);
        assert_eq!(resolve_fluctuation(&vector, &node), 0.05);
    }

    #[test]
    fn sentinels_fall_through_to_the_node() {
        let vector = vector_config();
        let node = node_config();
        assert_eq!(
            resolve_data_rate(&vector, &node),
            DataRate::from_bits_per_sec(1_000_000)
        );
        assert_eq!(resolve_packet_size(&vector, &node), 156);
        assert_eq!(resolve_fluctuation(&vector, &node), 0.2);
        // node-level fixed source port applies when the vector inherits
        assert_eq!(resolve_port(vector.source_port, node.source_port), PortPolicy::Fixed(4444));
    }

    #[test]
    fn vector_randomization_beats_a_fixed_node_port() {
        // vector says randomize (-1), the node pins 4444: the vector wins
        assert_eq!(resolve_port(-1, 4444), PortPolicy::Random);
        // vector pins a port over a randomizing node
        assert_eq!(resolve_port(80, -1), PortPolicy::Fixed(80));
        // both inherit-and-randomize
        assert_eq!(resolve_port(-2, -1), PortPolicy::Random);
    }
}
