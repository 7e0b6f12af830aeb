//! The simulation driver: assemble, run, report.
//!
//! Assembly follows the same order on every worker so that all workers agree
//! on the topology, the addressing, and the event times: transit network,
//! autonomous systems, servers, benign clients, attackers, then routing.
//! Application installation along the way is gated on partition ownership.

use crate::applications::{OnOffRetarget, PacketSink, ProgressReporter};
use crate::config::{ConfigError, Configuration};
use crate::error::Error;
use crate::mapper::NodeLookupMapper;
use crate::partition::{topology_fingerprint, PartitionPlan};
use crate::schedule::AttackSchedule;
use crate::topology::{AutonomousSystem, BuildError, CentralNetwork};
use crate::addressing::SubnetAllocator;
use dpws_core::protocols::ipv4::Ipv4Address;
use dpws_core::{RunSummary, SeedSource, Simulation, Time};
use std::path::PathBuf;
use std::sync::Arc;

/// Run-time knobs that come from the command line rather than the
/// configuration file.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Number of parallel workers the deployment launches.
    pub workers: u32,
    /// Which worker this process is.
    pub worker_rank: u32,
    /// Virtual-time interval between progress reports; `None` disables them.
    pub progress_interval: Option<Time>,
    /// Where capture files are written.
    pub capture_directory: PathBuf,
    /// Makes server sinks keep a per-packet arrival history. Test scenarios
    /// only; it costs memory per received packet.
    pub record_arrivals: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            workers: 1,
            worker_rank: 0,
            progress_interval: None,
            capture_directory: PathBuf::from("."),
            record_arrivals: false,
        }
    }
}

/// A fully assembled scenario, ready to run.
pub struct Dpws {
    pub sim: Simulation,
    options: RunOptions,
    plan: PartitionPlan,
    central: CentralNetwork,
    systems: Vec<AutonomousSystem>,
    mapper: NodeLookupMapper,
    pub schedule: Arc<AttackSchedule>,
    targets: Vec<Ipv4Address>,
    attackers: Vec<Ipv4Address>,
    duration: Time,
    fingerprint: u64,
    capture_files: Vec<PathBuf>,
}

impl Dpws {
    /// Builds the full scenario from a validated configuration.
    pub fn assemble(config: &Configuration, options: RunOptions) -> Result<Self, Error> {
        let mut sim = Simulation::new();
        let rank = options.worker_rank;
        let plan = PartitionPlan::new(options.workers, config.autonomous_systems.len());
        let capture_prefix = config.global_settings.capture.pcap_prefix.clone();
        let capture = !capture_prefix.is_empty();
        let mut capture_files = Vec::new();

        let central = CentralNetwork::build(&config.central_network, &mut sim.internet)?;
        if capture && plan.owns_transit(rank) {
            capture_files.extend(central.enable_capture(
                &mut sim.internet,
                &options.capture_directory,
                &capture_prefix,
            )?);
        }
        tracing::info!("instantiating central network done");

        let mut seeds = match config.global_settings.attack.source_seed {
            Some(seed) => SeedSource::Fixed(seed),
            None => SeedSource::Entropy,
        };
        let connections = &config.global_settings.autonomous_systems_connections;
        let mut inter_as_pool =
            SubnetAllocator::new(connections.network_address, connections.network_mask);

        let mut mapper = NodeLookupMapper::new();
        let mut systems = Vec::with_capacity(config.autonomous_systems.len());
        for (as_index, as_config) in config.autonomous_systems.iter().enumerate() {
            let mut system = AutonomousSystem::build(
                as_config,
                config.members_of(&as_config.id),
                plan.as_rank(as_index),
                &mut sim.internet,
            )?;
            mapper.insert_as(&as_config.id, as_index);
            let transit_node = central
                .node_by_id(&as_config.attachment.central_network_attachment_node)
                .ok_or_else(|| BuildError::UnknownAttachmentNode {
                    autonomous_system: as_config.id.clone(),
                    node: as_config.attachment.central_network_attachment_node.clone(),
                })?;
            system.connect_to(transit_node, &mut inter_as_pool, &mut sim.internet)?;
            if capture && plan.owns_transit(rank) {
                capture_files.extend(system.enable_attachment_capture(
                    &mut sim.internet,
                    &options.capture_directory,
                    &capture_prefix,
                )?);
            }
            systems.push(system);
        }
        tracing::info!("instantiating autonomous systems done");

        let owner_index = |mapper: &NodeLookupMapper, node: &str, owner: &str| {
            mapper
                .as_index_by_as_id(owner)
                .ok_or_else(|| ConfigError::UnknownOwnerAs {
                    node: node.to_string(),
                    owner_as: owner.to_string(),
                })
        };

        for server in &config.target_server_nodes {
            let index = owner_index(&mapper, &server.id, &server.owner_as)?;
            systems[index].create_target_server_node(
                server,
                &mut sim,
                rank,
                options.record_arrivals,
            )?;
            mapper.insert_node(&server.id, index);
        }
        tracing::info!("creating target server nodes done");

        for server in &config.non_target_server_nodes {
            let index = owner_index(&mapper, &server.id, &server.owner_as)?;
            systems[index].create_server_node(server, &mut sim, rank, options.record_arrivals)?;
            mapper.insert_node(&server.id, index);
        }
        tracing::info!("creating non-target server nodes done");

        for client in &config.benign_client_nodes {
            let peer_index = mapper
                .as_index_by_node_id(&client.peer)
                .ok_or_else(|| ConfigError::UnknownPeer {
                    node: client.id.clone(),
                    peer: client.peer.clone(),
                })?;
            let peer = systems[peer_index]
                .server_endpoint(&client.peer)
                .ok_or_else(|| ConfigError::UnknownPeer {
                    node: client.id.clone(),
                    peer: client.peer.clone(),
                })?;
            let index = owner_index(&mapper, &client.id, &client.owner_as)?;
            systems[index].create_benign_node(client, peer, &mut sim, rank, &mut seeds)?;
            mapper.insert_node(&client.id, index);
        }
        tracing::info!("creating benign nodes done");

        // all attackers share one target list, in configuration order, and
        // one schedule
        let mut targets = Vec::with_capacity(config.target_server_nodes.len());
        for server in &config.target_server_nodes {
            let index = owner_index(&mapper, &server.id, &server.owner_as)?;
            if let Some(address) = systems[index].address_of(&server.id) {
                targets.push(address);
            }
        }
        let vectors = config.resolved_vectors();
        let schedule = Arc::new(AttackSchedule::new(&vectors, targets.len()));

        let mut attackers = Vec::with_capacity(config.attacker_nodes.len());
        for attacker in &config.attacker_nodes {
            let index = owner_index(&mapper, &attacker.id, &attacker.owner_as)?;
            systems[index].create_attacker_node(
                attacker,
                &mut sim,
                rank,
                &vectors,
                &schedule,
                &targets,
                Time::ZERO,
                &mut seeds,
            )?;
            mapper.insert_node(&attacker.id, index);
            if let Some(address) = systems[index].address_of(&attacker.id) {
                attackers.push(address);
            }
        }
        tracing::info!("creating attacker nodes done");

        sim.internet.populate_routing_tables();
        tracing::info!("global routing tables calculation done");

        let fingerprint = topology_fingerprint(&sim.internet);
        let duration =
            Time::from_secs_f64(config.global_settings.scheduling.simulation_duration_s);

        Ok(Self {
            sim,
            options,
            plan,
            central,
            systems,
            mapper,
            schedule,
            targets,
            attackers,
            duration,
            fingerprint,
            capture_files,
        })
    }

    /// Arms the stop event and the progress chain, then runs to completion.
    pub fn run(&mut self) -> Result<RunSummary, Error> {
        if let Some(interval) = self.options.progress_interval {
            // progress is reported by worker 0 only; the lock-stepped ranks
            // would all print the same timings
            if self.plan.owns_transit(self.options.worker_rank) {
                let reporter = ProgressReporter::new(interval, self.duration);
                let app = self.sim.add_application(Box::new(reporter));
                self.sim
                    .internet
                    .schedule_at(interval, app, ProgressReporter::TAG_TICK);
            }
        }
        let summary = self.sim.run(self.duration)?;
        Ok(summary)
    }

    pub fn duration(&self) -> Time {
        self.duration
    }

    /// Target addresses in configuration order.
    pub fn targets(&self) -> &[Ipv4Address] {
        &self.targets
    }

    /// Attacker addresses in configuration order.
    pub fn attackers(&self) -> &[Ipv4Address] {
        &self.attackers
    }

    /// The topology hash every worker must agree on.
    pub fn fingerprint(&self) -> u64 {
        self.fingerprint
    }

    pub fn capture_files(&self) -> &[PathBuf] {
        &self.capture_files
    }

    /// The sink behind a server node id, when this worker owns it.
    pub fn server_sink(&self, node_id: &str) -> Option<&PacketSink> {
        let index = self.mapper.as_index_by_node_id(node_id)?;
        let app = self.systems[index].server_app(node_id)?;
        self.sim.application(app)
    }

    /// The per-vector sources behind an attacker node id, when this worker
    /// owns it.
    pub fn attacker_sources(&self, node_id: &str) -> Vec<&OnOffRetarget> {
        let Some(index) = self.mapper.as_index_by_node_id(node_id) else {
            return Vec::new();
        };
        let Some(apps) = self.systems[index].attacker_apps(node_id) else {
            return Vec::new();
        };
        apps.iter()
            .filter_map(|&app| self.sim.application(app))
            .collect()
    }

    /// Prints the operator-facing summary: address lists for interpreting
    /// captures, and the randomized topology for reproducibility.
    pub fn print_outputs(&self, print_topology: bool) {
        let target_list: Vec<String> = self.targets.iter().map(|a| a.to_string()).collect();
        println!("Target IP Addresses: {}", target_list.join(" "));
        let attacker_list: Vec<String> = self.attackers.iter().map(|a| a.to_string()).collect();
        println!("Attacker IP Addresses: {}", attacker_list.join(" "));

        if print_topology {
            self.central.print_topology();
            println!("Autonomous Systems to Central Network Topology Connections:");
            let attachments: Vec<String> = self
                .systems
                .iter()
                .map(|system| format!("({}, {})", system.id(), system.attachment_node_id()))
                .collect();
            println!("\t{}", attachments.join(" "));
            println!("----------------------------------------------------------");
        }
    }
}
