//! The simulated internet: nodes, links, sockets, routing, and captures.
//!
//! Topology is built once, before the event loop runs, and is immutable
//! afterwards. Applications hold ids into the arenas here rather than
//! references; the kernel likewise refers to applications only by id when it
//! schedules their callbacks.

use crate::pcap::PcapWriter;
use crate::protocols::ipv4::{Ipv4Address, Ipv4Header, HEADER_OCTETS};
use crate::scheduler::{EventHandle, EventQueue};
use crate::{DataRate, Message, Time};
use rustc_hash::FxHashMap;
use std::collections::VecDeque;
use std::io;
use std::path::Path;
use thiserror::Error as ThisError;

pub type NodeId = usize;
pub type LinkId = usize;
pub type SocketId = usize;
pub type AppId = usize;

/// An application-defined timer discriminator.
pub type Tag = u64;

/// An IPv4 datagram in flight: the parsed header plus the transport payload.
#[derive(Debug, Clone)]
pub struct Packet {
    pub header: Ipv4Header,
    pub payload: Message,
}

impl Packet {
    /// The size of the datagram as it appears on a capture.
    pub fn wire_len(&self) -> usize {
        HEADER_OCTETS as usize + self.payload.len()
    }

    /// Serializes the datagram, header first.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.wire_len());
        bytes.extend_from_slice(&self.header.serialize());
        bytes.extend_from_slice(self.payload.as_slice());
        bytes
    }
}

/// An addressable host in the simulated internet.
#[derive(Debug)]
pub struct Node {
    label: String,
    interfaces: Vec<Interface>,
}

/// One attachment of a node to a link, bearing one address.
#[derive(Debug, Clone, Copy)]
pub struct Interface {
    pub link: LinkId,
    pub address: Ipv4Address,
}

#[derive(Debug)]
enum LinkKind {
    PointToPoint([NodeId; 2]),
    Shared(Vec<NodeId>),
}

/// A channel between nodes with a serialization rate and propagation delay.
#[derive(Debug)]
pub struct Link {
    kind: LinkKind,
    data_rate: DataRate,
    delay: Time,
    /// Transmission back-pressure per direction; shared media use slot 0.
    busy_until: [Time; 2],
}

impl Link {
    pub fn endpoints(&self) -> &[NodeId] {
        match &self.kind {
            LinkKind::PointToPoint(pair) => pair,
            LinkKind::Shared(nodes) => nodes,
        }
    }

    pub fn is_point_to_point(&self) -> bool {
        matches!(self.kind, LinkKind::PointToPoint(_))
    }
}

#[derive(Debug)]
struct RawSocket {
    node: NodeId,
    protocol: u8,
    local: Ipv4Address,
    remote: Option<Ipv4Address>,
    open: bool,
}

/// The next step a packet takes toward a destination node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hop {
    pub link: LinkId,
    pub node: NodeId,
}

/// Counters for what the network did with traffic.
#[derive(Debug, Default, Clone, Copy)]
pub struct TrafficStats {
    pub transmitted: u64,
    pub forwarded: u64,
    pub delivered: u64,
    pub delivered_unclaimed: u64,
    pub dropped_ttl: u64,
    pub dropped_no_route: u64,
}

#[derive(Debug)]
pub(crate) enum Event {
    Deliver {
        link: LinkId,
        node: NodeId,
        packet: Packet,
    },
    Timer {
        app: AppId,
        tag: Tag,
    },
    Connected {
        app: AppId,
        socket: SocketId,
    },
    Stop,
}

/// The kernel state shared by every handler: topology, sockets, the event
/// queue, routing tables, and capture files.
pub struct Internet {
    nodes: Vec<Node>,
    links: Vec<Link>,
    sockets: Vec<RawSocket>,
    queue: EventQueue<Event>,
    addresses: FxHashMap<Ipv4Address, NodeId>,
    routes: Vec<FxHashMap<NodeId, Hop>>,
    sinks: FxHashMap<NodeId, AppId>,
    captures: FxHashMap<(LinkId, NodeId), PcapWriter>,
    stats: TrafficStats,
}

impl Internet {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            links: Vec::new(),
            sockets: Vec::new(),
            queue: EventQueue::new(),
            addresses: FxHashMap::default(),
            routes: Vec::new(),
            sinks: FxHashMap::default(),
            captures: FxHashMap::default(),
            stats: TrafficStats::default(),
        }
    }

    /// The current virtual time.
    pub fn now(&self) -> Time {
        self.queue.now()
    }

    pub fn stats(&self) -> TrafficStats {
        self.stats
    }

    // --- topology construction -------------------------------------------

    pub fn add_node(&mut self, label: impl Into<String>) -> NodeId {
        self.nodes.push(Node {
            label: label.into(),
            interfaces: Vec::new(),
        });
        self.nodes.len() - 1
    }

    pub fn set_node_label(&mut self, node: NodeId, label: impl Into<String>) {
        self.nodes[node].label = label.into();
    }

    pub fn node_label(&self, node: NodeId) -> &str {
        &self.nodes[node].label
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn node_interfaces(&self, node: NodeId) -> &[Interface] {
        &self.nodes[node].interfaces
    }

    /// Lays a point-to-point link between two nodes.
    pub fn connect(&mut self, a: NodeId, b: NodeId, data_rate: DataRate, delay: Time) -> LinkId {
        self.links.push(Link {
            kind: LinkKind::PointToPoint([a, b]),
            data_rate,
            delay,
            busy_until: [Time::ZERO; 2],
        });
        self.links.len() - 1
    }

    /// Lays a shared-medium link joining all the given nodes.
    pub fn add_shared_link(
        &mut self,
        nodes: &[NodeId],
        data_rate: DataRate,
        delay: Time,
    ) -> LinkId {
        self.links.push(Link {
            kind: LinkKind::Shared(nodes.to_vec()),
            data_rate,
            delay,
            busy_until: [Time::ZERO; 2],
        });
        self.links.len() - 1
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    pub fn link(&self, link: LinkId) -> &Link {
        &self.links[link]
    }

    /// Gives `node` an address on `link`.
    pub fn assign_address(
        &mut self,
        node: NodeId,
        link: LinkId,
        address: Ipv4Address,
    ) -> Result<(), NetworkError> {
        if self.addresses.insert(address, node).is_some() {
            return Err(NetworkError::AddressInUse(address));
        }
        self.nodes[node].interfaces.push(Interface { link, address });
        Ok(())
    }

    /// The address a socket on this node binds to: the first interface's.
    pub fn primary_address(&self, node: NodeId) -> Option<Ipv4Address> {
        self.nodes[node].interfaces.first().map(|i| i.address)
    }

    pub fn node_by_address(&self, address: Ipv4Address) -> Option<NodeId> {
        self.addresses.get(&address).copied()
    }

    /// The position of the `link` attachment among the node's devices, used
    /// to suffix capture file names.
    pub fn device_index(&self, link: LinkId, node: NodeId) -> Option<usize> {
        self.nodes[node]
            .interfaces
            .iter()
            .position(|interface| interface.link == link)
    }

    // --- routing ----------------------------------------------------------

    /// Computes shortest-path next-hop tables for every node from the global
    /// view of the topology. Ties break toward the earliest-created link, so
    /// every worker computes the same tables.
    pub fn populate_routing_tables(&mut self) {
        let n = self.nodes.len();
        let mut adjacency: Vec<Vec<(LinkId, NodeId)>> = vec![Vec::new(); n];
        for (link_id, link) in self.links.iter().enumerate() {
            match &link.kind {
                LinkKind::PointToPoint([a, b]) => {
                    adjacency[*a].push((link_id, *b));
                    adjacency[*b].push((link_id, *a));
                }
                LinkKind::Shared(nodes) => {
                    for &u in nodes {
                        for &v in nodes {
                            if u != v {
                                adjacency[u].push((link_id, v));
                            }
                        }
                    }
                }
            }
        }

        self.routes = (0..n).map(|src| first_hops(src, &adjacency)).collect();
    }

    fn route(&self, from: NodeId, destination: Ipv4Address) -> Option<Hop> {
        let dest_node = *self.addresses.get(&destination)?;
        self.routes.get(from)?.get(&dest_node).copied()
    }

    // --- sockets ----------------------------------------------------------

    /// Opens a raw IPv4 socket on `node` for the given protocol number,
    /// bound to the node's primary address.
    pub fn open_socket(&mut self, node: NodeId, protocol: u8) -> Result<SocketId, NetworkError> {
        let local = self
            .primary_address(node)
            .ok_or_else(|| NetworkError::BindFailed {
                node: self.nodes[node].label.clone(),
            })?;
        self.sockets.push(RawSocket {
            node,
            protocol,
            local,
            remote: None,
            open: true,
        });
        Ok(self.sockets.len() - 1)
    }

    /// Points the socket at a remote address. The owning application's
    /// `connected` callback fires as an event at the current virtual time.
    /// Unroutable remotes are an error; simulations assume routable
    /// destinations.
    pub fn connect_socket(
        &mut self,
        socket: SocketId,
        remote: Ipv4Address,
        app: AppId,
    ) -> Result<(), NetworkError> {
        let node = self
            .sockets
            .get(socket)
            .ok_or(NetworkError::UnknownSocket)?
            .node;
        if self.route(node, remote).is_none() {
            return Err(NetworkError::ConnectFailed {
                node: self.nodes[node].label.clone(),
                remote,
            });
        }
        let entry = &mut self.sockets[socket];
        entry.remote = Some(remote);
        entry.open = true;
        self.queue
            .schedule(Time::ZERO, Event::Connected { app, socket });
        Ok(())
    }

    pub fn close_socket(&mut self, socket: SocketId) {
        if let Some(entry) = self.sockets.get_mut(socket) {
            entry.open = false;
        }
    }

    pub fn socket_is_open(&self, socket: SocketId) -> bool {
        self.sockets.get(socket).map(|s| s.open).unwrap_or(false)
    }

    pub fn socket_local_address(&self, socket: SocketId) -> Option<Ipv4Address> {
        self.sockets.get(socket).map(|s| s.local)
    }

    /// Sends a transport payload to the connected remote. Returns the number
    /// of bytes handed to the wire.
    pub fn send(&mut self, socket: SocketId, payload: Message) -> Result<usize, NetworkError> {
        let entry = self.sockets.get(socket).ok_or(NetworkError::UnknownSocket)?;
        if !entry.open {
            return Err(NetworkError::SocketClosed);
        }
        let remote = entry.remote.ok_or(NetworkError::NotConnected)?;
        let (node, protocol, local) = (entry.node, entry.protocol, entry.local);
        self.send_from(node, protocol, local, remote, payload)
    }

    /// Sends a transport payload to an arbitrary destination, ignoring the
    /// socket's connected remote.
    pub fn send_to(
        &mut self,
        socket: SocketId,
        destination: Ipv4Address,
        payload: Message,
    ) -> Result<usize, NetworkError> {
        let entry = self.sockets.get(socket).ok_or(NetworkError::UnknownSocket)?;
        if !entry.open {
            return Err(NetworkError::SocketClosed);
        }
        let (node, protocol, local) = (entry.node, entry.protocol, entry.local);
        self.send_from(node, protocol, local, destination, payload)
    }

    fn send_from(
        &mut self,
        node: NodeId,
        protocol: u8,
        local: Ipv4Address,
        remote: Ipv4Address,
        payload: Message,
    ) -> Result<usize, NetworkError> {
        let header = Ipv4Header::for_payload(local, remote, protocol, payload.len())
            .map_err(|_| NetworkError::OversizedPayload)?;
        let hop = self
            .route(node, remote)
            .ok_or_else(|| NetworkError::NoRoute {
                node: self.nodes[node].label.clone(),
                remote,
            })?;
        let packet = Packet { header, payload };
        let wire_len = packet.wire_len();
        self.stats.transmitted += 1;
        self.transmit(node, hop, packet);
        Ok(wire_len)
    }

    // --- transmission and delivery ---------------------------------------

    fn transmit(&mut self, from: NodeId, hop: Hop, packet: Packet) {
        let now = self.queue.now();
        let wire_bits = packet.wire_len() as u64 * 8;
        let link = &mut self.links[hop.link];
        let slot = match &link.kind {
            LinkKind::PointToPoint([a, _]) if from == *a => 0,
            LinkKind::PointToPoint(_) => 1,
            LinkKind::Shared(_) => 0,
        };
        let start = now.max(link.busy_until[slot]);
        let tx_time = link.data_rate.interval_for_bits(wire_bits);
        link.busy_until[slot] = start + tx_time;
        let arrival = start + tx_time + link.delay;

        self.capture_packet(hop.link, from, start, &packet);
        self.queue.schedule_at(
            arrival,
            Event::Deliver {
                link: hop.link,
                node: hop.node,
                packet,
            },
        );
    }

    /// Processes a packet arriving at `node`: delivers it locally if this is
    /// its destination, otherwise forwards it along the next hop. Returns the
    /// sink application that should see a locally delivered packet.
    pub(crate) fn handle_delivery(
        &mut self,
        link: LinkId,
        node: NodeId,
        mut packet: Packet,
    ) -> Option<(AppId, Packet)> {
        let at = self.queue.now();
        self.capture_packet(link, node, at, &packet);

        let destination = packet.header.destination;
        if self.addresses.get(&destination) == Some(&node) {
            self.stats.delivered += 1;
            match self.sinks.get(&node) {
                Some(&app) => return Some((app, packet)),
                None => self.stats.delivered_unclaimed += 1,
            }
            return None;
        }

        if packet.header.time_to_live <= 1 {
            self.stats.dropped_ttl += 1;
            tracing::warn!(
                node = %self.nodes[node].label,
                %destination,
                "dropping packet with expired TTL"
            );
            return None;
        }
        packet.header.time_to_live -= 1;

        match self.route(node, destination) {
            Some(hop) => {
                self.stats.forwarded += 1;
                self.transmit(node, hop, packet);
            }
            None => {
                self.stats.dropped_no_route += 1;
                tracing::warn!(
                    node = %self.nodes[node].label,
                    %destination,
                    "dropping packet with no route"
                );
            }
        }
        None
    }

    // --- applications and timers ------------------------------------------

    /// Registers `app` to receive packets addressed to `node`.
    pub fn set_sink(&mut self, node: NodeId, app: AppId) {
        self.sinks.insert(node, app);
    }

    /// Schedules a timer callback on an application.
    pub fn schedule(&mut self, delay: Time, app: AppId, tag: Tag) -> EventHandle {
        self.queue.schedule(delay, Event::Timer { app, tag })
    }

    /// Schedules a timer callback at an absolute virtual time.
    pub fn schedule_at(&mut self, at: Time, app: AppId, tag: Tag) -> EventHandle {
        self.queue.schedule_at(at, Event::Timer { app, tag })
    }

    /// Cancels a pending timer. Idempotent.
    pub fn cancel(&mut self, handle: EventHandle) {
        self.queue.cancel(handle);
    }

    pub(crate) fn schedule_stop(&mut self, at: Time) {
        self.queue.schedule_at(at, Event::Stop);
    }

    pub(crate) fn pop_event(&mut self) -> Option<(Time, Event)> {
        self.queue.pop()
    }

    // --- captures ---------------------------------------------------------

    /// Starts writing a capture file for the `node`-side device of `link`.
    pub fn enable_capture(
        &mut self,
        link: LinkId,
        node: NodeId,
        path: &Path,
    ) -> io::Result<()> {
        let writer = PcapWriter::create(path)?;
        self.captures.insert((link, node), writer);
        Ok(())
    }

    fn capture_packet(&mut self, link: LinkId, node: NodeId, at: Time, packet: &Packet) {
        if let Some(writer) = self.captures.get_mut(&(link, node)) {
            if let Err(error) = writer.record(at, &packet.to_bytes()) {
                tracing::warn!(%error, "failed to write capture record");
            }
        }
    }

    pub fn flush_captures(&mut self) -> io::Result<()> {
        for writer in self.captures.values_mut() {
            writer.flush()?;
        }
        Ok(())
    }
}

impl Default for Internet {
    fn default() -> Self {
        Self::new()
    }
}

/// Breadth-first first-hop table from `src` over the adjacency lists.
fn first_hops(
    src: NodeId,
    adjacency: &[Vec<(LinkId, NodeId)>],
) -> FxHashMap<NodeId, Hop> {
    let mut hops = FxHashMap::default();
    let mut visited = vec![false; adjacency.len()];
    let mut frontier = VecDeque::new();
    visited[src] = true;

    for &(link, neighbor) in &adjacency[src] {
        if !visited[neighbor] {
            visited[neighbor] = true;
            hops.insert(neighbor, Hop { link, node: neighbor });
            frontier.push_back(neighbor);
        }
    }
    while let Some(current) = frontier.pop_front() {
        let via = hops[&current];
        for &(_, neighbor) in &adjacency[current] {
            if !visited[neighbor] {
                visited[neighbor] = true;
                hops.insert(neighbor, via);
                frontier.push_back(neighbor);
            }
        }
    }
    hops
}

#[derive(Debug, ThisError, Clone, PartialEq, Eq)]
pub enum NetworkError {
    #[error("no interface to bind a socket to on node {node:?}")]
    BindFailed { node: String },
    #[error("can't connect: no route from node {node:?} to {remote}")]
    ConnectFailed { node: String, remote: Ipv4Address },
    #[error("address {0} is assigned twice")]
    AddressInUse(Ipv4Address),
    #[error("socket is closed")]
    SocketClosed,
    #[error("socket has no remote address")]
    NotConnected,
    #[error("payload does not fit in a single datagram")]
    OversizedPayload,
    #[error("no route from node {node:?} to {remote}")]
    NoRoute { node: String, remote: Ipv4Address },
    #[error("unknown socket")]
    UnknownSocket,
}
