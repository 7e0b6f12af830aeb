//! The retargetable On/Off traffic source.
//!
//! One instance drives one attack vector on one attacker host. The source
//! alternates between emitting constant-bit-rate traffic and idling, crafts
//! vector-specific packets over a raw IPv4 socket, and can atomically rebind
//! its destination mid-flight: a retarget closes the socket, clears pending
//! events, opens a fresh socket toward the new remote, and resumes sending
//! when the connect callback fires. Chained retargets are what turn a fleet
//! of these sources into a pulse wave.

use crate::config::AttackVector;
use crate::schedule::AttackSchedule;
use dpws_core::internet::{AppId, Internet, NetworkError, SocketId, Tag};
use dpws_core::protocols::ipv4::Ipv4Address;
use dpws_core::protocols::{icmp, ipv4, tcp, udp};
use dpws_core::random::rng_from_seed;
use dpws_core::scheduler::EventHandle;
use dpws_core::{Application, DataRate, Message, Time};
use rand::rngs::SmallRng;
use rand::Rng;
use std::any::Any;
use std::sync::Arc;

// These offsets are fitted so that the size observed in the capture output
// equals the configured packet size, because that configured size drives the
// inter-packet interval and thus the effective data rate. They are calibrated
// against this kernel's framing; a port to a kernel with different framing
// must re-measure a capture and refit them.
pub const UDP_PACKET_SIZE_OFFSET: u32 = 30;
pub const ICMP_PACKET_SIZE_OFFSET: u32 = 30;
/// SYN segments are empty, so the configured packet size is ignored and this
/// fixed on-wire size feeds the interval computation instead.
pub const TCP_SYN_WIRE_SIZE: u32 = 42;

/// How a source picks the ports it stamps into crafted headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortPolicy {
    /// Draw uniformly from the full port range on every packet.
    Random,
    /// Use this port verbatim.
    Fixed(u16),
}

/// The source's lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceState {
    Init,
    Connecting,
    On,
    Off,
    Closed,
}

/// Construction parameters for one source, already resolved against the
/// attacker-node and global defaults.
#[derive(Debug, Clone)]
pub struct OnOffConfig {
    pub node: dpws_core::NodeId,
    pub vector: AttackVector,
    pub data_rate: DataRate,
    pub packet_size: u32,
    pub source_port: PortPolicy,
    pub destination_port: PortPolicy,
    pub on_time: Time,
    pub off_time: Time,
    pub skip_first_off: bool,
    pub skip_off_after_retarget: bool,
    pub max_data_rate_fluctuation: f64,
    /// Total byte budget; 0 means unlimited.
    pub max_bytes: u64,
    /// The targets this source cycles through; the source starts aimed at
    /// index 0.
    pub targets: Vec<Ipv4Address>,
    /// This vector's position in the shared schedule.
    pub vector_index: usize,
    pub schedule: Arc<AttackSchedule>,
    /// Per-source seed for port randomization and rate fluctuation.
    pub seed: u64,
}

pub struct OnOffRetarget {
    config: OnOffConfig,
    state: SourceState,
    remote: Ipv4Address,
    target_index: usize,
    socket: Option<SocketId>,
    skip_first_off: bool,
    send_event: Option<EventHandle>,
    toggle_event: Option<EventHandle>,
    /// Bits already earned toward the next packet when an On period ended
    /// mid-gap; consumed by the first send gap of the next On period.
    residual_bits: u64,
    /// Virtual time of the last send, or of On entry if nothing was sent yet.
    last_progress: Time,
    total_bytes: u64,
    packets_sent: u64,
    port_seed: u64,
    gap_rng: SmallRng,
}

impl OnOffRetarget {
    pub const TAG_START: Tag = 1;
    pub const TAG_SEND: Tag = 2;
    pub const TAG_TOGGLE: Tag = 3;
    pub const TAG_RETARGET: Tag = 4;

    pub fn new(config: OnOffConfig) -> Self {
        let remote = config.targets[0];
        let gap_rng = rng_from_seed(config.seed);
        let port_seed = config.seed;
        let skip_first_off = config.skip_first_off;
        Self {
            config,
            state: SourceState::Init,
            remote,
            target_index: 0,
            socket: None,
            skip_first_off,
            send_event: None,
            toggle_event: None,
            residual_bits: 0,
            last_progress: Time::ZERO,
            total_bytes: 0,
            packets_sent: 0,
            port_seed,
            gap_rng,
        }
    }

    pub fn state(&self) -> SourceState {
        self.state
    }

    pub fn remote(&self) -> Ipv4Address {
        self.remote
    }

    pub fn target_index(&self) -> usize {
        self.target_index
    }

    pub fn socket(&self) -> Option<SocketId> {
        self.socket
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    pub fn packets_sent(&self) -> u64 {
        self.packets_sent
    }

    /// Rebinds the source to a new remote. The old socket is closed, pending
    /// send and toggle events are cancelled, and the source comes back up in
    /// the On state once the new socket's connect callback fires.
    pub fn retarget(
        &mut self,
        internet: &mut Internet,
        id: AppId,
        remote: Ipv4Address,
    ) -> Result<(), NetworkError> {
        if let Some(socket) = self.socket.take() {
            internet.close_socket(socket);
        }
        self.cancel_events(internet);
        self.remote = remote;
        self.create_socket(internet, id)
    }

    fn create_socket(&mut self, internet: &mut Internet, id: AppId) -> Result<(), NetworkError> {
        let socket = internet.open_socket(self.config.node, self.config.vector.protocol_number())?;
        internet.connect_socket(socket, self.remote, id)?;
        self.socket = Some(socket);
        self.state = SourceState::Connecting;
        Ok(())
    }

    fn cancel_events(&mut self, internet: &mut Internet) {
        if let Some(handle) = self.send_event.take() {
            internet.cancel(handle);
        }
        if let Some(handle) = self.toggle_event.take() {
            internet.cancel(handle);
        }
    }

    fn start_sending(&mut self, internet: &mut Internet, id: AppId) {
        self.state = SourceState::On;
        self.last_progress = internet.now();
        self.schedule_next_send(internet, id);
        self.toggle_event = Some(internet.schedule(self.config.on_time, id, Self::TAG_TOGGLE));
    }

    fn schedule_off_expiry(&mut self, internet: &mut Internet, id: AppId) {
        self.state = SourceState::Off;
        self.toggle_event = Some(internet.schedule(self.config.off_time, id, Self::TAG_TOGGLE));
    }

    /// The size this packet occupies on the wire, used for the rate
    /// computation and the byte budget.
    fn size_for_rate(&self) -> u64 {
        match self.config.vector {
            AttackVector::TcpSynFlooding => TCP_SYN_WIRE_SIZE as u64,
            _ => self.config.packet_size as u64,
        }
    }

    fn schedule_next_send(&mut self, internet: &mut Internet, id: AppId) {
        if self.config.max_bytes != 0 && self.total_bytes >= self.config.max_bytes {
            self.shut_down(internet);
            return;
        }
        let packet_bits = self.size_for_rate() * 8;
        let bits = packet_bits.saturating_sub(self.residual_bits).max(1);
        let mut gap = self.config.data_rate.interval_for_bits(bits);
        if self.config.max_data_rate_fluctuation > 0.0 {
            // uniform in [-f, +f], drawn as reference-style [0, 2f) - f
            let fluctuation = self.config.max_data_rate_fluctuation;
            let delta = self.gap_rng.gen_range(0.0..2.0 * fluctuation) - fluctuation;
            gap = gap.mul_f64(1.0 + delta);
        }
        self.send_event = Some(internet.schedule(gap, id, Self::TAG_SEND));
    }

    fn send_packet(&mut self, internet: &mut Internet, id: AppId) {
        let Some(socket) = self.socket else {
            tracing::warn!("send event fired with no socket, skipping");
            return;
        };
        let Some(local) = internet.socket_local_address(socket) else {
            tracing::warn!("send event fired on an unknown socket, skipping");
            return;
        };

        let payload = self.build_payload(local);
        let wire_len =
            ipv4::HEADER_OCTETS as u64 + payload.len() as u64;
        if self.config.max_bytes != 0 && self.total_bytes + wire_len > self.config.max_bytes {
            // the budget does not cover another whole packet
            self.shut_down(internet);
            return;
        }

        match internet.send(socket, payload) {
            Ok(sent) => {
                self.total_bytes += sent as u64;
                self.packets_sent += 1;
            }
            Err(error) => tracing::warn!(%error, "send failed, source continues"),
        }
        self.residual_bits = 0;
        self.last_progress = internet.now();
        self.schedule_next_send(internet, id);
    }

    fn build_payload(&mut self, local: Ipv4Address) -> Message {
        match self.config.vector {
            AttackVector::UdpFlooding => {
                let length = self
                    .config
                    .packet_size
                    .saturating_sub(UDP_PACKET_SIZE_OFFSET) as usize;
                let mut message = Message::with_len(length);
                let source_port = self.draw_port(self.config.source_port);
                let destination_port = self.draw_port(self.config.destination_port);
                match udp::build_udp_header(
                    local,
                    source_port,
                    self.remote,
                    destination_port,
                    message.iter(),
                    length,
                ) {
                    Ok(header) => message.prepend(&header),
                    Err(error) => tracing::warn!(%error, "failed to build UDP header"),
                }
                message
            }
            AttackVector::IcmpFlooding => {
                let length = self
                    .config
                    .packet_size
                    .saturating_sub(ICMP_PACKET_SIZE_OFFSET) as usize;
                let mut message = Message::with_len(length);
                let header = icmp::build_icmp_echo_header(0, 0, message.iter());
                message.prepend(&header);
                message
            }
            AttackVector::TcpSynFlooding => {
                // empty segment carrying only the SYN header
                let source_port = self.draw_port(self.config.source_port);
                let destination_port = self.draw_port(self.config.destination_port);
                Message::new(tcp::build_tcp_syn_header(
                    local,
                    source_port,
                    self.remote,
                    destination_port,
                ))
            }
        }
    }

    /// Resolves a port policy to a concrete port. Random draws reseed a fresh
    /// generator from an incrementing per-source seed, so sources with
    /// different seeds never walk the same port sequence.
    fn draw_port(&mut self, policy: PortPolicy) -> u16 {
        match policy {
            PortPolicy::Fixed(port) => port,
            PortPolicy::Random => {
                let mut rng = rng_from_seed(self.port_seed);
                self.port_seed = self.port_seed.wrapping_add(1);
                rng.gen_range(0..=u16::MAX)
            }
        }
    }

    fn handle_toggle(&mut self, internet: &mut Internet, id: AppId) {
        match self.state {
            SourceState::On => {
                // bank the partially earned packet before going quiet
                if let Some(handle) = self.send_event.take() {
                    internet.cancel(handle);
                    let elapsed = internet.now().saturating_sub(self.last_progress);
                    let earned = (elapsed.as_secs_f64()
                        * self.config.data_rate.bits_per_sec() as f64)
                        as u64;
                    let cap = self.size_for_rate() * 8;
                    self.residual_bits = (self.residual_bits + earned).min(cap);
                }
                self.schedule_off_expiry(internet, id);
            }
            SourceState::Off => self.start_sending(internet, id),
            _ => {}
        }
    }

    fn handle_retarget(&mut self, internet: &mut Internet, id: AppId) -> Result<(), NetworkError> {
        let next_index = self.config.schedule.next_target_index(self.target_index);
        self.target_index = next_index;
        let next_target = self.config.targets[next_index];
        self.retarget(internet, id, next_target)?;
        let interval = self
            .config
            .schedule
            .retarget_interval(self.config.vector_index, next_index);
        internet.schedule(interval, id, Self::TAG_RETARGET);
        Ok(())
    }

    fn shut_down(&mut self, internet: &mut Internet) {
        self.cancel_events(internet);
        if let Some(socket) = self.socket {
            internet.close_socket(socket);
        }
        self.state = SourceState::Closed;
    }
}

impl Application for OnOffRetarget {
    fn timer(&mut self, internet: &mut Internet, id: AppId, tag: Tag) -> Result<(), NetworkError> {
        match tag {
            Self::TAG_START => {
                if self.socket.is_none() {
                    self.create_socket(internet, id)?;
                }
                Ok(())
            }
            Self::TAG_SEND => {
                self.send_event = None;
                self.send_packet(internet, id);
                Ok(())
            }
            Self::TAG_TOGGLE => {
                self.toggle_event = None;
                self.handle_toggle(internet, id);
                Ok(())
            }
            Self::TAG_RETARGET => self.handle_retarget(internet, id),
            _ => Ok(()),
        }
    }

    fn connected(
        &mut self,
        internet: &mut Internet,
        id: AppId,
        socket: SocketId,
    ) -> Result<(), NetworkError> {
        if self.socket != Some(socket) {
            // callback from a socket a retarget already cycled out
            return Ok(());
        }
        if self.skip_first_off || self.config.skip_off_after_retarget {
            self.skip_first_off = false;
            self.start_sending(internet, id);
        } else {
            self.schedule_off_expiry(internet, id);
        }
        Ok(())
    }

    fn stop(&mut self, internet: &mut Internet, _id: AppId) {
        if self.state == SourceState::Closed {
            return;
        }
        self.cancel_events(internet);
        match self.socket {
            Some(socket) => internet.close_socket(socket),
            None => tracing::warn!("on/off source found no socket to close at stop"),
        }
        self.state = SourceState::Closed;
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AttackVectorConfig;

    fn vector_config(vector: AttackVector, burst: f64, switch: f64) -> AttackVectorConfig {
        AttackVectorConfig {
            vector,
            burst_duration_s: burst,
            target_switch_duration_s: switch,
            data_rate: None,
            packet_size: -1,
            source_port: -2,
            destination_port: -2,
            max_data_rate_fluctuation: -1.0,
        }
    }

    /// An attacker node wired to two routable targets.
    fn testbed() -> (Internet, OnOffConfig) {
        let mut internet = Internet::new();
        let attacker = internet.add_node("bot");
        let first = internet.add_node("victim-1");
        let second = internet.add_node("victim-2");
        let rate = dpws_core::DataRate::from_bits_per_sec(100_000_000);
        let delay = Time::from_millis(1);
        let to_first = internet.connect(attacker, first, rate, delay);
        let to_second = internet.connect(attacker, second, rate, delay);
        internet
            .assign_address(attacker, to_first, [10, 0, 1, 1].into())
            .unwrap();
        internet
            .assign_address(first, to_first, [10, 0, 1, 2].into())
            .unwrap();
        internet
            .assign_address(attacker, to_second, [10, 0, 2, 1].into())
            .unwrap();
        internet
            .assign_address(second, to_second, [10, 0, 2, 2].into())
            .unwrap();
        internet.populate_routing_tables();

        let targets: Vec<Ipv4Address> = vec![[10, 0, 1, 2].into(), [10, 0, 2, 2].into()];
        let schedule = Arc::new(AttackSchedule::new(
            &[vector_config(AttackVector::UdpFlooding, 1.0, 0.0)],
            targets.len(),
        ));
        let config = OnOffConfig {
            node: attacker,
            vector: AttackVector::UdpFlooding,
            data_rate: DataRate::from_bits_per_sec(1_000_000),
            packet_size: 1000,
            source_port: PortPolicy::Random,
            destination_port: PortPolicy::Fixed(80),
            on_time: Time::from_secs(1),
            off_time: Time::from_secs(1),
            skip_first_off: true,
            skip_off_after_retarget: true,
            max_data_rate_fluctuation: 0.0,
            max_bytes: 0,
            targets,
            vector_index: 0,
            schedule,
            seed: 7,
        };
        (internet, config)
    }

    #[test]
    fn start_connects_and_enters_on() {
        let (mut internet, config) = testbed();
        let mut source = OnOffRetarget::new(config);
        assert_eq!(source.state(), SourceState::Init);

        source.timer(&mut internet, 0, OnOffRetarget::TAG_START).unwrap();
        assert_eq!(source.state(), SourceState::Connecting);

        let socket = source.socket().unwrap();
        source.connected(&mut internet, 0, socket).unwrap();
        // skip_first_off puts the source straight into On
        assert_eq!(source.state(), SourceState::On);
        assert!(source.send_event.is_some());
        assert!(source.toggle_event.is_some());
    }

    #[test]
    fn retarget_is_idempotent() {
        let (mut internet, config) = testbed();
        let second_target = config.targets[1];
        let mut source = OnOffRetarget::new(config);
        source.timer(&mut internet, 0, OnOffRetarget::TAG_START).unwrap();
        let first_socket = source.socket().unwrap();
        source.connected(&mut internet, 0, first_socket).unwrap();

        source.retarget(&mut internet, 0, second_target).unwrap();
        let observable = |source: &OnOffRetarget, internet: &Internet| {
            (
                source.state(),
                source.remote(),
                source.socket().map(|s| internet.socket_is_open(s)),
            )
        };
        let after_one = observable(&source, &internet);
        assert!(!internet.socket_is_open(first_socket));

        source.retarget(&mut internet, 0, second_target).unwrap();
        assert_eq!(observable(&source, &internet), after_one);
    }

    #[test]
    fn stale_connect_callbacks_are_ignored() {
        let (mut internet, config) = testbed();
        let second_target = config.targets[1];
        let mut source = OnOffRetarget::new(config);
        source.timer(&mut internet, 0, OnOffRetarget::TAG_START).unwrap();
        let stale = source.socket().unwrap();
        source.retarget(&mut internet, 0, second_target).unwrap();

        source.connected(&mut internet, 0, stale).unwrap();
        assert_eq!(source.state(), SourceState::Connecting);

        let live = source.socket().unwrap();
        source.connected(&mut internet, 0, live).unwrap();
        assert_eq!(source.state(), SourceState::On);
    }

    #[test]
    fn fixed_ports_are_used_verbatim() {
        let (_, config) = testbed();
        let mut source = OnOffRetarget::new(config);
        assert_eq!(source.draw_port(PortPolicy::Fixed(4444)), 4444);
        assert_eq!(source.draw_port(PortPolicy::Fixed(0)), 0);
    }

    #[test]
    fn random_ports_differ_across_seeds() {
        let (_, config) = testbed();
        let mut first = OnOffRetarget::new(OnOffConfig { seed: 1, ..config.clone() });
        let mut second = OnOffRetarget::new(OnOffConfig { seed: 1_000, ..config });
        let draws_first: Vec<u16> = (0..16).map(|_| first.draw_port(PortPolicy::Random)).collect();
        let draws_second: Vec<u16> =
            (0..16).map(|_| second.draw_port(PortPolicy::Random)).collect();
        assert_ne!(draws_first, draws_second);
    }

    #[test]
    fn syn_rate_uses_the_wire_constant() {
        let (_, config) = testbed();
        let source = OnOffRetarget::new(OnOffConfig {
            vector: AttackVector::TcpSynFlooding,
            packet_size: 9_999,
            ..config
        });
        assert_eq!(source.size_for_rate(), TCP_SYN_WIRE_SIZE as u64);
    }
}
