//! The receiving end of both attack and background traffic.

use dpws_core::internet::{AppId, Internet, NetworkError, Packet, SocketId, Tag};
use dpws_core::protocols::ipv4::Ipv4Address;
use dpws_core::protocols::utility::BytesExt;
use dpws_core::protocols::{icmp, tcp, udp};
use dpws_core::{Application, Message, NodeId, Time};
use std::any::Any;

/// One received packet, as much of it as the sink could parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketRecord {
    pub at: Time,
    pub protocol: u8,
    pub source: Ipv4Address,
    pub wire_len: usize,
    /// Transport ports when the payload carries a UDP or TCP header.
    pub source_port: Option<u16>,
    pub destination_port: Option<u16>,
    /// Whether a TCP payload had the SYN flag set.
    pub syn: bool,
}

/// Counts and optionally records every packet addressed to its node, and
/// answers requests aimed at its serving port with a fixed-size response.
///
/// This is the server side of the simulation: attack targets absorb floods
/// here, and benign clients get their responses from here. The full HTTP
/// exchange lives outside the simulator; this sink keeps the placement,
/// addressing, and reverse-path behavior that the traffic model needs.
pub struct PacketSink {
    node: NodeId,
    serving_port: u16,
    response_size: usize,
    keep_history: bool,
    socket: Option<SocketId>,
    packets: u64,
    bytes: u64,
    history: Vec<PacketRecord>,
}

/// Response payload for each well-formed request to the serving port.
const RESPONSE_BYTES: usize = 1_024;

impl PacketSink {
    pub const TAG_START: Tag = 1;

    pub fn new(node: NodeId, serving_port: u16) -> Self {
        Self {
            node,
            serving_port,
            response_size: RESPONSE_BYTES,
            keep_history: false,
            socket: None,
            packets: 0,
            bytes: 0,
            history: Vec::new(),
        }
    }

    /// Records every arrival for later inspection. Costs memory per packet,
    /// so only test scenarios turn it on.
    pub fn with_history(mut self) -> Self {
        self.keep_history = true;
        self
    }

    pub fn packets(&self) -> u64 {
        self.packets
    }

    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    pub fn history(&self) -> &[PacketRecord] {
        &self.history
    }

    fn record(&mut self, at: Time, packet: &Packet) -> PacketRecord {
        let mut record = PacketRecord {
            at,
            protocol: packet.header.protocol,
            source: packet.header.source,
            wire_len: packet.wire_len(),
            source_port: None,
            destination_port: None,
            syn: false,
        };
        match packet.header.protocol {
            udp::PROTOCOL_NUMBER => {
                let mut bytes = packet.payload.iter();
                record.source_port = bytes.next_u16_be();
                record.destination_port = bytes.next_u16_be();
            }
            tcp::PROTOCOL_NUMBER => {
                if let Ok(header) = tcp::TcpHeader::from_bytes(packet.payload.iter()) {
                    record.source_port = Some(header.source);
                    record.destination_port = Some(header.destination);
                    record.syn = header.is_syn();
                }
            }
            icmp::PROTOCOL_NUMBER => {}
            _ => {}
        }
        record
    }

    /// A request is a UDP datagram aimed at the serving port.
    fn is_request(&self, record: &PacketRecord) -> bool {
        record.protocol == udp::PROTOCOL_NUMBER
            && record.destination_port == Some(self.serving_port)
    }

    fn respond(&mut self, internet: &mut Internet, record: &PacketRecord) {
        let Some(socket) = self.socket else {
            return;
        };
        let Some(local) = internet.socket_local_address(socket) else {
            return;
        };
        let Some(client_port) = record.source_port else {
            return;
        };
        let mut response = Message::with_len(self.response_size);
        match udp::build_udp_header(
            local,
            self.serving_port,
            record.source,
            client_port,
            response.iter(),
            response.len(),
        ) {
            Ok(header) => response.prepend(&header),
            Err(error) => {
                tracing::warn!(%error, "failed to build response header");
                return;
            }
        }
        if let Err(error) = internet.send_to(socket, record.source, response) {
            tracing::warn!(%error, "failed to send response");
        }
    }
}

impl Application for PacketSink {
    fn timer(&mut self, internet: &mut Internet, _id: AppId, tag: Tag) -> Result<(), NetworkError> {
        if tag == Self::TAG_START && self.socket.is_none() {
            self.socket = Some(internet.open_socket(self.node, udp::PROTOCOL_NUMBER)?);
        }
        Ok(())
    }

    fn receive(
        &mut self,
        internet: &mut Internet,
        _id: AppId,
        packet: &Packet,
    ) -> Result<(), NetworkError> {
        let record = self.record(internet.now(), packet);
        self.packets += 1;
        self.bytes += record.wire_len as u64;
        if self.is_request(&record) {
            self.respond(internet, &record);
        }
        if self.keep_history {
            self.history.push(record);
        }
        Ok(())
    }

    fn stop(&mut self, internet: &mut Internet, _id: AppId) {
        if let Some(socket) = self.socket.take() {
            internet.close_socket(socket);
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
