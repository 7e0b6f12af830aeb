//! The benign background client.

use dpws_core::internet::{AppId, Internet, NetworkError, SocketId, Tag};
use dpws_core::protocols::ipv4::Ipv4Address;
use dpws_core::protocols::udp;
use dpws_core::random::rng_from_seed;
use dpws_core::{Application, Message, NodeId, Time};
use rand::rngs::SmallRng;
use rand::Rng;
use std::any::Any;

/// Size of one request datagram's payload.
const REQUEST_BYTES: usize = 128;
/// The local port responses come back to.
const CLIENT_PORT: u16 = 49_152;

/// Periodically asks its server peer for a page and then "reads" for a
/// uniformly drawn pause before asking again. The stand-in for the external
/// HTTP traffic generator: same placement, same peer wiring, same
/// request/response shape on the wire.
pub struct RequestClient {
    node: NodeId,
    server: Ipv4Address,
    server_port: u16,
    max_reading_time: Time,
    socket: Option<SocketId>,
    requests_sent: u64,
    rng: SmallRng,
}

impl RequestClient {
    pub const TAG_START: Tag = 1;
    pub const TAG_REQUEST: Tag = 2;

    pub fn new(
        node: NodeId,
        server: Ipv4Address,
        server_port: u16,
        max_reading_time: Time,
        seed: u64,
    ) -> Self {
        Self {
            node,
            server,
            server_port,
            max_reading_time,
            socket: None,
            requests_sent: 0,
            rng: rng_from_seed(seed),
        }
    }

    pub fn requests_sent(&self) -> u64 {
        self.requests_sent
    }

    fn send_request(&mut self, internet: &mut Internet) {
        let Some(socket) = self.socket else {
            return;
        };
        let Some(local) = internet.socket_local_address(socket) else {
            return;
        };
        let mut request = Message::with_len(REQUEST_BYTES);
        match udp::build_udp_header(
            local,
            CLIENT_PORT,
            self.server,
            self.server_port,
            request.iter(),
            request.len(),
        ) {
            Ok(header) => request.prepend(&header),
            Err(error) => {
                tracing::warn!(%error, "failed to build request header");
                return;
            }
        }
        match internet.send(socket, request) {
            Ok(_) => self.requests_sent += 1,
            Err(error) => tracing::warn!(%error, "request send failed"),
        }
    }

    fn reading_pause(&mut self) -> Time {
        let max = self.max_reading_time.as_secs_f64().max(1.0);
        Time::from_secs_f64(self.rng.gen_range(1.0..=max))
    }
}

impl Application for RequestClient {
    fn timer(&mut self, internet: &mut Internet, id: AppId, tag: Tag) -> Result<(), NetworkError> {
        match tag {
            Self::TAG_START => {
                let socket = internet.open_socket(self.node, udp::PROTOCOL_NUMBER)?;
                internet.connect_socket(socket, self.server, id)?;
                self.socket = Some(socket);
            }
            Self::TAG_REQUEST => {
                self.send_request(internet);
                let pause = self.reading_pause();
                internet.schedule(pause, id, Self::TAG_REQUEST);
            }
            _ => {}
        }
        Ok(())
    }

    fn connected(
        &mut self,
        internet: &mut Internet,
        id: AppId,
        _socket: SocketId,
    ) -> Result<(), NetworkError> {
        internet.schedule(Time::ZERO, id, Self::TAG_REQUEST);
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
