//! The User Datagram Protocol header format.

pub mod udp_parsing;

pub use udp_parsing::{build_udp_header, UdpHeader, HEADER_OCTETS};

/// The IP protocol number assigned to UDP
pub const PROTOCOL_NUMBER: u8 = 17;
