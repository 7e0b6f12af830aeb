//! The wire formats the simulator speaks.
//!
//! Traffic sources operate over raw IPv4 sockets and construct transport
//! headers themselves, so each protocol module here is a header
//! builder/parser pair rather than a full protocol state machine.

pub mod icmp;
pub mod ipv4;
pub mod tcp;
pub mod udp;
pub mod utility;

pub use icmp::IcmpEchoHeader;
pub use ipv4::{Ipv4Address, Ipv4Header, Ipv4Mask, Ipv4Net};
pub use tcp::TcpHeader;
pub use udp::UdpHeader;
