//! The Internet Protocol, version 4: addresses, subnetting, and the header
//! wire format.

pub mod ipv4_address;
pub mod ipv4_parsing;
pub mod subnetting;

pub use ipv4_address::Ipv4Address;
pub use ipv4_parsing::{Ipv4Header, DEFAULT_TTL, HEADER_OCTETS};
pub use subnetting::{Ipv4Mask, Ipv4Net};
