use crate::protocols::ipv4::Ipv4Address;
use crate::protocols::utility::{BytesExt, Checksum};
use thiserror::Error as ThisError;

/// The number of bytes in a UDP header
pub const HEADER_OCTETS: u16 = 8;

/// A UDP header, either one that was parsed or one we are going to serialize.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UdpHeader {
    /// The source port
    pub source: u16,
    /// The destination port
    pub destination: u16,
    /// The length of the UDP packet in bytes, including the header
    pub length: u16,
    /// The UDP checksum
    pub checksum: u16,
}

impl UdpHeader {
    /// Parses a UDP header from an iterator of bytes. The checksum is read
    /// but not validated; flood payloads are all-zero and carry no meaning.
    pub fn from_bytes(mut packet: impl Iterator<Item = u8>) -> Result<Self, ParseError> {
        const HTS: ParseError = ParseError::HeaderTooShort;
        Ok(Self {
            source: packet.next_u16_be().ok_or(HTS)?,
            destination: packet.next_u16_be().ok_or(HTS)?,
            length: packet.next_u16_be().ok_or(HTS)?,
            checksum: packet.next_u16_be().ok_or(HTS)?,
        })
    }
}

/// Creates a serialized UDP packet header with the values provided.
pub fn build_udp_header(
    source_address: Ipv4Address,
    source_port: u16,
    destination_address: Ipv4Address,
    destination_port: u16,
    mut text: impl Iterator<Item = u8>,
    text_len: usize,
) -> Result<Vec<u8>, BuildHeaderError> {
    let mut checksum = Checksum::new();
    checksum.accumulate_remainder(&mut text);

    let length: u16 = (text_len + HEADER_OCTETS as usize)
        .try_into()
        .map_err(|_| BuildHeaderError::OverlyLongPayload)?;

    // Once for the header, again for the pseudo header
    checksum.add_u16(length);
    checksum.add_u16(length);

    checksum.add_u32(source_address.into());
    checksum.add_u32(destination_address.into());
    checksum.add_u8(0, super::PROTOCOL_NUMBER);
    checksum.add_u16(source_port);
    checksum.add_u16(destination_port);

    let mut out = Vec::with_capacity(HEADER_OCTETS as usize);
    out.extend_from_slice(&source_port.to_be_bytes());
    out.extend_from_slice(&destination_port.to_be_bytes());
    out.extend_from_slice(&length.to_be_bytes());
    out.extend_from_slice(&checksum.as_u16().to_be_bytes());
    Ok(out)
}

#[derive(Debug, ThisError, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    #[error("Too few bytes to constitute a UDP header")]
    HeaderTooShort,
}

#[derive(Debug, ThisError, Clone, Copy, PartialEq, Eq)]
pub enum BuildHeaderError {
    #[error("The UDP payload is longer than can fit into a single packet")]
    OverlyLongPayload,
}
