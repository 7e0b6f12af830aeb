use crate::protocols::ipv4::Ipv4Address;
use crate::protocols::utility::{BytesExt, Checksum};
use thiserror::Error as ThisError;

/// The number of bytes in a TCP header without options
pub const HEADER_OCTETS: u16 = 20;

/// The SYN control bit
pub const SYN: u8 = 0b0000_0010;

/// The advertised receive window on crafted segments
const WINDOW: u16 = 65_535;

/// A TCP header without options, as described in RFC 9293 s3.1.
///
/// Flood sources craft bare SYN segments directly; no connection state ever
/// backs these headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TcpHeader {
    /// The source port
    pub source: u16,
    /// The destination port
    pub destination: u16,
    /// The sequence number
    pub sequence: u32,
    /// The acknowledgment number
    pub acknowledgment: u32,
    /// The control bits
    pub flags: u8,
    /// The advertised receive window
    pub window: u16,
    /// The TCP checksum
    pub checksum: u16,
}

impl TcpHeader {
    pub fn is_syn(&self) -> bool {
        self.flags & SYN != 0
    }

    /// Parses a TCP header from an iterator of bytes. The checksum is read
    /// but not validated here; crafted segments carry no payload.
    pub fn from_bytes(mut packet: impl Iterator<Item = u8>) -> Result<Self, ParseError> {
        const HTS: ParseError = ParseError::HeaderTooShort;

        let source = packet.next_u16_be().ok_or(HTS)?;
        let destination = packet.next_u16_be().ok_or(HTS)?;
        let sequence = packet.next_u32_be().ok_or(HTS)?;
        let acknowledgment = packet.next_u32_be().ok_or(HTS)?;
        let offset_and_reserved = packet.next().ok_or(HTS)?;
        if offset_and_reserved >> 4 != (HEADER_OCTETS / 4) as u8 {
            Err(ParseError::UnexpectedOptions)?
        }
        let flags = packet.next().ok_or(HTS)?;
        let window = packet.next_u16_be().ok_or(HTS)?;
        let checksum = packet.next_u16_be().ok_or(HTS)?;
        let _urgent = packet.next_u16_be().ok_or(HTS)?;

        Ok(Self {
            source,
            destination,
            sequence,
            acknowledgment,
            flags,
            window,
            checksum,
        })
    }
}

/// Creates a serialized, payload-less TCP SYN segment with the values
/// provided, checksummed over the IPv4 pseudo header.
pub fn build_tcp_syn_header(
    source_address: Ipv4Address,
    source_port: u16,
    destination_address: Ipv4Address,
    destination_port: u16,
) -> Vec<u8> {
    let offset_and_reserved = ((HEADER_OCTETS / 4) as u8) << 4;

    let mut checksum = Checksum::new();
    checksum.add_u16(source_port);
    checksum.add_u16(destination_port);
    checksum.add_u32([0; 4]); // sequence number
    checksum.add_u32([0; 4]); // acknowledgment number
    checksum.add_u8(offset_and_reserved, SYN);
    checksum.add_u16(WINDOW);
    checksum.add_u16(0); // urgent pointer
    // Pseudo header
    checksum.add_u32(source_address.into());
    checksum.add_u32(destination_address.into());
    checksum.add_u8(0, super::PROTOCOL_NUMBER);
    checksum.add_u16(HEADER_OCTETS);

    let mut out = Vec::with_capacity(HEADER_OCTETS as usize);
    out.extend_from_slice(&source_port.to_be_bytes());
    out.extend_from_slice(&destination_port.to_be_bytes());
    out.extend_from_slice(&0u32.to_be_bytes());
    out.extend_from_slice(&0u32.to_be_bytes());
    out.push(offset_and_reserved);
    out.push(SYN);
    out.extend_from_slice(&WINDOW.to_be_bytes());
    out.extend_from_slice(&checksum.as_u16().to_be_bytes());
    out.extend_from_slice(&0u16.to_be_bytes());
    out
}

#[derive(Debug, ThisError, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    #[error("Too few bytes to constitute a TCP header")]
    HeaderTooShort,
    #[error("The segment carries options, which crafted floods never emit")]
    UnexpectedOptions,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_bare_syn() -> anyhow::Result<()> {
        let header = build_tcp_syn_header(
            [10, 1, 1, 2].into(),
            4444,
            [30, 1, 2, 2].into(),
            80,
        );
        assert_eq!(header.len(), HEADER_OCTETS as usize);

        let parsed = TcpHeader::from_bytes(header.iter().copied())?;
        assert_eq!(parsed.source, 4444);
        assert_eq!(parsed.destination, 80);
        assert_eq!(parsed.sequence, 0);
        assert_eq!(parsed.acknowledgment, 0);
        assert!(parsed.is_syn());
        assert_eq!(parsed.flags, SYN);
        Ok(())
    }

    #[test]
    fn checksum_covers_pseudo_header() {
        let a = build_tcp_syn_header([10, 1, 1, 2].into(), 1, [30, 1, 2, 2].into(), 80);
        let b = build_tcp_syn_header([10, 1, 1, 3].into(), 1, [30, 1, 2, 2].into(), 80);
        assert_ne!(&a[16..18], &b[16..18]);
    }
}
