use super::ipv4_address::Ipv4Address;
use crate::protocols::utility::{BytesExt, Checksum};
use thiserror::Error as ThisError;

/// The number of `u32` words in a basic IPv4 header
const BASE_WORDS: u8 = 5;
/// The number of `u8` bytes in a basic IPv4 header
pub const HEADER_OCTETS: u16 = BASE_WORDS as u16 * 4;
/// Initial time-to-live for locally generated packets
pub const DEFAULT_TTL: u8 = 64;

/// An IPv4 header without options, as described in RFC 791 p11 s3.1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ipv4Header {
    /// The length of the datagram in bytes
    pub total_length: u16,
    /// The number of remaining hops this datagram can take
    pub time_to_live: u8,
    /// The next level protocol in the data portion of the datagram
    pub protocol: u8,
    /// The source address
    pub source: Ipv4Address,
    /// The destination address
    pub destination: Ipv4Address,
}

impl Ipv4Header {
    /// Parses a header from a byte iterator.
    pub fn from_bytes(mut bytes: impl Iterator<Item = u8>) -> Result<Self, ParseError> {
        const HTS: ParseError = ParseError::HeaderTooShort;

        let mut checksum = Checksum::new();

        let version_and_ihl = bytes.next().ok_or(HTS)?;
        if version_and_ihl >> 4 != 4 {
            Err(ParseError::IncorrectIpv4Version)?
        }
        if version_and_ihl & 0b1111 != BASE_WORDS {
            Err(ParseError::InvalidHeaderLength)?
        }
        let type_of_service = bytes.next().ok_or(HTS)?;
        checksum.add_u8(version_and_ihl, type_of_service);

        let total_length = bytes.next_u16_be().ok_or(HTS)?;
        checksum.add_u16(total_length);

        let identification = bytes.next_u16_be().ok_or(HTS)?;
        checksum.add_u16(identification);

        let flags_and_fragment = bytes.next_u16_be().ok_or(HTS)?;
        checksum.add_u16(flags_and_fragment);

        let time_to_live = bytes.next().ok_or(HTS)?;
        let protocol = bytes.next().ok_or(HTS)?;
        checksum.add_u8(time_to_live, protocol);

        let expected_checksum = bytes.next_u16_be().ok_or(HTS)?;

        let source = Ipv4Address::from(bytes.next_u32_be().ok_or(HTS)?);
        checksum.add_u32(source.into());

        let destination = Ipv4Address::from(bytes.next_u32_be().ok_or(HTS)?);
        checksum.add_u32(destination.into());

        let actual_checksum = checksum.as_u16();
        if actual_checksum != expected_checksum {
            Err(ParseError::Checksum {
                expected: expected_checksum,
                actual: actual_checksum,
            })?
        }

        Ok(Self {
            total_length,
            time_to_live,
            protocol,
            source,
            destination,
        })
    }

    /// Serializes the header, recomputing the checksum.
    pub fn serialize(&self) -> [u8; HEADER_OCTETS as usize] {
        let version_and_ihl = (4u8 << 4) | BASE_WORDS;
        let mut checksum = Checksum::new();
        checksum.add_u8(version_and_ihl, 0);
        checksum.add_u16(self.total_length);
        checksum.add_u16(0); // identification
        checksum.add_u16(0); // flags and fragment offset
        checksum.add_u8(self.time_to_live, self.protocol);
        checksum.add_u32(self.source.into());
        checksum.add_u32(self.destination.into());

        let mut out = [0u8; HEADER_OCTETS as usize];
        out[0] = version_and_ihl;
        out[2..4].copy_from_slice(&self.total_length.to_be_bytes());
        out[8] = self.time_to_live;
        out[9] = self.protocol;
        out[10..12].copy_from_slice(&checksum.as_u16().to_be_bytes());
        out[12..16].copy_from_slice(&self.source.to_u32().to_be_bytes());
        out[16..20].copy_from_slice(&self.destination.to_u32().to_be_bytes());
        out
    }

    /// Builds the header for a locally generated datagram.
    pub fn for_payload(
        source: Ipv4Address,
        destination: Ipv4Address,
        protocol: u8,
        payload_length: usize,
    ) -> Result<Self, BuildHeaderError> {
        let total_length = payload_length
            .checked_add(HEADER_OCTETS as usize)
            .and_then(|length| u16::try_from(length).ok())
            .ok_or(BuildHeaderError::OverlyLongPayload)?;
        Ok(Self {
            total_length,
            time_to_live: DEFAULT_TTL,
            protocol,
            source,
            destination,
        })
    }
}

#[derive(Debug, ThisError, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    #[error("The IPv4 header is incomplete")]
    HeaderTooShort,
    #[error("Expected version 4 in IPv4 header")]
    IncorrectIpv4Version,
    #[error("Expected a 20 byte IPv4 header")]
    InvalidHeaderLength,
    #[error(
        "The header checksum {expected:#06x} does not match the calculated checksum {actual:#06x}"
    )]
    Checksum { expected: u16, actual: u16 },
}

#[derive(Debug, ThisError, Clone, Copy, PartialEq, Eq)]
pub enum BuildHeaderError {
    #[error("The payload is longer than an IPv4 datagram allows")]
    OverlyLongPayload,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips() -> anyhow::Result<()> {
        let header = Ipv4Header::for_payload(
            [10, 1, 1, 1].into(),
            [30, 1, 2, 2].into(),
            17,
            980,
        )?;
        assert_eq!(header.total_length, 1000);
        let serial = header.serialize();
        let parsed = Ipv4Header::from_bytes(serial.iter().copied())?;
        assert_eq!(parsed, header);
        Ok(())
    }

    #[test]
    fn matches_etherparse() -> anyhow::Result<()> {
        let header = Ipv4Header::for_payload(
            [10, 1, 1, 1].into(),
            [30, 1, 2, 2].into(),
            17,
            8,
        )?;
        let mut ours = header.serialize();

        let mut reference = etherparse::Ipv4Header::new(
            8,
            DEFAULT_TTL,
            etherparse::IpNumber::Udp,
            [10, 1, 1, 1],
            [30, 1, 2, 2],
        );
        reference.header_checksum = reference.calc_header_checksum()?;
        let mut serial = vec![];
        reference.write(&mut serial)?;

        // etherparse sets the don't-fragment flag; ours leaves flags zero.
        // Blank out flags and checksums on both sides and compare the rest.
        serial[6] = 0;
        serial[10] = 0;
        serial[11] = 0;
        ours[10] = 0;
        ours[11] = 0;
        assert_eq!(&ours[..], &serial[..]);
        Ok(())
    }

    #[test]
    fn rejects_corruption() {
        let header =
            Ipv4Header::for_payload([10, 1, 1, 1].into(), [30, 1, 2, 2].into(), 6, 0).unwrap();
        let mut serial = header.serialize();
        serial[12] ^= 0xff;
        assert!(matches!(
            Ipv4Header::from_bytes(serial.iter().copied()),
            Err(ParseError::Checksum { .. })
        ));
    }
}
