use crate::protocols::utility::{BytesExt, Checksum};
use thiserror::Error as ThisError;

/// The number of bytes in an ICMP echo header
pub const HEADER_OCTETS: u16 = 8;

/// ICMP message type for an echo request
pub const ECHO_REQUEST: u8 = 8;

/// An ICMP echo header, as described in RFC 792.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IcmpEchoHeader {
    /// The message type; 8 for an echo request
    pub message_type: u8,
    /// The message code; echo has no codes, so 0
    pub code: u8,
    /// The ICMP checksum over the header and payload
    pub checksum: u16,
    /// Aids in matching echos and replies
    pub identifier: u16,
    /// Aids in matching echos and replies
    pub sequence: u16,
}

impl IcmpEchoHeader {
    /// Parses an ICMP echo header from an iterator of bytes and validates the
    /// checksum over the remaining payload.
    pub fn from_bytes(mut packet: impl Iterator<Item = u8>) -> Result<Self, ParseError> {
        const HTS: ParseError = ParseError::HeaderTooShort;

        let message_type = packet.next().ok_or(HTS)?;
        let code = packet.next().ok_or(HTS)?;
        let expected_checksum = packet.next_u16_be().ok_or(HTS)?;
        let identifier = packet.next_u16_be().ok_or(HTS)?;
        let sequence = packet.next_u16_be().ok_or(HTS)?;

        let mut checksum = Checksum::new();
        checksum.add_u8(message_type, code);
        checksum.add_u16(identifier);
        checksum.add_u16(sequence);
        checksum.accumulate_remainder(&mut packet);

        let actual_checksum = checksum.as_u16();
        if actual_checksum != expected_checksum {
            Err(ParseError::Checksum {
                expected: expected_checksum,
                actual: actual_checksum,
            })?
        }

        Ok(Self {
            message_type,
            code,
            checksum: expected_checksum,
            identifier,
            sequence,
        })
    }
}

/// Creates a serialized ICMP echo-request header covering `payload` with its
/// checksum.
pub fn build_icmp_echo_header(
    identifier: u16,
    sequence: u16,
    mut payload: impl Iterator<Item = u8>,
) -> Vec<u8> {
    let mut checksum = Checksum::new();
    checksum.add_u8(ECHO_REQUEST, 0);
    checksum.add_u16(identifier);
    checksum.add_u16(sequence);
    checksum.accumulate_remainder(&mut payload);

    let mut out = Vec::with_capacity(HEADER_OCTETS as usize);
    out.push(ECHO_REQUEST);
    out.push(0);
    out.extend_from_slice(&checksum.as_u16().to_be_bytes());
    out.extend_from_slice(&identifier.to_be_bytes());
    out.extend_from_slice(&sequence.to_be_bytes());
    out
}

#[derive(Debug, ThisError, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    #[error("Too few bytes to constitute an ICMP header")]
    HeaderTooShort,
    #[error(
        "The header checksum {expected:#06x} does not match the calculated checksum {actual:#06x}"
    )]
    Checksum { expected: u16, actual: u16 },
}
