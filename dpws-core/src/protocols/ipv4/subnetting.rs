//! CIDR subnetting for the simulated internet.
//!
//! Addressing in the simulator is classless: a network is identified by a
//! network id plus a mask, and the topology builders carve consecutive
//! subnets out of configured bases.

use super::ipv4_address::Ipv4Address;
use std::fmt;
use std::str::FromStr;
use thiserror::Error as ThisError;

/// An IPv4 subnet mask, a thin wrapper around a `u32`.
#[derive(Clone, Copy, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct Ipv4Mask(u32);

const fn clamp(num: u32, min: u32, max: u32) -> u32 {
    assert!(min <= max);
    if num < min {
        min
    } else if num > max {
        max
    } else {
        num
    }
}

impl Ipv4Mask {
    /// Returns a mask of `size` 1s. Sizes above 32 are clamped to 32.
    pub const fn from_bitcount(size: u32) -> Ipv4Mask {
        let size = clamp(size, 0, 32);
        if size == 0 {
            Ipv4Mask(0)
        } else if size == 32 {
            Ipv4Mask(0xFF_FF_FF_FF)
        } else {
            Ipv4Mask(((1 << size) - 1) << (32 - size))
        }
    }

    /// Returns the number of 1s in this mask.
    pub const fn count_ones(&self) -> u32 {
        self.0.count_ones()
    }

    pub const fn to_u32(self) -> u32 {
        self.0
    }

    /// Returns the number of IP addresses in a network using this mask,
    /// including the network id and broadcast address.
    pub const fn ips_in_net(&self) -> u64 {
        !(self.to_u32()) as u64 + 1
    }
}

impl fmt::Debug for Ipv4Mask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Ipv4Mask")
            .field(&Ipv4Address::from(self.0))
            .finish()
    }
}

impl fmt::Display for Ipv4Mask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&Ipv4Address::from(self.0), f)
    }
}

impl From<Ipv4Mask> for u32 {
    fn from(mask: Ipv4Mask) -> u32 {
        mask.0
    }
}

impl From<Ipv4Mask> for Ipv4Address {
    fn from(mask: Ipv4Mask) -> Ipv4Address {
        Ipv4Address::from(mask.to_u32())
    }
}

impl TryFrom<u32> for Ipv4Mask {
    type Error = u32;

    /// Returns the number back as an error if it has 0s between the 1s.
    fn try_from(mask: u32) -> Result<Ipv4Mask, u32> {
        let result = Ipv4Mask::from_bitcount(mask.count_ones());
        if u32::from(result) == mask {
            Ok(result)
        } else {
            Err(mask)
        }
    }
}

impl FromStr for Ipv4Mask {
    type Err = MaskParseError;

    /// Parses a dotted-quad mask such as `"255.255.255.0"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let address: Ipv4Address = s.parse().map_err(|_| MaskParseError(s.to_string()))?;
        Ipv4Mask::try_from(address.to_u32()).map_err(|_| MaskParseError(s.to_string()))
    }
}

#[derive(Debug, ThisError, Clone, PartialEq, Eq)]
#[error("{0:?} is not a valid IPv4 subnet mask")]
pub struct MaskParseError(pub String);

/// A network id and mask pair identifying one subnet.
#[derive(Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct Ipv4Net {
    /// Always a network id so that equality behaves.
    network_id: Ipv4Address,
    mask: Ipv4Mask,
}

impl Ipv4Net {
    /// Creates an `Ipv4Net` from an IP address and mask, truncating the host
    /// portion.
    pub fn new(ip: Ipv4Address, mask: Ipv4Mask) -> Self {
        Self {
            network_id: Ipv4Address::from(ip.to_u32() & mask.to_u32()),
            mask,
        }
    }

    /// Creates a new `Ipv4Net` from an address and a mask length.
    pub fn new_short(ip: impl Into<Ipv4Address>, mask_len: u32) -> Ipv4Net {
        Ipv4Net::new(ip.into(), Ipv4Mask::from_bitcount(mask_len))
    }

    /// Returns the first IP address in this network.
    pub fn id(&self) -> Ipv4Address {
        self.network_id
    }

    /// Returns the last IP address in this network.
    pub fn broadcast(&self) -> Ipv4Address {
        Ipv4Address::from(self.id().to_u32() + !self.mask.to_u32())
    }

    pub fn mask(&self) -> Ipv4Mask {
        self.mask
    }

    /// Returns the `n`th host address in this network, starting from 1.
    /// Returns `None` once the host portion is exhausted.
    pub fn host(&self, n: u32) -> Option<Ipv4Address> {
        let wildcard = !self.mask.to_u32();
        if n == 0 || n >= wildcard {
            None
        } else {
            Some(Ipv4Address::from(self.id().to_u32() + n))
        }
    }

    /// Returns `true` if the `address` is contained in this network.
    pub fn contains(&self, address: Ipv4Address) -> bool {
        self.id().to_u32() == address.to_u32() & self.mask().to_u32()
    }
}

impl fmt::Debug for Ipv4Net {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Ipv4Net {{{}/{}}}",
            self.network_id,
            self.mask().count_ones()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mask_basics() {
        let mask = Ipv4Mask::from_bitcount(24);
        assert_eq!(mask.to_u32(), 0xFF_FF_FF_00);
        assert_eq!(mask.count_ones(), 24);
        assert_eq!(mask.ips_in_net(), 256);
        assert_eq!("255.255.255.0".parse::<Ipv4Mask>().unwrap(), mask);
        assert!("255.0.255.0".parse::<Ipv4Mask>().is_err());
    }

    #[test]
    fn net_truncates_host_bits() {
        let net = Ipv4Net::new_short([10, 1, 1, 119], 24);
        assert_eq!(net.id(), Ipv4Address::new([10, 1, 1, 0]));
        assert_eq!(net.broadcast(), Ipv4Address::new([10, 1, 1, 255]));
        assert!(net.contains([10, 1, 1, 42].into()));
        assert!(!net.contains([10, 1, 2, 42].into()));
    }

    #[test]
    fn host_addresses_are_bounded() {
        let net = Ipv4Net::new_short([10, 1, 1, 0], 30);
        assert_eq!(net.host(1), Some(Ipv4Address::new([10, 1, 1, 1])));
        assert_eq!(net.host(2), Some(Ipv4Address::new([10, 1, 1, 2])));
        assert_eq!(net.host(3), None);
        assert_eq!(net.host(0), None);
    }
}
