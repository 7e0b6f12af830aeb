//! Deterministic subnet and host address allocation.
//!
//! Three allocator instances feed topology construction: one for
//! transit-internal links, one per AS for intra-AS links, and one shared
//! instance for every AS-gateway-to-transit link so those consume consecutive
//! subnets from a single base instead of each AS carving its own space.

use dpws_core::protocols::ipv4::{Ipv4Address, Ipv4Mask, Ipv4Net};
use thiserror::Error as ThisError;

/// Hands out consecutive subnets from a base address, and sequential host
/// addresses within each subnet.
#[derive(Debug, Clone)]
pub struct SubnetAllocator {
    base: Ipv4Address,
    mask: Ipv4Mask,
    reserved: u32,
}

impl SubnetAllocator {
    pub fn new(base: Ipv4Address, mask: Ipv4Mask) -> Self {
        Self {
            base,
            mask,
            reserved: 0,
        }
    }

    /// Advances to the next subnet and returns it.
    pub fn reserve_subnet(&mut self) -> Result<Subnet, AddressError> {
        let step = self.mask.ips_in_net();
        let offset = self.reserved as u64 * step;
        let id = self.base.to_u32() as u64 + offset;
        if id + step - 1 > u32::MAX as u64 {
            return Err(AddressError::SubnetsExhausted {
                base: self.base,
                reserved: self.reserved,
            });
        }
        self.reserved += 1;
        Ok(Subnet {
            net: Ipv4Net::new(Ipv4Address::from(id as u32), self.mask),
            allocated: 0,
        })
    }
}

/// One reserved subnet handing out host addresses `.1`, `.2`, and so on.
#[derive(Debug, Clone)]
pub struct Subnet {
    net: Ipv4Net,
    allocated: u32,
}

impl Subnet {
    pub fn net(&self) -> Ipv4Net {
        self.net
    }

    /// Returns the next sequential host address in this subnet.
    pub fn allocate_host(&mut self) -> Result<Ipv4Address, AddressError> {
        let next = self.allocated + 1;
        match self.net.host(next) {
            Some(address) => {
                self.allocated = next;
                Ok(address)
            }
            None => Err(AddressError::HostsExhausted { net: self.net }),
        }
    }
}

#[derive(Debug, ThisError, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("subnet pool starting at {base} exhausted after {reserved} subnets")]
    SubnetsExhausted { base: Ipv4Address, reserved: u32 },
    #[error("no host addresses left in {net:?}")]
    HostsExhausted { net: Ipv4Net },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn allocator(base: [u8; 4]) -> SubnetAllocator {
        SubnetAllocator::new(base.into(), Ipv4Mask::from_bitcount(24))
    }

    #[test]
    fn subnets_are_consecutive_slash_24s() {
        let mut pool = allocator([20, 1, 1, 0]);
        assert_eq!(
            pool.reserve_subnet().unwrap().net(),
            Ipv4Net::new_short([20, 1, 1, 0], 24)
        );
        assert_eq!(
            pool.reserve_subnet().unwrap().net(),
            Ipv4Net::new_short([20, 1, 2, 0], 24)
        );
        assert_eq!(
            pool.reserve_subnet().unwrap().net(),
            Ipv4Net::new_short([20, 1, 3, 0], 24)
        );
    }

    #[test]
    fn hosts_are_sequential_within_a_subnet() {
        let mut pool = allocator([10, 1, 1, 0]);
        let mut subnet = pool.reserve_subnet().unwrap();
        assert_eq!(
            subnet.allocate_host().unwrap(),
            Ipv4Address::new([10, 1, 1, 1])
        );
        assert_eq!(
            subnet.allocate_host().unwrap(),
            Ipv4Address::new([10, 1, 1, 2])
        );
        // the next subnet starts its own host sequence
        let mut next = pool.reserve_subnet().unwrap();
        assert_eq!(
            next.allocate_host().unwrap(),
            Ipv4Address::new([10, 1, 2, 1])
        );
    }

    #[test]
    fn pools_exhaust_cleanly() {
        let mut pool = SubnetAllocator::new(
            Ipv4Address::new([255, 255, 254, 0]),
            Ipv4Mask::from_bitcount(24),
        );
        assert!(pool.reserve_subnet().is_ok());
        assert!(pool.reserve_subnet().is_ok());
        assert!(matches!(
            pool.reserve_subnet(),
            Err(AddressError::SubnetsExhausted { .. })
        ));

        let mut tiny = SubnetAllocator::new(
            Ipv4Address::new([10, 0, 0, 0]),
            Ipv4Mask::from_bitcount(30),
        );
        let mut subnet = tiny.reserve_subnet().unwrap();
        subnet.allocate_host().unwrap();
        subnet.allocate_host().unwrap();
        assert!(matches!(
            subnet.allocate_host(),
            Err(AddressError::HostsExhausted { .. })
        ));
    }
}
