use std::fmt;
use std::net::Ipv4Addr;
use tracing::debug;

use crate::error::ConfigError;

/// Base of the private range subnets are carved from (10.0.0.0/8).
const BASE: u32 = u32::from_be_bytes([10, 0, 0, 0]);
/// Size of that range in host bits.
const SPACE_BITS: u32 = 24;

/// A reserved address range with a fixed prefix length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subnet {
    network: u32,
    prefix_len: u8,
}

impl Subnet {
    pub fn network(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.network)
    }

    pub fn prefix_len(&self) -> u8 {
        self.prefix_len
    }

    /// Usable host slots; host id 0 (network) and the broadcast id are reserved.
    pub fn host_capacity(&self) -> u64 {
        (1u64 << (32 - self.prefix_len as u32)).saturating_sub(2)
    }

    /// Address of host `host_id` (1-based) within the subnet.
    pub fn host(&self, host_id: u32) -> Ipv4Addr {
        Ipv4Addr::from(self.network + host_id)
    }

    pub fn contains(&self, addr: Ipv4Addr) -> bool {
        let mask = !0u32 << (32 - self.prefix_len as u32);
        (u32::from(addr) & mask) == self.network
    }
}

impl fmt::Display for Subnet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network(), self.prefix_len)
    }
}

/// Hands out non-overlapping subnets from 10.0.0.0/8 by bumping a cursor.
/// A prefix, once issued, is never reused within a run, so non-overlap
/// holds by construction.
#[derive(Debug, Default)]
pub struct AddressAllocator {
    /// Offset of the first unreserved address within the base range.
    cursor: u32,
}

impl AddressAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve the next unused subnet of the given prefix length.
    pub fn reserve_subnet(&mut self, prefix_len: u8) -> Result<Subnet, ConfigError> {
        // A prefix shorter than /8 would not fit the base range at all.
        if !(8..=32).contains(&prefix_len) {
            return Err(ConfigError::AddressSpaceExhausted { prefix_len });
        }
        let size = 1u32 << (32 - prefix_len as u32);
        let aligned = self.cursor.next_multiple_of(size);
        let end = aligned
            .checked_add(size)
            .filter(|end| *end <= 1 << SPACE_BITS)
            .ok_or(ConfigError::AddressSpaceExhausted { prefix_len })?;
        self.cursor = end;
        let subnet = Subnet {
            network: BASE + aligned,
            prefix_len,
        };
        debug!(%subnet, "reserved subnet");
        Ok(subnet)
    }

    /// Assign sequential host addresses, starting at host id 1, to `count`
    /// interfaces within `subnet`.
    pub fn assign(&self, subnet: &Subnet, count: usize) -> Result<Vec<Ipv4Addr>, ConfigError> {
        let capacity = subnet.host_capacity();
        if count as u64 > capacity {
            return Err(ConfigError::SubnetCapacityExceeded {
                subnet: *subnet,
                requested: count,
                capacity,
            });
        }
        Ok((1..=count as u32).map(|host| subnet.host(host)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn subnets_never_overlap() {
        let mut alloc = AddressAllocator::new();
        let a = alloc.reserve_subnet(24).unwrap();
        let b = alloc.reserve_subnet(24).unwrap();
        let c = alloc.reserve_subnet(30).unwrap();
        assert_ne!(a.network(), b.network());
        for subnet in [&a, &b] {
            assert!(!subnet.contains(c.network()));
        }
        assert!(!a.contains(b.network()));
        assert!(!b.contains(a.network()));
    }

    #[test]
    fn host_ids_start_at_one() {
        let mut alloc = AddressAllocator::new();
        let subnet = alloc.reserve_subnet(24).unwrap();
        let addrs = alloc.assign(&subnet, 2).unwrap();
        assert_eq!(addrs[0], Ipv4Addr::new(10, 0, 0, 1));
        assert_eq!(addrs[1], Ipv4Addr::new(10, 0, 0, 2));
    }

    #[test]
    fn alignment_after_mixed_prefixes() {
        let mut alloc = AddressAllocator::new();
        alloc.reserve_subnet(30).unwrap();
        // The next /24 must align up past the /30, not straddle it.
        let b = alloc.reserve_subnet(24).unwrap();
        assert_eq!(b.network(), Ipv4Addr::new(10, 0, 1, 0));
    }

    #[test]
    fn capacity_exceeded() {
        let mut alloc = AddressAllocator::new();
        let subnet = alloc.reserve_subnet(30).unwrap();
        assert_eq!(subnet.host_capacity(), 2);
        assert!(alloc.assign(&subnet, 2).is_ok());
        let err = alloc.assign(&subnet, 3).unwrap_err();
        assert!(matches!(err, ConfigError::SubnetCapacityExceeded { requested: 3, .. }));
    }

    #[test]
    fn space_exhausted() {
        let mut alloc = AddressAllocator::new();
        assert!(alloc.reserve_subnet(8).is_ok());
        let err = alloc.reserve_subnet(8).unwrap_err();
        assert!(matches!(err, ConfigError::AddressSpaceExhausted { prefix_len: 8 }));
        // Too-short prefixes never fit the base range.
        assert!(AddressAllocator::new().reserve_subnet(7).is_err());
    }
}
