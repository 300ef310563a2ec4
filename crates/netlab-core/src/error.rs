use std::net::Ipv4Addr;
use thiserror::Error;

use crate::addr::Subnet;

/// Fatal topology/address construction errors. These surface before any
/// virtual time advances and are never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("address space exhausted: no unused /{prefix_len} prefix left in 10.0.0.0/8")]
    AddressSpaceExhausted { prefix_len: u8 },

    #[error("subnet {subnet} cannot hold {requested} hosts (capacity {capacity})")]
    SubnetCapacityExceeded {
        subnet: Subnet,
        requested: usize,
        capacity: u64,
    },

    #[error("interface {interface} on node {node} already has address {addr}")]
    DuplicateAssignment {
        interface: usize,
        node: usize,
        addr: Ipv4Addr,
    },

    #[error("unknown node id {0}")]
    UnknownNode(usize),

    #[error("a link needs a positive data rate")]
    ZeroRate,

    #[error("a shared medium needs at least two nodes, got {0}")]
    TooFewNodes(usize),
}
