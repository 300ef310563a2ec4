pub mod addr;
pub mod error;
pub mod topology;

pub use addr::{AddressAllocator, Subnet};
pub use error::ConfigError;
pub use topology::{Interface, InterfaceId, Link, LinkId, LinkKind, Node, NodeId, Topology};
