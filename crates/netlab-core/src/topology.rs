use std::collections::{HashMap, VecDeque};
use std::net::Ipv4Addr;
use tracing::debug;

use crate::addr::AddressAllocator;
use crate::error::ConfigError;

pub type NodeId = usize;
pub type LinkId = usize;
pub type InterfaceId = usize;

/// Link flavor; the set is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
    PointToPoint,
    SharedMedium,
}

#[derive(Debug)]
pub struct Node {
    pub id: NodeId,
    pub interfaces: Vec<InterfaceId>,
}

#[derive(Debug)]
pub struct Link {
    pub id: LinkId,
    pub kind: LinkKind,
    /// Data rate in bits per second.
    pub rate_bps: u64,
    /// Propagation delay in virtual nanoseconds.
    pub delay_ns: u64,
    pub interfaces: Vec<InterfaceId>,
}

impl Link {
    /// Time to clock `bytes` onto the wire at the link rate.
    pub fn serialization_ns(&self, bytes: u32) -> u64 {
        (bytes as u128 * 8 * 1_000_000_000 / self.rate_bps as u128) as u64
    }

    /// Serialization plus propagation delay for one packet of `bytes`.
    pub fn transit_ns(&self, bytes: u32) -> u64 {
        self.serialization_ns(bytes) + self.delay_ns
    }
}

#[derive(Debug)]
pub struct Interface {
    pub id: InterfaceId,
    pub node: NodeId,
    pub link: LinkId,
    pub addr: Option<Ipv4Addr>,
}

/// The node/link/interface graph. Construction is a pure build phase:
/// nothing here touches the scheduler, and disjoint link sets can be wired
/// up in any number of calls.
#[derive(Debug, Default)]
pub struct Topology {
    nodes: Vec<Node>,
    links: Vec<Link>,
    interfaces: Vec<Interface>,
    allocator: AddressAllocator,
}

impl Topology {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create `n` fresh nodes, returning their ids in creation order.
    pub fn create_nodes(&mut self, n: usize) -> Vec<NodeId> {
        let first = self.nodes.len();
        for id in first..first + n {
            self.nodes.push(Node {
                id,
                interfaces: Vec::new(),
            });
        }
        (first..first + n).collect()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn link(&self, id: LinkId) -> &Link {
        &self.links[id]
    }

    pub fn interface(&self, id: InterfaceId) -> &Interface {
        &self.interfaces[id]
    }

    fn check_node(&self, node: NodeId) -> Result<(), ConfigError> {
        if node < self.nodes.len() {
            Ok(())
        } else {
            Err(ConfigError::UnknownNode(node))
        }
    }

    fn attach(&mut self, node: NodeId, link: LinkId) -> InterfaceId {
        let id = self.interfaces.len();
        self.interfaces.push(Interface {
            id,
            node,
            link,
            addr: None,
        });
        self.nodes[node].interfaces.push(id);
        self.links[link].interfaces.push(id);
        id
    }

    /// Create a two-interface link between `a` and `b`.
    pub fn connect_point_to_point(
        &mut self,
        a: NodeId,
        b: NodeId,
        rate_bps: u64,
        delay_ns: u64,
    ) -> Result<LinkId, ConfigError> {
        self.check_node(a)?;
        self.check_node(b)?;
        if rate_bps == 0 {
            return Err(ConfigError::ZeroRate);
        }
        let id = self.links.len();
        self.links.push(Link {
            id,
            kind: LinkKind::PointToPoint,
            rate_bps,
            delay_ns,
            interfaces: Vec::new(),
        });
        self.attach(a, id);
        self.attach(b, id);
        debug!(link = id, a, b, rate_bps, delay_ns, "point-to-point link");
        Ok(id)
    }

    /// Create one broadcast medium with an interface per listed node.
    pub fn connect_shared_medium(
        &mut self,
        nodes: &[NodeId],
        rate_bps: u64,
        delay_ns: u64,
    ) -> Result<LinkId, ConfigError> {
        if nodes.len() < 2 {
            return Err(ConfigError::TooFewNodes(nodes.len()));
        }
        for &node in nodes {
            self.check_node(node)?;
        }
        if rate_bps == 0 {
            return Err(ConfigError::ZeroRate);
        }
        let id = self.links.len();
        self.links.push(Link {
            id,
            kind: LinkKind::SharedMedium,
            rate_bps,
            delay_ns,
            interfaces: Vec::new(),
        });
        for &node in nodes {
            self.attach(node, id);
        }
        debug!(link = id, ?nodes, rate_bps, delay_ns, "shared-medium link");
        Ok(id)
    }

    /// Reserve a subnet for `link` and assign each attached interface a
    /// sequential host address within it.
    pub fn assign_addresses(&mut self, link: LinkId, prefix_len: u8) -> Result<(), ConfigError> {
        let iface_ids = self.links[link].interfaces.clone();
        for &iface in &iface_ids {
            if let Some(addr) = self.interfaces[iface].addr {
                return Err(ConfigError::DuplicateAssignment {
                    interface: iface,
                    node: self.interfaces[iface].node,
                    addr,
                });
            }
        }
        let subnet = self.allocator.reserve_subnet(prefix_len)?;
        let addrs = self.allocator.assign(&subnet, iface_ids.len())?;
        for (&iface, addr) in iface_ids.iter().zip(addrs) {
            self.interfaces[iface].addr = Some(addr);
            debug!(interface = iface, node = self.interfaces[iface].node, %addr, "assigned address");
        }
        Ok(())
    }

    /// All assigned addresses of `node`, in interface-creation order.
    pub fn addresses_of(&self, node: NodeId) -> Vec<Ipv4Addr> {
        self.nodes
            .get(node)
            .map(|n| {
                n.interfaces
                    .iter()
                    .filter_map(|&iface| self.interfaces[iface].addr)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Owning node of an assigned address.
    pub fn node_of_addr(&self, addr: Ipv4Addr) -> Option<NodeId> {
        self.interfaces
            .iter()
            .find(|iface| iface.addr == Some(addr))
            .map(|iface| iface.node)
    }

    /// The address `target` exposes towards `from`: its interface on a link
    /// the two nodes share when one exists, otherwise its first assigned
    /// address.
    pub fn address_towards(&self, target: NodeId, from: NodeId) -> Option<Ipv4Addr> {
        let target_ifaces = &self.nodes.get(target)?.interfaces;
        for &iface in target_ifaces {
            if self.interfaces[iface].addr.is_none() {
                continue;
            }
            let link = self.interfaces[iface].link;
            let shared = self.links[link]
                .interfaces
                .iter()
                .any(|&other| self.interfaces[other].node == from);
            if shared {
                return self.interfaces[iface].addr;
            }
        }
        target_ifaces
            .iter()
            .filter_map(|&iface| self.interfaces[iface].addr)
            .next()
    }

    /// First link attached to `node`, used for source pacing.
    pub fn first_link_of(&self, node: NodeId) -> Option<LinkId> {
        self.nodes
            .get(node)?
            .interfaces
            .first()
            .map(|&iface| self.interfaces[iface].link)
    }

    /// Shortest-hop path from `from` to `to` as the sequence of links to
    /// traverse. Breadth-first over the node/link graph in creation order,
    /// so the result is deterministic.
    pub fn path(&self, from: NodeId, to: NodeId) -> Option<Vec<LinkId>> {
        if from >= self.nodes.len() || to >= self.nodes.len() {
            return None;
        }
        if from == to {
            return Some(Vec::new());
        }
        let mut seen = vec![false; self.nodes.len()];
        seen[from] = true;
        let mut prev: HashMap<NodeId, (NodeId, LinkId)> = HashMap::new();
        let mut queue = VecDeque::from([from]);
        while let Some(node) = queue.pop_front() {
            for &iface in &self.nodes[node].interfaces {
                let link = self.interfaces[iface].link;
                for &other in &self.links[link].interfaces {
                    let peer = self.interfaces[other].node;
                    if seen[peer] {
                        continue;
                    }
                    seen[peer] = true;
                    prev.insert(peer, (node, link));
                    if peer == to {
                        let mut path = Vec::new();
                        let mut cur = to;
                        while cur != from {
                            let (parent, link) = prev[&cur];
                            path.push(link);
                            cur = parent;
                        }
                        path.reverse();
                        return Some(path);
                    }
                    queue.push_back(peer);
                }
            }
        }
        None
    }

    /// End-to-end transit time for a packet of `bytes` along `path`.
    pub fn path_transit_ns(&self, path: &[LinkId], bytes: u32) -> u64 {
        path.iter().map(|&link| self.links[link].transit_ns(bytes)).sum()
    }
}
