use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;

/// Transport protocol carried by a flow.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    #[default]
    Tcp,
    Udp,
}

/// Identity of one directional traffic flow: the classic 4-tuple plus protocol.
///
/// The derived `Ord` is lexicographic over (src, dst, src_port, dst_port,
/// protocol), which is also the order flows appear in the final report.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct FlowKey {
    pub src: Ipv4Addr,
    pub dst: Ipv4Addr,
    pub src_port: u16,
    pub dst_port: u16,
    pub protocol: Protocol,
}

impl FlowKey {
    pub fn new(src: Ipv4Addr, src_port: u16, dst: Ipv4Addr, dst_port: u16) -> Self {
        Self {
            src,
            dst,
            src_port,
            dst_port,
            protocol: Protocol::Tcp,
        }
    }
}

impl fmt::Display for FlowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{} -> {}:{} ({:?})",
            self.src, self.src_port, self.dst, self.dst_port, self.protocol
        )
    }
}

/// A packet in flight. The core accounts for sizes and timestamps only;
/// payload bytes are never materialized.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Packet {
    pub flow: FlowKey,
    /// Payload size in bytes.
    pub size: u32,
    /// Virtual time (ns) at which the source emitted this packet.
    pub sent_at: u64,
}

impl Packet {
    pub fn new(flow: FlowKey, size: u32, sent_at: u64) -> Self {
        Self {
            flow,
            size,
            sent_at,
        }
    }
}
