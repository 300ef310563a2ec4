use serde::{Deserialize, Serialize};

/// A complete scenario description: topology plus traffic schedule.
///
/// Times are in seconds of virtual time, rates in bits per second. Node
/// indices in links and endpoints refer to `0..nodes`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioSpec {
    pub name: String,
    /// Number of nodes created before any link is wired up.
    pub nodes: usize,
    #[serde(default)]
    pub links: Vec<LinkSpec>,
    #[serde(default)]
    pub endpoints: Vec<EndpointSpec>,
    /// Hard stop wall in seconds; events scheduled past it are dropped.
    pub stop_time: f64,
    /// Fixed packet size used by sources, in bytes.
    #[serde(default = "default_packet_size")]
    pub packet_size: u32,
}

fn default_packet_size() -> u32 {
    1460
}

fn default_prefix_len() -> u8 {
    24
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LinkSpec {
    /// Two-interface link between nodes `a` and `b`.
    PointToPoint {
        a: usize,
        b: usize,
        /// Data rate in bits per second.
        rate: u64,
        /// Propagation delay in seconds.
        delay: f64,
        #[serde(default = "default_prefix_len")]
        prefix_len: u8,
    },
    /// One broadcast medium with an interface per listed node.
    SharedMedium {
        nodes: Vec<usize>,
        rate: u64,
        delay: f64,
        #[serde(default = "default_prefix_len")]
        prefix_len: u8,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum EndpointSpec {
    /// Listens on `port` across all of `node`'s addresses while active.
    Sink {
        node: usize,
        port: u16,
        start: f64,
        stop: f64,
    },
    /// Sends a byte stream to `target`'s address on `port` while active.
    Source {
        node: usize,
        target: usize,
        port: u16,
        /// Total bytes to send; 0 means unbounded.
        #[serde(default)]
        max_bytes: u64,
        start: f64,
        stop: f64,
    },
}
