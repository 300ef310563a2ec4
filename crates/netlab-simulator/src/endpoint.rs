use serde::Serialize;

use netlab_abstract::FlowKey;
use netlab_core::{LinkId, NodeId};

use crate::engine::{EndpointId, SimTime};

/// Endpoint lifecycle. Transitions only move forward; triggering one twice
/// is a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EndpointState {
    Idle,
    Active,
    Stopped,
}

/// The closed set of endpoint roles.
#[derive(Debug)]
pub enum EndpointRole {
    /// Emits a paced byte stream towards `flow.dst`; `max_bytes == 0`
    /// means unbounded. `link` is the attached link used for pacing.
    Source {
        flow: FlowKey,
        max_bytes: u64,
        sent: u64,
        link: LinkId,
    },
    /// Listens on `port` across all of its node's addresses.
    Sink { port: u16 },
}

/// A schedulable traffic endpoint bound to a node, active in
/// `[start, stop)` of virtual time.
#[derive(Debug)]
pub struct Endpoint {
    pub id: EndpointId,
    pub node: NodeId,
    pub role: EndpointRole,
    pub state: EndpointState,
    pub start: SimTime,
    pub stop: SimTime,
}

impl Endpoint {
    pub fn sink(id: EndpointId, node: NodeId, port: u16, start: SimTime, stop: SimTime) -> Self {
        Self {
            id,
            node,
            role: EndpointRole::Sink { port },
            state: EndpointState::Idle,
            start,
            stop,
        }
    }

    pub fn source(
        id: EndpointId,
        node: NodeId,
        flow: FlowKey,
        max_bytes: u64,
        link: LinkId,
        start: SimTime,
        stop: SimTime,
    ) -> Self {
        Self {
            id,
            node,
            role: EndpointRole::Source {
                flow,
                max_bytes,
                sent: 0,
                link,
            },
            state: EndpointState::Idle,
            start,
            stop,
        }
    }
}
