use serde::Serialize;

use netlab_abstract::FlowKey;

use crate::endpoint::EndpointState;
use crate::engine::EndpointId;
use crate::stats::FlowSnapshot;

/// Structured events an external collector may subscribe to. The core keeps
/// them in memory for the report and never persists them itself.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TraceEvent {
    /// A packet reached a listening sink.
    Delivery { time: f64, flow: FlowKey, size: u32 },
    /// An endpoint changed lifecycle state.
    EndpointTransition {
        time: f64,
        endpoint: EndpointId,
        state: EndpointState,
    },
    /// A packet found no listening sink and was dropped.
    Loss { time: f64, flow: FlowKey, size: u32 },
}

/// Final (or point-in-time) simulation output, ready for serialization by
/// the surrounding tooling into whatever on-disk format it wants.
#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub scenario: String,
    pub duration_s: f64,
    pub flows: Vec<FlowSnapshot>,
    pub events: Vec<TraceEvent>,
}
