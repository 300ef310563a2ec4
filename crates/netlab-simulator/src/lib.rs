pub mod endpoint;
pub mod engine;
pub mod scenario_runner;
pub mod stats;
pub mod trace;

pub use endpoint::{Endpoint, EndpointRole, EndpointState};
pub use engine::{
    EndpointId, EventKind, Scheduler, SchedulingError, SimTime, Simulator, ns_to_secs, secs_to_ns,
};
pub use scenario_runner::{build_simulator, run_scenario};
pub use stats::{FlowSnapshot, FlowStats};
pub use trace::{SimulationReport, TraceEvent};
