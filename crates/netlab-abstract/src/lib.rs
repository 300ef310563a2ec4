pub mod packet;
pub mod scenario;

pub use packet::{FlowKey, Packet, Protocol};
pub use scenario::{EndpointSpec, LinkSpec, ScenarioSpec};
