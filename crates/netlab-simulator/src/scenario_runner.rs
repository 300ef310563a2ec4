use anyhow::{Context, Result, ensure};
use tracing::info;

use netlab_abstract::{EndpointSpec, LinkSpec, ScenarioSpec};
use netlab_core::Topology;

use crate::engine::{Simulator, secs_to_ns};
use crate::trace::SimulationReport;

/// Build a runnable simulator from a scenario description. Pure setup: no
/// virtual time advances here, and every configuration mistake surfaces
/// before `run`.
pub fn build_simulator(spec: &ScenarioSpec) -> Result<Simulator> {
    // Times cross into unsigned virtual nanoseconds below, so negative
    // values are rejected here rather than silently clamped by the cast.
    ensure!(spec.stop_time >= 0.0, "stop_time must not be negative");
    for (index, endpoint) in spec.endpoints.iter().enumerate() {
        let (start, stop) = match endpoint {
            EndpointSpec::Sink { start, stop, .. }
            | EndpointSpec::Source { start, stop, .. } => (*start, *stop),
        };
        ensure!(
            start >= 0.0 && stop >= 0.0,
            "endpoint {index}: start and stop must not be negative"
        );
    }

    let mut topology = Topology::new();
    topology.create_nodes(spec.nodes);
    for (index, link) in spec.links.iter().enumerate() {
        let delay = match link {
            LinkSpec::PointToPoint { delay, .. } | LinkSpec::SharedMedium { delay, .. } => *delay,
        };
        ensure!(delay >= 0.0, "link {index}: delay must not be negative");
        let (id, prefix_len) = match link {
            LinkSpec::PointToPoint {
                a,
                b,
                rate,
                delay,
                prefix_len,
            } => {
                let id = topology
                    .connect_point_to_point(*a, *b, *rate, secs_to_ns(*delay))
                    .with_context(|| format!("link {index}"))?;
                (id, *prefix_len)
            }
            LinkSpec::SharedMedium {
                nodes,
                rate,
                delay,
                prefix_len,
            } => {
                let id = topology
                    .connect_shared_medium(nodes, *rate, secs_to_ns(*delay))
                    .with_context(|| format!("link {index}"))?;
                (id, *prefix_len)
            }
        };
        topology
            .assign_addresses(id, prefix_len)
            .with_context(|| format!("link {index}"))?;
    }

    let mut sim = Simulator::new(topology, spec.packet_size);
    // Sinks first, so sources can resolve their target addresses.
    for (index, endpoint) in spec.endpoints.iter().enumerate() {
        if let EndpointSpec::Sink {
            node,
            port,
            start,
            stop,
        } = endpoint
        {
            sim.add_sink(*node, *port, secs_to_ns(*start), secs_to_ns(*stop))
                .with_context(|| format!("endpoint {index}"))?;
        }
    }
    for (index, endpoint) in spec.endpoints.iter().enumerate() {
        if let EndpointSpec::Source {
            node,
            target,
            port,
            max_bytes,
            start,
            stop,
        } = endpoint
        {
            // The address the target exposes on a link shared with the
            // source, falling back to its first address.
            let target_addr = sim
                .topology()
                .address_towards(*target, *node)
                .with_context(|| {
                    format!("endpoint {index}: target node {target} has no assigned address")
                })?;
            sim.add_source(
                *node,
                target_addr,
                *port,
                *max_bytes,
                secs_to_ns(*start),
                secs_to_ns(*stop),
            )
            .with_context(|| format!("endpoint {index}"))?;
        }
    }
    Ok(sim)
}

/// Build, run to the stop wall, snapshot the report, tear down.
pub fn run_scenario(spec: &ScenarioSpec) -> Result<SimulationReport> {
    info!(scenario = %spec.name, nodes = spec.nodes, "building scenario");
    let mut sim = build_simulator(spec)?;
    sim.run(secs_to_ns(spec.stop_time))?;
    let report = sim.report(&spec.name);
    sim.destroy();
    Ok(report)
}
