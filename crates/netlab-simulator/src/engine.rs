use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use std::net::Ipv4Addr;

use anyhow::{Context, ensure};
use thiserror::Error;
use tracing::{debug, info};

use netlab_abstract::{FlowKey, Packet};
use netlab_core::{LinkId, NodeId, Topology};

use crate::endpoint::{Endpoint, EndpointRole, EndpointState};
use crate::stats::FlowStats;
use crate::trace::{SimulationReport, TraceEvent};

pub type EndpointId = usize;
/// Virtual time in nanoseconds. Integer arithmetic keeps replay
/// byte-identical across runs.
pub type SimTime = u64;

pub const NS_PER_SEC: u64 = 1_000_000_000;
/// First local port handed to a source.
const EPHEMERAL_BASE: u16 = 49_152;

pub fn secs_to_ns(secs: f64) -> SimTime {
    (secs * NS_PER_SEC as f64).round() as SimTime
}

pub fn ns_to_secs(ns: SimTime) -> f64 {
    ns as f64 / NS_PER_SEC as f64
}

/// Programming-contract violations in the scheduler; always fatal, never
/// retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchedulingError {
    #[error("cannot schedule at {requested} ns, before current time {now} ns")]
    NegativeDelay { requested: SimTime, now: SimTime },
    #[error("scheduler already destroyed")]
    SchedulerDestroyed,
}

/// The closed set of actions the simulator can defer.
#[derive(Debug)]
pub enum EventKind {
    EndpointStart(EndpointId),
    EndpointStop(EndpointId),
    SourceSend(EndpointId),
    PacketDelivery(Packet),
}

#[derive(Debug)]
struct Event {
    time: SimTime,
    kind: EventKind,
    seq: u64, // insertion order, tie-break for equal timestamps
}

// Custom Ord for a min-heap: the earliest time pops first, FIFO within a
// timestamp.
impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time && self.seq == other.seq
    }
}

impl Eq for Event {}

impl PartialOrd for Event {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Event {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .time
            .cmp(&self.time)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Global discrete-event queue. Events pop in strictly non-decreasing time
/// order with FIFO tie-break, so a scenario replays deterministically. Not
/// an ambient singleton: each `Simulator` owns its own handle, so multiple
/// independent runs can coexist in one process.
#[derive(Debug, Default)]
pub struct Scheduler {
    time: SimTime,
    queue: BinaryHeap<Event>,
    seq: u64,
    destroyed: bool,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current virtual time.
    pub fn now(&self) -> SimTime {
        self.time
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn schedule(&mut self, time: SimTime, kind: EventKind) -> Result<(), SchedulingError> {
        if self.destroyed {
            return Err(SchedulingError::SchedulerDestroyed);
        }
        if time < self.time {
            return Err(SchedulingError::NegativeDelay {
                requested: time,
                now: self.time,
            });
        }
        self.queue.push(Event {
            time,
            kind,
            seq: self.seq,
        });
        self.seq += 1;
        Ok(())
    }

    fn pop(&mut self) -> Option<Event> {
        self.queue.pop()
    }

    fn advance(&mut self, time: SimTime) {
        debug_assert!(time >= self.time);
        self.time = time;
    }

    /// Clear all state. Terminal: scheduling afterwards fails with
    /// `SchedulerDestroyed`.
    pub fn destroy(&mut self) {
        self.queue.clear();
        self.destroyed = true;
    }
}

/// Drives a built topology: owns the scheduler, the registered endpoints
/// and the per-flow statistics. Everything runs on one logical thread of
/// control; all state mutation happens inside event dispatch.
pub struct Simulator {
    scheduler: Scheduler,
    topology: Topology,
    packet_size: u32,
    endpoints: Vec<Endpoint>,
    /// (address, port) -> listening sink, one entry per sink-node address.
    listeners: HashMap<(Ipv4Addr, u16), EndpointId>,
    stats: FlowStats,
    trace: Vec<TraceEvent>,
    trace_hook: Option<Box<dyn FnMut(&TraceEvent)>>,
    path_cache: HashMap<(NodeId, NodeId), Option<Vec<LinkId>>>,
    /// Wider than a port so exhaustion is detectable instead of wrapping.
    next_src_port: u32,
}

impl Simulator {
    pub fn new(topology: Topology, packet_size: u32) -> Self {
        Self {
            scheduler: Scheduler::new(),
            topology,
            packet_size,
            endpoints: Vec::new(),
            listeners: HashMap::new(),
            stats: FlowStats::new(),
            trace: Vec::new(),
            trace_hook: None,
            path_cache: HashMap::new(),
            next_src_port: u32::from(EPHEMERAL_BASE),
        }
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn now(&self) -> SimTime {
        self.scheduler.now()
    }

    /// Point-in-time view of the flow counters; final only after `run`
    /// has returned.
    pub fn stats(&self) -> &FlowStats {
        &self.stats
    }

    /// Subscribe an external collector to the structured trace stream.
    pub fn set_trace_hook(&mut self, hook: Box<dyn FnMut(&TraceEvent)>) {
        self.trace_hook = Some(hook);
    }

    /// Register a sink listening on `port` across every address of `node`,
    /// active in `[start, stop)`.
    pub fn add_sink(
        &mut self,
        node: NodeId,
        port: u16,
        start: SimTime,
        stop: SimTime,
    ) -> anyhow::Result<EndpointId> {
        ensure!(
            start <= stop,
            "sink on node {node}: start {start} is after stop {stop}"
        );
        let addrs = self.topology.addresses_of(node);
        ensure!(!addrs.is_empty(), "sink on node {node} has no assigned address");
        let id = self.endpoints.len();
        for addr in addrs {
            self.listeners.insert((addr, port), id);
        }
        self.endpoints.push(Endpoint::sink(id, node, port, start, stop));
        debug!(endpoint = id, node, port, "registered sink");
        Ok(id)
    }

    /// Register a bulk source on `node` sending towards `target:port`,
    /// active in `[start, stop)`. `max_bytes == 0` means unbounded.
    pub fn add_source(
        &mut self,
        node: NodeId,
        target: Ipv4Addr,
        port: u16,
        max_bytes: u64,
        start: SimTime,
        stop: SimTime,
    ) -> anyhow::Result<EndpointId> {
        ensure!(
            start <= stop,
            "source on node {node}: start {start} is after stop {stop}"
        );
        let local = self
            .topology
            .addresses_of(node)
            .first()
            .copied()
            .with_context(|| format!("source on node {node} has no assigned address"))?;
        let link = self
            .topology
            .first_link_of(node)
            .with_context(|| format!("source on node {node} has no attached link"))?;
        let src_port = u16::try_from(self.next_src_port)
            .map_err(|_| anyhow::anyhow!("source on node {node}: ephemeral ports exhausted"))?;
        self.next_src_port += 1;
        let flow = FlowKey::new(local, src_port, target, port);
        let id = self.endpoints.len();
        self.endpoints
            .push(Endpoint::source(id, node, flow, max_bytes, link, start, stop));
        debug!(endpoint = id, node, %flow, max_bytes, "registered source");
        Ok(id)
    }

    /// Schedule every endpoint's start/stop transitions and run the event
    /// loop up to the `stop` wall. Events scheduled past the wall are
    /// discarded, not executed; that wall is the only deadline-based
    /// cancellation in the system.
    pub fn run(&mut self, stop: SimTime) -> Result<(), SchedulingError> {
        for id in 0..self.endpoints.len() {
            let (start_at, stop_at) = (self.endpoints[id].start, self.endpoints[id].stop);
            self.scheduler.schedule(start_at, EventKind::EndpointStart(id))?;
            self.scheduler.schedule(stop_at, EventKind::EndpointStop(id))?;
        }
        while let Some(event) = self.scheduler.pop() {
            if event.time > stop {
                continue; // past the wall: dropped unexecuted
            }
            self.scheduler.advance(event.time);
            self.dispatch(event)?;
        }
        self.scheduler.advance(stop);
        info!(
            flows = self.stats.flow_count(),
            duration_s = ns_to_secs(stop),
            "simulation reached the stop wall"
        );
        Ok(())
    }

    fn dispatch(&mut self, event: Event) -> Result<(), SchedulingError> {
        match event.kind {
            EventKind::EndpointStart(id) => self.endpoint_start(id)?,
            EventKind::EndpointStop(id) => self.endpoint_stop(id),
            EventKind::SourceSend(id) => self.source_send(id)?,
            EventKind::PacketDelivery(packet) => self.deliver(packet),
        }
        Ok(())
    }

    fn endpoint_start(&mut self, id: EndpointId) -> Result<(), SchedulingError> {
        let now = self.scheduler.now();
        if self.endpoints[id].state != EndpointState::Idle {
            return Ok(()); // idempotent; also keeps a late start from reviving a stopped endpoint
        }
        self.endpoints[id].state = EndpointState::Active;
        debug!(endpoint = id, node = self.endpoints[id].node, time_ns = now, "endpoint active");
        self.emit(TraceEvent::EndpointTransition {
            time: ns_to_secs(now),
            endpoint: id,
            state: EndpointState::Active,
        });
        if matches!(self.endpoints[id].role, EndpointRole::Source { .. }) {
            self.scheduler.schedule(now, EventKind::SourceSend(id))?;
        }
        Ok(())
    }

    fn endpoint_stop(&mut self, id: EndpointId) {
        let now = self.scheduler.now();
        if self.endpoints[id].state == EndpointState::Stopped {
            return;
        }
        self.endpoints[id].state = EndpointState::Stopped;
        debug!(endpoint = id, node = self.endpoints[id].node, time_ns = now, "endpoint stopped");
        self.emit(TraceEvent::EndpointTransition {
            time: ns_to_secs(now),
            endpoint: id,
            state: EndpointState::Stopped,
        });
    }

    fn source_send(&mut self, id: EndpointId) -> Result<(), SchedulingError> {
        let now = self.scheduler.now();
        // State is checked here rather than by unscheduling: a stop landing
        // at the same timestamp may already be behind this event in the queue.
        if self.endpoints[id].state != EndpointState::Active {
            return Ok(());
        }
        let packet_size = self.packet_size;
        let EndpointRole::Source {
            flow,
            max_bytes,
            link,
            ref mut sent,
        } = self.endpoints[id].role
        else {
            return Ok(());
        };
        let remaining = if max_bytes == 0 {
            u64::from(packet_size)
        } else {
            max_bytes.saturating_sub(*sent)
        };
        if remaining == 0 {
            return Ok(()); // bounded source exhausted; stays Active until its stop
        }
        // The final packet of a bounded source is truncated so the byte
        // budget is hit exactly.
        let size = u64::from(packet_size).min(remaining) as u32;
        *sent += u64::from(size);
        let sent_total = *sent;

        self.stats.on_sent(flow, size, now);
        debug!(%flow, size, time_ns = now, "source send");

        let src_node = self.endpoints[id].node;
        let transit = self
            .topology
            .node_of_addr(flow.dst)
            .and_then(|dst| path_transit(&self.topology, &mut self.path_cache, src_node, dst, size));
        match transit {
            Some(delay) => {
                self.scheduler
                    .schedule(now + delay, EventKind::PacketDelivery(Packet::new(flow, size, now)))?;
            }
            None => {
                debug!(%flow, "destination unreachable");
                self.stats.on_lost(flow, size);
                self.emit(TraceEvent::Loss {
                    time: ns_to_secs(now),
                    flow,
                    size,
                });
            }
        }

        if max_bytes == 0 || sent_total < max_bytes {
            // Pace at one full-packet serialization interval on the attached
            // link, so an unbounded source tracks the link rate.
            let interval = self.topology.link(link).serialization_ns(packet_size).max(1);
            self.scheduler.schedule(now + interval, EventKind::SourceSend(id))?;
        }
        Ok(())
    }

    fn deliver(&mut self, packet: Packet) {
        let now = self.scheduler.now();
        let sink = self
            .listeners
            .get(&(packet.flow.dst, packet.flow.dst_port))
            .copied();
        let accepted = match sink {
            Some(id) => match self.endpoints[id].state {
                EndpointState::Active => true,
                // A stopped sink still drains packets that were emitted while
                // it was listening.
                EndpointState::Stopped => packet.sent_at < self.endpoints[id].stop,
                EndpointState::Idle => false,
            },
            None => false,
        };
        if accepted {
            self.stats
                .on_received(packet.flow, packet.size, now, packet.sent_at);
            self.emit(TraceEvent::Delivery {
                time: ns_to_secs(now),
                flow: packet.flow,
                size: packet.size,
            });
        } else {
            // Not an error: recorded as a statistic only.
            debug!(flow = %packet.flow, size = packet.size, "packet dropped: destination not listening");
            self.stats.on_lost(packet.flow, packet.size);
            self.emit(TraceEvent::Loss {
                time: ns_to_secs(now),
                flow: packet.flow,
                size: packet.size,
            });
        }
    }

    fn emit(&mut self, event: TraceEvent) {
        if let Some(hook) = self.trace_hook.as_mut() {
            hook(&event);
        }
        self.trace.push(event);
    }

    /// Snapshot the run into a serializable report.
    pub fn report(&self, scenario: &str) -> SimulationReport {
        SimulationReport {
            scenario: scenario.to_string(),
            duration_s: ns_to_secs(self.scheduler.now()),
            flows: self.stats.report(),
            events: self.trace.clone(),
        }
    }

    /// Tear the scheduler down. Terminal: any later `run` or `schedule`
    /// fails with `SchedulerDestroyed`.
    pub fn destroy(&mut self) {
        self.scheduler.destroy();
    }
}

/// Transit time from `from` to `to` along the shortest-hop path, with the
/// path memoized per node pair.
fn path_transit(
    topology: &Topology,
    cache: &mut HashMap<(NodeId, NodeId), Option<Vec<LinkId>>>,
    from: NodeId,
    to: NodeId,
    bytes: u32,
) -> Option<SimTime> {
    let path = cache
        .entry((from, to))
        .or_insert_with(|| topology.path(from, to));
    path.as_ref().map(|links| topology.path_transit_ns(links, bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_timestamps_pop_in_insertion_order() {
        let mut sched = Scheduler::new();
        sched.schedule(5, EventKind::EndpointStart(0)).unwrap();
        sched.schedule(5, EventKind::EndpointStart(1)).unwrap();
        sched.schedule(3, EventKind::EndpointStart(2)).unwrap();
        let order: Vec<_> = std::iter::from_fn(|| sched.pop())
            .map(|event| match event.kind {
                EventKind::EndpointStart(id) => id,
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(order, vec![2, 0, 1]);
    }

    #[test]
    fn scheduling_into_the_past_is_rejected() {
        let mut sched = Scheduler::new();
        sched.schedule(10, EventKind::EndpointStart(0)).unwrap();
        let event = sched.pop().unwrap();
        sched.advance(event.time);
        assert!(matches!(
            sched.schedule(5, EventKind::EndpointStart(1)),
            Err(SchedulingError::NegativeDelay { requested: 5, now: 10 })
        ));
        // Scheduling at the current instant is fine.
        assert!(sched.schedule(10, EventKind::EndpointStart(1)).is_ok());
    }

    #[test]
    fn destroyed_scheduler_rejects_everything() {
        let mut sched = Scheduler::new();
        sched.schedule(1, EventKind::EndpointStart(0)).unwrap();
        sched.destroy();
        assert_eq!(sched.pending(), 0);
        assert!(matches!(
            sched.schedule(2, EventKind::EndpointStart(0)),
            Err(SchedulingError::SchedulerDestroyed)
        ));
    }

    fn two_node_sim() -> (Simulator, Ipv4Addr) {
        let mut topo = Topology::new();
        let nodes = topo.create_nodes(2);
        let link = topo
            .connect_point_to_point(nodes[0], nodes[1], 8_000_000, 1_000_000)
            .unwrap();
        topo.assign_addresses(link, 24).unwrap();
        let target = topo.address_towards(nodes[1], nodes[0]).unwrap();
        (Simulator::new(topo, 1000), target)
    }

    #[test]
    fn endpoint_transitions_are_idempotent() {
        let (mut sim, _) = two_node_sim();
        let sink = sim.add_sink(1, 7000, 0, 10).unwrap();
        sim.endpoint_start(sink).unwrap();
        sim.endpoint_start(sink).unwrap();
        assert_eq!(sim.endpoints[sink].state, EndpointState::Active);
        sim.endpoint_stop(sink);
        sim.endpoint_stop(sink);
        assert_eq!(sim.endpoints[sink].state, EndpointState::Stopped);
        // A start arriving after the stop must not revive the endpoint.
        sim.endpoint_start(sink).unwrap();
        assert_eq!(sim.endpoints[sink].state, EndpointState::Stopped);
    }

    #[test]
    fn stopped_source_send_is_a_no_op() {
        let (mut sim, target) = two_node_sim();
        let source = sim.add_source(0, target, 7000, 0, 0, 10).unwrap();
        sim.endpoint_stop(source);
        sim.source_send(source).unwrap();
        assert_eq!(sim.stats().flow_count(), 0);
    }

    #[test]
    fn trace_hook_observes_transitions() {
        use std::cell::RefCell;
        use std::rc::Rc;
        let (mut sim, target) = two_node_sim();
        sim.add_sink(1, 7000, 0, NS_PER_SEC).unwrap();
        sim.add_source(0, target, 7000, 2000, 0, NS_PER_SEC).unwrap();
        let seen = Rc::new(RefCell::new(0usize));
        let hook_seen = Rc::clone(&seen);
        sim.set_trace_hook(Box::new(move |event| {
            if matches!(event, TraceEvent::EndpointTransition { .. }) {
                *hook_seen.borrow_mut() += 1;
            }
        }));
        sim.run(2 * NS_PER_SEC).unwrap();
        // One start and one stop for each of the two endpoints.
        assert_eq!(*seen.borrow(), 4);
    }

    #[test]
    fn run_after_destroy_fails() {
        let (mut sim, target) = two_node_sim();
        sim.add_source(0, target, 7000, 0, 0, 10).unwrap();
        sim.destroy();
        assert!(matches!(
            sim.run(NS_PER_SEC),
            Err(SchedulingError::SchedulerDestroyed)
        ));
    }

    #[test]
    fn source_registration_fails_once_ephemeral_ports_run_out() {
        let (mut sim, target) = two_node_sim();
        sim.next_src_port = u32::from(u16::MAX);
        // The last port is still usable; the next request must fail instead
        // of wrapping back into an already-issued flow key.
        sim.add_source(0, target, 7000, 0, 0, 10).unwrap();
        assert!(sim.add_source(0, target, 7000, 0, 0, 10).is_err());
    }

    #[test]
    fn inverted_window_is_rejected_at_registration() {
        let (mut sim, target) = two_node_sim();
        assert!(sim.add_sink(1, 7000, 5, 1).is_err());
        assert!(sim.add_source(0, target, 7000, 0, 5, 1).is_err());
    }
}
