use std::collections::BTreeMap;

use serde::Serialize;

use netlab_abstract::FlowKey;

use crate::engine::{SimTime, ns_to_secs};

#[derive(Debug, Default, Clone)]
struct FlowRecord {
    bytes_sent: u64,
    packets_sent: u64,
    bytes_received: u64,
    packets_received: u64,
    bytes_lost: u64,
    packets_lost: u64,
    delay_sum_ns: u128,
    first_send: Option<SimTime>,
    last_receive: Option<SimTime>,
}

/// Per-flow counters keyed by 4-tuple + protocol. Flow records are created
/// lazily on the first observed packet and never deleted during a run.
#[derive(Debug, Default)]
pub struct FlowStats {
    flows: BTreeMap<FlowKey, FlowRecord>,
}

impl FlowStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn flow_count(&self) -> usize {
        self.flows.len()
    }

    pub fn on_sent(&mut self, flow: FlowKey, size: u32, now: SimTime) {
        let record = self.flows.entry(flow).or_default();
        record.bytes_sent += u64::from(size);
        record.packets_sent += 1;
        record.first_send.get_or_insert(now);
    }

    pub fn on_received(&mut self, flow: FlowKey, size: u32, now: SimTime, sent_at: SimTime) {
        let record = self.flows.entry(flow).or_default();
        record.bytes_received += u64::from(size);
        record.packets_received += 1;
        record.delay_sum_ns += u128::from(now - sent_at);
        record.last_receive = Some(now);
    }

    pub fn on_lost(&mut self, flow: FlowKey, size: u32) {
        let record = self.flows.entry(flow).or_default();
        record.bytes_lost += u64::from(size);
        record.packets_lost += 1;
    }

    /// Snapshot every observed flow, ascending by 4-tuple. Final only once
    /// the scheduler has stopped; mid-run calls yield a point-in-time view.
    pub fn report(&self) -> Vec<FlowSnapshot> {
        self.flows
            .iter()
            .map(|(key, record)| record.snapshot(*key))
            .collect()
    }
}

impl FlowRecord {
    fn snapshot(&self, flow: FlowKey) -> FlowSnapshot {
        let loss_ratio = if self.packets_lost + self.packets_received > 0 {
            self.packets_lost as f64 / (self.packets_lost + self.packets_received) as f64
        } else {
            0.0
        };
        let mean_delay_s = if self.packets_received > 0 {
            ns_to_secs((self.delay_sum_ns / u128::from(self.packets_received)) as u64)
        } else {
            0.0
        };
        let throughput_bps = match (self.first_send, self.last_receive) {
            (Some(first), Some(last)) if last > first => {
                self.bytes_received as f64 / ns_to_secs(last - first)
            }
            _ => 0.0,
        };
        FlowSnapshot {
            flow,
            bytes_sent: self.bytes_sent,
            packets_sent: self.packets_sent,
            bytes_received: self.bytes_received,
            packets_received: self.packets_received,
            bytes_lost: self.bytes_lost,
            packets_lost: self.packets_lost,
            loss_ratio,
            mean_delay_s,
            throughput_bps,
        }
    }
}

/// Final per-flow metrics as they appear in the report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlowSnapshot {
    pub flow: FlowKey,
    pub bytes_sent: u64,
    pub packets_sent: u64,
    pub bytes_received: u64,
    pub packets_received: u64,
    pub bytes_lost: u64,
    pub packets_lost: u64,
    /// packets_lost / (packets_lost + packets_received); 0 when nothing
    /// was observed.
    pub loss_ratio: f64,
    /// Mean per-packet one-way delay in seconds; 0 when nothing arrived.
    pub mean_delay_s: f64,
    /// bytes_received / (last receive - first send), bytes per second.
    pub throughput_bps: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn flow(host: u8, port: u16) -> FlowKey {
        FlowKey::new(
            Ipv4Addr::new(10, 0, 0, host),
            port,
            Ipv4Addr::new(10, 0, 1, 1),
            50_000,
        )
    }

    #[test]
    fn counters_accumulate_per_flow() {
        let mut stats = FlowStats::new();
        let f = flow(2, 40_000);
        stats.on_sent(f, 1000, 0);
        stats.on_sent(f, 1000, 1_000_000);
        stats.on_received(f, 1000, 2_000_000, 0);
        stats.on_lost(f, 1000);
        let report = stats.report();
        assert_eq!(report.len(), 1);
        let snap = &report[0];
        assert_eq!(snap.bytes_sent, 2000);
        assert_eq!(snap.bytes_received, 1000);
        assert_eq!(snap.packets_lost, 1);
        assert_eq!(snap.bytes_lost, 1000);
        assert_eq!(snap.loss_ratio, 0.5);
        // 2 ms delay on the single received packet.
        assert_eq!(snap.mean_delay_s, 0.002);
    }

    #[test]
    fn throughput_spans_first_send_to_last_receive() {
        let mut stats = FlowStats::new();
        let f = flow(2, 40_000);
        stats.on_sent(f, 500, 0);
        stats.on_sent(f, 500, 250_000_000);
        stats.on_received(f, 500, 250_000_000, 0);
        stats.on_received(f, 500, 500_000_000, 250_000_000);
        // 1000 bytes over half a second of virtual time.
        assert_eq!(stats.report()[0].throughput_bps, 2000.0);
    }

    #[test]
    fn empty_flow_yields_zero_ratios() {
        let mut stats = FlowStats::new();
        stats.on_sent(flow(2, 40_000), 100, 0);
        let snap = &stats.report()[0];
        assert_eq!(snap.loss_ratio, 0.0);
        assert_eq!(snap.mean_delay_s, 0.0);
        assert_eq!(snap.throughput_bps, 0.0);
    }

    #[test]
    fn report_is_ordered_by_four_tuple() {
        let mut stats = FlowStats::new();
        stats.on_sent(flow(9, 40_001), 1, 0);
        stats.on_sent(flow(2, 40_002), 1, 0);
        stats.on_sent(flow(2, 40_001), 1, 0);
        let keys: Vec<_> = stats.report().into_iter().map(|s| s.flow).collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
    }
}
