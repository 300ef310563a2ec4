//! Builtin scenario descriptions, reproducing the original lab scripts.

use netlab_abstract::{EndpointSpec, LinkSpec, ScenarioSpec};

pub const BUILTIN_NAMES: [&str; 3] = ["star", "switched-lan", "dual-campus"];

pub fn builtin_by_name(name: &str) -> Option<ScenarioSpec> {
    match name {
        "star" => Some(star()),
        "switched-lan" => Some(switched_lan()),
        "dual-campus" => Some(dual_campus()),
        _ => None,
    }
}

/// Star: one server (node 0) with four clients on dedicated 20 Mbit/s /
/// 2 ms point-to-point links, a /24 per link. The server sink listens from
/// 1 s to 10 s; each client floods it unbounded from 2 s to 10 s.
pub fn star() -> ScenarioSpec {
    let links = (1..5)
        .map(|client| LinkSpec::PointToPoint {
            a: 0,
            b: client,
            rate: 20_000_000,
            delay: 0.002,
            prefix_len: 24,
        })
        .collect();
    let mut endpoints = vec![EndpointSpec::Sink {
        node: 0,
        port: 50_000,
        start: 1.0,
        stop: 10.0,
    }];
    for client in 1..5 {
        endpoints.push(EndpointSpec::Source {
            node: client,
            target: 0,
            port: 50_000,
            max_bytes: 0,
            start: 2.0,
            stop: 10.0,
        });
    }
    ScenarioSpec {
        name: "star".into(),
        nodes: 5,
        links,
        endpoints,
        stop_time: 12.0,
        packet_size: 1460,
    }
}

/// Switched LAN: six hosts (0..6) in pairs behind three switches (6..9) on
/// 1 Gbit/s / 5 µs shared segments, with redundant inter-switch links.
/// Three bounded 1 MiB flows between host pairs on ports 50000..50003;
/// sinks listen 0.5 s to 10 s, sources send 1 s to 9.5 s.
pub fn switched_lan() -> ScenarioSpec {
    let mut links = Vec::new();
    // One shared segment per host to its switch, two hosts per switch.
    for host in 0..6usize {
        links.push(LinkSpec::SharedMedium {
            nodes: vec![host, 6 + host / 2],
            rate: 1_000_000_000,
            delay: 0.000_005,
            prefix_len: 24,
        });
    }
    // Redundant interconnects between the switches.
    for (a, b) in [(6, 7), (7, 8), (6, 8)] {
        links.push(LinkSpec::SharedMedium {
            nodes: vec![a, b],
            rate: 1_000_000_000,
            delay: 0.000_005,
            prefix_len: 24,
        });
    }
    let mut endpoints = Vec::new();
    for (index, (client, server)) in [(0usize, 1usize), (2, 3), (4, 5)].into_iter().enumerate() {
        let port = 50_000 + index as u16;
        endpoints.push(EndpointSpec::Sink {
            node: server,
            port,
            start: 0.5,
            stop: 10.0,
        });
        endpoints.push(EndpointSpec::Source {
            node: client,
            target: server,
            port,
            max_bytes: 1_048_576,
            start: 1.0,
            stop: 9.5,
        });
    }
    ScenarioSpec {
        name: "switched-lan".into(),
        nodes: 9,
        links,
        endpoints,
        stop_time: 10.0,
        packet_size: 1460,
    }
}

/// Dual campus: two three-host shared segments (hosts 0..3 and 3..6)
/// joined by a 50 Mbit/s / 5 ms point-to-point interconnect between the
/// gateway hosts. One sink per campus listening 1 s to 10 s; the other
/// hosts of each campus flood their own campus's sink from 2 s to 10 s.
pub fn dual_campus() -> ScenarioSpec {
    let links = vec![
        LinkSpec::SharedMedium {
            nodes: vec![0, 1, 2],
            rate: 100_000_000,
            delay: 0.000_01,
            prefix_len: 24,
        },
        LinkSpec::SharedMedium {
            nodes: vec![3, 4, 5],
            rate: 100_000_000,
            delay: 0.000_01,
            prefix_len: 24,
        },
        LinkSpec::PointToPoint {
            a: 0,
            b: 3,
            rate: 50_000_000,
            delay: 0.005,
            prefix_len: 30,
        },
    ];
    let mut endpoints = vec![
        EndpointSpec::Sink {
            node: 2,
            port: 50_000,
            start: 1.0,
            stop: 10.0,
        },
        EndpointSpec::Sink {
            node: 5,
            port: 50_000,
            start: 1.0,
            stop: 10.0,
        },
    ];
    for (client, sink) in [(0usize, 2usize), (1, 2), (3, 5), (4, 5)] {
        endpoints.push(EndpointSpec::Source {
            node: client,
            target: sink,
            port: 50_000,
            max_bytes: 0,
            start: 2.0,
            stop: 10.0,
        });
    }
    ScenarioSpec {
        name: "dual-campus".into(),
        nodes: 6,
        links,
        endpoints,
        stop_time: 12.0,
        packet_size: 1460,
    }
}
