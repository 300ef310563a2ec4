use netlab_abstract::ScenarioSpec;
use netlab_sim_cli::scenarios::{dual_campus, star, switched_lan};
use netlab_simulator::{build_simulator, run_scenario};

#[test]
fn star_has_four_clean_flows() {
    let report = run_scenario(&star()).unwrap();
    assert_eq!(report.flows.len(), 4);
    for flow in &report.flows {
        assert!(flow.bytes_sent > 0);
        assert_eq!(flow.packets_lost, 0);
        assert_eq!(flow.loss_ratio, 0.0);
    }
    // Each client talks to the server address on its own link.
    let mut dsts: Vec<_> = report.flows.iter().map(|f| f.flow.dst).collect();
    dsts.sort();
    dsts.dedup();
    assert_eq!(dsts.len(), 4);
}

#[test]
fn switched_lan_flows_send_exactly_one_mebibyte() {
    let report = run_scenario(&switched_lan()).unwrap();
    assert_eq!(report.flows.len(), 3);
    for flow in &report.flows {
        assert_eq!(flow.bytes_sent, 1_048_576);
        assert_eq!(flow.bytes_received, 1_048_576);
        assert_eq!(flow.packets_lost, 0);
    }
}

#[test]
fn dual_campus_flows_stay_on_their_own_campus() {
    let spec = dual_campus();
    // Address allocation is deterministic, so a freshly built topology
    // resolves the same addresses the run used.
    let sim = build_simulator(&spec).unwrap();
    let topo = sim.topology();
    let report = run_scenario(&spec).unwrap();
    assert_eq!(report.flows.len(), 4);
    for flow in &report.flows {
        let src_node = topo.node_of_addr(flow.flow.src).unwrap();
        let dst_node = topo.node_of_addr(flow.flow.dst).unwrap();
        let expected_sink = if src_node < 3 { 2 } else { 5 };
        assert_eq!(dst_node, expected_sink, "flow {} crossed campuses", flow.flow);
    }
}

#[test]
fn scenario_files_parse_from_toml() {
    let text = r#"
name = "two-node"
nodes = 2
stop_time = 5.0

[[links]]
kind = "point_to_point"
a = 0
b = 1
rate = 8000000
delay = 0.001

[[endpoints]]
role = "sink"
node = 1
port = 50000
start = 0.5
stop = 5.0

[[endpoints]]
role = "source"
node = 0
target = 1
port = 50000
start = 1.0
stop = 4.0
"#;
    let spec: ScenarioSpec = toml::from_str(text).unwrap();
    assert_eq!(spec.packet_size, 1460, "packet size defaults when omitted");
    assert_eq!(spec.links.len(), 1);
    let report = run_scenario(&spec).unwrap();
    assert_eq!(report.flows.len(), 1);
    assert!(report.flows[0].bytes_received > 0);
}
