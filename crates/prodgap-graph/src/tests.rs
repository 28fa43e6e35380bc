use crate::store::EquipmentGraph;
use crate::tracer::{trace, Direction, TraceRequest};
use prodgap_common::types::{Connection, Equipment, EquipmentStatus, EquipmentType, NetworkType};
use prodgap_common::CoreError;

fn node(id: &str) -> Equipment {
    Equipment::new(id, format!("Equipment {id}"), EquipmentType::Manifold)
}

fn edge(id: &str, from: &str, to: &str) -> Connection {
    Connection::new(id, from, to, NetworkType::Oil)
}

fn graph_with(nodes: &[&str], edges: &[(&str, &str, &str)]) -> EquipmentGraph {
    let mut graph = EquipmentGraph::new();
    for id in nodes {
        graph.add_equipment(node(id));
    }
    for (id, from, to) in edges {
        graph.add_connection(edge(id, from, to)).unwrap();
    }
    graph
}

fn diamond() -> EquipmentGraph {
    graph_with(
        &["A", "B", "C", "D"],
        &[("c1", "A", "B"), ("c2", "A", "C"), ("c3", "B", "D"), ("c4", "C", "D")],
    )
}

#[test]
fn add_connection_rejects_unknown_endpoint() {
    let mut graph = graph_with(&["A"], &[]);
    let err = graph.add_connection(edge("c1", "A", "missing")).unwrap_err();
    assert_eq!(err, CoreError::not_found("equipment", "missing"));
    assert_eq!(graph.connection_count(), 0);
}

#[test]
fn cycles_are_accepted_at_insertion() {
    let graph = graph_with(&["A", "B"], &[("c1", "A", "B"), ("c2", "B", "A")]);
    assert_eq!(graph.connection_count(), 2);
}

#[test]
fn outgoing_is_sorted_and_filtered_by_network() {
    let mut graph = graph_with(&["A", "B", "C"], &[("c9", "A", "B"), ("c1", "A", "C")]);
    graph
        .add_connection(Connection::new("c5", "A", "C", NetworkType::Water))
        .unwrap();

    let ids: Vec<&str> = graph.outgoing("A", None).iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, vec!["c1", "c5", "c9"]);

    let water: Vec<&str> = graph
        .outgoing("A", Some(NetworkType::Water))
        .iter()
        .map(|c| c.id.as_str())
        .collect();
    assert_eq!(water, vec!["c5"]);
    assert_eq!(graph.incoming("C", None).len(), 2);
}

#[test]
fn replacing_a_connection_moves_its_adjacency() {
    let mut graph = graph_with(&["A", "B", "C"], &[("c1", "A", "B")]);
    graph.add_connection(edge("c1", "A", "C")).unwrap();
    assert!(graph.incoming("B", None).is_empty());
    assert_eq!(graph.incoming("C", None).len(), 1);
    assert_eq!(graph.connection_count(), 1);
}

#[test]
fn remove_equipment_drops_touching_connections() {
    let mut graph = diamond();
    assert!(graph.remove_equipment("B").is_some());
    assert_eq!(graph.connection_count(), 2);
    assert!(graph.outgoing("A", None).iter().all(|c| c.target_equipment_id != "B"));
    assert!(graph.remove_equipment("B").is_none());
}

#[test]
fn update_status_applies_telemetry() {
    let mut graph = graph_with(&["A"], &[]);
    let updated = graph
        .update_status("A", Some(EquipmentStatus::Online), Some(1500.0), None)
        .unwrap();
    assert_eq!(updated.status, EquipmentStatus::Online);
    assert_eq!(updated.current_throughput, Some(1500.0));
    assert!(graph.update_status("nope", None, None, None).unwrap_err().is_not_found());
}

#[test]
fn trace_unknown_source_is_not_found() {
    let graph = diamond();
    let err = trace(&graph, &TraceRequest::downstream("Z", None, 5)).unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn trace_zero_depth_is_empty() {
    let graph = diamond();
    let tree = trace(&graph, &TraceRequest::downstream("A", None, 0)).unwrap();
    assert!(tree.path.is_empty());
    assert_eq!(tree.source_equipment_id, "A");
}

#[test]
fn trace_negative_depth_is_validation_error() {
    let graph = diamond();
    let err = trace(&graph, &TraceRequest::downstream("A", None, -1)).unwrap_err();
    assert!(matches!(err, CoreError::Validation(_)));
}

#[test]
fn diamond_reports_shared_node_under_both_branches() {
    let graph = diamond();
    let tree = trace(&graph, &TraceRequest::downstream("A", None, 2)).unwrap();

    assert_eq!(tree.equipment_ids(), vec!["B", "D", "C", "D"]);
    assert_eq!(tree.path[0].depth, 1);
    assert_eq!(tree.path[0].downstream[0].depth, 2);
    assert_eq!(tree.path[0].downstream[0].connection_id, "c3");
    assert!(tree.path[0].downstream[0].downstream.is_empty());
}

#[test]
fn depth_limit_stops_expansion() {
    let graph = diamond();
    let tree = trace(&graph, &TraceRequest::downstream("A", None, 1)).unwrap();
    assert_eq!(tree.equipment_ids(), vec!["B", "C"]);
    assert!(tree.path.iter().all(|n| n.downstream.is_empty()));
}

#[test]
fn cycle_terminates_without_reentering_source() {
    let graph = graph_with(&["A", "B"], &[("c1", "A", "B"), ("c2", "B", "A")]);
    let tree = trace(&graph, &TraceRequest::downstream("A", None, 10)).unwrap();
    assert_eq!(tree.equipment_ids(), vec!["B"]);
}

#[test]
fn longer_cycle_never_repeats_a_node_on_one_path() {
    let graph = graph_with(
        &["A", "B", "C"],
        &[("c1", "A", "B"), ("c2", "B", "C"), ("c3", "C", "A"), ("c4", "C", "B")],
    );
    let tree = trace(&graph, &TraceRequest::downstream("A", None, 10)).unwrap();
    assert_eq!(tree.equipment_ids(), vec!["B", "C"]);
    assert_eq!(tree.node_count(), 2);
}

#[test]
fn inactive_connections_are_excluded() {
    let mut graph = graph_with(&["A", "B", "C"], &[("c1", "A", "B")]);
    let mut closed = edge("c2", "A", "C");
    closed.is_active = false;
    graph.add_connection(closed).unwrap();

    let tree = trace(&graph, &TraceRequest::downstream("A", None, 3)).unwrap();
    assert_eq!(tree.equipment_ids(), vec!["B"]);
}

#[test]
fn network_filter_restricts_traversal() {
    let mut graph = graph_with(&["A", "B", "C"], &[("c1", "A", "B")]);
    graph
        .add_connection(Connection::new("c2", "A", "C", NetworkType::ExportGas))
        .unwrap();

    let gas = trace(
        &graph,
        &TraceRequest::downstream("A", Some(NetworkType::ExportGas), 3),
    )
    .unwrap();
    assert_eq!(gas.equipment_ids(), vec!["C"]);

    let flare = trace(
        &graph,
        &TraceRequest::downstream("A", Some(NetworkType::FlaredGas), 3),
    )
    .unwrap();
    assert!(flare.path.is_empty());
}

#[test]
fn upstream_trace_follows_incoming_edges() {
    let graph = diamond();
    let tree = trace(&graph, &TraceRequest::upstream("D", None, 5)).unwrap();
    assert_eq!(tree.direction, Direction::Upstream);
    assert_eq!(tree.equipment_ids(), vec!["B", "A", "C", "A"]);
    assert!(tree.path[0].downstream.is_empty());
    assert_eq!(tree.path[0].upstream[0].equipment_id, "A");
}

#[test]
fn leaves_omit_children_when_serialized() {
    let graph = graph_with(&["A", "B"], &[("c1", "A", "B")]);
    let tree = trace(&graph, &TraceRequest::downstream("A", None, 3)).unwrap();
    let json = serde_json::to_value(&tree).unwrap();
    let leaf = &json["path"][0];
    assert_eq!(leaf["equipment_id"], "B");
    assert!(leaf.get("downstream").is_none());
    assert_eq!(leaf["network_type"], "oil");
}

#[test]
fn direction_parses_case_insensitively() {
    assert_eq!("Upstream".parse::<Direction>().unwrap(), Direction::Upstream);
    assert!("sideways".parse::<Direction>().is_err());
}
