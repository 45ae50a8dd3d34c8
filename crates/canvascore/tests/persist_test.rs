// crates/canvascore/tests/persist_test.rs

use canvascore::{
    ExecutionStatus, PipelineRecord, Position, WorkflowEdge, WorkflowError, WorkflowGraph,
    WorkflowNode,
};
use serde_json::json;

fn sample_graph() -> WorkflowGraph {
    let mut graph = WorkflowGraph::new();
    graph
        .insert_node(
            WorkflowNode::new("n1", "trigger")
                .with_label("Start")
                .with_position(10.0, 20.0),
        )
        .unwrap();
    graph
        .insert_node(
            WorkflowNode::new("n2", "condition")
                .with_label("Check")
                .with_config("expression", "score > 3")
                .with_position(200.0, 20.0),
        )
        .unwrap();
    graph
        .insert_node(WorkflowNode::new("n3", "output").with_position(400.0, 20.0))
        .unwrap();
    graph.insert_edge(WorkflowEdge::new("n1", "n2")).unwrap();
    graph
        .insert_edge(WorkflowEdge::new("n2", "n3").with_handles(Some("true".to_string()), None))
        .unwrap();
    graph
}

#[test]
fn test_persisted_shape_matches_backend_format() {
    let mut graph = sample_graph();
    graph.node_mut("n2").unwrap().data.notes = "route good leads".to_string();

    let value = serde_json::to_value(graph.to_persisted()).unwrap();

    assert_eq!(
        value["nodes"][1],
        json!({
            "id": "n2",
            "type": "condition",
            "position": {"x": 200.0, "y": 20.0},
            "data": {
                "label": "Check",
                "notes": "route good leads",
                "config": {"expression": "score > 3"}
            }
        })
    );
    assert_eq!(
        value["edges"][1],
        json!({
            "id": "edge-n2true-n3",
            "source": "n2",
            "target": "n3",
            "sourceHandle": "true",
            "targetHandle": null
        })
    );
}

#[test]
fn test_transient_fields_are_stripped() {
    let mut graph = sample_graph();
    {
        let node = graph.node_mut("n1").unwrap();
        node.data.status = ExecutionStatus::Success;
        node.data.last_output = Some(json!({"triggered": true}));
        node.data.last_input = Some(json!({}));
        node.data.last_error = Some("boom".to_string());
    }
    let edge_id = graph.edges()[0].id.clone();
    graph.edge_mut(&edge_id).unwrap().animated = true;

    let text = serde_json::to_string(&graph.to_persisted()).unwrap();

    for field in ["status", "last_output", "last_input", "last_error", "animated"] {
        assert!(!text.contains(field), "{} should not be persisted", field);
    }
}

#[test]
fn test_round_trip_preserves_nodes_and_edges() {
    let mut graph = sample_graph();
    graph.node_mut("n3").unwrap().data.status = ExecutionStatus::Error;

    let json = serde_json::to_string(&graph.to_persisted()).unwrap();
    let restored = WorkflowGraph::from_persisted(serde_json::from_str(&json).unwrap()).unwrap();

    let mut expected = graph.clone();
    expected.reset_execution();
    assert_eq!(restored, expected);
    assert_eq!(restored.node("n1").unwrap().position, Position::new(10.0, 20.0));
}

#[test]
fn test_loading_rejects_dangling_edges() {
    let mut persisted = sample_graph().to_persisted();
    persisted.nodes.retain(|n| n.id != "n3");

    let result = WorkflowGraph::from_persisted(persisted);

    assert_eq!(result.unwrap_err(), WorkflowError::NodeNotFound("n3".to_string()));
}

#[test]
fn test_pipeline_record_reads_graph_from_metadata() {
    let raw = json!({
        "id": "pipe-7",
        "name": "Lead routing",
        "status": "draft",
        "metadata": {
            "owner": "growth",
            "rf_nodes": [
                {"id": "a", "type": "trigger", "position": {"x": 0, "y": 0},
                 "data": {"label": "Start", "notes": "", "config": {}}},
                {"id": "b", "type": "action", "position": {"x": 100, "y": 0},
                 "data": {"label": "Notify", "config": {"action_type": "email"}}}
            ],
            "rf_edges": [
                {"id": "e1", "source": "a", "target": "b", "sourceHandle": null, "targetHandle": null}
            ]
        }
    });

    let record: PipelineRecord = serde_json::from_value(raw).unwrap();
    let graph = record.graph().unwrap();

    assert_eq!(graph.nodes().len(), 2);
    assert_eq!(graph.node("b").unwrap().data.config["action_type"], "email");
    assert_eq!(graph.edge("e1").unwrap().target, "b");

    let written = serde_json::to_value(&record).unwrap();
    assert_eq!(written["status"], "draft", "Unknown record fields are preserved");
    assert_eq!(written["metadata"]["owner"], "growth");
}

#[test]
fn test_record_without_graph_loads_empty() {
    let record: PipelineRecord = serde_json::from_value(json!({"id": "p", "name": "Empty"})).unwrap();

    assert!(record.graph().unwrap().is_empty());
}

#[test]
fn test_set_graph_replaces_embedded_graph() {
    let mut record = PipelineRecord::new("Draft", &WorkflowGraph::new());
    record.set_graph(&sample_graph());

    assert_eq!(record.metadata.rf_nodes.len(), 3);
    assert_eq!(record.metadata.rf_edges.len(), 2);
    assert_eq!(record.graph().unwrap(), sample_graph());
}

#[test]
fn test_null_metadata_reads_as_empty_graph() {
    let records: Vec<PipelineRecord> = serde_json::from_value(json!([
        {"id": "p1", "name": "No metadata", "metadata": null},
        {"id": "p2", "name": "Null lists", "metadata": {"rf_nodes": null, "rf_edges": null}},
        {"id": "p3", "name": "Good", "metadata": {
            "rf_nodes": [{"id": "a", "type": "trigger", "data": {"label": "Start", "notes": null, "config": null}}],
            "rf_edges": []
        }}
    ]))
    .unwrap();

    assert_eq!(records.len(), 3);
    assert!(records[0].graph().unwrap().is_empty());
    assert!(records[1].graph().unwrap().is_empty());
    let good = records[2].graph().unwrap();
    assert_eq!(good.node("a").unwrap().data.label, "Start");
    assert!(good.node("a").unwrap().data.config.is_empty());
}

#[test]
fn test_graph_serde_uses_persisted_shape() {
    let mut graph = sample_graph();
    graph.node_mut("n1").unwrap().data.status = ExecutionStatus::Success;

    let written = serde_json::to_value(&graph).unwrap();
    assert_eq!(written, serde_json::to_value(graph.to_persisted()).unwrap());

    let restored: WorkflowGraph = serde_json::from_value(written).unwrap();
    assert_eq!(restored.node("n1").unwrap().status(), ExecutionStatus::Idle);
    assert_eq!(restored.edges().len(), 2);
}

#[test]
fn test_graph_deserialize_rejects_dangling_edges() {
    let raw = json!({
        "nodes": [{"id": "a", "type": "trigger", "data": {"label": "Start"}}],
        "edges": [{"id": "e1", "source": "a", "target": "ghost"}]
    });

    let result = serde_json::from_value::<WorkflowGraph>(raw);

    assert!(result.unwrap_err().to_string().contains("ghost"));
}
