// crates/canvasruntime/tests/simulator_test.rs

use async_trait::async_trait;
use canvascore::{
    CanvasError, EventBus, ExecutionEvent, ExecutionStatus, NodeError, WorkflowEdge, WorkflowError,
    WorkflowGraph, WorkflowNode,
};
use canvasruntime::{
    CyclePolicy, ErrorHandling, ExecutionSimulator, MockStepExecutor, NodeRegistry, SimulatorConfig,
    StepContext, StepExecutor,
};
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast::Receiver;
use tokio_util::sync::CancellationToken;

fn registry() -> Arc<NodeRegistry> {
    Arc::new(canvasnodes::default_registry())
}

fn simulator_with(executor: MockStepExecutor, config: SimulatorConfig) -> ExecutionSimulator {
    ExecutionSimulator::with_executor(registry(), Arc::new(executor), config)
}

fn instant_simulator() -> ExecutionSimulator {
    simulator_with(MockStepExecutor::instant(), SimulatorConfig::default())
}

fn graph_with(nodes: &[(&str, &str)], edges: &[(&str, &str)]) -> WorkflowGraph {
    let mut graph = WorkflowGraph::new();
    for (id, node_type) in nodes {
        graph.insert_node(WorkflowNode::new(*id, *node_type)).unwrap();
    }
    for (source, target) in edges {
        graph.insert_edge(WorkflowEdge::new(*source, *target)).unwrap();
    }
    graph
}

fn drain(events: &mut Receiver<ExecutionEvent>) -> Vec<ExecutionEvent> {
    let mut collected = Vec::new();
    while let Ok(event) = events.try_recv() {
        collected.push(event);
    }
    collected
}

/// Node ids in the order their completion events were published
fn completed_order(events: &[ExecutionEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            ExecutionEvent::NodeCompleted { node_id, .. } => Some(node_id.clone()),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn test_trigger_then_action_succeed_in_order() {
    let mut graph = graph_with(&[("n1", "trigger"), ("n2", "action")], &[("n1", "n2")]);
    let bus = EventBus::new(100);
    let mut events = bus.subscribe();

    let summary = instant_simulator()
        .run(&mut graph, &bus, json!({}), CancellationToken::new())
        .await
        .unwrap();

    assert!(summary.success());
    assert_eq!(summary.executed, vec!["n1", "n2"]);
    assert_eq!(graph.node("n1").unwrap().status(), ExecutionStatus::Success);
    assert_eq!(graph.node("n2").unwrap().status(), ExecutionStatus::Success);

    let events = drain(&mut events);
    assert_eq!(completed_order(&events), vec!["n1", "n2"]);
    assert!(matches!(events.first(), Some(ExecutionEvent::RunStarted { .. })));
    assert!(matches!(
        events.last(),
        Some(ExecutionEvent::RunCompleted { success: true, cancelled: false, .. })
    ));
}

#[tokio::test]
async fn test_outputs_come_from_registry_or_fallback() {
    let mut graph = graph_with(&[("t", "trigger"), ("x", "transform"), ("u", "unregistered")], &[("t", "x")]);
    let bus = EventBus::new(100);

    instant_simulator()
        .run(&mut graph, &bus, json!({}), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(graph.node("t").unwrap().data.last_output, Some(json!({"triggered": true})));
    assert_eq!(graph.node("x").unwrap().data.last_output, Some(json!({"result": "ok"})));
    assert_eq!(graph.node("u").unwrap().data.last_output, Some(json!({"result": "ok"})));
}

#[tokio::test]
async fn test_input_merges_predecessor_outputs() {
    let mut graph = graph_with(
        &[("t", "trigger"), ("g", "guardrail"), ("a", "agent"), ("o", "output")],
        &[("t", "g"), ("t", "a"), ("g", "o"), ("a", "o")],
    );
    let bus = EventBus::new(100);

    instant_simulator()
        .run(&mut graph, &bus, json!({"lead": 7}), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(graph.node("t").unwrap().data.last_input, Some(json!({"lead": 7})));
    assert_eq!(graph.node("a").unwrap().data.last_input, Some(json!({"triggered": true})));
    assert_eq!(
        graph.node("o").unwrap().data.last_input,
        Some(json!({
            "passed": true,
            "violations": [],
            "response": "Agent completed the task",
            "iterations": 1
        }))
    );
}

#[tokio::test]
async fn test_isolated_cycle_never_executes() {
    let mut graph = graph_with(
        &[("a", "action"), ("b", "action"), ("c", "action")],
        &[("a", "b"), ("b", "c"), ("c", "a")],
    );
    let bus = EventBus::new(100);
    let mut events = bus.subscribe();

    let summary = instant_simulator()
        .run(&mut graph, &bus, json!({}), CancellationToken::new())
        .await
        .unwrap();

    assert!(summary.executed.is_empty());
    assert_eq!(summary.skipped, vec!["a", "b", "c"]);
    for id in ["a", "b", "c"] {
        assert_eq!(graph.node(id).unwrap().status(), ExecutionStatus::Idle);
        assert!(graph.node(id).unwrap().data.last_output.is_none());
    }

    let skipped = drain(&mut events)
        .into_iter()
        .filter(|e| matches!(e, ExecutionEvent::NodeSkipped { .. }))
        .count();
    assert_eq!(skipped, 3);
}

#[tokio::test]
async fn test_reject_policy_refuses_cyclic_graph_untouched() {
    let mut graph = graph_with(&[("r", "trigger"), ("a", "action"), ("b", "action")], &[("a", "b"), ("b", "a")]);
    let config = SimulatorConfig {
        on_cycle: CyclePolicy::Reject,
        ..SimulatorConfig::default()
    };

    let result = simulator_with(MockStepExecutor::instant(), config)
        .run(&mut graph, &EventBus::new(10), json!({}), CancellationToken::new())
        .await;

    match result {
        Err(CanvasError::Workflow(WorkflowError::CyclicDependency(blocked))) => {
            assert_eq!(blocked, vec!["a", "b"]);
        }
        other => panic!("expected cyclic dependency error, got {:?}", other),
    }
    assert_eq!(graph.node("r").unwrap().status(), ExecutionStatus::Idle);
}

#[tokio::test]
async fn test_failure_stops_run_and_releases_rest() {
    let mut graph = graph_with(
        &[("t", "trigger"), ("a", "action"), ("o", "output")],
        &[("t", "a"), ("a", "o")],
    );
    let bus = EventBus::new(100);

    let summary = simulator_with(MockStepExecutor::instant().fail_node("a"), SimulatorConfig::default())
        .run(&mut graph, &bus, json!({}), CancellationToken::new())
        .await
        .unwrap();

    assert!(!summary.success());
    assert_eq!(summary.executed, vec!["t"]);
    assert_eq!(summary.failed, vec!["a"]);
    assert_eq!(summary.skipped, vec!["o"]);
    assert_eq!(graph.node("a").unwrap().status(), ExecutionStatus::Error);
    assert!(graph.node("a").unwrap().data.last_error.is_some());
    assert_eq!(graph.node("o").unwrap().status(), ExecutionStatus::Idle);
}

#[tokio::test]
async fn test_continue_on_error_keeps_walking() {
    let mut graph = graph_with(
        &[("t", "trigger"), ("a", "action"), ("b", "tool")],
        &[("t", "a"), ("t", "b")],
    );
    let config = SimulatorConfig {
        on_error: ErrorHandling::ContinueOnError,
        ..SimulatorConfig::default()
    };

    let summary = simulator_with(MockStepExecutor::instant().fail_type("action"), config)
        .run(&mut graph, &EventBus::new(100), json!({}), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.executed, vec!["t", "b"]);
    assert_eq!(summary.failed, vec!["a"]);
    assert_eq!(graph.node("b").unwrap().status(), ExecutionStatus::Success);
}

#[tokio::test]
async fn test_edges_animate_only_while_target_runs() {
    let mut graph = graph_with(&[("t", "trigger"), ("a", "action")], &[("t", "a")]);
    let edge_id = graph.edges()[0].id.clone();
    let bus = EventBus::new(100);
    let mut events = bus.subscribe();

    instant_simulator()
        .run(&mut graph, &bus, json!({}), CancellationToken::new())
        .await
        .unwrap();

    let activity: Vec<(String, bool)> = drain(&mut events)
        .into_iter()
        .filter_map(|e| match e {
            ExecutionEvent::EdgeActivity { edge_id, active, .. } => Some((edge_id, active)),
            _ => None,
        })
        .collect();
    assert_eq!(activity, vec![(edge_id.clone(), true), (edge_id.clone(), false)]);
    assert!(!graph.edge(&edge_id).unwrap().animated);
}

#[tokio::test]
async fn test_rerun_clears_previous_results() {
    let mut graph = graph_with(&[("t", "trigger"), ("a", "action")], &[("t", "a")]);
    let bus = EventBus::new(100);

    simulator_with(MockStepExecutor::instant().fail_node("a"), SimulatorConfig::default())
        .run(&mut graph, &bus, json!({}), CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(graph.node("a").unwrap().status(), ExecutionStatus::Error);

    instant_simulator()
        .run(&mut graph, &bus, json!({}), CancellationToken::new())
        .await
        .unwrap();

    let node = graph.node("a").unwrap();
    assert_eq!(node.status(), ExecutionStatus::Success);
    assert!(node.data.last_error.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_simulated_latency_stays_in_range() {
    let mut graph = graph_with(
        &[("t", "trigger"), ("a", "agent"), ("o", "output")],
        &[("t", "a"), ("a", "o")],
    );
    let bus = EventBus::new(100);
    let mut events = bus.subscribe();

    let started = tokio::time::Instant::now();
    default_simulator().run(&mut graph, &bus, json!({}), CancellationToken::new()).await.unwrap();
    let elapsed = started.elapsed();

    assert!(elapsed >= Duration::from_millis(900), "three steps of at least 300ms");
    assert!(elapsed <= Duration::from_millis(2400 + 50), "three steps of at most 800ms");
    for event in drain(&mut events) {
        if let ExecutionEvent::NodeCompleted { duration_ms, .. } = event {
            assert!((300..=810).contains(&duration_ms), "step took {}ms", duration_ms);
        }
    }
}

fn default_simulator() -> ExecutionSimulator {
    ExecutionSimulator::new(registry(), SimulatorConfig::default())
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_stops_remaining_nodes() {
    let mut graph = graph_with(
        &[("t", "trigger"), ("a", "action"), ("o", "output")],
        &[("t", "a"), ("a", "o")],
    );
    let bus = EventBus::new(100);
    let cancellation = CancellationToken::new();
    let cancel = cancellation.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(1500)).await;
        cancel.cancel();
    });

    let summary = simulator_with(MockStepExecutor::new(1000, 1000), SimulatorConfig::default())
        .run(&mut graph, &bus, json!({}), cancellation)
        .await
        .unwrap();

    assert!(summary.cancelled);
    assert!(!summary.success());
    assert_eq!(summary.executed, vec!["t"]);
    assert_eq!(summary.failed, vec!["a"]);
    assert_eq!(summary.skipped, vec!["o"]);
    assert_eq!(graph.node("a").unwrap().data.last_error.as_deref(), Some("Cancelled"));
    assert_eq!(graph.node("o").unwrap().status(), ExecutionStatus::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_step_timeout_marks_node_error() {
    let mut graph = graph_with(&[("t", "trigger")], &[]);
    let config = SimulatorConfig {
        step_timeout_ms: Some(100),
        ..SimulatorConfig::default()
    };

    let summary = simulator_with(MockStepExecutor::new(500, 500), config)
        .run(&mut graph, &EventBus::new(10), json!({}), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.failed, vec!["t"]);
    assert_eq!(
        graph.node("t").unwrap().data.last_error,
        Some(NodeError::Timeout { millis: 100 }.to_string())
    );
}

/// Step executor that records the input each step receives
struct InputRecorder {
    snapshots: Mutex<Vec<(String, serde_json::Value)>>,
}

#[async_trait]
impl StepExecutor for InputRecorder {
    async fn execute(&self, ctx: StepContext) -> Result<serde_json::Value, NodeError> {
        ctx.events.progress(50.0, None);
        self.snapshots
            .lock()
            .unwrap()
            .push((ctx.node_id.clone(), ctx.input.clone()));
        let mut output = serde_json::Map::new();
        output.insert(ctx.node_id.clone(), json!("done"));
        Ok(serde_json::Value::Object(output))
    }
}

#[tokio::test]
async fn test_custom_executor_receives_context() {
    let mut graph = graph_with(&[("t", "trigger"), ("a", "action")], &[("t", "a")]);
    let recorder = Arc::new(InputRecorder {
        snapshots: Mutex::new(Vec::new()),
    });
    let simulator = ExecutionSimulator::with_executor(registry(), recorder.clone(), SimulatorConfig::default());
    let bus = EventBus::new(100);
    let mut events = bus.subscribe();

    simulator
        .run(&mut graph, &bus, json!({"seed": 1}), CancellationToken::new())
        .await
        .unwrap();

    let snapshots = recorder.snapshots.lock().unwrap().clone();
    assert_eq!(
        snapshots,
        vec![
            ("t".to_string(), json!({"seed": 1})),
            ("a".to_string(), json!({"t": "done"})),
        ]
    );
    assert_eq!(graph.node("a").unwrap().data.last_output, Some(json!({"a": "done"})));

    let progress = drain(&mut events)
        .into_iter()
        .filter(|e| matches!(e, ExecutionEvent::NodeEvent { .. }))
        .count();
    assert_eq!(progress, 2);
}

/// Step executor that folds status events seen so far into a status map at each step
struct StatusWatcher {
    events: Mutex<Receiver<ExecutionEvent>>,
    statuses: Mutex<HashMap<String, ExecutionStatus>>,
    seen: Mutex<Vec<(String, HashMap<String, ExecutionStatus>)>>,
}

#[async_trait]
impl StepExecutor for StatusWatcher {
    async fn execute(&self, ctx: StepContext) -> Result<serde_json::Value, NodeError> {
        let mut statuses = self.statuses.lock().unwrap();
        for event in drain(&mut self.events.lock().unwrap()) {
            if let ExecutionEvent::NodeStatus { node_id, status, .. } = event {
                statuses.insert(node_id, status);
            }
        }
        self.seen
            .lock()
            .unwrap()
            .push((ctx.node_id.clone(), statuses.clone()));
        Ok(json!({}))
    }
}

#[tokio::test]
async fn test_nodes_are_queued_then_running_one_at_a_time() {
    let mut graph = graph_with(
        &[("t", "trigger"), ("a", "action"), ("o", "output")],
        &[("t", "a"), ("a", "o")],
    );
    let bus = EventBus::new(100);
    let mut events = bus.subscribe();
    let watcher = Arc::new(StatusWatcher {
        events: Mutex::new(bus.subscribe()),
        statuses: Mutex::new(HashMap::new()),
        seen: Mutex::new(Vec::new()),
    });
    let simulator = ExecutionSimulator::with_executor(registry(), watcher.clone(), SimulatorConfig::default());

    simulator
        .run(&mut graph, &bus, json!({}), CancellationToken::new())
        .await
        .unwrap();

    let expect = |pairs: &[(&str, ExecutionStatus)]| -> HashMap<String, ExecutionStatus> {
        pairs.iter().map(|(id, s)| (id.to_string(), *s)).collect()
    };
    use ExecutionStatus::{Queued, Running, Success};
    let seen = watcher.seen.lock().unwrap().clone();
    assert_eq!(
        seen,
        vec![
            ("t".to_string(), expect(&[("t", Running), ("a", Queued), ("o", Queued)])),
            ("a".to_string(), expect(&[("t", Success), ("a", Running), ("o", Queued)])),
            ("o".to_string(), expect(&[("t", Success), ("a", Success), ("o", Running)])),
        ]
    );
    for id in ["t", "a", "o"] {
        assert_eq!(graph.node(id).unwrap().status(), Success);
    }

    match events.try_recv() {
        Ok(ExecutionEvent::RunStarted { queued, .. }) => assert_eq!(queued, vec!["t", "a", "o"]),
        other => panic!("expected RunStarted first, got {:?}", other),
    }
}

#[tokio::test]
async fn test_blocked_nodes_are_never_queued() {
    let mut graph = graph_with(
        &[("t", "trigger"), ("a", "action"), ("b", "action")],
        &[("a", "b"), ("b", "a")],
    );
    let bus = EventBus::new(100);
    let mut events = bus.subscribe();

    instant_simulator()
        .run(&mut graph, &bus, json!({}), CancellationToken::new())
        .await
        .unwrap();

    let events = drain(&mut events);
    assert!(matches!(
        events.first(),
        Some(ExecutionEvent::RunStarted { queued, .. }) if queued == &vec!["t".to_string()]
    ));
    let queued_ids: Vec<&str> = events
        .iter()
        .filter_map(|e| match e {
            ExecutionEvent::NodeStatus { node_id, status: ExecutionStatus::Queued, .. } => Some(node_id.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(queued_ids, vec!["t"]);
}
