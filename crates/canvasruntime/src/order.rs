use canvascore::{NodeId, WorkflowError, WorkflowGraph};
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::collections::{HashMap, VecDeque};

/// Result of ordering a canvas graph for execution
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionPlan {
    /// Nodes reachable from a zero in-degree root, in execution order
    pub order: Vec<NodeId>,
    /// Nodes whose in-degree never reached zero: cycle members and everything downstream of them
    pub blocked: Vec<NodeId>,
    /// Strongly connected components that form cycles
    pub cycles: Vec<Vec<NodeId>>,
}

impl ExecutionPlan {
    pub fn is_complete(&self) -> bool {
        self.blocked.is_empty()
    }
}

/// Index the canvas graph into a petgraph arena; node indices follow insertion order
fn build_arena(graph: &WorkflowGraph) -> DiGraph<&str, ()> {
    let mut arena = DiGraph::with_capacity(graph.nodes().len(), graph.edges().len());
    let mut index: HashMap<&str, NodeIndex> = HashMap::new();

    for node in graph.nodes() {
        let idx = arena.add_node(node.id.as_str());
        index.insert(node.id.as_str(), idx);
    }
    for edge in graph.edges() {
        if let (Some(&from), Some(&to)) = (index.get(edge.source.as_str()), index.get(edge.target.as_str())) {
            arena.add_edge(from, to, ());
        }
    }
    arena
}

/// Kahn's algorithm over the canvas graph.
///
/// Roots are seeded in node insertion order and successors are released in
/// edge insertion order, so the result is stable for a given graph. Nodes
/// that never reach zero in-degree end up in `blocked` instead of `order`.
pub fn execution_order(graph: &WorkflowGraph) -> ExecutionPlan {
    let arena = build_arena(graph);

    let mut in_degree: Vec<usize> = arena
        .node_indices()
        .map(|idx| arena.edges_directed(idx, Direction::Incoming).count())
        .collect();

    let mut queue: VecDeque<NodeIndex> = arena
        .node_indices()
        .filter(|idx| in_degree[idx.index()] == 0)
        .collect();

    let mut order = Vec::with_capacity(arena.node_count());
    while let Some(idx) = queue.pop_front() {
        order.push(arena[idx].to_string());

        let mut outgoing: Vec<_> = arena
            .edges_directed(idx, Direction::Outgoing)
            .map(|e| (e.id(), e.target()))
            .collect();
        outgoing.sort_by_key(|(edge, _)| *edge);

        for (_, target) in outgoing {
            let degree = &mut in_degree[target.index()];
            *degree -= 1;
            if *degree == 0 {
                queue.push_back(target);
            }
        }
    }

    let blocked: Vec<NodeId> = arena
        .node_indices()
        .filter(|idx| in_degree[idx.index()] > 0)
        .map(|idx| arena[idx].to_string())
        .collect();

    let cycles = if blocked.is_empty() {
        Vec::new()
    } else {
        find_cycles(&arena)
    };

    ExecutionPlan {
        order,
        blocked,
        cycles,
    }
}

fn find_cycles(arena: &DiGraph<&str, ()>) -> Vec<Vec<NodeId>> {
    let mut components: Vec<Vec<NodeIndex>> = tarjan_scc(arena)
        .into_iter()
        .filter(|component| component.len() > 1 || arena.contains_edge(component[0], component[0]))
        .map(|mut component| {
            component.sort();
            component
        })
        .collect();
    components.sort();

    components
        .into_iter()
        .map(|component| component.into_iter().map(|idx| arena[idx].to_string()).collect())
        .collect()
}

/// Execution order that refuses graphs with blocked nodes
pub fn strict_order(graph: &WorkflowGraph) -> Result<Vec<NodeId>, WorkflowError> {
    let plan = execution_order(graph);
    if plan.is_complete() {
        Ok(plan.order)
    } else {
        Err(WorkflowError::CyclicDependency(plan.blocked))
    }
}
