//! This module provides advisory checks over a composition graph.
//!
//! Evaluation never fails, so none of these findings prevent a graph from being
//! simulated. They point at wiring that will make blocks starve or values vanish:
//! duplicate ids, edges to missing blocks, out-of-range ports, unconnected input slots
//! and cycles.

use crate::simulator::parse_handle_index;
use crate::types::{ComposerError, Graph};
use std::collections::{HashMap, HashSet, VecDeque};
use thiserror::Error;

/// A problem found while analyzing a graph.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnalysisWarning {
    /// More than one node shares the same id; only the first is ever evaluated.
    #[error("Duplicate node id: {0}")]
    DuplicateNodeId(String),
    /// An edge references a node that does not exist; it is ignored during evaluation.
    #[error("Edge {edge} references unknown node {node}")]
    DanglingEdge { edge: String, node: String },
    /// A node declares zero output ports.
    #[error("Node {0} has no output ports")]
    NoOutputs(String),
    /// An edge handle selects a port index the node does not declare.
    #[error("Edge {edge} uses port {port} of node {node}, which declares {available}")]
    PortOutOfRange {
        edge: String,
        node: String,
        port: usize,
        available: usize,
    },
    /// A node has fewer incoming edges than declared input slots and will starve.
    #[error("Node {node} declares {expected} inputs but only {connected} are connected")]
    MissingInputs {
        node: String,
        expected: usize,
        connected: usize,
    },
    /// The listed nodes sit on or behind a cycle and can never become ready through it.
    #[error("Cycle detected through nodes: {0:?}")]
    Cycle(Vec<String>),
}

impl From<AnalysisWarning> for ComposerError {
    fn from(warning: AnalysisWarning) -> Self {
        ComposerError::ValidationError(warning.to_string())
    }
}

/// Runs every check over `graph` and returns all findings, in check order.
pub fn analyze(graph: &Graph) -> Vec<AnalysisWarning> {
    [
        check_duplicate_ids,
        check_dangling_edges,
        check_outputs,
        check_port_ranges,
        check_missing_inputs,
        check_cycles,
    ]
    .iter()
    .flat_map(|check| check(graph))
    .collect()
}

/// Returns the first finding as a `ComposerError::ValidationError`, if there is any.
pub fn validate(graph: &Graph) -> Result<(), ComposerError> {
    match analyze(graph).into_iter().next() {
        Some(warning) => Err(warning.into()),
        None => Ok(()),
    }
}

fn check_duplicate_ids(graph: &Graph) -> Vec<AnalysisWarning> {
    let mut seen = HashSet::new();
    let mut reported = HashSet::new();

    graph
        .nodes
        .iter()
        .filter(|node| !seen.insert(node.id.as_str()) && reported.insert(node.id.as_str()))
        .map(|node| AnalysisWarning::DuplicateNodeId(node.id.clone()))
        .collect()
}

fn check_dangling_edges(graph: &Graph) -> Vec<AnalysisWarning> {
    let known: HashSet<&str> = graph.nodes.iter().map(|node| node.id.as_str()).collect();

    graph
        .edges
        .iter()
        .flat_map(|edge| {
            [&edge.source, &edge.target]
                .into_iter()
                .filter(|id| !known.contains(id.as_str()))
                .map(|id| AnalysisWarning::DanglingEdge {
                    edge: edge.id.clone(),
                    node: id.clone(),
                })
                .collect::<Vec<_>>()
        })
        .collect()
}

fn check_outputs(graph: &Graph) -> Vec<AnalysisWarning> {
    graph
        .nodes
        .iter()
        .filter(|node| node.ports.outputs == 0)
        .map(|node| AnalysisWarning::NoOutputs(node.id.clone()))
        .collect()
}

fn check_port_ranges(graph: &Graph) -> Vec<AnalysisWarning> {
    let mut warnings = Vec::new();

    for edge in &graph.edges {
        let source = graph.node(&edge.source);
        let target = graph.node(&edge.target);

        if let (Some(node), Some(port)) = (source, parse_handle_index(edge.source_handle.as_deref())) {
            if port >= node.ports.outputs.max(1) {
                warnings.push(AnalysisWarning::PortOutOfRange {
                    edge: edge.id.clone(),
                    node: node.id.clone(),
                    port,
                    available: node.ports.outputs,
                });
            }
        }

        if let (Some(node), Some(port)) = (target, parse_handle_index(edge.target_handle.as_deref())) {
            if port >= node.ports.inputs {
                warnings.push(AnalysisWarning::PortOutOfRange {
                    edge: edge.id.clone(),
                    node: node.id.clone(),
                    port,
                    available: node.ports.inputs,
                });
            }
        }
    }

    warnings
}

fn check_missing_inputs(graph: &Graph) -> Vec<AnalysisWarning> {
    let mut incoming: HashMap<&str, usize> = HashMap::new();
    for edge in &graph.edges {
        if graph.node(&edge.source).is_some() {
            *incoming.entry(edge.target.as_str()).or_default() += 1;
        }
    }

    graph
        .nodes
        .iter()
        .filter(|node| !node.is_source())
        .filter_map(|node| {
            let connected = incoming.get(node.id.as_str()).copied().unwrap_or(0);
            (connected < node.ports.inputs).then(|| AnalysisWarning::MissingInputs {
                node: node.id.clone(),
                expected: node.ports.inputs,
                connected,
            })
        })
        .collect()
}

/// Kahn's algorithm over the known nodes; whatever keeps a non-zero in-degree is on or
/// downstream of a cycle.
fn check_cycles(graph: &Graph) -> Vec<AnalysisWarning> {
    let mut indegree: HashMap<&str, usize> = HashMap::new();
    let mut adjacent: HashMap<&str, Vec<&str>> = HashMap::new();

    for node in &graph.nodes {
        indegree.entry(node.id.as_str()).or_insert(0);
    }
    for edge in &graph.edges {
        if indegree.contains_key(edge.source.as_str()) && indegree.contains_key(edge.target.as_str()) {
            adjacent
                .entry(edge.source.as_str())
                .or_default()
                .push(edge.target.as_str());
            *indegree.entry(edge.target.as_str()).or_default() += 1;
        }
    }

    let mut queue: VecDeque<&str> = indegree
        .iter()
        .filter(|(_, &degree)| degree == 0)
        .map(|(&id, _)| id)
        .collect();

    while let Some(id) = queue.pop_front() {
        for &next in adjacent.get(id).into_iter().flatten() {
            if let Some(degree) = indegree.get_mut(next) {
                *degree -= 1;
                if *degree == 0 {
                    queue.push_back(next);
                }
            }
        }
    }

    let mut stuck: Vec<String> = Vec::new();
    for node in &graph.nodes {
        let blocked = indegree.get(node.id.as_str()).is_some_and(|&degree| degree > 0);
        if blocked && !stuck.contains(&node.id) {
            stuck.push(node.id.clone());
        }
    }

    if stuck.is_empty() {
        Vec::new()
    } else {
        vec![AnalysisWarning::Cycle(stuck)]
    }
}
