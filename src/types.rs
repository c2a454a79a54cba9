//! This module defines the core data structures used throughout the composer engine,
//! including blocks (nodes), their wiring (edges), simulation results, and error types.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// Identifier of a node in the composition graph.
pub type NodeId = String;
/// Identifier of an edge in the composition graph.
pub type EdgeId = String;
/// A non-negative integer quantity, modelling a tally of `1`s on a unary tape.
pub type Unary = u64;

/// The kind of computation a block performs.
///
/// Unrecognized kind tags deserialize to [`BlockKind::Unknown`], which evaluates as a
/// pass-through (or as an input source when the block has no inputs).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockKind {
    Adder,
    Comparer,
    Eraser,
    Copier,
    Multiplier,
    Conditional,
    Custom,
    #[serde(other)]
    Unknown,
}

impl BlockKind {
    /// Returns the lowercase tag used in serialized graphs.
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockKind::Adder => "adder",
            BlockKind::Comparer => "comparer",
            BlockKind::Eraser => "eraser",
            BlockKind::Copier => "copier",
            BlockKind::Multiplier => "multiplier",
            BlockKind::Conditional => "conditional",
            BlockKind::Custom => "custom",
            BlockKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The role a node plays on the canvas.
///
/// `Input` marks an explicit external value source. Any node with zero declared
/// inputs is also treated as a source regardless of its role.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeRole {
    Input,
    #[default]
    #[serde(other)]
    Default,
}

/// Declared port counts of a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ports {
    /// Number of input slots; zero makes the block an input source.
    pub inputs: usize,
    /// Number of output ports, expected to be at least one.
    pub outputs: usize,
}

impl Ports {
    pub fn new(inputs: usize, outputs: usize) -> Self {
        Self { inputs, outputs }
    }
}

/// A block in the composition graph.
///
/// Nodes serialize flat. Editor exports that nest the block fields under `data`
/// (next to a canvas `position`) are accepted as well.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "NodeRecord")]
pub struct Node {
    pub id: NodeId,
    #[serde(rename = "type")]
    pub role: NodeRole,
    pub label: String,
    pub description: String,
    pub ports: Ports,
    pub kind: BlockKind,
    /// Sanitized pseudocode, only meaningful for custom blocks.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pseudocode: Option<String>,
}

#[derive(Deserialize)]
struct NodeBody {
    label: String,
    #[serde(default)]
    description: String,
    ports: Ports,
    kind: BlockKind,
    #[serde(default)]
    pseudocode: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NodeRecord {
    Exported {
        id: NodeId,
        #[serde(default, rename = "type")]
        role: NodeRole,
        data: NodeBody,
    },
    Flat {
        id: NodeId,
        #[serde(default, rename = "type")]
        role: NodeRole,
        #[serde(flatten)]
        body: NodeBody,
    },
}

impl From<NodeRecord> for Node {
    fn from(record: NodeRecord) -> Self {
        let (id, role, body) = match record {
            NodeRecord::Exported { id, role, data } => (id, role, data),
            NodeRecord::Flat { id, role, body } => (id, role, body),
        };

        Node {
            id,
            role,
            label: body.label,
            description: body.description,
            ports: body.ports,
            kind: body.kind,
            pseudocode: body.pseudocode,
        }
    }
}

impl Node {
    /// Returns `true` when the node takes its value from the supplied input map
    /// rather than from upstream blocks.
    pub fn is_source(&self) -> bool {
        self.role == NodeRole::Input || self.ports.inputs == 0
    }

    /// Returns the first line of the node's pseudocode, trimmed, if it is not empty.
    pub fn first_pseudocode_line(&self) -> Option<&str> {
        self.pseudocode
            .as_deref()
            .and_then(|code| code.lines().next())
            .map(str::trim)
            .filter(|line| !line.is_empty())
    }
}

/// A wire between an output port of one block and an input slot of another.
///
/// Handles are free-form identifiers; a trailing `-<digits>` suffix (e.g. `out-1`)
/// selects a port index. Edges carry no values themselves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub id: EdgeId,
    pub source: NodeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_handle: Option<String>,
    pub target: NodeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_handle: Option<String>,
    /// Optional text shown on the wire; `<` and `≥`/`>=` double as branch hints.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl Edge {
    /// Creates an unlabelled edge without explicit handles.
    pub fn new(id: &str, source: &str, target: &str) -> Self {
        Self {
            id: id.to_string(),
            source: source.to_string(),
            source_handle: None,
            target: target.to_string(),
            target_handle: None,
            label: None,
        }
    }
}

/// A complete composition: the serialized node/edge collection.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Graph {
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

impl Graph {
    /// Evaluates the graph once against the given input values.
    pub fn simulate(&self, input_values: &HashMap<String, Unary>) -> SimulationResult {
        crate::simulator::simulate(&self.nodes, &self.edges, input_values)
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|node| node.id == id)
    }

    /// Returns the nodes that act as external value sources.
    pub fn sources(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter(|node| node.is_source())
    }

    /// Runs the pseudocode of every custom block through the sanitizer.
    ///
    /// Graphs coming from files or templates pass through here so that the interpreter
    /// only ever sees legal tokens.
    pub fn sanitized(mut self) -> Self {
        for node in self.nodes.iter_mut().filter(|node| node.kind == BlockKind::Custom) {
            if let Some(code) = node.pseudocode.as_mut() {
                *code = crate::parser::sanitize(code);
            }
        }
        self
    }
}

/// A named preset graph offered to the composer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

impl Template {
    /// Returns a copy of the template's node/edge collection.
    pub fn graph(&self) -> Graph {
        Graph {
            nodes: self.nodes.clone(),
            edges: self.edges.clone(),
        }
    }
}

/// The record of one evaluated block, in evaluation order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationStep {
    pub node_id: NodeId,
    pub label: String,
    pub kind: BlockKind,
    /// The filled input slots, compacted (empty slots dropped).
    pub inputs: Vec<Unary>,
    pub outputs: Vec<Unary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_outputs: Option<Vec<usize>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// The value left on a terminal block (one without outgoing edges).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputValue {
    pub node_id: NodeId,
    pub label: String,
    pub value: Unary,
}

/// The outcome of one evaluation run.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationResult {
    pub steps: Vec<SimulationStep>,
    pub output_values: Vec<OutputValue>,
    /// One message per block that never received all of its inputs.
    pub errors: Vec<String>,
}

impl SimulationResult {
    /// Returns `true` when every block was evaluated.
    pub fn is_complete(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn output(&self, node_id: &str) -> Option<Unary> {
        self.output_values
            .iter()
            .find(|output| output.node_id == node_id)
            .map(|output| output.value)
    }

    pub fn step(&self, node_id: &str) -> Option<&SimulationStep> {
        self.steps.iter().find(|step| step.node_id == node_id)
    }
}

/// Errors raised by the host-side composer operations: loading, editing and templates.
///
/// Evaluation itself never fails; see [`SimulationResult::errors`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ComposerError {
    /// A node id did not match any node of the document.
    #[error("Node not found: {0}")]
    NodeNotFound(String),
    /// An edge id did not match any edge of the document.
    #[error("Edge not found: {0}")]
    EdgeNotFound(String),
    /// A template id or index did not match any registered template.
    #[error("Template not found: {0}")]
    TemplateNotFound(String),
    /// The graph document is not valid JSON or does not match the graph schema.
    #[error("Graph parsing error: {0}")]
    ParseError(String),
    /// The graph is structurally unusable, e.g. an edge endpoint is missing.
    #[error("Graph validation error: {0}")]
    ValidationError(String),
    /// Reading a graph file or directory failed.
    #[error("File error: {0}")]
    FileError(String),
}

impl From<serde_json::Error> for ComposerError {
    fn from(error: serde_json::Error) -> Self {
        ComposerError::ParseError(error.to_string())
    }
}
