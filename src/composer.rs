//! The editable composition document.
//!
//! A [`Composer`] owns the nodes and edges a host is editing together with its own copy
//! of the templates. Every edit that touches pseudocode runs it through the sanitizer,
//! so the interpreter never sees illegal tokens.

use crate::parser;
use crate::templates::TemplateManager;
use crate::types::{
    BlockKind, ComposerError, Edge, EdgeId, Graph, Node, NodeId, NodeRole, Ports,
    SimulationResult, Template, Unary,
};
use log::debug;
use std::collections::HashMap;

/// The fields a host supplies when placing a new block.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeData {
    pub label: String,
    pub description: String,
    pub ports: Ports,
    pub kind: BlockKind,
    pub pseudocode: Option<String>,
}

impl NodeData {
    pub fn new(kind: BlockKind, label: &str, ports: Ports) -> Self {
        Self {
            label: label.to_string(),
            description: String::new(),
            ports,
            kind,
            pseudocode: None,
        }
    }

    pub fn with_pseudocode(mut self, code: &str) -> Self {
        self.pseudocode = Some(code.to_string());
        self
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    /// Returns the palette entry for `kind`, with its usual port counts.
    ///
    /// Custom blocks start empty with one input and one output; their pseudocode is
    /// written afterwards with [`Composer::update_node`] or [`Composer::insert_token`].
    pub fn preset(kind: BlockKind) -> Self {
        match kind {
            BlockKind::Adder => Self::new(kind, "Adder", Ports::new(2, 1))
                .with_description("Adds unary inputs")
                .with_pseudocode("repeat: append y to x"),
            BlockKind::Comparer => Self::new(kind, "Comparer", Ports::new(2, 2))
                .with_description("Checks ≥")
                .with_pseudocode("if x≥y then pass else route"),
            BlockKind::Eraser => Self::new(kind, "Eraser", Ports::new(1, 1))
                .with_description("Clears tape")
                .with_pseudocode("erase everything"),
            BlockKind::Copier => Self::new(kind, "Copier", Ports::new(1, 2))
                .with_description("Duplicates input")
                .with_pseudocode("copy until blank"),
            BlockKind::Conditional => Self::new(kind, "Conditional", Ports::new(1, 2))
                .with_description("Routes by flag")
                .with_pseudocode("if flag then path A else path B"),
            BlockKind::Multiplier => Self::new(kind, "Multiplier", Ports::new(2, 1))
                .with_description("Multiplies unary inputs")
                .with_pseudocode("result := x × y"),
            BlockKind::Custom => Self::new(kind, "Custom block", Ports::new(1, 1))
                .with_description("Custom macroinstruction"),
            BlockKind::Unknown => Self::new(kind, "Block", Ports::new(1, 1)),
        }
    }
}

/// The blocks offered by the editor palette, in display order.
pub const BLOCK_LIBRARY: [BlockKind; 6] = [
    BlockKind::Adder,
    BlockKind::Comparer,
    BlockKind::Eraser,
    BlockKind::Copier,
    BlockKind::Conditional,
    BlockKind::Custom,
];

/// A partial node edit; `None` fields are left untouched.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct NodeUpdate {
    pub label: Option<String>,
    pub description: Option<String>,
    pub ports: Option<Ports>,
    pub kind: Option<BlockKind>,
    pub pseudocode: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Composer {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    templates: Vec<Template>,
    next_id: usize,
}

impl Default for Composer {
    fn default() -> Self {
        Self::new()
    }
}

impl Composer {
    /// Creates a document holding the two baseline inputs and the embedded templates.
    pub fn new() -> Self {
        Self {
            nodes: baseline_nodes(),
            edges: Vec::new(),
            templates: TemplateManager::all(),
            next_id: 1,
        }
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn templates(&self) -> &[Template] {
        &self.templates
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|node| node.id == id)
    }

    /// Places a new block and returns its id.
    pub fn add_node(&mut self, data: NodeData) -> NodeId {
        let id = self.fresh_id("node", |composer, id| composer.node(id).is_some());
        let mut node = Node {
            id: id.clone(),
            role: NodeRole::Default,
            label: data.label,
            description: data.description,
            ports: data.ports,
            kind: data.kind,
            pseudocode: data.pseudocode,
        };
        sanitize_node(&mut node);

        debug!("Added {} block {}", node.kind, id);
        self.nodes.push(node);
        id
    }

    /// Applies a partial edit to an existing block.
    pub fn update_node(&mut self, id: &str, update: NodeUpdate) -> Result<(), ComposerError> {
        let node = self.node_mut(id)?;

        if let Some(label) = update.label {
            node.label = label;
        }
        if let Some(description) = update.description {
            node.description = description;
        }
        if let Some(ports) = update.ports {
            node.ports = ports;
        }
        if let Some(kind) = update.kind {
            node.kind = kind;
        }
        if let Some(code) = update.pseudocode {
            node.pseudocode = Some(code);
        }
        sanitize_node(node);

        Ok(())
    }

    /// Appends a palette token to a block's pseudocode and returns the sanitized result.
    pub fn insert_token(&mut self, id: &str, token: &str) -> Result<String, ComposerError> {
        let node = self.node_mut(id)?;
        let code = parser::insert_token(node.pseudocode.as_deref().unwrap_or(""), token);
        node.pseudocode = Some(code.clone());
        Ok(code)
    }

    /// Removes a block together with every edge attached to it.
    pub fn remove_node(&mut self, id: &str) -> Result<Node, ComposerError> {
        let index = self
            .nodes
            .iter()
            .position(|node| node.id == id)
            .ok_or_else(|| ComposerError::NodeNotFound(id.to_string()))?;

        self.edges.retain(|edge| edge.source != id && edge.target != id);
        Ok(self.nodes.remove(index))
    }

    /// Adds a wire between two existing blocks and returns its id.
    ///
    /// An empty or already used edge id is replaced with a fresh one.
    pub fn connect(&mut self, mut edge: Edge) -> Result<EdgeId, ComposerError> {
        for endpoint in [&edge.source, &edge.target] {
            if self.node(endpoint).is_none() {
                return Err(ComposerError::NodeNotFound(endpoint.clone()));
            }
        }

        if edge.id.is_empty() || self.edges.iter().any(|e| e.id == edge.id) {
            edge.id = self.fresh_id("edge", |composer, id| {
                composer.edges.iter().any(|e| e.id == id)
            });
        }

        debug!("Connected {} -> {} as {}", edge.source, edge.target, edge.id);
        let id = edge.id.clone();
        self.edges.push(edge);
        Ok(id)
    }

    pub fn remove_edge(&mut self, id: &str) -> Result<Edge, ComposerError> {
        let index = self
            .edges
            .iter()
            .position(|edge| edge.id == id)
            .ok_or_else(|| ComposerError::EdgeNotFound(id.to_string()))?;

        Ok(self.edges.remove(index))
    }

    /// Replaces every block; custom pseudocode is sanitized.
    pub fn set_nodes(&mut self, nodes: Vec<Node>) {
        self.nodes = nodes;
        self.nodes.iter_mut().for_each(sanitize_node);
    }

    /// Replaces every edge as given, without checking endpoints.
    pub fn set_edges(&mut self, edges: Vec<Edge>) {
        self.edges = edges;
    }

    pub fn set_templates(&mut self, templates: Vec<Template>) {
        self.templates = templates;
    }

    /// Replaces the document with a copy of the template `id`.
    ///
    /// Nodes and edges receive fresh ids; edge endpoints follow their nodes.
    pub fn load_template(&mut self, id: &str) -> Result<(), ComposerError> {
        let template = self
            .templates
            .iter()
            .find(|template| template.id == id)
            .cloned()
            .ok_or_else(|| ComposerError::TemplateNotFound(id.to_string()))?;

        self.nodes.clear();
        self.edges.clear();

        let mut renamed: HashMap<NodeId, NodeId> = HashMap::new();
        for mut node in template.nodes {
            let fresh = self.fresh_id("node", |composer, id| composer.node(id).is_some());
            renamed.insert(node.id.clone(), fresh.clone());
            node.id = fresh;
            sanitize_node(&mut node);
            self.nodes.push(node);
        }

        for mut edge in template.edges {
            edge.id = self.fresh_id("edge", |composer, id| {
                composer.edges.iter().any(|e| e.id == id)
            });
            if let Some(source) = renamed.get(&edge.source) {
                edge.source = source.clone();
            }
            if let Some(target) = renamed.get(&edge.target) {
                edge.target = target.clone();
            }
            self.edges.push(edge);
        }

        debug!(
            "Loaded template {} ({} nodes, {} edges)",
            id,
            self.nodes.len(),
            self.edges.len()
        );
        Ok(())
    }

    /// Restores the baseline document, including the built-in templates.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Returns a snapshot of the current node/edge collection.
    pub fn graph(&self) -> Graph {
        Graph {
            nodes: self.nodes.clone(),
            edges: self.edges.clone(),
        }
    }

    pub fn simulate(&self, input_values: &HashMap<String, Unary>) -> SimulationResult {
        crate::simulator::simulate(&self.nodes, &self.edges, input_values)
    }

    fn node_mut(&mut self, id: &str) -> Result<&mut Node, ComposerError> {
        self.nodes
            .iter_mut()
            .find(|node| node.id == id)
            .ok_or_else(|| ComposerError::NodeNotFound(id.to_string()))
    }

    fn fresh_id(&mut self, prefix: &str, taken: impl Fn(&Self, &str) -> bool) -> String {
        loop {
            let id = format!("{}-{}", prefix, self.next_id);
            self.next_id += 1;
            if !taken(self, &id) {
                return id;
            }
        }
    }
}

fn baseline_nodes() -> Vec<Node> {
    [("input-x", "Input x"), ("input-y", "Input y")]
        .into_iter()
        .map(|(id, label)| Node {
            id: id.to_string(),
            role: NodeRole::Input,
            label: label.to_string(),
            description: format!("Unary {}", label.to_lowercase()),
            ports: Ports::new(0, 1),
            kind: BlockKind::Custom,
            pseudocode: None,
        })
        .collect()
}

fn sanitize_node(node: &mut Node) {
    if node.kind != BlockKind::Custom {
        return;
    }
    if let Some(code) = node.pseudocode.as_mut() {
        *code = parser::sanitize(code);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs(pairs: &[(&str, Unary)]) -> HashMap<String, Unary> {
        pairs
            .iter()
            .map(|(key, value)| (key.to_string(), *value))
            .collect()
    }

    #[test]
    fn test_new_has_baseline_inputs() {
        let composer = Composer::new();
        let ids: Vec<_> = composer.nodes().iter().map(|n| n.id.as_str()).collect();

        assert_eq!(ids, vec!["input-x", "input-y"]);
        assert!(composer.nodes().iter().all(Node::is_source));
        assert!(composer.edges().is_empty());
        assert_eq!(composer.templates().len(), TemplateManager::get_template_count());
    }

    #[test]
    fn test_add_node_assigns_sequential_ids() {
        let mut composer = Composer::new();
        let a = composer.add_node(NodeData::new(BlockKind::Adder, "Adder", Ports::new(2, 1)));
        let b = composer.add_node(NodeData::new(BlockKind::Eraser, "Eraser", Ports::new(1, 1)));

        assert_eq!(a, "node-1");
        assert_eq!(b, "node-2");
        assert_eq!(composer.node(&a).unwrap().role, NodeRole::Default);
    }

    #[test]
    fn test_add_node_sanitizes_custom_pseudocode() {
        let mut composer = Composer::new();
        let id = composer.add_node(
            NodeData::new(BlockKind::Custom, "Triple", Ports::new(1, 1))
                .with_pseudocode("multiply by 3; done"),
        );
        assert_eq!(
            composer.node(&id).unwrap().pseudocode.as_deref(),
            Some("multiply by 3 ")
        );
    }

    #[test]
    fn test_block_library_presets_evaluate() {
        let mut composer = Composer::new();

        for kind in BLOCK_LIBRARY {
            let id = composer.add_node(NodeData::preset(kind));
            let node = composer.node(&id).unwrap();
            assert_eq!(node.kind, kind);
            assert!(!node.is_source(), "{} should take inputs", kind);

            let inputs = vec![2; node.ports.inputs];
            let result = crate::blocks::evaluate(node, &inputs, &HashMap::new());
            let expected = match kind {
                BlockKind::Adder => vec![4],
                BlockKind::Eraser => vec![0],
                BlockKind::Custom => vec![2],
                _ => vec![2, 2],
            };
            assert_eq!(result.outputs, expected, "{}", kind);
        }
    }

    #[test]
    fn test_custom_preset_defaults() {
        let data = NodeData::preset(BlockKind::Custom);
        assert_eq!(data.description, "Custom macroinstruction");
        assert_eq!(data.ports, Ports::new(1, 1));
        assert_eq!(data.pseudocode, None);

        let multiplier = NodeData::preset(BlockKind::Multiplier);
        assert_eq!(multiplier.ports, Ports::new(2, 1));
    }

    #[test]
    fn test_update_node() {
        let mut composer = Composer::new();
        let id = composer.add_node(NodeData::new(BlockKind::Custom, "Block", Ports::new(1, 1)));

        let update = NodeUpdate {
            label: Some("Doubler".to_string()),
            pseudocode: Some("double it!".to_string()),
            ..Default::default()
        };
        assert!(composer.update_node(&id, update).is_ok());

        let node = composer.node(&id).unwrap();
        assert_eq!(node.label, "Doubler");
        assert_eq!(node.pseudocode.as_deref(), Some("double "));
        assert_eq!(node.ports, Ports::new(1, 1));

        let result = composer.update_node("missing", NodeUpdate::default());
        assert_eq!(result, Err(ComposerError::NodeNotFound("missing".to_string())));
    }

    #[test]
    fn test_insert_token() {
        let mut composer = Composer::new();
        let id = composer.add_node(NodeData::new(BlockKind::Custom, "Block", Ports::new(1, 2)));

        assert_eq!(composer.insert_token(&id, "if").unwrap(), "if ");
        assert_eq!(composer.insert_token(&id, "value").unwrap(), "if value");
        assert_eq!(
            composer.node(&id).unwrap().pseudocode.as_deref(),
            Some("if value")
        );
        assert!(composer.insert_token("missing", "add").is_err());
    }

    #[test]
    fn test_remove_node_drops_connected_edges() {
        let mut composer = Composer::new();
        let adder = composer.add_node(NodeData::new(BlockKind::Adder, "Adder", Ports::new(2, 1)));
        composer.connect(Edge::new("e1", "input-x", &adder)).unwrap();
        composer.connect(Edge::new("e2", "input-y", &adder)).unwrap();
        composer.connect(Edge::new("e3", "input-x", "input-y")).unwrap();

        let removed = composer.remove_node(&adder).unwrap();
        assert_eq!(removed.label, "Adder");
        assert_eq!(composer.edges().len(), 1);
        assert_eq!(composer.edges()[0].id, "e3");

        assert!(matches!(
            composer.remove_node(&adder),
            Err(ComposerError::NodeNotFound(_))
        ));
    }

    #[test]
    fn test_connect_validates_endpoints() {
        let mut composer = Composer::new();
        let result = composer.connect(Edge::new("e1", "input-x", "ghost"));
        assert_eq!(result, Err(ComposerError::NodeNotFound("ghost".to_string())));
        assert!(composer.edges().is_empty());
    }

    #[test]
    fn test_connect_replaces_duplicate_edge_id() {
        let mut composer = Composer::new();
        let first = composer.connect(Edge::new("e1", "input-x", "input-y")).unwrap();
        let second = composer.connect(Edge::new("e1", "input-y", "input-x")).unwrap();
        let third = composer.connect(Edge::new("", "input-y", "input-x")).unwrap();

        assert_eq!(first, "e1");
        assert_ne!(second, "e1");
        assert!(!third.is_empty());
        assert_ne!(second, third);
    }

    #[test]
    fn test_remove_edge() {
        let mut composer = Composer::new();
        composer.connect(Edge::new("e1", "input-x", "input-y")).unwrap();

        assert_eq!(composer.remove_edge("e1").unwrap().source, "input-x");
        assert_eq!(
            composer.remove_edge("e1"),
            Err(ComposerError::EdgeNotFound("e1".to_string()))
        );
    }

    #[test]
    fn test_set_nodes_sanitizes() {
        let mut composer = Composer::new();
        let mut node = composer.nodes()[0].clone();
        node.ports = Ports::new(1, 1);
        node.role = NodeRole::Default;
        node.pseudocode = Some("add 2 foo subtract".to_string());

        composer.set_nodes(vec![node]);
        assert_eq!(composer.nodes().len(), 1);
        assert_eq!(
            composer.nodes()[0].pseudocode.as_deref(),
            Some("add 2 subtract")
        );
    }

    #[test]
    fn test_load_template_remaps_ids() {
        let mut composer = Composer::new();
        composer.load_template("example-912").unwrap();

        assert_eq!(composer.nodes().len(), 5);
        assert_eq!(composer.edges().len(), 5);
        for edge in composer.edges() {
            assert!(composer.node(&edge.source).is_some(), "{}", edge.source);
            assert!(composer.node(&edge.target).is_some(), "{}", edge.target);
        }
        assert!(composer.node("adder").is_none());

        // Labels survive the remap, so inputs can still be addressed by label.
        let result = composer.simulate(&inputs(&[("Input x", 3), ("Input y", 2)]));
        let adder = result.steps.iter().find(|s| s.label == "Adder").unwrap();
        assert_eq!(adder.outputs, vec![5]);
    }

    #[test]
    fn test_load_template_twice_yields_fresh_ids() {
        let mut composer = Composer::new();
        composer.load_template("n-n-plus-one").unwrap();
        let first: Vec<_> = composer.nodes().iter().map(|n| n.id.clone()).collect();

        composer.load_template("n-n-plus-one").unwrap();
        assert!(composer.nodes().iter().all(|n| !first.contains(&n.id)));
    }

    #[test]
    fn test_load_unknown_template() {
        let mut composer = Composer::new();
        composer.set_templates(Vec::new());

        assert_eq!(
            composer.load_template("example-912"),
            Err(ComposerError::TemplateNotFound("example-912".to_string()))
        );
        assert_eq!(composer.nodes().len(), 2);
    }

    #[test]
    fn test_reset() {
        let mut composer = Composer::new();
        composer.load_template("example-912").unwrap();
        composer.set_templates(Vec::new());
        composer.reset();

        assert_eq!(composer.graph(), Composer::new().graph());
        assert_eq!(composer.templates(), TemplateManager::all().as_slice());
        assert!(composer.load_template("example-912").is_ok());
    }

    #[test]
    fn test_simulate_built_document() {
        let mut composer = Composer::new();
        let adder = composer.add_node(NodeData::new(BlockKind::Adder, "Adder", Ports::new(2, 1)));
        composer.connect(Edge::new("e1", "input-x", &adder)).unwrap();
        composer.connect(Edge::new("e2", "input-y", &adder)).unwrap();

        let result = composer.simulate(&inputs(&[("input-x", 4), ("input-y", 2)]));
        assert!(result.is_complete());
        assert_eq!(result.output(&adder), Some(6));
        assert_eq!(result, composer.graph().simulate(&inputs(&[("input-x", 4), ("input-y", 2)])));
    }
}
