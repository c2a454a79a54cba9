//! This module implements the dataflow scheduler that evaluates a composition graph.
//!
//! Evaluation is data-driven rather than a precomputed topological order: source blocks
//! seed a FIFO ready-queue, every evaluated block pushes its values along its outgoing
//! edges, and a block becomes ready once all of its input slots are filled. Each block is
//! enqueued at most once, so every run terminates in O(nodes + edges), cyclic graphs
//! included. Blocks that never fill up are reported as diagnostics instead of failing
//! the run.

use crate::blocks::{self, Evaluation};
use crate::types::{Edge, Node, OutputValue, SimulationResult, SimulationStep, Unary};
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

lazy_static! {
    static ref HANDLE_INDEX: Regex = Regex::new(r"-(\d+)$").unwrap();
}

/// Extracts the port index encoded as a trailing `-<digits>` in a handle id.
///
/// `out-1` yields `Some(1)`; `a`, `out` or a missing handle yield `None`.
pub fn parse_handle_index(handle: Option<&str>) -> Option<usize> {
    let captures = HANDLE_INDEX.captures(handle?)?;
    captures[1].parse().ok()
}

/// Evaluates the graph once and returns the execution trace, the terminal outputs and
/// one diagnostic per block that never became ready.
///
/// `input_values` supplies the values of source blocks, keyed by node id or label.
/// The call holds no state: running it twice on the same snapshot yields the same result.
pub fn simulate(
    nodes: &[Node],
    edges: &[Edge],
    input_values: &HashMap<String, Unary>,
) -> SimulationResult {
    let mut run = Run::new(nodes, edges, input_values);
    run.execute();
    run.finish()
}

/// The input slots of one block.
///
/// `declared` holds one slot per declared input. Values addressed to an explicit index
/// past the declared inputs are kept in `overflow` instead of growing the slot array, so
/// a malformed handle such as `in-1000000000000` never allocates. Overflow values count
/// as delivered inputs but never block readiness.
#[derive(Debug, Clone, Default)]
struct Slots {
    declared: Vec<Option<Unary>>,
    overflow: BTreeMap<usize, Unary>,
}

impl Slots {
    fn new(inputs: usize) -> Self {
        Self {
            declared: vec![None; inputs],
            overflow: BTreeMap::new(),
        }
    }

    fn is_ready(&self) -> bool {
        self.declared.iter().all(Option::is_some)
    }

    /// The filled values in slot order, empty slots dropped.
    fn compacted(&self) -> Vec<Unary> {
        self.declared
            .iter()
            .flatten()
            .chain(self.overflow.values())
            .copied()
            .collect()
    }

    fn set(&mut self, index: usize, value: Unary) {
        match self.declared.get_mut(index) {
            Some(slot) => *slot = Some(value),
            None => {
                self.overflow.insert(index, value);
            }
        }
    }

    /// Writes into the first empty slot. Gaps left below an overflow index count as
    /// empty; a block without slots accepts a single value.
    fn fill_next(&mut self, value: Unary) {
        if let Some(slot) = self.declared.iter_mut().find(|slot| slot.is_none()) {
            *slot = Some(value);
            return;
        }

        if let Some(&last) = self.overflow.keys().next_back() {
            let gap = (self.declared.len()..last).find(|i| !self.overflow.contains_key(i));
            if let Some(index) = gap {
                self.overflow.insert(index, value);
            }
        } else if self.declared.is_empty() {
            self.declared.push(Some(value));
        }
    }
}

/// The ephemeral state of one evaluation run.
struct Run<'a> {
    nodes: &'a [Node],
    input_values: &'a HashMap<String, Unary>,
    node_map: HashMap<&'a str, &'a Node>,
    outgoing: HashMap<&'a str, Vec<&'a Edge>>,
    pending: HashMap<&'a str, Slots>,
    outputs: HashMap<&'a str, Vec<Unary>>,
    processed: HashSet<&'a str>,
    enqueued: HashSet<&'a str>,
    queue: VecDeque<&'a str>,
    steps: Vec<SimulationStep>,
}

impl<'a> Run<'a> {
    fn new(nodes: &'a [Node], edges: &'a [Edge], input_values: &'a HashMap<String, Unary>) -> Self {
        let node_map = nodes
            .iter()
            .map(|node| (node.id.as_str(), node))
            .collect::<HashMap<_, _>>();

        let mut outgoing: HashMap<&str, Vec<&Edge>> = HashMap::new();
        for edge in edges {
            outgoing.entry(edge.source.as_str()).or_default().push(edge);
        }

        let pending = nodes
            .iter()
            .map(|node| (node.id.as_str(), Slots::new(node.ports.inputs)))
            .collect();

        let mut run = Self {
            nodes,
            input_values,
            node_map,
            outgoing,
            pending,
            outputs: HashMap::new(),
            processed: HashSet::new(),
            enqueued: HashSet::new(),
            queue: VecDeque::new(),
            steps: Vec::new(),
        };

        // Sources are ready immediately, in declaration order.
        for node in nodes.iter().filter(|node| node.is_source()) {
            if run.enqueued.insert(node.id.as_str()) {
                run.queue.push_back(node.id.as_str());
            }
        }

        run
    }

    /// Drains the ready-queue in FIFO order.
    fn execute(&mut self) {
        while let Some(node_id) = self.queue.pop_front() {
            self.enqueued.remove(node_id);
            if self.processed.contains(node_id) {
                continue;
            }
            let Some(&node) = self.node_map.get(node_id) else {
                continue;
            };

            let inputs: Vec<Unary> = self
                .pending
                .get(node_id)
                .map(Slots::compacted)
                .unwrap_or_default();

            let evaluation = blocks::evaluate(node, &inputs, self.input_values);
            log::debug!(
                "evaluated {} '{}' ({}): {:?} -> {:?}",
                node.kind,
                node.label,
                node_id,
                inputs,
                evaluation.outputs
            );

            self.processed.insert(node_id);
            self.outputs.insert(node_id, evaluation.outputs.clone());
            self.steps.push(SimulationStep {
                node_id: node.id.clone(),
                label: node.label.clone(),
                kind: node.kind,
                inputs,
                outputs: evaluation.outputs.clone(),
                active_outputs: evaluation.active_outputs.clone(),
                note: evaluation.note.clone(),
            });

            self.propagate(node_id, &evaluation);
        }
    }

    /// Delivers the outputs of a just-evaluated block along its outgoing edges.
    fn propagate(&mut self, node_id: &'a str, evaluation: &Evaluation) {
        let Some(edges) = self.outgoing.get(node_id).cloned() else {
            return;
        };

        for edge in edges {
            let Some(&target) = self.node_map.get(edge.target.as_str()) else {
                continue;
            };

            let port = source_port(edge, evaluation.outputs.len());
            if !evaluation.is_active(port) {
                log::trace!("edge {} skipped: port {} is inactive", edge.id, port);
                continue;
            }

            let Some(&value) = evaluation
                .outputs
                .get(port)
                .or_else(|| evaluation.outputs.first())
            else {
                continue;
            };

            let slots = self
                .pending
                .entry(target.id.as_str())
                .or_insert_with(|| Slots::new(target.ports.inputs));

            match parse_handle_index(edge.target_handle.as_deref()) {
                Some(index) => slots.set(index, value),
                None => slots.fill_next(value),
            }
            log::trace!("edge {} delivered {} to {}", edge.id, value, target.id);

            self.enqueue_if_ready(target.id.as_str());
        }
    }

    /// Enqueues a block once all of its slots are filled, unless it already ran or waits
    /// in the queue.
    fn enqueue_if_ready(&mut self, node_id: &'a str) {
        if self.processed.contains(node_id) || self.enqueued.contains(node_id) {
            return;
        }

        let ready = self
            .pending
            .get(node_id)
            .is_none_or(Slots::is_ready);

        if ready {
            self.enqueued.insert(node_id);
            self.queue.push_back(node_id);
        }
    }

    fn finish(self) -> SimulationResult {
        let errors = self
            .nodes
            .iter()
            .filter(|node| !self.processed.contains(node.id.as_str()))
            .map(|node| {
                log::warn!("node '{}' never received all of its inputs", node.id);
                format!(
                    "Node \"{}\" is waiting for inputs. Check connections.",
                    node.label
                )
            })
            .collect();

        let output_values = self
            .nodes
            .iter()
            .filter(|node| {
                self.outgoing
                    .get(node.id.as_str())
                    .is_none_or(|edges| edges.is_empty())
            })
            .map(|node| OutputValue {
                node_id: node.id.clone(),
                label: node.label.clone(),
                value: self
                    .outputs
                    .get(node.id.as_str())
                    .and_then(|outputs| outputs.first())
                    .copied()
                    .unwrap_or(0),
            })
            .collect();

        SimulationResult {
            steps: self.steps,
            output_values,
            errors,
        }
    }
}

/// Resolves which output port an edge reads from.
///
/// An explicit handle index wins. Otherwise, for multi-output blocks, the edge label acts
/// as a branch hint: `<` selects port 1, `≥` or `>=` selects port 0. Everything else
/// reads port 0.
fn source_port(edge: &Edge, output_count: usize) -> usize {
    if let Some(index) = parse_handle_index(edge.source_handle.as_deref()) {
        return index;
    }

    if output_count > 1 {
        if let Some(label) = edge.label.as_deref().map(str::to_lowercase) {
            if label.contains('<') {
                return 1;
            }
            if label.contains('≥') || label.contains(">=") {
                return 0;
            }
        }
    }

    0
}
