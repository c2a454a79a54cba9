//! Semantics of the built-in blocks.
//!
//! Every block is a pure function from its compacted input list to an [`Evaluation`].
//! Branching blocks (comparer, conditional) additionally restrict which output ports may
//! propagate downstream. Custom blocks are delegated to the pseudocode interpreter.

use crate::interpreter;
use crate::types::{BlockKind, Node, Unary};
use std::collections::HashMap;

/// The result of evaluating a single block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    /// One value per output port.
    pub outputs: Vec<Unary>,
    /// Ports allowed to propagate; `None` means every port is active.
    pub active_outputs: Option<Vec<usize>>,
    /// Human-readable explanation shown in the trace.
    pub note: Option<String>,
}

impl Evaluation {
    pub fn new(outputs: Vec<Unary>, note: impl Into<String>) -> Self {
        Self {
            outputs,
            active_outputs: None,
            note: Some(note.into()),
        }
    }

    /// Builds a two-way branch: port 0 is active when `condition` holds, port 1 otherwise.
    pub fn branch(outputs: Vec<Unary>, condition: bool, note: impl Into<String>) -> Self {
        Self {
            outputs,
            active_outputs: Some(vec![if condition { 0 } else { 1 }]),
            note: Some(note.into()),
        }
    }

    /// Returns `true` if values on `port` may propagate along outgoing edges.
    pub fn is_active(&self, port: usize) -> bool {
        self.active_outputs
            .as_ref()
            .is_none_or(|active| active.contains(&port))
    }
}

/// Clamps an intermediate result to a unary value: negative results become 0 and
/// results beyond the representable range saturate.
pub fn clamp_to_unary(value: i128) -> Unary {
    value.clamp(0, Unary::MAX as i128) as Unary
}

/// Evaluates `node` against its filled input slots.
///
/// Source blocks (zero declared inputs or an input role) read their value from
/// `input_values`, first by node id, then by label, then from any value already
/// delivered, defaulting to 0.
pub fn evaluate(node: &Node, inputs: &[Unary], input_values: &HashMap<String, Unary>) -> Evaluation {
    if node.is_source() {
        return source(node, inputs, input_values);
    }

    match node.kind {
        BlockKind::Adder => adder(inputs),
        BlockKind::Eraser => eraser(),
        BlockKind::Copier => copier(inputs, node.ports.outputs),
        BlockKind::Comparer => comparer(inputs),
        BlockKind::Conditional => conditional(inputs),
        BlockKind::Multiplier => multiplier(inputs),
        BlockKind::Custom => interpreter::interpret(node, inputs, input_values),
        BlockKind::Unknown => pass_through(node, inputs),
    }
}

fn source(node: &Node, inputs: &[Unary], input_values: &HashMap<String, Unary>) -> Evaluation {
    let value = input_values
        .get(&node.id)
        .or_else(|| input_values.get(&node.label))
        .or_else(|| inputs.first())
        .copied()
        .unwrap_or(0);

    Evaluation::new(vec![value], format!("Input value {value}"))
}

fn adder(inputs: &[Unary]) -> Evaluation {
    let sum = inputs.iter().fold(0, |total: Unary, &value| total.saturating_add(value));
    Evaluation::new(vec![sum], format!("{} = {sum}", join(inputs, " + ")))
}

fn eraser() -> Evaluation {
    Evaluation::new(vec![0], "Cleared tape")
}

fn copier(inputs: &[Unary], outputs: usize) -> Evaluation {
    let value = inputs.first().copied().unwrap_or(0);
    Evaluation::new(vec![value; outputs.max(1)], format!("Copied value {value}"))
}

fn comparer(inputs: &[Unary]) -> Evaluation {
    let a = inputs.first().copied().unwrap_or(0);
    let b = inputs.get(1).copied().unwrap_or(0);
    let condition = a >= b;

    Evaluation::branch(
        vec![a, b],
        condition,
        format!("{a} ≥ {b} ⇒ {condition}"),
    )
}

fn conditional(inputs: &[Unary]) -> Evaluation {
    let flag = inputs.get(1).or_else(|| inputs.first()).copied().unwrap_or(0);
    let value = inputs.first().copied().unwrap_or(0);
    let condition = flag > 0;

    Evaluation::branch(vec![value, value], condition, format!("Condition {condition}"))
}

fn multiplier(inputs: &[Unary]) -> Evaluation {
    let product = inputs.iter().fold(1, |total: Unary, &value| total.saturating_mul(value));
    Evaluation::new(vec![product], format!("{} = {product}", join(inputs, " × ")))
}

fn pass_through(node: &Node, inputs: &[Unary]) -> Evaluation {
    let value = inputs.first().copied().unwrap_or(0);
    let note = match node.pseudocode.as_deref() {
        Some(code) if !code.is_empty() => code.split('\n').next().unwrap_or_default(),
        _ => "Pass-through",
    };
    Evaluation::new(vec![value], note)
}

/// Joins values with `separator`, e.g. `4 + 0 + 2`.
pub(crate) fn join(values: &[impl ToString], separator: &str) -> String {
    values
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(separator)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{NodeRole, Ports};

    fn block(kind: BlockKind, inputs: usize, outputs: usize) -> Node {
        Node {
            id: kind.to_string(),
            role: NodeRole::Default,
            label: kind.to_string(),
            description: String::new(),
            ports: Ports::new(inputs, outputs),
            kind,
            pseudocode: None,
        }
    }

    fn eval(node: &Node, inputs: &[Unary]) -> Evaluation {
        evaluate(node, inputs, &HashMap::new())
    }

    #[test]
    fn test_adder_sums_all_inputs() {
        let result = eval(&block(BlockKind::Adder, 3, 1), &[4, 0, 2]);
        assert_eq!(result.outputs, vec![6]);
        assert_eq!(result.note.as_deref(), Some("4 + 0 + 2 = 6"));
        assert_eq!(result.active_outputs, None);
    }

    #[test]
    fn test_adder_single_output_regardless_of_ports() {
        let result = eval(&block(BlockKind::Adder, 2, 3), &[1, 2]);
        assert_eq!(result.outputs, vec![3]);
    }

    #[test]
    fn test_eraser_ignores_inputs() {
        let result = eval(&block(BlockKind::Eraser, 1, 1), &[9]);
        assert_eq!(result.outputs, vec![0]);
        assert_eq!(result.note.as_deref(), Some("Cleared tape"));
    }

    #[test]
    fn test_copier_broadcasts_to_every_port() {
        let result = eval(&block(BlockKind::Copier, 1, 3), &[3]);
        assert_eq!(result.outputs, vec![3, 3, 3]);

        let result = eval(&block(BlockKind::Copier, 1, 0), &[3]);
        assert_eq!(result.outputs, vec![3]);
    }

    #[test]
    fn test_comparer_activates_one_branch() {
        let node = block(BlockKind::Comparer, 2, 2);

        let result = eval(&node, &[5, 3]);
        assert_eq!(result.outputs, vec![5, 3]);
        assert_eq!(result.active_outputs, Some(vec![0]));
        assert_eq!(result.note.as_deref(), Some("5 ≥ 3 ⇒ true"));

        let result = eval(&node, &[2, 7]);
        assert_eq!(result.outputs, vec![2, 7]);
        assert_eq!(result.active_outputs, Some(vec![1]));
        assert!(!result.is_active(0));
        assert!(result.is_active(1));
    }

    #[test]
    fn test_comparer_missing_second_input_defaults_to_zero() {
        let result = eval(&block(BlockKind::Comparer, 2, 2), &[0]);
        assert_eq!(result.outputs, vec![0, 0]);
        assert_eq!(result.active_outputs, Some(vec![0]));
    }

    #[test]
    fn test_conditional_uses_second_input_as_flag() {
        let node = block(BlockKind::Conditional, 2, 2);

        let result = eval(&node, &[5, 0]);
        assert_eq!(result.outputs, vec![5, 5]);
        assert_eq!(result.active_outputs, Some(vec![1]));
        assert_eq!(result.note.as_deref(), Some("Condition false"));

        let result = eval(&node, &[5, 2]);
        assert_eq!(result.active_outputs, Some(vec![0]));
    }

    #[test]
    fn test_conditional_falls_back_to_first_input() {
        let node = block(BlockKind::Conditional, 1, 2);
        assert_eq!(eval(&node, &[4]).active_outputs, Some(vec![0]));
        assert_eq!(eval(&node, &[0]).active_outputs, Some(vec![1]));
    }

    #[test]
    fn test_multiplier() {
        let node = block(BlockKind::Multiplier, 2, 1);
        let result = eval(&node, &[3, 4]);
        assert_eq!(result.outputs, vec![12]);
        assert_eq!(result.note.as_deref(), Some("3 × 4 = 12"));

        assert_eq!(eval(&node, &[]).outputs, vec![1]);
    }

    #[test]
    fn test_source_reads_supplied_value() {
        let node = Node {
            id: "input-x".to_string(),
            label: "Input x".to_string(),
            ..block(BlockKind::Custom, 0, 1)
        };

        let mut values = HashMap::new();
        assert_eq!(evaluate(&node, &[], &values).outputs, vec![0]);

        values.insert("Input x".to_string(), 4);
        assert_eq!(evaluate(&node, &[], &values).outputs, vec![4]);

        values.insert("input-x".to_string(), 7);
        let result = evaluate(&node, &[], &values);
        assert_eq!(result.outputs, vec![7]);
        assert_eq!(result.note.as_deref(), Some("Input value 7"));
    }

    #[test]
    fn test_input_role_overrides_kind() {
        let node = Node {
            role: NodeRole::Input,
            ..block(BlockKind::Adder, 1, 1)
        };
        let result = eval(&node, &[5]);
        assert_eq!(result.outputs, vec![5]);
        assert_eq!(result.note.as_deref(), Some("Input value 5"));
    }

    #[test]
    fn test_unknown_kind_passes_through() {
        let mut node = block(BlockKind::Unknown, 1, 1);
        let result = eval(&node, &[8]);
        assert_eq!(result.outputs, vec![8]);
        assert_eq!(result.note.as_deref(), Some("Pass-through"));

        node.pseudocode = Some("move right\nstop".to_string());
        assert_eq!(eval(&node, &[8]).note.as_deref(), Some("move right"));

        node.pseudocode = Some(String::new());
        assert_eq!(eval(&node, &[8]).note.as_deref(), Some("Pass-through"));
    }

    #[test]
    fn test_unknown_kind_note_keeps_raw_first_line() {
        let mut node = block(BlockKind::Unknown, 1, 1);
        node.pseudocode = Some("  move right \nstop".to_string());
        assert_eq!(eval(&node, &[1]).note.as_deref(), Some("  move right "));

        node.pseudocode = Some("\nstop".to_string());
        assert_eq!(eval(&node, &[1]).note.as_deref(), Some(""));
    }

    #[test]
    fn test_clamp_to_unary() {
        assert_eq!(clamp_to_unary(-3), 0);
        assert_eq!(clamp_to_unary(12), 12);
        assert_eq!(clamp_to_unary(i128::MAX), Unary::MAX);
    }
}
