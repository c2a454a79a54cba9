//! Interpreter for custom block pseudocode.
//!
//! Pseudocode is not parsed into a syntax tree. The lower-cased text is matched against
//! an ordered rule table and the first rule that applies produces the block's outputs.
//! Text can match several rules at once (`multiply 2 then copy` matches both `multiply`
//! and `copy`), so the order of the rule table is part of the semantics.

use crate::blocks::{clamp_to_unary, join, Evaluation};
use crate::types::{Node, Unary};
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashMap;

lazy_static! {
    static ref NUMBER: Regex = Regex::new(r"-?\d+").unwrap();
    static ref ERASE: Regex = Regex::new(r"erase|clear|reset|blank").unwrap();
    static ref INCREMENT: Regex = Regex::new(r"increment|successor|add\s+1\b").unwrap();
    static ref DECREMENT: Regex = Regex::new(r"decrement|subtract\s+1\b|predecessor").unwrap();
    static ref ADD: Regex = Regex::new(r"add|plus").unwrap();
    static ref SUBTRACT: Regex = Regex::new(r"subtract|minus|remove").unwrap();
    static ref DOUBLE: Regex = Regex::new(r"double|duplicate\s+and\s+merge").unwrap();
    static ref MULTIPLY: Regex = Regex::new(r"multiply|times").unwrap();
    static ref SECOND_OPERAND: Regex =
        Regex::new(r"second|other|another|next|input\s*(two|2)|y\b").unwrap();
    static ref HALVE: Regex = Regex::new(r"halve|divide\s+by\s+2").unwrap();
    static ref COPY: Regex = Regex::new(r"copy|duplicate|fan[- ]?out").unwrap();
    static ref TWO_COPIES: Regex = Regex::new(r"two|both").unwrap();
    static ref IS_ZERO: Regex = Regex::new(r"is\s+zero|==\s*0|equals\s+0|blank").unwrap();
    static ref NONZERO: Regex = Regex::new(r"nonzero|>\s*0|positive").unwrap();
    static ref AT_MOST: Regex = Regex::new(r"<=|≤").unwrap();
    static ref AT_LEAST: Regex = Regex::new(r">=|≥").unwrap();
    static ref LESS: Regex = Regex::new(r"<").unwrap();
    static ref GREATER: Regex = Regex::new(r">").unwrap();
    static ref EQUAL: Regex = Regex::new(r"==|equals").unwrap();
    static ref NOT_EQUAL: Regex = Regex::new(r"!=|not\s+equal").unwrap();
}

/// Everything a rule may look at while interpreting one block.
struct Context<'a> {
    text: String,
    node: &'a Node,
    inputs: &'a [Unary],
    input_values: &'a HashMap<String, Unary>,
    primary: i128,
    secondary: i128,
    literal: Option<i128>,
    outputs: usize,
}

impl Context<'_> {
    fn matches(&self, pattern: &Regex) -> bool {
        pattern.is_match(&self.text)
    }

    /// Fills `count` output ports (at least one) with the clamped `value`.
    fn fill(&self, value: i128, count: usize) -> Vec<Unary> {
        vec![clamp_to_unary(value); count.max(1)]
    }

    fn unary(&self, value: i128) -> Evaluation {
        self.unary_with(value, None)
    }

    fn unary_with(&self, value: i128, note: Option<String>) -> Evaluation {
        Evaluation {
            outputs: self.fill(value, self.outputs),
            active_outputs: None,
            note,
        }
    }
}

type Rule = fn(&Context) -> Option<Evaluation>;

/// The rule table, in precedence order.
const RULES: [(&str, Rule); 11] = [
    ("erase", erase),
    ("increment", increment),
    ("decrement", decrement),
    ("add", add),
    ("subtract", subtract),
    ("double", double),
    ("multiply", multiply),
    ("halve", halve),
    ("copy", copy),
    ("condition", condition),
    ("pass-through", pass_through),
];

/// Evaluates a custom block by matching its pseudocode against the rule table.
pub fn interpret(node: &Node, inputs: &[Unary], input_values: &HashMap<String, Unary>) -> Evaluation {
    let text = node.pseudocode.as_deref().unwrap_or_default().to_lowercase();
    let literal = NUMBER
        .find(&text)
        .and_then(|found| found.as_str().parse::<i128>().ok());

    let context = Context {
        literal,
        node,
        inputs,
        input_values,
        primary: inputs.first().copied().unwrap_or(0).into(),
        secondary: inputs.get(1).copied().unwrap_or(0).into(),
        outputs: node.ports.outputs.max(1),
        text,
    };

    for (name, rule) in RULES {
        if let Some(evaluation) = rule(&context) {
            log::trace!("custom block '{}' matched rule '{}'", node.id, name);
            return evaluation;
        }
    }

    // Unreachable: the pass-through rule always applies.
    context.unary(0)
}

/// Returns the name of the rule the node's pseudocode triggers, for tooling and debugging.
pub fn matching_rule(node: &Node) -> &'static str {
    let empty = HashMap::new();
    let text = node.pseudocode.as_deref().unwrap_or_default().to_lowercase();
    let context = Context {
        literal: NUMBER.find(&text).and_then(|found| found.as_str().parse().ok()),
        node,
        inputs: &[],
        input_values: &empty,
        primary: 0,
        secondary: 0,
        outputs: node.ports.outputs.max(1),
        text,
    };

    RULES
        .iter()
        .find(|(_, rule)| rule(&context).is_some())
        .map_or("pass-through", |(name, _)| *name)
}

fn erase(ctx: &Context) -> Option<Evaluation> {
    ctx.matches(&ERASE)
        .then(|| ctx.unary_with(0, Some("Cleared tape".to_string())))
}

fn increment(ctx: &Context) -> Option<Evaluation> {
    ctx.matches(&INCREMENT).then(|| {
        let next = clamp_to_unary(ctx.primary + 1);
        ctx.unary_with(next.into(), Some(format!("{} + 1 = {next}", ctx.primary)))
    })
}

fn decrement(ctx: &Context) -> Option<Evaluation> {
    ctx.matches(&DECREMENT).then(|| {
        let next = clamp_to_unary(ctx.primary.saturating_sub(1));
        ctx.unary_with(next.into(), Some(format!("{} - 1 = {next}", ctx.primary)))
    })
}

fn add(ctx: &Context) -> Option<Evaluation> {
    let amount = ctx.literal.filter(|_| ctx.matches(&ADD))?;
    let next = clamp_to_unary(ctx.primary.saturating_add(amount));
    Some(ctx.unary_with(
        next.into(),
        Some(format!("{} + {amount} = {next}", ctx.primary)),
    ))
}

fn subtract(ctx: &Context) -> Option<Evaluation> {
    let amount = ctx.literal.filter(|_| ctx.matches(&SUBTRACT))?;
    let next = clamp_to_unary(ctx.primary.saturating_sub(amount));
    Some(ctx.unary_with(
        next.into(),
        Some(format!("{} - {amount} = {next}", ctx.primary)),
    ))
}

fn double(ctx: &Context) -> Option<Evaluation> {
    ctx.matches(&DOUBLE).then(|| {
        let next = clamp_to_unary(ctx.primary * 2);
        ctx.unary_with(next.into(), Some(format!("{} × 2 = {next}", ctx.primary)))
    })
}

fn multiply(ctx: &Context) -> Option<Evaluation> {
    if !ctx.matches(&MULTIPLY) {
        return None;
    }

    if let Some(factor) = ctx.literal {
        let next = clamp_to_unary(ctx.primary.saturating_mul(factor));
        return Some(ctx.unary_with(
            next.into(),
            Some(format!("{} × {factor} = {next}", ctx.primary)),
        ));
    }

    let factors: Vec<i128> = if ctx.matches(&SECOND_OPERAND) {
        let secondary = if ctx.inputs.len() > 1 { ctx.secondary } else { 1 };
        vec![ctx.primary, secondary]
    } else if ctx.inputs.len() > 1 {
        ctx.inputs.iter().map(|&value| value.into()).collect()
    } else {
        vec![ctx.primary]
    };

    let product = clamp_to_unary(
        factors
            .iter()
            .fold(1i128, |total, &factor| total.saturating_mul(factor)),
    );
    Some(ctx.unary_with(
        product.into(),
        Some(format!("{} = {product}", join(&factors, " × "))),
    ))
}

fn halve(ctx: &Context) -> Option<Evaluation> {
    ctx.matches(&HALVE).then(|| {
        let next = clamp_to_unary(ctx.primary.div_euclid(2));
        ctx.unary_with(next.into(), Some(format!("{} ÷ 2 = {next}", ctx.primary)))
    })
}

fn copy(ctx: &Context) -> Option<Evaluation> {
    ctx.matches(&COPY).then(|| {
        let copies = if ctx.matches(&TWO_COPIES) {
            ctx.outputs.max(2)
        } else {
            ctx.outputs
        };
        Evaluation {
            outputs: ctx.fill(ctx.primary, copies),
            active_outputs: None,
            note: Some(format!("Copied value {}", ctx.primary)),
        }
    })
}

fn condition(ctx: &Context) -> Option<Evaluation> {
    let holds = evaluate_condition(ctx)?;
    Some(Evaluation::branch(
        ctx.fill(ctx.primary, ctx.outputs.max(2)),
        holds,
        format!("Condition {holds}"),
    ))
}

/// Evaluates an `if` form against the primary input. The comparand is the literal in the
/// text if there is one, otherwise the secondary input.
fn evaluate_condition(ctx: &Context) -> Option<bool> {
    if !ctx.text.contains("if") {
        return None;
    }

    let value = ctx.primary;
    let comparand = ctx.literal.unwrap_or(ctx.secondary);

    let holds = if ctx.matches(&IS_ZERO) {
        value == 0
    } else if ctx.matches(&NONZERO) {
        value > 0
    } else if ctx.matches(&AT_MOST) {
        value <= comparand
    } else if ctx.matches(&AT_LEAST) {
        value >= comparand
    } else if ctx.matches(&LESS) {
        value < comparand
    } else if ctx.matches(&GREATER) {
        value > comparand
    } else if ctx.matches(&EQUAL) {
        value == comparand
    } else if ctx.matches(&NOT_EQUAL) {
        value != comparand
    } else {
        return None;
    };

    Some(holds)
}

fn pass_through(ctx: &Context) -> Option<Evaluation> {
    let value = ctx
        .inputs
        .first()
        .or_else(|| ctx.input_values.get(&ctx.node.id))
        .copied()
        .unwrap_or(0);
    let note = ctx.node.first_pseudocode_line().unwrap_or("Custom block");

    Some(ctx.unary_with(value.into(), Some(note.to_string())))
}
