//! This crate provides the evaluation engine for Turing-machine composition graphs.
//! Blocks such as adders, comparers and copiers are wired into a graph that passes
//! unary values along its edges. It includes modules for the built-in block semantics,
//! interpreting custom block pseudocode, sanitizing that pseudocode, scheduling the
//! dataflow evaluation, and managing editable documents and predefined templates.

pub mod analyzer;
pub mod blocks;
pub mod composer;
pub mod interpreter;
pub mod loader;
pub mod parser;
pub mod simulator;
pub mod templates;
pub mod types;

/// Re-exports the `Rule` enum from the parser module, used by the `pest` grammar.
pub use crate::parser::Rule;
/// Re-exports the `analyze` and `validate` functions and the `AnalysisWarning` enum.
pub use analyzer::{analyze, validate, AnalysisWarning};
/// Re-exports the block evaluation entry point and its result type.
pub use blocks::{evaluate, Evaluation};
/// Re-exports the editable document, its node edit types and the block palette.
pub use composer::{Composer, NodeData, NodeUpdate, BLOCK_LIBRARY};
/// Re-exports the `GraphLoader` struct from the loader module.
pub use loader::GraphLoader;
/// Re-exports the pseudocode sanitizer functions.
pub use parser::{insert_token, sanitize};
/// Re-exports the `simulate` function from the simulator module.
pub use simulator::simulate;
/// Re-exports `TemplateInfo`, `TemplateManager`, and `TEMPLATES` from the templates module.
pub use templates::{TemplateInfo, TemplateManager, TEMPLATES};
/// Re-exports the graph, result and error types from the types module.
pub use types::{
    BlockKind, ComposerError, Edge, EdgeId, Graph, Node, NodeId, NodeRole, OutputValue, Ports,
    SimulationResult, SimulationStep, Template, Unary,
};
