use clap::Parser;
use log::LevelFilter;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tmc::{
    analyze, ComposerError, Graph, GraphLoader, SimulationResult, TemplateManager, Unary,
};

#[derive(Parser)]
#[clap(author, version, about, long_about = None, arg_required_else_help = true)]
struct Cli {
    /// The composition graph file (JSON) to evaluate, or a directory of them
    #[clap(short, long, conflicts_with = "template")]
    graph: Option<PathBuf>,

    /// The id of a built-in template to evaluate
    #[clap(short, long)]
    template: Option<String>,

    /// An input value as key=value, where key is a node id or label
    #[clap(short, long, value_parser = parse_input)]
    input: Vec<(String, Unary)>,

    /// List the built-in templates and exit
    #[clap(short, long)]
    list: bool,

    /// Print analyzer warnings before evaluating
    #[clap(short, long)]
    check: bool,

    /// Print the simulation result as JSON
    #[clap(short, long)]
    json: bool,

    /// Log each evaluation step
    #[clap(short = 'd', long)]
    debug: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.debug);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Initialize logging; `RUST_LOG` still overrides the default level.
fn init_logging(debug: bool) {
    let level = if debug {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    };

    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_timestamp(None)
        .format_module_path(false)
        .init();
}

fn run(cli: &Cli) -> Result<(), ComposerError> {
    TemplateManager::load()?;

    if cli.list {
        for index in 0..TemplateManager::get_template_count() {
            let info = TemplateManager::get_template_info(index)?;
            println!(
                "{:<16} {} ({} nodes, {} edges)\n{:<16} {}",
                info.id, info.name, info.node_count, info.edge_count, "", info.description
            );
        }
        return Ok(());
    }

    let inputs: HashMap<String, Unary> = cli.input.iter().cloned().collect();

    match (&cli.graph, &cli.template) {
        (Some(path), _) if path.is_dir() => run_directory(cli, path, &inputs),
        (Some(path), _) => evaluate(cli, &GraphLoader::load_graph(path)?, &inputs),
        (None, Some(id)) => {
            let graph = TemplateManager::get_template_by_id(id)?.graph();
            evaluate(cli, &graph, &inputs)
        }
        (None, None) => Err(ComposerError::ValidationError(
            "either --graph or --template is required".to_string(),
        )),
    }
}

/// Evaluates every graph in `directory`. Files that fail to load are reported and
/// skipped; the run still fails once all files have been tried.
fn run_directory(
    cli: &Cli,
    directory: &Path,
    inputs: &HashMap<String, Unary>,
) -> Result<(), ComposerError> {
    let mut failed = 0;

    for loaded in GraphLoader::load_graphs(directory) {
        match loaded {
            Ok((path, graph)) => {
                println!("== {} ==", path.display());
                evaluate(cli, &graph, inputs)?;
                println!();
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                failed += 1;
            }
        }
    }

    if failed > 0 {
        return Err(ComposerError::FileError(format!(
            "{} graph file(s) in {} could not be loaded",
            failed,
            directory.display()
        )));
    }

    Ok(())
}

fn evaluate(
    cli: &Cli,
    graph: &Graph,
    inputs: &HashMap<String, Unary>,
) -> Result<(), ComposerError> {
    if cli.check {
        let warnings = analyze(graph);
        if warnings.is_empty() {
            println!("No problems found.");
        }
        for warning in &warnings {
            println!("warning: {}", warning);
        }
    }

    let result = graph.simulate(inputs);

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_result(&result);
    }

    Ok(())
}

fn print_result(result: &SimulationResult) {
    println!("Steps:");
    for (i, step) in result.steps.iter().enumerate() {
        println!(
            "{:>3}. {} [{}] {:?} -> {:?}{}",
            i + 1,
            step.label,
            step.kind,
            step.inputs,
            step.outputs,
            step.note
                .as_ref()
                .map(|note| format!("  ({})", note))
                .unwrap_or_default()
        );
    }

    println!("\nOutputs:");
    for output in &result.output_values {
        println!("  {} = {}", output.label, output.value);
    }

    for error in &result.errors {
        eprintln!("{}", error);
    }
}

fn parse_input(value: &str) -> Result<(String, Unary), String> {
    let (key, number) = value
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{}'", value))?;

    let number = number
        .trim()
        .parse::<Unary>()
        .map_err(|e| format!("invalid value for '{}': {}", key, e))?;

    Ok((key.trim().to_string(), number))
}
