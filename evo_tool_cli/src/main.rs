//! # EVO Tool Configurator
//!
//! Command-line front end for tool trees: validation, pin listing, table
//! import/export and offline classification of sample values.
//!
//! # Usage
//!
//! ```bash
//! # Check a tree and its pin bindings
//! evo_tool --tree cells/press.json validate
//!
//! # Export a device table, edit it, import it back
//! evo_tool export-table --node Station/Gripper --table device --out gripper.json
//! evo_tool import-table --node Station/Gripper --table device --input gripper.json
//!
//! # Classify every node for a set of pin values
//! evo_tool classify --sample gripper.valve=1 --sample gripper.force=3.2
//! ```

#![deny(warnings)]

use clap::{Parser, Subcommand};
use evo_tool::config::{ConfigError, LogLevel, ToolConfig};
use evo_tool::consts::DEFAULT_CONFIG_FILE;
use evo_tool::pins::PinRegistry;
use evo_tool::tables::TableKind;
use evo_tool::tabular::{parse_table_text, table_text};
use evo_tool::tree::{NodeType, Tree};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn, Level};
use tracing_subscriber::EnvFilter;

/// EVO Tool Configurator - tool tree and state table utility
#[derive(Parser, Debug)]
#[command(name = "evo_tool")]
#[command(author = "RTS007")]
#[command(version)]
#[command(about = "Tool tree configurator: validation, state tables and pin bindings")]
#[command(long_about = None)]
struct Args {
    /// Path to configurator.toml. A missing default file means built-in defaults.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Tool tree JSON file. Overrides `project.tool_file`.
    #[arg(short, long)]
    tree: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
enum Command {
    /// Load the tree and check its pin bindings.
    Validate,

    /// List bound HAL pins.
    Pins,

    /// Print one of a node's tables in tabular JSON form.
    ExportTable {
        /// Node path, `/`-separated names below the tool.
        #[arg(long)]
        node: String,
        /// digital | analog | calibration | device
        #[arg(long)]
        table: TableKind,
        /// Write to a file instead of stdout.
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Replace one of a node's tables and write the tree back.
    ImportTable {
        #[arg(long)]
        node: String,
        #[arg(long)]
        table: TableKind,
        /// Tabular JSON file.
        #[arg(long)]
        input: PathBuf,
    },

    /// Push pin values and print every I/O node and device state.
    Classify {
        /// `pin=value`, repeatable.
        #[arg(short, long = "sample", value_parser = parse_sample, action = clap::ArgAction::Append)]
        samples: Vec<(String, f64)>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    if let Err(e) = run() {
        error!("configurator failed: {}", e);
        eprintln!("error: {e}");
        std::process::exit(1);
    }
    Ok(())
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = load_config(args.config.as_deref())?;

    setup_tracing(&args, config.log_level);
    info!("EVO Tool Configurator v{} starting...", env!("CARGO_PKG_VERSION"));

    let tree_path = args
        .tree
        .clone()
        .unwrap_or_else(|| config.project.tool_file.clone());
    let output = execute(&args.command, &tree_path, config.project.pretty)?;
    if !output.is_empty() {
        println!("{output}");
    }
    Ok(())
}

/// Load `configurator.toml`, falling back to defaults when the implicit
/// file is absent. An explicitly named file must exist.
fn load_config(path: Option<&Path>) -> Result<ToolConfig, ConfigError> {
    let explicit = path.is_some();
    let path = path.unwrap_or(Path::new(DEFAULT_CONFIG_FILE));
    match ToolConfig::load(path) {
        Err(ConfigError::FileNotFound(_)) if !explicit => Ok(ToolConfig::default()),
        result => result,
    }
}

fn parse_sample(text: &str) -> Result<(String, f64), String> {
    let (pin, value) = text
        .split_once('=')
        .ok_or_else(|| format!("expected pin=value, got '{text}'"))?;
    let pin = pin.trim();
    if pin.is_empty() {
        return Err(format!("empty pin name in '{text}'"));
    }
    let value = value
        .trim()
        .parse::<f64>()
        .map_err(|e| format!("bad value in '{text}': {e}"))?;
    Ok((pin.to_string(), value))
}

fn load_tree(path: &Path) -> Result<Tree, Box<dyn std::error::Error>> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("cannot read {}: {e}", path.display()))?;
    let tree = Tree::from_json_str(&text)?;
    debug!(path = %path.display(), nodes = tree.len(), "tree loaded");
    Ok(tree)
}

/// Run one command against the tree at `tree_path`, returning the text to
/// print.
fn execute(command: &Command, tree_path: &Path, pretty: bool) -> Result<String, Box<dyn std::error::Error>> {
    let mut tree = load_tree(tree_path)?;
    let mut out = String::new();

    match command {
        Command::Validate => {
            let registry = PinRegistry::from_tree(&tree)?;
            let devices = tree
                .iter()
                .filter(|(_, n)| n.node_type() == NodeType::Device)
                .count();
            info!(
                nodes = tree.len(),
                devices,
                pins = registry.pin_count(),
                "tree valid"
            );
            write!(
                out,
                "{}: {} nodes, {} devices, {} DI, {} DO, {} AI, {} AO, {} pins",
                tree_path.display(),
                tree.len(),
                devices,
                registry.di_count,
                registry.do_count,
                registry.ai_count,
                registry.ao_count,
                registry.pin_count(),
            )?;
        }
        Command::Pins => {
            let registry = PinRegistry::from_tree(&tree)?;
            for b in registry.pins() {
                writeln!(out, "{}\t{}\t{}\t{}", b.pin, b.direction, b.signal, b.path)?;
            }
            out.truncate(out.trim_end().len());
        }
        Command::ExportTable { node, table, out: file } => {
            let id = tree.find_by_path(node)?;
            let text = table_text(&tree.export_table(id, *table)?);
            match file {
                Some(file) => {
                    std::fs::write(file, &text)?;
                    info!(node = %node, table = %table, file = %file.display(), "table exported");
                }
                None => out = text,
            }
        }
        Command::ImportTable { node, table, input } => {
            let id = tree.find_by_path(node)?;
            let text = std::fs::read_to_string(input)
                .map_err(|e| format!("cannot read {}: {e}", input.display()))?;
            let array = parse_table_text(&text)?;
            tree.import_table(id, *table, &array)?;
            std::fs::write(tree_path, tree.to_json_string(pretty)?)?;
            info!(node = %node, table = %table, tree = %tree_path.display(), "table imported");
        }
        Command::Classify { samples } => {
            let registry = PinRegistry::from_tree(&tree)?;
            for (pin, value) in samples {
                tree.push_pin_sample(&registry, pin, *value)?;
            }
            let nodes: Vec<_> = tree
                .iter()
                .filter(|(_, n)| n.node_type().is_io() || n.node_type() == NodeType::Device)
                .map(|(id, _)| id)
                .collect();
            for id in nodes {
                let path = tree.path_of(id)?;
                match tree.read_classified(id) {
                    Ok(c) => writeln!(out, "{path}\t{}\t{}", c.state, c.display_value)?,
                    Err(e) => {
                        warn!(node = %path, error = %e, "unclassified");
                        writeln!(out, "{path}\t?\t{e}")?;
                    }
                }
            }
            out.truncate(out.trim_end().len());
        }
    }
    Ok(out)
}

/// Setup tracing subscriber based on CLI arguments.
fn setup_tracing(args: &Args, configured: LogLevel) {
    let level = if args.verbose {
        Level::DEBUG
    } else {
        Level::from(configured)
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}
