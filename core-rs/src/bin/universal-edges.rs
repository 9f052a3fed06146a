//! universal-edges - offline tooling for edge directories and configs
//!
//! Inspects the controller's directory file and runs the train pathfinder
//! against it without a live cluster.

use anyhow::{bail, Context};
use chrono::{TimeZone, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use universal_edges::controller::pathfinder;
use universal_edges::{Edge, EdgeDirectory, EdgeError, EdgesConfig};

#[derive(Parser)]
#[command(name = "universal-edges")]
#[command(version)]
#[command(about = "Universal Edges directory and routing tools", long_about = None)]
struct Cli {
    /// Enable debug logging (RUST_LOG overrides)
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect an edge directory file (list, show)
    Directory {
        #[command(subcommand)]
        command: DirectoryCommands,
    },
    /// Compute train penalty maps for a directory file
    Pathfind {
        /// Directory file (edgeDatastore.json)
        file: PathBuf,
        /// Output format
        #[arg(long, value_enum, default_value = "table")]
        format: OutputFormat,
    },
    /// Validate configuration files
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum DirectoryCommands {
    /// List all edges
    List {
        /// Directory file (edgeDatastore.json)
        file: PathBuf,
    },
    /// Print one edge as JSON
    Show {
        /// Directory file (edgeDatastore.json)
        file: PathBuf,
        /// Edge id
        id: String,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Parse and validate a YAML config
    Check {
        /// Config file
        file: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_directory(file: &Path) -> anyhow::Result<EdgeDirectory> {
    if !file.exists() {
        bail!("directory file not found: {}", file.display());
    }
    EdgeDirectory::load(file).with_context(|| format!("failed to load {}", file.display()))
}

fn format_timestamp(ms: i64) -> String {
    match Utc.timestamp_millis_opt(ms).single() {
        Some(ts) => ts.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => ms.to_string(),
    }
}

fn print_edge_table(edges: &[&Edge]) {
    println!(
        "\n{:<16} {:<12} {:<12} {:<8} {:<8} {:<20} {:<6}",
        "ID", "SOURCE", "TARGET", "ACTIVE", "DELETED", "UPDATED", "LINKS"
    );
    println!("{}", "-".repeat(88));

    for edge in edges {
        let active = if edge.active { "yes".green() } else { "no".yellow() };
        let deleted = if edge.is_deleted { "yes".red() } else { "no".normal() };
        println!(
            "{:<16} {:<12} {:<12} {:<8} {:<8} {:<20} {:<6}",
            edge.id,
            edge.source.instance_id,
            edge.target.instance_id,
            active,
            deleted,
            format_timestamp(edge.updated_at_ms),
            edge.link_destinations.len()
        );
    }

    println!();
}

fn handle_pathfind(file: &Path, format: OutputFormat) -> anyhow::Result<()> {
    let directory = load_directory(file)?;
    let outcome = pathfinder::run(directory.values());

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        OutputFormat::Table => {
            println!(
                "\n{:<24} {:<12} {:<24} {:<10}",
                "NODE", "INSTANCE", "TARGET", "PENALTY"
            );
            println!("{}", "-".repeat(72));

            for assignment in &outcome.assignments {
                let node = format!("{} {}", assignment.update.edge_id, assignment.update.offset);
                if assignment.update.penalty_map.is_empty() {
                    println!("{:<24} {:<12} {:<24} {:<10}", node, assignment.instance_id, "-".dimmed(), "-");
                }
                for (target, penalty) in &assignment.update.penalty_map {
                    println!("{:<24} {:<12} {:<24} {:<10}", node, assignment.instance_id, target, penalty);
                }
            }

            let summary = format!(
                "{} nodes, {} iterations",
                outcome.assignments.len(),
                outcome.iterations
            );
            if outcome.converged {
                println!("\n✓ Converged: {}", summary.green());
            } else {
                println!("\n⚠ Iteration cap reached: {}", summary.yellow());
            }
            println!();
        }
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Directory { command } => match command {
            DirectoryCommands::List { file } => {
                let directory = load_directory(&file)?;
                if directory.is_empty() {
                    println!("No edges in {}", file.display());
                    return Ok(());
                }
                let edges: Vec<&Edge> = directory.values().collect();
                print_edge_table(&edges);
                println!("Total: {} edges", edges.len());
            }
            DirectoryCommands::Show { file, id } => {
                let directory = load_directory(&file)?;
                let edge = directory.get(&id).ok_or(EdgeError::EdgeNotFound(id))?;
                println!("{}", serde_json::to_string_pretty(edge)?);
            }
        },

        Commands::Pathfind { file, format } => handle_pathfind(&file, format)?,

        Commands::Config { command } => match command {
            ConfigCommands::Check { file } => {
                let config = EdgesConfig::load(&file)
                    .with_context(|| format!("invalid config {}", file.display()))?;
                println!("{} {}", "✓".green(), file.display());
                println!("  Directory: {}", config.spec.controller.directory_path().display());
                println!("  Instance: {}", config.spec.instance.instance_id);
                println!(
                    "  Rates: {}/s outgoing, {}/s commands",
                    config.spec.instance.outgoing_rate_per_second,
                    config.spec.instance.command_rate_per_second
                );
            }
        },
    }

    Ok(())
}
