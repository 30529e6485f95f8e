//! Attest CLI
//!
//! Command-line interface for running, parsing and checking attest
//! scripts.

use attest::report::{NodeId, ReportRetriever, ReportTree, ReportType};
use attest::runner::{default_keywords, load_properties, Runner};
use attest::statement::Script;
use clap::{Parser, Subcommand};
use colored::*;
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "attest")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Keyword-scripted API testing", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Script file to run
    #[arg(value_name = "FILE")]
    file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a script and render its report
    Run {
        /// The script file to run
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Directory request bodies are loaded from (default: the script's
        /// directory)
        #[arg(long, value_name = "DIR")]
        workspace: Option<PathBuf>,

        /// TOML file of configuration properties, applied after
        /// workspace/attest.toml
        #[arg(long, value_name = "FILE")]
        properties: Option<PathBuf>,

        /// Print the report as JSON instead of the colored tree
        #[arg(long)]
        json: bool,
    },
    /// Parse a script and display its statements
    Parse {
        /// The script file to parse
        #[arg(value_name = "FILE")]
        file: PathBuf,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Check a script for statements that fail to parse
    Check {
        /// The script file to check
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
}

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .compact()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Some(Commands::Run {
            file,
            workspace,
            properties,
            json,
        }) => run_script(&file, workspace, properties, json),
        Some(Commands::Parse { file, json }) => parse_script(&file, json),
        Some(Commands::Check { file }) => check_script(&file),
        None => {
            if let Some(file) = cli.file {
                run_script(&file, None, None, false)
            } else {
                Err(anyhow::anyhow!("No script file given. Try --help."))
            }
        }
    };

    if let Err(e) = result {
        eprintln!("{}: {}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

fn run_script(
    file: &Path,
    workspace: Option<PathBuf>,
    properties: Option<PathBuf>,
    json: bool,
) -> anyhow::Result<()> {
    let workspace = workspace
        .unwrap_or_else(|| file.parent().unwrap_or(Path::new(".")).to_path_buf());

    let mut runner = Runner::new(&workspace)?;

    let defaults = workspace.join("attest.toml");
    if defaults.is_file() {
        for (key, value) in load_properties(&defaults)? {
            runner.set_property(&key, &value);
        }
    }
    if let Some(path) = properties {
        for (key, value) in load_properties(&path)? {
            runner.set_property(&key, &value);
        }
    }

    let tree = runner.run_file(file)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&tree.to_json())?);
    } else {
        println!("{}", tree.generate(&ColorRetriever));
    }

    if tree.derived_severity(tree.root()) >= ReportType::Warn {
        std::process::exit(1);
    }
    Ok(())
}

fn parse_script(file: &Path, json: bool) -> anyhow::Result<()> {
    let text = fs::read_to_string(file)?;
    let script = Script::parse(&default_keywords(), &text);

    if json {
        let statements: Vec<serde_json::Value> = script
            .statements()
            .iter()
            .map(|s| {
                json!({
                    "keyword": s.code(),
                    "category": format!("{:?}", s.category()),
                    "properties": s.properties(),
                    "value": s.value(),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&statements)?);
    } else {
        println!("{:#?}", script.statements());
    }

    Ok(())
}

fn check_script(file: &Path) -> anyhow::Result<()> {
    let text = fs::read_to_string(file)?;
    let script = Script::parse(&default_keywords(), &text);

    if script.has_error() {
        println!(
            "{} Some statements failed to parse in {} ({} kept). Run with RUST_LOG=error for details.",
            "✗".red(),
            file.display(),
            script.len()
        );
        std::process::exit(1);
    }

    println!(
        "{} {} statements parsed from {}",
        "✓".green(),
        script.len(),
        file.display()
    );
    Ok(())
}

/// Colored one-line-per-node rendering of a report tree. Failing nodes
/// also print their detail, which carries the reproduction trail.
struct ColorRetriever;

impl ReportRetriever for ColorRetriever {
    type Output = String;

    fn retrieve(
        &self,
        tree: &ReportTree,
        id: NodeId,
        children: Vec<String>,
        layer: usize,
        _index: usize,
    ) -> String {
        let node = tree.node(id);
        let indent = "  ".repeat(layer);
        let mut result = format!(
            "{}[{}] {}",
            indent,
            color_severity(tree.derived_severity(id)),
            node.display_title()
        );

        if node.severity() >= ReportType::Warn && !node.detail().is_empty() {
            for line in node.detail().lines() {
                result.push('\n');
                result.push_str(&format!("{}  {}", indent, line.dimmed()));
            }
        }

        for child in children {
            result.push('\n');
            result.push_str(&child);
        }
        result
    }
}

fn color_severity(severity: ReportType) -> ColoredString {
    let label = severity.to_string();
    match severity {
        ReportType::Trace => label.dimmed(),
        ReportType::Info => label.normal(),
        ReportType::Pass => label.green(),
        ReportType::Warn => label.yellow(),
        ReportType::Error | ReportType::Critical | ReportType::Fail => label.red().bold(),
    }
}
