//! Act/Assess/Adapt task-tree execution engine CLI.
//!
//! Manages per-run state under `.triad/`: `config.toml` plus one directory
//! per run holding the tree, history, and audit trail.

use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use triad::config::{load_config, write_config, EngineConfig};
use triad::exit_codes;
use triad::select::{select_from_root, SelectOutcome};
use triad::store::{FsStateStore, StateStore};
use triad::tree::{default_tree, TaskTree};

#[derive(Parser)]
#[command(
    name = "triad",
    version,
    about = "Act/Assess/Adapt task-tree execution engine"
)]
struct Cli {
    /// Run identifier under `.triad/runs/`.
    #[arg(long, default_value = "default")]
    run: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create `.triad/config.toml` and a default tree for the run if missing.
    Init {
        /// Overwrite existing files.
        #[arg(short, long)]
        force: bool,
    },
    /// Check the run's tree against schema and invariants.
    Validate,
    /// Print the id of the next pending task.
    Select,
    /// Print a one-line-per-node summary of the run's tree.
    Show,
}

fn main() -> ExitCode {
    triad::logging::init();
    let cli = Cli::parse();
    match run(&cli) {
        Ok(code) => to_exit_code(code),
        Err(err) => {
            eprintln!("{err:#}");
            to_exit_code(exit_codes::INVALID)
        }
    }
}

fn to_exit_code(code: i32) -> ExitCode {
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}

fn run(cli: &Cli) -> Result<i32> {
    let root = Path::new(".");
    match cli.command {
        Command::Init { force } => cmd_init(root, &cli.run, force),
        Command::Validate => cmd_validate(root, &cli.run),
        Command::Select => cmd_select(root, &cli.run),
        Command::Show => cmd_show(root, &cli.run),
    }
}

fn cmd_init(root: &Path, run_id: &str, force: bool) -> Result<i32> {
    let config_path = root.join(".triad").join("config.toml");
    if force || !config_path.exists() {
        write_config(&config_path, &EngineConfig::default())?;
    }

    let mut store = FsStateStore::new(root);
    if force || !store.tree_path(run_id).exists() {
        store.save(run_id, &default_tree())?;
    }
    Ok(exit_codes::OK)
}

fn cmd_validate(root: &Path, run_id: &str) -> Result<i32> {
    load_config(&root.join(".triad").join("config.toml")).context("validate config")?;
    let store = FsStateStore::new(root);
    store.load(run_id).context("validate tree")?;
    println!("ok");
    Ok(exit_codes::OK)
}

fn cmd_select(root: &Path, run_id: &str) -> Result<i32> {
    match select_from_root(root, run_id)? {
        SelectOutcome::Open(task) => {
            println!(
                "{} (path={}, attempts={}/{})",
                task.id, task.path, task.retry_count, task.max_attempts
            );
            Ok(exit_codes::OK)
        }
        SelectOutcome::Complete => {
            println!("complete");
            Ok(exit_codes::COMPLETE)
        }
        SelectOutcome::Partial => {
            println!("partial");
            Ok(exit_codes::PARTIAL)
        }
    }
}

fn cmd_show(root: &Path, run_id: &str) -> Result<i32> {
    let store = FsStateStore::new(root);
    let spec = store.load(run_id)?;
    let tree =
        TaskTree::from_spec(&spec).map_err(|err| anyhow::anyhow!("invalid tree: {err}"))?;
    println!("{}", tree.summarize(200));
    Ok(exit_codes::OK)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_init() {
        let cli = Cli::parse_from(["triad", "init"]);
        assert!(matches!(cli.command, Command::Init { force: false }));
        assert_eq!(cli.run, "default");
    }

    #[test]
    fn parse_select_with_run() {
        let cli = Cli::parse_from(["triad", "--run", "run-7", "select"]);
        assert!(matches!(cli.command, Command::Select));
        assert_eq!(cli.run, "run-7");
    }
}
