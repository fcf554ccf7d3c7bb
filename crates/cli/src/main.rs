// catsync CLI - run catalog imports against a JSON state snapshot

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use catsync_recon::backend::{Level, Logger};
use catsync_recon::engine::{load_rows, Importer, Operation, OPERATIONS};
use catsync_recon::locale::PackLocaleResolver;
use catsync_recon::memory::{MemoryStore, NullInstaller};
use catsync_recon::model::Behavior;
use catsync_recon::ImportConfig;

#[derive(Parser)]
#[command(name = "catsync")]
#[command(about = "Reconcile catalog import CSVs against a state snapshot")]
#[command(version)]
#[command(after_help = "\
Examples:
  catsync stores stores.csv -s state.json -o state.json
  catsync attribute-options options.csv -b append -s state.json
  catsync attribute-sets sets.csv -b delete_if_not_exist -s state.json
  catsync locales locales.csv -c import.toml")]
struct Cli {
    /// Import type; one of the registered operations
    r#type: String,

    /// Path to the CSV file containing the rows
    file: PathBuf,

    /// Behavior: append, replace, delete, or (attribute types only)
    /// delete_if_not_exist
    #[arg(long, short = 'b', default_value = "replace")]
    behavior: String,

    /// CSV delimiter
    #[arg(long, short = 'd', default_value = ";")]
    delimiter: char,

    /// Engine config (TOML); defaults apply when omitted
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// State snapshot to reconcile against (JSON); empty state when omitted
    #[arg(long, short = 's')]
    state: Option<PathBuf>,

    /// Where to write the updated state snapshot
    #[arg(long, short = 'o')]
    out_state: Option<PathBuf>,
}

/// Log sink writing `[LEVEL] message` lines to stderr.
struct StderrLogger;

impl Logger for StderrLogger {
    fn log(&self, level: Level, message: &str) {
        eprintln!("[{level}] {message}");
    }
}

fn operation_names() -> String {
    OPERATIONS
        .iter()
        .map(|(name, _)| *name)
        .collect::<Vec<_>>()
        .join(", ")
}

fn parse_invocation(cli: &Cli) -> Result<(Operation, Behavior), String> {
    let operation = Operation::from_name(&cli.r#type)
        .ok_or_else(|| format!("invalid type '{}'; expected one of: {}", cli.r#type, operation_names()))?;
    let behavior = Behavior::parse(&cli.behavior)
        .ok_or_else(|| format!("invalid behavior '{}'", cli.behavior))?;
    if behavior == Behavior::DeleteIfNotExist && !operation.is_attribute_kind() {
        return Err(format!(
            "behavior delete_if_not_exist is only valid for attribute types, not '{}'",
            operation.name()
        ));
    }
    Ok((operation, behavior))
}

fn run(cli: Cli) -> Result<(), String> {
    let (operation, behavior) = parse_invocation(&cli)?;

    let config = match &cli.config {
        Some(path) => {
            let data = fs::read_to_string(path)
                .map_err(|e| format!("cannot read {}: {e}", path.display()))?;
            ImportConfig::from_toml(&data).map_err(|e| e.to_string())?
        }
        None => ImportConfig::default(),
    };

    let mut state = match &cli.state {
        Some(path) => {
            let data = fs::read_to_string(path)
                .map_err(|e| format!("cannot read {}: {e}", path.display()))?;
            MemoryStore::from_json(&data).map_err(|e| e.to_string())?
        }
        None => MemoryStore::default(),
    };

    let csv_data = fs::read_to_string(&cli.file)
        .map_err(|e| format!("cannot read {}: {e}", cli.file.display()))?;
    let rows = load_rows(&csv_data, cli.delimiter as u8).map_err(|e| e.to_string())?;

    let logger = StderrLogger;
    let mut locales = PackLocaleResolver::new(&config, NullInstaller, &logger);
    let report = Importer::new(&mut state, &mut locales, config, &logger)
        .run(operation, &rows, behavior)
        .map_err(|e| e.to_string())?;

    println!(
        "{}",
        serde_json::to_string_pretty(&report).map_err(|e| e.to_string())?
    );

    if let Some(path) = &cli.out_state {
        fs::write(path, state.to_json())
            .map_err(|e| format!("cannot write {}: {e}", path.display()))?;
    }

    Ok(())
}

fn main() -> ExitCode {
    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("error: {message}");
            ExitCode::FAILURE
        }
    }
}
