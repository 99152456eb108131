//! ops5 CLI entry point.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use ops5_engine::{Engine, EngineConfig, RunReport};
use ops5_foundation::Result;
use ops5_runtime::{init_tracing, load_file};
use ops5_stdlib::default_registry;
use tracing::info;

#[derive(Parser)]
#[command(name = "ops5")]
#[command(author, version, about = "Run an OPS5-style rule file to quiescence", long_about = None)]
struct Cli {
    /// Rule file (JSON)
    rules: PathBuf,

    /// Enable debug logging (RUST_LOG overrides)
    #[arg(short, long)]
    verbose: bool,

    /// Stop after this many firings
    #[arg(long)]
    steps: Option<usize>,

    /// Prefer rules with more variable-bound fields
    #[arg(long)]
    sort_by_specificity: bool,

    /// Wait this long for late facts before declaring quiescence
    #[arg(long)]
    idle_timeout_ms: Option<u64>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(&cli) {
        Ok(report) => {
            info!(%report, "done");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("\x1b[31mError: {e}\x1b[0m");
            if let Some(context) = &e.context {
                eprintln!("{context}");
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<RunReport> {
    let config = EngineConfig::default()
        .with_sort_by_specificity(cli.sort_by_specificity)
        .with_idle_timeout(cli.idle_timeout_ms.map(Duration::from_millis));
    let mut engine = Engine::new(config)?;

    let summary = load_file(&cli.rules, &default_registry(), &mut engine)?;
    info!(?summary, "loaded");

    let report = match cli.steps {
        Some(steps) => engine.run_steps(steps),
        None => engine.run(),
    };
    engine.shutdown();

    let failures = engine.failures();
    if !failures.is_empty() {
        eprintln!("{} action(s) failed", failures.len());
    }
    Ok(report)
}
