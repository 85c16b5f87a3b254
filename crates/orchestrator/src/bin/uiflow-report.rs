//! Report generator for persisted suite results
//!
//! Reads every `<module>-results.json` under a results directory, optionally
//! compares it with a previous run, and prints or writes the report.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use uiflow_orchestrator::report::{self, RunComparison};
use uiflow_orchestrator::OrchestratorResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Console,
    Html,
}

#[derive(Parser, Debug)]
#[command(name = "uiflow-report")]
#[command(about = "Summarise UI suite results and compare against a previous run")]
struct Args {
    /// Directory holding the current run's snapshots
    #[arg(short, long, default_value = "test-results", env = "UIFLOW_RESULTS_DIR")]
    results: PathBuf,

    /// Directory holding a previous run to compare against
    #[arg(short, long)]
    previous: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "console")]
    format: Format,

    /// Write the report here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Title shown in the HTML report
    #[arg(long, default_value = "UI Test Run")]
    title: String,
}

fn main() {
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    match run(args) {
        Ok(true) => std::process::exit(0),
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(2);
        }
    }
}

/// Returns whether every test in the current run avoided failure.
fn run(args: Args) -> OrchestratorResult<bool> {
    let current = report::load_run(&args.results)?;
    info!("Loaded {} module(s) from {}", current.len(), args.results.display());

    let comparison = match &args.previous {
        Some(dir) => {
            let previous = report::load_run(dir)?;
            info!("Comparing against {} module(s) from {}", previous.len(), dir.display());
            Some(RunComparison::between(&current, &previous))
        }
        None => None,
    };

    let rendered = match args.format {
        Format::Console => report::render_console(&current, comparison.as_ref()),
        Format::Html => report::render_html(&args.title, &current, comparison.as_ref()),
    };

    match &args.output {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, rendered)?;
            info!("Report written to {}", path.display());
        }
        None => print!("{}", rendered),
    }

    Ok(!report::has_failures(&current))
}
