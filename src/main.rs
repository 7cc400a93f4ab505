//! Harness entry point
//!
//! Run with no argument to execute the full matrix, or name a test case
//! directory or a scenario to run just that slice.

use std::path::PathBuf;
use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use pack_e2e::matrix::{catalog, MatrixRunner};
use pack_e2e::{pack, HarnessResult};

#[derive(Parser, Debug)]
#[command(name = "pack-e2e")]
#[command(about = "Packaging E2E harness: verifies the npm package in sample consumer projects")]
struct Args {
    /// Test case directory or scenario name to run (default: all)
    filter: Option<String>,

    /// Directory containing the consumer project templates
    #[arg(long, default_value = "consumers")]
    consumers: PathBuf,

    /// Library project to pack (the package under test)
    #[arg(long, default_value = ".")]
    project_root: PathBuf,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
        )
        .with_target(false)
        .init();

    if let Err(e) = run(args).await {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> HarnessResult<()> {
    // One tarball per run, built before any case; every staged project
    // installs this same artifact.
    let artifact = pack::pack(&args.project_root).await?;

    let runner = MatrixRunner::new(catalog(), args.consumers);
    runner.run(args.filter.as_deref(), &artifact).await
}
