//! RUL Feature Selection - Main Entry Point

use clap::Parser;
use selector_cli::{init_logging, run, Args};
use tracing::info;

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.json_logs, args.verbose);

    info!("=== RUL Feature Selection v{} ===", env!("CARGO_PKG_VERSION"));

    run(&args)
}
