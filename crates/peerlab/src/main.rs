//! `peerlab`: forks the coordinator plus N children, wires up the pipe
//! mesh between them, and runs the protocol variant selected on the
//! command line. See `peerlab --help` for the CLI surface.

mod cli;
mod run;
mod variant;

use clap::Parser;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .without_time()
        .init();

    let args = cli::Args::parse();
    tracing::debug!(n = args.n, variant = %args.variant, "starting peerlab run");

    let code = run::run(args);
    std::process::exit(code);
}
