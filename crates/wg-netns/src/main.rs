//! wg-netns CLI entry point.

use std::process::ExitCode;

use clap::Parser;
use color_eyre::eyre::Result;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use wg_netns::cli::Cli;
use wg_netns_common::{NetnsError, Settings};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Initialize error handling
    color_eyre::install()?;

    // Parse CLI arguments
    let cli = Cli::parse();

    let settings = match Settings::from_env() {
        Ok(settings) => settings.with_verbose(cli.verbose),
        Err(err) => return report(err, cli.verbose),
    };

    // Initialize tracing
    let directive = if settings.verbose {
        "wg_netns=debug"
    } else {
        "wg_netns=warn"
    };
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive(directive.parse()?))
        .init();

    // Execute command
    let verbose = settings.verbose;
    match cli.execute(&settings).await {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(err) => report(err, verbose),
    }
}

/// Verbose runs get the full report; otherwise a single line naming the
/// error kind.
fn report(err: NetnsError, verbose: bool) -> Result<ExitCode> {
    if verbose {
        return Err(err.into());
    }
    eprintln!("error: {err} ({})", err.kind());
    Ok(ExitCode::FAILURE)
}
