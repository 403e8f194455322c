//! CLI command definitions and handlers.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use wg_netns_common::paths::expand_home;
use wg_netns_common::{NetnsResult, Settings};
use wg_netns_network::{ProcessExecutor, SystemExecutor};

use crate::orchestrator::Orchestrator;
use crate::profile::load_profile;

const ENV_HELP: &str = "\
Environment:
  WG_PROFILE_DIR  Directory searched for bare profile names [default: /etc/wireguard]
  WG_NETNS_DIR    Per-namespace config directory [default: /etc/netns]
  WG_VERBOSE      Non-zero enables debug logging [default: 0]
  WG_SHELL        Shell used for hooks [default: /bin/sh]";

/// wg-netns - WireGuard interfaces in dedicated network namespaces
#[derive(Parser)]
#[command(name = "wg-netns")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true, after_help = ENV_HELP)]
pub struct Cli {
    /// Print every executed command and the full error report
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// wg-netns commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Create the namespace and bring its interfaces up
    Up {
        /// Profile path, or a name looked up in WG_PROFILE_DIR
        profile: PathBuf,
    },

    /// Bring the interfaces down and remove the namespace
    Down {
        /// Continue past failures
        #[arg(short, long)]
        force: bool,

        /// Profile path, or a name looked up in WG_PROFILE_DIR
        profile: PathBuf,
    },
}

impl Cli {
    /// Execute the command against the real system.
    ///
    /// # Errors
    ///
    /// Returns the first profile, execution or filesystem error.
    pub async fn execute(self, settings: &Settings) -> NetnsResult<()> {
        self.run(&SystemExecutor, settings).await
    }

    /// Execute the command through `executor`.
    ///
    /// # Errors
    ///
    /// Same as [`Cli::execute`].
    pub async fn run(self, executor: &dyn ProcessExecutor, settings: &Settings) -> NetnsResult<()> {
        let orchestrator = Orchestrator::new(executor, settings);

        match self.command {
            Commands::Up { profile } => {
                let namespace = load_profile(&expand_home(&profile), &settings.paths)?;
                orchestrator.up(&namespace, interrupted()).await?;
                tracing::info!(namespace = %namespace.name, "Namespace is up");
            }
            Commands::Down { force, profile } => {
                let namespace = load_profile(&expand_home(&profile), &settings.paths)?;
                let report = orchestrator.down(&namespace, force).await?;
                if !report.is_clean() {
                    tracing::warn!(
                        namespace = %namespace.name,
                        failures = report.errors.len(),
                        "Teardown finished with ignored failures"
                    );
                }
            }
        }
        Ok(())
    }
}

/// Resolves on Ctrl-C. Never resolves if the handler cannot be installed.
///
/// Once installed, tokio keeps handling SIGINT for the rest of the process, so
/// further Ctrl-C presses no longer terminate it. The rollback that follows an
/// interrupt always runs to completion.
async fn interrupted() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Cannot listen for interrupts");
        std::future::pending::<()>().await;
    }
    tracing::warn!("Interrupted");
}
