//! CLI command definitions and dispatch.

pub mod images;
pub mod instances;
pub mod version;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Manage flow images and deployed flow instances.
#[derive(Parser)]
#[command(name = "flowadm", version, about)]
pub struct Cli {
    /// Path to config file (overrides default)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Trace registry HTTP requests on stderr
    #[arg(long, global = true)]
    pub debug_http: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Manage flow images as OCI artifacts
    Images {
        #[command(subcommand)]
        command: images::ImagesCommand,
    },
    /// Manage deployed flow instances
    Instances {
        #[command(subcommand)]
        command: instances::InstancesCommand,
    },
    /// Show version and build information
    Version,
}

/// Dispatch a parsed CLI to the appropriate command handler.
pub async fn dispatch(cli: Cli) -> anyhow::Result<()> {
    let config = cli.config.as_deref();
    match cli.command {
        Command::Images { command } => images::execute(command, config, cli.debug_http).await,
        Command::Instances { command } => {
            instances::execute(command, config, cli.debug_http).await
        }
        Command::Version => version::execute(),
    }
}
