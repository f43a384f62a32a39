mod cmd;
mod output;
mod target;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::target::Target;

/// kubeprod - install and update a production runtime on Kubernetes
#[derive(Parser)]
#[command(name = "kubeprod")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Enable verbose output
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Install or update the runtime on a cluster
  Install {
    #[command(subcommand)]
    target: Target,
  },

  /// Scaffold the manifests and persist the configuration without contacting a cluster
  Init {
    #[command(subcommand)]
    target: Target,
  },

  /// List supported platforms
  Platforms,
}

fn main() -> Result<()> {
  let cli = Cli::parse();

  let filter = if cli.verbose {
    EnvFilter::new("debug")
  } else {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
  };
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  match cli.command {
    Commands::Install { target } => cmd::cmd_install(&target),
    Commands::Init { target } => cmd::cmd_init(&target),
    Commands::Platforms => cmd::cmd_platforms(),
  }
}
