//! Syndicate — pull remote posts into the local content store.
//!
//! # Usage
//!
//! ```text
//! syndicate site add <id> --name <name> --transport <type> [--set key=value]...
//! syndicate site list [--json]
//! syndicate site show <id>
//! syndicate status get <id>
//! syndicate status set <id> <idle|pulling|pushing|processing>
//! syndicate pull <id> [--keep-going] [--deadline-secs N] [--fetch-only]
//! syndicate import <id> <file.json> [--keep-going]
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{import::ImportArgs, pull::PullArgs, site::SiteCommand, status::StatusCommand};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "syndicate",
    version,
    about = "Pull syndicated posts from remote sites into a local content store",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Register and inspect remote sites.
    Site {
        #[command(subcommand)]
        command: SiteCommand,
    },

    /// Read or override a site's status flag.
    Status {
        #[command(subcommand)]
        command: StatusCommand,
    },

    /// Fetch a site's posts through its transport and reconcile them.
    Pull(PullArgs),

    /// Reconcile a JSON array of posts from a file on behalf of a site.
    Import(ImportArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_target(false)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Site { command } => commands::site::run(command),
        Commands::Status { command } => commands::status::run(command),
        Commands::Pull(args) => args.run(),
        Commands::Import(args) => args.run(),
    }
}
