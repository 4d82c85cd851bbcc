// SPDX-License-Identifier: AGPL-3.0-or-later
//! arkfs CLI
//!
//! Sandboxed file management with per-path metadata and an audit trail.

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "arkfs")]
#[command(author, version, about = "arkfs - File metadata and audit trail", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Numeric id recorded as the acting user
    #[arg(long, global = true, default_value_t = 0)]
    actor_id: u64,

    /// Name recorded as the acting user
    #[arg(long, global = true, default_value = "cli")]
    actor_name: String,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List directory contents with their metadata
    #[command(alias = "dir")]
    Ls {
        /// Path to list (defaults to current directory)
        #[arg(default_value = ".")]
        path: String,

        /// Entries to skip
        #[arg(long, default_value_t = 0)]
        offset: usize,

        /// Page size (0 uses the default)
        #[arg(long, default_value_t = 0)]
        limit: usize,

        /// Long format with details
        #[arg(short, long)]
        long: bool,

        /// Show all files including hidden
        #[arg(short, long)]
        all: bool,

        /// Human-readable sizes
        #[arg(short = 'H', long)]
        human: bool,
    },

    /// Read or write path metadata
    Meta {
        #[command(subcommand)]
        action: MetaCommand,
    },

    /// Create a directory under a parent
    Mkdir {
        /// Existing parent directory
        parent: String,

        /// Name (may contain several components)
        name: String,
    },

    /// Move or rename, carrying metadata along
    Mv {
        /// Source path
        source: String,

        /// Destination path
        dest: String,
    },

    /// Remove a file or directory tree and its metadata
    Rm {
        /// Path to remove
        path: String,
    },

    /// Print audit records between two RFC3339 instants as JSON lines
    Audit {
        from: String,
        to: String,
    },

    /// Export audit records between two RFC3339 instants
    ExportAudit {
        from: String,
        to: String,
    },

    /// Delete audit records older than the retention period
    SweepAudit {
        /// Retention in days (defaults to the configured value)
        #[arg(long)]
        days: Option<i64>,
    },

    /// Show store statistics
    Stats,
}

#[derive(Subcommand, Debug)]
enum MetaCommand {
    /// Show the metadata stored for a path
    Get {
        path: String,
    },

    /// Replace the metadata stored for a path
    Set {
        path: String,

        /// Tag (repeatable)
        #[arg(short, long = "tag")]
        tags: Vec<String>,

        /// Free-form notes
        #[arg(short, long)]
        notes: Option<String>,

        /// Custom field as KEY=VALUE (repeatable)
        #[arg(short, long = "field", value_parser = commands::parse_field)]
        fields: Vec<(String, String)>,
    },
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let ctx = match commands::Context::open(cli.config.as_deref(), cli.actor_id, &cli.actor_name) {
        Ok(ctx) => ctx,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let result = match cli.command {
        Commands::Ls { path, offset, limit, long, all, human } => {
            commands::ls(&ctx, &path, offset, limit, long, all, human).await
        }
        Commands::Meta { action: MetaCommand::Get { path } } => {
            commands::meta_get(&ctx, &path)
        }
        Commands::Meta { action: MetaCommand::Set { path, tags, notes, fields } } => {
            commands::meta_set(&ctx, &path, tags, notes, fields)
        }
        Commands::Mkdir { parent, name } => {
            commands::mkdir(&ctx, &parent, &name).await
        }
        Commands::Mv { source, dest } => {
            commands::mv(&ctx, &source, &dest).await
        }
        Commands::Rm { path } => {
            commands::rm(&ctx, &path).await
        }
        Commands::Audit { from, to } => {
            commands::audit(&ctx, &from, &to)
        }
        Commands::ExportAudit { from, to } => {
            commands::export_audit(&ctx, &from, &to).await
        }
        Commands::SweepAudit { days } => {
            commands::sweep_audit(&ctx, days)
        }
        Commands::Stats => {
            commands::stats(&ctx)
        }
    };

    let closed = ctx.close().await;

    match result.and(closed) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
