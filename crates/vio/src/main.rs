//! vio - snapshots of the untracked files in a git working tree.
//!
//! This is the main entry point for the vio CLI.

mod commands;

use clap::{Parser, Subcommand};
use commands::*;
use std::path::PathBuf;
use vio_core::{BackendKind, SynchronizerKind};

#[derive(Parser)]
#[command(name = "vio")]
#[command(author, version, about = "Version the untracked files of a git working tree", long_about = None)]
struct Cli {
    /// Repository to operate on (defaults to the enclosing repository)
    #[arg(short = 'C', long = "repo", global = true, value_name = "PATH")]
    repo: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Write logs to a file (the standard log directory when PATH is omitted)
    #[arg(
        long,
        global = true,
        value_name = "PATH",
        num_args = 0..=1,
        default_missing_value = ""
    )]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize vio in a git repository
    Init {
        /// Snapshot storage directory, relative to the repository root
        #[arg(short, long, value_name = "PATH")]
        snapshots: Option<PathBuf>,
        /// Storage backend
        #[arg(short, long, default_value = "posix", value_parser = parse_backend)]
        backend: BackendKind,
        /// Tool used to copy files (rsync or local)
        #[arg(long, default_value = "rsync", value_parser = parse_synchronizer)]
        synchronizer: SynchronizerKind,
    },
    /// Snapshot the untracked files of the working tree
    Commit {
        /// Metadata as a JSON object of string values
        #[arg(short, long, value_name = "JSON")]
        meta: Option<String>,
    },
    /// Restore a committed snapshot into the working tree
    Checkout {
        /// REVISION, REVISION#EPOCH or a full index entry
        version: String,
    },
    /// List committed versions, oldest first
    Log,
    /// Show repository status
    Status,
    /// Compare a path between two versions
    Diff {
        from: String,
        to: String,
        path: PathBuf,
    },
    /// Check that every indexed version has its snapshot
    Verify,
    /// Print version information
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_file = init_logging(cli.verbose, cli.log_file);
    if let Some(path) = &log_file {
        tracing::debug!(path = %path.display(), "Logging to file");
    }

    let cwd = std::env::current_dir()?;

    match cli.command {
        Commands::Init {
            snapshots,
            backend,
            synchronizer,
        } => {
            let root = match cli.repo {
                Some(path) => vio_util::path::resolve(&cwd, &path),
                None => cwd.clone(),
            };
            handle_init(&root, snapshots, backend, synchronizer).await
        }
        Commands::Commit { meta } => handle_commit(&repo_root(cli.repo, &cwd), meta).await,
        Commands::Checkout { version } => {
            handle_checkout(&repo_root(cli.repo, &cwd), &version).await
        }
        Commands::Log => handle_log(&repo_root(cli.repo, &cwd)).await,
        Commands::Status => handle_status(&repo_root(cli.repo, &cwd)).await,
        Commands::Diff { from, to, path } => {
            handle_diff(&repo_root(cli.repo, &cwd), &from, &to, &path).await
        }
        Commands::Verify => handle_verify(&repo_root(cli.repo, &cwd)).await,
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}
