//! Scrawl CLI
//!
//! Command-line interface for scrawl - git-backed text records.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use scrawl_core::{Config, Store};

mod commands;
mod output;

use output::{Output, OutputFormat};

#[derive(Parser)]
#[command(name = "scrawl")]
#[command(about = "Scrawl - local-first text records with git history")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Override the record repository path
    #[arg(long, global = true, value_name = "PATH")]
    repo: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the record repository (first-time setup)
    Init,
    /// Save a record
    Save {
        /// Record name; a UUID is assigned when omitted
        #[arg(short, long)]
        name: Option<String>,
        /// Tags to attach
        #[arg(short, long = "tag")]
        tags: Vec<String>,
        /// Read content from a file
        #[arg(short, long, conflicts_with = "message")]
        file: Option<PathBuf>,
        /// Record content given inline (otherwise read from stdin)
        #[arg(short, long)]
        message: Option<String>,
        /// Description stored in the metadata document
        #[arg(short, long)]
        description: Option<String>,
        /// Commit immediately even when batching is enabled
        #[arg(long)]
        no_batch: bool,
    },
    /// Show a record
    Show {
        /// Record id
        id: String,
    },
    /// List records
    #[command(alias = "ls")]
    List {
        /// Filter by tag
        #[arg(short, long = "tag")]
        tags: Vec<String>,
        /// Require every filter tag instead of any
        #[arg(long)]
        all_tags: bool,
    },
    /// Delete a record
    #[command(alias = "rm")]
    Delete {
        /// Record id
        id: String,
    },
    /// Manage tags
    Tag {
        #[command(subcommand)]
        command: TagCommands,
    },
    /// Show repository status and pending batch count
    Status,
    /// Show uncommitted changes
    Diff {
        /// Show staged changes instead of the working tree
        #[arg(long)]
        staged: bool,
    },
    /// Run the auto-sync daemon until Ctrl-C
    Daemon {
        /// Seconds between cycles
        #[arg(long)]
        interval: Option<u64>,
        /// Conflict strategy: timestamp, ours, theirs, or manual
        #[arg(long)]
        strategy: Option<String>,
        /// Enable commit-message generation
        #[arg(long)]
        llm: bool,
        /// Model for commit-message generation
        #[arg(long, value_name = "MODEL")]
        llm_model: Option<String>,
    },
    /// Check record/metadata consistency
    Doctor {
        /// Remove orphaned content files
        #[arg(long)]
        prune: bool,
    },
    /// Tag index maintenance
    Index {
        #[command(subcommand)]
        command: IndexCommands,
    },
}

#[derive(Subcommand)]
enum TagCommands {
    /// Add tags to a record
    Add {
        /// Record id
        id: String,
        /// Tags to add
        #[arg(required = true)]
        tags: Vec<String>,
        /// Skip the tag commit
        #[arg(long)]
        no_commit: bool,
    },
    /// Remove tags from a record
    #[command(alias = "rm")]
    Remove {
        /// Record id
        id: String,
        /// Tags to remove
        #[arg(required = true)]
        tags: Vec<String>,
        /// Skip the tag commit
        #[arg(long)]
        no_commit: bool,
    },
    /// List all tags with usage counts, or one record's tags
    #[command(alias = "ls")]
    List {
        /// Record id
        id: Option<String>,
    },
    /// List record ids carrying the given tags
    Filter {
        /// Tags to match
        #[arg(required = true)]
        tags: Vec<String>,
        /// Require every tag instead of any
        #[arg(long)]
        all: bool,
    },
}

#[derive(Subcommand)]
enum IndexCommands {
    /// Rebuild the tag index from the metadata documents
    Rebuild,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output = Output::new(OutputFormat::from_flags(cli.json, cli.quiet));

    let mut config = Config::load()?;
    if let Some(repo) = &cli.repo {
        config.repo_path = repo.clone();
    }

    match cli.command {
        // Commands that don't need an opened store
        Commands::Init => commands::init::run(&config, &output),
        Commands::Daemon {
            interval,
            strategy,
            llm,
            llm_model,
        } => commands::daemon::run(config, interval, strategy, llm, llm_model, &output).await,
        command => {
            let mut store = Store::open_with_config(config)?;
            match command {
                Commands::Init | Commands::Daemon { .. } => unreachable!(), // Handled above
                Commands::Save {
                    name,
                    tags,
                    file,
                    message,
                    description,
                    no_batch,
                } => commands::record::save(
                    &mut store,
                    name,
                    tags,
                    file,
                    message,
                    description,
                    no_batch,
                    &output,
                ),
                Commands::Show { id } => commands::record::show(&store, &id, &output),
                Commands::List { tags, all_tags } => {
                    commands::record::list(&mut store, tags, all_tags, &output)
                }
                Commands::Delete { id } => commands::record::delete(&mut store, &id, &output),
                Commands::Tag { command } => match command {
                    TagCommands::Add {
                        id,
                        tags,
                        no_commit,
                    } => commands::tag::add(&mut store, &id, tags, no_commit, &output),
                    TagCommands::Remove {
                        id,
                        tags,
                        no_commit,
                    } => commands::tag::remove(&mut store, &id, tags, no_commit, &output),
                    TagCommands::List { id } => commands::tag::list(&mut store, id, &output),
                    TagCommands::Filter { tags, all } => {
                        commands::tag::filter(&mut store, tags, all, &output)
                    }
                },
                Commands::Status => commands::status::show(&store, &output),
                Commands::Diff { staged } => commands::status::diff(&store, staged, &output),
                Commands::Doctor { prune } => commands::doctor::run(&store, prune, &output),
                Commands::Index { command } => match command {
                    IndexCommands::Rebuild => commands::index::rebuild(&mut store, &output),
                },
            }
        }
    }
}
