//! Saga command-line interface.
//!
//! Every command prints its result as JSON on stdout; logs go to stderr.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::Value;
use tracing_subscriber::EnvFilter;

use saga::db::{Config, Saga, SagaError, SagaResult};
use saga::model::{BranchType, CommitType, TagType};
use saga::presentation::LevelUpChoices;
use saga::store::Backend;
use saga::version::{CommitContext, NewBranch, NewCommit, NewRepository, NewTag, VersionManager};

#[derive(Parser)]
#[command(name = "saga", version)]
#[command(about = "Branch-based version control for evolving records", long_about = None)]
struct Cli {
    /// Store directory (overrides the config file)
    #[arg(short = 'd', long = "database", global = true)]
    path: Option<PathBuf>,

    /// TOML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Manage repositories
    #[command(subcommand)]
    Repo(RepoCommand),

    /// Manage branches
    #[command(subcommand)]
    Branch(BranchCommand),

    /// Commit a snapshot onto a branch
    Commit {
        repository: String,

        /// JSON file with the snapshot
        snapshot: PathBuf,

        #[arg(short, long)]
        message: String,

        /// Defaults to the repository's default branch
        #[arg(short, long)]
        branch: Option<String>,

        #[arg(long)]
        level: Option<u32>,

        #[arg(long = "type", default_value = "update")]
        commit_type: CommitType,

        #[arg(long)]
        milestone: Option<String>,

        /// Second parent, for merge commits
        #[arg(long)]
        merge_parent: Option<String>,

        #[arg(long)]
        notes: Option<String>,

        #[arg(long)]
        narrative: Option<String>,

        #[arg(long)]
        author: Option<String>,
    },

    /// Commit a level-up with a generated message
    LevelUp {
        repository: String,

        /// JSON file with the snapshot
        snapshot: PathBuf,

        #[arg(short, long)]
        branch: Option<String>,

        /// JSON file with the choices made
        #[arg(long)]
        choices: Option<PathBuf>,
    },

    /// Commits newest first, optionally only those of one branch
    Log {
        repository: String,

        #[arg(short, long)]
        branch: Option<String>,

        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },

    /// Ancestry of a commit
    Lineage {
        commit: String,

        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },

    /// Show a commit
    Show {
        commit: String,

        /// Print only the snapshot
        #[arg(long)]
        snapshot: bool,
    },

    /// Tag a commit
    Tag {
        repository: String,
        commit: String,
        name: String,

        #[arg(long = "type", default_value = "milestone")]
        tag_type: TagType,

        #[arg(long)]
        description: Option<String>,

        #[arg(long)]
        author: Option<String>,
    },

    /// Everything in a repository
    Tree { repository: String },

    /// Chronological events of a repository
    Timeline { repository: String },

    /// Commit graph of a repository
    Graph { repository: String },

    /// Recompute a commit's hash
    Verify { commit: String },

    /// Record counts of the store
    Stats,
}

#[derive(Subcommand)]
enum RepoCommand {
    Create {
        name: String,

        #[arg(long)]
        description: Option<String>,

        #[arg(long)]
        owner: Option<String>,

        #[arg(long)]
        public: bool,

        #[arg(long)]
        no_forks: bool,

        /// JSON file with the initial snapshot
        #[arg(long)]
        snapshot: Option<PathBuf>,

        #[arg(long)]
        author: Option<String>,
    },

    List {
        #[arg(long)]
        owner: Option<String>,
    },

    Show { repository: String },

    /// Delete a repository and everything in it
    Delete { repository: String },
}

#[derive(Subcommand)]
enum BranchCommand {
    Create {
        repository: String,
        name: String,

        /// Parent branch; defaults to the repository's default branch
        #[arg(long)]
        from: Option<String>,

        /// Branch point commit; defaults to the parent's head
        #[arg(long)]
        at: Option<String>,

        #[arg(long = "type", default_value = "development")]
        branch_type: BranchType,

        #[arg(long)]
        description: Option<String>,
    },

    List { repository: String },

    /// Mark a branch as merged
    Merge {
        repository: String,
        branch: String,

        #[arg(long)]
        into: Option<String>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(cli: &Cli) -> SagaResult<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    if let Some(path) = &cli.path {
        config.store.path = path.clone();
    }
    Ok(config)
}

fn run(cli: Cli) -> SagaResult<()> {
    let saga = Saga::open_with_config(load_config(&cli)?)?;
    execute(&saga, cli.command)?;
    saga.close()
}

fn execute(saga: &Saga, command: Command) -> SagaResult<()> {
    let manager = saga.manager();

    match command {
        Command::Repo(command) => repo_command(manager, command),
        Command::Branch(command) => branch_command(manager, command),

        Command::Commit {
            repository,
            snapshot,
            message,
            branch,
            level,
            commit_type,
            milestone,
            merge_parent,
            notes,
            narrative,
            author,
        } => {
            let branch = branch_or_default(manager, &repository, branch)?;
            let mut commit = NewCommit::new(message, read_json(&snapshot)?)
                .commit_type(commit_type)
                .context(CommitContext {
                    merge_parent_hash: merge_parent,
                    notes,
                    narrative_context: narrative,
                    ..Default::default()
                });
            commit.level = level;
            commit.milestone = milestone;
            commit.author = author;
            print_json(&manager.create_commit(&repository, &branch, commit)?)
        }

        Command::LevelUp {
            repository,
            snapshot,
            branch,
            choices,
        } => {
            let branch = branch_or_default(manager, &repository, branch)?;
            let choices: Option<LevelUpChoices> = choices
                .map(|path| -> SagaResult<LevelUpChoices> { Ok(serde_json::from_value(read_json(&path)?)?) })
                .transpose()?;
            let commit = saga
                .api()
                .level_up(&repository, &branch, read_json(&snapshot)?, choices.as_ref())?;
            print_json(&commit)
        }

        Command::Log {
            repository,
            branch,
            limit,
        } => print_json(&manager.get_commit_history(&repository, branch.as_deref(), limit)?),

        Command::Lineage { commit, limit } => print_json(&manager.get_lineage(&commit, limit)?),

        Command::Show { commit, snapshot } => {
            if snapshot {
                print_json(&manager.get_snapshot_at_commit(&commit)?)
            } else {
                print_json(&manager.get_commit(&commit)?)
            }
        }

        Command::Tag {
            repository,
            commit,
            name,
            tag_type,
            description,
            author,
        } => {
            let mut tag = NewTag::new(name).tag_type(tag_type);
            tag.description = description;
            tag.author = author;
            print_json(&manager.create_tag(&repository, &commit, tag)?)
        }

        Command::Tree { repository } => print_json(&manager.get_repository_tree(&repository)?),
        Command::Timeline { repository } => print_json(&saga.api().get_timeline(&repository)?),
        Command::Graph { repository } => print_json(&saga.api().get_visualization(&repository)?),
        Command::Verify { commit } => print_json(&manager.verify_commit(&commit)?),
        Command::Stats => print_json(&saga.stats()?),
    }
}

fn repo_command(manager: &VersionManager<Backend>, command: RepoCommand) -> SagaResult<()> {
    match command {
        RepoCommand::Create {
            name,
            description,
            owner,
            public,
            no_forks,
            snapshot,
            author,
        } => {
            let mut new = NewRepository::new(name).public(public).allow_forks(!no_forks);
            new.description = description;
            new.owner = owner;
            new.author = author;
            if let Some(path) = snapshot {
                new = new.initial_snapshot(read_json(&path)?);
            }
            print_json(&manager.create_repository(new)?)
        }
        RepoCommand::List { owner } => print_json(&manager.list_repositories(owner.as_deref())?),
        RepoCommand::Show { repository } => print_json(&manager.get_repository(&repository)?),
        RepoCommand::Delete { repository } => print_json(&manager.delete_repository(&repository)?),
    }
}

fn branch_command(manager: &VersionManager<Backend>, command: BranchCommand) -> SagaResult<()> {
    match command {
        BranchCommand::Create {
            repository,
            name,
            from,
            at,
            branch_type,
            description,
        } => {
            let parent = branch_or_default(manager, &repository, from)?;
            let mut new = NewBranch::new(name, parent).branch_type(branch_type);
            new.branch_point_hash = at;
            new.description = description;
            print_json(&manager.create_branch(&repository, new)?)
        }
        BranchCommand::List { repository } => print_json(&manager.list_branches(&repository)?),
        BranchCommand::Merge {
            repository,
            branch,
            into,
        } => {
            let into = branch_or_default(manager, &repository, into)?;
            print_json(&manager.mark_branch_merged(&repository, &branch, &into)?)
        }
    }
}

fn branch_or_default(
    manager: &VersionManager<Backend>,
    repository_id: &str,
    branch: Option<String>,
) -> SagaResult<String> {
    match branch {
        Some(branch) => Ok(branch),
        None => Ok(manager.get_repository(repository_id)?.default_branch),
    }
}

fn read_json(path: &Path) -> SagaResult<Value> {
    let text = std::fs::read_to_string(path)?;
    let value: Value = serde_json::from_str(&text)?;
    if !value.is_object() {
        return Err(SagaError::InvalidInput(format!(
            "{} must contain a JSON object",
            path.display()
        )));
    }
    Ok(value)
}

fn print_json<T: Serialize>(value: &T) -> SagaResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
