use clap::{Parser, Subcommand};
use clap_complete::Shell;

#[derive(Parser)]
#[command(name = "cloudsqlmysql")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Declarative grants, roles, databases and audit rules for Cloud SQL for MySQL", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Manifest file (default: ./cloudsqlmysql.toml, then the config directory)
    #[arg(short = 'f', long, global = true)]
    pub manifest: Option<String>,

    /// State file (default: cloudsqlmysql.state.json beside the manifest)
    #[arg(long, global = true)]
    pub state: Option<String>,

    /// Give up on every database call after this many seconds
    #[arg(long, global = true, value_name = "SECS")]
    pub timeout: Option<u64>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Check the manifest and provider settings without connecting
    Validate,

    /// Show what apply would change
    Plan(PlanArgs),

    /// Make the server match the manifest
    Apply(ApplyArgs),

    /// Re-read recorded resources from the server and update state
    Refresh(RefreshArgs),

    /// Remove every resource recorded in state
    Destroy(DestroyArgs),

    /// Inspect recorded state
    #[command(subcommand)]
    State(StateCommand),

    /// Look up an existing database
    Database(DatabaseArgs),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

// ============================================================================
// Plan / Apply / Destroy
// ============================================================================

#[derive(Parser)]
pub struct PlanArgs {
    /// Limit to a resource type or address (e.g. grant, role.readers)
    #[arg(short, long)]
    pub target: Option<String>,

    /// Number of concurrent reads while refreshing
    #[arg(short, long, default_value = "4")]
    pub jobs: usize,
}

#[derive(Parser)]
pub struct ApplyArgs {
    /// Limit to a resource type or address (e.g. grant, role.readers)
    #[arg(short, long)]
    pub target: Option<String>,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,

    /// Dry run - show what would be done
    #[arg(short, long)]
    pub dry_run: bool,

    /// Number of concurrent operations per tier
    #[arg(short, long, default_value = "4")]
    pub jobs: usize,
}

#[derive(Parser)]
pub struct RefreshArgs {
    /// Number of concurrent reads
    #[arg(short, long, default_value = "4")]
    pub jobs: usize,
}

#[derive(Parser)]
pub struct DestroyArgs {
    /// Limit to a resource type or address (e.g. grant, role.readers)
    #[arg(short, long)]
    pub target: Option<String>,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,

    /// Number of concurrent operations per tier
    #[arg(short, long, default_value = "4")]
    pub jobs: usize,
}

// ============================================================================
// State / Database
// ============================================================================

#[derive(Subcommand)]
pub enum StateCommand {
    /// List recorded resources
    List,

    /// Show the recorded attributes of one resource
    Show {
        /// Resource address (e.g. grant.app_readers)
        address: String,
    },
}

#[derive(Parser)]
pub struct DatabaseArgs {
    /// Database name
    pub name: String,

    /// Print as JSON
    #[arg(long)]
    pub json: bool,
}
