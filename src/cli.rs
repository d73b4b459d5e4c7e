//! CLI argument parsing.
//!
//! Running with no arguments performs a full upgrade using the config file
//! found in the working directory or the user config directory.
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "upgrade-features",
    version,
    about = "Upgrade work item tracking features of every team project to match its process template",
    after_help = "Examples:\n  upgrade-features\n  upgrade-features --config D:\\ops\\upgrade-features.json --dry-run\n  upgrade-features --collection DefaultCollection --json"
)]
pub struct RootArgs {
    /// Config file (default: ./upgrade-features.json, then the user config dir)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Decide templates and write logs without provisioning any project
    #[arg(long)]
    pub dry_run: bool,

    /// Only process this collection (repeatable, case-insensitive)
    #[arg(long = "collection", value_name = "NAME")]
    pub collections: Vec<String>,

    /// Print the run summary as JSON when the run completes
    #[arg(long)]
    pub json: bool,

    /// Exit with status 2 when any project or collection failed
    #[arg(long)]
    pub strict: bool,

    /// Emit debug diagnostics on stderr
    #[arg(long)]
    pub verbose: bool,
}
