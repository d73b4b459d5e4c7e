use anyhow::Result;
use clap::Parser;
use std::io::{self, Write};
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod audit_log;
mod cli;
mod config;
mod decision;
#[cfg(test)]
mod fake;
mod gateway;
mod model;
mod run;
mod server;
mod upgrade;

use cli::RootArgs;
use gateway::Gateway;
use run::{RunOptions, RunSummary};

/// Exit status when the run could not complete (config, connection, host).
const EXIT_ABORTED: u8 = 1;
/// Exit status under `--strict` when some project or collection failed.
const EXIT_PARTIAL: u8 = 2;

/// Diagnostics go to stderr so stdout carries only progress and the summary.
fn init_tracing(verbose: bool) {
    let default = if verbose {
        "tfs_feature_upgrade=debug"
    } else {
        "tfs_feature_upgrade=warn"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

fn main() -> ExitCode {
    let args = RootArgs::parse();
    init_tracing(args.verbose);

    match upgrade_all(&args) {
        Ok(summary) if args.strict && summary.has_failures() => ExitCode::from(EXIT_PARTIAL),
        Ok(_) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(EXIT_ABORTED)
        }
    }
}

fn upgrade_all(args: &RootArgs) -> Result<RunSummary> {
    let config = config::load_run_config(args.config.as_deref())?;
    let gateway = Gateway::connect(
        &config.tfs_root_url,
        config.access_token.clone(),
        config.request_timeout(),
    );
    tracing::debug!(root = gateway.root_url(), "resolved configuration server");

    let options = RunOptions {
        dry_run: args.dry_run,
        collections: args.collections.clone(),
    };
    let stdout = io::stdout();
    let mut console = stdout.lock();
    let summary = run::run(&config, &gateway, &options, &mut console)?;

    writeln!(console, "{}", summary.describe())?;
    if args.json {
        writeln!(console, "{}", serde_json::to_string_pretty(&summary)?)?;
    }
    console.flush()?;
    Ok(summary)
}
