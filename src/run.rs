//! Top-level upgrade run over every collection and project.
//!
//! Collections are walked in ascending name order, ignoring case, so logs are
//! reproducible across runs; projects keep the order the server returns. Each collection
//! owns its log from before its first project until after its last, and a
//! failure inside one collection never stops the next.
use crate::audit_log::AuditLog;
use crate::config::{redact_connection_string, RunConfig};
use crate::model::Collection;
use crate::server::{DeploymentHost, TeamFoundation};
use crate::upgrade::{run_for_project, ProjectOptions, ProjectOutcome};
use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::PathBuf;

/// Options chosen on the command line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOptions {
    pub dry_run: bool,
    /// Restrict the run to these collections (case-insensitive). Empty means all.
    pub collections: Vec<String>,
}

/// Per-project outcome counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProjectTally {
    pub projects: usize,
    pub upgraded: usize,
    pub would_upgrade: usize,
    pub up_to_date: usize,
    pub no_valid_template: usize,
    pub failed: usize,
}

impl ProjectTally {
    pub fn record(&mut self, outcome: &ProjectOutcome) {
        self.projects += 1;
        match outcome {
            ProjectOutcome::UpToDate => self.up_to_date += 1,
            ProjectOutcome::NoValidTemplate => self.no_valid_template += 1,
            ProjectOutcome::Upgraded { .. } => self.upgraded += 1,
            ProjectOutcome::WouldUpgrade { .. } => self.would_upgrade += 1,
            ProjectOutcome::Failed { .. } => self.failed += 1,
        }
    }

    pub fn merge(&mut self, other: &ProjectTally) {
        self.projects += other.projects;
        self.upgraded += other.upgraded;
        self.would_upgrade += other.would_upgrade;
        self.up_to_date += other.up_to_date;
        self.no_valid_template += other.no_valid_template;
        self.failed += other.failed;
    }

    fn describe(&self) -> String {
        let mut text = format!(
            "{} team projects: {} upgraded, {} up to date, {} without valid template, {} failed",
            self.projects, self.upgraded, self.up_to_date, self.no_valid_template, self.failed
        );
        if self.would_upgrade > 0 {
            text.push_str(&format!(", {} would upgrade", self.would_upgrade));
        }
        text
    }
}

/// Totals for a whole run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub collections: usize,
    pub collection_failures: usize,
    #[serde(flatten)]
    pub tally: ProjectTally,
    pub log_files: Vec<PathBuf>,
}

impl RunSummary {
    /// True when any project or collection could not be processed.
    pub fn has_failures(&self) -> bool {
        self.tally.failed > 0 || self.collection_failures > 0
    }

    pub fn describe(&self) -> String {
        format!(
            "*** Processed {} collections ({} failed), {} ***",
            self.collections,
            self.collection_failures,
            self.tally.describe()
        )
    }
}

/// Run the upgrade against `server`, writing progress to `console`.
///
/// Returns an error only for failures that stop the whole run: the log folder,
/// the deployment host, or the collection list. Everything below a collection
/// is contained and counted in the summary.
pub fn run(
    config: &RunConfig,
    server: &dyn TeamFoundation,
    options: &RunOptions,
    console: &mut dyn Write,
) -> Result<RunSummary> {
    writeln!(
        console,
        "*** Scanning all Team Projects in all Team Project Collections ***"
    )?;
    writeln!(console, "Tfs Root Url: {}", config.tfs_root_url)?;
    writeln!(
        console,
        "Config DB Connectionstring: {}",
        redact_connection_string(&config.config_db_connection_string)
    )?;
    if options.dry_run {
        writeln!(console, "Dry run: no project will be provisioned")?;
    }

    fs::create_dir_all(&config.root_log_folder)
        .with_context(|| format!("create log folder {}", config.root_log_folder.display()))?;

    let host = server
        .deployment_host(&config.deployment_settings())
        .context("create deployment service host")?;

    let collections = select_collections(
        server
            .collections()
            .context("list team project collections")?,
        &options.collections,
    );

    let project_options = ProjectOptions {
        dry_run: options.dry_run,
    };
    let mut summary = RunSummary::default();
    for collection in &collections {
        summary.collections += 1;
        match run_collection(
            config,
            server,
            host.as_ref(),
            collection,
            project_options,
            console,
        ) {
            Ok((tally, path)) => {
                summary.tally.merge(&tally);
                summary.log_files.push(path);
            }
            Err(err) => {
                tracing::error!(collection = %collection.name, "collection failed: {err:#}");
                summary.collection_failures += 1;
                writeln!(
                    console,
                    "Processing of collection '{}' failed: {err:#}",
                    collection.name
                )?;
            }
        }
    }

    Ok(summary)
}

/// Sort by name, ignoring case, and apply the optional collection filter.
fn select_collections(mut collections: Vec<Collection>, only: &[String]) -> Vec<Collection> {
    collections.sort_by(|a, b| {
        a.name
            .to_lowercase()
            .cmp(&b.name.to_lowercase())
            .then_with(|| a.name.cmp(&b.name))
    });
    if only.is_empty() {
        return collections;
    }
    for name in only {
        if !collections
            .iter()
            .any(|collection| collection.name.eq_ignore_ascii_case(name))
        {
            tracing::warn!(collection = %name, "requested collection not found on server");
        }
    }
    collections
        .into_iter()
        .filter(|collection| {
            only.iter()
                .any(|name| collection.name.eq_ignore_ascii_case(name))
        })
        .collect()
}

/// Process one collection inside its own log. The log is closed on every
/// path: explicitly on success, by drop when an error unwinds out.
fn run_collection(
    config: &RunConfig,
    server: &dyn TeamFoundation,
    host: &dyn DeploymentHost,
    collection: &Collection,
    options: ProjectOptions,
    console: &mut dyn Write,
) -> Result<(ProjectTally, PathBuf)> {
    tracing::info!(collection = %collection.name, "scanning collection");
    let mut log = AuditLog::open(&config.root_log_folder, &collection.name, console)?;
    let mut tally = ProjectTally::default();

    match server.projects(collection) {
        Ok(projects) => {
            for project in &projects {
                log.console(&format!("Team Project {}", project.name))?;
                log.file(&format!(">> Team Project {}", project.name))?;
                let outcome = run_for_project(host, collection, project, &mut log, options);
                log.file("")?;
                tally.record(&outcome);
            }
        }
        Err(err) => {
            log.status(
                &format!(
                    "Could not list team projects of collection '{}': see log for details.",
                    collection.name
                ),
                &format!(">>> Could not list team projects: {err}"),
            )?;
            log.file("")?;
            return Err(anyhow::Error::new(err)
                .context(format!("list team projects of {}", collection.name)));
        }
    }

    if tally.projects > 0 {
        log.file(&format!("*** {} ***", tally.describe()))?;
    }
    let path = log.close()?;
    Ok((tally, path))
}

#[cfg(test)]
#[path = "run_tests.rs"]
mod tests;
