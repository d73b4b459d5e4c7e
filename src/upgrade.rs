//! Feature enablement for a single team project.
//!
//! `run_for_project` is the failure boundary of a run: whatever goes wrong
//! while servicing one project is written to the collection log and turned
//! into a `ProjectOutcome::Failed`, so the next project still gets its turn.
use crate::audit_log::AuditLog;
use crate::decision::{decide, needs_action, Decision, Selection};
use crate::model::{Collection, ProcessTemplateCandidate, Project};
use crate::server::{DeploymentHost, ServerError, ServicingContext};
use anyhow::{Context, Result};
use serde::Serialize;

/// What happened to one project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ProjectOutcome {
    UpToDate,
    NoValidTemplate,
    Upgraded { template: String },
    /// Dry run: the project would have been upgraded with `template`.
    WouldUpgrade { template: String },
    Failed { error: String },
}

/// Per-run switches that affect project handling.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProjectOptions {
    pub dry_run: bool,
}

/// Provision `project` with `template`. Errors propagate untouched.
pub fn provision(
    context: &dyn ServicingContext,
    project: &Project,
    template: &ProcessTemplateCandidate,
) -> Result<(), ServerError> {
    tracing::info!(project = %project.name, template = %template.name, "provisioning features");
    context.provision_features(project, &template.id)
}

/// Run feature enablement for one project. Never fails.
pub fn run_for_project(
    host: &dyn DeploymentHost,
    collection: &Collection,
    project: &Project,
    log: &mut AuditLog<'_>,
    options: ProjectOptions,
) -> ProjectOutcome {
    match enable_features(host, collection, project, log, options) {
        Ok(outcome) => outcome,
        Err(err) => {
            tracing::debug!(project = %project.name, "feature enablement failed: {err:#}");
            let reported = log.status(
                &format!(
                    "Feature enablement failed for project '{}': see log for details.",
                    project.name
                ),
                &format!(
                    ">>> Feature enablement failed for project '{}': {err:#}",
                    project.name
                ),
            );
            if let Err(log_err) = reported {
                tracing::error!(project = %project.name, "could not record failure: {log_err:#}");
            }
            ProjectOutcome::Failed {
                error: format!("{err:#}"),
            }
        }
    }
}

fn enable_features(
    host: &dyn DeploymentHost,
    collection: &Collection,
    project: &Project,
    log: &mut AuditLog<'_>,
    options: ProjectOptions,
) -> Result<ProjectOutcome> {
    log.console(&format!("Running feature enablement for '{}'", project.name))?;

    let context = host
        .begin_servicing(collection)
        .with_context(|| format!("begin servicing request for collection {}", collection.name))?;

    let features = context
        .features(project)
        .context("read project features")?;
    let candidates = if needs_action(&features) {
        context
            .validate_process_templates(project)
            .context("validate process templates")?
    } else {
        Vec::new()
    };

    let outcome = match decide(&features, &candidates)? {
        Decision::UpToDate => {
            log.status(
                &format!("\t{}: Project is up to date.", project.name),
                ">>> Team Project is now already up to date",
            )?;
            ProjectOutcome::UpToDate
        }
        Decision::NoValidTemplate => {
            log.status(
                &format!("\t{}: No valid process templates found.", project.name),
                ">>> No valid process templates found, the team project cannot be configured/upgraded automatically to adopt the latest features.",
            )?;
            ProjectOutcome::NoValidTemplate
        }
        Decision::Upgrade {
            template,
            selection,
        } => {
            if options.dry_run {
                log.both(&format!(
                    ">>> Dry run: would upgrade Team Project with template {template}"
                ))?;
                ProjectOutcome::WouldUpgrade {
                    template: template.name.clone(),
                }
            } else {
                log.both(&match selection {
                    Selection::OnlyValid => {
                        format!(">>> Upgrading Team Project with template {template}")
                    }
                    Selection::Recommended => format!(
                        ">>> Multiple valid process templates found. Upgrading Team Project with recommended template {template}"
                    ),
                })?;
                provision(&*context, project, template)
                    .with_context(|| format!("provision features with template {template}"))?;
                ProjectOutcome::Upgraded {
                    template: template.name.clone(),
                }
            }
        }
    };
    Ok(outcome)
}

#[cfg(test)]
#[path = "upgrade_tests.rs"]
mod tests;
