//! Decide whether a project needs a feature upgrade and with which template.
//!
//! The decision is a pure function of the feature list and the candidate
//! templates returned by the server; it performs no I/O and never mutates
//! its inputs.
use crate::model::{Feature, ProcessTemplateCandidate};
use thiserror::Error;

/// How the chosen template was picked among the valid candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    /// It was the only valid candidate.
    OnlyValid,
    /// Several candidates were valid and this one is recommended.
    Recommended,
}

/// Outcome of inspecting one project.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision<'a> {
    /// No visible feature is left unconfigured.
    UpToDate,
    /// Actionable features exist but no candidate template is valid.
    NoValidTemplate,
    /// Provision the project with `template`.
    Upgrade {
        template: &'a ProcessTemplateCandidate,
        selection: Selection,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecisionError {
    #[error(
        "{} valid process templates found but none is recommended: {}",
        .valid.len(),
        .valid.join(", ")
    )]
    NoRecommendedTemplate { valid: Vec<String> },
}

/// True when at least one feature is `NotConfigured` and not hidden.
pub fn needs_action(features: &[Feature]) -> bool {
    features.iter().any(Feature::is_actionable)
}

/// Decide what to do for a project given its features and candidate templates.
///
/// Candidates are only consulted when the project has actionable features.
/// Among several valid candidates the first recommended one wins; when none
/// is recommended the choice is ambiguous and reported as an error.
pub fn decide<'a>(
    features: &[Feature],
    candidates: &'a [ProcessTemplateCandidate],
) -> Result<Decision<'a>, DecisionError> {
    if !needs_action(features) {
        return Ok(Decision::UpToDate);
    }

    let valid: Vec<&ProcessTemplateCandidate> = candidates.iter().filter(|c| c.is_valid).collect();
    match valid.as_slice() {
        [] => Ok(Decision::NoValidTemplate),
        [only] => Ok(Decision::Upgrade {
            template: only,
            selection: Selection::OnlyValid,
        }),
        many => many
            .iter()
            .copied()
            .find(|c| c.is_recommended)
            .map(|template| Decision::Upgrade {
                template,
                selection: Selection::Recommended,
            })
            .ok_or_else(|| DecisionError::NoRecommendedTemplate {
                valid: many.iter().map(|c| c.name.clone()).collect(),
            }),
    }
}

#[cfg(test)]
#[path = "decision_tests.rs"]
mod tests;
