//! Seams to the server-side services the upgrade drives.
//!
//! The tool never looks inside these services. It enumerates collections and
//! projects, opens scoped servicing contexts, and asks the feature
//! provisioning service to report, validate, and provision.
use crate::model::{Collection, Feature, ProcessTemplateCandidate, Project};
use std::path::PathBuf;
use thiserror::Error;

/// Failures reported by a server collaborator.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: ureq::Error,
    },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("failed to decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: ureq::Error,
    },
}

/// Inputs needed to stand up a deployment-level service host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentSettings {
    pub config_db_connection_string: String,
    pub plugin_directory: PathBuf,
}

/// Configuration-server connection: the root of every run.
pub trait TeamFoundation {
    /// All collections in server order.
    fn collections(&self) -> Result<Vec<Collection>, ServerError>;

    /// Projects of one collection in server order.
    fn projects(&self, collection: &Collection) -> Result<Vec<Project>, ServerError>;

    /// Acquire the deployment host. Dropping the handle releases it.
    fn deployment_host(
        &self,
        settings: &DeploymentSettings,
    ) -> Result<Box<dyn DeploymentHost + '_>, ServerError>;
}

/// Deployment-level host used to open servicing contexts.
pub trait DeploymentHost {
    /// Begin a servicing request against a collection instance. Dropping the
    /// context ends the request.
    fn begin_servicing(
        &self,
        collection: &Collection,
    ) -> Result<Box<dyn ServicingContext + '_>, ServerError>;
}

/// The feature provisioning service, bound to one servicing request.
pub trait ServicingContext {
    fn features(&self, project: &Project) -> Result<Vec<Feature>, ServerError>;

    fn validate_process_templates(
        &self,
        project: &Project,
    ) -> Result<Vec<ProcessTemplateCandidate>, ServerError>;

    fn provision_features(&self, project: &Project, template_id: &str)
        -> Result<(), ServerError>;
}
