//! In-memory server used by unit tests.
//!
//! Records every call in order so tests can assert on sequencing and on
//! release of scoped handles.
use crate::model::{Collection, Feature, FeatureState, ProcessTemplateCandidate, Project};
use crate::server::{
    DeploymentHost, DeploymentSettings, ServerError, ServicingContext, TeamFoundation,
};
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Default)]
pub struct FakeServer {
    pub collections: Vec<Collection>,
    pub projects: BTreeMap<String, Vec<Project>>,
    pub features: BTreeMap<String, Vec<Feature>>,
    pub templates: BTreeMap<String, Vec<ProcessTemplateCandidate>>,
    pub fail_collections: bool,
    pub fail_host: bool,
    /// Collection names whose project enumeration fails.
    pub fail_projects: BTreeSet<String>,
    /// Project names whose provisioning call fails.
    pub fail_provision: BTreeSet<String>,
    /// Project names whose feature lookup fails.
    pub fail_features: BTreeSet<String>,
    pub events: RefCell<Vec<String>>,
}

fn refused(what: &str) -> ServerError {
    ServerError::Status {
        url: format!("fake://{what}"),
        status: 500,
    }
}

pub fn actionable() -> Vec<Feature> {
    vec![
        Feature {
            name: "Backlogs".to_string(),
            state: FeatureState::FullyConfigured,
            is_hidden: false,
        },
        Feature {
            name: "Portfolio".to_string(),
            state: FeatureState::NotConfigured,
            is_hidden: false,
        },
    ]
}

pub fn configured() -> Vec<Feature> {
    vec![
        Feature {
            name: "Backlogs".to_string(),
            state: FeatureState::FullyConfigured,
            is_hidden: false,
        },
        Feature {
            name: "Hidden".to_string(),
            state: FeatureState::NotConfigured,
            is_hidden: true,
        },
    ]
}

pub fn template(name: &str, is_valid: bool, is_recommended: bool) -> ProcessTemplateCandidate {
    ProcessTemplateCandidate {
        id: format!("{name}-id"),
        name: name.to_string(),
        is_valid,
        is_recommended,
    }
}

impl FakeServer {
    pub fn add_collection(&mut self, name: &str) -> &mut Self {
        self.collections.push(Collection {
            id: format!("{name}-instance"),
            name: name.to_string(),
            url: format!("http://fake/tfs/{name}"),
        });
        self.projects.entry(name.to_string()).or_default();
        self
    }

    pub fn add_project(
        &mut self,
        collection: &str,
        name: &str,
        features: Vec<Feature>,
        templates: Vec<ProcessTemplateCandidate>,
    ) -> &mut Self {
        self.projects
            .entry(collection.to_string())
            .or_default()
            .push(Project::new(format!("{name}-id"), name));
        self.features.insert(name.to_string(), features);
        self.templates.insert(name.to_string(), templates);
        self
    }

    pub fn events(&self) -> Vec<String> {
        self.events.borrow().clone()
    }

    fn record(&self, event: String) {
        self.events.borrow_mut().push(event);
    }
}

impl TeamFoundation for FakeServer {
    fn collections(&self) -> Result<Vec<Collection>, ServerError> {
        self.record("collections".to_string());
        if self.fail_collections {
            return Err(refused("collections"));
        }
        Ok(self.collections.clone())
    }

    fn projects(&self, collection: &Collection) -> Result<Vec<Project>, ServerError> {
        self.record(format!("projects:{}", collection.name));
        if self.fail_projects.contains(&collection.name) {
            return Err(refused("projects"));
        }
        Ok(self
            .projects
            .get(&collection.name)
            .cloned()
            .unwrap_or_default())
    }

    fn deployment_host(
        &self,
        _settings: &DeploymentSettings,
    ) -> Result<Box<dyn DeploymentHost + '_>, ServerError> {
        if self.fail_host {
            return Err(refused("hosts"));
        }
        self.record("host:open".to_string());
        Ok(Box::new(FakeHost { server: self }))
    }
}

struct FakeHost<'s> {
    server: &'s FakeServer,
}

impl DeploymentHost for FakeHost<'_> {
    fn begin_servicing(
        &self,
        collection: &Collection,
    ) -> Result<Box<dyn ServicingContext + '_>, ServerError> {
        self.server.record(format!("begin:{}", collection.name));
        Ok(Box::new(FakeContext {
            server: self.server,
            collection: collection.name.clone(),
        }))
    }
}

impl Drop for FakeHost<'_> {
    fn drop(&mut self) {
        self.server.record("host:release".to_string());
    }
}

struct FakeContext<'s> {
    server: &'s FakeServer,
    collection: String,
}

impl ServicingContext for FakeContext<'_> {
    fn features(&self, project: &Project) -> Result<Vec<Feature>, ServerError> {
        self.server.record(format!("features:{}", project.name));
        if self.server.fail_features.contains(&project.name) {
            return Err(refused("features"));
        }
        Ok(self
            .server
            .features
            .get(&project.name)
            .cloned()
            .unwrap_or_default())
    }

    fn validate_process_templates(
        &self,
        project: &Project,
    ) -> Result<Vec<ProcessTemplateCandidate>, ServerError> {
        self.server.record(format!("templates:{}", project.name));
        Ok(self
            .server
            .templates
            .get(&project.name)
            .cloned()
            .unwrap_or_default())
    }

    fn provision_features(&self, project: &Project, template_id: &str) -> Result<(), ServerError> {
        self.server
            .record(format!("provision:{}:{template_id}", project.name));
        if self.server.fail_provision.contains(&project.name) {
            return Err(refused("provision"));
        }
        Ok(())
    }
}

impl Drop for FakeContext<'_> {
    fn drop(&mut self) {
        self.server.record(format!("end:{}", self.collection));
    }
}
