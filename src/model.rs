//! Server entities walked by an upgrade run.
//!
//! Everything here is read from the server for the duration of one run and
//! never written back; the tool only selects among what it is given.
use serde::{Deserialize, Serialize};
use std::fmt;

/// A team project collection hosted by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Collection {
    /// Host instance id, used to open servicing contexts.
    pub id: String,
    pub name: String,
    /// Collection endpoint (`<root>/<name>`).
    pub url: String,
}

/// A team project inside a collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub name: String,
    /// Artifact URI (`vstfs:///Classification/TeamProject/<id>`).
    pub uri: String,
}

impl Project {
    /// Build a project from its id, deriving the classification URI.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        let id = id.into();
        let uri = format!("vstfs:///Classification/TeamProject/{id}");
        Self {
            id,
            name: name.into(),
            uri,
        }
    }
}

/// Configuration state of a project feature as reported by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeatureState {
    NotAvailable,
    NotConfigured,
    PartiallyConfigured,
    FullyConfigured,
    /// Any state this tool does not know about; never actionable.
    #[serde(other)]
    Unknown,
}

/// A work item tracking feature attached to a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Feature {
    #[serde(default)]
    pub name: String,
    pub state: FeatureState,
    #[serde(default)]
    pub is_hidden: bool,
}

impl Feature {
    /// True when the feature still needs configuring and is visible to users.
    pub fn is_actionable(&self) -> bool {
        self.state == FeatureState::NotConfigured && !self.is_hidden
    }
}

/// A process template the server considers for upgrading a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessTemplateCandidate {
    #[serde(rename = "processTemplateDescriptorId")]
    pub id: String,
    #[serde(rename = "processTemplateDescriptorName")]
    pub name: String,
    pub is_valid: bool,
    #[serde(default)]
    pub is_recommended: bool,
}

impl fmt::Display for ProcessTemplateCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
