//! Blocking HTTP client for the server's collection, servicing, and feature
//! provisioning endpoints.
//!
//! # Endpoints
//!
//! Enumeration uses the standard REST surface:
//!
//! - `GET  <root>/_apis/projectCollections`
//! - `GET  <root>/<collection>/_apis/projects`
//!
//! Servicing goes through the servicing gateway hosted next to it:
//!
//! - `POST   <root>/_apis/servicing/hosts` opens the deployment host
//! - `POST   <root>/_apis/servicing/hosts/<host>/requests` begins a servicing request
//! - `GET    <root>/_apis/servicing/requests/<request>/projects/<project>/features`
//! - `GET    <root>/_apis/servicing/requests/<request>/projects/<project>/processTemplates`
//! - `POST   <root>/_apis/servicing/requests/<request>/projects/<project>/provision`
//!
//! Hosts and requests are released with `DELETE` on the same resource when
//! their handle is dropped.
use crate::model::{Collection, Feature, ProcessTemplateCandidate, Project};
use crate::server::{
    DeploymentHost, DeploymentSettings, ServerError, ServicingContext, TeamFoundation,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;
use ureq::http::Response;
use ureq::{Agent, Body};

const API_VERSION: &str = "api-version=1.0";

/// Page size used when listing projects.
const PROJECT_PAGE_SIZE: usize = 100;

/// List envelope used by every enumeration endpoint.
#[derive(Debug, Deserialize)]
struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    value: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct ResourceRef {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct Handle {
    id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OpenHost<'a> {
    host_type: &'a str,
    plugin_directory: String,
    config_db_connection_string: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BeginRequest<'a> {
    instance_id: &'a str,
    context_type: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProvisionBody<'a> {
    process_template_descriptor_id: &'a str,
}

/// Connection to a configuration server.
pub struct Gateway {
    agent: Agent,
    root_url: String,
    access_token: Option<String>,
}

impl Gateway {
    /// Resolve a connection to the server at `root_url`.
    ///
    /// No request is made until the first call; connection failures surface
    /// from the first enumeration.
    pub fn connect(root_url: &str, access_token: Option<String>, timeout: Duration) -> Self {
        let agent: Agent = Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .build()
            .into();
        Self {
            agent,
            root_url: root_url.trim_end_matches('/').to_string(),
            access_token,
        }
    }

    pub fn root_url(&self) -> &str {
        &self.root_url
    }

    /// Collection endpoint with the name escaped as a single path segment.
    fn collection_url(&self, name: &str) -> String {
        format!("{}/{}", self.root_url, urlencoding::encode(name))
    }

    fn servicing_url(&self, path: &str) -> String {
        format!("{}/_apis/servicing/{}?{API_VERSION}", self.root_url, path)
    }

    fn authorize<B>(&self, request: ureq::RequestBuilder<B>) -> ureq::RequestBuilder<B> {
        let request = request.header("Accept", "application/json");
        match self.access_token.as_deref() {
            Some(token) => request.header("Authorization", format!("Bearer {token}")),
            None => request,
        }
    }

    fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, ServerError> {
        tracing::debug!(%url, "GET");
        let response = self
            .authorize(self.agent.get(url))
            .call()
            .map_err(|source| http_error(url, source))?;
        read_json(url, response)
    }

    fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        url: &str,
        body: &B,
    ) -> Result<T, ServerError> {
        tracing::debug!(%url, "POST");
        let response = self
            .authorize(self.agent.post(url))
            .send_json(body)
            .map_err(|source| http_error(url, source))?;
        read_json(url, response)
    }

    fn post<B: Serialize>(&self, url: &str, body: &B) -> Result<(), ServerError> {
        tracing::debug!(%url, "POST");
        let response = self
            .authorize(self.agent.post(url))
            .send_json(body)
            .map_err(|source| http_error(url, source))?;
        check_status(url, &response)
    }

    fn delete(&self, url: &str) -> Result<(), ServerError> {
        tracing::debug!(%url, "DELETE");
        let response = self
            .authorize(self.agent.delete(url))
            .call()
            .map_err(|source| http_error(url, source))?;
        check_status(url, &response)
    }
}

fn http_error(url: &str, source: ureq::Error) -> ServerError {
    ServerError::Http {
        url: url.to_string(),
        source,
    }
}

fn check_status(url: &str, response: &Response<Body>) -> Result<(), ServerError> {
    let status = response.status();
    if status.is_success() {
        Ok(())
    } else {
        Err(ServerError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        })
    }
}

fn read_json<T: DeserializeOwned>(
    url: &str,
    mut response: Response<Body>,
) -> Result<T, ServerError> {
    check_status(url, &response)?;
    response
        .body_mut()
        .read_json::<T>()
        .map_err(|source| ServerError::Decode {
            url: url.to_string(),
            source,
        })
}

impl TeamFoundation for Gateway {
    fn collections(&self) -> Result<Vec<Collection>, ServerError> {
        let url = format!("{}/_apis/projectCollections?{API_VERSION}", self.root_url);
        let list: ListResponse<ResourceRef> = self.get_json(&url)?;
        Ok(list
            .value
            .into_iter()
            .map(|collection| Collection {
                url: self.collection_url(&collection.name),
                id: collection.id,
                name: collection.name,
            })
            .collect())
    }

    /// Page through the collection's projects. Paging stops on a short page,
    /// or on a page with no unseen ids in case the server ignores `$skip`.
    fn projects(&self, collection: &Collection) -> Result<Vec<Project>, ServerError> {
        let mut projects = Vec::new();
        let mut seen = HashSet::new();
        loop {
            let url = format!(
                "{}/_apis/projects?{API_VERSION}&$top={PROJECT_PAGE_SIZE}&$skip={}",
                collection.url,
                projects.len()
            );
            let page: ListResponse<ResourceRef> = self.get_json(&url)?;
            let count = page.value.len();
            let mut fresh = 0;
            for project in page.value {
                if seen.insert(project.id.clone()) {
                    projects.push(Project::new(project.id, project.name));
                    fresh += 1;
                }
            }
            if count < PROJECT_PAGE_SIZE {
                break;
            }
            if fresh == 0 {
                tracing::warn!(collection = %collection.name, "server repeated a project page");
                break;
            }
        }
        Ok(projects)
    }

    fn deployment_host(
        &self,
        settings: &DeploymentSettings,
    ) -> Result<Box<dyn DeploymentHost + '_>, ServerError> {
        let body = OpenHost {
            host_type: "Deployment, Application",
            plugin_directory: settings.plugin_directory.display().to_string(),
            config_db_connection_string: &settings.config_db_connection_string,
        };
        let handle: Handle = self.post_json(&self.servicing_url("hosts"), &body)?;
        tracing::debug!(host = %handle.id, "deployment host opened");
        Ok(Box::new(GatewayHost {
            gateway: self,
            id: handle.id,
        }))
    }
}

/// Deployment host opened on the servicing gateway.
struct GatewayHost<'g> {
    gateway: &'g Gateway,
    id: String,
}

impl DeploymentHost for GatewayHost<'_> {
    fn begin_servicing(
        &self,
        collection: &Collection,
    ) -> Result<Box<dyn ServicingContext + '_>, ServerError> {
        let path = format!("hosts/{}/requests", urlencoding::encode(&self.id));
        let url = self.gateway.servicing_url(&path);
        let body = BeginRequest {
            instance_id: &collection.id,
            context_type: "ServicingContext",
        };
        let handle: Handle = self.gateway.post_json(&url, &body)?;
        Ok(Box::new(GatewayRequest {
            gateway: self.gateway,
            id: handle.id,
        }))
    }
}

impl Drop for GatewayHost<'_> {
    fn drop(&mut self) {
        let path = format!("hosts/{}", urlencoding::encode(&self.id));
        match self.gateway.delete(&self.gateway.servicing_url(&path)) {
            Ok(()) => tracing::debug!(host = %self.id, "deployment host released"),
            Err(err) => {
                tracing::warn!(host = %self.id, "failed to release deployment host: {err}")
            }
        }
    }
}

/// One servicing request bound to a collection instance.
struct GatewayRequest<'g> {
    gateway: &'g Gateway,
    id: String,
}

impl GatewayRequest<'_> {
    fn project_url(&self, project: &Project, action: &str) -> String {
        self.gateway.servicing_url(&format!(
            "requests/{}/projects/{}/{action}",
            urlencoding::encode(&self.id),
            urlencoding::encode(&project.id)
        ))
    }
}

impl ServicingContext for GatewayRequest<'_> {
    fn features(&self, project: &Project) -> Result<Vec<Feature>, ServerError> {
        let list: ListResponse<Feature> = self
            .gateway
            .get_json(&self.project_url(project, "features"))?;
        Ok(list.value)
    }

    fn validate_process_templates(
        &self,
        project: &Project,
    ) -> Result<Vec<ProcessTemplateCandidate>, ServerError> {
        let list: ListResponse<ProcessTemplateCandidate> = self
            .gateway
            .get_json(&self.project_url(project, "processTemplates"))?;
        Ok(list.value)
    }

    fn provision_features(&self, project: &Project, template_id: &str) -> Result<(), ServerError> {
        let body = ProvisionBody {
            process_template_descriptor_id: template_id,
        };
        self.gateway.post(&self.project_url(project, "provision"), &body)
    }
}

impl Drop for GatewayRequest<'_> {
    fn drop(&mut self) {
        let path = format!("requests/{}", urlencoding::encode(&self.id));
        if let Err(err) = self.gateway.delete(&self.gateway.servicing_url(&path)) {
            tracing::warn!(request = %self.id, "failed to end servicing request: {err}");
        }
    }
}

#[cfg(test)]
#[path = "gateway_tests.rs"]
mod tests;
