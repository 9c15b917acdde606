//! Project configuration distribution.
//!
//! Relays resolve their DSN public keys to project ids, then fetch the
//! configurations of those projects in batches. Only trusted relays receive a
//! project's configuration; everything else is silently left out of the batch.

use log::*;

use crate::{
    authenticated_relays::AuthenticatedRelays,
    error::MockError,
    project_configs::ProjectConfigs,
    protocol::{ProjectConfigsRequest, ProjectConfigsResponse, ProjectIdsRequest, ProjectIdsResponse},
    trust::is_trusted,
};

#[derive(Clone)]
pub struct ConfigService {
    project_configs: ProjectConfigs,
    authenticated_relays: AuthenticatedRelays,
}

impl ConfigService {
    pub fn new(project_configs: ProjectConfigs, authenticated_relays: AuthenticatedRelays) -> Self {
        Self {
            project_configs,
            authenticated_relays,
        }
    }

    /// Maps each public key to the project owning it, or `None` if no project does.
    pub fn get_project_ids(&self, request: ProjectIdsRequest) -> ProjectIdsResponse {
        let project_ids = request
            .public_keys
            .into_iter()
            .map(|public_key| {
                let project_id = self.project_configs.project_id_for_key(&public_key);
                (public_key, project_id)
            })
            .collect();
        ProjectIdsResponse { project_ids }
    }

    /// Returns the configurations the calling relay is trusted to see.
    ///
    /// Unknown, malformed and untrusted project ids are omitted rather than
    /// failing the whole batch.
    pub async fn get_project_configs(
        &self,
        header_relay_id: Option<&str>,
        request: ProjectConfigsRequest,
    ) -> Result<ProjectConfigsResponse, MockError> {
        let relay = match header_relay_id {
            Some(relay_id) => self.authenticated_relays.get(relay_id).await,
            None => None,
        }
        .ok_or_else(|| MockError::Unregistered {
            relay_id: header_relay_id.map(str::to_owned),
        })?;

        let mut response = ProjectConfigsResponse::default();
        for project in request.projects {
            let Some(project_id) = project.project_id() else {
                debug!("relay {} requested malformed project id {}", relay.relay_id, project);
                continue;
            };

            let config = self.project_configs.get(project_id);
            if !is_trusted(&relay.registry_entry, config.as_ref()) {
                debug!("relay {} is not trusted by project {}", relay.relay_id, project_id);
                continue;
            }
            if let Some(config) = config {
                response.configs.insert(project.to_string(), config);
            }
        }

        Ok(response)
    }
}
