//! Request and response bodies of the relay-facing API.
//!
//! Field names follow the wire format exactly, which mixes snake_case
//! (registration, public keys) and camelCase (project ids).

use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};

use crate::{
    project_configs::{ProjectConfig, ProjectId},
    relay_registry::{RelayId, RelayRegistryEntry},
};

/// Header carrying the id of the calling relay.
pub const RELAY_ID_HEADER: &str = "x-sentry-relay-id";

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChallengeRequest {
    pub relay_id: RelayId,
    pub public_key: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChallengeResponse {
    pub token: String,
    pub relay_id: RelayId,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChallengeResponseRequest {
    pub relay_id: RelayId,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub relay_id: RelayId,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProjectIdsRequest {
    #[serde(rename = "publicKeys")]
    pub public_keys: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectIdsResponse {
    #[serde(rename = "projectIds")]
    pub project_ids: BTreeMap<String, Option<ProjectId>>,
}

/// A project id as sent by a relay: either a JSON number or a numeric string.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProjectKey {
    Id(ProjectId),
    Raw(String),
}

impl ProjectKey {
    /// The numeric project id, or `None` if the key is not a valid id.
    pub fn project_id(&self) -> Option<ProjectId> {
        match self {
            ProjectKey::Id(id) => Some(*id),
            ProjectKey::Raw(raw) => raw.trim().parse().ok(),
        }
    }
}

impl fmt::Display for ProjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProjectKey::Id(id) => write!(f, "{id}"),
            ProjectKey::Raw(raw) => f.write_str(raw),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProjectConfigsRequest {
    pub projects: Vec<ProjectKey>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectConfigsResponse {
    pub configs: BTreeMap<String, ProjectConfig>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PublicKeysRequest {
    pub relay_ids: Vec<RelayId>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PublicKeysResponse {
    pub public_keys: BTreeMap<RelayId, String>,
    pub relays: BTreeMap<RelayId, RelayRegistryEntry>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoreResponse {
    pub event_id: String,
}
