//! Mock settings and fixture loading.

use std::{fs::File, io, path::Path};

use log::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    project_configs::{ProjectConfig, ProjectId},
    relay_registry::RelayRegistryEntry,
    state::ServerState,
};

pub const DEFAULT_STORE_PROJECT_ID: ProjectId = 42;
pub const DEFAULT_INTERNAL_ERROR_PROJECT_ID: ProjectId = 666;
pub const DEFAULT_DSN_PUBLIC_KEY: &str = "31a5a894b4524f74a9a8d0e27e21ba91";

/// Fixed settings of a mock instance.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MockConfig {
    /// Events for this project are captured.
    pub store_project_id: ProjectId,
    /// Events for this project are turned into test failures.
    pub internal_error_project_id: ProjectId,
    /// Public key used in the DSNs handed to clients.
    pub dsn_public_key: String,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            store_project_id: DEFAULT_STORE_PROJECT_ID,
            internal_error_project_id: DEFAULT_INTERNAL_ERROR_PROJECT_ID,
            dsn_public_key: DEFAULT_DSN_PUBLIC_KEY.to_owned(),
        }
    }
}

#[derive(Debug, Error)]
pub enum FixtureError {
    #[error("failed to open fixtures file {path}: {source}")]
    Io { path: String, source: io::Error },

    #[error("failed to parse fixtures: {0}")]
    Parse(#[from] serde_yaml::Error),
}

/// Relays and projects to seed a mock instance with.
///
/// Accepts YAML or JSON, since every JSON document is also valid YAML.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Fixtures {
    #[serde(default)]
    pub relays: Vec<RelayRegistryEntry>,

    #[serde(default)]
    pub projects: Vec<ProjectConfig>,
}

impl Fixtures {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, FixtureError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| FixtureError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Ok(serde_yaml::from_reader(file)?)
    }

    pub fn parse(contents: &str) -> Result<Self, FixtureError> {
        Ok(serde_yaml::from_str(contents)?)
    }

    /// Seeds the registry and project configs of `state`.
    pub fn apply(self, state: &ServerState) {
        info!(
            "seeding {} relays and {} projects",
            self.relays.len(),
            self.projects.len()
        );
        for relay in self.relays {
            state.registry().insert(relay);
        }
        for project in self.projects {
            state.project_configs().insert(project);
        }
    }
}
