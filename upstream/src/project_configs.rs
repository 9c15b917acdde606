use std::{
    collections::{BTreeMap, BTreeSet},
    sync::{Arc, PoisonError, RwLock},
};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::relay_registry::RelayId;

pub type ProjectId = u64;

/// A public key (DSN key) owned by a project.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicKeyConfig {
    pub public_key: String,

    pub project_id: ProjectId,

    /// Fields the mock does not interpret; served back unchanged.
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

/// Project options relevant to relays.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectOptions {
    /// Relays allowed to receive this project's configuration.
    #[serde(default)]
    pub trusted_relays: BTreeSet<RelayId>,

    #[serde(flatten)]
    pub other: Map<String, Value>,
}

/// Per-project configuration served to trusted relays.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectConfig {
    pub project_id: ProjectId,

    #[serde(default)]
    pub public_keys: Vec<PublicKeyConfig>,

    #[serde(default)]
    pub config: ProjectOptions,

    #[serde(flatten)]
    pub other: Map<String, Value>,
}

impl ProjectConfig {
    pub fn new(project_id: ProjectId) -> Self {
        Self {
            project_id,
            public_keys: Vec::new(),
            config: ProjectOptions::default(),
            other: Map::new(),
        }
    }

    pub fn with_public_key(mut self, public_key: impl Into<String>) -> Self {
        self.public_keys.push(PublicKeyConfig {
            public_key: public_key.into(),
            project_id: self.project_id,
            other: Map::new(),
        });
        self
    }

    pub fn with_trusted_relay(mut self, relay_id: impl Into<RelayId>) -> Self {
        self.config.trusted_relays.insert(relay_id.into());
        self
    }

    pub fn trusted_relays(&self) -> &BTreeSet<RelayId> {
        &self.config.trusted_relays
    }

    pub fn has_public_key(&self, public_key: &str) -> bool {
        self.public_keys
            .iter()
            .any(|key_config| key_config.public_key == public_key)
    }
}

/// Shared store of seeded project configurations, keyed by project id.
///
/// Iteration is in ascending project id order, which makes key lookups deterministic.
#[derive(Clone, Default)]
pub struct ProjectConfigs(Arc<RwLock<BTreeMap<ProjectId, ProjectConfig>>>);

impl ProjectConfigs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces the configuration of `config.project_id`.
    pub fn insert(&self, config: ProjectConfig) {
        self.0
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(config.project_id, config);
    }

    pub fn get(&self, project_id: ProjectId) -> Option<ProjectConfig> {
        self.0
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&project_id)
            .cloned()
    }

    /// Finds the project owning `public_key`.
    ///
    /// If several projects claim the key, the lowest project id wins, no
    /// matter in which order the projects were added.
    pub fn project_id_for_key(&self, public_key: &str) -> Option<ProjectId> {
        self.0
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .find(|config| config.has_public_key(public_key))
            .map(|config| config.project_id)
    }
}

impl FromIterator<ProjectConfig> for ProjectConfigs {
    fn from_iter<I: IntoIterator<Item = ProjectConfig>>(iter: I) -> Self {
        Self(Arc::new(RwLock::new(
            iter.into_iter()
                .map(|config| (config.project_id, config))
                .collect(),
        )))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::project_configs::{ProjectConfig, ProjectConfigs};

    #[test]
    fn test_project_id_for_key() {
        let configs = ProjectConfigs::from_iter([
            ProjectConfig::new(42).with_public_key("abc"),
            ProjectConfig::new(43).with_public_key("def").with_public_key("ghi"),
        ]);

        assert_eq!(configs.project_id_for_key("abc"), Some(42));
        assert_eq!(configs.project_id_for_key("ghi"), Some(43));
        assert_eq!(configs.project_id_for_key("xyz"), None);
    }

    #[test]
    fn test_duplicate_key_resolves_to_lowest_project() {
        let configs = ProjectConfigs::new();
        configs.insert(ProjectConfig::new(50).with_public_key("abc"));
        configs.insert(ProjectConfig::new(7).with_public_key("abc"));
        configs.insert(ProjectConfig::new(3).with_public_key("def"));
        assert_eq!(configs.project_id_for_key("abc"), Some(7));

        // replacing project 7 without the key hands it back to project 50
        configs.insert(ProjectConfig::new(7).with_public_key("xyz"));
        assert_eq!(configs.project_id_for_key("abc"), Some(50));
        assert_eq!(configs.project_id_for_key("xyz"), Some(7));
    }

    #[test]
    fn test_unknown_fields_are_preserved() {
        let raw = json!({
            "projectId": 42,
            "slug": "python",
            "disabled": false,
            "publicKeys": [{"publicKey": "abc", "projectId": 42, "isEnabled": true}],
            "config": {"trustedRelays": ["relayA"], "allowedDomains": ["*"]},
        });
        let config: ProjectConfig = serde_json::from_value(raw.clone()).unwrap();

        assert!(config.trusted_relays().contains("relayA"));
        assert!(config.has_public_key("abc"));
        assert_eq!(serde_json::to_value(&config).unwrap(), raw);
    }

    #[test]
    fn test_builder_wire_format() {
        let config = ProjectConfig::new(42)
            .with_public_key("abc")
            .with_trusted_relay("relayA");

        assert_eq!(
            serde_json::to_value(&config).unwrap(),
            json!({
                "projectId": 42,
                "publicKeys": [{"publicKey": "abc", "projectId": 42}],
                "config": {"trustedRelays": ["relayA"]},
            })
        );
    }
}
