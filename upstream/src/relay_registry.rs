//! Registry of relays the mock upstream knows about.
//!
//! The test driver seeds the registry before (or while) relays connect. Only
//! relays present here can complete registration. Entries are never modified
//! once inserted; re-inserting an id replaces the whole entry.

use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

pub type RelayId = String;

/// Identity of a relay as known to the upstream.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayRegistryEntry {
    pub relay_id: RelayId,

    pub public_key: String,

    /// Internal relays are trusted by every project without being allowlisted.
    #[serde(default)]
    pub internal: bool,
}

impl RelayRegistryEntry {
    pub fn new(relay_id: impl Into<RelayId>, public_key: impl Into<String>) -> Self {
        Self {
            relay_id: relay_id.into(),
            public_key: public_key.into(),
            internal: false,
        }
    }

    pub fn internal(mut self) -> Self {
        self.internal = true;
        self
    }
}

/// Shared handle to the relay registry.
#[derive(Clone, Default)]
pub struct RelayRegistry(Arc<DashMap<RelayId, RelayRegistryEntry>>);

impl RelayRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a relay, replacing any previous entry with the same id.
    pub fn insert(&self, entry: RelayRegistryEntry) {
        self.0.insert(entry.relay_id.clone(), entry);
    }

    pub fn get(&self, relay_id: &str) -> Option<RelayRegistryEntry> {
        self.0.get(relay_id).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, relay_id: &str) -> bool {
        self.0.contains_key(relay_id)
    }
}

impl FromIterator<RelayRegistryEntry> for RelayRegistry {
    fn from_iter<I: IntoIterator<Item = RelayRegistryEntry>>(iter: I) -> Self {
        let registry = RelayRegistry::new();
        for entry in iter {
            registry.insert(entry);
        }
        registry
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::relay_registry::{RelayRegistry, RelayRegistryEntry};

    #[test]
    fn test_insert_replaces_entry() {
        let registry = RelayRegistry::from_iter([RelayRegistryEntry::new("relayA", "key-1")]);
        assert!(registry.contains("relayA"));
        assert!(!registry.contains("relayB"));

        registry.insert(RelayRegistryEntry::new("relayA", "key-2").internal());

        let entry = registry.get("relayA").unwrap();
        assert_eq!(entry.public_key, "key-2");
        assert!(entry.internal);
    }

    #[test]
    fn test_wire_format() {
        let entry: RelayRegistryEntry =
            serde_json::from_value(json!({"relayId": "relayA", "publicKey": "abc"})).unwrap();
        assert_eq!(entry, RelayRegistryEntry::new("relayA", "abc"));

        assert_eq!(
            serde_json::to_value(entry.internal()).unwrap(),
            json!({"relayId": "relayA", "publicKey": "abc", "internal": true})
        );
    }
}
