//! Relays that completed the registration handshake.
//!
//! A relay lands here once its challenge succeeds and stays for the lifetime of
//! the server (or until the test driver resets authentication). There is exactly
//! one entry per relay id; registering again overwrites the previous entry.

use std::{collections::HashMap, sync::Arc};

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::relay_registry::{RelayId, RelayRegistryEntry};

/// A relay that proved its identity to the upstream.
#[derive(Clone, Debug, PartialEq)]
pub struct AuthenticatedRelay {
    pub relay_id: RelayId,

    /// Copy of the registry entry taken at registration time.
    pub registry_entry: RelayRegistryEntry,

    pub authenticated_at: DateTime<Utc>,
}

impl AuthenticatedRelay {
    pub fn new(registry_entry: RelayRegistryEntry) -> Self {
        Self {
            relay_id: registry_entry.relay_id.clone(),
            registry_entry,
            authenticated_at: Utc::now(),
        }
    }

    pub fn is_internal(&self) -> bool {
        self.registry_entry.internal
    }
}

/// Thread-safe store of authenticated relays, shared by all request handlers.
#[derive(Clone, Default)]
pub struct AuthenticatedRelays(Arc<Mutex<HashMap<RelayId, AuthenticatedRelay>>>);

impl AuthenticatedRelays {
    /// Marks the relay as authenticated, replacing any previous entry.
    pub async fn insert(&self, relay: AuthenticatedRelay) {
        let mut inner = self.0.lock().await;
        inner.insert(relay.relay_id.clone(), relay);
    }

    pub async fn get(&self, relay_id: &str) -> Option<AuthenticatedRelay> {
        let inner = self.0.lock().await;
        inner.get(relay_id).cloned()
    }

    pub async fn contains(&self, relay_id: &str) -> bool {
        let inner = self.0.lock().await;
        inner.contains_key(relay_id)
    }

    /// Looks up several relays under a single lock acquisition. Unknown ids are skipped.
    pub async fn get_many<'a, I>(&self, relay_ids: I) -> Vec<AuthenticatedRelay>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let inner = self.0.lock().await;
        relay_ids
            .into_iter()
            .filter_map(|relay_id| inner.get(relay_id).cloned())
            .collect()
    }

    pub async fn len(&self) -> usize {
        let inner = self.0.lock().await;
        inner.len()
    }

    /// Forgets every authenticated relay. Relays have to register again afterwards.
    pub async fn clear(&self) {
        let mut inner = self.0.lock().await;
        inner.clear();
    }
}
