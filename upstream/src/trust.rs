//! Trust evaluation between relays and projects.

use crate::{project_configs::ProjectConfig, relay_registry::RelayRegistryEntry};

/// Decides whether `relay` may see the configuration of a project.
///
/// Internal relays are trusted for every project, including unknown ones.
/// Any other relay must appear in the project's `trustedRelays` allowlist.
pub fn is_trusted(relay: &RelayRegistryEntry, project_config: Option<&ProjectConfig>) -> bool {
    if relay.internal {
        return true;
    }
    match project_config {
        Some(config) => config.trusted_relays().contains(&relay.relay_id),
        None => false,
    }
}
