//! Public-key exchange between relays.
//!
//! Any authenticated relay may look up the keys of other authenticated relays;
//! no project trust is involved.

use log::*;

use crate::{
    authenticated_relays::AuthenticatedRelays,
    error::MockError,
    protocol::{PublicKeysRequest, PublicKeysResponse},
};

#[derive(Clone)]
pub struct PublicKeyService {
    authenticated_relays: AuthenticatedRelays,
}

impl PublicKeyService {
    pub fn new(authenticated_relays: AuthenticatedRelays) -> Self {
        Self {
            authenticated_relays,
        }
    }

    /// Returns the public keys and registry entries of the requested relays.
    /// Relays that are not authenticated are left out.
    pub async fn public_keys(
        &self,
        header_relay_id: Option<&str>,
        request: PublicKeysRequest,
    ) -> Result<PublicKeysResponse, MockError> {
        let authenticated = match header_relay_id {
            Some(relay_id) => self.authenticated_relays.contains(relay_id).await,
            None => false,
        };
        if !authenticated {
            return Err(MockError::Unregistered {
                relay_id: header_relay_id.map(str::to_owned),
            });
        }

        let found = self
            .authenticated_relays
            .get_many(request.relay_ids.iter().map(String::as_str))
            .await;
        debug!(
            "resolved {} of {} requested relay keys",
            found.len(),
            request.relay_ids.len()
        );

        let mut response = PublicKeysResponse::default();
        for relay in found {
            response
                .public_keys
                .insert(relay.relay_id.clone(), relay.registry_entry.public_key.clone());
            response.relays.insert(relay.relay_id, relay.registry_entry);
        }
        Ok(response)
    }
}
