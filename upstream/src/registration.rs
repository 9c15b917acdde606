//! Relay registration handshake.
//!
//! ## Handshake
//! 1. **Challenge**: the relay posts its id and public key. If the id is in the
//!    registry, the relay is authenticated immediately and receives a token.
//! 2. **Response**: the relay confirms; this only succeeds for relays that are
//!    already authenticated.
//!
//! The token is informational. No signature over it is ever checked, so the
//! second step carries no proof of its own.

use log::*;
use rand::{distributions::Alphanumeric, Rng};

use crate::{
    authenticated_relays::{AuthenticatedRelay, AuthenticatedRelays},
    error::MockError,
    protocol::{ChallengeRequest, ChallengeResponse, ChallengeResponseRequest, RegisterResponse},
    relay_registry::RelayRegistry,
};

/// Length of the random challenge token.
const CHALLENGE_TOKEN_LEN: usize = 32;

#[derive(Clone)]
pub struct RegistrationService {
    registry: RelayRegistry,
    authenticated_relays: AuthenticatedRelays,
}

impl RegistrationService {
    pub fn new(registry: RelayRegistry, authenticated_relays: AuthenticatedRelays) -> Self {
        Self {
            registry,
            authenticated_relays,
        }
    }

    /// First step: authenticates a known relay and hands out a challenge token.
    pub async fn get_challenge(
        &self,
        request: ChallengeRequest,
        header_relay_id: Option<&str>,
    ) -> Result<ChallengeResponse, MockError> {
        check_relay_id_header(&request.relay_id, header_relay_id)?;

        let entry = self
            .registry
            .get(&request.relay_id)
            .ok_or_else(|| MockError::UnknownRelay {
                relay_id: request.relay_id.clone(),
            })?;

        if entry.public_key != request.public_key {
            warn!(
                "relay {} registered with public key {} but the registry has {}",
                request.relay_id, request.public_key, entry.public_key
            );
        }

        self.authenticated_relays
            .insert(AuthenticatedRelay::new(entry))
            .await;
        info!("relay {} authenticated", request.relay_id);

        Ok(ChallengeResponse {
            token: generate_challenge_token(),
            relay_id: request.relay_id,
        })
    }

    /// Second step: confirms that the relay is authenticated.
    pub async fn check_challenge(
        &self,
        request: ChallengeResponseRequest,
        header_relay_id: Option<&str>,
    ) -> Result<RegisterResponse, MockError> {
        check_relay_id_header(&request.relay_id, header_relay_id)?;

        if !self.authenticated_relays.contains(&request.relay_id).await {
            return Err(MockError::Unregistered {
                relay_id: Some(request.relay_id),
            });
        }

        debug!("relay {} completed registration", request.relay_id);
        Ok(RegisterResponse {
            relay_id: request.relay_id,
        })
    }
}

fn check_relay_id_header(body_relay_id: &str, header_relay_id: Option<&str>) -> Result<(), MockError> {
    if header_relay_id == Some(body_relay_id) {
        Ok(())
    } else {
        Err(MockError::ProtocolMismatch {
            header: header_relay_id.map(str::to_owned),
            body: body_relay_id.to_owned(),
        })
    }
}

fn generate_challenge_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(CHALLENGE_TOKEN_LEN)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use crate::{
        authenticated_relays::AuthenticatedRelays,
        error::MockError,
        protocol::{ChallengeRequest, ChallengeResponseRequest},
        registration::RegistrationService,
        relay_registry::{RelayRegistry, RelayRegistryEntry},
    };

    fn service() -> (RegistrationService, AuthenticatedRelays) {
        let registry = RelayRegistry::from_iter([
            RelayRegistryEntry::new("relayA", "key-a"),
            RelayRegistryEntry::new("relayI", "key-i").internal(),
        ]);
        let authenticated = AuthenticatedRelays::default();
        (
            RegistrationService::new(registry, authenticated.clone()),
            authenticated,
        )
    }

    fn challenge(relay_id: &str) -> ChallengeRequest {
        ChallengeRequest {
            relay_id: relay_id.to_owned(),
            public_key: format!("key-{relay_id}"),
        }
    }

    #[tokio::test]
    async fn test_unknown_relays_are_rejected() {
        let (service, authenticated) = service();
        for relay_id in ["relayB", "", "RELAYA", "relayA "] {
            let err = service
                .get_challenge(challenge(relay_id), Some(relay_id))
                .await
                .unwrap_err();
            assert!(matches!(err, MockError::UnknownRelay { .. }), "{relay_id:?}");
        }
        assert_eq!(authenticated.len().await, 0);
    }

    #[tokio::test]
    async fn test_challenge_then_response() {
        let (service, authenticated) = service();

        let response = service
            .get_challenge(challenge("relayA"), Some("relayA"))
            .await
            .unwrap();
        assert_eq!(response.relay_id, "relayA");
        assert_eq!(response.token.len(), 32);

        let relay = authenticated.get("relayA").await.unwrap();
        assert_eq!(relay.registry_entry.public_key, "key-a");
        assert!(!relay.is_internal());

        let confirmed = service
            .check_challenge(
                ChallengeResponseRequest {
                    relay_id: "relayA".to_owned(),
                },
                Some("relayA"),
            )
            .await
            .unwrap();
        assert_eq!(confirmed.relay_id, "relayA");
    }

    #[tokio::test]
    async fn test_header_mismatch_always_fails() {
        let (service, _) = service();

        for header in [Some("relayB"), Some("relayI"), None] {
            let err = service
                .get_challenge(challenge("relayA"), header)
                .await
                .unwrap_err();
            assert!(matches!(err, MockError::ProtocolMismatch { .. }));
        }

        // still fails once the relay is authenticated
        service
            .get_challenge(challenge("relayA"), Some("relayA"))
            .await
            .unwrap();
        let err = service
            .check_challenge(
                ChallengeResponseRequest {
                    relay_id: "relayA".to_owned(),
                },
                Some("relayI"),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, MockError::ProtocolMismatch { .. }));
    }

    #[tokio::test]
    async fn test_response_requires_challenge() {
        let (service, _) = service();
        let err = service
            .check_challenge(
                ChallengeResponseRequest {
                    relay_id: "relayA".to_owned(),
                },
                Some("relayA"),
            )
            .await
            .unwrap_err();
        assert_eq!(
            err,
            MockError::Unregistered {
                relay_id: Some("relayA".to_owned())
            }
        );
    }

    #[tokio::test]
    async fn test_reregistration_after_reset() {
        let (service, authenticated) = service();
        service
            .get_challenge(challenge("relayI"), Some("relayI"))
            .await
            .unwrap();
        authenticated.clear().await;

        service
            .get_challenge(challenge("relayI"), Some("relayI"))
            .await
            .unwrap();
        service
            .get_challenge(challenge("relayI"), Some("relayI"))
            .await
            .unwrap();
        assert_eq!(authenticated.len().await, 1);
        assert!(authenticated.get("relayI").await.unwrap().is_internal());
    }
}
