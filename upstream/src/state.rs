//! Shared state of a mock upstream instance.

use crate::{
    authenticated_relays::AuthenticatedRelays,
    config::MockConfig,
    config_service::ConfigService,
    failures::TestFailures,
    hits::HitCounter,
    ingestion::{CapturedEvents, IngestService},
    project_configs::ProjectConfigs,
    public_key_service::PublicKeyService,
    registration::RegistrationService,
    relay_registry::RelayRegistry,
};

/// Everything a request handler needs. Cloning is cheap; all clones share the
/// same stores.
#[derive(Clone)]
pub struct ServerState {
    config: MockConfig,
    registry: RelayRegistry,
    authenticated_relays: AuthenticatedRelays,
    project_configs: ProjectConfigs,
    hits: HitCounter,
    failures: TestFailures,

    registration: RegistrationService,
    configs: ConfigService,
    public_keys: PublicKeyService,
    ingest: IngestService,
}

impl ServerState {
    /// Creates empty stores and the consumer end of the capture queue.
    pub fn new(config: MockConfig) -> (Self, CapturedEvents) {
        let (captured_sender, captured_receiver) = crossbeam_channel::unbounded();

        let registry = RelayRegistry::new();
        let authenticated_relays = AuthenticatedRelays::default();
        let project_configs = ProjectConfigs::new();
        let failures = TestFailures::default();

        let state = Self {
            registration: RegistrationService::new(registry.clone(), authenticated_relays.clone()),
            configs: ConfigService::new(project_configs.clone(), authenticated_relays.clone()),
            public_keys: PublicKeyService::new(authenticated_relays.clone()),
            ingest: IngestService::new(&config, captured_sender, failures.clone()),
            config,
            registry,
            authenticated_relays,
            project_configs,
            hits: HitCounter::default(),
            failures,
        };
        (state, CapturedEvents::new(captured_receiver))
    }

    pub fn config(&self) -> &MockConfig {
        &self.config
    }

    pub fn registry(&self) -> &RelayRegistry {
        &self.registry
    }

    pub fn authenticated_relays(&self) -> &AuthenticatedRelays {
        &self.authenticated_relays
    }

    pub fn project_configs(&self) -> &ProjectConfigs {
        &self.project_configs
    }

    pub fn hits(&self) -> &HitCounter {
        &self.hits
    }

    pub fn failures(&self) -> &TestFailures {
        &self.failures
    }

    pub fn registration(&self) -> &RegistrationService {
        &self.registration
    }

    pub fn configs(&self) -> &ConfigService {
        &self.configs
    }

    pub fn public_keys(&self) -> &PublicKeyService {
        &self.public_keys
    }

    pub fn ingest(&self) -> &IngestService {
        &self.ingest
    }

    /// Forgets all authenticated relays so that they have to register again.
    pub async fn reset_authentication(&self) {
        self.authenticated_relays.clear().await;
    }
}
