//! Mock upstream for relays under test.
//!
//! This crate holds everything a relay talks to when it connects upstream,
//! minus the HTTP layer.
//!
//! ## Main Components
//!
//! ### Registration
//! - **relay_registry**: relays the test driver declared as known
//! - **authenticated_relays**: relays that completed the handshake
//! - **registration**: the challenge/response handshake itself
//!
//! ### Configuration Distribution
//! - **project_configs**: per-project configs, keyed by project id
//! - **trust**: decides which relay may see which project config
//! - **config_service**: public key to project id resolution and batched config fetches
//! - **public_key_service**: relay public key exchange
//!
//! ### Ingestion
//! - **ingestion**: store endpoint semantics and the capture queue
//! - **failures**: protocol violations deferred to test teardown
//! - **hits**: per-route request counters
//!
//! ## Deferred Failures
//!
//! A relay that misbehaves while forwarding events must not be blocked, or
//! the test would hang waiting for a retry. Such requests are acknowledged and
//! the violation is recorded in [`failures::TestFailures`]; the test driver
//! checks the list at teardown.

pub mod authenticated_relays;
pub mod config;
pub mod config_service;
pub mod error;
pub mod failures;
pub mod hits;
pub mod ingestion;
pub mod project_configs;
pub mod protocol;
pub mod public_key_service;
pub mod registration;
pub mod relay_registry;
pub mod state;
pub mod trust;

pub use config::{Fixtures, MockConfig};
pub use error::MockError;
pub use ingestion::{CapturedEnvelope, CapturedEvents};
pub use state::ServerState;
