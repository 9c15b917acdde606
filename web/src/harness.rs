use std::{
    io,
    net::{Ipv4Addr, SocketAddr},
    thread,
    time::Duration,
};

use axum::Router;
use log::*;
use mini_sentry_upstream::{
    failures::{FailuresError, TestFailure},
    project_configs::{ProjectConfig, ProjectId},
    relay_registry::RelayRegistryEntry,
    CapturedEvents, MockConfig, ServerState,
};
use tokio::{
    net::TcpListener,
    sync::oneshot,
    task::JoinHandle,
};

use crate::{routes::router_with, serve_router};

/// How long [`MiniSentry::shutdown`] waits for in-flight requests.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// A mini-sentry instance on an ephemeral localhost port.
///
/// Call [`shutdown`](Self::shutdown) at the end of a test to surface recorded
/// failures. Dropping the handle with failures still pending panics.
pub struct MiniSentry {
    addr: SocketAddr,
    state: ServerState,
    captured: CapturedEvents,
    shutdown_sender: Option<oneshot::Sender<()>>,
    server: Option<JoinHandle<io::Result<()>>>,
}

impl MiniSentry {
    /// Starts serving on `127.0.0.1:0`. Must be called inside a tokio runtime.
    pub async fn spawn(config: MockConfig) -> io::Result<Self> {
        Self::spawn_with_routes(config, Router::new()).await
    }

    /// Like [`spawn`](Self::spawn), with `extra` routes served next to the
    /// relay API. Failures in those routes are recorded like any other.
    pub async fn spawn_with_routes(
        config: MockConfig,
        extra: Router<ServerState>,
    ) -> io::Result<Self> {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await?;
        let addr = listener.local_addr()?;

        let (state, captured) = ServerState::new(config);
        let app = router_with(extra, state.clone());
        let (shutdown_sender, shutdown_receiver) = oneshot::channel::<()>();
        let server = tokio::spawn(serve_router(listener, app, async move {
            let _ = shutdown_receiver.await;
        }));

        Ok(Self {
            addr,
            state,
            captured,
            shutdown_sender: Some(shutdown_sender),
            server: Some(server),
        })
    }

    /// Base URL, without a trailing slash.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// DSN pointing at the project whose events are captured.
    pub fn dsn(&self) -> String {
        self.dsn_for(self.state.config().store_project_id)
    }

    /// DSN pointing at the project that turns every event into a failure.
    pub fn internal_error_dsn(&self) -> String {
        self.dsn_for(self.state.config().internal_error_project_id)
    }

    fn dsn_for(&self, project_id: ProjectId) -> String {
        format!(
            "http://{}@{}/{}",
            self.state.config().dsn_public_key,
            self.addr,
            project_id
        )
    }

    pub fn state(&self) -> &ServerState {
        &self.state
    }

    pub fn add_known_relay(&self, entry: RelayRegistryEntry) {
        self.state.registry().insert(entry);
    }

    pub fn add_project_config(&self, config: ProjectConfig) {
        self.state.project_configs().insert(config);
    }

    /// Number of requests served on `route` (a route pattern, not a URL).
    pub fn get_hits(&self, route: &str) -> u64 {
        self.state.hits().get(route)
    }

    pub fn captured_events(&self) -> &CapturedEvents {
        &self.captured
    }

    pub fn test_failures(&self) -> Vec<TestFailure> {
        self.state.failures().snapshot()
    }

    /// Forgets every authenticated relay; relays must register again.
    pub async fn reset_authentication(&self) {
        self.state.reset_authentication().await;
    }

    /// Stops the server and reports the failures recorded during the test.
    pub async fn shutdown(mut self) -> Result<(), FailuresError> {
        if let Some(sender) = self.shutdown_sender.take() {
            let _ = sender.send(());
        }
        if let Some(server) = self.server.take() {
            match tokio::time::timeout(SHUTDOWN_TIMEOUT, server).await {
                Ok(Ok(Ok(()))) => {}
                Ok(Ok(Err(e))) => error!("mini-sentry server error: {e}"),
                Ok(Err(e)) => error!("mini-sentry server task failed: {e}"),
                Err(_) => warn!("mini-sentry did not shut down within {SHUTDOWN_TIMEOUT:?}"),
            }
        }
        self.state.failures().check()
    }
}

impl Drop for MiniSentry {
    fn drop(&mut self) {
        if let Some(sender) = self.shutdown_sender.take() {
            let _ = sender.send(());
        }
        if thread::panicking() {
            return;
        }
        if let Err(e) = self.state.failures().check() {
            panic!("{e}");
        }
    }
}
