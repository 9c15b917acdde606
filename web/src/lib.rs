//! HTTP surface of mini-sentry.
//!
//! [`router`] exposes the relay-facing API over a shared
//! [`ServerState`](mini_sentry_upstream::ServerState). [`start_web_server`] runs
//! it until a shutdown future resolves, and [`MiniSentry`] wraps both into a
//! handle for integration tests.

mod harness;
pub mod routes;

use std::{future::Future, io, net::SocketAddr};

use axum::Router;
use log::*;
use mini_sentry_upstream::ServerState;
use tokio::net::TcpListener;

pub use harness::MiniSentry;
pub use routes::{router, router_with};

/// Binds `addr` and serves the relay API until `shutdown` resolves.
pub async fn start_web_server<F>(state: ServerState, addr: SocketAddr, shutdown: F) -> io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind(addr).await?;
    serve(listener, state, shutdown).await
}

/// Serves the relay API on an already bound listener.
pub async fn serve<F>(listener: TcpListener, state: ServerState, shutdown: F) -> io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    serve_router(listener, router(state), shutdown).await
}

async fn serve_router<F>(listener: TcpListener, app: Router, shutdown: F) -> io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    info!("mini-sentry listening on {}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
}
