use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    path::PathBuf,
    process,
    thread::{self, JoinHandle},
};

use clap::Parser;
use env_logger::Env;
use log::*;
use mini_sentry_upstream::{
    config::{DEFAULT_DSN_PUBLIC_KEY, DEFAULT_INTERNAL_ERROR_PROJECT_ID, DEFAULT_STORE_PROJECT_ID},
    CapturedEvents, Fixtures, MockConfig, ServerState,
};
use mini_sentry_web::start_web_server;
use tokio::{runtime::Builder, signal};

/// Mock upstream for relay integration tests.
///
/// Serves the registration, project config, public key and store endpoints
/// a relay talks to. Envelopes sent to the store project are logged; protocol
/// violations are collected and reported at exit, with a non-zero status.
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// IP address to bind the HTTP server to.
    #[arg(long, env, default_value_t = IpAddr::V4(Ipv4Addr::LOCALHOST))]
    bind_ip: IpAddr,

    /// Port to bind the HTTP server to. 0 picks an ephemeral port.
    #[arg(long, env, default_value_t = 3001)]
    port: u16,

    /// YAML or JSON file with the known relays and project configs.
    #[arg(long, env)]
    fixtures: Option<PathBuf>,

    /// Project whose events are captured.
    #[arg(long, env, default_value_t = DEFAULT_STORE_PROJECT_ID)]
    store_project_id: u64,

    /// Project that turns every event it receives into a failure.
    #[arg(long, env, default_value_t = DEFAULT_INTERNAL_ERROR_PROJECT_ID)]
    internal_error_project_id: u64,

    /// Public key used in the DSNs of the two projects above.
    #[arg(long, env, default_value = DEFAULT_DSN_PUBLIC_KEY)]
    dsn_public_key: String,
}

fn main() {
    env_logger::Builder::from_env(Env::new().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let args: Args = Args::parse();
    info!("args: {:?}", args);

    let config = MockConfig {
        store_project_id: args.store_project_id,
        internal_error_project_id: args.internal_error_project_id,
        dsn_public_key: args.dsn_public_key,
    };
    let (state, captured) = ServerState::new(config);

    if let Some(path) = &args.fixtures {
        match Fixtures::from_path(path) {
            Ok(fixtures) => fixtures.apply(&state),
            Err(e) => {
                error!("{e}");
                process::exit(2);
            }
        }
    }

    let consumer = match spawn_captured_events_logger(captured) {
        Ok(consumer) => consumer,
        Err(e) => {
            error!("failed to spawn captured events thread: {e}");
            process::exit(2);
        }
    };

    let rt = match Builder::new_multi_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            error!("failed to build tokio runtime: {e}");
            process::exit(2);
        }
    };

    let addr = SocketAddr::new(args.bind_ip, args.port);
    let failures = state.failures().clone();
    if let Err(e) = rt.block_on(start_web_server(state, addr, shutdown_signal())) {
        error!("mini-sentry server on {addr} failed: {e}");
    }

    // dropping the runtime drops the last capture sender, which ends the consumer
    drop(rt);
    if consumer.join().is_err() {
        error!("captured events thread panicked");
    }

    if let Err(e) = failures.check() {
        error!("{e}");
        process::exit(1);
    }
    info!("mini-sentry stopped without failures");
}

/// Logs every captured envelope until the capture queue closes.
fn spawn_captured_events_logger(captured: CapturedEvents) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("captured-events".to_string())
        .spawn(move || {
            for event in captured.iter() {
                let envelope = &event.envelope;
                info!(
                    "captured envelope for project {}: event_id={:?} items={:?}",
                    event.project_id,
                    envelope.event_id(),
                    envelope.items().iter().map(|item| item.ty()).collect::<Vec<_>>()
                );
                if let Some(payload) = envelope.get_event() {
                    debug!("event payload: {payload}");
                }
            }
            debug!("capture queue closed");
        })
}

pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut terminate) => {
                terminate.recv().await;
            }
            Err(e) => {
                error!("failed to install signal handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    warn!("signal received, starting graceful shutdown");
}
