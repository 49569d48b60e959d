pub mod utils;

use std::net::SocketAddr;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::http_server;
use crate::{ServiceConfig, ServiceState};

const FINAL_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);
const LOG_FILE_PREFIX: &str = "w3s.log";

/// Handle for gracefully shutting down the daemon service.
pub struct ShutdownHandle {
    graceful_waiter: JoinHandle<()>,
    handles: Vec<JoinHandle<()>>,
    shutdown_tx: watch::Sender<()>,
}

impl ShutdownHandle {
    /// Block until the service shuts down (via signal or explicit shutdown).
    pub async fn wait(self) {
        let _ = self.graceful_waiter.await;

        if timeout(FINAL_SHUTDOWN_TIMEOUT, join_all(self.handles))
            .await
            .is_err()
        {
            tracing::error!(
                "Failed to shut down within {} seconds",
                FINAL_SHUTDOWN_TIMEOUT.as_secs()
            );
            std::process::exit(4);
        }
    }

    /// Trigger shutdown programmatically.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }
}

fn env_filter(level: tracing::Level) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(level).into())
        .from_env_lossy()
}

/// Stdout always, plus a daily rolling file when `log_dir` is set.
///
/// The returned guards flush the writers on drop and must outlive the service.
fn init_logging(service_config: &ServiceConfig) -> Vec<WorkerGuard> {
    let mut guards = Vec::new();

    let (stdout_writer, stdout_guard) = tracing_appender::non_blocking(std::io::stdout());
    guards.push(stdout_guard);
    let stdout_layer = tracing_subscriber::fmt::layer()
        .compact()
        .with_writer(stdout_writer)
        .with_filter(env_filter(service_config.log_level));

    let file_layer = service_config.log_dir.as_ref().map(|log_dir| {
        if let Err(e) = std::fs::create_dir_all(log_dir) {
            eprintln!(
                "Warning: Failed to create log directory {:?}: {}",
                log_dir, e
            );
        }
        let appender = tracing_appender::rolling::daily(log_dir, LOG_FILE_PREFIX);
        let (file_writer, file_guard) = tracing_appender::non_blocking(appender);
        guards.push(file_guard);

        tracing_subscriber::fmt::layer()
            .with_writer(file_writer)
            .with_ansi(false)
            .with_span_events(FmtSpan::CLOSE)
            .with_filter(env_filter(service_config.log_level))
    });

    tracing_subscriber::registry()
        .with(stdout_layer)
        .with(file_layer)
        .init();

    utils::register_panic_logger();
    utils::report_build_info();

    guards
}

/// Forward the first shutdown signal to `cancel`, aborting in-flight uploads.
fn spawn_cancel_bridge(
    mut shutdown_rx: watch::Receiver<()>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let _ = shutdown_rx.changed().await;
        tracing::debug!("cancelling in-flight uploads");
        cancel.cancel();
    })
}

/// Create state and spawn the HTTP server, returning the state handle.
///
/// Exits the process when signal handlers cannot be installed or the
///  configuration does not produce a usable state.
pub async fn start_service(service_config: &ServiceConfig) -> (ServiceState, ShutdownHandle) {
    let (graceful_waiter, shutdown_tx, shutdown_rx) = match utils::graceful_shutdown_blocker() {
        Ok(blocker) => blocker,
        Err(e) => {
            tracing::error!("failed to install signal handlers: {}", e);
            std::process::exit(2);
        }
    };
    let state = match ServiceState::from_config(service_config).await {
        Ok(state) => state,
        Err(e) => {
            tracing::error!("error creating server state: {}", e);
            std::process::exit(3);
        }
    };

    let cancel_handle = spawn_cancel_bridge(shutdown_rx.clone(), state.shutdown().clone());

    let api_addr = SocketAddr::from(([0, 0, 0, 0], service_config.api_port));
    let api_config = http_server::Config::new(api_addr, service_config.max_file_size);
    let api_state = state.clone();
    let api_handle = tokio::spawn(async move {
        if let Err(e) = http_server::run_api(api_config, api_state, shutdown_rx).await {
            tracing::error!("API server error: {}", e);
        }
    });

    tracing::info!(port = service_config.api_port, "Running: API + local gateway");

    let handle = ShutdownHandle {
        graceful_waiter,
        handles: vec![cancel_handle, api_handle],
        shutdown_tx,
    };
    (state, handle)
}

/// Runs the daemon until a shutdown signal arrives. Use for CLI binary usage.
pub async fn spawn_service(service_config: &ServiceConfig) {
    let _guards = init_logging(service_config);
    let (_, handle) = start_service(service_config).await;
    handle.wait().await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_cancel_bridge_fires_on_shutdown() {
        let (tx, rx) = watch::channel(());
        let cancel = CancellationToken::new();
        let bridge = spawn_cancel_bridge(rx, cancel.clone());
        assert!(!cancel.is_cancelled());

        tx.send(()).unwrap();
        bridge.await.unwrap();
        assert!(cancel.is_cancelled());
    }
}
