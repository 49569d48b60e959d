use axum::extract::DefaultBodyLimit;
use axum::routing::get;
use axum::{Extension, Router};
use http::header::{ACCEPT, ORIGIN};
use http::Method;
use tokio::sync::watch;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tower_http::trace::{DefaultOnFailure, DefaultOnResponse};
use tower_http::LatencyUnit;

pub mod api;
mod config;
mod gateway;
mod handlers;
mod health;

pub use config::{encoded_body_limit, Config};

use crate::ServiceState;

const API_PREFIX: &str = "/api";
const GATEWAY_PREFIX: &str = "/ipfs";
const STATUS_PREFIX: &str = "/_status";

/// Every route the daemon serves, without the tracing layer.
pub fn router(config: Config, state: ServiceState) -> Router {
    // Gateway CORS (GET only) for gateway routes
    let gateway_cors = CorsLayer::new()
        .allow_methods(vec![Method::GET])
        .allow_headers(vec![ACCEPT, ORIGIN])
        .allow_origin(Any)
        .allow_credentials(false);

    let gateway_routes = Router::new()
        .route("/:root/*file_path", get(gateway::handler))
        .with_state(state.clone())
        .layer(gateway_cors);

    Router::new()
        .nest(STATUS_PREFIX, health::router(state.clone()))
        .nest(API_PREFIX, api::router(state.clone()))
        .nest(GATEWAY_PREFIX, gateway_routes)
        .fallback(handlers::not_found_handler)
        .layer(DefaultBodyLimit::max(config.body_limit))
        .layer(Extension(config))
        .with_state(state)
}

/// Run the HTTP server: /_status, /api and the /ipfs gateway on one port.
pub async fn run_api(
    config: Config,
    state: ServiceState,
    mut shutdown_rx: watch::Receiver<()>,
) -> Result<(), HttpServerError> {
    let listen_addr = config.listen_addr;
    let log_level = config.log_level;
    let trace_layer = TraceLayer::new_for_http()
        .on_response(
            DefaultOnResponse::new()
                .include_headers(false)
                .level(log_level)
                .latency_unit(LatencyUnit::Micros),
        )
        .on_failure(DefaultOnFailure::new().latency_unit(LatencyUnit::Micros));

    let router = router(config, state).layer(trace_layer);

    tracing::info!(addr = ?listen_addr, "API server listening");
    let listener = tokio::net::TcpListener::bind(listen_addr).await?;

    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.changed().await;
        })
        .await?;

    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum HttpServerError {
    #[error("an error occurred running the HTTP server: {0}")]
    ServingFailed(#[from] std::io::Error),
}
