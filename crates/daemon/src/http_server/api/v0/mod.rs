use axum::routing::{get, post};
use axum::Router;

pub mod error;
pub mod identity;
pub mod retrieve;
pub mod upload;

use crate::ServiceState;

pub fn router(state: ServiceState) -> Router<ServiceState> {
    Router::new()
        .route("/upload", post(upload::handler))
        .route("/retrieve", post(retrieve::handler))
        .route("/identity", get(identity::handler))
        .with_state(state)
}
