//! HTTP surface for the integrity ledger.

pub mod handlers;

use axum::{
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::integrity::IntegrityService;

#[derive(Clone)]
pub struct AppState {
    pub service: IntegrityService,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/status", get(handlers::status_endpoint))
        .route("/api/patients/:patient_id/hash", post(handlers::record_hash))
        .route("/api/patients/:patient_id/verify", post(handlers::verify))
        .route("/api/patients/:patient_id/hashes", get(handlers::history))
        .route("/api/patients/:patient_id/hashes/latest", get(handlers::latest))
        .route("/api/admin/hashes", get(handlers::list_hashes))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .into_inner(),
        )
        .with_state(state)
}
