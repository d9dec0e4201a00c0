use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info, warn};

use crate::api::AppState;
use crate::audit::AuditContext;
use crate::error::IntegrityError;

pub const DEFAULT_PAGE_SIZE: i64 = 20;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub verified: Option<bool>,
}

/// Actor id from `x-actor-id`, client address from the first
/// `x-forwarded-for` hop.
pub fn audit_context(headers: &HeaderMap) -> AuditContext {
    let actor_id = headers
        .get("x-actor-id")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok());

    let source_ip = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());

    AuditContext {
        actor_id,
        source_ip,
    }
}

pub fn error_response(patient_id: Option<i64>, err: IntegrityError) -> (StatusCode, Json<Value>) {
    let status = match &err {
        e if e.is_not_found() => StatusCode::NOT_FOUND,
        IntegrityError::Conflict(_) => StatusCode::CONFLICT,
        IntegrityError::ValidationError(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };

    if status.is_server_error() {
        error!("Integrity request failed: {}", err);
    } else {
        warn!("Integrity request rejected: {}", err);
    }

    (
        status,
        Json(json!({
            "success": false,
            "error": err.to_string(),
            "patient_id": patient_id,
        })),
    )
}

pub async fn record_hash(
    State(state): State<AppState>,
    Path(patient_id): Path<i64>,
    headers: HeaderMap,
) -> (StatusCode, Json<Value>) {
    info!("Recording integrity hash for patient {}", patient_id);
    let context = audit_context(&headers);

    match state.service.record_hash(patient_id, &context).await {
        Ok(record) => (
            StatusCode::CREATED,
            Json(json!({
                "success": true,
                "patient_id": patient_id,
                "hash": record.entry.data_hash,
                "block_hash": record.entry.block_hash,
                "timestamp": record.entry.created_at,
                "external_submission": record.external_submission,
            })),
        ),
        Err(e) => error_response(Some(patient_id), e),
    }
}

pub async fn verify(
    State(state): State<AppState>,
    Path(patient_id): Path<i64>,
    headers: HeaderMap,
) -> (StatusCode, Json<Value>) {
    let context = audit_context(&headers);

    match state.service.verify(patient_id, &context).await {
        Ok(report) => {
            let result = &report.result;
            (
                StatusCode::OK,
                Json(json!({
                    "patient_id": patient_id,
                    "current_hash": result.current_hash,
                    "original_snapshot_hash": result.baseline_hash,
                    "is_verified": result.is_verified,
                    "status": result.status,
                    "has_tampering": result.has_tampering,
                    "original_snapshot_timestamp": result.baseline_timestamp,
                    "verification_timestamp": result.verification_timestamp,
                    "message": result.message(),
                    "external_verification": report.external_verification,
                })),
            )
        }
        Err(e) => error_response(Some(patient_id), e),
    }
}

pub async fn history(
    State(state): State<AppState>,
    Path(patient_id): Path<i64>,
    headers: HeaderMap,
) -> (StatusCode, Json<Value>) {
    let context = audit_context(&headers);

    match state.service.history(patient_id, &context).await {
        Ok(history) => (
            StatusCode::OK,
            Json(json!({
                "patient_id": patient_id,
                "total": history.entries.len(),
                "hashes": history.entries,
                "timeline": true,
                "chain_valid": history.chain.valid,
                "external_history": history.external,
            })),
        ),
        Err(e) => error_response(Some(patient_id), e),
    }
}

pub async fn latest(
    State(state): State<AppState>,
    Path(patient_id): Path<i64>,
) -> (StatusCode, Json<Value>) {
    match state.service.latest(patient_id).await {
        Ok(entry) => (StatusCode::OK, Json(json!(entry))),
        Err(e) => error_response(Some(patient_id), e),
    }
}

pub async fn list_hashes(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> (StatusCode, Json<Value>) {
    let page = query.page.unwrap_or(1);
    let per_page = query.per_page.unwrap_or(DEFAULT_PAGE_SIZE);

    match state.service.list(page, per_page, query.verified).await {
        Ok(listing) => (
            StatusCode::OK,
            Json(json!({
                "hashes": listing.entries,
                "total": listing.total,
                "page": listing.page,
                "per_page": listing.per_page,
                "total_pages": listing.total_pages,
                "verified": query.verified,
            })),
        ),
        Err(e) => error_response(None, e),
    }
}

pub async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": "integrity-ledger",
        "timestamp": chrono::Utc::now()
    }))
}

pub async fn status_endpoint(State(state): State<AppState>) -> Json<Value> {
    let mut status = json!({
        "status": "healthy",
        "service": "integrity-ledger",
        "timestamp": chrono::Utc::now(),
        "ledger_mode": state.service.ledger_mode(),
    });

    match sqlx::query("SELECT 1")
        .execute(state.service.database().pool())
        .await
    {
        Ok(_) => status["database"] = json!({ "status": "healthy" }),
        Err(e) => {
            warn!("Database health probe failed: {}", e);
            status["database"] = json!({ "status": "error" });
        }
    }

    Json(status)
}
