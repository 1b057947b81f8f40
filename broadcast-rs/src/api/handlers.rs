//! API request handlers

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use crate::admission::{Action, AdmissionController, AuthorizationResult};
use crate::dispatch::{
    BatchDispatcher, BulkOperation, BulkOperationSpec, DestinationRef, DispatchLimits,
    OperationKind,
};
use crate::error::EngineError;
use crate::ledger::{LedgerRecord, OperationLedger, Page};
use crate::tiers::{TierCatalog, TierDefinition};

/// Shared application state
pub struct AppState {
    pub catalog: Arc<TierCatalog>,
    pub admission: Arc<AdmissionController>,
    pub dispatcher: BatchDispatcher,
    pub ledger: Arc<OperationLedger>,
}

/// Response with error details
#[derive(Serialize)]
pub struct ApiError {
    pub error: String,
}

type HandlerError = (StatusCode, Json<ApiError>);

fn error_response(status: StatusCode, message: impl Into<String>) -> HandlerError {
    (
        status,
        Json(ApiError {
            error: message.into(),
        }),
    )
}

fn owner_from_headers(headers: &HeaderMap) -> Result<String, HandlerError> {
    headers
        .get("x-owner-id")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .ok_or_else(|| error_response(StatusCode::UNAUTHORIZED, "Missing X-Owner-Id header"))
}

/// GET /health
pub async fn health() -> &'static str {
    "OK"
}

/// GET /api/tiers - List the tier catalog
pub async fn list_tiers(State(state): State<Arc<AppState>>) -> Json<Vec<TierDefinition>> {
    Json(state.catalog.iter().cloned().collect())
}

/// Authorization request body
#[derive(Deserialize)]
pub struct AuthorizeRequest {
    pub subject_id: String,
    pub tier: Option<String>,
    pub action: Action,
}

/// POST /api/authorize - Admission check for one action
pub async fn authorize(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AuthorizeRequest>,
) -> Json<AuthorizationResult> {
    let result = state
        .admission
        .authorize(&request.subject_id, request.tier.as_deref(), request.action)
        .await;

    debug!(
        "authorize {} for {}: allowed={}",
        request.action.command(),
        request.subject_id,
        result.allowed
    );
    Json(result)
}

/// Bulk submission request body
#[derive(Deserialize)]
pub struct SubmitRequest {
    pub tier: Option<String>,
    pub kind: OperationKind,
    pub destinations: Vec<DestinationRef>,
    pub content: String,
}

#[derive(Serialize)]
pub struct SubmitResponse {
    pub operation_id: String,
}

/// POST /api/operations - Submit a bulk operation
pub async fn submit_operation(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<SubmitRequest>,
) -> Result<Json<SubmitResponse>, HandlerError> {
    let owner_id = owner_from_headers(&headers)?;

    // Bulk fan-out is gated as a whole; per-destination limits are enforced
    // again at submission by the dispatcher
    let admission = state
        .admission
        .authorize(&owner_id, request.tier.as_deref(), Action::BulkPost)
        .await;
    if !admission.allowed {
        let mut message = admission
            .message
            .unwrap_or_else(|| "bulk posting not available".to_string());
        if let Some(hint) = admission.upgrade_hint {
            message = format!("{} (upgrade to {})", message, hint);
        }
        return Err(error_response(StatusCode::FORBIDDEN, message));
    }

    let tier = state.catalog.resolve(request.tier.as_deref());
    let limits = DispatchLimits::from_tier(tier);
    let spec = BulkOperationSpec {
        owner_id,
        kind: request.kind,
        destinations: request.destinations,
        content: request.content,
    };

    match state.dispatcher.submit(spec, limits).await {
        Ok(operation_id) => Ok(Json(SubmitResponse { operation_id })),
        Err(e @ EngineError::DestinationLimit { .. }) => {
            Err(error_response(StatusCode::UNPROCESSABLE_ENTITY, e.to_string()))
        }
        Err(EngineError::Engine(message)) => {
            Err(error_response(StatusCode::BAD_REQUEST, message))
        }
        Err(e) => Err(error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            e.to_string(),
        )),
    }
}

/// GET /api/operations/:id - Live operation snapshot
pub async fn get_operation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<BulkOperation>, HandlerError> {
    state
        .dispatcher
        .get_status(&id)
        .await
        .map(Json)
        .ok_or_else(|| error_response(StatusCode::NOT_FOUND, format!("Operation not found: {}", id)))
}

/// POST /api/operations/:id/cancel - Cooperative cancellation
pub async fn cancel_operation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<StatusCode, HandlerError> {
    let owner_id = owner_from_headers(&headers)?;

    match state.dispatcher.request_cancel(&id, &owner_id).await {
        Ok(()) => Ok(StatusCode::ACCEPTED),
        Err(EngineError::NotFound(_)) => Err(error_response(
            StatusCode::NOT_FOUND,
            format!("Operation not found: {}", id),
        )),
        Err(EngineError::Unauthorized(message)) => {
            Err(error_response(StatusCode::FORBIDDEN, message))
        }
        Err(e) => Err(error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            e.to_string(),
        )),
    }
}

/// History pagination query
#[derive(Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// GET /api/operations - Operation history for the calling owner
pub async fn list_operations(
    State(state): State<Arc<AppState>>,
    Query(query): Query<HistoryQuery>,
    headers: HeaderMap,
) -> Result<Json<Vec<LedgerRecord>>, HandlerError> {
    let owner_id = owner_from_headers(&headers)?;
    let defaults = Page::default();
    let page = Page {
        limit: query.limit.unwrap_or(defaults.limit),
        offset: query.offset.unwrap_or(defaults.offset),
    };

    state
        .ledger
        .query_by_owner(&owner_id, page)
        .await
        .map(Json)
        .map_err(|e| error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}
