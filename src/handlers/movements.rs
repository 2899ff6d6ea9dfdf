use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use utoipa::IntoParams;
use uuid::Uuid;

use super::common::{envelope, ApiJson, ApiQuery};
use crate::errors::ServiceError;
use crate::services::ledger::{MovementFilter, MovementView, Reconciliation};
use crate::services::movements::{
    CorrectMovementRequest, MovementReceipt, RecordMovementRequest, ReverseMovementRequest,
};
use crate::AppState;

#[derive(Debug, Clone, Deserialize, Serialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ReconciliationQuery {
    pub location_id: Uuid,
    pub card_type_id: Uuid,
}

/// List ledger rows, newest first
#[utoipa::path(
    get,
    path = "/api/v1/movements",
    params(MovementFilter),
    responses(
        (status = 200, description = "Ledger rows with the acting user joined", body = [MovementView],
            headers(("X-Request-Id" = String, description = "Unique request id"))
        ),
        (status = 400, description = "Invalid filter", body = crate::errors::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse)
    ),
    tag = "movements"
)]
pub async fn list_movements(
    State(state): State<AppState>,
    ApiQuery(filter): ApiQuery<MovementFilter>,
) -> Result<Json<Vec<MovementView>>, ServiceError> {
    Ok(Json(state.services.movements.list(filter).await?))
}

/// Record an entry, withdrawal or transfer of one or more card types
#[utoipa::path(
    post,
    path = "/api/v1/movements",
    request_body = RecordMovementRequest,
    responses(
        (status = 201, description = "All line items committed", body = MovementReceipt,
            headers(("X-Request-Id" = String, description = "Unique request id"))
        ),
        (status = 400, description = "Malformed request or missing location", body = crate::errors::ErrorResponse),
        (status = 404, description = "Unknown user, location or card type", body = crate::errors::ErrorResponse),
        (status = 422, description = "Insufficient stock; nothing committed", body = crate::errors::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse)
    ),
    tag = "movements"
)]
pub async fn record_movement(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<RecordMovementRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let receipt = state.services.movements.record(payload).await?;
    Ok(envelope(
        StatusCode::CREATED,
        "Movement recorded successfully",
        receipt,
    ))
}

/// Correct a committed row; a quantity change is re-applied to stock
#[utoipa::path(
    patch,
    path = "/api/v1/movements",
    request_body = CorrectMovementRequest,
    responses(
        (status = 200, description = "Row corrected", body = crate::entities::movement::Model),
        (status = 400, description = "Locked field or invalid value", body = crate::errors::ErrorResponse),
        (status = 404, description = "Movement not found", body = crate::errors::ErrorResponse),
        (status = 422, description = "Correction would drive stock negative", body = crate::errors::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse)
    ),
    tag = "movements"
)]
pub async fn correct_movement(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<CorrectMovementRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let updated = state.services.movements.correct(payload).await?;
    Ok(envelope(StatusCode::OK, "Movement updated", updated))
}

/// Reverse a committed row's stock effect and remove it
#[utoipa::path(
    delete,
    path = "/api/v1/movements",
    request_body = ReverseMovementRequest,
    responses(
        (status = 200, description = "Row reversed and removed"),
        (status = 404, description = "Movement not found", body = crate::errors::ErrorResponse),
        (status = 422, description = "Reversal would drive stock negative", body = crate::errors::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse)
    ),
    tag = "movements"
)]
pub async fn reverse_movement(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<ReverseMovementRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    state.services.movements.reverse(payload.id).await?;
    Ok(envelope(
        StatusCode::OK,
        "Movement deleted",
        serde_json::json!({ "id": payload.id }),
    ))
}

/// Ledger balance against the stored counter for one location and card type
#[utoipa::path(
    get,
    path = "/api/v1/movements/reconciliation",
    params(ReconciliationQuery),
    responses(
        (status = 200, description = "Reconciliation result", body = Reconciliation),
        (status = 400, description = "Missing or invalid ids", body = crate::errors::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse)
    ),
    tag = "movements"
)]
pub async fn reconcile(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ReconciliationQuery>,
) -> Result<Json<Reconciliation>, ServiceError> {
    Ok(Json(
        state
            .services
            .movements
            .reconcile(query.location_id, query.card_type_id)
            .await?,
    ))
}
