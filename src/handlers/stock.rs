use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};

use super::common::{envelope, ApiQuery, ValidatedJson};
use crate::errors::ServiceError;
use crate::services::inventory::{StockFilter, StockView, UpdateAlertThresholdRequest};
use crate::AppState;

/// List stock counters with their location and card type
#[utoipa::path(
    get,
    path = "/api/v1/stock",
    params(StockFilter),
    responses(
        (status = 200, description = "Stock rows", body = [StockView],
            headers(("X-Request-Id" = String, description = "Unique request id"))
        ),
        (status = 400, description = "Invalid filter", body = crate::errors::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse)
    ),
    tag = "stock"
)]
pub async fn list_stock(
    State(state): State<AppState>,
    ApiQuery(filter): ApiQuery<StockFilter>,
) -> Result<Json<Vec<StockView>>, ServiceError> {
    Ok(Json(state.services.stock.list_stock(filter).await?))
}

/// Set the alert threshold of one stock row
#[utoipa::path(
    patch,
    path = "/api/v1/stock",
    request_body = UpdateAlertThresholdRequest,
    responses(
        (status = 200, description = "Threshold updated", body = crate::entities::stock::Model),
        (status = 400, description = "Negative threshold", body = crate::errors::ErrorResponse),
        (status = 404, description = "Stock row not found", body = crate::errors::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse)
    ),
    tag = "stock"
)]
pub async fn update_alert_threshold(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<UpdateAlertThresholdRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let updated = state
        .services
        .stock
        .set_alert_threshold(payload.id, payload.alert_threshold)
        .await?;
    Ok(envelope(StatusCode::OK, "Alert threshold updated", updated))
}
