use axum::{extract::State, Json};

use crate::errors::ServiceError;
use crate::services::dashboard::DashboardSnapshot;
use crate::AppState;

/// Aggregated stock and activity snapshot, served from cache while fresh
#[utoipa::path(
    get,
    path = "/api/v1/dashboard",
    responses(
        (status = 200, description = "Dashboard snapshot", body = DashboardSnapshot,
            headers(("X-Request-Id" = String, description = "Unique request id"))
        ),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse)
    ),
    tag = "dashboard"
)]
pub async fn get_dashboard(
    State(state): State<AppState>,
) -> Result<Json<DashboardSnapshot>, ServiceError> {
    Ok(Json(state.services.dashboard.snapshot().await?))
}
