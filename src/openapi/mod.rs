use axum::Json;
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Cardstock API",
        version = "1.0.0",
        description = r#"
# Cardstock API

Stock ledger for bank cards held across storage locations.

## Movements

- **ENTREE**: cards arrive at a destination location
- **SORTIE**: cards leave a source location
- **TRANSFERT**: cards move from a source to a destination location

A movement request carries one or more line items. Either every item is
applied to stock and written to the ledger, or nothing is.

## Error Handling

Every error uses the same body:

```json
{
  "error": "Unprocessable Entity",
  "message": "Insufficient stock ...",
  "details": { "available": 100, "requested": 150 },
  "request_id": "…",
  "timestamp": "2024-01-01T00:00:00Z"
}
```

All routes are also reachable without the `/api/v1` prefix.
        "#,
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "movements", description = "Ledger movements and reconciliation"),
        (name = "stock", description = "Stock counters and alert thresholds"),
        (name = "dashboard", description = "Cached aggregate snapshot"),
        (name = "catalog", description = "Banks, locations, card types, users and reports"),
        (name = "health", description = "Health check endpoints")
    ),
    paths(
        // Movements
        crate::handlers::movements::list_movements,
        crate::handlers::movements::record_movement,
        crate::handlers::movements::correct_movement,
        crate::handlers::movements::reverse_movement,
        crate::handlers::movements::reconcile,

        // Stock
        crate::handlers::stock::list_stock,
        crate::handlers::stock::update_alert_threshold,

        // Dashboard
        crate::handlers::dashboard::get_dashboard,

        // Catalog
        crate::handlers::catalog::list_banks,
        crate::handlers::catalog::create_bank,
        crate::handlers::catalog::list_locations,
        crate::handlers::catalog::create_location,
        crate::handlers::catalog::delete_location,
        crate::handlers::catalog::list_card_types,
        crate::handlers::catalog::create_card_type,
        crate::handlers::catalog::list_users,
        crate::handlers::catalog::create_user,
        crate::handlers::catalog::list_reports,
        crate::handlers::catalog::create_report,

        // Health
        crate::handlers::health::health_check
    ),
    components(
        schemas(
            // Ledger types
            crate::entities::MovementType,
            crate::entities::movement::Model,
            crate::entities::stock::Model,
            crate::services::movements::MovementItem,
            crate::services::movements::RecordMovementRequest,
            crate::services::movements::CorrectMovementRequest,
            crate::services::movements::ReverseMovementRequest,
            crate::services::movements::MovementReceipt,
            crate::services::ledger::MovementView,
            crate::services::ledger::Reconciliation,
            crate::services::inventory::StockView,
            crate::services::inventory::UpdateAlertThresholdRequest,

            // Dashboard types
            crate::services::dashboard::DashboardSnapshot,
            crate::services::dashboard::DashboardStats,
            crate::services::dashboard::MonthBucket,
            crate::services::dashboard::ActivityItem,
            crate::services::dashboard::ActivityKind,

            // Catalog types
            crate::entities::bank::Model,
            crate::entities::location::Model,
            crate::entities::card_type::Model,
            crate::entities::user::Model,
            crate::entities::report::Model,
            crate::services::catalog::CreateBankRequest,
            crate::services::catalog::CreateLocationRequest,
            crate::services::catalog::CreateCardTypeRequest,
            crate::services::catalog::CreateUserRequest,
            crate::services::catalog::CreateReportRequest,

            // Error types
            crate::errors::ErrorResponse,
            crate::handlers::health::HealthStatus
        )
    )
)]
pub struct ApiDocV1;

/// `GET /api-docs/openapi.json`
pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDocV1::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_generation() {
        let openapi = ApiDocV1::openapi();
        let json = serde_json::to_string_pretty(&openapi).unwrap();
        assert!(json.contains("Cardstock API"));
        assert!(json.contains("/api/v1/movements"));
        assert!(json.contains("/api/v1/movements/reconciliation"));
        assert!(json.contains("/api/v1/locations/{id}"));
        assert!(json.contains("InsufficientStock") || json.contains("Insufficient stock"));
    }
}
