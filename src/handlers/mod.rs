pub mod catalog;
pub mod common;
pub mod dashboard;
pub mod health;
pub mod movements;
pub mod stock;

use axum::{
    routing::{delete, get},
    Router,
};

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Business routes. Mounted twice by the application: under `/api/v1` and
/// at the bare paths.
pub fn api_routes() -> Router<AppState> {
    let movements = Router::new()
        .route(
            "/movements",
            get(movements::list_movements)
                .post(movements::record_movement)
                .patch(movements::correct_movement)
                .delete(movements::reverse_movement),
        )
        .route("/movements/reconciliation", get(movements::reconcile));

    let stock = Router::new().route(
        "/stock",
        get(stock::list_stock).patch(stock::update_alert_threshold),
    );

    let catalog = Router::new()
        .route("/banks", get(catalog::list_banks).post(catalog::create_bank))
        .route(
            "/locations",
            get(catalog::list_locations).post(catalog::create_location),
        )
        .route("/locations/:id", delete(catalog::delete_location))
        .route(
            "/card-types",
            get(catalog::list_card_types).post(catalog::create_card_type),
        )
        .route("/users", get(catalog::list_users).post(catalog::create_user))
        .route(
            "/reports",
            get(catalog::list_reports).post(catalog::create_report),
        );

    Router::new()
        .merge(movements)
        .merge(stock)
        .route("/dashboard", get(dashboard::get_dashboard))
        .merge(catalog)
}
