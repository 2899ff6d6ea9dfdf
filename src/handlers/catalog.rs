//! Banks, locations, card types, users and reports.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;

use super::common::{envelope, no_content_response, ValidatedJson};
use crate::entities::{bank, card_type, location, report, user};
use crate::errors::ServiceError;
use crate::services::catalog::{
    CreateBankRequest, CreateCardTypeRequest, CreateLocationRequest, CreateReportRequest,
    CreateUserRequest,
};
use crate::AppState;

#[utoipa::path(
    get,
    path = "/api/v1/banks",
    responses(
        (status = 200, description = "All banks", body = [bank::Model]),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse)
    ),
    tag = "catalog"
)]
pub async fn list_banks(State(state): State<AppState>) -> Result<Json<Vec<bank::Model>>, ServiceError> {
    Ok(Json(state.services.catalog.list_banks().await?))
}

#[utoipa::path(
    post,
    path = "/api/v1/banks",
    request_body = CreateBankRequest,
    responses(
        (status = 201, description = "Bank created", body = bank::Model),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 409, description = "Bank code already used", body = crate::errors::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse)
    ),
    tag = "catalog"
)]
pub async fn create_bank(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<CreateBankRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let created = state.services.catalog.create_bank(payload).await?;
    Ok(envelope(StatusCode::CREATED, "Bank created", created))
}

#[utoipa::path(
    get,
    path = "/api/v1/locations",
    responses(
        (status = 200, description = "All storage locations", body = [location::Model]),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse)
    ),
    tag = "catalog"
)]
pub async fn list_locations(
    State(state): State<AppState>,
) -> Result<Json<Vec<location::Model>>, ServiceError> {
    Ok(Json(state.services.catalog.list_locations().await?))
}

#[utoipa::path(
    post,
    path = "/api/v1/locations",
    request_body = CreateLocationRequest,
    responses(
        (status = 201, description = "Location created", body = location::Model),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 404, description = "Bank not found", body = crate::errors::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse)
    ),
    tag = "catalog"
)]
pub async fn create_location(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<CreateLocationRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let created = state.services.catalog.create_location(payload).await?;
    Ok(envelope(StatusCode::CREATED, "Location created", created))
}

#[utoipa::path(
    delete,
    path = "/api/v1/locations/{id}",
    params(("id" = Uuid, Path, description = "Location ID")),
    responses(
        (status = 204, description = "Location deleted"),
        (status = 404, description = "Location not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Location still holds cards", body = crate::errors::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse)
    ),
    tag = "catalog"
)]
pub async fn delete_location(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    state.services.catalog.delete_location(id).await?;
    Ok(no_content_response())
}

#[utoipa::path(
    get,
    path = "/api/v1/card-types",
    responses(
        (status = 200, description = "All card types", body = [card_type::Model]),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse)
    ),
    tag = "catalog"
)]
pub async fn list_card_types(
    State(state): State<AppState>,
) -> Result<Json<Vec<card_type::Model>>, ServiceError> {
    Ok(Json(state.services.catalog.list_card_types().await?))
}

#[utoipa::path(
    post,
    path = "/api/v1/card-types",
    request_body = CreateCardTypeRequest,
    responses(
        (status = 201, description = "Card type created", body = card_type::Model),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 404, description = "Bank not found", body = crate::errors::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse)
    ),
    tag = "catalog"
)]
pub async fn create_card_type(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<CreateCardTypeRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let created = state.services.catalog.create_card_type(payload).await?;
    Ok(envelope(StatusCode::CREATED, "Card type created", created))
}

#[utoipa::path(
    get,
    path = "/api/v1/users",
    responses(
        (status = 200, description = "All users, newest first", body = [user::Model]),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse)
    ),
    tag = "catalog"
)]
pub async fn list_users(State(state): State<AppState>) -> Result<Json<Vec<user::Model>>, ServiceError> {
    Ok(Json(state.services.catalog.list_users().await?))
}

#[utoipa::path(
    post,
    path = "/api/v1/users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User created", body = user::Model),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 409, description = "Email already registered", body = crate::errors::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse)
    ),
    tag = "catalog"
)]
pub async fn create_user(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<CreateUserRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let created = state.services.catalog.create_user(payload).await?;
    Ok(envelope(StatusCode::CREATED, "User created", created))
}

#[utoipa::path(
    get,
    path = "/api/v1/reports",
    responses(
        (status = 200, description = "All reports, newest first", body = [report::Model]),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse)
    ),
    tag = "catalog"
)]
pub async fn list_reports(
    State(state): State<AppState>,
) -> Result<Json<Vec<report::Model>>, ServiceError> {
    Ok(Json(state.services.catalog.list_reports().await?))
}

#[utoipa::path(
    post,
    path = "/api/v1/reports",
    request_body = CreateReportRequest,
    responses(
        (status = 201, description = "Report recorded", body = report::Model),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse)
    ),
    tag = "catalog"
)]
pub async fn create_report(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<CreateReportRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let created = state.services.catalog.create_report(payload).await?;
    Ok(envelope(StatusCode::CREATED, "Report recorded", created))
}
