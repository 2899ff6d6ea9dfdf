use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sea_orm::{error::DbErr, TransactionError};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::cache::CacheError;

fn current_request_id() -> Option<String> {
    crate::tracing::current_request_id().map(|rid| rid.as_str().to_string())
}

/// Field name to list of messages.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// Error body returned by every endpoint.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "error": "Unprocessable Entity",
    "message": "Insufficient stock for card type 550e8400-e29b-41d4-a716-446655440000 at location 6fa459ea-ee8a-3ca4-894e-db77e160355e: available 100, requested 150",
    "details": {
        "cardTypeId": "550e8400-e29b-41d4-a716-446655440000",
        "locationId": "6fa459ea-ee8a-3ca4-894e-db77e160355e",
        "available": 100,
        "requested": 150,
        "itemIndex": 0
    },
    "request_id": "req-abc123xyz",
    "timestamp": "2024-12-09T10:30:00.000Z"
}))]
pub struct ErrorResponse {
    /// HTTP status category (e.g., "Not Found", "Bad Request")
    pub error: String,
    /// Human-readable error description
    pub message: String,
    /// Structured detail: per-field messages for validation failures, the
    /// offending line item for stock failures.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Object)]
    pub details: Option<Value>,
    /// Unique request identifier for support and debugging
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    /// RFC 3339 timestamp when the error occurred
    pub timestamp: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] DbErr),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {message}")]
    ValidationError { message: String, fields: FieldErrors },

    /// Required source/destination missing for the movement type, or a
    /// transfer whose source equals its destination.
    #[error("Missing location: {0}")]
    MissingLocationForType(String),

    #[error(
        "Insufficient stock for card type {card_type_id} at location {location_id}: available {available}, requested {requested}"
    )]
    InsufficientStock {
        card_type_id: Uuid,
        location_id: Uuid,
        available: i64,
        requested: i64,
        /// Position of the failing line item in the request, when known.
        item_index: Option<usize>,
    },

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Cache error: {0}")]
    CacheError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        let mut fields = FieldErrors::new();
        for (field, errors) in err.field_errors() {
            let messages = errors
                .iter()
                .map(|e| {
                    e.message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| e.code.to_string())
                })
                .collect();
            fields.insert(field.to_string(), messages);
        }
        ServiceError::ValidationError {
            message: summarize_fields(&fields),
            fields,
        }
    }
}

impl From<TransactionError<ServiceError>> for ServiceError {
    fn from(err: TransactionError<ServiceError>) -> Self {
        match err {
            TransactionError::Connection(db_err) => ServiceError::db_error(db_err),
            TransactionError::Transaction(service_err) => service_err,
        }
    }
}

impl From<CacheError> for ServiceError {
    fn from(err: CacheError) -> Self {
        ServiceError::CacheError(err.to_string())
    }
}

fn summarize_fields(fields: &FieldErrors) -> String {
    if fields.is_empty() {
        return "invalid request".to_string();
    }
    fields
        .iter()
        .map(|(field, messages)| format!("{}: {}", field, messages.join(", ")))
        .collect::<Vec<_>>()
        .join("; ")
}

impl ServiceError {
    /// Validation failure not tied to a single field.
    pub fn validation(message: impl Into<String>) -> Self {
        ServiceError::ValidationError {
            message: message.into(),
            fields: FieldErrors::new(),
        }
    }

    /// Validation failure for one field.
    pub fn invalid_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut fields = FieldErrors::new();
        fields.insert(field.into(), vec![message.into()]);
        ServiceError::ValidationError {
            message: summarize_fields(&fields),
            fields,
        }
    }

    /// Collects several field failures into one error; `None` when there are none.
    pub fn from_fields(fields: FieldErrors) -> Option<Self> {
        if fields.is_empty() {
            None
        } else {
            Some(ServiceError::ValidationError {
                message: summarize_fields(&fields),
                fields,
            })
        }
    }

    pub fn not_found(entity: &str, id: Uuid) -> Self {
        ServiceError::NotFound(format!("{} with ID {} not found", entity, id))
    }

    pub fn db_error(error: DbErr) -> Self {
        ServiceError::DatabaseError(error)
    }

    /// Attaches the failing item position to a stock failure.
    pub fn at_item(self, index: usize) -> Self {
        match self {
            ServiceError::InsufficientStock {
                card_type_id,
                location_id,
                available,
                requested,
                ..
            } => ServiceError::InsufficientStock {
                card_type_id,
                location_id,
                available,
                requested,
                item_index: Some(index),
            },
            other => other,
        }
    }

    /// Returns the HTTP status code for this error.
    /// This is the single source of truth for error-to-status mapping.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::ValidationError { .. } | Self::MissingLocationForType(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::InsufficientStock { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::InvalidOperation(_) => StatusCode::CONFLICT,
            Self::DatabaseError(_)
            | Self::CacheError(_)
            | Self::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns the error message suitable for HTTP responses.
    /// Internal errors return generic messages to avoid leaking implementation details.
    pub fn response_message(&self) -> String {
        match self {
            Self::DatabaseError(_) => "Database error".to_string(),
            Self::CacheError(_) | Self::InternalError(_) => {
                "Internal server error".to_string()
            }
            _ => self.to_string(),
        }
    }

    /// Structured detail rendered in the `details` field of the error body.
    pub fn details(&self) -> Option<Value> {
        match self {
            Self::ValidationError { fields, .. } if !fields.is_empty() => Some(json!(fields)),
            Self::InsufficientStock {
                card_type_id,
                location_id,
                available,
                requested,
                item_index,
            } => Some(json!({
                "cardTypeId": card_type_id,
                "locationId": location_id,
                "available": available,
                "requested": requested,
                "itemIndex": item_index,
            })),
            _ => None,
        }
    }

    pub fn is_internal(&self) -> bool {
        self.status_code().is_server_error()
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if self.is_internal() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, status = %status, "request rejected");
        }

        let err = ErrorResponse {
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            message: self.response_message(),
            details: self.details(),
            request_id: current_request_id(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        (status, Json(err)).into_response()
    }
}
