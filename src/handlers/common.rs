use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, FromRequest, FromRequestParts, Query, Request},
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{de::DeserializeOwned, Serialize};
use validator::Validate;

use crate::errors::{FieldErrors, ServiceError};
use crate::ApiResponse;

/// Standard no content response
pub fn no_content_response() -> Response {
    StatusCode::NO_CONTENT.into_response()
}

/// `{success, message, data}` envelope with the given status.
pub fn envelope<T: Serialize>(status: StatusCode, message: &str, data: T) -> Response {
    (status, Json(ApiResponse::with_message(message, data))).into_response()
}

fn body_error(rejection: JsonRejection) -> ServiceError {
    let detail = rejection.body_text();
    let mut fields = FieldErrors::new();
    fields.insert("body".to_string(), vec![detail.clone()]);
    ServiceError::ValidationError {
        message: format!("Invalid request body: {}", detail),
        fields,
    }
}

fn query_error(rejection: QueryRejection) -> ServiceError {
    let detail = rejection.body_text();
    let mut fields = FieldErrors::new();
    fields.insert("query".to_string(), vec![detail.clone()]);
    ServiceError::ValidationError {
        message: format!("Invalid query string: {}", detail),
        fields,
    }
}

/// JSON body whose rejections (syntax, wrong types, missing content type)
/// come back as a 400 `ValidationError` in the standard error body.
#[derive(Debug)]
pub struct ApiJson<T>(pub T);

#[axum::async_trait]
impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(body_error)?;
        Ok(Self(value))
    }
}

/// [`ApiJson`] that additionally runs the payload's `Validate` rules.
#[derive(Debug)]
pub struct ValidatedJson<T>(pub T);

#[axum::async_trait]
impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let ApiJson(value) = ApiJson::<T>::from_request(req, state).await?;
        value.validate()?;
        Ok(Self(value))
    }
}

/// Query string with rejections mapped like [`ApiJson`].
pub struct ApiQuery<T>(pub T);

#[axum::async_trait]
impl<T, S> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(query_error)?;
        Ok(Self(value))
    }
}
