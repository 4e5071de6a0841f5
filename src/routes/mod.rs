/**
 * Routes Module
 * API route handlers and the shared error response
 */
pub mod admin;
pub mod ai;
pub mod auth;
pub mod blogs;
pub mod health;

use std::collections::BTreeMap;

use axum::{
    extract::{rejection::JsonRejection, FromRequest},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::sync::Arc;
use validator::{ValidationErrors, ValidationErrorsKind};

use crate::ai::AiError;
use crate::db;

/// Error body shared by every route: `{ message, error?, errors? }`
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<BTreeMap<String, Vec<String>>>,
}

/// JSON body extractor whose rejections render as [`ApiError`] bodies.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct Json<T>(pub T);

impl<T> IntoResponse for Json<T>
where
    axum::Json<T>: IntoResponse,
{
    fn into_response(self) -> Response {
        axum::Json(self.0).into_response()
    }
}

/// Message-only response (deletes, logout)
#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            message: message.into(),
        })
    }
}

/// Error type returned by handlers
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("The given data was invalid.")]
    Validation(BTreeMap<String, Vec<String>>),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Unauthenticated(String),
    #[error("Unauthorized")]
    Forbidden,
    #[error("Not found")]
    NotFound,
    #[error("Too many requests. Please try again later.")]
    TooManyRequests,
    #[error("Database not available")]
    DatabaseUnavailable,
    #[error("Database error")]
    Database(#[from] sqlx::Error),
    #[error("{message}")]
    Ai {
        message: &'static str,
        #[source]
        source: AiError,
    },
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    /// Validation failure on a single field.
    pub fn field(field: &str, message: impl Into<String>) -> Self {
        let mut errors = BTreeMap::new();
        errors.insert(field.to_string(), vec![message.into()]);
        ApiError::Validation(errors)
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
            ApiError::DatabaseUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Database(_) | ApiError::Ai { .. } | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// Flatten nested validator errors into dotted field paths (`seo_metadata.meta_title`).
fn collect_errors(
    prefix: &str,
    errors: &ValidationErrors,
    out: &mut BTreeMap<String, Vec<String>>,
) {
    for (field, kind) in errors.errors() {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{}.{}", prefix, field)
        };
        match kind {
            ValidationErrorsKind::Field(errs) => {
                let messages = out.entry(path.clone()).or_default();
                for e in errs {
                    messages.push(match &e.message {
                        Some(message) => message.to_string(),
                        None => format!("The {} field is invalid ({}).", path, e.code),
                    });
                }
            }
            ValidationErrorsKind::Struct(inner) => collect_errors(&path, inner, out),
            ValidationErrorsKind::List(items) => {
                for (index, inner) in items {
                    collect_errors(&format!("{}.{}", path, index), inner, out);
                }
            }
        }
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        let mut fields = BTreeMap::new();
        collect_errors("", &errors, &mut fields);
        ApiError::Validation(fields)
    }
}

/// Field named by a serde data error, and whether it was missing.
fn rejected_field(detail: &str) -> Option<(String, bool)> {
    let detail = detail
        .split_once("target type: ")
        .map_or(detail, |(_, rest)| rest);
    if let Some(rest) = detail.strip_prefix("missing field `") {
        return rest.split('`').next().map(|field| (field.to_string(), true));
    }
    let (path, _) = detail.split_once(": ")?;
    if path.is_empty() || path.contains(char::is_whitespace) {
        return None;
    }
    // Missing nested fields surface as `seo_metadata: missing field `x``.
    let missing = detail[path.len() + 2..].strip_prefix("missing field `");
    match missing.and_then(|rest| rest.split('`').next()) {
        Some(field) => Some((format!("{}.{}", path, field), true)),
        None => Some((path.to_string(), false)),
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        match rejection {
            JsonRejection::JsonDataError(e) => match rejected_field(&e.body_text()) {
                Some((field, true)) => {
                    let message = format!("The {} field is required.", field);
                    ApiError::field(&field, message)
                }
                Some((field, false)) => {
                    let message = format!("The {} field is invalid.", field);
                    ApiError::field(&field, message)
                }
                None => ApiError::field("body", "The request body is invalid."),
            },
            other => ApiError::BadRequest(other.body_text()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            ApiError::Validation(errors) => ErrorResponse {
                message: "The given data was invalid.".to_string(),
                error: None,
                errors: Some(errors),
            },
            ApiError::Database(ref e) => {
                tracing::error!(error = %e, "database error");
                ErrorResponse {
                    message: self.to_string(),
                    error: None,
                    errors: None,
                }
            }
            ApiError::Ai { message, source } => {
                tracing::error!(error = %source, "{}", message);
                ErrorResponse {
                    message: message.to_string(),
                    error: Some(source.to_string()),
                    errors: None,
                }
            }
            ApiError::Internal(ref reason) => {
                tracing::error!(reason = %reason, "internal error");
                ErrorResponse {
                    message: "Internal server error".to_string(),
                    error: None,
                    errors: None,
                }
            }
            other => ErrorResponse {
                message: other.to_string(),
                error: None,
                errors: None,
            },
        };
        (status, axum::Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Database pool or 503 when the service runs without a database.
pub fn pool() -> ApiResult<Arc<PgPool>> {
    db::get_pool().ok_or(ApiError::DatabaseUnavailable)
}

/// `?page=N` query string
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(err: ApiError) -> (StatusCode, serde_json::Value) {
        let res = err.into_response();
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_validation_error_lists_fields() {
        let (status, body) = body_json(ApiError::field("title", "The title field is required.")).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["errors"]["title"][0], "The title field is required.");
    }

    #[tokio::test]
    async fn test_forbidden_uses_unauthorized_message() {
        let (status, body) = body_json(ApiError::Forbidden).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["message"], "Unauthorized");
        assert!(body.get("errors").is_none());
    }

    #[tokio::test]
    async fn test_database_error_is_not_leaked() {
        let (status, body) = body_json(ApiError::Database(sqlx::Error::RowNotFound)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "Database error");
        assert!(body.get("error").is_none());
    }

    #[tokio::test]
    async fn test_ai_error_carries_provider_message() {
        let (status, body) = body_json(ApiError::Ai {
            message: "Failed to generate outline",
            source: AiError::NotConfigured,
        })
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "Failed to generate outline");
        assert!(body["error"].as_str().unwrap().contains("GROQ_API_KEY"));
    }

    #[test]
    fn test_rejected_field_names_the_offending_field() {
        let prefix = "Failed to deserialize the JSON body into the target type: ";
        assert_eq!(
            rejected_field(&format!("{}missing field `title` at line 1 column 2", prefix)),
            Some(("title".to_string(), true))
        );
        assert_eq!(
            rejected_field(&format!(
                "{}status: unknown variant `archived`, expected `draft` or `published` at line 1 column 30",
                prefix
            )),
            Some(("status".to_string(), false))
        );
        assert_eq!(
            rejected_field(&format!(
                "{}seo_metadata: missing field `keywords` at line 1 column 40",
                prefix
            )),
            Some(("seo_metadata.keywords".to_string(), true))
        );
        assert_eq!(rejected_field(&format!("{}invalid type: string", prefix)), None);
    }

    #[test]
    fn test_pool_unavailable_without_database() {
        assert!(matches!(pool(), Err(ApiError::DatabaseUnavailable)));
    }
}
