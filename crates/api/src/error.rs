//! Unified error handling with Sentry integration.
//!
//! Every handler returns `Result<T, AppError>`. Server-side failures are
//! captured to Sentry and logged before a generic body goes to the client;
//! client errors carry a human-readable `message`.

use axum::{
    Json,
    extract::{
        FromRequest, FromRequestParts,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::auth::AuthError;
use crate::validation::Issues;

const INTERNAL_MESSAGE: &str = "Internal server error";

/// Application-level error type for the API.
#[derive(Debug, Error)]
pub enum AppError {
    /// Request body failed validation.
    #[error("validation failed")]
    Validation(Issues),

    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Authentication operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Resource not found.
    #[error("{0}")]
    NotFound(String),

    /// Caller is not authenticated.
    #[error("{0}")]
    Unauthorized(String),

    /// Caller is authenticated but not allowed.
    #[error("{0}")]
    Forbidden(String),

    /// Bad request from client.
    #[error("{0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<Issues> for AppError {
    fn from(issues: Issues) -> Self {
        Self::Validation(issues)
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database(err.into())
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        tracing::debug!(error = %rejection.body_text(), "Path rejected");
        Self::BadRequest("Invalid identifier".to_owned())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    issues: Option<&'a Issues>,
}

fn repository_status(err: &RepositoryError) -> (StatusCode, &str) {
    match err {
        RepositoryError::Conflict(message) => (StatusCode::BAD_REQUEST, message.as_str()),
        RepositoryError::NotFound => (StatusCode::NOT_FOUND, "Not found"),
        RepositoryError::Database(_) | RepositoryError::DataCorruption(_) => {
            (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_MESSAGE)
        }
    }
}

impl AppError {
    /// Status code and client-facing message.
    fn status_and_message(&self) -> (StatusCode, &str) {
        match self {
            Self::Validation(_) => (StatusCode::BAD_REQUEST, "Invalid request data"),
            Self::Database(err) => repository_status(err),
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials => {
                    (StatusCode::UNAUTHORIZED, "Invalid username or password")
                }
                AuthError::PasswordNotSet => (
                    StatusCode::UNAUTHORIZED,
                    "Password not set, contact an administrator",
                ),
                AuthError::InvalidToken => (StatusCode::UNAUTHORIZED, "Invalid token"),
                AuthError::UnrecognizedPosition => {
                    (StatusCode::FORBIDDEN, "No role is assigned to this position")
                }
                AuthError::EmailTaken => (StatusCode::BAD_REQUEST, "Email is already in use"),
                AuthError::UsernameTaken => (StatusCode::BAD_REQUEST, "Username is already taken"),
                AuthError::Repository(inner) => repository_status(inner),
                AuthError::TokenEncoding(_) | AuthError::PasswordHash => {
                    (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_MESSAGE)
                }
            },
            Self::NotFound(message) => (StatusCode::NOT_FOUND, message.as_str()),
            Self::Unauthorized(message) => (StatusCode::UNAUTHORIZED, message.as_str()),
            Self::Forbidden(message) => (StatusCode::FORBIDDEN, message.as_str()),
            Self::BadRequest(message) => (StatusCode::BAD_REQUEST, message.as_str()),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_MESSAGE),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();

        // Capture server errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let issues = match &self {
            Self::Validation(issues) => Some(issues),
            _ => None,
        };

        (status, Json(ErrorBody { message, issues })).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// JSON body extractor whose rejections render as [`AppError`].
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct AppJson<T>(pub T);

/// Path extractor whose rejections render as [`AppError`].
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct AppPath<T>(pub T);

/// Query-string extractor whose rejections render as [`AppError`].
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct AppQuery<T>(pub T);

/// Set the Sentry user context for the current request.
pub fn set_sentry_user(id: &impl ToString, username: &str) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(id.to_string()),
            username: Some(username.to_owned()),
            ..Default::default()
        }));
    });
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use http_body_util::BodyExt;

    use super::*;

    fn get_status(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    async fn body_json(err: AppError) -> serde_json::Value {
        let bytes = err.into_response().into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(get_status(AppError::NotFound("x".into())), StatusCode::NOT_FOUND);
        assert_eq!(get_status(AppError::Unauthorized("x".into())), StatusCode::UNAUTHORIZED);
        assert_eq!(get_status(AppError::Forbidden("x".into())), StatusCode::FORBIDDEN);
        assert_eq!(get_status(AppError::BadRequest("x".into())), StatusCode::BAD_REQUEST);
        assert_eq!(
            get_status(AppError::Internal("x".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            get_status(AppError::Validation(Issues::new())),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_repository_errors_map_to_client_statuses() {
        assert_eq!(
            get_status(RepositoryError::Conflict("taken".into()).into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(get_status(RepositoryError::NotFound.into()), StatusCode::NOT_FOUND);
        assert_eq!(
            get_status(RepositoryError::Database(sqlx::Error::PoolTimedOut).into()),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_auth_errors_map_per_variant() {
        assert_eq!(get_status(AuthError::InvalidCredentials.into()), StatusCode::UNAUTHORIZED);
        assert_eq!(get_status(AuthError::PasswordNotSet.into()), StatusCode::UNAUTHORIZED);
        assert_eq!(get_status(AuthError::UnrecognizedPosition.into()), StatusCode::FORBIDDEN);
        assert_eq!(get_status(AuthError::UsernameTaken.into()), StatusCode::BAD_REQUEST);
        assert_eq!(
            get_status(AuthError::Repository(RepositoryError::NotFound).into()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AuthError::PasswordHash.into()),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn test_internal_details_are_hidden() {
        let err: AppError =
            RepositoryError::DataCorruption("users.email = 'garbage'".into()).into();
        assert_eq!(
            body_json(err).await,
            serde_json::json!({"message": "Internal server error"})
        );
    }

    #[tokio::test]
    async fn test_validation_body_includes_issues() {
        let mut issues = Issues::new();
        issues.field("username", "must contain at least 3 character(s)");

        let body = body_json(AppError::Validation(issues)).await;
        assert_eq!(body["message"], "Invalid request data");
        assert_eq!(
            body["issues"]["fieldErrors"]["username"][0],
            "must contain at least 3 character(s)"
        );
        assert_eq!(body["issues"]["formErrors"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn test_conflict_message_reaches_client() {
        let err: AppError = RepositoryError::Conflict("app 3 is already purchased".into()).into();
        assert_eq!(body_json(err).await["message"], "app 3 is already purchased");
    }
}
