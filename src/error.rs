//! HTTP-facing errors. Validation and conflict failures are answered with
//! 400/409 and a JSON `{"error": ...}` body, not a redirect carrying the
//! message in the query string. Only `Unauthenticated` redirects (to `/login`).

use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use axum::Json;
use serde_json::json;

use crate::auth::{AuthError, LoginError, RegisterError};
use crate::avatar::AvatarError;
use crate::posts::{DeleteError, PostError};
use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Login required")]
    Unauthenticated,

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::Unauthenticated => return Redirect::to("/login").into_response(),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::StoreUnavailable(e) => {
                tracing::error!("Store error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Unauthenticated => AppError::Unauthenticated,
            AuthError::Store(e) => AppError::StoreUnavailable(e),
        }
    }
}

impl From<LoginError> for AppError {
    fn from(err: LoginError) -> Self {
        match err {
            LoginError::HandleRequired => AppError::Validation(err.to_string()),
            LoginError::NotFound => AppError::NotFound(err.to_string()),
            LoginError::Store(e) => AppError::StoreUnavailable(e),
        }
    }
}

impl From<RegisterError> for AppError {
    fn from(err: RegisterError) -> Self {
        match err {
            RegisterError::HandleRequired => AppError::Validation(err.to_string()),
            RegisterError::HandleTaken => AppError::Conflict(err.to_string()),
            RegisterError::Store(e) => AppError::StoreUnavailable(e),
        }
    }
}

impl From<PostError> for AppError {
    fn from(err: PostError) -> Self {
        match err {
            PostError::Validation(msg) => AppError::Validation(msg.to_string()),
            PostError::NotFound => AppError::NotFound(err.to_string()),
            PostError::Store(e) => AppError::StoreUnavailable(e),
        }
    }
}

impl From<DeleteError> for AppError {
    fn from(err: DeleteError) -> Self {
        match err {
            DeleteError::Unauthenticated => AppError::Unauthenticated,
            DeleteError::NotFound => AppError::NotFound(err.to_string()),
            DeleteError::Forbidden => AppError::Forbidden(err.to_string()),
            DeleteError::Store(e) => AppError::StoreUnavailable(e),
        }
    }
}

impl From<AvatarError> for AppError {
    fn from(err: AvatarError) -> Self {
        match err {
            AvatarError::InvalidLetter(_) => AppError::Validation(err.to_string()),
            AvatarError::Encode(e) => AppError::Internal(e.to_string()),
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header;

    fn response_status(err: impl Into<AppError>) -> StatusCode {
        err.into().into_response().status()
    }

    #[test]
    fn validation_returns_400() {
        assert_eq!(
            response_status(AppError::Validation("oops".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            response_status(PostError::Validation("Title is required")),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn not_found_and_forbidden_stay_distinct() {
        assert_eq!(response_status(DeleteError::NotFound), StatusCode::NOT_FOUND);
        assert_eq!(response_status(DeleteError::Forbidden), StatusCode::FORBIDDEN);
    }

    #[test]
    fn handle_taken_returns_409() {
        assert_eq!(
            response_status(RegisterError::HandleTaken),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn unauthenticated_redirects_to_login() {
        let response = AppError::from(DeleteError::Unauthenticated).into_response();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[header::LOCATION], "/login");
    }

    #[test]
    fn store_failure_returns_500() {
        assert_eq!(
            response_status(StoreError::Corrupt("bad row".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn bad_avatar_letter_returns_400() {
        assert_eq!(
            response_status(AvatarError::InvalidLetter('3')),
            StatusCode::BAD_REQUEST
        );
    }
}
