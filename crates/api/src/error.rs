//! HTTP error type. Every failure leaves the API as `{ "error", "code" }`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use taskflow_core::approvers::ResolveError;
use taskflow_core::error::CoreError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    InternalError(String),
}

pub type AppResult<T> = Result<T, AppError>;

impl From<ResolveError<sqlx::Error>> for AppError {
    fn from(err: ResolveError<sqlx::Error>) -> Self {
        match err {
            ResolveError::Core(e) => Self::Core(e),
            ResolveError::Directory(e) => Self::Database(e),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        Self::Core(CoreError::Validation(errors.to_string()))
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    code: &'static str,
}

impl ErrorBody {
    fn new(code: &'static str, error: impl Into<String>) -> Self {
        Self {
            code,
            error: error.into(),
        }
    }

    /// Logged in full; the client only sees a generic message.
    fn internal(detail: &dyn std::fmt::Display) -> (StatusCode, Self) {
        tracing::error!(error = %detail, "Request failed with an internal error");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Self::new("INTERNAL_ERROR", "An internal error occurred"),
        )
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            Self::Core(e) => core_error_body(e),
            Self::Database(e) => database_error_body(e),
            Self::InternalError(msg) => ErrorBody::internal(msg),
        };
        (status, Json(body)).into_response()
    }
}

fn core_error_body(err: &CoreError) -> (StatusCode, ErrorBody) {
    let (status, code) = match err {
        CoreError::NotFound { entity, id } => {
            return (
                StatusCode::NOT_FOUND,
                ErrorBody::new("NOT_FOUND", format!("{entity} with id {id} not found")),
            );
        }
        CoreError::Internal(detail) => return ErrorBody::internal(detail),
        CoreError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
        CoreError::InvalidTransition(_) => (StatusCode::CONFLICT, "INVALID_TRANSITION"),
        CoreError::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
        CoreError::Resolution(_) => (StatusCode::UNPROCESSABLE_ENTITY, "RESOLUTION_ERROR"),
        CoreError::Configuration(_) => (StatusCode::UNPROCESSABLE_ENTITY, "CONFIGURATION_ERROR"),
        CoreError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
        CoreError::Forbidden(_) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
    };
    (status, ErrorBody::new(code, core_message(err)))
}

/// The caller-facing text of a variant, without the `Display` prefix.
fn core_message(err: &CoreError) -> String {
    match err {
        CoreError::Validation(m)
        | CoreError::InvalidTransition(m)
        | CoreError::Conflict(m)
        | CoreError::Resolution(m)
        | CoreError::Configuration(m)
        | CoreError::Unauthorized(m)
        | CoreError::Forbidden(m)
        | CoreError::Internal(m) => m.clone(),
        CoreError::NotFound { .. } => err.to_string(),
    }
}

/// `RowNotFound` is a 404. Postgres unique (`23505`, `uq_*`) and foreign
/// key (`23503`, `fk_*`) violations are 409s naming the constraint.
/// Anything else is a 500.
fn database_error_body(err: &sqlx::Error) -> (StatusCode, ErrorBody) {
    if let sqlx::Error::RowNotFound = err {
        return (
            StatusCode::NOT_FOUND,
            ErrorBody::new("NOT_FOUND", "Resource not found"),
        );
    }

    if let sqlx::Error::Database(db) = err {
        let constraint = db.constraint().unwrap_or_default();
        let conflict = match db.code().as_deref() {
            Some("23505") if constraint.starts_with("uq_") => {
                Some(format!("Value already exists ({constraint})"))
            }
            Some("23503") if constraint.starts_with("fk_") => {
                Some(format!("Referenced record missing or still in use ({constraint})"))
            }
            _ => None,
        };
        if let Some(message) = conflict {
            return (StatusCode::CONFLICT, ErrorBody::new("CONFLICT", message));
        }
    }

    ErrorBody::internal(err)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(err: impl Into<AppError>) -> StatusCode {
        err.into().into_response().status()
    }

    #[test]
    fn core_variants_choose_statuses() {
        let cases = [
            (CoreError::Validation("v".into()), StatusCode::BAD_REQUEST),
            (CoreError::InvalidTransition("t".into()), StatusCode::CONFLICT),
            (CoreError::Conflict("c".into()), StatusCode::CONFLICT),
            (CoreError::Resolution("r".into()), StatusCode::UNPROCESSABLE_ENTITY),
            (CoreError::Configuration("c".into()), StatusCode::UNPROCESSABLE_ENTITY),
            (CoreError::Unauthorized("u".into()), StatusCode::UNAUTHORIZED),
            (CoreError::Forbidden("f".into()), StatusCode::FORBIDDEN),
            (CoreError::Internal("i".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, expected) in cases {
            assert_eq!(status(err), expected);
        }
        assert_eq!(
            status(CoreError::NotFound {
                entity: "WorkflowInstance",
                id: 9
            }),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn message_drops_display_prefix() {
        assert_eq!(
            core_message(&CoreError::InvalidTransition("Instance is completed".into())),
            "Instance is completed"
        );
    }

    #[test]
    fn resolution_failure_from_directory_lookup_is_422() {
        let err = ResolveError::<sqlx::Error>::Core(CoreError::Resolution("no project".into()));
        assert_eq!(status(err), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn missing_row_is_404() {
        assert_eq!(status(sqlx::Error::RowNotFound), StatusCode::NOT_FOUND);
    }
}
