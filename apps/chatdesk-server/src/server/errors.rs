use axum::{http::StatusCode, response::IntoResponse, Json};

use super::types::ApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ApiFailure {
    InvalidRequest,
    Unauthorized,
    Forbidden,
    NotFound,
    Conflict,
    Internal,
}

impl std::fmt::Display for ApiFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

impl IntoResponse for ApiFailure {
    fn into_response(self) -> axum::response::Response {
        match self {
            Self::InvalidRequest => (
                StatusCode::BAD_REQUEST,
                Json(ApiError {
                    error: "invalid_request",
                }),
            )
                .into_response(),
            Self::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                Json(ApiError {
                    error: "invalid_credentials",
                }),
            )
                .into_response(),
            Self::Forbidden => (
                StatusCode::FORBIDDEN,
                Json(ApiError { error: "forbidden" }),
            )
                .into_response(),
            Self::NotFound => (
                StatusCode::NOT_FOUND,
                Json(ApiError { error: "not_found" }),
            )
                .into_response(),
            Self::Conflict => (
                StatusCode::CONFLICT,
                Json(ApiError {
                    error: "email_already_in_use",
                }),
            )
                .into_response(),
            Self::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiError {
                    error: "internal_error",
                }),
            )
                .into_response(),
        }
    }
}

impl From<sqlx::Error> for ApiFailure {
    fn from(error: sqlx::Error) -> Self {
        tracing::error!(event = "storage.error", error = %error);
        Self::Internal
    }
}

/// Maps a unique-constraint violation to `Conflict`. Concurrent writers can
/// both pass the in-transaction duplicate check; the constraint is the
/// arbiter, and losing that race is a 409, not a 500.
pub(crate) fn unique_conflict(error: sqlx::Error) -> ApiFailure {
    if error
        .as_database_error()
        .is_some_and(|db| db.is_unique_violation())
    {
        return ApiFailure::Conflict;
    }
    ApiFailure::from(error)
}

#[cfg(test)]
mod tests {
    use super::{unique_conflict, ApiFailure};

    #[test]
    fn non_unique_storage_errors_stay_internal() {
        assert_eq!(
            unique_conflict(sqlx::Error::RowNotFound),
            ApiFailure::Internal
        );
        assert_eq!(
            unique_conflict(sqlx::Error::PoolClosed),
            ApiFailure::Internal
        );
    }
}

pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .json()
        .with_env_filter(filter)
        .with_current_span(true)
        .with_span_list(true)
        .init();
}
