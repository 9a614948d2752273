use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

use chronos_registry::CapsuleError;
use chronos_types::api::{ErrorBody, ErrorDetail};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Capsule(#[from] CapsuleError),

    #[error("{0}")]
    InvalidInput(&'static str),

    #[error(transparent)]
    MalformedBody(#[from] JsonRejection),

    #[error(transparent)]
    MalformedPath(#[from] PathRejection),

    #[error(transparent)]
    MalformedQuery(#[from] QueryRejection),

    #[error("username already taken")]
    UsernameTaken,

    #[error("missing or invalid credentials")]
    Unauthorized,

    #[error("internal error")]
    Internal,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Capsule(e) => match e {
                CapsuleError::InvalidUnlockTime { .. }
                | CapsuleError::EmptyMessage
                | CapsuleError::MessageTooLong { .. } => StatusCode::BAD_REQUEST,
                CapsuleError::CapsuleNotFound(_) => StatusCode::NOT_FOUND,
                CapsuleError::NotOwner(_) => StatusCode::FORBIDDEN,
                CapsuleError::StillLocked { .. } | CapsuleError::AlreadyRevealed(_) => {
                    StatusCode::CONFLICT
                }
                CapsuleError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::InvalidInput(_)
            | Self::MalformedBody(_)
            | Self::MalformedPath(_)
            | Self::MalformedQuery(_) => StatusCode::BAD_REQUEST,
            Self::UsernameTaken => StatusCode::CONFLICT,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Capsule(CapsuleError::Storage(_)) | Self::Internal => "Internal",
            Self::Capsule(e) => e.code(),
            Self::InvalidInput(_)
            | Self::MalformedBody(_)
            | Self::MalformedPath(_)
            | Self::MalformedQuery(_) => "InvalidInput",
            Self::UsernameTaken => "UsernameTaken",
            Self::Unauthorized => "Unauthorized",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = match &self {
            // Storage details stay in the server log.
            Self::Capsule(CapsuleError::Storage(e)) => {
                error!("Storage failure: {:#}", e);
                "internal error".to_string()
            }
            other => other.to_string(),
        };

        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code().to_string(),
                message,
            },
        };
        (self.status(), Json(body)).into_response()
    }
}

/// Run blocking work (SQLite, Argon2) off the async runtime.
pub(crate) async fn blocking<F, T, E>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, E> + Send + 'static,
    T: Send + 'static,
    E: Into<ApiError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal
        })?
        .map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capsule_errors_map_to_statuses() {
        let cases = [
            (CapsuleError::InvalidUnlockTime { unlock_time: 1, now: 2 }, StatusCode::BAD_REQUEST),
            (CapsuleError::EmptyMessage, StatusCode::BAD_REQUEST),
            (CapsuleError::MessageTooLong { len: 1001 }, StatusCode::BAD_REQUEST),
            (CapsuleError::CapsuleNotFound(3), StatusCode::NOT_FOUND),
            (CapsuleError::NotOwner(3), StatusCode::FORBIDDEN),
            (CapsuleError::StillLocked { id: 3, unlock_time: 9 }, StatusCode::CONFLICT),
            (CapsuleError::AlreadyRevealed(3), StatusCode::CONFLICT),
        ];
        for (err, status) in cases {
            let code = err.code();
            let api = ApiError::from(err);
            assert_eq!(api.status(), status);
            assert_eq!(api.code(), code);
        }
    }

    #[test]
    fn storage_errors_are_opaque() {
        let api = ApiError::from(CapsuleError::Storage(anyhow::anyhow!("disk on fire")));
        assert_eq!(api.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(api.code(), "Internal");
    }
}
