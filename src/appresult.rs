use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::blob::BlobError;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("{0}")]
    InvalidOperation(String),

    #[error("not logged in")]
    Unauthorized,

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("internal error: {0}")]
    Internal(anyhow::Error),
}

impl AppError {
    pub fn kind(&self) -> &'static str {
        use AppError::*;
        match self {
            InvalidInput(_) => "invalid_input",
            InvalidOperation(_) => "invalid_operation",
            Unauthorized => "unauthorized",
            Forbidden(_) => "forbidden",
            NotFound(_) => "not_found",
            Conflict(_) => "conflict",
            Internal(_) => "internal",
        }
    }

    pub fn status(&self) -> StatusCode {
        use AppError::*;
        match self {
            InvalidInput(_) | InvalidOperation(_) => StatusCode::BAD_REQUEST,
            Unauthorized => StatusCode::UNAUTHORIZED,
            Forbidden(_) => StatusCode::FORBIDDEN,
            NotFound(_) => StatusCode::NOT_FOUND,
            Conflict(_) => StatusCode::CONFLICT,
            Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub(crate) fn not_found(what: &str) -> Self {
        AppError::NotFound(format!("{what} not found"))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let message = match &self {
            AppError::Internal(cause) => {
                error!("{cause:?}");
                "Internal server error.".to_owned()
            }
            other => other.to_string(),
        };

        (
            self.status(),
            Json(json!({ "error": self.kind(), "message": message })),
        )
            .into_response()
    }
}

macro_rules! apperr_impl {
    ($E:ty) => {
        impl From<$E> for AppError {
            fn from(err: $E) -> Self {
                Self::Internal(anyhow::Error::from(err))
            }
        }
    };
}

apperr_impl!(anyhow::Error);
apperr_impl!(serde_json::Error);
apperr_impl!(tower_sessions::session::Error);
apperr_impl!(reqwest::Error);
apperr_impl!(sqlx::migrate::MigrateError);

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        if let Some(db_err) = err.as_database_error() {
            if db_err.is_unique_violation() {
                return AppError::Conflict("already exists".to_owned());
            }
        }
        Self::Internal(anyhow::Error::from(err))
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::InvalidInput(rejection.body_text())
    }
}

impl From<BlobError> for AppError {
    fn from(err: BlobError) -> Self {
        match err {
            BlobError::InvalidPayload(msg) => AppError::InvalidInput(msg),
            other => Self::Internal(anyhow::Error::from(other)),
        }
    }
}
