use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::auth::repo::StoreError;

/// Failures surfaced by the credential service. Mapped to HTTP once, in `IntoResponse`.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("account already exists")]
    AccountAlreadyExists,

    #[error("invalid credentials")]
    InvalidCredentials,

    /// Missing or unusable bearer token on a protected route.
    #[error("unauthenticated: {0}")]
    Unauthenticated(&'static str),

    #[error("credential store unavailable: {0}")]
    Unavailable(String),

    #[error("malformed request: {0}")]
    Malformed(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AuthError {
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::Malformed(reason.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::AccountAlreadyExists => StatusCode::CONFLICT,
            AuthError::InvalidCredentials | AuthError::Unauthenticated(_) => {
                StatusCode::UNAUTHORIZED
            }
            AuthError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AuthError::Malformed(_) => StatusCode::BAD_REQUEST,
            AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show a client. Never distinguishes unknown email from wrong password.
    pub fn public_message(&self) -> String {
        match self {
            AuthError::AccountAlreadyExists => "Unable to register with the supplied details".into(),
            AuthError::InvalidCredentials => "Invalid email or password".into(),
            AuthError::Unauthenticated(reason) => (*reason).into(),
            AuthError::Unavailable(_) => "Service temporarily unavailable".into(),
            AuthError::Malformed(reason) => reason.clone(),
            AuthError::Internal(_) => "Internal server error".into(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, AuthError::Unavailable(_))
    }
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateEmail => AuthError::AccountAlreadyExists,
            StoreError::Unavailable(detail) => AuthError::Unavailable(detail),
            StoreError::Corrupt(detail) => {
                AuthError::Internal(anyhow::anyhow!("corrupt account record: {detail}"))
            }
            StoreError::Database(e) => AuthError::Internal(anyhow::Error::new(e)),
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    success: bool,
    message: String,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status();
        if let AuthError::Internal(e) = &self {
            error!(error = ?e, "internal error");
        }
        let body = ErrorBody {
            success: false,
            message: self.public_message(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_match_taxonomy() {
        assert_eq!(AuthError::AccountAlreadyExists.status(), StatusCode::CONFLICT);
        assert_eq!(AuthError::InvalidCredentials.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            AuthError::Unavailable("timeout".into()).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(AuthError::malformed("bad").status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            AuthError::Unauthenticated("Access token required").status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AuthError::Internal(anyhow::anyhow!("boom")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn internal_details_are_not_exposed() {
        let err = AuthError::Internal(anyhow::anyhow!("argon2 exploded at 0xdead"));
        assert_eq!(err.public_message(), "Internal server error");
        let err = AuthError::Unavailable("pool timed out after 5s".into());
        assert_eq!(err.public_message(), "Service temporarily unavailable");
    }

    #[test]
    fn store_errors_convert() {
        assert!(matches!(
            AuthError::from(StoreError::DuplicateEmail),
            AuthError::AccountAlreadyExists
        ));
        let err = AuthError::from(StoreError::Unavailable("down".into()));
        assert!(err.is_retryable());
        assert!(matches!(
            AuthError::from(StoreError::Corrupt("role".into())),
            AuthError::Internal(_)
        ));
    }
}
