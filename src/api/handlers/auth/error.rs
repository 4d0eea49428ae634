//! Error taxonomy for the auth endpoints.
//!
//! `InvalidCredentials` never says whether the email or the password was
//! wrong, so accounts cannot be enumerated through the login endpoint.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Email or password is incorrect")]
    InvalidCredentials,

    #[error("Too many failed attempts. Please try again later")]
    RateLimited { attempts: u32 },

    #[error("Invalid or expired token")]
    InvalidOrExpiredToken,

    #[error("Invalid CSRF token")]
    Forbidden,

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        match self {
            Self::InvalidCredentials | Self::InvalidOrExpiredToken => {
                (StatusCode::UNAUTHORIZED, self.to_string()).into_response()
            }
            Self::RateLimited { attempts } => (
                StatusCode::TOO_MANY_REQUESTS,
                Json(json!({
                    "message": self.to_string(),
                    "attemptsCount": attempts,
                })),
            )
                .into_response(),
            Self::Forbidden => (StatusCode::FORBIDDEN, self.to_string()).into_response(),
            Self::Internal(err) => {
                error!("Internal auth error: {err:#}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
                    .into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_match_taxonomy() {
        assert_eq!(
            AuthError::InvalidCredentials.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AuthError::RateLimited { attempts: 5 }
                .into_response()
                .status(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            AuthError::InvalidOrExpiredToken.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AuthError::Forbidden.into_response().status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AuthError::Internal(anyhow::anyhow!("boom"))
                .into_response()
                .status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn credential_errors_never_name_the_field() {
        let message = AuthError::InvalidCredentials.to_string();
        assert_eq!(message, "Email or password is incorrect");
    }
}
