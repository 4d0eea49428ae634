//! Email verification endpoints.

use axum::{
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use sqlx::PgPool;
use tracing::{debug, error};

use super::state::AuthState;
use super::storage::{consume_verification_token, enqueue_resend_verification, ResendOutcome};
use super::types::{MessageResponse, ResendVerificationRequest, VerifyEmailRequest};
use super::utils::{hash_verification_token, normalize_email, valid_email};
use std::sync::Arc;

#[utoipa::path(
    post,
    path = "/auth/verify-email",
    request_body = VerifyEmailRequest,
    responses(
        (status = 200, description = "Email verified", body = MessageResponse),
        (status = 400, description = "Invalid or expired verification token", body = String)
    ),
    tag = "auth"
)]
pub async fn verify_email(
    pool: Extension<PgPool>,
    payload: Option<Json<VerifyEmailRequest>>,
) -> Response {
    let request: VerifyEmailRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };

    let token = request.token.trim();
    if token.is_empty() {
        return (StatusCode::BAD_REQUEST, "Missing token".to_string()).into_response();
    }
    let token_hash = hash_verification_token(token);

    let mut tx = match pool.begin().await {
        Ok(tx) => tx,
        Err(err) => {
            error!("Failed to begin verification transaction: {err}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    match consume_verification_token(&mut tx, &token_hash).await {
        Ok(true) => {
            if let Err(err) = tx.commit().await {
                error!("Failed to commit verification: {err}");
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
            (
                StatusCode::OK,
                Json(MessageResponse {
                    message: "Email verified successfully".to_string(),
                }),
            )
                .into_response()
        }
        Ok(false) => {
            let _ = tx.rollback().await;
            (
                StatusCode::BAD_REQUEST,
                "Invalid or expired verification token".to_string(),
            )
                .into_response()
        }
        Err(err) => {
            error!("Failed to consume verification token: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[utoipa::path(
    post,
    path = "/auth/resend-verification",
    request_body = ResendVerificationRequest,
    responses(
        (status = 204, description = "Accepted; a new mail is queued if applicable")
    ),
    tag = "auth"
)]
/// Always returns 204 so the endpoint cannot be used to probe for accounts.
pub async fn resend_verification(
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<ResendVerificationRequest>>,
) -> Response {
    let Some(Json(request)) = payload else {
        return StatusCode::NO_CONTENT.into_response();
    };

    let email = normalize_email(&request.email);
    if !valid_email(&email) {
        return StatusCode::NO_CONTENT.into_response();
    }

    match enqueue_resend_verification(&pool, &email, auth_state.config()).await {
        Ok(ResendOutcome::Queued) => debug!("Verification mail queued"),
        Ok(ResendOutcome::Cooldown) => debug!("Verification resend within cooldown"),
        Ok(ResendOutcome::Noop) => debug!("Verification resend is a noop"),
        Err(err) => error!("Failed to enqueue verification resend: {err}"),
    }

    StatusCode::NO_CONTENT.into_response()
}
