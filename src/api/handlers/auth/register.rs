//! Registration endpoint: create the account, start verification, sign in.

use anyhow::anyhow;
use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use sqlx::PgPool;
use std::sync::Arc;

use super::error::AuthError;
use super::state::AuthState;
use super::storage::{self, SignupOutcome};
use super::tokens;
use super::types::{RegisterRequest, UserResponse};
use super::utils::{hash_password, normalize_email, valid_email, valid_password};

#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterRequest,
    params(
        ("x-csrf-token" = String, Header, description = "CSRF token for the request")
    ),
    responses(
        (status = 201, description = "Registration successful, session cookies set", body = UserResponse),
        (status = 400, description = "Validation error", body = String),
        (status = 403, description = "Invalid CSRF token", body = String),
        (status = 409, description = "User with this email already exists", body = String)
    ),
    tag = "auth"
)]
pub async fn register(
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<RegisterRequest>>,
) -> Response {
    let request: RegisterRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };

    let email = normalize_email(&request.email);
    if !valid_email(&email) {
        return (StatusCode::BAD_REQUEST, "Invalid email".to_string()).into_response();
    }
    if !valid_password(&request.password) {
        return (
            StatusCode::BAD_REQUEST,
            "Password must be between 8 and 128 characters".to_string(),
        )
            .into_response();
    }

    match create_account(&pool, &auth_state, &email, &request).await {
        Ok(Some((headers, user))) => (StatusCode::CREATED, headers, Json(user)).into_response(),
        Ok(None) => (
            StatusCode::CONFLICT,
            "User with this email already exists".to_string(),
        )
            .into_response(),
        Err(err) => err.into_response(),
    }
}

async fn create_account(
    pool: &PgPool,
    auth_state: &AuthState,
    email: &str,
    request: &RegisterRequest,
) -> Result<Option<(HeaderMap, UserResponse)>, AuthError> {
    let password_hash = hash_password(&request.password)?;

    // User row, verification token, and the outbound mail are committed
    // together; the worker picks the mail up asynchronously.
    let outcome = storage::insert_user_and_verification(
        pool,
        email,
        &password_hash,
        request.first_name.as_deref(),
        request.last_name.as_deref(),
        auth_state.config(),
    )
    .await?;

    let user_id = match outcome {
        SignupOutcome::Created { user_id } => user_id,
        SignupOutcome::Conflict => return Ok(None),
    };

    // Registration signs the user in immediately; verification only gates
    // the member-facing features, not the session.
    let pair = tokens::issue_token_pair(auth_state, user_id)?;
    let mut headers = HeaderMap::new();
    tokens::attach_token_pair(&mut headers, auth_state.config(), &pair)
        .map_err(|err| AuthError::Internal(anyhow!("failed to build session cookie: {err}")))?;

    Ok(Some((
        headers,
        UserResponse {
            id: user_id.to_string(),
            email: email.to_string(),
            first_name: request.first_name.clone(),
            last_name: request.last_name.clone(),
            is_verified: false,
        },
    )))
}
