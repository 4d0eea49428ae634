//! Login endpoint: credential check behind the throttle policy.

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
use super::throttle;
use super::tokens;
use super::types::{LoginRequest, UserResponse};
use super::utils::{normalize_email, valid_email, verify_password};
use super::{storage, storage::UserRecord};

#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    params(
        ("x-csrf-token" = String, Header, description = "CSRF token for the request")
    ),
    responses(
        (status = 200, description = "Login successful, session cookies set", body = UserResponse),
        (status = 401, description = "Email or password is incorrect", body = String),
        (status = 403, description = "Invalid CSRF token", body = String),
        (status = 429, description = "Too many failed attempts", body = String)
    ),
    tag = "auth"
)]
pub async fn login(
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<LoginRequest>>,
) -> Response {
    let request: LoginRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };

    let email = normalize_email(&request.email);
    if !valid_email(&email) {
        // Same response as an unknown account, so the format check leaks
        // nothing.
        return AuthError::InvalidCredentials.into_response();
    }

    match authenticate(&pool, &auth_state, &email, &request.password).await {
        Ok((headers, user)) => (StatusCode::OK, headers, Json(user)).into_response(),
        Err(err) => err.into_response(),
    }
}

async fn authenticate(
    pool: &PgPool,
    auth_state: &AuthState,
    email: &str,
    password: &str,
) -> Result<(HeaderMap, UserResponse), AuthError> {
    let user = storage::find_user_by_email(pool, email)
        .await?
        .ok_or(AuthError::InvalidCredentials)?;

    // The throttle decides whether the hash comparison runs at all.
    throttle::check_and_record(pool, user.id, || {
        verify_password(&user.password_hash, password)
    })
    .await?;

    let pair = tokens::issue_token_pair(auth_state, user.id)?;
    let mut headers = HeaderMap::new();
    tokens::attach_token_pair(&mut headers, auth_state.config(), &pair)
        .map_err(|err| AuthError::Internal(anyhow!("failed to build session cookie: {err}")))?;

    Ok((headers, user_response(user)))
}

fn user_response(user: UserRecord) -> UserResponse {
    UserResponse {
        id: user.id.to_string(),
        email: user.email,
        first_name: user.first_name,
        last_name: user.last_name,
        is_verified: user.verified,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn user_response_never_carries_the_hash() {
        let user = UserRecord {
            id: Uuid::nil(),
            email: "alice@example.com".to_string(),
            first_name: Some("Alice".to_string()),
            last_name: Some("Smith".to_string()),
            password_hash: "$argon2id$secret".to_string(),
            verified: true,
        };
        let response = user_response(user);
        let value = serde_json::to_value(&response).expect("serializable");
        assert!(value.get("password").is_none());
        assert!(value.get("passwordHash").is_none());
        assert_eq!(
            value.get("email").and_then(serde_json::Value::as_str),
            Some("alice@example.com")
        );
    }
}
