//! Session endpoints: refresh, logout, and introspection.

use axum::{
    extract::Extension,
    http::{header::SET_COOKIE, HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use std::sync::Arc;
use tracing::warn;

use super::error::AuthError;
use super::state::AuthState;
use super::tokens::{self, RevokeOutcome, ACCESS_COOKIE_NAME, REFRESH_COOKIE_NAME};
use super::types::{MessageResponse, SessionResponse};
use super::utils::{extract_bearer_token, extract_cookie};

#[utoipa::path(
    post,
    path = "/auth/refresh-token",
    params(
        ("x-csrf-token" = String, Header, description = "CSRF token for the request")
    ),
    responses(
        (status = 204, description = "New access cookie issued"),
        (status = 401, description = "Invalid or expired refresh token", body = String),
        (status = 403, description = "Invalid CSRF token", body = String)
    ),
    tag = "auth"
)]
/// Mint a fresh access token from the refresh cookie.
///
/// The refresh token itself is not rotated on this path; it stays valid for
/// its original lifetime unless logout denylists it.
pub async fn refresh_token(
    headers: HeaderMap,
    auth_state: Extension<Arc<AuthState>>,
) -> Response {
    match rotate_access_token(&headers, &auth_state).await {
        Ok(response_headers) => (StatusCode::NO_CONTENT, response_headers).into_response(),
        Err(err) => err.into_response(),
    }
}

async fn rotate_access_token(
    headers: &HeaderMap,
    auth_state: &AuthState,
) -> Result<HeaderMap, AuthError> {
    let token =
        extract_cookie(headers, REFRESH_COOKIE_NAME).ok_or(AuthError::InvalidOrExpiredToken)?;

    // A denylisted refresh token is as dead as an expired one.
    if auth_state.denylist().contains(&token).await? {
        return Err(AuthError::InvalidOrExpiredToken);
    }

    let user_id = tokens::verify_refresh_token(auth_state, &token)?;
    let access_token = tokens::issue_access_token(auth_state, user_id)?;

    let mut response_headers = HeaderMap::new();
    let cookie = tokens::token_cookie(
        auth_state.config(),
        ACCESS_COOKIE_NAME,
        &access_token,
        auth_state.config().access_token_ttl_seconds(),
    )
    .map_err(|err| {
        AuthError::Internal(anyhow::anyhow!("failed to build access cookie: {err}"))
    })?;
    response_headers.insert(SET_COOKIE, cookie);
    Ok(response_headers)
}

#[utoipa::path(
    post,
    path = "/auth/logout",
    params(
        ("x-csrf-token" = String, Header, description = "CSRF token for the request")
    ),
    responses(
        (status = 200, description = "Session revoked, cookies cleared", body = MessageResponse),
        (status = 401, description = "Token is invalid", body = String),
        (status = 403, description = "Invalid CSRF token", body = String)
    ),
    tag = "auth"
)]
/// Denylist both session tokens and clear their cookies.
///
/// Revocation is best effort: cookies are cleared and 200 returned even when
/// a token cannot be decoded or the denylist write fails.
pub async fn logout(headers: HeaderMap, auth_state: Extension<Arc<AuthState>>) -> Response {
    let access_token = extract_cookie(&headers, ACCESS_COOKIE_NAME);
    let refresh_token = extract_cookie(&headers, REFRESH_COOKIE_NAME);

    let outcome = tokens::revoke(
        auth_state.denylist(),
        access_token.as_deref(),
        refresh_token.as_deref(),
    )
    .await;
    if outcome == RevokeOutcome::PartiallyRevoked {
        warn!("Logout revoked the session only partially; cookies cleared anyway");
    }

    let mut response_headers = HeaderMap::new();
    tokens::attach_cleared_cookies(&mut response_headers, auth_state.config());

    (
        StatusCode::OK,
        response_headers,
        Json(MessageResponse {
            message: "Logged out successfully".to_string(),
        }),
    )
        .into_response()
}

#[utoipa::path(
    get,
    path = "/auth/session",
    responses(
        (status = 200, description = "Session is active", body = SessionResponse),
        (status = 204, description = "No active session")
    ),
    tag = "auth"
)]
/// Introspect the current session without ever returning 401.
///
/// Missing, invalid, and revoked credentials all look the same: 204.
pub async fn session(headers: HeaderMap, auth_state: Extension<Arc<AuthState>>) -> Response {
    let token = extract_bearer_token(&headers)
        .or_else(|| extract_cookie(&headers, ACCESS_COOKIE_NAME));
    let Some(token) = token else {
        return StatusCode::NO_CONTENT.into_response();
    };

    let Ok(user_id) = tokens::verify_access_token(&auth_state, &token) else {
        return StatusCode::NO_CONTENT.into_response();
    };

    match auth_state.denylist().contains(&token).await {
        Ok(false) => (
            StatusCode::OK,
            Json(SessionResponse {
                user_id: user_id.to_string(),
            }),
        )
            .into_response(),
        Ok(true) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => AuthError::Internal(err).into_response(),
    }
}
