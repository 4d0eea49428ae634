//! Request guards: bearer/cookie authentication and CSRF double-submit.
//!
//! Each guard is a plain middleware function with a single contract: reject
//! with its mapped status or pass the request through unchanged.
//! `require_auth` additionally injects the authenticated [`Principal`] for
//! downstream handlers.

use axum::{
    extract::{Extension, Request},
    http::{header::SET_COOKIE, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Json, Response},
};
use std::sync::Arc;
use tracing::error;
use uuid::Uuid;

use super::error::AuthError;
use super::state::AuthState;
use super::tokens::{self, ACCESS_COOKIE_NAME};
use super::types::CsrfTokenResponse;
use super::utils::{extract_bearer_token, extract_cookie, generate_csrf_token};

pub(crate) const CSRF_COOKIE_NAME: &str = "csrfToken";
pub(crate) const CSRF_HEADER_NAME: &str = "x-csrf-token";

/// Authenticated caller, injected by [`require_auth`].
#[derive(Clone, Copy, Debug)]
pub struct Principal {
    pub user_id: Uuid,
}

/// Reject the request unless it carries a live, non-denylisted access
/// credential (bearer header or `accessToken` cookie).
pub async fn require_auth(mut request: Request, next: Next) -> Response {
    let Some(auth_state) = request.extensions().get::<Arc<AuthState>>().cloned() else {
        error!("Auth state missing from request extensions");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    };

    let token = extract_bearer_token(request.headers())
        .or_else(|| extract_cookie(request.headers(), ACCESS_COOKIE_NAME));
    let Some(token) = token else {
        return AuthError::InvalidOrExpiredToken.into_response();
    };

    let user_id = match tokens::verify_access_token(&auth_state, &token) {
        Ok(user_id) => user_id,
        Err(err) => return err.into_response(),
    };

    // A revoked credential is indistinguishable from an expired one.
    match auth_state.denylist().contains(&token).await {
        Ok(false) => {}
        Ok(true) => return AuthError::InvalidOrExpiredToken.into_response(),
        Err(err) => return AuthError::Internal(err).into_response(),
    }

    request.extensions_mut().insert(Principal { user_id });
    next.run(request).await
}

/// Reject the request unless the `x-csrf-token` header matches the
/// double-submit cookie.
pub async fn require_csrf(request: Request, next: Next) -> Response {
    let header = request
        .headers()
        .get(CSRF_HEADER_NAME)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty());
    let cookie = extract_cookie(request.headers(), CSRF_COOKIE_NAME);

    match (header, cookie) {
        (Some(header), Some(cookie)) if header == cookie => next.run(request).await,
        _ => AuthError::Forbidden.into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/auth/csrf",
    responses(
        (status = 200, description = "CSRF token issued", body = CsrfTokenResponse)
    ),
    tag = "auth"
)]
/// Issue the double-submit CSRF cookie and return its value.
pub async fn csrf_token(auth_state: Extension<Arc<AuthState>>) -> Response {
    let token = match generate_csrf_token() {
        Ok(token) => token,
        Err(err) => return AuthError::Internal(err).into_response(),
    };

    // Readable by the frontend on purpose: the double-submit check needs the
    // script to echo the value back as a header.
    let secure = if auth_state.config().cookie_secure() {
        "; Secure"
    } else {
        ""
    };
    let cookie = format!("{CSRF_COOKIE_NAME}={token}; Path=/; SameSite=Lax{secure}");
    let mut headers = HeaderMap::new();
    match cookie.parse() {
        Ok(value) => {
            headers.insert(SET_COOKIE, value);
        }
        Err(err) => {
            return AuthError::Internal(anyhow::anyhow!("invalid csrf cookie: {err}"))
                .into_response()
        }
    }

    (
        StatusCode::OK,
        headers,
        Json(CsrfTokenResponse { csrf_token: token }),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn principal_is_copyable() {
        let principal = Principal {
            user_id: Uuid::nil(),
        };
        let copy = principal;
        assert_eq!(copy.user_id, principal.user_id);
    }

    #[test]
    fn csrf_names_match_frontend_contract() {
        assert_eq!(CSRF_COOKIE_NAME, "csrfToken");
        assert_eq!(CSRF_HEADER_NAME, "x-csrf-token");
    }

    #[test]
    fn csrf_cookie_value_extractable() {
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::COOKIE,
            HeaderValue::from_static("csrfToken=abc123"),
        );
        assert_eq!(
            extract_cookie(&headers, CSRF_COOKIE_NAME),
            Some("abc123".to_string())
        );
    }
}
