//! Session credential lifecycle: issue, verify, attach, revoke.
//!
//! A session is a pair of HS256 JWTs carried in `HttpOnly` cookies: a
//! short-lived access token and a long-lived refresh token, signed with
//! distinct secrets so one can never pass for the other. The refresh path
//! re-issues the access token only; the refresh token keeps its original
//! lifetime until logout denylists it or it expires on its own.

use anyhow::{anyhow, Result};
use axum::http::{
    header::{InvalidHeaderValue, SET_COOKIE},
    HeaderMap, HeaderValue,
};
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use super::denylist::DenyStore;
use super::error::AuthError;
use super::state::{AuthConfig, AuthState};

pub(crate) const ACCESS_COOKIE_NAME: &str = "accessToken";
pub(crate) const REFRESH_COOKIE_NAME: &str = "refreshToken";

/// Claims carried by both token kinds.
#[derive(Debug, Serialize, Deserialize)]
pub(super) struct Claims {
    pub(super) sub: String,
    pub(super) iat: i64,
    pub(super) exp: i64,
}

/// One freshly issued access/refresh pair. Never persisted.
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Signing and verification keys, one pair per token kind.
pub struct TokenKeys {
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
}

impl TokenKeys {
    #[must_use]
    pub fn from_secrets(access_secret: &SecretString, refresh_secret: &SecretString) -> Self {
        Self {
            access_encoding: EncodingKey::from_secret(access_secret.expose_secret().as_bytes()),
            access_decoding: DecodingKey::from_secret(access_secret.expose_secret().as_bytes()),
            refresh_encoding: EncodingKey::from_secret(refresh_secret.expose_secret().as_bytes()),
            refresh_decoding: DecodingKey::from_secret(refresh_secret.expose_secret().as_bytes()),
        }
    }
}

fn sign_token(key: &EncodingKey, user_id: Uuid, ttl_seconds: i64) -> Result<String> {
    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: user_id.to_string(),
        iat: now,
        exp: now + ttl_seconds,
    };
    encode(&Header::new(Algorithm::HS256), &claims, key)
        .map_err(|err| anyhow!("failed to sign token: {err}"))
}

fn strict_validation() -> Validation {
    let mut validation = Validation::new(Algorithm::HS256);
    // No leeway: an expired credential is expired.
    validation.leeway = 0;
    validation
}

fn verify_token(key: &DecodingKey, token: &str) -> Result<Uuid, AuthError> {
    // Signature, expiry, and malformed-subject failures are deliberately
    // indistinguishable to the caller.
    decode::<Claims>(token, key, &strict_validation())
        .ok()
        .and_then(|data| Uuid::parse_str(&data.claims.sub).ok())
        .ok_or(AuthError::InvalidOrExpiredToken)
}

/// Produce a new access/refresh pair for `user_id`. No side effects.
pub(super) fn issue_token_pair(state: &AuthState, user_id: Uuid) -> Result<TokenPair, AuthError> {
    let access_token = sign_token(
        &state.keys().access_encoding,
        user_id,
        state.config().access_token_ttl_seconds(),
    )?;
    let refresh_token = sign_token(
        &state.keys().refresh_encoding,
        user_id,
        state.config().refresh_token_ttl_seconds(),
    )?;
    Ok(TokenPair {
        access_token,
        refresh_token,
    })
}

/// Issue a new access token only, for the refresh path.
pub(super) fn issue_access_token(state: &AuthState, user_id: Uuid) -> Result<String, AuthError> {
    Ok(sign_token(
        &state.keys().access_encoding,
        user_id,
        state.config().access_token_ttl_seconds(),
    )?)
}

pub(super) fn verify_access_token(state: &AuthState, token: &str) -> Result<Uuid, AuthError> {
    verify_token(&state.keys().access_decoding, token)
}

pub(super) fn verify_refresh_token(state: &AuthState, token: &str) -> Result<Uuid, AuthError> {
    verify_token(&state.keys().refresh_decoding, token)
}

/// Read the expiry claim without verifying the signature.
///
/// Used only when deciding how long a denylist entry should live; a token we
/// cannot decode cannot be denylisted either.
fn decode_expiry(token: &str) -> Option<i64> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.required_spec_claims.clear();
    decode::<Claims>(token, &DecodingKey::from_secret(&[]), &validation)
        .ok()
        .map(|data| data.claims.exp)
}

/// Best-effort outcome of a logout revocation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RevokeOutcome {
    /// Every presented, still-live token is now denylisted.
    FullyRevoked,
    /// At least one token could not be decoded or stored; cookies are
    /// cleared regardless.
    PartiallyRevoked,
}

/// Denylist each presented token for its remaining lifetime.
///
/// Never fails: logout must always look successful to the client. Already
/// expired tokens need no entry and still count as fully revoked.
pub(super) async fn revoke(
    denylist: &dyn DenyStore,
    access_token: Option<&str>,
    refresh_token: Option<&str>,
) -> RevokeOutcome {
    let mut outcome = RevokeOutcome::FullyRevoked;

    for token in [access_token, refresh_token].into_iter().flatten() {
        let Some(exp) = decode_expiry(token) else {
            warn!("Skipping revocation of undecodable token");
            outcome = RevokeOutcome::PartiallyRevoked;
            continue;
        };

        let remaining = exp - Utc::now().timestamp();
        let Ok(ttl_seconds) = u64::try_from(remaining) else {
            // Already expired; the verifier rejects it without our help.
            continue;
        };
        if ttl_seconds == 0 {
            continue;
        }

        if let Err(err) = denylist.deny(token, ttl_seconds).await {
            warn!("Failed to denylist token: {err}");
            outcome = RevokeOutcome::PartiallyRevoked;
        }
    }

    outcome
}

/// Build a session cookie for one token.
pub(super) fn token_cookie(
    config: &AuthConfig,
    name: &str,
    token: &str,
    max_age_seconds: i64,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let domain = config.cookie_domain();
    let mut cookie = format!(
        "{name}={token}; Path=/; HttpOnly; SameSite=Lax; Domain={domain}; Max-Age={max_age_seconds}"
    );
    if config.cookie_secure() {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

pub(super) fn clear_cookie(
    config: &AuthConfig,
    name: &str,
) -> Result<HeaderValue, InvalidHeaderValue> {
    token_cookie(config, name, "", 0)
}

/// Append both session cookies to the response headers.
pub(super) fn attach_token_pair(
    headers: &mut HeaderMap,
    config: &AuthConfig,
    pair: &TokenPair,
) -> Result<(), InvalidHeaderValue> {
    headers.append(
        SET_COOKIE,
        token_cookie(
            config,
            ACCESS_COOKIE_NAME,
            &pair.access_token,
            config.access_token_ttl_seconds(),
        )?,
    );
    headers.append(
        SET_COOKIE,
        token_cookie(
            config,
            REFRESH_COOKIE_NAME,
            &pair.refresh_token,
            config.refresh_token_ttl_seconds(),
        )?,
    );
    Ok(())
}

/// Append cleared session cookies to the response headers.
pub(super) fn attach_cleared_cookies(headers: &mut HeaderMap, config: &AuthConfig) {
    for name in [ACCESS_COOKIE_NAME, REFRESH_COOKIE_NAME] {
        if let Ok(cookie) = clear_cookie(config, name) {
            headers.append(SET_COOKIE, cookie);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::denylist::{DenyStore, MemoryDenylist};
    use super::super::state::{AuthConfig, AuthState};
    use super::*;
    use std::sync::Arc;

    fn test_state() -> AuthState {
        let config = AuthConfig::new(
            "https://collega.dev".to_string(),
            "collega.dev".to_string(),
        );
        let keys = TokenKeys::from_secrets(
            &SecretString::from("access-secret"),
            &SecretString::from("refresh-secret"),
        );
        AuthState::new(config, keys, Arc::new(MemoryDenylist::new()))
    }

    fn short_lived_state(access_ttl: i64, refresh_ttl: i64) -> AuthState {
        let config = AuthConfig::new(
            "https://collega.dev".to_string(),
            "collega.dev".to_string(),
        )
        .with_access_token_ttl_seconds(access_ttl)
        .with_refresh_token_ttl_seconds(refresh_ttl);
        let keys = TokenKeys::from_secrets(
            &SecretString::from("access-secret"),
            &SecretString::from("refresh-secret"),
        );
        AuthState::new(config, keys, Arc::new(MemoryDenylist::new()))
    }

    #[test]
    fn refresh_token_round_trips_user_id() -> anyhow::Result<()> {
        let state = test_state();
        let user_id = Uuid::new_v4();
        let pair = issue_token_pair(&state, user_id).map_err(|err| anyhow::anyhow!("{err}"))?;

        assert_eq!(verify_refresh_token(&state, &pair.refresh_token).ok(), Some(user_id));
        assert_eq!(verify_access_token(&state, &pair.access_token).ok(), Some(user_id));
        Ok(())
    }

    #[test]
    fn tokens_do_not_cross_verify() -> anyhow::Result<()> {
        // Distinct secrets: an access token must fail refresh verification.
        let state = test_state();
        let pair = issue_token_pair(&state, Uuid::new_v4())
            .map_err(|err| anyhow::anyhow!("{err}"))?;

        assert!(verify_refresh_token(&state, &pair.access_token).is_err());
        assert!(verify_access_token(&state, &pair.refresh_token).is_err());
        Ok(())
    }

    #[test]
    fn expired_token_fails_verification() -> anyhow::Result<()> {
        let state = short_lived_state(-120, -120);
        let pair = issue_token_pair(&state, Uuid::new_v4())
            .map_err(|err| anyhow::anyhow!("{err}"))?;

        assert!(matches!(
            verify_refresh_token(&state, &pair.refresh_token),
            Err(AuthError::InvalidOrExpiredToken)
        ));
        Ok(())
    }

    #[test]
    fn garbage_token_fails_verification() {
        let state = test_state();
        assert!(matches!(
            verify_refresh_token(&state, "not-a-token"),
            Err(AuthError::InvalidOrExpiredToken)
        ));
    }

    #[test]
    fn decode_expiry_ignores_signature() -> anyhow::Result<()> {
        let state = test_state();
        let pair = issue_token_pair(&state, Uuid::new_v4())
            .map_err(|err| anyhow::anyhow!("{err}"))?;

        let exp = decode_expiry(&pair.access_token).expect("expiry should decode");
        let remaining = exp - Utc::now().timestamp();
        assert!(remaining > 0 && remaining <= 15 * 60);

        assert_eq!(decode_expiry("garbage"), None);
        Ok(())
    }

    #[tokio::test]
    async fn revoke_denies_live_tokens_for_remaining_lifetime() -> anyhow::Result<()> {
        let state = test_state();
        let denylist = MemoryDenylist::new();
        let pair = issue_token_pair(&state, Uuid::new_v4())
            .map_err(|err| anyhow::anyhow!("{err}"))?;

        let outcome = revoke(
            &denylist,
            Some(&pair.access_token),
            Some(&pair.refresh_token),
        )
        .await;

        assert_eq!(outcome, RevokeOutcome::FullyRevoked);
        assert!(denylist.contains(&pair.access_token).await?);
        assert!(denylist.contains(&pair.refresh_token).await?);

        // TTL tracks the remaining token lifetime, not a fixed constant.
        let access_ttl = denylist
            .ttl_seconds(&pair.access_token)
            .expect("access entry present");
        assert!((1..=15 * 60).contains(&access_ttl));
        let refresh_ttl = denylist
            .ttl_seconds(&pair.refresh_token)
            .expect("refresh entry present");
        assert!(refresh_ttl > access_ttl);
        Ok(())
    }

    #[tokio::test]
    async fn revoke_skips_expired_tokens_without_failing() -> anyhow::Result<()> {
        let state = short_lived_state(-120, -120);
        let denylist = MemoryDenylist::new();
        let pair = issue_token_pair(&state, Uuid::new_v4())
            .map_err(|err| anyhow::anyhow!("{err}"))?;

        let outcome = revoke(&denylist, Some(&pair.access_token), None).await;

        assert_eq!(outcome, RevokeOutcome::FullyRevoked);
        assert!(!denylist.contains(&pair.access_token).await?);
        Ok(())
    }

    #[tokio::test]
    async fn revoke_reports_partial_on_undecodable_token() {
        let denylist = MemoryDenylist::new();
        let outcome = revoke(&denylist, Some("not-a-token"), None).await;
        assert_eq!(outcome, RevokeOutcome::PartiallyRevoked);
    }

    #[tokio::test]
    async fn revoke_with_no_tokens_is_fully_revoked() {
        let denylist = MemoryDenylist::new();
        assert_eq!(revoke(&denylist, None, None).await, RevokeOutcome::FullyRevoked);
    }

    #[test]
    fn token_cookie_carries_session_attributes() -> anyhow::Result<()> {
        let state = test_state();
        let cookie = token_cookie(state.config(), ACCESS_COOKIE_NAME, "token", 900)?;
        let value = cookie.to_str()?;

        assert!(value.starts_with("accessToken=token;"));
        assert!(value.contains("HttpOnly"));
        assert!(value.contains("SameSite=Lax"));
        assert!(value.contains("Domain=collega.dev"));
        assert!(value.contains("Max-Age=900"));
        assert!(value.contains("Secure"));
        Ok(())
    }

    #[test]
    fn clear_cookie_zeroes_value_and_age() -> anyhow::Result<()> {
        let state = test_state();
        let cookie = clear_cookie(state.config(), REFRESH_COOKIE_NAME)?;
        let value = cookie.to_str()?;

        assert!(value.starts_with("refreshToken=;"));
        assert!(value.contains("Max-Age=0"));
        Ok(())
    }

    #[test]
    fn attach_token_pair_sets_both_cookies() -> anyhow::Result<()> {
        let state = test_state();
        let pair = issue_token_pair(&state, Uuid::new_v4())
            .map_err(|err| anyhow::anyhow!("{err}"))?;

        let mut headers = HeaderMap::new();
        attach_token_pair(&mut headers, state.config(), &pair)?;

        let cookies: Vec<_> = headers
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .collect();
        assert_eq!(cookies.len(), 2);
        assert!(cookies.iter().any(|c| c.starts_with("accessToken=")));
        assert!(cookies.iter().any(|c| c.starts_with("refreshToken=")));
        Ok(())
    }
}
