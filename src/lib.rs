//! # Collega (Membership Platform API)
//!
//! `collega` is the accounts and session backend for the Collega membership
//! platform. It handles registration, login, email verification, and the
//! session credential lifecycle for the member-facing frontend.
//!
//! ## Sessions (JWT cookie pair)
//!
//! Sessions are a pair of HS256 JWTs delivered as `HttpOnly` cookies: a
//! short-lived access token and a long-lived refresh token, signed with
//! distinct secrets. Logout denylists both tokens in Redis until their
//! natural expiry, so a revoked credential is rejected everywhere even
//! though verification itself is offline.
//!
//! ## Login throttling
//!
//! Failed logins are throttled per account with escalating lockout windows
//! (15 minutes, 60 minutes, then effectively permanent). The counter record
//! is owned exclusively by the throttle policy and removed on the next
//! successful authentication.
//!
//! Failed and throttled logins both surface a generic "email or password is
//! incorrect" message to callers where possible, so account existence cannot
//! be probed through the login endpoint.

pub mod api;
pub mod cli;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_commit_hash_format() {
        if GIT_COMMIT_HASH == "unknown" {
            // Acceptable in non-git build environments
            return;
        }
        assert!(
            GIT_COMMIT_HASH.chars().all(|c| c.is_ascii_hexdigit()),
            "GIT_COMMIT_HASH should be a hex string, got: {GIT_COMMIT_HASH}"
        );
        assert!(
            GIT_COMMIT_HASH.len() >= 7,
            "GIT_COMMIT_HASH should be at least 7 characters long, got: {GIT_COMMIT_HASH}"
        );
    }
}
