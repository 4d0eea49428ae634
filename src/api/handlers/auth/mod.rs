//! Auth handlers and supporting modules.
//!
//! This module coordinates credential checks, the session token lifecycle,
//! and email verification.
//!
//! ## Login throttling
//!
//! Failed logins per account escalate through lockout windows: 5 cumulative
//! failures block for 15 minutes, 10 for 60 minutes, 15 for 365 days. The
//! counter row is deleted on the next successful login, so the escalation
//! restarts from scratch afterwards.
//!
//! ## Session credentials
//!
//! Access and refresh JWTs ride in `HttpOnly` cookies and are signed with
//! distinct secrets. Logout puts both tokens on a Redis denylist for their
//! remaining lifetime; the auth guard and the refresh path reject
//! denylisted credentials exactly like expired ones.

mod denylist;
mod error;
pub(crate) mod guard;
pub(crate) mod login;
pub(crate) mod register;
pub(crate) mod session;
mod state;
mod storage;
mod throttle;
mod tokens;
pub(crate) mod types;
mod utils;
pub(crate) mod verification;

pub use denylist::{DenyStore, RedisDenylist};
pub use error::AuthError;
pub use guard::Principal;
pub use state::{AuthConfig, AuthState};
pub use throttle::LoginAttemptRecord;
pub use tokens::{RevokeOutcome, TokenKeys, TokenPair};
