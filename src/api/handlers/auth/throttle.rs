//! Escalating lockout for repeated failed logins.
//!
//! One `login_attempts` row exists per account that has failed at least once
//! since its last successful login; this module is the only writer. The
//! decision logic is a pure function over that row so every escalation rule
//! is testable without a database. Concurrent attempts for the same account
//! are not serialized; a lost increment on a failure counter is accepted.

use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::error::AuthError;
use super::storage;

/// Failed-attempt counter for one account.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoginAttemptRecord {
    pub user_id: Uuid,
    pub attempts_count: i32,
    pub blocked_until: Option<DateTime<Utc>>,
}

/// Persistence change requested by [`evaluate`].
#[derive(Debug, PartialEq, Eq)]
pub(super) enum StoreOp {
    Keep,
    Create,
    Update {
        attempts_count: i32,
        blocked_until: Option<DateTime<Utc>>,
    },
    Delete,
}

/// Decision outcome of one login attempt.
#[derive(Debug, PartialEq, Eq)]
pub(super) enum Outcome {
    Granted,
    Denied,
    Blocked { attempts: u32 },
}

/// Lockout window for a post-increment failure count.
///
/// Thresholds are checked lowest to highest so the highest crossed one wins.
fn escalation(attempts_count: i32, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let mut blocked_until = None;
    if attempts_count >= 5 {
        blocked_until = Some(now + Duration::minutes(15));
    }
    if attempts_count >= 10 {
        blocked_until = Some(now + Duration::minutes(60));
    }
    if attempts_count >= 15 {
        blocked_until = Some(now + Duration::days(365));
    }
    blocked_until
}

/// Decide one login attempt against the stored counter.
///
/// While a block is active the password is never compared: the closure is
/// only invoked once the account is allowed to attempt at all. The throttled
/// response carries the attempt count only at the exact threshold values
/// (5, 10, 15); a count that skips past a boundary is reported as a plain
/// denial even though the block is still armed.
pub(super) fn evaluate<F>(
    record: Option<&LoginAttemptRecord>,
    now: DateTime<Utc>,
    password_matches: F,
) -> (StoreOp, Outcome)
where
    F: FnOnce() -> bool,
{
    if let Some(record) = record {
        if let Some(blocked_until) = record.blocked_until {
            if blocked_until > now {
                let attempts = u32::try_from(record.attempts_count).unwrap_or(0);
                return (StoreOp::Keep, Outcome::Blocked { attempts });
            }
        }
    }

    if password_matches() {
        let op = if record.is_some() {
            StoreOp::Delete
        } else {
            StoreOp::Keep
        };
        return (op, Outcome::Granted);
    }

    let Some(record) = record else {
        return (StoreOp::Create, Outcome::Denied);
    };

    let attempts_count = record.attempts_count.saturating_add(1);
    let blocked_until = escalation(attempts_count, now);

    let outcome = if matches!(attempts_count, 5 | 10 | 15) {
        Outcome::Blocked {
            attempts: u32::try_from(attempts_count).unwrap_or(0),
        }
    } else {
        Outcome::Denied
    };

    (
        StoreOp::Update {
            attempts_count,
            blocked_until,
        },
        outcome,
    )
}

/// Gate one credential check and persist the resulting counter state.
///
/// `password_matches` is only called when no block is active.
///
/// # Errors
/// `RateLimited` while blocked or at an exact escalation threshold,
/// `InvalidCredentials` on any other mismatch, `Internal` on storage errors.
pub(super) async fn check_and_record<F>(
    pool: &PgPool,
    user_id: Uuid,
    password_matches: F,
) -> Result<(), AuthError>
where
    F: FnOnce() -> bool,
{
    let record = storage::find_login_attempt(pool, user_id).await?;
    let (op, outcome) = evaluate(record.as_ref(), Utc::now(), password_matches);

    match op {
        StoreOp::Keep => {}
        StoreOp::Create => storage::insert_login_attempt(pool, user_id).await?,
        StoreOp::Update {
            attempts_count,
            blocked_until,
        } => storage::update_login_attempt(pool, user_id, attempts_count, blocked_until).await?,
        StoreOp::Delete => storage::delete_login_attempt(pool, user_id).await?,
    }

    match outcome {
        Outcome::Granted => Ok(()),
        Outcome::Denied => Err(AuthError::InvalidCredentials),
        Outcome::Blocked { attempts } => Err(AuthError::RateLimited { attempts }),
    }
}
