//! Database helpers for accounts, login attempts, and verification state.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde_json::json;
use sqlx::{PgPool, Row};
use tracing::Instrument;
use uuid::Uuid;

use super::state::AuthConfig;
use super::throttle::LoginAttemptRecord;
use super::utils::{
    build_verify_url, generate_verification_token, hash_verification_token, is_unique_violation,
};

/// Outcome when attempting to create a new user + verification record.
#[derive(Debug)]
pub(super) enum SignupOutcome {
    Created { user_id: Uuid },
    Conflict,
}

/// Outcome for a resend request (always 204 to avoid account probing).
#[derive(Debug)]
pub(super) enum ResendOutcome {
    Queued,
    Cooldown,
    Noop,
}

/// Fields needed to authenticate a login attempt.
pub(super) struct UserRecord {
    pub(super) id: Uuid,
    pub(super) email: String,
    pub(super) first_name: Option<String>,
    pub(super) last_name: Option<String>,
    pub(super) password_hash: String,
    pub(super) verified: bool,
}

/// Look up credential data by email.
pub(super) async fn find_user_by_email(pool: &PgPool, email: &str) -> Result<Option<UserRecord>> {
    let query = r"
        SELECT id, email, first_name, last_name, password_hash,
               email_verified_at IS NOT NULL AS verified
        FROM users
        WHERE email = $1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(email)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup user by email")?;

    Ok(row.map(|row| UserRecord {
        id: row.get("id"),
        email: row.get("email"),
        first_name: row.get("first_name"),
        last_name: row.get("last_name"),
        password_hash: row.get("password_hash"),
        verified: row.get("verified"),
    }))
}

/// Read the failed-attempt counter for one account.
pub(super) async fn find_login_attempt(
    pool: &PgPool,
    user_id: Uuid,
) -> Result<Option<LoginAttemptRecord>> {
    let query = "SELECT user_id, attempts_count, blocked_until FROM login_attempts WHERE user_id = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(user_id)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup login attempts")?;

    Ok(row.map(|row| LoginAttemptRecord {
        user_id: row.get("user_id"),
        attempts_count: row.get("attempts_count"),
        blocked_until: row.get("blocked_until"),
    }))
}

/// Create the counter at one failed attempt, no block.
///
/// Two concurrent first failures may race; losing one increment is accepted,
/// so the conflicting insert is simply dropped.
pub(super) async fn insert_login_attempt(pool: &PgPool, user_id: Uuid) -> Result<()> {
    let query = r"
        INSERT INTO login_attempts (user_id, attempts_count)
        VALUES ($1, 1)
        ON CONFLICT (user_id) DO NOTHING
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    sqlx::query(query)
        .bind(user_id)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to insert login attempt")?;
    Ok(())
}

pub(super) async fn update_login_attempt(
    pool: &PgPool,
    user_id: Uuid,
    attempts_count: i32,
    blocked_until: Option<DateTime<Utc>>,
) -> Result<()> {
    let query = r"
        UPDATE login_attempts
        SET attempts_count = $2,
            blocked_until = $3
        WHERE user_id = $1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(user_id)
        .bind(attempts_count)
        .bind(blocked_until)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to update login attempt")?;
    Ok(())
}

/// Reset on successful authentication; idempotent if no row exists.
pub(super) async fn delete_login_attempt(pool: &PgPool, user_id: Uuid) -> Result<()> {
    let query = "DELETE FROM login_attempts WHERE user_id = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(user_id)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to delete login attempt")?;
    Ok(())
}

pub(super) async fn insert_user_and_verification(
    pool: &PgPool,
    email: &str,
    password_hash: &str,
    first_name: Option<&str>,
    last_name: Option<&str>,
    config: &AuthConfig,
) -> Result<SignupOutcome> {
    // Transaction ensures user creation, verification token, and mail outbox
    // row stay consistent even if something fails.
    let mut tx = pool.begin().await.context("begin signup transaction")?;

    let query = r"
        INSERT INTO users
            (email, password_hash, first_name, last_name)
        VALUES ($1, $2, $3, $4)
        RETURNING id
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(email)
        .bind(password_hash)
        .bind(first_name)
        .bind(last_name)
        .fetch_one(&mut *tx)
        .instrument(span)
        .await;

    let user_id: Uuid = match row {
        Ok(row) => row.get("id"),
        Err(err) => {
            if is_unique_violation(&err) {
                let _ = tx.rollback().await;
                return Ok(SignupOutcome::Conflict);
            }
            return Err(err).context("failed to insert user");
        }
    };

    let _token = insert_verification_records(&mut tx, user_id, email, config).await?;

    tx.commit().await.context("commit signup transaction")?;

    Ok(SignupOutcome::Created { user_id })
}

pub(super) async fn insert_verification_records(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    user_id: Uuid,
    email: &str,
    config: &AuthConfig,
) -> Result<String> {
    // Generate a raw token for the email link and store only its hash.
    let token = generate_verification_token()?;
    let token_hash = hash_verification_token(&token);

    let query = r"
        INSERT INTO email_verification_tokens
            (user_id, token_hash, expires_at)
        VALUES ($1, $2, NOW() + ($3 * INTERVAL '1 second'))
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    sqlx::query(query)
        .bind(user_id)
        .bind(token_hash)
        .bind(config.email_token_ttl_seconds())
        .execute(&mut **tx)
        .instrument(span)
        .await
        .context("failed to insert email verification token")?;

    let verify_url = build_verify_url(config.frontend_base_url(), &token);
    let payload_json = json!({
        "email": email,
        "verify_url": verify_url,
    });
    let payload_text =
        serde_json::to_string(&payload_json).context("failed to serialize mail payload")?;

    let query = r"
        INSERT INTO mail_outbox (to_email, template, payload_json)
        VALUES ($1, $2, $3::jsonb)
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    sqlx::query(query)
        .bind(email)
        .bind("verify_email")
        .bind(payload_text)
        .execute(&mut **tx)
        .instrument(span)
        .await
        .context("failed to insert mail outbox row")?;

    Ok(token)
}

pub(super) async fn consume_verification_token(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    token_hash: &[u8],
) -> Result<bool> {
    // Mark the token consumed if still valid; then flag the user verified in
    // the same transaction.
    let query = r"
        UPDATE email_verification_tokens
        SET consumed_at = NOW()
        WHERE token_hash = $1
          AND consumed_at IS NULL
          AND expires_at > NOW()
        RETURNING user_id
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(token_hash)
        .fetch_optional(&mut **tx)
        .instrument(span)
        .await
        .context("failed to consume verification token")?;

    let Some(row) = row else {
        return Ok(false);
    };

    let user_id: Uuid = row.get("user_id");
    let query = r"
        UPDATE users
        SET email_verified_at = NOW(),
            updated_at = NOW()
        WHERE id = $1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(user_id)
        .execute(&mut **tx)
        .instrument(span)
        .await
        .context("failed to update user verification state")?;

    Ok(true)
}

pub(super) async fn enqueue_resend_verification(
    pool: &PgPool,
    email: &str,
    config: &AuthConfig,
) -> Result<ResendOutcome> {
    // Resend is intentionally opaque: callers always get 204 to avoid
    // account probing.
    let mut tx = pool.begin().await.context("begin resend transaction")?;

    let query = r"
        SELECT id, email, email_verified_at
        FROM users
        WHERE email = $1
        LIMIT 1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(email)
        .fetch_optional(&mut *tx)
        .instrument(span)
        .await
        .context("failed to lookup user for resend")?;

    let Some(row) = row else {
        tx.commit().await.context("commit resend noop")?;
        return Ok(ResendOutcome::Noop);
    };

    let verified_at: Option<DateTime<Utc>> = row.get("email_verified_at");
    if verified_at.is_some() {
        tx.commit().await.context("commit resend noop")?;
        return Ok(ResendOutcome::Noop);
    }

    let user_id: Uuid = row.get("id");
    if resend_cooldown_active(&mut tx, user_id, config.resend_cooldown_seconds()).await? {
        tx.commit().await.context("commit resend cooldown")?;
        return Ok(ResendOutcome::Cooldown);
    }

    let email: String = row.get("email");
    let _ = insert_verification_records(&mut tx, user_id, &email, config).await?;
    tx.commit().await.context("commit resend enqueue")?;
    Ok(ResendOutcome::Queued)
}

async fn resend_cooldown_active(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    user_id: Uuid,
    cooldown_seconds: i64,
) -> Result<bool> {
    // Cooldown prevents repeated resend requests from spamming the outbox.
    let query = r"
        SELECT 1
        FROM email_verification_tokens
        WHERE user_id = $1
          AND created_at > NOW() - ($2 * INTERVAL '1 second')
        LIMIT 1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(user_id)
        .bind(cooldown_seconds)
        .fetch_optional(&mut **tx)
        .instrument(span)
        .await
        .context("failed to check resend cooldown")?;
    Ok(row.is_some())
}

#[cfg(test)]
mod tests {
    use super::{ResendOutcome, SignupOutcome, UserRecord};
    use uuid::Uuid;

    #[test]
    fn signup_outcome_debug_names() {
        let created = SignupOutcome::Created {
            user_id: Uuid::nil(),
        };
        assert!(format!("{created:?}").starts_with("Created"));
        assert_eq!(format!("{:?}", SignupOutcome::Conflict), "Conflict");
    }

    #[test]
    fn resend_outcome_debug_names() {
        assert_eq!(format!("{:?}", ResendOutcome::Queued), "Queued");
        assert_eq!(format!("{:?}", ResendOutcome::Cooldown), "Cooldown");
        assert_eq!(format!("{:?}", ResendOutcome::Noop), "Noop");
    }

    #[test]
    fn user_record_holds_values() {
        let record = UserRecord {
            id: Uuid::nil(),
            email: "alice@example.com".to_string(),
            first_name: Some("Alice".to_string()),
            last_name: None,
            password_hash: "$argon2id$stub".to_string(),
            verified: false,
        };
        assert_eq!(record.id, Uuid::nil());
        assert_eq!(record.email, "alice@example.com");
        assert!(!record.verified);
    }
}
