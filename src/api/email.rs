//! Mail outbox worker and delivery abstraction.
//!
//! Signup and verification flows enqueue rows in `mail_outbox` inside the
//! same transaction that mutates account state, so a mail is only ever
//! queued for a change that committed. A background task polls the table,
//! locks a batch with `FOR UPDATE SKIP LOCKED`, and hands each row to a
//! [`MailSender`]. Failed rows are retried with a growing delay until
//! `max_attempts`, then parked as `failed`.
//!
//! The default sender for local development is [`LogMailSender`], which logs
//! the payload and reports success.

use anyhow::{Context, Result};
use rand::Rng;
use sqlx::{PgPool, Row};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info, info_span, Instrument};
use uuid::Uuid;

#[derive(Clone, Debug)]
pub struct MailMessage {
    pub to_email: String,
    pub template: String,
    pub payload_json: String,
}

/// Mail delivery seam used by the outbox worker.
pub trait MailSender: Send + Sync {
    /// Deliver a message or return an error to schedule a retry.
    fn send(&self, message: &MailMessage) -> Result<()>;
}

/// Local dev sender that logs the payload instead of sending real mail.
#[derive(Clone, Debug)]
pub struct LogMailSender;

impl MailSender for LogMailSender {
    fn send(&self, message: &MailMessage) -> Result<()> {
        info!(
            to_email = %message.to_email,
            template = %message.template,
            payload = %message.payload_json,
            "mail outbox send stub"
        );
        Ok(())
    }
}

#[derive(Clone, Copy, Debug)]
pub struct MailWorkerConfig {
    poll_interval: Duration,
    batch_size: u16,
    max_attempts: u32,
}

impl MailWorkerConfig {
    /// Default worker config: 5s poll interval, 10 messages per batch,
    /// 5 attempts per message.
    #[must_use]
    pub fn new() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            batch_size: 10,
            max_attempts: 5,
        }
    }

    #[must_use]
    pub fn with_poll_interval_seconds(mut self, seconds: u64) -> Self {
        self.poll_interval = Duration::from_secs(seconds.max(1));
        self
    }

    #[must_use]
    pub fn with_batch_size(mut self, batch_size: u16) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    #[must_use]
    pub fn batch_size(&self) -> u16 {
        self.batch_size
    }

    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

impl Default for MailWorkerConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Spawn the background task that drains the mail outbox.
pub fn spawn_outbox_worker(
    pool: PgPool,
    sender: Arc<dyn MailSender>,
    config: MailWorkerConfig,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            if let Err(err) = process_outbox_batch(&pool, sender.as_ref(), &config).await {
                error!("mail outbox batch failed: {err}");
            }

            sleep(config.poll_interval()).await;
        }
    })
}

async fn process_outbox_batch(
    pool: &PgPool,
    sender: &dyn MailSender,
    config: &MailWorkerConfig,
) -> Result<usize> {
    let mut tx = pool
        .begin()
        .await
        .context("failed to start mail outbox transaction")?;

    // Lock the batch so multiple workers can run without double-sending.
    let query = r"
        SELECT id, to_email, template, payload_json::text AS payload_json, attempts
        FROM mail_outbox
        WHERE status = 'pending'
          AND next_attempt_at <= NOW()
        ORDER BY next_attempt_at ASC, created_at ASC
        LIMIT $1
        FOR UPDATE SKIP LOCKED
    ";
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let rows = sqlx::query(query)
        .bind(i64::from(config.batch_size()))
        .fetch_all(&mut *tx)
        .instrument(span)
        .await
        .context("failed to load mail outbox batch")?;

    let row_count = rows.len();
    for row in rows {
        let id: Uuid = row.get("id");
        let attempts: i32 = row.get("attempts");
        let attempts = u32::try_from(attempts).unwrap_or(0);
        let message = MailMessage {
            to_email: row.get("to_email"),
            template: row.get("template"),
            payload_json: row.get("payload_json"),
        };

        let send_result = sender.send(&message);
        record_attempt(&mut tx, id, attempts, send_result, config).await?;
    }

    // Commit even when empty to release locks promptly.
    tx.commit()
        .await
        .context("failed to commit mail outbox batch")?;

    Ok(row_count)
}

async fn record_attempt(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    id: Uuid,
    attempts: u32,
    send_result: Result<()>,
    config: &MailWorkerConfig,
) -> Result<()> {
    let next_attempt = attempts.saturating_add(1);
    let next_attempt_i32 = i32::try_from(next_attempt).unwrap_or(i32::MAX);

    match send_result {
        Ok(()) => {
            let query = r"
                UPDATE mail_outbox
                SET status = 'sent',
                    attempts = $2,
                    last_error = NULL,
                    sent_at = NOW()
                WHERE id = $1
            ";
            let span = info_span!(
                "db.query",
                db.system = "postgresql",
                db.operation = "UPDATE",
                db.statement = query
            );
            sqlx::query(query)
                .bind(id)
                .bind(next_attempt_i32)
                .execute(&mut **tx)
                .instrument(span)
                .await
                .context("failed to mark outbox mail as sent")?;
        }
        Err(err) if next_attempt >= config.max_attempts() => {
            let query = r"
                UPDATE mail_outbox
                SET status = 'failed',
                    attempts = $2,
                    last_error = $3
                WHERE id = $1
            ";
            let span = info_span!(
                "db.query",
                db.system = "postgresql",
                db.operation = "UPDATE",
                db.statement = query
            );
            sqlx::query(query)
                .bind(id)
                .bind(next_attempt_i32)
                .bind(err.to_string())
                .execute(&mut **tx)
                .instrument(span)
                .await
                .context("failed to mark outbox mail as failed")?;
        }
        Err(err) => {
            let delay_seconds = retry_delay_seconds(next_attempt);
            let query = r"
                UPDATE mail_outbox
                SET status = 'pending',
                    attempts = $2,
                    last_error = $3,
                    next_attempt_at = NOW() + ($4 * INTERVAL '1 second')
                WHERE id = $1
            ";
            let span = info_span!(
                "db.query",
                db.system = "postgresql",
                db.operation = "UPDATE",
                db.statement = query
            );
            sqlx::query(query)
                .bind(id)
                .bind(next_attempt_i32)
                .bind(err.to_string())
                .bind(i64::from(delay_seconds))
                .execute(&mut **tx)
                .instrument(span)
                .await
                .context("failed to schedule outbox retry")?;
        }
    }

    Ok(())
}

/// Growing retry delay with jitter, capped at five minutes.
fn retry_delay_seconds(attempt: u32) -> u32 {
    let base = attempt.saturating_mul(30).min(300);
    let jitter = rand::thread_rng().gen_range(0..=base / 2);
    base + jitter
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worker_config_defaults_and_floors() {
        let config = MailWorkerConfig::new();
        assert_eq!(config.poll_interval(), Duration::from_secs(5));
        assert_eq!(config.batch_size(), 10);
        assert_eq!(config.max_attempts(), 5);

        // Zero values are floored rather than accepted.
        let config = config
            .with_poll_interval_seconds(0)
            .with_batch_size(0)
            .with_max_attempts(0);
        assert_eq!(config.poll_interval(), Duration::from_secs(1));
        assert_eq!(config.batch_size(), 1);
        assert_eq!(config.max_attempts(), 1);
    }

    #[test]
    fn retry_delay_grows_and_caps() {
        for attempt in 1..=20 {
            let delay = retry_delay_seconds(attempt);
            let base = (attempt * 30).min(300);
            assert!(delay >= base);
            assert!(delay <= base + base / 2);
        }
    }

    #[test]
    fn log_sender_always_succeeds() {
        let sender = LogMailSender;
        let message = MailMessage {
            to_email: "alice@example.com".to_string(),
            template: "verify_email".to_string(),
            payload_json: "{}".to_string(),
        };
        assert!(sender.send(&message).is_ok());
    }
}
