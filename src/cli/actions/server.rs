use crate::api;
use crate::api::{email::MailWorkerConfig, handlers::auth::AuthConfig};
use crate::cli::{actions::Action, globals::GlobalArgs};
use anyhow::Result;

/// Handle the server action.
///
/// # Errors
/// Returns an error if the server fails to start.
pub async fn handle(action: Action) -> Result<()> {
    let Action::Server {
        port,
        dsn,
        cache_url,
        access_token_secret,
        refresh_token_secret,
        access_token_ttl_seconds,
        refresh_token_ttl_seconds,
        cookie_domain,
        frontend_base_url,
        email_token_ttl_seconds,
        email_resend_cooldown_seconds,
        mail_outbox_poll_seconds,
        mail_outbox_batch_size,
        mail_outbox_max_attempts,
    } = action;

    let globals = GlobalArgs::new(access_token_secret, refresh_token_secret);

    let auth_config = AuthConfig::new(frontend_base_url, cookie_domain)
        .with_access_token_ttl_seconds(access_token_ttl_seconds)
        .with_refresh_token_ttl_seconds(refresh_token_ttl_seconds)
        .with_email_token_ttl_seconds(email_token_ttl_seconds)
        .with_resend_cooldown_seconds(email_resend_cooldown_seconds);

    let mail_config = MailWorkerConfig::new()
        .with_poll_interval_seconds(mail_outbox_poll_seconds)
        .with_batch_size(mail_outbox_batch_size)
        .with_max_attempts(mail_outbox_max_attempts);

    api::new(port, dsn, cache_url, &globals, auth_config, mail_config).await?;

    Ok(())
}
