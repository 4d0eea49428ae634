pub mod server;

use secrecy::SecretString;

/// Actions the CLI can dispatch.
#[derive(Debug)]
pub enum Action {
    Server {
        port: u16,
        dsn: String,
        cache_url: String,
        access_token_secret: SecretString,
        refresh_token_secret: SecretString,
        access_token_ttl_seconds: i64,
        refresh_token_ttl_seconds: i64,
        cookie_domain: String,
        frontend_base_url: String,
        email_token_ttl_seconds: i64,
        email_resend_cooldown_seconds: i64,
        mail_outbox_poll_seconds: u64,
        mail_outbox_batch_size: u16,
        mail_outbox_max_attempts: u32,
    },
}
