//! Command-line argument dispatch.
//!
//! Maps validated CLI matches to the action to run, collecting the full
//! server configuration in one place.

use crate::cli::actions::Action;
use crate::cli::commands::{mail, tokens};
use anyhow::{Context, Result};
use secrecy::{ExposeSecret, SecretString};

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let access_token_secret: SecretString = matches
        .get_one::<String>(tokens::ARG_ACCESS_TOKEN_SECRET)
        .cloned()
        .map(SecretString::from)
        .context("missing required argument: --access-token-secret")?;

    let refresh_token_secret: SecretString = matches
        .get_one::<String>(tokens::ARG_REFRESH_TOKEN_SECRET)
        .cloned()
        .map(SecretString::from)
        .context("missing required argument: --refresh-token-secret")?;

    // A shared secret would let an access token pass refresh verification.
    if access_token_secret.expose_secret() == refresh_token_secret.expose_secret() {
        anyhow::bail!("access and refresh token secrets must differ");
    }

    Ok(Action::Server {
        port: matches.get_one::<u16>("port").copied().unwrap_or(8080),
        dsn: matches
            .get_one::<String>("dsn")
            .cloned()
            .context("missing required argument: --dsn")?,
        cache_url: matches
            .get_one::<String>("cache-url")
            .cloned()
            .context("missing required argument: --cache-url")?,
        access_token_secret,
        refresh_token_secret,
        access_token_ttl_seconds: matches
            .get_one::<i64>(tokens::ARG_ACCESS_TOKEN_TTL)
            .copied()
            .unwrap_or(900),
        refresh_token_ttl_seconds: matches
            .get_one::<i64>(tokens::ARG_REFRESH_TOKEN_TTL)
            .copied()
            .unwrap_or(604_800),
        cookie_domain: matches
            .get_one::<String>(tokens::ARG_COOKIE_DOMAIN)
            .cloned()
            .context("missing required argument: --cookie-domain")?,
        frontend_base_url: matches
            .get_one::<String>(mail::ARG_FRONTEND_BASE_URL)
            .cloned()
            .context("missing required argument: --frontend-base-url")?,
        email_token_ttl_seconds: matches
            .get_one::<i64>("email-token-ttl-seconds")
            .copied()
            .unwrap_or(1800),
        email_resend_cooldown_seconds: matches
            .get_one::<i64>("email-resend-cooldown-seconds")
            .copied()
            .unwrap_or(60),
        mail_outbox_poll_seconds: matches
            .get_one::<u64>("mail-outbox-poll-seconds")
            .copied()
            .unwrap_or(5),
        mail_outbox_batch_size: matches
            .get_one::<u16>("mail-outbox-batch-size")
            .copied()
            .unwrap_or(10),
        mail_outbox_max_attempts: matches
            .get_one::<u32>("mail-outbox-max-attempts")
            .copied()
            .unwrap_or(5),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_secrets_rejected() {
        temp_env::with_vars(
            [
                (
                    "COLLEGA_DSN",
                    Some("postgres://user@localhost:5432/collega"),
                ),
                ("COLLEGA_ACCESS_TOKEN_SECRET", Some("same-secret")),
                ("COLLEGA_REFRESH_TOKEN_SECRET", Some("same-secret")),
            ],
            || {
                let command = crate::cli::commands::new();
                let matches = command.get_matches_from(vec!["collega"]);
                let result = handler(&matches);
                assert!(result.is_err());
                if let Err(err) = result {
                    assert!(err
                        .to_string()
                        .contains("access and refresh token secrets must differ"));
                }
            },
        );
    }

    #[test]
    fn server_action_collects_configuration() {
        temp_env::with_vars(
            [
                (
                    "COLLEGA_DSN",
                    Some("postgres://user@localhost:5432/collega"),
                ),
                ("COLLEGA_ACCESS_TOKEN_SECRET", Some("access-secret")),
                ("COLLEGA_REFRESH_TOKEN_SECRET", Some("refresh-secret")),
                ("COLLEGA_COOKIE_DOMAIN", Some("app.collega.dev")),
                ("COLLEGA_ACCESS_TOKEN_TTL_SECONDS", Some("600")),
            ],
            || {
                let command = crate::cli::commands::new();
                let matches = command.get_matches_from(vec!["collega"]);
                let action = handler(&matches).expect("handler should succeed");
                let Action::Server {
                    port,
                    cookie_domain,
                    access_token_ttl_seconds,
                    refresh_token_ttl_seconds,
                    ..
                } = action;
                assert_eq!(port, 8080);
                assert_eq!(cookie_domain, "app.collega.dev");
                assert_eq!(access_token_ttl_seconds, 600);
                assert_eq!(refresh_token_ttl_seconds, 604_800);
            },
        );
    }
}
