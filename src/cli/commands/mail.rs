use clap::{Arg, Command};

pub const ARG_FRONTEND_BASE_URL: &str = "frontend-base-url";

#[must_use]
pub fn with_args(command: Command) -> Command {
    let command = command
        .arg(
            Arg::new(ARG_FRONTEND_BASE_URL)
                .long(ARG_FRONTEND_BASE_URL)
                .help("Frontend base URL used for verification links and CORS")
                .env("COLLEGA_FRONTEND_BASE_URL")
                .default_value("https://collega.dev"),
        )
        .arg(
            Arg::new("email-token-ttl-seconds")
                .long("email-token-ttl-seconds")
                .help("Email verification token TTL in seconds")
                .env("COLLEGA_EMAIL_TOKEN_TTL_SECONDS")
                .default_value("1800")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new("email-resend-cooldown-seconds")
                .long("email-resend-cooldown-seconds")
                .help("Cooldown before resending verification emails")
                .env("COLLEGA_EMAIL_RESEND_COOLDOWN_SECONDS")
                .default_value("60")
                .value_parser(clap::value_parser!(i64)),
        );

    with_outbox_args(command)
}

fn with_outbox_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("mail-outbox-poll-seconds")
                .long("mail-outbox-poll-seconds")
                .help("Mail outbox poll interval in seconds")
                .env("COLLEGA_MAIL_OUTBOX_POLL_SECONDS")
                .default_value("5")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("mail-outbox-batch-size")
                .long("mail-outbox-batch-size")
                .help("Mail outbox batch size per poll")
                .env("COLLEGA_MAIL_OUTBOX_BATCH_SIZE")
                .default_value("10")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new("mail-outbox-max-attempts")
                .long("mail-outbox-max-attempts")
                .help("Max attempts before marking a mail as failed")
                .env("COLLEGA_MAIL_OUTBOX_MAX_ATTEMPTS")
                .default_value("5")
                .value_parser(clap::value_parser!(u32)),
        )
}
