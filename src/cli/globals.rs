use secrecy::SecretString;

/// Signing secrets injected at startup, never read from ambient state.
#[derive(Debug, Clone)]
pub struct GlobalArgs {
    pub access_token_secret: SecretString,
    pub refresh_token_secret: SecretString,
}

impl GlobalArgs {
    #[must_use]
    pub fn new(access_token_secret: SecretString, refresh_token_secret: SecretString) -> Self {
        Self {
            access_token_secret,
            refresh_token_secret,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn test_global_args() {
        let args = GlobalArgs::new(
            SecretString::from("access"),
            SecretString::from("refresh"),
        );
        assert_eq!(args.access_token_secret.expose_secret(), "access");
        assert_eq!(args.refresh_token_secret.expose_secret(), "refresh");
    }
}
