use axum::middleware::from_fn;
use utoipa::openapi::{Contact, InfoBuilder, License, OpenApiBuilder, Tag};
use utoipa_axum::{router::OpenApiRouter, routes};

use super::handlers::{auth, health};

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    // Reuse the same router wiring and only return the generated OpenAPI spec.
    let (_router, openapi) = api_router().split_for_parts();
    openapi
}

/// Build the router that also drives the `OpenAPI` document.
///
/// Add new endpoints here via `.routes(routes!(...))` so they are both served
/// and included in the generated `OpenAPI` spec. Routes added outside (like
/// `/`) are intentionally not documented.
pub(crate) fn api_router() -> OpenApiRouter {
    let open = OpenApiRouter::new()
        .routes(routes!(health::health))
        .routes(routes!(auth::guard::csrf_token))
        .routes(routes!(auth::session::session))
        .routes(routes!(auth::verification::verify_email))
        .routes(routes!(auth::verification::resend_verification));

    // State-changing auth endpoints sit behind the CSRF double-submit guard.
    let csrf_guarded = OpenApiRouter::new()
        .routes(routes!(auth::login::login))
        .routes(routes!(auth::register::register))
        .routes(routes!(auth::session::refresh_token))
        .layer(from_fn(auth::guard::require_csrf));

    // Logout additionally requires a live session.
    let session_guarded = OpenApiRouter::new()
        .routes(routes!(auth::session::logout))
        .layer(from_fn(auth::guard::require_auth))
        .layer(from_fn(auth::guard::require_csrf));

    let mut router = OpenApiRouter::with_openapi(cargo_openapi())
        .merge(open)
        .merge(csrf_guarded)
        .merge(session_guarded);

    let mut auth_tag = Tag::new("auth");
    auth_tag.description = Some("Accounts, sessions, and email verification".to_string());

    let mut health_tag = Tag::new("health");
    health_tag.description = Some("Service health probes".to_string());

    router.get_openapi_mut().tags = Some(vec![auth_tag, health_tag]);

    router
}

fn cargo_openapi() -> utoipa::openapi::OpenApi {
    // Use Cargo.toml metadata instead of the utoipa-axum crate info defaults.
    let mut info = InfoBuilder::new()
        .title(env!("CARGO_PKG_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .description(optional_str(env!("CARGO_PKG_DESCRIPTION")))
        .build();

    info.contact = cargo_contact();
    info.license = cargo_license();

    OpenApiBuilder::new().info(info).build()
}

fn cargo_contact() -> Option<Contact> {
    // Cargo authors are `;` separated and may include "Name <email>".
    let primary = env!("CARGO_PKG_AUTHORS").split(';').next().map(str::trim)?;
    let (name, email) = match primary.split_once('<') {
        Some((name, email)) => (
            optional_str(name.trim()),
            optional_str(email.trim_end_matches('>').trim()),
        ),
        None => (optional_str(primary), None),
    };
    if name.is_none() && email.is_none() {
        return None;
    }

    let mut contact = Contact::new();
    contact.name = name.map(str::to_string);
    contact.email = email.map(str::to_string);
    Some(contact)
}

fn cargo_license() -> Option<License> {
    let identifier = optional_str(env!("CARGO_PKG_LICENSE"))?;
    let mut license = License::new(identifier);
    license.identifier = Some(identifier.to_string());
    Some(license)
}

fn optional_str(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_info_from_cargo() {
        let spec = openapi();
        assert_eq!(spec.info.title, env!("CARGO_PKG_NAME"));
        assert_eq!(spec.info.version, env!("CARGO_PKG_VERSION"));
        assert_eq!(
            spec.info.description.as_deref(),
            Some(env!("CARGO_PKG_DESCRIPTION"))
        );

        let contact = spec.info.contact;
        assert!(contact.is_some());
        if let Some(contact) = contact {
            assert_eq!(contact.name.as_deref(), Some("Team Collega"));
            assert_eq!(contact.email.as_deref(), Some("team@collega.dev"));
        }

        let license = spec.info.license;
        assert!(license.is_some());
        if let Some(license) = license {
            assert_eq!(license.name, "BSD-3-Clause");
        }
    }

    #[test]
    fn openapi_tags_and_paths() {
        let spec = openapi();
        let tags = spec.tags.clone().unwrap_or_default();
        assert!(tags.iter().any(|tag| tag.name == "auth"));
        assert!(tags.iter().any(|tag| tag.name == "health"));

        for path in [
            "/auth/login",
            "/auth/register",
            "/auth/refresh-token",
            "/auth/logout",
            "/auth/verify-email",
            "/auth/resend-verification",
            "/auth/session",
            "/auth/csrf",
            "/health",
        ] {
            assert!(
                spec.paths.paths.contains_key(path),
                "missing documented path {path}"
            );
        }
    }
}
