// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum extractors for authenticated users.
//!
//! Use the `Auth` extractor in handlers to require authentication:
//!
//! ```rust,ignore
//! async fn my_handler(Auth(user): Auth) -> impl IntoResponse {
//!     // user is AuthenticatedUser
//! }
//! ```

use std::marker::PhantomData;

use axum::{extract::FromRequestParts, http::request::Parts};
use tracing::debug;

use super::credential::{self, Credential};
use super::{AuthError, AuthenticatedUser};
use crate::state::AppState;

/// Extractor for authenticated users.
///
/// Reads the credential attached by the `resolve_credential` middleware (or
/// resolves it here when the middleware is not installed), validates the
/// bearer token and maps its roles to authorities.
///
/// Rejects with `MissingCredential` when the request carries neither an
/// `Authorization` header nor an access-token cookie.
pub struct Auth(pub AuthenticatedUser);

impl FromRequestParts<AppState> for Auth {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        // Already validated earlier in this request
        if let Some(user) = parts.extensions.get::<AuthenticatedUser>().cloned() {
            return Ok(Auth(user));
        }

        let credential = match parts.extensions.get::<Credential>() {
            Some(credential) => credential.clone(),
            None => credential::resolve(&parts.headers, &state.cookies().access_cookie_name),
        };

        let token = credential
            .bearer_token()?
            .ok_or(AuthError::MissingCredential)?;

        let claims = state.validator.validate(token).await.inspect_err(|e| {
            debug!(
                error_code = e.error_code(),
                provenance = ?credential.provenance(),
                "bearer validation failed"
            );
        })?;

        let user = AuthenticatedUser::from_claims(claims, state.resource_id());
        parts.extensions.insert(user.clone());
        Ok(Auth(user))
    }
}

/// Optional authentication extractor.
///
/// Returns `None` if no valid authentication is present, instead of rejecting.
pub struct OptionalAuth(pub Option<AuthenticatedUser>);

impl FromRequestParts<AppState> for OptionalAuth {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        match Auth::from_request_parts(parts, state).await {
            Ok(Auth(user)) => Ok(OptionalAuth(Some(user))),
            Err(_) => Ok(OptionalAuth(None)),
        }
    }
}

/// Fail with `InsufficientPermissions` unless `user` holds `authority`.
pub fn require_authority(user: &AuthenticatedUser, authority: &str) -> Result<(), AuthError> {
    if user.has_authority(authority) {
        Ok(())
    } else {
        debug!(user_id = %user.user_id, authority, "missing authority");
        Err(AuthError::InsufficientPermissions)
    }
}

/// Names the authority a [`RequireAuthority`] extractor checks.
pub trait RequiredAuthority {
    const AUTHORITY: &'static str;
}

/// Extractor that requires a specific authority.
///
/// # Example
///
/// ```rust,ignore
/// async fn admin_only(AdminOnly(user, _): AdminOnly) -> impl IntoResponse {
///     // Only ROLE_ADMIN reaches here
/// }
/// ```
pub struct RequireAuthority<A>(pub AuthenticatedUser, pub PhantomData<A>);

impl<A> FromRequestParts<AppState> for RequireAuthority<A>
where
    A: RequiredAuthority + Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Auth(user) = Auth::from_request_parts(parts, state).await?;
        require_authority(&user, A::AUTHORITY)?;
        Ok(RequireAuthority(user, PhantomData))
    }
}

/// Realm or client role `admin`.
pub struct Admin;

impl RequiredAuthority for Admin {
    const AUTHORITY: &'static str = "ROLE_ADMIN";
}

/// Extractor that requires `ROLE_ADMIN`.
pub type AdminOnly = RequireAuthority<Admin>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::validator::tests::{claims_for, sign, TEST_SECRET};
    use crate::state::tests::test_state;
    use axum::http::Request;

    fn parts_with(header: Option<&str>, cookie: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/test");
        if let Some(header) = header {
            builder = builder.header("authorization", header);
        }
        if let Some(cookie) = cookie {
            builder = builder.header("cookie", cookie);
        }
        builder.body(()).unwrap().into_parts().0
    }

    fn token(roles: &[&str]) -> String {
        sign(&claims_for("user_123", roles), TEST_SECRET)
    }

    #[tokio::test]
    async fn auth_extractor_requires_credential() {
        let state = test_state("http://127.0.0.1:9");
        let mut parts = parts_with(None, Some("theme=dark"));

        let result = Auth::from_request_parts(&mut parts, &state).await;
        assert!(matches!(result, Err(AuthError::MissingCredential)));
    }

    #[tokio::test]
    async fn auth_extractor_accepts_bearer_header() {
        let state = test_state("http://127.0.0.1:9");
        let mut parts = parts_with(Some(&format!("Bearer {}", token(&["user"]))), None);

        let Auth(user) = Auth::from_request_parts(&mut parts, &state).await.unwrap();
        assert_eq!(user.user_id, "user_123");
        assert!(user.has_authority("ROLE_USER"));
        assert!(user.has_authority("ROLE_EDITOR"));
    }

    #[tokio::test]
    async fn auth_extractor_accepts_access_cookie() {
        let state = test_state("http://127.0.0.1:9");
        let mut parts = parts_with(None, Some(&format!("ACCESS_TOKEN={}", token(&["user"]))));

        let Auth(user) = Auth::from_request_parts(&mut parts, &state).await.unwrap();
        assert_eq!(user.user_id, "user_123");
    }

    #[tokio::test]
    async fn header_wins_even_when_cookie_is_valid() {
        let state = test_state("http://127.0.0.1:9");
        let cookie = format!("ACCESS_TOKEN={}", token(&["user"]));
        let mut parts = parts_with(Some("Basic dXNlcjpwYXNz"), Some(&cookie));

        let result = Auth::from_request_parts(&mut parts, &state).await;
        assert!(matches!(result, Err(AuthError::InvalidAuthHeader)));
    }

    #[tokio::test]
    async fn auth_extractor_uses_resolved_credential_extension() {
        let state = test_state("http://127.0.0.1:9");
        let mut parts = parts_with(None, None);
        parts
            .extensions
            .insert(Credential::Cookie(format!("Bearer {}", token(&[]))));

        let result = Auth::from_request_parts(&mut parts, &state).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn invalid_token_is_rejected() {
        let state = test_state("http://127.0.0.1:9");
        let mut parts = parts_with(Some("Bearer not.a.jwt"), None);

        let result = Auth::from_request_parts(&mut parts, &state).await;
        assert!(matches!(result, Err(AuthError::MalformedToken)));
    }

    #[tokio::test]
    async fn admin_only_rejects_non_admin() {
        let state = test_state("http://127.0.0.1:9");
        let mut parts = parts_with(Some(&format!("Bearer {}", token(&["user"]))), None);

        let result = AdminOnly::from_request_parts(&mut parts, &state).await;
        assert!(matches!(result, Err(AuthError::InsufficientPermissions)));
    }

    #[tokio::test]
    async fn admin_only_accepts_admin_role() {
        let state = test_state("http://127.0.0.1:9");
        let mut parts = parts_with(Some(&format!("Bearer {}", token(&["admin"]))), None);

        let RequireAuthority(user, _) = AdminOnly::from_request_parts(&mut parts, &state)
            .await
            .unwrap();
        assert!(user.has_role("admin"));
    }

    #[tokio::test]
    async fn optional_auth_returns_none_without_credential() {
        let state = test_state("http://127.0.0.1:9");
        let mut parts = parts_with(None, None);

        let OptionalAuth(user) = OptionalAuth::from_request_parts(&mut parts, &state)
            .await
            .unwrap();
        assert!(user.is_none());
    }
}
