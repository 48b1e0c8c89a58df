// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Bearer token validation.
//!
//! [`BearerValidator`] is the seam between the authentication chain and
//! signature checking. [`JwtValidator`] is the production implementation:
//! it verifies Keycloak access tokens against the realm's JWKS and checks
//! issuer, expiry and (if configured) audience.

use async_trait::async_trait;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};

use super::claims::VerifiedClaims;
use super::error::AuthError;
use super::jwks::JwksManager;
use crate::config::KeycloakConfig;

/// Clock skew tolerance (60 seconds).
pub const CLOCK_SKEW_LEEWAY: u64 = 60;

#[async_trait]
pub trait BearerValidator: Send + Sync {
    /// Verify a raw token (without the `Bearer ` prefix).
    async fn validate(&self, token: &str) -> Result<VerifiedClaims, AuthError>;

    /// Whether verification keys are loaded. Used by the health check.
    async fn keys_ready(&self) -> bool {
        true
    }
}

/// Where verification keys come from.
pub enum KeySource {
    /// Realm JWKS endpoint.
    Jwks(JwksManager),
    /// A fixed key, for deployments with a pinned realm key.
    Static { key: DecodingKey, algorithm: Algorithm },
}

pub struct JwtValidator {
    keys: KeySource,
    issuer: String,
    audience: Option<String>,
}

impl JwtValidator {
    pub fn new(keys: KeySource, issuer: impl Into<String>) -> Self {
        Self {
            keys,
            issuer: issuer.into(),
            audience: None,
        }
    }

    /// Require `aud` to contain `audience`. Not validated when unset.
    pub fn with_audience(mut self, audience: Option<String>) -> Self {
        self.audience = audience;
        self
    }

    /// Validator for the configured realm, reading keys from its JWKS.
    pub fn for_realm(config: &KeycloakConfig, http: reqwest::Client) -> Self {
        Self::new(
            KeySource::Jwks(JwksManager::new(config.jwks_url(), http)),
            config.issuer(),
        )
        .with_audience(config.audience.clone())
    }

    async fn decoding_key(&self, kid: Option<&str>) -> Result<(DecodingKey, Algorithm), AuthError> {
        match &self.keys {
            KeySource::Jwks(jwks) => match kid {
                Some(kid) => jwks.get_decoding_key(kid).await,
                None => jwks.get_any_decoding_key().await,
            },
            KeySource::Static { key, algorithm } => Ok((key.clone(), *algorithm)),
        }
    }
}

#[async_trait]
impl BearerValidator for JwtValidator {
    async fn validate(&self, token: &str) -> Result<VerifiedClaims, AuthError> {
        let header = decode_header(token).map_err(|_| AuthError::MalformedToken)?;
        let (decoding_key, algorithm) = self.decoding_key(header.kid.as_deref()).await?;

        let mut validation = Validation::new(algorithm);
        validation.leeway = CLOCK_SKEW_LEEWAY;
        validation.set_issuer(&[&self.issuer]);

        if let Some(ref audience) = self.audience {
            validation.set_audience(&[audience]);
        } else {
            validation.validate_aud = false;
        }

        let token_data = decode::<VerifiedClaims>(token, &decoding_key, &validation)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                ErrorKind::InvalidSignature => AuthError::InvalidSignature,
                ErrorKind::InvalidIssuer => AuthError::InvalidIssuer,
                ErrorKind::InvalidAudience => AuthError::InvalidAudience,
                ErrorKind::ImmatureSignature => AuthError::TokenNotYetValid,
                _ => AuthError::MalformedToken,
            })?;

        Ok(token_data.claims)
    }

    async fn keys_ready(&self) -> bool {
        match &self.keys {
            KeySource::Jwks(jwks) => jwks.is_cached().await || jwks.refresh().await.is_ok(),
            KeySource::Static { .. } => true,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
    use jsonwebtoken::{encode, get_current_timestamp, EncodingKey, Header};
    use serde_json::{json, Value};

    pub(crate) const TEST_SECRET: &[u8] = b"bridge-test-secret-with-enough-bytes";
    pub(crate) const TEST_ISSUER: &str = "https://sso.example.com/realms/acme";

    pub(crate) fn sign(claims: &Value, secret: &[u8]) -> String {
        encode(
            &Header::new(Algorithm::HS256),
            claims,
            &EncodingKey::from_secret(secret),
        )
        .unwrap()
    }

    /// Claims of a token for `sub` valid for five more minutes.
    pub(crate) fn claims_for(sub: &str, realm_roles: &[&str]) -> Value {
        json!({
            "sub": sub,
            "iss": TEST_ISSUER,
            "exp": get_current_timestamp() + 300,
            "email": format!("{sub}@example.com"),
            "name": "Test User",
            "realm_access": { "roles": realm_roles },
            "resource_access": { "portal": { "roles": ["editor"] } }
        })
    }

    pub(crate) fn test_validator() -> JwtValidator {
        JwtValidator::new(
            KeySource::Static {
                key: DecodingKey::from_secret(TEST_SECRET),
                algorithm: Algorithm::HS256,
            },
            TEST_ISSUER,
        )
    }

    #[tokio::test]
    async fn accepts_valid_token() {
        let token = sign(&claims_for("u1", &["user"]), TEST_SECRET);
        let claims = test_validator().validate(&token).await.unwrap();
        assert_eq!(claims.sub, "u1");
        assert_eq!(claims.realm_roles(), ["user"]);
        assert_eq!(claims.resource_roles("portal"), ["editor"]);
    }

    #[tokio::test]
    async fn rejects_expired_token() {
        let mut claims = claims_for("u1", &[]);
        claims["exp"] = json!(get_current_timestamp() - 600);
        let token = sign(&claims, TEST_SECRET);
        assert!(matches!(
            test_validator().validate(&token).await,
            Err(AuthError::TokenExpired)
        ));
    }

    #[tokio::test]
    async fn tolerates_clock_skew_within_leeway() {
        let mut claims = claims_for("u1", &[]);
        claims["exp"] = json!(get_current_timestamp() - 20);
        let token = sign(&claims, TEST_SECRET);
        assert!(test_validator().validate(&token).await.is_ok());
    }

    #[tokio::test]
    async fn rejects_wrong_issuer() {
        let mut claims = claims_for("u1", &[]);
        claims["iss"] = json!("https://sso.example.com/realms/other");
        let token = sign(&claims, TEST_SECRET);
        assert!(matches!(
            test_validator().validate(&token).await,
            Err(AuthError::InvalidIssuer)
        ));
    }

    #[tokio::test]
    async fn rejects_foreign_signature() {
        let token = sign(&claims_for("u1", &[]), b"some-other-secret-entirely-000000");
        assert!(matches!(
            test_validator().validate(&token).await,
            Err(AuthError::InvalidSignature)
        ));
    }

    #[tokio::test]
    async fn rejects_garbage() {
        assert!(matches!(
            test_validator().validate("not.a.jwt").await,
            Err(AuthError::MalformedToken)
        ));
    }

    #[tokio::test]
    async fn rejects_unsigned_token() {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
        let body = URL_SAFE_NO_PAD.encode(claims_for("u1", &["admin"]).to_string());
        let token = format!("{header}.{body}.");
        assert!(matches!(
            test_validator().validate(&token).await,
            Err(AuthError::MalformedToken)
        ));
    }

    #[tokio::test]
    async fn certs_outage_is_bad_gateway() {
        use crate::idp::client::tests::test_http_client;
        use axum::http::StatusCode;

        let validator = JwtValidator::new(
            KeySource::Jwks(JwksManager::new(
                "http://127.0.0.1:9/realms/acme/protocol/openid-connect/certs",
                test_http_client(),
            )),
            TEST_ISSUER,
        );
        let mut header = Header::new(Algorithm::HS256);
        header.kid = Some("k1".to_string());
        let token = encode(
            &header,
            &claims_for("u1", &[]),
            &EncodingKey::from_secret(TEST_SECRET),
        )
        .unwrap();

        let err = validator.validate(&token).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(err.error_code(), "upstream_failure");
        assert!(!validator.keys_ready().await);
    }

    #[tokio::test]
    async fn audience_is_checked_only_when_configured() {
        let mut claims = claims_for("u1", &[]);
        claims["aud"] = json!("account");
        let token = sign(&claims, TEST_SECRET);

        assert!(test_validator().validate(&token).await.is_ok());

        let strict = test_validator().with_audience(Some("portal".to_string()));
        assert!(matches!(
            strict.validate(&token).await,
            Err(AuthError::InvalidAudience)
        ));

        claims["aud"] = json!(["account", "portal"]);
        let token = sign(&claims, TEST_SECRET);
        assert!(strict.validate(&token).await.is_ok());
    }
}
