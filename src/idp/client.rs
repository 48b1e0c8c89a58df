// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Keycloak token endpoint client.
//!
//! All exchanges are form-encoded POSTs to the realm's OpenID Connect
//! endpoints. A failed exchange is reported once; retries are left to the
//! caller.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, info};

use super::error::{redacted_detail, UpstreamError};
use super::token::{ServiceToken, SessionTokens, TokenResponse};
use crate::config::KeycloakConfig;

/// Timeout applied to every call to Keycloak.
pub const UPSTREAM_TIMEOUT: Duration = Duration::from_secs(10);

/// Build the HTTP client shared by every Keycloak call.
pub fn http_client() -> Result<Client, reqwest::Error> {
    Client::builder().timeout(UPSTREAM_TIMEOUT).build()
}

/// Source of service-account tokens.
#[async_trait]
pub trait ServiceTokenSource: Send + Sync {
    async fn fetch_service_token(&self) -> Result<ServiceToken, UpstreamError>;
}

/// Which client credentials a grant is made with.
#[derive(Clone, Copy)]
enum Grant {
    /// End-user grants (password, refresh) with the application client.
    User,
    /// Service-account grant with the admin client.
    Service,
}

#[derive(Debug, Clone)]
pub struct IdentityProviderClient {
    config: KeycloakConfig,
    http: Client,
}

impl IdentityProviderClient {
    pub fn new(config: KeycloakConfig, http: Client) -> Self {
        Self { config, http }
    }

    /// Resource owner password grant.
    pub async fn login(&self, username: &str, password: &str) -> Result<SessionTokens, UpstreamError> {
        let response = self
            .token_request(
                &self.config.token_url(),
                &[
                    ("grant_type", "password"),
                    ("client_id", &self.config.client_id),
                    ("client_secret", &self.config.client_secret),
                    ("username", username),
                    ("password", password),
                ],
                Grant::User,
            )
            .await?;
        info!(client_id = %self.config.client_id, "password grant succeeded");
        session_tokens(response)
    }

    /// Exchange a refresh token for a new token pair.
    pub async fn refresh(&self, refresh_token: &str) -> Result<SessionTokens, UpstreamError> {
        let response = self
            .token_request(
                &self.config.token_url(),
                &[
                    ("grant_type", "refresh_token"),
                    ("client_id", &self.config.client_id),
                    ("client_secret", &self.config.client_secret),
                    ("refresh_token", refresh_token),
                ],
                Grant::User,
            )
            .await?;
        debug!(client_id = %self.config.client_id, "refresh grant succeeded");
        session_tokens(response)
    }

    /// End the Keycloak session bound to `refresh_token`.
    pub async fn logout(&self, refresh_token: &str) -> Result<(), UpstreamError> {
        let response = self
            .http
            .post(self.config.logout_url())
            .form(&[
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("refresh_token", refresh_token),
            ])
            .send()
            .await
            .map_err(UpstreamError::from_transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(UpstreamError::Rejected {
                status: status.as_u16(),
                detail: redacted_detail(status, &body),
            });
        }
        Ok(())
    }

    /// Client credentials grant with the admin client against the admin realm.
    pub async fn client_credentials(&self) -> Result<ServiceToken, UpstreamError> {
        let response = self
            .token_request(
                &self.config.admin_token_url(),
                &[
                    ("grant_type", "client_credentials"),
                    ("client_id", &self.config.admin_client_id),
                    ("client_secret", &self.config.admin_client_secret),
                ],
                Grant::Service,
            )
            .await?;

        let expires_in = response.expires_in.ok_or_else(|| {
            UpstreamError::InvalidResponse("token response did not include expires_in".to_string())
        })?;
        info!(
            client_id = %self.config.admin_client_id,
            realm = %self.config.admin_realm,
            expires_in,
            "obtained service account token"
        );
        Ok(ServiceToken::new(response.access_token, Duration::from_secs(expires_in)))
    }

    async fn token_request(
        &self,
        url: &str,
        form: &[(&str, &str)],
        grant: Grant,
    ) -> Result<TokenResponse, UpstreamError> {
        let response = self
            .http
            .post(url)
            .form(form)
            .send()
            .await
            .map_err(UpstreamError::from_transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = redacted_detail(status, &body);
            let user_rejected = matches!(grant, Grant::User)
                && matches!(status.as_u16(), 400 | 401);
            return Err(if user_rejected {
                UpstreamError::CredentialsRejected { detail }
            } else {
                UpstreamError::Rejected {
                    status: status.as_u16(),
                    detail,
                }
            });
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| UpstreamError::InvalidResponse(e.without_url().to_string()))?;

        if token.access_token.trim().is_empty() {
            return Err(UpstreamError::InvalidResponse(
                "token response did not include access_token".to_string(),
            ));
        }
        Ok(token)
    }
}

#[async_trait]
impl ServiceTokenSource for IdentityProviderClient {
    async fn fetch_service_token(&self) -> Result<ServiceToken, UpstreamError> {
        self.client_credentials().await
    }
}

fn session_tokens(response: TokenResponse) -> Result<SessionTokens, UpstreamError> {
    let refresh_token = response.refresh_token.ok_or_else(|| {
        UpstreamError::InvalidResponse("token response did not include refresh_token".to_string())
    })?;
    let access_expires_in = response.expires_in.ok_or_else(|| {
        UpstreamError::InvalidResponse("token response did not include expires_in".to_string())
    })?;

    Ok(SessionTokens {
        access_token: response.access_token,
        access_expires_in,
        refresh_token,
        refresh_expires_in: response.refresh_expires_in.unwrap_or(0),
    })
}
