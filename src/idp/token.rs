// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Tokens obtained from the Keycloak token endpoint.

use std::time::Duration;

use serde::Deserialize;
use tokio::time::Instant;

/// Safety margin subtracted from a service token's lifetime.
///
/// Covers clock skew and requests that are already in flight when the token
/// would otherwise expire.
pub const EXPIRY_MARGIN: Duration = Duration::from_secs(30);

/// Access/refresh token pair from a login or refresh exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionTokens {
    pub access_token: String,
    /// Access token lifetime in seconds
    pub access_expires_in: u64,
    pub refresh_token: String,
    /// Refresh token lifetime in seconds
    pub refresh_expires_in: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenScope {
    Admin,
}

/// Privileged service-account token used for the admin API.
#[derive(Clone, PartialEq, Eq)]
pub struct ServiceToken {
    pub value: String,
    /// Absolute expiry as reported by Keycloak, without the margin.
    pub expires_at: Instant,
    pub scope: TokenScope,
}

impl ServiceToken {
    /// Token that expires `expires_in` from now.
    pub fn new(value: impl Into<String>, expires_in: Duration) -> Self {
        Self {
            value: value.into(),
            expires_at: Instant::now() + expires_in,
            scope: TokenScope::Admin,
        }
    }

    /// `now < expires_at - EXPIRY_MARGIN`
    pub fn is_valid_at(&self, now: Instant) -> bool {
        now + EXPIRY_MARGIN < self.expires_at
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Instant::now())
    }
}

impl std::fmt::Debug for ServiceToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceToken")
            .field("value", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .field("scope", &self.scope)
            .finish()
    }
}

/// Token endpoint response fields the bridge consumes.
#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub refresh_expires_in: Option<u64>,
}
