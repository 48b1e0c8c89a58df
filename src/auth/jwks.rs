// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! JWKS (JSON Web Key Set) fetching and caching.
//!
//! ## Behavior
//!
//! - Keys are cached with a TTL (5 minutes by default)
//! - A token signed with an unknown `kid` forces one refetch, at most once per
//!   refresh interval, so key rotation in Keycloak is picked up without
//!   waiting for the TTL. Concurrent callers with the same new `kid` share
//!   that refetch.
//! - A stale cache is used when a refetch fails
//! - With nothing cached, an unreachable certs endpoint is an upstream failure

use std::sync::Arc;
use std::time::Duration;

use jsonwebtoken::jwk::{AlgorithmParameters, Jwk, JwkSet, KeyAlgorithm, PublicKeyUse};
use jsonwebtoken::{Algorithm, DecodingKey};
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use tracing::{debug, warn};

use super::error::AuthError;
use crate::idp::UpstreamError;

/// Default JWKS cache TTL (5 minutes).
const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

/// Minimum time between refetches forced by an unknown `kid`.
const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(10);

struct CacheEntry {
    jwks: JwkSet,
    fetched_at: Instant,
}

/// Fetches and caches the realm's signing keys.
#[derive(Clone)]
pub struct JwksManager {
    /// `{server}/realms/{realm}/protocol/openid-connect/certs`
    jwks_url: String,
    cache_ttl: Duration,
    refresh_interval: Duration,
    cache: Arc<RwLock<Option<CacheEntry>>>,
    /// Time of the last refetch forced by an unknown `kid`. Held across that
    /// refetch so concurrent misses wait for it.
    last_forced_refresh: Arc<Mutex<Option<Instant>>>,
    client: reqwest::Client,
}

impl JwksManager {
    pub fn new(jwks_url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            jwks_url: jwks_url.into(),
            cache_ttl: DEFAULT_CACHE_TTL,
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            cache: Arc::new(RwLock::new(None)),
            last_forced_refresh: Arc::new(Mutex::new(None)),
            client,
        }
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }

    /// Fetch JWKS (with caching).
    async fn get_jwks(&self) -> Result<JwkSet, AuthError> {
        {
            let cache = self.cache.read().await;
            if let Some(entry) = &*cache {
                if entry.fetched_at.elapsed() < self.cache_ttl {
                    return Ok(entry.jwks.clone());
                }
            }
        }

        match self.fetch_jwks().await {
            Ok(jwks) => {
                self.store(jwks.clone()).await;
                Ok(jwks)
            }
            Err(e) => {
                let cache = self.cache.read().await;
                match &*cache {
                    Some(entry) => {
                        warn!(error = %e, "JWKS refetch failed, using stale keys");
                        Ok(entry.jwks.clone())
                    }
                    None => Err(e.into()),
                }
            }
        }
    }

    async fn fetch_jwks(&self) -> Result<JwkSet, UpstreamError> {
        let response = self
            .client
            .get(&self.jwks_url)
            .send()
            .await
            .map_err(UpstreamError::from_transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(UpstreamError::Rejected {
                status: status.as_u16(),
                detail: format!("HTTP {} from certs endpoint", status.as_u16()),
            });
        }

        let jwks: JwkSet = response
            .json()
            .await
            .map_err(|e| UpstreamError::InvalidResponse(e.without_url().to_string()))?;

        debug!(keys = jwks.keys.len(), "fetched JWKS");
        Ok(jwks)
    }

    async fn store(&self, jwks: JwkSet) {
        let mut cache = self.cache.write().await;
        *cache = Some(CacheEntry {
            jwks,
            fetched_at: Instant::now(),
        });
    }

    /// Look `kid` up in whatever is cached, fresh or stale.
    async fn cached_key(&self, kid: &str) -> Option<Result<(DecodingKey, Algorithm), AuthError>> {
        let cache = self.cache.read().await;
        let entry = cache.as_ref()?;
        find_key(&entry.jwks, kid).map(jwk_to_decoding_key)
    }

    /// Get a decoding key for the given key ID.
    ///
    /// An unknown `kid` triggers one refetch before giving up.
    pub async fn get_decoding_key(&self, kid: &str) -> Result<(DecodingKey, Algorithm), AuthError> {
        let jwks = self.get_jwks().await?;
        if let Some(jwk) = find_key(&jwks, kid) {
            return jwk_to_decoding_key(jwk);
        }

        let mut last = self.last_forced_refresh.lock().await;

        // A refetch finished while we waited for the lock.
        if let Some(found) = self.cached_key(kid).await {
            return found;
        }
        if last.is_some_and(|at| at.elapsed() < self.refresh_interval) {
            return Err(AuthError::NoMatchingKey);
        }
        *last = Some(Instant::now());

        debug!(kid, "unknown key id, refetching JWKS");
        let jwks = self.fetch_jwks().await?;
        let result = find_key(&jwks, kid)
            .ok_or(AuthError::NoMatchingKey)
            .and_then(jwk_to_decoding_key);
        self.store(jwks).await;
        result
    }

    /// Get any signing key (for tokens without kid).
    pub async fn get_any_decoding_key(&self) -> Result<(DecodingKey, Algorithm), AuthError> {
        let jwks = self.get_jwks().await?;

        jwks.keys
            .iter()
            .filter(|jwk| is_signing_key(jwk))
            .find_map(|jwk| jwk_to_decoding_key(jwk).ok())
            .ok_or(AuthError::NoMatchingKey)
    }

    /// Force refresh the JWKS cache.
    pub async fn refresh(&self) -> Result<(), AuthError> {
        let jwks = self.fetch_jwks().await?;
        self.store(jwks).await;
        Ok(())
    }

    /// Check if JWKS is currently cached and within its TTL.
    pub async fn is_cached(&self) -> bool {
        let cache = self.cache.read().await;
        cache
            .as_ref()
            .is_some_and(|entry| entry.fetched_at.elapsed() < self.cache_ttl)
    }
}

/// Keycloak publishes an encryption key next to the signing key.
fn is_signing_key(jwk: &Jwk) -> bool {
    !matches!(jwk.common.public_key_use, Some(PublicKeyUse::Encryption))
}

fn find_key<'a>(jwks: &'a JwkSet, kid: &str) -> Option<&'a Jwk> {
    jwks.keys
        .iter()
        .filter(|jwk| is_signing_key(jwk))
        .find(|jwk| jwk.common.key_id.as_deref() == Some(kid))
}

fn jwk_to_decoding_key(jwk: &Jwk) -> Result<(DecodingKey, Algorithm), AuthError> {
    match &jwk.algorithm {
        AlgorithmParameters::RSA(rsa) => {
            let key = DecodingKey::from_rsa_components(&rsa.n, &rsa.e)
                .map_err(|e| AuthError::InternalError(format!("unusable RSA key in realm JWKS: {e}")))?;

            let alg = match jwk.common.key_algorithm {
                Some(KeyAlgorithm::RS384) => Algorithm::RS384,
                Some(KeyAlgorithm::RS512) => Algorithm::RS512,
                Some(KeyAlgorithm::PS256) => Algorithm::PS256,
                Some(KeyAlgorithm::PS384) => Algorithm::PS384,
                Some(KeyAlgorithm::PS512) => Algorithm::PS512,
                _ => Algorithm::RS256,
            };
            Ok((key, alg))
        }
        AlgorithmParameters::EllipticCurve(ec) => {
            let key = DecodingKey::from_ec_components(&ec.x, &ec.y)
                .map_err(|e| AuthError::InternalError(format!("unusable EC key in realm JWKS: {e}")))?;

            let alg = match jwk.common.key_algorithm {
                Some(KeyAlgorithm::ES384) => Algorithm::ES384,
                _ => Algorithm::ES256,
            };
            Ok((key, alg))
        }
        _ => Err(AuthError::NoMatchingKey),
    }
}
