// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Cached service-account token with single-flight refresh.
//!
//! The state mutex is held across the upstream exchange, so at most one
//! exchange is in flight. Callers queued behind it re-check the cache when
//! they acquire the lock and find the fresh token. If the flight failed, every
//! caller that was already waiting for it gets a clone of the same error; a
//! caller arriving after the failure starts a new flight.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::client::ServiceTokenSource;
use super::error::UpstreamError;
use super::token::ServiceToken;

/// Cache state as reported by the health endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheStatus {
    Empty,
    Valid,
    Expired,
    Refreshing,
}

#[derive(Default)]
struct CacheState {
    /// Last token obtained. Kept after expiry but never handed out.
    token: Option<ServiceToken>,
    /// Flight number and error of the most recent failed exchange.
    last_failure: Option<(u64, UpstreamError)>,
}

pub struct ServiceTokenCache {
    source: Arc<dyn ServiceTokenSource>,
    state: Mutex<CacheState>,
    /// Number of exchanges that have finished, successful or not.
    completed_flights: AtomicU64,
}

impl ServiceTokenCache {
    pub fn new(source: Arc<dyn ServiceTokenSource>) -> Self {
        Self {
            source,
            state: Mutex::new(CacheState::default()),
            completed_flights: AtomicU64::new(0),
        }
    }

    /// Return a token valid for at least the expiry margin, exchanging a new
    /// one if needed.
    pub async fn get_token(&self) -> Result<String, UpstreamError> {
        let observed = self.completed_flights.load(Ordering::Acquire);
        let mut state = self.state.lock().await;

        if let Some(token) = state.token.as_ref().filter(|t| t.is_valid()) {
            return Ok(token.value.clone());
        }

        // A flight finished while we were queued and it failed.
        if let Some((flight, err)) = &state.last_failure {
            if *flight > observed {
                return Err(err.clone());
            }
        }

        debug!("exchanging client credentials for service token");
        let result = self.source.fetch_service_token().await;
        let flight = self.completed_flights.fetch_add(1, Ordering::AcqRel) + 1;

        match result {
            Ok(token) => {
                let value = token.value.clone();
                state.token = Some(token);
                state.last_failure = None;
                Ok(value)
            }
            Err(err) => {
                warn!(error = %err, flight, "service token exchange failed");
                state.last_failure = Some((flight, err.clone()));
                Err(err)
            }
        }
    }

    /// Drop the cached token so the next call exchanges a new one.
    pub async fn invalidate(&self) {
        let mut state = self.state.lock().await;
        state.token = None;
    }

    /// Non-blocking snapshot of the cache.
    pub fn status(&self) -> CacheStatus {
        match self.state.try_lock() {
            Err(_) => CacheStatus::Refreshing,
            Ok(state) => match &state.token {
                None => CacheStatus::Empty,
                Some(token) if token.is_valid() => CacheStatus::Valid,
                Some(_) => CacheStatus::Expired,
            },
        }
    }
}

impl std::fmt::Debug for ServiceTokenCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceTokenCache")
            .field("status", &self.status())
            .field("completed_flights", &self.completed_flights.load(Ordering::Relaxed))
            .finish()
    }
}
