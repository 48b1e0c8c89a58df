// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::idp::CacheStatus;
use crate::state::AppState;

/// Health check response with individual component status.
#[derive(Debug, Serialize)]
pub struct ReadyResponse {
    /// Overall health status ("ok" or "degraded").
    pub status: String,
    /// Individual health checks and their results.
    pub checks: HealthChecks,
}

/// Individual health check results.
#[derive(Debug, Serialize)]
pub struct HealthChecks {
    /// Whether the service process is running.
    pub service: String,
    /// Realm signing keys ("ok" or "unavailable").
    pub jwks: String,
    /// Service-account token cache. Informational: an empty or expired
    /// cache is refilled on the next admin call.
    pub service_token: CacheStatus,
}

/// Simple health check response for liveness probes.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
}

/// Health check endpoint handler.
///
/// Returns 200 if the signing keys are available, 503 otherwise.
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<ReadyResponse>) {
    let jwks_ok = state.validator.keys_ready().await;

    let response = ReadyResponse {
        status: if jwks_ok { "ok" } else { "degraded" }.to_string(),
        checks: HealthChecks {
            service: "ok".to_string(),
            jwks: if jwks_ok { "ok" } else { "unavailable" }.to_string(),
            service_token: state.service_tokens.status(),
        },
    };

    let status = if jwks_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status, Json(response))
}

/// Liveness probe handler.
///
/// Always returns 200 if the process is running.
/// Does not check dependencies - use `/health` for that.
pub async fn liveness() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}
