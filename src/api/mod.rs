// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    http::{HeaderName, Request},
    middleware,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::{auth::resolve_credential, state::AppState};

pub mod health;
pub mod session;
pub mod users;

const REQUEST_ID_HEADER: &str = "x-request-id";

pub fn router(state: AppState) -> Router {
    let auth_routes = Router::new()
        .route("/login", post(session::login))
        .route("/refresh", post(session::refresh))
        .route("/logout", post(session::logout))
        .route("/me", get(users::get_current_user));

    let request_id = HeaderName::from_static(REQUEST_ID_HEADER);
    let trace_layer = TraceLayer::new_for_http().make_span_with(|request: &Request<_>| {
        let request_id = request
            .headers()
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        // Path only: query strings are not logged.
        tracing::info_span!(
            "http.request",
            method = %request.method(),
            path = %request.uri().path(),
            request_id = %request_id
        )
    });

    Router::new()
        .nest("/auth", auth_routes)
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .layer(middleware::from_fn_with_state(state.clone(), resolve_credential))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(request_id.clone(), MakeRequestUuid))
                .layer(trace_layer)
                .layer(PropagateRequestIdLayer::new(request_id)),
        )
}
