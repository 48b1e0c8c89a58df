// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Session endpoints: login, refresh and logout.
//!
//! Tokens never appear in response bodies. They travel only in the two
//! HTTP-only session cookies.

use axum::{
    extract::State,
    http::{header::SET_COOKIE, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response, Result},
    Json,
};
use serde::Deserialize;
use tracing::{info, warn};

use crate::auth::{cookies, credential, AuthError};
use crate::error::ApiError;
use crate::state::AppState;

/// Request body for POST /auth/login
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// 200 with one `Set-Cookie` header per directive.
fn cookie_response(directives: [String; 2]) -> Result<Response> {
    let mut response = StatusCode::OK.into_response();
    for directive in directives {
        let value = HeaderValue::try_from(directive)
            .map_err(|_| AuthError::InternalError("token is not a valid cookie value".to_string()))?;
        response.headers_mut().append(SET_COOKIE, value);
    }
    Ok(response)
}

fn refresh_cookie(state: &AppState, headers: &HeaderMap) -> Option<String> {
    credential::first_cookie(headers, &state.cookies().refresh_cookie_name)
        .filter(|value| !value.is_empty())
}

/// Exchange email and password for a session.
pub async fn login(State(state): State<AppState>, Json(request): Json<LoginRequest>) -> Result<Response> {
    if request.email.trim().is_empty() || request.password.is_empty() {
        return Err(ApiError::bad_request("email and password are required").into());
    }

    let tokens = state
        .idp
        .login(request.email.trim(), &request.password)
        .await
        .map_err(AuthError::from)?;

    info!("login succeeded");
    cookie_response(cookies::issue(&tokens, state.cookies()))
}

/// Rotate the session using the refresh-token cookie.
pub async fn refresh(State(state): State<AppState>, headers: HeaderMap) -> Result<Response> {
    let refresh_token = refresh_cookie(&state, &headers).ok_or(AuthError::MissingCredential)?;

    let tokens = state
        .idp
        .refresh(&refresh_token)
        .await
        .map_err(AuthError::from)?;

    cookie_response(cookies::issue(&tokens, state.cookies()))
}

/// End the Keycloak session, if any, and clear both cookies.
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Result<Response> {
    if let Some(refresh_token) = refresh_cookie(&state, &headers) {
        if let Err(e) = state.idp.logout(&refresh_token).await {
            warn!(error = %e, "keycloak logout failed, clearing cookies anyway");
        }
    }

    cookie_response(cookies::clear(state.cookies()))
}
