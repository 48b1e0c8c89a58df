// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! User endpoints.

use std::collections::BTreeSet;

use axum::Json;
use serde::Serialize;

use crate::auth::{Auth, AuthenticatedUser, Authority};

/// Role reported when the token carries no realm roles.
pub const UNKNOWN_ROLE: &str = "UNKNOWN";

/// Response for GET /auth/me
#[derive(Debug, Serialize)]
pub struct UserMeResponse {
    /// Keycloak user ID
    pub sub: String,
    pub email: Option<String>,
    pub name: Option<String>,
    /// First realm role in the token
    pub role: String,
    pub authorities: BTreeSet<Authority>,
}

impl From<AuthenticatedUser> for UserMeResponse {
    fn from(user: AuthenticatedUser) -> Self {
        Self {
            sub: user.user_id,
            email: user.email,
            name: user.name,
            role: user.primary_role.unwrap_or_else(|| UNKNOWN_ROLE.to_string()),
            authorities: user.authorities,
        }
    }
}

/// Get the current authenticated user's information.
pub async fn get_current_user(Auth(user): Auth) -> Json<UserMeResponse> {
    Json(user.into())
}
