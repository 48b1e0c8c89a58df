// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Keycloak-backed authentication for the protected API.
//!
//! ## Auth Flow
//!
//! 1. `POST /auth/login` exchanges email and password with Keycloak and sets
//!    the `ACCESS_TOKEN` / `REFRESH_TOKEN` HTTP-only cookies
//! 2. Every request passes through `resolve_credential`, which picks the
//!    `Authorization` header or, failing that, the access-token cookie
//! 3. The `Auth` extractor:
//!    - Verifies the JWT against the realm JWKS (signature, expiry, issuer,
//!      optional audience)
//!    - Extracts `sub` as the canonical `user_id`
//!    - Maps realm roles and client roles to `ROLE_*` authorities
//!
//! ## Security
//!
//! - Requests without a credential are only rejected where a handler asks
//!   for `Auth`
//! - JWKS is cached with a TTL and refetched when an unknown `kid` appears
//! - Clock skew tolerance is 60 seconds

pub mod authority;
pub mod claims;
pub mod cookies;
pub mod credential;
pub mod error;
pub mod extractor;
pub mod jwks;
pub mod middleware;
pub mod validator;

pub use authority::{map_authorities, Authority};
pub use claims::{AuthenticatedUser, VerifiedClaims};
pub use credential::{Credential, Provenance};
pub use error::AuthError;
pub use extractor::{require_authority, AdminOnly, Auth, OptionalAuth, RequireAuthority};
pub use jwks::JwksManager;
pub use middleware::resolve_credential;
pub use validator::{BearerValidator, JwtValidator, KeySource};
