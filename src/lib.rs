// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Keycloak Auth Bridge - stateless authentication in front of a protected API
//!
//! Accepts credentials as a bearer header or as HTTP-only session cookies,
//! maps verified Keycloak claims to `ROLE_*` authorities, and keeps a cached
//! service-account token for the Keycloak admin API.
//!
//! ## Modules
//!
//! - `api` - HTTP handlers (Axum): session cookies, `/auth/me`, health
//! - `auth` - Credential normalization, JWT validation, authority mapping
//! - `idp` - Keycloak token endpoint, service token cache, admin API
//! - `config` - Environment configuration
//! - `telemetry` - Tracing subscriber setup

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod idp;
pub mod state;
pub mod telemetry;
