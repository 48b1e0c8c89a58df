// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Identity Provider
//!
//! Outbound calls to Keycloak:
//!
//! - `client` - token endpoint grants (password, refresh, client credentials)
//!   and session logout
//! - `service_token` - cached service-account token with single-flight refresh
//! - `admin` - admin REST API requests authorized by the cached token
//!
//! Every call shares one `reqwest::Client` with a 10 second timeout and is
//! attempted once.

pub mod admin;
pub mod client;
pub mod error;
pub mod service_token;
pub mod token;

pub use admin::AdminApi;
pub use client::{http_client, IdentityProviderClient, ServiceTokenSource};
pub use error::UpstreamError;
pub use service_token::{CacheStatus, ServiceTokenCache};
pub use token::{ServiceToken, SessionTokens, TokenScope, EXPIRY_MARGIN};
