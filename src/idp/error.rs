// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Errors from calls to Keycloak.
//!
//! Diagnostics are redacted: they carry the HTTP status and Keycloak's
//! `error` / `error_description` fields, never request URLs, form fields or
//! raw response bodies.

use serde::Deserialize;

/// Longest `error_description` kept in a diagnostic.
const MAX_DETAIL_LEN: usize = 200;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UpstreamError {
    #[error("identity provider unreachable: {0}")]
    Unreachable(String),

    #[error("identity provider timed out")]
    Timeout,

    /// Keycloak refused end-user credentials (password or refresh grant).
    #[error("credentials rejected: {detail}")]
    CredentialsRejected { detail: String },

    #[error("identity provider returned {status}: {detail}")]
    Rejected { status: u16, detail: String },

    #[error("identity provider response was invalid: {0}")]
    InvalidResponse(String),
}

impl UpstreamError {
    pub fn is_credential_rejection(&self) -> bool {
        matches!(self, UpstreamError::CredentialsRejected { .. })
    }

    /// Classify a transport error without leaking the request URL.
    pub(crate) fn from_transport(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            UpstreamError::Timeout
        } else {
            UpstreamError::Unreachable(e.without_url().to_string())
        }
    }
}

#[derive(Deserialize)]
struct OAuthErrorBody {
    error: Option<String>,
    error_description: Option<String>,
}

/// Build a redacted detail string from an error response body.
pub(crate) fn redacted_detail(status: reqwest::StatusCode, body: &str) -> String {
    let parsed: Option<OAuthErrorBody> = serde_json::from_str(body).ok();
    let (error, description) = match parsed {
        Some(b) => (b.error, b.error_description),
        None => (None, None),
    };

    match (error, description) {
        (Some(error), Some(description)) => {
            format!("{error}: {}", truncate(&description, MAX_DETAIL_LEN))
        }
        (Some(error), None) => error,
        (None, _) => format!("HTTP {}", status.as_u16()),
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
