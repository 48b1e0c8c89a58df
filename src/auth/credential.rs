// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Credential normalization.
//!
//! A request may authenticate with an `Authorization` header or with the
//! HTTP-only access-token cookie set at login. Both are reduced to a single
//! [`Credential`] before bearer validation runs:
//!
//! 1. An `Authorization` header always wins. Cookies are not looked at.
//! 2. Otherwise the first cookie named like the access-token cookie becomes
//!    `Bearer <value>`. Later duplicates are ignored.
//! 3. Otherwise the credential is [`Credential::Absent`] and the request
//!    continues unauthenticated.
//!
//! Normalization never fails. Rejecting an unauthenticated request is the
//! job of the authorization stage.

use axum::http::{
    header::{AUTHORIZATION, COOKIE},
    HeaderMap,
};
use cookie::Cookie;

use super::AuthError;

/// Where the canonical credential came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provenance {
    Header,
    Cookie,
    Absent,
}

/// The canonical credential of one request.
///
/// Both present variants hold a full `Authorization` header value, so
/// downstream code can treat a cookie credential exactly like a header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    /// Taken verbatim from the `Authorization` header.
    Header(String),
    /// Synthesized as `Bearer <cookie value>`.
    Cookie(String),
    Absent,
}

impl Credential {
    pub fn provenance(&self) -> Provenance {
        match self {
            Credential::Header(_) => Provenance::Header,
            Credential::Cookie(_) => Provenance::Cookie,
            Credential::Absent => Provenance::Absent,
        }
    }

    /// The credential as an `Authorization` header value.
    pub fn header_value(&self) -> Option<&str> {
        match self {
            Credential::Header(value) | Credential::Cookie(value) => Some(value),
            Credential::Absent => None,
        }
    }

    pub fn is_present(&self) -> bool {
        !matches!(self, Credential::Absent)
    }

    /// Extract the raw token from a `Bearer <token>` value.
    ///
    /// `Ok(None)` when absent.
    pub fn bearer_token(&self) -> Result<Option<&str>, AuthError> {
        let Some(value) = self.header_value() else {
            return Ok(None);
        };
        let token = value
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::InvalidAuthHeader)?;
        Ok(Some(token))
    }
}

/// Pick the canonical credential from an optional header value and the
/// request's cookies in the order they were received.
///
/// `cookies` is consumed lazily and not touched at all when `header` is set.
pub fn normalize<I, K, V>(header: Option<&str>, cookies: I, access_cookie_name: &str) -> Credential
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    if let Some(header) = header {
        return Credential::Header(header.to_string());
    }

    cookies
        .into_iter()
        .find(|(name, _)| name.as_ref() == access_cookie_name)
        .map(|(_, value)| Credential::Cookie(format!("Bearer {}", value.as_ref())))
        .unwrap_or(Credential::Absent)
}

/// Normalize the credential of a request from its headers.
pub fn resolve(headers: &HeaderMap, access_cookie_name: &str) -> Credential {
    // A non-UTF-8 header is still a header credential; it fails validation later.
    let header = headers
        .get(AUTHORIZATION)
        .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned());

    normalize(header.as_deref(), request_cookies(headers), access_cookie_name)
}

/// Cookies of a request as `(name, value)` pairs, in received order.
///
/// Every `Cookie` header is read in order; unparsable pairs are skipped.
pub fn request_cookies(headers: &HeaderMap) -> impl Iterator<Item = (String, String)> + '_ {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(Cookie::split_parse)
        .filter_map(Result::ok)
        .map(|c| (c.name().to_string(), c.value().to_string()))
}

/// Value of the first cookie called `name`.
pub fn first_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    request_cookies(headers)
        .find(|(n, _)| n == name)
        .map(|(_, value)| value)
}
