// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Session cookie directives.
//!
//! Login and refresh hand the token pair to the browser as two HTTP-only
//! cookies; logout overwrites both with empty, immediately expiring ones.
//! Each directive has the form
//!
//! ```text
//! NAME=VALUE; Path=/; HttpOnly[; Secure]; SameSite=MODE; Max-Age=N[; Domain=D]
//! ```
//!
//! Attribute order is fixed so the header text is stable across releases.

use std::fmt::Write;

use crate::config::CookiePolicy;
use crate::idp::SessionTokens;

/// `Set-Cookie` values carrying a fresh token pair: access cookie first.
pub fn issue(tokens: &SessionTokens, policy: &CookiePolicy) -> [String; 2] {
    [
        directive(
            &policy.access_cookie_name,
            &tokens.access_token,
            tokens.access_expires_in,
            policy,
        ),
        directive(
            &policy.refresh_cookie_name,
            &tokens.refresh_token,
            tokens.refresh_expires_in,
            policy,
        ),
    ]
}

/// `Set-Cookie` values that remove both session cookies.
pub fn clear(policy: &CookiePolicy) -> [String; 2] {
    [
        directive(&policy.access_cookie_name, "", 0, policy),
        directive(&policy.refresh_cookie_name, "", 0, policy),
    ]
}

fn directive(name: &str, value: &str, max_age: u64, policy: &CookiePolicy) -> String {
    let mut out = format!("{name}={value}; Path=/; HttpOnly");
    if policy.secure {
        out.push_str("; Secure");
    }
    // Writing to a String cannot fail.
    let _ = write!(out, "; SameSite={}; Max-Age={max_age}", policy.same_site);
    if let Some(domain) = &policy.domain {
        let _ = write!(out, "; Domain={domain}");
    }
    out
}
