// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authorities derived from Keycloak roles.
//!
//! ## Convention
//!
//! A role named `r` becomes the authority `ROLE_` + `r` trimmed and
//! ASCII-uppercased. Realm roles and roles on the configured resource share
//! the same namespace, so `admin` granted both ways is one authority.

use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;

use super::claims::VerifiedClaims;

pub const ROLE_PREFIX: &str = "ROLE_";

/// A single permission string granted to the caller.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Authority(String);

impl Authority {
    /// Apply the role convention. `None` for a blank role name.
    pub fn from_role(role: &str) -> Option<Authority> {
        let role = role.trim();
        if role.is_empty() {
            return None;
        }
        Some(Authority(format!("{ROLE_PREFIX}{}", role.to_ascii_uppercase())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Authority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Derive the caller's authorities from realm roles and the roles granted on
/// `resource_id`.
///
/// Pure and total: sections absent from the claims contribute nothing.
pub fn map_authorities(claims: &VerifiedClaims, resource_id: &str) -> BTreeSet<Authority> {
    claims
        .realm_roles()
        .iter()
        .chain(claims.resource_roles(resource_id))
        .filter_map(|role| Authority::from_role(role))
        .collect()
}
