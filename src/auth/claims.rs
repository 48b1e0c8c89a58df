// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Verified Keycloak claims and the authenticated user built from them.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::authority::{map_authorities, Authority};

/// Claims of a Keycloak access token that passed signature, issuer and
/// expiry validation.
///
/// Every consumed section is optional. A missing or malformed role section
/// reads as "no roles" instead of failing the whole token.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct VerifiedClaims {
    /// Subject (Keycloak user ID)
    #[serde(default)]
    pub sub: String,

    #[serde(default)]
    pub email: Option<String>,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub preferred_username: Option<String>,

    /// Issuer (`{server}/realms/{realm}`)
    #[serde(default)]
    pub iss: Option<String>,

    /// Expiration timestamp
    #[serde(default)]
    pub exp: Option<i64>,

    /// Realm-wide roles
    #[serde(default)]
    pub realm_access: RoleSection,

    /// Client-scoped roles, keyed by client ID
    #[serde(default, deserialize_with = "lenient_resource_access")]
    pub resource_access: HashMap<String, RoleSection>,
}

/// A `{ "roles": [...] }` claim section.
///
/// Non-string entries are dropped; anything that is not an object with a
/// `roles` array reads as empty.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(from = "Value")]
pub struct RoleSection {
    pub roles: Vec<String>,
}

impl From<Value> for RoleSection {
    fn from(value: Value) -> Self {
        let roles = match value.get("roles") {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect(),
            _ => Vec::new(),
        };
        Self { roles }
    }
}

impl RoleSection {
    pub fn with_roles<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            roles: roles.into_iter().map(Into::into).collect(),
        }
    }
}

fn lenient_resource_access<'de, D>(deserializer: D) -> Result<HashMap<String, RoleSection>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Object(map) => map
            .into_iter()
            .map(|(client, section)| (client, RoleSection::from(section)))
            .collect(),
        _ => HashMap::new(),
    })
}

impl VerifiedClaims {
    pub fn realm_roles(&self) -> &[String] {
        &self.realm_access.roles
    }

    /// Roles granted on `resource_id`, empty when the token has none.
    pub fn resource_roles(&self, resource_id: &str) -> &[String] {
        self.resource_access
            .get(resource_id)
            .map(|section| section.roles.as_slice())
            .unwrap_or(&[])
    }
}

/// Authenticated caller of the current request.
#[derive(Debug, Clone, Serialize)]
pub struct AuthenticatedUser {
    /// Keycloak user ID (`sub`)
    pub user_id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    /// First realm role as listed in the token
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_role: Option<String>,

    pub authorities: BTreeSet<Authority>,

    /// Token expiration (Unix timestamp)
    #[serde(skip)]
    pub expires_at: Option<i64>,
}

impl AuthenticatedUser {
    /// Build the user from verified claims, mapping roles on `resource_id`.
    pub fn from_claims(claims: VerifiedClaims, resource_id: &str) -> Self {
        let authorities = map_authorities(&claims, resource_id);
        let primary_role = claims.realm_roles().first().cloned();

        Self {
            user_id: claims.sub,
            email: claims.email,
            name: claims.name,
            username: claims.preferred_username,
            primary_role,
            authorities,
            expires_at: claims.exp,
        }
    }

    pub fn has_authority(&self, authority: &str) -> bool {
        self.authorities.iter().any(|a| a.as_str() == authority)
    }

    /// Check a role by name, using the same convention as the mapper.
    pub fn has_role(&self, role: &str) -> bool {
        Authority::from_role(role).is_some_and(|a| self.authorities.contains(&a))
    }
}
