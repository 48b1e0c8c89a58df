// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Configuration is read from the environment once at startup and is
//! immutable afterwards.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `KEYCLOAK_SERVER_URL` | Keycloak base URL | Required |
//! | `KEYCLOAK_REALM` | Realm name | Required |
//! | `KEYCLOAK_CLIENT_ID` | Client ID of this application | Required |
//! | `KEYCLOAK_CLIENT_SECRET` | Client secret of this application | Required |
//! | `KEYCLOAK_RESOURCE_ID` | Client whose roles are mapped from `resource_access` | client id |
//! | `KEYCLOAK_AUDIENCE` | Expected JWT `aud` claim | Not validated |
//! | `KEYCLOAK_ADMIN_CLIENT_ID` | Client used for the service-account token | client id |
//! | `KEYCLOAK_ADMIN_CLIENT_SECRET` | Secret of the admin client | client secret |
//! | `KEYCLOAK_ADMIN_REALM` | Realm the admin token is requested from | realm |
//! | `COOKIE_SECURE` | Emit `Secure` on session cookies | `true` |
//! | `COOKIE_DOMAIN` | `Domain` attribute of session cookies | Not set |
//! | `COOKIE_SAME_SITE` | `None`, `Lax` or `Strict` | `None` |
//! | `ACCESS_TOKEN_COOKIE` | Access token cookie name | `ACCESS_TOKEN` |
//! | `REFRESH_TOKEN_COOKIE` | Refresh token cookie name | `REFRESH_TOKEN` |
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::fmt;
use std::str::FromStr;

use url::Url;

pub const SERVER_URL_ENV: &str = "KEYCLOAK_SERVER_URL";
pub const REALM_ENV: &str = "KEYCLOAK_REALM";
pub const CLIENT_ID_ENV: &str = "KEYCLOAK_CLIENT_ID";
pub const CLIENT_SECRET_ENV: &str = "KEYCLOAK_CLIENT_SECRET";
pub const RESOURCE_ID_ENV: &str = "KEYCLOAK_RESOURCE_ID";
pub const AUDIENCE_ENV: &str = "KEYCLOAK_AUDIENCE";
pub const ADMIN_CLIENT_ID_ENV: &str = "KEYCLOAK_ADMIN_CLIENT_ID";
pub const ADMIN_CLIENT_SECRET_ENV: &str = "KEYCLOAK_ADMIN_CLIENT_SECRET";
pub const ADMIN_REALM_ENV: &str = "KEYCLOAK_ADMIN_REALM";
pub const COOKIE_SECURE_ENV: &str = "COOKIE_SECURE";
pub const COOKIE_DOMAIN_ENV: &str = "COOKIE_DOMAIN";
pub const COOKIE_SAME_SITE_ENV: &str = "COOKIE_SAME_SITE";
pub const ACCESS_TOKEN_COOKIE_ENV: &str = "ACCESS_TOKEN_COOKIE";
pub const REFRESH_TOKEN_COOKIE_ENV: &str = "REFRESH_TOKEN_COOKIE";
pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

pub const DEFAULT_ACCESS_TOKEN_COOKIE: &str = "ACCESS_TOKEN";
pub const DEFAULT_REFRESH_TOKEN_COOKIE: &str = "REFRESH_TOKEN";
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_LOG_FILTER: &str = "info,tower_http=debug";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required configuration: {0}")]
    Missing(&'static str),

    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// `SameSite` mode written into session cookies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SameSite {
    #[default]
    None,
    Lax,
    Strict,
}

impl FromStr for SameSite {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(SameSite::None),
            "lax" => Ok(SameSite::Lax),
            "strict" => Ok(SameSite::Strict),
            other => Err(format!("expected None, Lax or Strict, got '{other}'")),
        }
    }
}

impl fmt::Display for SameSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SameSite::None => write!(f, "None"),
            SameSite::Lax => write!(f, "Lax"),
            SameSite::Strict => write!(f, "Strict"),
        }
    }
}

/// How session cookies are written. Path is always `/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookiePolicy {
    pub secure: bool,
    pub domain: Option<String>,
    pub same_site: SameSite,
    pub access_cookie_name: String,
    pub refresh_cookie_name: String,
}

impl Default for CookiePolicy {
    fn default() -> Self {
        Self {
            secure: true,
            domain: None,
            same_site: SameSite::None,
            access_cookie_name: DEFAULT_ACCESS_TOKEN_COOKIE.to_string(),
            refresh_cookie_name: DEFAULT_REFRESH_TOKEN_COOKIE.to_string(),
        }
    }
}

/// Keycloak connection settings.
#[derive(Clone)]
pub struct KeycloakConfig {
    /// Base server URL without trailing slash.
    pub server_url: String,
    pub realm: String,
    pub client_id: String,
    pub client_secret: String,
    /// Client whose `resource_access` roles become authorities.
    pub resource_id: String,
    pub audience: Option<String>,
    pub admin_client_id: String,
    pub admin_client_secret: String,
    pub admin_realm: String,
}

impl KeycloakConfig {
    /// Build a config where every optional setting falls back to the main client.
    pub fn new(
        server_url: impl Into<String>,
        realm: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        let server_url = server_url.into().trim_end_matches('/').to_string();
        let realm = realm.into();
        let client_id = client_id.into();
        let client_secret = client_secret.into();
        Self {
            server_url,
            resource_id: client_id.clone(),
            audience: None,
            admin_client_id: client_id.clone(),
            admin_client_secret: client_secret.clone(),
            admin_realm: realm.clone(),
            realm,
            client_id,
            client_secret,
        }
    }

    /// OpenID Connect base URL of the target realm.
    pub fn auth_url(&self) -> String {
        format!("{}/realms/{}/protocol/openid-connect", self.server_url, self.realm)
    }

    pub fn token_url(&self) -> String {
        format!("{}/token", self.auth_url())
    }

    pub fn logout_url(&self) -> String {
        format!("{}/logout", self.auth_url())
    }

    pub fn jwks_url(&self) -> String {
        format!("{}/certs", self.auth_url())
    }

    /// Token endpoint used for the service-account (admin) token.
    pub fn admin_token_url(&self) -> String {
        format!(
            "{}/realms/{}/protocol/openid-connect/token",
            self.server_url, self.admin_realm
        )
    }

    /// Admin REST API base for the target realm.
    pub fn admin_url(&self) -> String {
        format!("{}/admin/realms/{}", self.server_url, self.realm)
    }

    /// Expected `iss` claim.
    pub fn issuer(&self) -> String {
        format!("{}/realms/{}", self.server_url, self.realm)
    }
}

impl std::fmt::Debug for KeycloakConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeycloakConfig")
            .field("server_url", &self.server_url)
            .field("realm", &self.realm)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("resource_id", &self.resource_id)
            .field("audience", &self.audience)
            .field("admin_client_id", &self.admin_client_id)
            .field("admin_client_secret", &"<redacted>")
            .field("admin_realm", &self.admin_realm)
            .finish()
    }
}

/// Complete bridge configuration.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub keycloak: KeycloakConfig,
    pub cookies: CookiePolicy,
    pub host: String,
    pub port: u16,
}

impl BridgeConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let optional = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let required = |name: &'static str| optional(name).ok_or(ConfigError::Missing(name));

        let server_url = required(SERVER_URL_ENV)?;
        let parsed = Url::parse(&server_url).map_err(|e| ConfigError::Invalid {
            name: SERVER_URL_ENV,
            reason: e.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid {
                name: SERVER_URL_ENV,
                reason: format!("unsupported scheme '{}'", parsed.scheme()),
            });
        }

        let mut keycloak = KeycloakConfig::new(
            server_url,
            required(REALM_ENV)?,
            required(CLIENT_ID_ENV)?,
            required(CLIENT_SECRET_ENV)?,
        );
        if let Some(resource_id) = optional(RESOURCE_ID_ENV) {
            keycloak.resource_id = resource_id;
        }
        keycloak.audience = optional(AUDIENCE_ENV);
        if let Some(id) = optional(ADMIN_CLIENT_ID_ENV) {
            keycloak.admin_client_id = id;
        }
        if let Some(secret) = optional(ADMIN_CLIENT_SECRET_ENV) {
            keycloak.admin_client_secret = secret;
        }
        if let Some(realm) = optional(ADMIN_REALM_ENV) {
            keycloak.admin_realm = realm;
        }

        let mut cookies = CookiePolicy::default();
        if let Some(secure) = optional(COOKIE_SECURE_ENV) {
            cookies.secure = parse_bool(&secure).ok_or_else(|| ConfigError::Invalid {
                name: COOKIE_SECURE_ENV,
                reason: format!("expected true or false, got '{secure}'"),
            })?;
        }
        cookies.domain = optional(COOKIE_DOMAIN_ENV);
        if let Some(same_site) = optional(COOKIE_SAME_SITE_ENV) {
            cookies.same_site = same_site.parse().map_err(|reason| ConfigError::Invalid {
                name: COOKIE_SAME_SITE_ENV,
                reason,
            })?;
        }
        if let Some(name) = optional(ACCESS_TOKEN_COOKIE_ENV) {
            cookies.access_cookie_name = name;
        }
        if let Some(name) = optional(REFRESH_TOKEN_COOKIE_ENV) {
            cookies.refresh_cookie_name = name;
        }

        let host = optional(HOST_ENV).unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = match optional(PORT_ENV) {
            Some(port) => port.parse().map_err(|_| ConfigError::Invalid {
                name: PORT_ENV,
                reason: format!("'{port}' is not a valid port"),
            })?,
            None => DEFAULT_PORT,
        };

        Ok(Self {
            keycloak,
            cookies,
            host,
            port,
        })
    }

    /// Browsers discard `SameSite=None` cookies that are not `Secure`.
    pub fn has_insecure_same_site_none(&self) -> bool {
        self.cookies.same_site == SameSite::None && !self.cookies.secure
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    fn minimal() -> Vec<(&'static str, &'static str)> {
        vec![
            (SERVER_URL_ENV, "https://sso.example.com/"),
            (REALM_ENV, "acme"),
            (CLIENT_ID_ENV, "portal"),
            (CLIENT_SECRET_ENV, "s3cret"),
        ]
    }

    #[test]
    fn minimal_config_uses_defaults() {
        let config = BridgeConfig::from_lookup(lookup_from(&minimal())).unwrap();

        assert_eq!(config.keycloak.server_url, "https://sso.example.com");
        assert_eq!(config.keycloak.resource_id, "portal");
        assert_eq!(config.keycloak.admin_client_id, "portal");
        assert_eq!(config.keycloak.admin_client_secret, "s3cret");
        assert_eq!(config.keycloak.admin_realm, "acme");
        assert_eq!(config.cookies, CookiePolicy::default());
        assert_eq!(config.port, DEFAULT_PORT);
    }

    #[test]
    fn missing_required_value_is_reported_by_name() {
        let vars: Vec<_> = minimal()
            .into_iter()
            .filter(|(k, _)| *k != CLIENT_SECRET_ENV)
            .collect();
        let err = BridgeConfig::from_lookup(lookup_from(&vars)).unwrap_err();
        assert_eq!(err, ConfigError::Missing(CLIENT_SECRET_ENV));
    }

    #[test]
    fn blank_values_count_as_missing() {
        let mut vars = minimal();
        vars.retain(|(k, _)| *k != REALM_ENV);
        vars.push((REALM_ENV, "   "));
        let err = BridgeConfig::from_lookup(lookup_from(&vars)).unwrap_err();
        assert_eq!(err, ConfigError::Missing(REALM_ENV));
    }

    #[test]
    fn overrides_are_applied() {
        let mut vars = minimal();
        vars.extend([
            (RESOURCE_ID_ENV, "portal-api"),
            (ADMIN_CLIENT_ID_ENV, "admin-cli"),
            (ADMIN_CLIENT_SECRET_ENV, "admin-secret"),
            (ADMIN_REALM_ENV, "master"),
            (COOKIE_SECURE_ENV, "false"),
            (COOKIE_DOMAIN_ENV, ".example.com"),
            (COOKIE_SAME_SITE_ENV, "lax"),
            (PORT_ENV, "9090"),
        ]);
        let config = BridgeConfig::from_lookup(lookup_from(&vars)).unwrap();

        assert_eq!(config.keycloak.resource_id, "portal-api");
        assert_eq!(config.keycloak.admin_client_id, "admin-cli");
        assert_eq!(config.keycloak.admin_realm, "master");
        assert!(!config.cookies.secure);
        assert_eq!(config.cookies.domain.as_deref(), Some(".example.com"));
        assert_eq!(config.cookies.same_site, SameSite::Lax);
        assert_eq!(config.port, 9090);
    }

    #[test]
    fn invalid_same_site_is_rejected() {
        let mut vars = minimal();
        vars.push((COOKIE_SAME_SITE_ENV, "sometimes"));
        let err = BridgeConfig::from_lookup(lookup_from(&vars)).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name, .. } if name == COOKIE_SAME_SITE_ENV));
    }

    #[test]
    fn non_http_server_url_is_rejected() {
        let mut vars = minimal();
        vars.retain(|(k, _)| *k != SERVER_URL_ENV);
        vars.push((SERVER_URL_ENV, "ftp://sso.example.com"));
        let err = BridgeConfig::from_lookup(lookup_from(&vars)).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name, .. } if name == SERVER_URL_ENV));
    }

    #[test]
    fn keycloak_urls_are_derived_from_realms() {
        let mut kc = KeycloakConfig::new("https://sso.example.com", "acme", "portal", "s");
        kc.admin_realm = "master".to_string();

        assert_eq!(
            kc.token_url(),
            "https://sso.example.com/realms/acme/protocol/openid-connect/token"
        );
        assert_eq!(
            kc.jwks_url(),
            "https://sso.example.com/realms/acme/protocol/openid-connect/certs"
        );
        assert_eq!(
            kc.admin_token_url(),
            "https://sso.example.com/realms/master/protocol/openid-connect/token"
        );
        assert_eq!(kc.admin_url(), "https://sso.example.com/admin/realms/acme");
        assert_eq!(kc.issuer(), "https://sso.example.com/realms/acme");
    }

    #[test]
    fn same_site_none_without_secure_is_flagged() {
        let mut vars = minimal();
        vars.push((COOKIE_SECURE_ENV, "0"));
        let config = BridgeConfig::from_lookup(lookup_from(&vars)).unwrap();
        assert!(config.has_insecure_same_site_none());
    }

    #[test]
    fn debug_output_redacts_client_secrets() {
        let mut vars = minimal();
        vars.push((ADMIN_CLIENT_SECRET_ENV, "adm1n-s3cret"));
        let config = BridgeConfig::from_lookup(lookup_from(&vars)).unwrap();

        let printed = format!("{config:?}");
        assert!(printed.contains("portal"));
        assert!(printed.contains("<redacted>"));
        assert!(!printed.contains("s3cret"));
    }
}
