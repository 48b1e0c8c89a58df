// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::auth::validator::{BearerValidator, JwtValidator};
use crate::config::{BridgeConfig, CookiePolicy};
use crate::idp::{http_client, AdminApi, IdentityProviderClient, ServiceTokenCache};

/// Shared state handed to every handler. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<BridgeConfig>,
    pub validator: Arc<dyn BearerValidator>,
    pub idp: IdentityProviderClient,
    pub service_tokens: Arc<ServiceTokenCache>,
    pub admin: AdminApi,
}

impl AppState {
    /// Wire the production components for `config`.
    pub fn new(config: BridgeConfig) -> Result<Self, reqwest::Error> {
        let http = http_client()?;
        let validator = Arc::new(JwtValidator::for_realm(&config.keycloak, http.clone()));
        Ok(Self::with_validator(config, http, validator))
    }

    /// Wire the state around a caller-supplied bearer validator.
    pub fn with_validator(
        config: BridgeConfig,
        http: reqwest::Client,
        validator: Arc<dyn BearerValidator>,
    ) -> Self {
        let idp = IdentityProviderClient::new(config.keycloak.clone(), http.clone());
        let service_tokens = Arc::new(ServiceTokenCache::new(Arc::new(idp.clone())));
        let admin = AdminApi::new(http, config.keycloak.admin_url(), service_tokens.clone());

        Self {
            config: Arc::new(config),
            validator,
            idp,
            service_tokens,
            admin,
        }
    }

    pub fn cookies(&self) -> &CookiePolicy {
        &self.config.cookies
    }

    /// Client whose roles are mapped into authorities.
    pub fn resource_id(&self) -> &str {
        &self.config.keycloak.resource_id
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::auth::validator::tests::test_validator;
    use crate::config::DEFAULT_HOST;
    use crate::idp::client::tests::{test_config, test_http_client};

    /// State against a Keycloak at `server_url`, validating HS256 test tokens.
    pub(crate) fn test_state(server_url: &str) -> AppState {
        let mut keycloak = test_config(server_url);
        keycloak.resource_id = "portal".to_string();
        let config = BridgeConfig {
            keycloak,
            cookies: CookiePolicy::default(),
            host: DEFAULT_HOST.to_string(),
            port: 0,
        };
        AppState::with_validator(config, test_http_client(), Arc::new(test_validator()))
    }

    #[test]
    fn resource_id_comes_from_config() {
        let state = test_state("http://127.0.0.1:9");
        assert_eq!(state.resource_id(), "portal");
        assert_eq!(state.cookies().access_cookie_name, "ACCESS_TOKEN");
    }
}
