// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Privileged calls against the Keycloak admin REST API.

use std::sync::Arc;

use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use tracing::warn;

use super::error::{redacted_detail, UpstreamError};
use super::service_token::ServiceTokenCache;

#[derive(Debug, Clone)]
pub struct AdminApi {
    http: Client,
    /// `{server}/admin/realms/{realm}`
    base_url: String,
    tokens: Arc<ServiceTokenCache>,
}

impl AdminApi {
    pub fn new(http: Client, base_url: impl Into<String>, tokens: Arc<ServiceTokenCache>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            tokens,
        }
    }

    pub fn tokens(&self) -> &Arc<ServiceTokenCache> {
        &self.tokens
    }

    /// Request builder for `{base}{path}` authorized with the cached service
    /// token.
    pub async fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, UpstreamError> {
        let token = self.tokens.get_token().await?;
        Ok(self
            .http
            .request(method, format!("{}{}", self.base_url, path))
            .bearer_auth(token))
    }

    /// Send a request built by [`AdminApi::request`].
    ///
    /// A 401 means Keycloak no longer accepts the cached token (revoked or
    /// rotated), so it is dropped before the error is returned.
    pub async fn send(&self, request: RequestBuilder) -> Result<Response, UpstreamError> {
        let response = request.send().await.map_err(UpstreamError::from_transport)?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        if status == StatusCode::UNAUTHORIZED {
            warn!("admin API rejected service token, invalidating cache");
            self.tokens.invalidate().await;
        }
        let body = response.text().await.unwrap_or_default();
        Err(UpstreamError::Rejected {
            status: status.as_u16(),
            detail: redacted_detail(status, &body),
        })
    }

    /// GET `path` and decode the JSON body.
    pub async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, UpstreamError> {
        let request = self.request(Method::GET, path).await?;
        self.send(request)
            .await?
            .json()
            .await
            .map_err(|e| UpstreamError::InvalidResponse(e.without_url().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::idp::client::tests::{
        fake_keycloak_routes, serve, test_config, test_http_client, FakeKeycloak,
    };
    use crate::idp::client::IdentityProviderClient;
    use crate::idp::service_token::CacheStatus;

    use axum::{http::HeaderMap, routing::get, Json, Router};
    use serde_json::{json, Value};
    use std::sync::atomic::Ordering;

    async fn users(headers: HeaderMap) -> Result<Json<Value>, axum::http::StatusCode> {
        match headers.get("authorization").and_then(|v| v.to_str().ok()) {
            Some("Bearer svc-1") => Ok(Json(json!([{ "id": "u1", "username": "ada" }]))),
            _ => Err(axum::http::StatusCode::UNAUTHORIZED),
        }
    }

    async fn setup() -> (AdminApi, Arc<FakeKeycloak>) {
        let fake = Arc::new(FakeKeycloak::default());
        let router = fake_keycloak_routes(fake.clone())
            .merge(Router::new().route("/admin/realms/acme/users", get(users)));
        let url = serve(router).await;

        let config = test_config(&url);
        let http = test_http_client();
        let idp = IdentityProviderClient::new(config.clone(), http.clone());
        let cache = Arc::new(ServiceTokenCache::new(Arc::new(idp)));
        (AdminApi::new(http, config.admin_url(), cache), fake)
    }

    #[tokio::test]
    async fn admin_requests_carry_service_token() {
        let (admin, fake) = setup().await;

        let users: Value = admin.get_json("/users").await.unwrap();
        assert_eq!(users[0]["username"], "ada");

        // Second call reuses the cached token.
        let _: Value = admin.get_json("/users").await.unwrap();
        assert_eq!(fake.client_credentials_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unauthorized_response_invalidates_cached_token() {
        let (admin, fake) = setup().await;
        admin.get_json::<Value>("/users").await.unwrap();

        // The fake only accepts svc-1; once the cache holds svc-2 it answers 401.
        admin.tokens().invalidate().await;
        let err = admin.get_json::<Value>("/users").await.unwrap_err();
        assert!(matches!(err, UpstreamError::Rejected { status: 401, .. }));
        assert_eq!(admin.tokens().status(), CacheStatus::Empty);
        assert_eq!(fake.client_credentials_calls.load(Ordering::SeqCst), 2);
    }
}
