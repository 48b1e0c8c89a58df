// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication errors.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::idp::UpstreamError;

/// Authentication error type.
///
/// Credential normalization and authority mapping never produce these; they
/// come from the authorization stage, the bearer validator, or a call to
/// Keycloak (token endpoints and the realm certs alike).
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Authentication is required")]
    MissingCredential,
    /// Credential is not of the form `Bearer <token>`
    #[error("Expected 'Authorization: Bearer <token>'")]
    InvalidAuthHeader,
    #[error("Token is malformed")]
    MalformedToken,
    #[error("Token signature is invalid")]
    InvalidSignature,
    #[error("Token has expired")]
    TokenExpired,
    #[error("Token was not issued by this realm")]
    InvalidIssuer,
    #[error("Token audience is invalid")]
    InvalidAudience,
    #[error("Token is not yet valid")]
    TokenNotYetValid,
    /// Neither the cached nor a refetched key set has the token's `kid`
    #[error("Token was signed with an unknown realm key")]
    NoMatchingKey,
    /// Keycloak was unreachable, refused a token exchange, or served no
    /// usable key set
    #[error("Identity provider error: {0}")]
    UpstreamFailure(#[from] UpstreamError),
    #[error("Internal error: {0}")]
    InternalError(String),
    /// Authenticated, but the authority set lacks what the route needs
    #[error("Insufficient permissions for this operation")]
    InsufficientPermissions,
}

#[derive(Serialize)]
struct AuthErrorBody {
    error: String,
    error_code: String,
}

impl AuthError {
    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::MissingCredential => "missing_credential",
            AuthError::InvalidAuthHeader => "invalid_auth_header",
            AuthError::MalformedToken => "malformed_token",
            AuthError::InvalidSignature => "invalid_signature",
            AuthError::TokenExpired => "token_expired",
            AuthError::InvalidIssuer => "invalid_issuer",
            AuthError::InvalidAudience => "invalid_audience",
            AuthError::TokenNotYetValid => "token_not_yet_valid",
            AuthError::NoMatchingKey => "no_matching_key",
            AuthError::UpstreamFailure(_) => "upstream_failure",
            AuthError::InternalError(_) => "internal_error",
            AuthError::InsufficientPermissions => "insufficient_permissions",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::MissingCredential
            | AuthError::InvalidAuthHeader
            | AuthError::MalformedToken
            | AuthError::InvalidSignature
            | AuthError::TokenExpired
            | AuthError::InvalidIssuer
            | AuthError::InvalidAudience
            | AuthError::TokenNotYetValid
            | AuthError::NoMatchingKey => StatusCode::UNAUTHORIZED,
            AuthError::UpstreamFailure(e) if e.is_credential_rejection() => {
                StatusCode::UNAUTHORIZED
            }
            AuthError::UpstreamFailure(_) => StatusCode::BAD_GATEWAY,
            AuthError::InsufficientPermissions => StatusCode::FORBIDDEN,
            AuthError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::warn!(error_code = self.error_code(), error = %self, "authentication failed");
        }
        let body = Json(AuthErrorBody {
            error: self.to_string(),
            error_code: self.error_code().to_string(),
        });
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[tokio::test]
    async fn missing_credential_returns_401() {
        let response = AuthError::MissingCredential.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let body_bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap();
        assert_eq!(body["error_code"], "missing_credential");
    }

    #[tokio::test]
    async fn insufficient_permissions_returns_403() {
        let response = AuthError::InsufficientPermissions.into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn rejected_user_credentials_are_401() {
        let err = AuthError::from(UpstreamError::CredentialsRejected {
            detail: "invalid_grant".to_string(),
        });
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn rejected_service_credentials_are_502() {
        let err = AuthError::from(UpstreamError::Rejected {
            status: 401,
            detail: "unauthorized_client".to_string(),
        });
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn unreachable_provider_is_502() {
        let err = AuthError::from(UpstreamError::Unreachable("connection refused".to_string()));
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(err.error_code(), "upstream_failure");
    }
}
