//! Client for the auth service. Every protected survey endpoint resolves its
//! caller through `GET {AUTH_SERVICE_URL}/verify`, forwarding the caller's
//! Authorization header untouched.

use std::time::Duration;

use anyhow::{Context, Result};
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::errors::AppError;
use crate::state::AppState;

/// The caller as reported by the auth service.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthUser {
    pub user_id: i32,
    pub username: String,
}

#[derive(Clone)]
pub struct AuthClient {
    client: Client,
    verify_url: String,
}

impl AuthClient {
    pub fn new(base_url: &str) -> Result<Self> {
        Ok(Self {
            client: Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .context("Failed to build auth HTTP client")?,
            verify_url: format!("{}/verify", base_url.trim_end_matches('/')),
        })
    }

    /// Resolves an Authorization header value to a user.
    /// Any non-200 answer is an invalid token; transport failure means the
    /// auth service is down.
    pub async fn verify(&self, authorization: &str) -> Result<AuthUser, AppError> {
        let response = self
            .client
            .get(&self.verify_url)
            .header(reqwest::header::AUTHORIZATION, authorization)
            .send()
            .await
            .map_err(|e| {
                warn!("Auth service request failed: {e}");
                AppError::ServiceUnavailable("Auth service unavailable".to_string())
            })?;

        if response.status() != reqwest::StatusCode::OK {
            debug!("Auth service rejected token with {}", response.status());
            return Err(AppError::Unauthorized("Invalid token".to_string()));
        }

        response.json::<AuthUser>().await.map_err(|e| {
            warn!("Auth service returned an unreadable body: {e}");
            AppError::ServiceUnavailable("Auth service unavailable".to_string())
        })
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, AppError> {
        let authorization = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized("Not authenticated".to_string()))?;
        state.auth.verify(authorization).await
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use axum::{http::HeaderMap, http::StatusCode, routing::get, Json, Router};
    use serde_json::json;

    /// Starts a stand-in auth service that accepts only `Bearer good-token`.
    pub(crate) async fn spawn_fake_auth() -> String {
        async fn verify(headers: HeaderMap) -> Result<Json<serde_json::Value>, StatusCode> {
            match headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()) {
                Some("Bearer good-token") => Ok(Json(json!({
                    "valid": true,
                    "user_id": 42,
                    "username": "alice"
                }))),
                _ => Err(StatusCode::UNAUTHORIZED),
            }
        }

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, Router::new().route("/verify", get(verify)))
                .await
                .unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn test_valid_token_resolves_user() {
        let client = AuthClient::new(&spawn_fake_auth().await).unwrap();
        let user = client.verify("Bearer good-token").await.unwrap();
        assert_eq!(user.user_id, 42);
        assert_eq!(user.username, "alice");
    }

    #[tokio::test]
    async fn test_rejected_token_is_unauthorized() {
        let client = AuthClient::new(&spawn_fake_auth().await).unwrap();
        match client.verify("Bearer bad-token").await {
            Err(AppError::Unauthorized(msg)) => assert_eq!(msg, "Invalid token"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unreachable_service_is_unavailable() {
        let client = AuthClient::new("http://127.0.0.1:1").unwrap();
        assert!(matches!(
            client.verify("Bearer good-token").await,
            Err(AppError::ServiceUnavailable(_))
        ));
    }

    #[test]
    fn test_trailing_slash_trimmed() {
        let client = AuthClient::new("http://auth:8000/").unwrap();
        assert_eq!(client.verify_url, "http://auth:8000/verify");
    }
}
