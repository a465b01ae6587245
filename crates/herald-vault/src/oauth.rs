// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! OAuth2 refresh-token exchange.

use std::time::Duration;

use async_trait::async_trait;
use herald_core::HeraldError;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::debug;

/// Inputs for a `grant_type=refresh_token` exchange.
#[derive(Debug)]
pub struct RefreshRequest {
    pub token_url: String,
    pub refresh_token: SecretString,
    pub client_id: Option<String>,
    pub client_secret: Option<SecretString>,
    pub scope: Option<String>,
}

/// Token endpoint response body (RFC 6749 §5.1).
#[derive(Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Lifetime in seconds.
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

impl std::fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenResponse")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[REDACTED]"))
            .field("expires_in", &self.expires_in)
            .field("token_type", &self.token_type)
            .field("scope", &self.scope)
            .finish()
    }
}

/// Exchanges refresh tokens for new access tokens.
#[async_trait]
pub trait TokenEndpoint: Send + Sync + 'static {
    async fn refresh(&self, request: &RefreshRequest) -> Result<TokenResponse, HeraldError>;
}

/// Form-encoded POST against the credential's token URL.
#[derive(Debug, Clone)]
pub struct HttpTokenEndpoint {
    client: reqwest::Client,
}

impl HttpTokenEndpoint {
    pub fn new(timeout: Duration) -> Result<Self, HeraldError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| HeraldError::Vault(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl TokenEndpoint for HttpTokenEndpoint {
    async fn refresh(&self, request: &RefreshRequest) -> Result<TokenResponse, HeraldError> {
        let mut form: Vec<(&str, &str)> = vec![
            ("grant_type", "refresh_token"),
            ("refresh_token", request.refresh_token.expose_secret()),
        ];
        if let Some(client_id) = &request.client_id {
            form.push(("client_id", client_id));
        }
        if let Some(secret) = &request.client_secret {
            form.push(("client_secret", secret.expose_secret()));
        }
        if let Some(scope) = &request.scope {
            form.push(("scope", scope));
        }

        let response = self
            .client
            .post(&request.token_url)
            .form(&form)
            .send()
            .await
            .map_err(|e| HeraldError::Vault(format!("token refresh request failed: {e}")))?;

        let status = response.status();
        debug!(status = %status, url = %request.token_url, "token endpoint responded");
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(HeraldError::Vault(format!(
                "token endpoint returned {status}: {body}"
            )));
        }

        response
            .json::<TokenResponse>()
            .await
            .map_err(|e| HeraldError::Vault(format!("failed to parse token response: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request(url: String) -> RefreshRequest {
        RefreshRequest {
            token_url: url,
            refresh_token: SecretString::from("rt-1".to_string()),
            client_id: Some("client-a".into()),
            client_secret: Some(SecretString::from("shh".to_string())),
            scope: None,
        }
    }

    #[tokio::test]
    async fn posts_refresh_grant_as_form() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .and(body_string_contains("refresh_token=rt-1"))
            .and(body_string_contains("client_id=client-a"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "at-2",
                "expires_in": 1800,
                "token_type": "Bearer"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let endpoint = HttpTokenEndpoint::new(Duration::from_secs(5)).unwrap();
        let response = endpoint
            .refresh(&request(format!("{}/token", server.uri())))
            .await
            .unwrap();
        assert_eq!(response.access_token, "at-2");
        assert_eq!(response.expires_in, Some(1800));
        assert!(response.refresh_token.is_none());
    }

    #[tokio::test]
    async fn non_success_status_is_a_vault_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string("invalid_grant"))
            .mount(&server)
            .await;

        let endpoint = HttpTokenEndpoint::new(Duration::from_secs(5)).unwrap();
        let err = endpoint
            .refresh(&request(format!("{}/token", server.uri())))
            .await
            .unwrap_err();
        assert!(matches!(err, HeraldError::Vault(_)));
        assert!(err.to_string().contains("invalid_grant"), "got: {err}");
    }
}
