// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Credential records held by the vault.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::HeraldError;
use crate::types::AuthType;

/// OAuth2 token material plus what is needed to refresh it.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct OAuth2Token {
    pub access_token: String,
    /// Empty or absent means the token cannot be refreshed.
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    pub token_url: Option<String>,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

impl OAuth2Token {
    /// The refresh token, if one is present and non-empty.
    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref().filter(|t| !t.is_empty())
    }
}

impl std::fmt::Debug for OAuth2Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuth2Token")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &self.refresh_token().map(|_| "[REDACTED]"))
            .field("expires_at", &self.expires_at)
            .field("token_url", &self.token_url)
            .field("client_id", &self.client_id)
            .field("scope", &self.scope)
            .finish()
    }
}

/// Type-specific secret payload of a credential.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "auth_type", rename_all = "lowercase")]
pub enum CredentialSecret {
    #[serde(rename = "oauth2")]
    OAuth2(OAuth2Token),
    #[serde(rename = "apikey")]
    ApiKey { key: String },
    Basic { username: String, password: String },
    Custom { data: Value },
}

impl CredentialSecret {
    pub fn auth_type(&self) -> AuthType {
        match self {
            CredentialSecret::OAuth2(_) => AuthType::OAuth2,
            CredentialSecret::ApiKey { .. } => AuthType::ApiKey,
            CredentialSecret::Basic { .. } => AuthType::Basic,
            CredentialSecret::Custom { .. } => AuthType::Custom,
        }
    }
}

impl std::fmt::Debug for CredentialSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CredentialSecret::OAuth2(token) => f.debug_tuple("OAuth2").field(token).finish(),
            CredentialSecret::ApiKey { .. } => f.write_str("ApiKey([REDACTED])"),
            CredentialSecret::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"[REDACTED]")
                .finish(),
            CredentialSecret::Custom { .. } => f.write_str("Custom([REDACTED])"),
        }
    }
}

/// A plugin's credential. At most one exists per plugin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credential {
    pub plugin_id: String,
    pub secret: CredentialSecret,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Credential {
    /// A fresh credential stamped with the current time.
    pub fn new(plugin_id: impl Into<String>, secret: CredentialSecret) -> Self {
        let now = Utc::now();
        Self {
            plugin_id: plugin_id.into(),
            secret,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn auth_type(&self) -> AuthType {
        self.secret.auth_type()
    }

    /// Serialize for a secret backend.
    pub fn to_payload(&self) -> Result<String, HeraldError> {
        serde_json::to_string(self).map_err(|e| HeraldError::Vault(e.to_string()))
    }

    /// Parse a payload written by [`Credential::to_payload`].
    pub fn from_payload(payload: &str) -> Result<Self, HeraldError> {
        serde_json::from_str(payload).map_err(|e| HeraldError::Vault(e.to_string()))
    }

    pub fn oauth2(&self) -> Option<&OAuth2Token> {
        match &self.secret {
            CredentialSecret::OAuth2(token) => Some(token),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_carries_auth_type_tag() {
        let cred = Credential::new(
            "github",
            CredentialSecret::ApiKey {
                key: "sk-123".into(),
            },
        );
        let payload = cred.to_payload().unwrap();
        assert!(payload.contains("\"auth_type\":\"apikey\""));
        assert_eq!(Credential::from_payload(&payload).unwrap(), cred);
    }

    #[test]
    fn malformed_payload_is_an_error() {
        assert!(Credential::from_payload("{not json").is_err());
        assert!(
            Credential::from_payload(
                r#"{"plugin_id":"x","secret":{"auth_type":"carrier-pigeon"},"created_at":"2026-01-01T00:00:00Z","updated_at":"2026-01-01T00:00:00Z"}"#
            )
            .is_err()
        );
    }

    #[test]
    fn debug_never_prints_secrets() {
        let token = OAuth2Token {
            access_token: "at-secret".into(),
            refresh_token: Some("rt-secret".into()),
            expires_at: Utc::now(),
            token_url: None,
            client_id: Some("client".into()),
            client_secret: Some("cs-secret".into()),
            scope: None,
        };
        let cred = Credential::new("gmail", CredentialSecret::OAuth2(token));
        let debug = format!("{cred:?}");
        assert!(!debug.contains("at-secret"));
        assert!(!debug.contains("rt-secret"));
        assert!(!debug.contains("cs-secret"));
        assert!(debug.contains("client"));

        let basic = CredentialSecret::Basic {
            username: "alice".into(),
            password: "hunter2".into(),
        };
        assert!(!format!("{basic:?}").contains("hunter2"));
    }

    #[test]
    fn empty_refresh_token_is_absent() {
        let token = OAuth2Token {
            access_token: "a".into(),
            refresh_token: Some(String::new()),
            expires_at: Utc::now(),
            token_url: None,
            client_id: None,
            client_secret: None,
            scope: None,
        };
        assert!(token.refresh_token().is_none());
    }
}
