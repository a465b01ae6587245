// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The credential vault: one interface over a primary secret backend and the
//! headline store fallback.
//!
//! The primary is used while it works. The first primary failure demotes it
//! for the rest of the session and every later call goes straight to the
//! fallback. There is no automatic promotion back.

use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{TimeDelta, Utc};
use herald_core::{AuthType, Credential, CredentialSecret, HeraldError, OAuth2Token};
use herald_storage::queries::credentials;
use herald_storage::{CredentialBackend, CredentialRow, Database};
use secrecy::SecretString;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::backend::{SecretBackend, StoreBackend};
use crate::oauth::{RefreshRequest, TokenEndpoint};

/// Tokens expiring within this window are refreshed before use.
pub const REFRESH_MARGIN_SECS: i64 = 5 * 60;

/// Lifetime assumed when a token endpoint omits `expires_in`.
const DEFAULT_EXPIRES_IN_SECS: i64 = 3600;

/// Upper bound applied to an endpoint's `expires_in` (one year).
const MAX_EXPIRES_IN_SECS: i64 = 365 * 24 * 3600;

/// Where a listed credential's secret lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialLocation {
    Primary,
    Fallback,
}

/// Non-secret listing entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CredentialInfo {
    pub plugin_id: String,
    pub auth_type: AuthType,
    pub location: CredentialLocation,
}

pub struct CredentialVault {
    primary: Option<Arc<dyn SecretBackend>>,
    primary_available: AtomicBool,
    fallback: StoreBackend,
    db: Database,
    tokens: Arc<dyn TokenEndpoint>,
    mirror: bool,
}

impl CredentialVault {
    /// Build a vault. With `primary = None` every call uses the store.
    pub fn new(
        primary: Option<Arc<dyn SecretBackend>>,
        db: Database,
        tokens: Arc<dyn TokenEndpoint>,
    ) -> Self {
        let primary_available = AtomicBool::new(primary.is_some());
        Self {
            primary,
            primary_available,
            fallback: StoreBackend::new(db.clone()),
            db,
            tokens,
            mirror: true,
        }
    }

    /// Whether successful primary writes also keep the secret payload in the
    /// store. On by default.
    pub fn with_mirror(mut self, mirror: bool) -> Self {
        self.mirror = mirror;
        self
    }

    /// False once the primary has failed in this session (or if there is none).
    pub fn is_primary_available(&self) -> bool {
        self.primary.is_some() && self.primary_available.load(Ordering::Acquire)
    }

    fn active_primary(&self) -> Option<&Arc<dyn SecretBackend>> {
        if self.is_primary_available() {
            self.primary.as_ref()
        } else {
            None
        }
    }

    fn demote(&self, backend: &'static str, op: &str, error: &HeraldError) {
        if self.primary_available.swap(false, Ordering::AcqRel) {
            warn!(
                backend,
                op,
                error = %error,
                "primary secret store failed; using the headline store for the rest of this session"
            );
        }
    }

    /// Store a plugin's credential, replacing any existing one.
    pub async fn store(&self, credential: &Credential) -> Result<(), HeraldError> {
        let plugin_id = credential.plugin_id.as_str();
        let payload = credential.to_payload()?;

        if let Some(primary) = self.active_primary() {
            match primary.put(plugin_id, &payload).await {
                Ok(()) => {
                    credentials::upsert_credential(
                        &self.db,
                        &CredentialRow {
                            plugin_id: plugin_id.to_string(),
                            auth_type: credential.auth_type().to_string(),
                            backend: CredentialBackend::Keyring,
                            payload: self.mirror.then(|| payload.clone()),
                            created_at: credential.created_at,
                            updated_at: credential.updated_at,
                        },
                    )
                    .await?;
                    info!(
                        plugin_id,
                        auth_type = %credential.auth_type(),
                        backend = primary.name(),
                        mirrored = self.mirror,
                        "credential stored"
                    );
                    return Ok(());
                }
                Err(e) => self.demote(primary.name(), "store", &e),
            }
        }

        self.fallback.put(plugin_id, &payload).await?;
        info!(
            plugin_id,
            auth_type = %credential.auth_type(),
            backend = self.fallback.name(),
            "credential stored"
        );
        Ok(())
    }

    /// Fetch a plugin's credential. Malformed payloads read as absent.
    pub async fn get(&self, plugin_id: &str) -> Result<Option<Credential>, HeraldError> {
        if let Some(primary) = self.active_primary() {
            match primary.get(plugin_id).await {
                Ok(Some(payload)) => return Ok(decode(plugin_id, primary.name(), &payload)),
                Ok(None) => {}
                Err(e) => self.demote(primary.name(), "get", &e),
            }
        }
        Ok(self
            .fallback
            .get(plugin_id)
            .await?
            .and_then(|payload| decode(plugin_id, self.fallback.name(), &payload)))
    }

    /// Remove a plugin's credential from both backends. Returns true if one existed.
    pub async fn delete(&self, plugin_id: &str) -> Result<bool, HeraldError> {
        let mut existed = false;
        if let Some(primary) = self.active_primary() {
            match primary.delete(plugin_id).await {
                Ok(found) => existed |= found,
                Err(e) => self.demote(primary.name(), "delete", &e),
            }
        }
        existed |= self.fallback.delete(plugin_id).await?;
        if existed {
            info!(plugin_id, "credential deleted");
        }
        Ok(existed)
    }

    /// Every retrievable credential, without secrets, sorted by plugin id.
    pub async fn list(&self) -> Result<Vec<CredentialInfo>, HeraldError> {
        let rows: BTreeMap<String, CredentialRow> = credentials::list_credentials(&self.db)
            .await?
            .into_iter()
            .map(|row| (row.plugin_id.clone(), row))
            .collect();
        let mut listed: BTreeMap<String, CredentialInfo> = BTreeMap::new();

        if let Some(primary) = self.active_primary() {
            match primary.list().await {
                Ok(ids) => {
                    for id in ids {
                        let auth_type = match rows.get(&id) {
                            Some(row) => AuthType::from_str(&row.auth_type).ok(),
                            None => self.primary_auth_type(primary.as_ref(), &id).await,
                        };
                        if let Some(auth_type) = auth_type {
                            listed.insert(
                                id.clone(),
                                CredentialInfo {
                                    plugin_id: id,
                                    auth_type,
                                    location: CredentialLocation::Primary,
                                },
                            );
                        }
                    }
                }
                Err(e) => self.demote(primary.name(), "list", &e),
            }
        }

        for (id, row) in rows {
            if listed.contains_key(&id) || row.payload.is_none() {
                continue;
            }
            let Ok(auth_type) = AuthType::from_str(&row.auth_type) else {
                warn!(plugin_id = %id, auth_type = %row.auth_type, "unknown auth type in credential row");
                continue;
            };
            listed.insert(
                id.clone(),
                CredentialInfo {
                    plugin_id: id,
                    auth_type,
                    location: CredentialLocation::Fallback,
                },
            );
        }

        Ok(listed.into_values().collect())
    }

    async fn primary_auth_type(&self, primary: &dyn SecretBackend, id: &str) -> Option<AuthType> {
        match primary.get(id).await {
            Ok(Some(payload)) => decode(id, primary.name(), &payload).map(|c| c.auth_type()),
            Ok(None) => None,
            Err(e) => {
                debug!(plugin_id = id, error = %e, "cannot read listed keyring entry");
                None
            }
        }
    }

    /// The credential, with an OAuth2 token refreshed first if it expires within
    /// [`REFRESH_MARGIN_SECS`]. Non-OAuth2 credentials are returned as stored.
    pub async fn validate(&self, plugin_id: &str) -> Result<Option<Credential>, HeraldError> {
        let Some(credential) = self.get(plugin_id).await? else {
            return Ok(None);
        };
        let Some(token) = credential.oauth2() else {
            return Ok(Some(credential));
        };
        if token.expires_at - Utc::now() > TimeDelta::seconds(REFRESH_MARGIN_SECS) {
            return Ok(Some(credential));
        }
        debug!(plugin_id, expires_at = %token.expires_at, "oauth2 token near expiry");
        self.refresh_credential(credential).await
    }

    /// Exchange the stored refresh token for a new access token and store it.
    ///
    /// Returns `Ok(None)` without any network call when the credential has no
    /// refresh token or no token endpoint.
    pub async fn refresh(&self, plugin_id: &str) -> Result<Option<Credential>, HeraldError> {
        match self.get(plugin_id).await? {
            Some(credential) => self.refresh_credential(credential).await,
            None => Ok(None),
        }
    }

    async fn refresh_credential(
        &self,
        credential: Credential,
    ) -> Result<Option<Credential>, HeraldError> {
        let plugin_id = credential.plugin_id.clone();
        let Some(token) = credential.oauth2().cloned() else {
            debug!(plugin_id = %plugin_id, "credential is not oauth2; nothing to refresh");
            return Ok(None);
        };
        let Some(refresh_token) = token.refresh_token().map(str::to_string) else {
            info!(plugin_id = %plugin_id, "oauth2 token cannot be refreshed: no refresh token");
            return Ok(None);
        };
        let Some(token_url) = token.token_url.clone() else {
            warn!(plugin_id = %plugin_id, "oauth2 token cannot be refreshed: no token endpoint");
            return Ok(None);
        };

        let response = self
            .tokens
            .refresh(&RefreshRequest {
                token_url,
                refresh_token: SecretString::from(refresh_token),
                client_id: token.client_id.clone(),
                client_secret: token.client_secret.clone().map(SecretString::from),
                scope: token.scope.clone(),
            })
            .await?;

        let now = Utc::now();
        let expires_in = response
            .expires_in
            .unwrap_or(DEFAULT_EXPIRES_IN_SECS)
            .clamp(0, MAX_EXPIRES_IN_SECS);
        let expires_at = TimeDelta::try_seconds(expires_in)
            .and_then(|lifetime| now.checked_add_signed(lifetime))
            .ok_or_else(|| HeraldError::Vault(format!("invalid expires_in {expires_in}")))?;
        let refreshed = OAuth2Token {
            access_token: response.access_token,
            refresh_token: response
                .refresh_token
                .filter(|t| !t.is_empty())
                .or(token.refresh_token.clone()),
            expires_at,
            scope: response.scope.or(token.scope.clone()),
            ..token
        };
        debug!(
            plugin_id = %plugin_id,
            access_token = %mask_secret(&refreshed.access_token),
            "received refreshed access token"
        );
        let updated = Credential {
            secret: CredentialSecret::OAuth2(refreshed),
            updated_at: now,
            ..credential
        };
        self.store(&updated).await?;
        info!(plugin_id = %plugin_id, expires_in, "oauth2 token refreshed");
        Ok(Some(updated))
    }
}

fn decode(plugin_id: &str, backend: &'static str, payload: &str) -> Option<Credential> {
    match Credential::from_payload(payload) {
        Ok(credential) => Some(credential),
        Err(e) => {
            warn!(plugin_id, backend, error = %e, "malformed credential payload; treating as absent");
            None
        }
    }
}

/// Mask a secret for display: first 4 and last 4 characters, or `****` when short.
pub fn mask_secret(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() < 10 {
        return "****".to_string();
    }
    let prefix: String = chars[..4].iter().collect();
    let suffix: String = chars[chars.len() - 4..].iter().collect();
    format!("{prefix}...{suffix}")
}
