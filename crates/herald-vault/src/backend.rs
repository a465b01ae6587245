// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Secret backends: the OS keyring and the headline store.

use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::Utc;
use herald_core::{AuthType, Credential, HeraldError};
use herald_storage::queries::credentials;
use herald_storage::{CredentialBackend, CredentialRow, Database};
use tokio::sync::Mutex;
use tracing::debug;

/// A place secret payloads can be written to and read from, keyed by plugin id.
#[async_trait]
pub trait SecretBackend: Send + Sync + 'static {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    async fn put(&self, plugin_id: &str, payload: &str) -> Result<(), HeraldError>;

    /// `Ok(None)` means no entry; `Err` means the backend itself failed.
    async fn get(&self, plugin_id: &str) -> Result<Option<String>, HeraldError>;

    /// Returns true if an entry existed.
    async fn delete(&self, plugin_id: &str) -> Result<bool, HeraldError>;

    /// Every plugin id with an entry.
    async fn list(&self) -> Result<Vec<String>, HeraldError>;
}

/// Account name of the index entry that makes the keyring namespace enumerable.
pub const INDEX_ACCOUNT: &str = "__herald_index__";

/// OS keyring (macOS Keychain, Windows Credential Manager, Linux keyutils).
///
/// Keyring calls block, so every call runs on the blocking pool.
pub struct KeyringBackend {
    service: String,
    index_lock: Mutex<()>,
}

impl KeyringBackend {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            index_lock: Mutex::new(()),
        }
    }

    async fn blocking<T, F>(&self, op: F) -> Result<T, HeraldError>
    where
        T: Send + 'static,
        F: FnOnce(&str) -> Result<T, HeraldError> + Send + 'static,
    {
        let service = self.service.clone();
        tokio::task::spawn_blocking(move || op(&service))
            .await
            .map_err(|e| HeraldError::Vault(format!("keyring task failed: {e}")))?
    }
}

fn entry(service: &str, account: &str) -> Result<keyring::Entry, HeraldError> {
    keyring::Entry::new(service, account)
        .map_err(|e| HeraldError::Vault(format!("failed to create keyring entry: {e}")))
}

fn read_entry(service: &str, account: &str) -> Result<Option<String>, HeraldError> {
    match entry(service, account)?.get_password() {
        Ok(value) => Ok(Some(value)),
        Err(keyring::Error::NoEntry) => Ok(None),
        Err(e) => Err(HeraldError::Vault(format!("failed to read keyring entry: {e}"))),
    }
}

fn read_index(service: &str) -> Result<BTreeSet<String>, HeraldError> {
    Ok(read_entry(service, INDEX_ACCOUNT)?
        .and_then(|raw| serde_json::from_str(&raw).ok())
        .unwrap_or_default())
}

fn write_index(service: &str, index: &BTreeSet<String>) -> Result<(), HeraldError> {
    let raw = serde_json::to_string(index).map_err(|e| HeraldError::Vault(e.to_string()))?;
    entry(service, INDEX_ACCOUNT)?
        .set_password(&raw)
        .map_err(|e| HeraldError::Vault(format!("failed to write keyring index: {e}")))
}

#[async_trait]
impl SecretBackend for KeyringBackend {
    fn name(&self) -> &'static str {
        "keyring"
    }

    async fn put(&self, plugin_id: &str, payload: &str) -> Result<(), HeraldError> {
        let _guard = self.index_lock.lock().await;
        let plugin_id = plugin_id.to_string();
        let payload = payload.to_string();
        self.blocking(move |service| {
            entry(service, &plugin_id)?
                .set_password(&payload)
                .map_err(|e| HeraldError::Vault(format!("failed to write keyring entry: {e}")))?;
            let mut index = read_index(service)?;
            if index.insert(plugin_id) {
                write_index(service, &index)?;
            }
            Ok(())
        })
        .await
    }

    async fn get(&self, plugin_id: &str) -> Result<Option<String>, HeraldError> {
        let plugin_id = plugin_id.to_string();
        self.blocking(move |service| read_entry(service, &plugin_id))
            .await
    }

    async fn delete(&self, plugin_id: &str) -> Result<bool, HeraldError> {
        let _guard = self.index_lock.lock().await;
        let plugin_id = plugin_id.to_string();
        self.blocking(move |service| {
            let existed = match entry(service, &plugin_id)?.delete_credential() {
                Ok(()) => true,
                Err(keyring::Error::NoEntry) => false,
                Err(e) => {
                    return Err(HeraldError::Vault(format!(
                        "failed to delete keyring entry: {e}"
                    )));
                }
            };
            let mut index = read_index(service)?;
            if index.remove(&plugin_id) {
                write_index(service, &index)?;
            }
            Ok(existed)
        })
        .await
    }

    async fn list(&self) -> Result<Vec<String>, HeraldError> {
        self.blocking(|service| Ok(read_index(service)?.into_iter().collect()))
            .await
    }
}

/// Secret payloads held in the headline store's `credentials` table.
pub struct StoreBackend {
    db: Database,
}

impl StoreBackend {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl SecretBackend for StoreBackend {
    fn name(&self) -> &'static str {
        "store"
    }

    async fn put(&self, plugin_id: &str, payload: &str) -> Result<(), HeraldError> {
        let auth_type = Credential::from_payload(payload)
            .map(|c| c.auth_type().to_string())
            .unwrap_or_else(|_| AuthType::Custom.to_string());
        let now = Utc::now();
        credentials::upsert_credential(
            &self.db,
            &CredentialRow {
                plugin_id: plugin_id.to_string(),
                auth_type,
                backend: CredentialBackend::Store,
                payload: Some(payload.to_string()),
                created_at: now,
                updated_at: now,
            },
        )
        .await?;
        debug!(plugin_id, "credential written to store");
        Ok(())
    }

    async fn get(&self, plugin_id: &str) -> Result<Option<String>, HeraldError> {
        Ok(credentials::get_credential(&self.db, plugin_id)
            .await?
            .and_then(|row| row.payload))
    }

    async fn delete(&self, plugin_id: &str) -> Result<bool, HeraldError> {
        credentials::delete_credential(&self.db, plugin_id).await
    }

    async fn list(&self) -> Result<Vec<String>, HeraldError> {
        Ok(credentials::list_credentials(&self.db)
            .await?
            .into_iter()
            .filter(|row| row.payload.is_some())
            .map(|row| row.plugin_id)
            .collect())
    }
}
