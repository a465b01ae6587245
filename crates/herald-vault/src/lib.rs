// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Credential vault for Herald source plugins.
//!
//! Secrets live in the OS keyring while it works and in the headline store
//! otherwise. OAuth2 tokens close to expiry are refreshed on read.

pub mod backend;
pub mod oauth;
pub mod vault;

pub use backend::{KeyringBackend, SecretBackend, StoreBackend};
pub use oauth::{HttpTokenEndpoint, RefreshRequest, TokenEndpoint, TokenResponse};
pub use vault::{CredentialInfo, CredentialLocation, CredentialVault, REFRESH_MARGIN_SECS, mask_secret};
