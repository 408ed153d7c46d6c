// ABOUTME: OS keychain storage for the long-lived refresh token
// ABOUTME: Secret wrapper with redacted Debug, CredentialStore trait, keyring and in-memory backends
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Engify.ai

//! Credential storage
//!
//! The refresh token is the only persisted secret. It lives in the OS-native
//! store (macOS Keychain, Windows Credential Manager, Secret Service / keyutils
//! on Linux) under one service/account pair per installation.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, PoisonError};

use subtle::ConstantTimeEq;
use tracing::debug;
use zeroize::Zeroizing;

use crate::config::environment::KeychainConfig;
use crate::errors::{AppError, AppResult};

/// A token or other secret. Zeroized on drop, never printed.
#[derive(Clone)]
pub struct Secret(Zeroizing<String>);

impl Secret {
    /// Wrap a secret value
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(Zeroizing::new(value.into()))
    }

    /// Expose the secret for use in a request or handoff
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret([REDACTED])")
    }
}

impl PartialEq for Secret {
    fn eq(&self, other: &Self) -> bool {
        self.expose().as_bytes().ct_eq(other.expose().as_bytes()).into()
    }
}

/// A place the refresh token can live
pub trait CredentialStore: Send + Sync {
    /// Human-readable backend name
    fn name(&self) -> &'static str;

    /// Read the refresh token. `Ok(None)` when no entry exists.
    ///
    /// # Errors
    /// Returns an error if the backend itself fails
    fn get(&self) -> AppResult<Option<Secret>>;

    /// Write (or overwrite) the refresh token
    ///
    /// # Errors
    /// Returns an error if the backend rejects the write
    fn set(&self, secret: &Secret) -> AppResult<()>;

    /// Remove the refresh token. Removing a missing entry succeeds.
    ///
    /// # Errors
    /// Returns an error if the backend fails
    fn delete(&self) -> AppResult<()>;
}

/// OS keychain backend
pub struct KeyringStore {
    service: String,
    account: String,
}

impl KeyringStore {
    /// Create a store for the configured service/account pair
    #[must_use]
    pub fn new(config: &KeychainConfig) -> Self {
        Self {
            service: config.service.clone(),
            account: config.account.clone(),
        }
    }

    fn entry(&self) -> AppResult<keyring::Entry> {
        keyring::Entry::new(&self.service, &self.account)
            .map_err(|e| AppError::internal(format!("Keychain unavailable: {e}")))
    }
}

impl CredentialStore for KeyringStore {
    fn name(&self) -> &'static str {
        "OS keychain"
    }

    fn get(&self) -> AppResult<Option<Secret>> {
        match self.entry()?.get_password() {
            Ok(value) => Ok(Some(Secret::new(value))),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(AppError::internal(format!("Keychain read failed: {e}"))),
        }
    }

    fn set(&self, secret: &Secret) -> AppResult<()> {
        self.entry()?
            .set_password(secret.expose())
            .map_err(|e| AppError::internal(format!("Keychain write failed: {e}")))?;
        debug!(service = %self.service, account = %self.account, "Stored refresh token");
        Ok(())
    }

    fn delete(&self) -> AppResult<()> {
        match self.entry()?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(AppError::internal(format!("Keychain delete failed: {e}"))),
        }
    }
}

/// Process-local store keyed by service/account, used by tests
#[derive(Default)]
pub struct MemoryStore {
    key: (String, String),
    entries: Mutex<HashMap<(String, String), Secret>>,
}

impl MemoryStore {
    /// Empty store for the given coordinates
    #[must_use]
    pub fn new(config: &KeychainConfig) -> Self {
        Self {
            key: (config.service.clone(), config.account.clone()),
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Store pre-populated with a refresh token
    #[must_use]
    pub fn with_secret(config: &KeychainConfig, secret: Secret) -> Self {
        let store = Self::new(config);
        store
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(store.key.clone(), secret);
        store
    }

    /// Number of stored entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// True when nothing is stored
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CredentialStore for MemoryStore {
    fn name(&self) -> &'static str {
        "in-memory"
    }

    fn get(&self) -> AppResult<Option<Secret>> {
        Ok(self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&self.key)
            .cloned())
    }

    fn set(&self, secret: &Secret) -> AppResult<()> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(self.key.clone(), secret.clone());
        Ok(())
    }

    fn delete(&self) -> AppResult<()> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.key);
        Ok(())
    }
}
