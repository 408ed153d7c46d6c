// ABOUTME: Tests for refresh token storage and secret handling
// ABOUTME: MemoryStore semantics per service/account, overwrite, delete and redacted Debug output
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Engify.ai

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

use engify_mcp::config::environment::KeychainConfig;
use engify_mcp::credentials::{CredentialStore, MemoryStore, Secret};

fn keychain(account: &str) -> KeychainConfig {
    KeychainConfig {
        service: "ai.engify.mcp.test".to_owned(),
        account: account.to_owned(),
    }
}

#[test]
fn test_empty_store_reads_none() {
    let store = MemoryStore::new(&keychain("refresh_token"));
    assert!(store.get().unwrap().is_none());
    assert!(store.is_empty());
}

#[test]
fn test_set_overwrites_single_entry() {
    let store = MemoryStore::new(&keychain("refresh_token"));
    store.set(&Secret::new("first")).unwrap();
    store.set(&Secret::new("second")).unwrap();

    assert_eq!(store.len(), 1);
    assert_eq!(store.get().unwrap().unwrap().expose(), "second");
}

#[test]
fn test_delete_is_idempotent() {
    let store = MemoryStore::with_secret(&keychain("refresh_token"), Secret::new("stored"));
    store.delete().unwrap();
    assert!(store.get().unwrap().is_none());
    store.delete().unwrap();
    assert!(store.is_empty());
}

#[test]
fn test_stores_with_different_accounts_are_independent() {
    let work = MemoryStore::with_secret(&keychain("work"), Secret::new("work-token"));
    let home = MemoryStore::new(&keychain("home"));

    assert!(home.get().unwrap().is_none());
    home.set(&Secret::new("home-token")).unwrap();
    assert_eq!(work.get().unwrap().unwrap().expose(), "work-token");
    assert_eq!(home.get().unwrap().unwrap().expose(), "home-token");
}

#[test]
fn test_secret_debug_is_redacted() {
    let secret = Secret::new("eyJhbGciOiJSUzI1NiJ9.payload.signature");
    let debug = format!("{secret:?}");
    assert!(!debug.contains("payload"));
    assert_eq!(secret, Secret::new("eyJhbGciOiJSUzI1NiJ9.payload.signature"));
    assert_ne!(secret, Secret::new("other"));
    assert_ne!(Secret::new("refresh"), Secret::new("refresh-1"));
    assert_eq!(Secret::new(""), Secret::new(""));
}
