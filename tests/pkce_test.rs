// ABOUTME: Tests for PKCE verifier/challenge generation and CSRF state values
// ABOUTME: Fixed S256 vector, verifier alphabet and length, state uniqueness and comparison
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Engify.ai

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

use std::collections::HashSet;

use engify_mcp::oauth2_client::pkce::VERIFIER_LENGTH;
use engify_mcp::oauth2_client::{generate_state, state_matches, PkceParams};

#[test]
fn test_challenge_matches_known_vector() {
    let verifier = "dBjftJeZ4CVP-mJ92K9kqK1Z8nKfN5tCZlXCZ7I2bkk";
    assert_eq!(
        PkceParams::challenge_for(verifier),
        "k9hubrpEX7SnmheGRexVpE7D2iZWBJpjc3nA4mwebrw"
    );
}

#[test]
fn test_generated_verifier_uses_unreserved_alphabet() {
    let pkce = PkceParams::generate();
    assert_eq!(pkce.code_verifier.len(), VERIFIER_LENGTH);
    assert!(pkce
        .code_verifier
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_' | '~')));
    assert_eq!(pkce.code_challenge_method, "S256");
    assert_eq!(
        pkce.code_challenge,
        PkceParams::challenge_for(&pkce.code_verifier)
    );
    // 32 bytes of SHA-256, base64url without padding
    assert_eq!(pkce.code_challenge.len(), 43);
    assert!(!pkce.code_challenge.contains('='));
}

#[test]
fn test_verify_rejects_other_verifier() {
    let pkce = PkceParams::generate();
    let other = PkceParams::generate();
    assert!(PkceParams::verify(&pkce.code_verifier, &pkce.code_challenge));
    assert!(!PkceParams::verify(&other.code_verifier, &pkce.code_challenge));
    assert!(!PkceParams::verify("", &pkce.code_challenge));
}

#[test]
fn test_debug_redacts_verifier() {
    let pkce = PkceParams::generate();
    let debug = format!("{pkce:?}");
    assert!(!debug.contains(&pkce.code_verifier));
    assert!(debug.contains("[REDACTED]"));
}

#[test]
fn test_state_values_are_unique() {
    let states: HashSet<String> = (0..64).map(|_| generate_state()).collect();
    assert_eq!(states.len(), 64);
    assert!(states.iter().all(|s| s.len() == 43));
}

#[test]
fn test_state_comparison() {
    let state = generate_state();
    assert!(state_matches(&state, &state.clone()));
    assert!(!state_matches(&state, &generate_state()));
    assert!(!state_matches(&state, ""));
}
