// ABOUTME: PKCE (RFC 7636) verifier/challenge generation and CSRF state values
// ABOUTME: S256 only; verifiers use the unreserved alphabet and are 64 characters long
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Engify.ai

use std::fmt;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::rngs::OsRng;
use rand::{Rng, RngCore};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::constants::oauth::PKCE_METHOD_S256;

/// RFC 7636 section 4.1 unreserved characters
const VERIFIER_ALPHABET: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-._~";

/// Verifier length (RFC 7636 allows 43..=128)
pub const VERIFIER_LENGTH: usize = 64;

/// PKCE parameters for one authorization request
#[derive(Clone)]
pub struct PkceParams {
    /// Secret verifier, sent only to the token endpoint
    pub code_verifier: String,
    /// Derived challenge, sent in the authorization URL
    pub code_challenge: String,
    /// Always `S256`
    pub code_challenge_method: &'static str,
}

impl PkceParams {
    /// Generate a fresh verifier and its S256 challenge
    #[must_use]
    pub fn generate() -> Self {
        let mut rng = OsRng;
        let code_verifier: String = (0..VERIFIER_LENGTH)
            .map(|_| char::from(VERIFIER_ALPHABET[rng.gen_range(0..VERIFIER_ALPHABET.len())]))
            .collect();
        let code_challenge = Self::challenge_for(&code_verifier);
        Self {
            code_verifier,
            code_challenge,
            code_challenge_method: PKCE_METHOD_S256,
        }
    }

    /// `BASE64URL-NOPAD(SHA256(verifier))`
    #[must_use]
    pub fn challenge_for(verifier: &str) -> String {
        URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
    }

    /// Check a verifier against a challenge in constant time
    #[must_use]
    pub fn verify(verifier: &str, challenge: &str) -> bool {
        Self::challenge_for(verifier)
            .as_bytes()
            .ct_eq(challenge.as_bytes())
            .into()
    }
}

impl fmt::Debug for PkceParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PkceParams")
            .field("code_verifier", &"[REDACTED]")
            .field("code_challenge", &self.code_challenge)
            .field("code_challenge_method", &self.code_challenge_method)
            .finish()
    }
}

/// Random CSRF `state` value (256 bits, base64url)
#[must_use]
pub fn generate_state() -> String {
    let mut bytes = [0_u8; 32];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Compare a returned `state` with the expected one in constant time
#[must_use]
pub fn state_matches(expected: &str, returned: &str) -> bool {
    expected.as_bytes().ct_eq(returned.as_bytes()).into()
}
