//! PKCE (Proof Key for Code Exchange) implementation per RFC 7636
//!
//! The verifier is drawn from the unreserved alphanumeric alphabet with
//! rejection sampling, so every character is equally likely. The S256
//! challenge goes into the authorization URL; the verifier itself is handed
//! to the operator and comes back through configuration for the exchange.

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngExt;
use sha2::{Digest, Sha256};

use crate::constants::{DEFAULT_VERIFIER_LENGTH, MAX_VERIFIER_LENGTH, MIN_VERIFIER_LENGTH};
use crate::error::{Error, Result};

const CHARSET: &[u8; 62] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Largest multiple of the alphabet size that fits in a byte (62 * 4).
/// Bytes at or above this are rejected to avoid modulo bias.
const ACCEPT_BELOW: u8 = 248;

/// A PKCE code verifier. Process-local, never persisted.
#[derive(Clone, PartialEq, Eq)]
pub struct CodeVerifier {
    value: String,
}

impl CodeVerifier {
    /// Generate a verifier of exactly `length` characters from `[A-Za-z0-9]`.
    ///
    /// Fails with `InvalidConfiguration` when `length` is outside
    /// `MIN_VERIFIER_LENGTH..=MAX_VERIFIER_LENGTH`.
    pub fn generate(length: usize) -> Result<Self> {
        if !(MIN_VERIFIER_LENGTH..=MAX_VERIFIER_LENGTH).contains(&length) {
            return Err(Error::InvalidConfiguration(format!(
                "code verifier length must be within {MIN_VERIFIER_LENGTH}..={MAX_VERIFIER_LENGTH}, got {length}"
            )));
        }
        let mut rng = rand::rng();
        let value = sample_alphanumeric(length, |buf| rng.fill(buf));
        Ok(Self { value })
    }

    /// Generate a verifier with the default length.
    pub fn generate_default() -> Result<Self> {
        Self::generate(DEFAULT_VERIFIER_LENGTH)
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }

    /// The `plain` challenge is the verifier itself.
    pub fn challenge_plain(&self) -> &str {
        &self.value
    }

    /// `challenge = BASE64URL(SHA256(verifier))`, unpadded.
    pub fn challenge_s256(&self) -> String {
        compute_challenge(&self.value)
    }
}

impl fmt::Display for CodeVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

impl fmt::Debug for CodeVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CodeVerifier")
            .field("len", &self.value.len())
            .finish_non_exhaustive()
    }
}

/// Compute the S256 code challenge from a raw verifier string.
pub fn compute_challenge(verifier: &str) -> String {
    let hash = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hash)
}

/// Collect `length` alphabet characters from the byte source `fill`.
///
/// `fill` is asked for a fresh block of `length` bytes until enough bytes
/// below `ACCEPT_BELOW` have been seen.
fn sample_alphanumeric(length: usize, mut fill: impl FnMut(&mut [u8])) -> String {
    let mut out = String::with_capacity(length);
    let mut block = vec![0u8; length];
    while out.len() < length {
        fill(&mut block);
        for &b in &block {
            if b >= ACCEPT_BELOW {
                continue;
            }
            out.push(char::from(CHARSET[usize::from(b % 62)]));
            if out.len() == length {
                break;
            }
        }
    }
    out
}
