//! CSRF state nonce for the authorization code flow
//!
//! The state parameter ties an authorization callback to the request that
//! started it. It is generated from the OS random source and compared in
//! constant time.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use smartthings_domain::constants::STATE_NONCE_BYTES;

/// Generate a cryptographically random state parameter
///
/// # Returns
/// 32 random bytes, base64url encoded without padding (43 characters)
#[must_use]
pub fn generate_state() -> String {
    let mut bytes = [0u8; STATE_NONCE_BYTES];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Validate that the state returned in a callback matches the one sent
///
/// # Arguments
/// * `expected` - The state that was sent in the authorization request
/// * `received` - The state received in the callback
///
/// # Returns
/// `true` if states match, `false` otherwise (including when either is
/// empty)
#[must_use]
pub fn validate_state(expected: &str, received: &str) -> bool {
    let (expected, received) = (expected.as_bytes(), received.as_bytes());
    if expected.is_empty() || expected.len() != received.len() {
        return false;
    }
    expected.iter().zip(received).fold(0u8, |acc, (a, b)| acc | (a ^ b)) == 0
}
