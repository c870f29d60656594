//! Verification token generation
//!
//! Tokens are drawn from the operating system CSPRNG and encoded as
//! unpadded base64url so they can be embedded directly in a query string.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};

use crate::error::Error;

/// Number of random bytes behind every token (256 bits)
pub const TOKEN_BYTES: usize = 32;

/// Number of leading characters of a token that may appear in logs
const FINGERPRINT_LEN: usize = 6;

/// Generate a fresh single-use token: 32 random bytes, URL-safe base64 encoded (43 chars)
pub fn generate_token() -> Result<String, Error> {
    let mut token_bytes = [0u8; TOKEN_BYTES];
    getrandom::getrandom(&mut token_bytes)
        .map_err(|e| Error::Internal(format!("Failed to generate random bytes: {}", e)))?;
    Ok(URL_SAFE_NO_PAD.encode(token_bytes))
}

/// Short, non-reversible prefix of a token for log correlation.
///
/// Never log a full token: possession of it is the credential.
pub fn token_fingerprint(token: &str) -> String {
    let prefix: String = token.chars().take(FINGERPRINT_LEN).collect();
    format!("{}…", prefix)
}
