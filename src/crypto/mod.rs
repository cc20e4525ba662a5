//! Credential hashing, token issuance and secret handling.

/// Password hashing and verification.
pub mod password;
/// Signed token issuance.
pub mod token;

use rand::RngCore;
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

pub use password::{hash_password, verify_dummy, verify_password, HashedPassword};
pub use token::{Claims, TokenIssuer};

/// Number of random bytes in a generated per-user secret.
pub const SECRET_LEN: usize = 32;

/// Errors raised by hashing and signing.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    /// The hasher itself failed; not caused by the input password.
    #[error("Password hashing failed: {0}")]
    Hashing(String),

    /// A stored hash could not be parsed or uses unsupported parameters.
    #[error("Malformed password hash: {0}")]
    MalformedHash(String),

    /// Token serialization or signing failed.
    #[error("Token signing failed: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),

    /// The system clock is before the Unix epoch.
    #[error("System clock error: {0}")]
    Clock(String),
}

/// Generates a hex-encoded secret from the operating system CSPRNG.
pub fn generate_secret() -> String {
    let mut bytes = [0u8; SECRET_LEN];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Compares a caller-supplied key against the configured one in constant time.
///
/// Both sides are hashed first so the comparison does not leak the expected
/// length. An empty expected key never matches.
pub fn keys_match(provided: &str, expected: &str) -> bool {
    if expected.is_empty() {
        return false;
    }

    let provided = Sha256::digest(provided.as_bytes());
    let expected = Sha256::digest(expected.as_bytes());

    bool::from(provided.as_slice().ct_eq(expected.as_slice()))
}
