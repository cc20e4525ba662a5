//! Password hashing and verification using Argon2id.
//!
//! Hashes are stored as PHC strings, which embed the algorithm, version, cost
//! parameters and salt. Verification reads the parameters back out of the
//! stored string, so raising the cost constants below never invalidates
//! existing hashes.

use std::fmt;
use std::sync::OnceLock;

use argon2::password_hash::{self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use rand::rngs::OsRng;

use super::CryptoError;

/// Argon2 memory cost in KiB.
pub const MEMORY_COST_KIB: u32 = 19 * 1024;
/// Argon2 iteration count.
pub const TIME_COST: u32 = 2;
/// Argon2 lane count.
pub const PARALLELISM: u32 = 1;

/// A password hash in PHC string format.
#[derive(Clone, PartialEq, Eq)]
pub struct HashedPassword(String);

impl HashedPassword {
    /// Wraps a PHC string read back from storage.
    pub fn from_phc(phc: impl Into<String>) -> Self {
        Self(phc.into())
    }

    /// Returns the PHC string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for HashedPassword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("HashedPassword(..)")
    }
}

fn hasher() -> Result<Argon2<'static>, CryptoError> {
    let params = Params::new(MEMORY_COST_KIB, TIME_COST, PARALLELISM, None)
        .map_err(|e| CryptoError::Hashing(e.to_string()))?;

    Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
}

/// Hashes a password with a fresh random salt.
///
/// Two calls with the same input never return the same string.
pub fn hash_password(password: &str) -> Result<HashedPassword, CryptoError> {
    let salt = SaltString::generate(&mut OsRng);

    hasher()?
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| HashedPassword(hash.to_string()))
        .map_err(|e| CryptoError::Hashing(e.to_string()))
}

/// Verifies a password against a stored hash.
///
/// Returns `Ok(false)` for a wrong password and
/// [`CryptoError::MalformedHash`] if the stored hash is corrupt.
pub fn verify_password(hash: &HashedPassword, password: &str) -> Result<bool, CryptoError> {
    let parsed =
        PasswordHash::new(hash.as_str()).map_err(|e| CryptoError::MalformedHash(e.to_string()))?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(password_hash::Error::Password) => Ok(false),
        Err(e) => Err(CryptoError::MalformedHash(e.to_string())),
    }
}

/// Runs a verification against a throwaway hash and discards the outcome.
///
/// Login calls this when the email is unknown, so that path costs as much as
/// checking a real password.
pub fn verify_dummy(password: &str) {
    static DUMMY: OnceLock<Option<HashedPassword>> = OnceLock::new();

    let dummy = DUMMY.get_or_init(|| hash_password("dummy-password-for-timing").ok());
    if let Some(hash) = dummy {
        let _ = verify_password(hash, password);
    }
}
