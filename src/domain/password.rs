//! Password hashing for account credentials.
//!
//! Argon2id (memory-hard) with a random salt per password; hashes are stored
//! as PHC strings so the parameters travel with the hash.

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use thiserror::Error;

/// Errors during password hashing.
#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("Invalid Argon2 parameters: {0}")]
    Params(String),

    #[error("Password hashing failed: {0}")]
    Hashing(String),

    #[error("Stored password hash is malformed")]
    MalformedHash,
}

/// Argon2id cost parameters.
#[derive(Debug, Clone, Copy)]
pub struct PasswordPolicy {
    /// Memory cost in KiB
    pub memory_kib: u32,
    /// Iterations
    pub iterations: u32,
    /// Lanes
    pub parallelism: u32,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            memory_kib: 47104,
            iterations: 1,
            parallelism: 1,
        }
    }
}

impl PasswordPolicy {
    fn argon2(&self) -> Result<Argon2<'static>, PasswordError> {
        let params = Params::new(self.memory_kib, self.iterations, self.parallelism, Some(32))
            .map_err(|e| PasswordError::Params(e.to_string()))?;
        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }

    /// Hash a password into a PHC string.
    ///
    /// # Errors
    /// Returns error if the parameters are invalid or hashing fails.
    pub fn hash(&self, password: &str) -> Result<String, PasswordError> {
        let salt = generate_salt()?;
        let hash = self
            .argon2()?
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| PasswordError::Hashing(e.to_string()))?;
        Ok(hash.to_string())
    }

    /// Check a password against a stored PHC string.
    ///
    /// Parameters are read from the stored hash, so hashes made under an older
    /// policy still verify.
    ///
    /// # Errors
    /// Returns `MalformedHash` if the stored string cannot be parsed.
    pub fn verify(&self, password: &str, stored: &str) -> Result<bool, PasswordError> {
        let parsed = PasswordHash::new(stored).map_err(|_| PasswordError::MalformedHash)?;
        Ok(self
            .argon2()?
            .verify_password(password.as_bytes(), &parsed)
            .is_ok())
    }
}

/// Generate a random 16-byte salt.
fn generate_salt() -> Result<SaltString, PasswordError> {
    use rand::{RngCore, SeedableRng};
    use rand_chacha::ChaCha20Rng;

    let mut bytes = [0u8; 16];
    ChaCha20Rng::from_entropy().fill_bytes(&mut bytes);
    SaltString::encode_b64(&bytes).map_err(|e| PasswordError::Hashing(e.to_string()))
}
