// PasswordHasher - salted SHA-256 password hashes
//
// Stored format is "<SALT>:<DIGEST>", both uppercase hex. The salt is 16
// random bytes and is prepended to the password before hashing.

use digest::Digest;
use rand::RngCore;
use sha2::Sha256;

use super::password_security::constant_time_eq;

/// Salted SHA-256 hasher with the salt embedded in the stored string
#[derive(Debug, Clone, Copy, Default)]
pub struct PasswordHasher;

impl PasswordHasher {
    /// Random salt size in bytes (hex encoded to twice this length)
    pub const SALT_SIZE: usize = 16;

    /// Separator between the salt and the digest in stored values
    pub const DELIMITER: char = ':';

    pub fn new() -> Self {
        PasswordHasher
    }

    /// Produce a fresh hex-encoded random salt.
    pub fn generate_salt(&self) -> String {
        let mut salt = [0u8; Self::SALT_SIZE];
        rand::thread_rng().fill_bytes(&mut salt);
        data_encoding::HEXUPPER.encode(&salt)
    }

    /// Hash a password under a newly generated salt.
    pub fn hash_password(&self, password: &str) -> String {
        let salt = self.generate_salt();
        self.hash_with_salt(&salt, password)
    }

    /// Hash a password under a caller-supplied salt.
    pub fn hash_with_salt(&self, salt: &str, password: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(salt.as_bytes());
        hasher.update(password.as_bytes());
        let digest = hasher.finalize();

        format!("{}{}{}", salt, Self::DELIMITER, data_encoding::HEXUPPER.encode(&digest))
    }

    /// Check `password` against a stored "<SALT>:<DIGEST>" value.
    pub fn validate_password(&self, stored_hash: &str, password: &str) -> bool {
        let Some((salt, _)) = stored_hash.split_once(Self::DELIMITER) else {
            tracing::debug!("Stored hash has no salt delimiter");
            return false;
        };

        let recomputed = self.hash_with_salt(salt, password);
        constant_time_eq(recomputed.as_bytes(), stored_hash.as_bytes())
    }

    /// Extract the salt portion of a stored hash, if it has one.
    pub fn salt_of(stored_hash: &str) -> Option<&str> {
        stored_hash.split_once(Self::DELIMITER).map(|(salt, _)| salt)
    }
}
