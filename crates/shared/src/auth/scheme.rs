// Password schemes
// Both salted hashers sit behind one hash/verify interface so the account
// layer does not care which one is configured.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::password_hasher::PasswordHasher;
use super::password_security::{PasswordSecurity, DEFAULT_SALT_LENGTH};

/// Salt and hash as persisted in the `Users` table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub salt: String,
    pub passhash: String,
}

/// A password hashing strategy
pub trait PasswordScheme: Send + Sync {
    /// Short identifier, as used in configuration
    fn name(&self) -> &'static str;

    /// Hash a password under a freshly generated salt.
    fn hash(&self, password: &str) -> Credential;

    /// Check a password against a stored credential. Never errors: a
    /// malformed credential is a failed verification.
    fn verify(&self, credential: &Credential, password: &str) -> bool;
}

/// Salted SHA-1, salt stored in its own column
#[derive(Debug, Clone, Copy)]
pub struct Sha1Salted {
    pub salt_length: usize,
}

impl Default for Sha1Salted {
    fn default() -> Self {
        Sha1Salted { salt_length: DEFAULT_SALT_LENGTH }
    }
}

impl PasswordScheme for Sha1Salted {
    fn name(&self) -> &'static str {
        "sha1"
    }

    fn hash(&self, password: &str) -> Credential {
        let salt = PasswordSecurity::generate_salt(self.salt_length);
        let passhash = PasswordSecurity::hash_password(password, &salt);
        Credential { salt, passhash }
    }

    fn verify(&self, credential: &Credential, password: &str) -> bool {
        PasswordSecurity::validate_password(&credential.passhash, password, &credential.salt)
    }
}

/// Salted SHA-256, salt embedded in the hash as "<SALT>:<DIGEST>"
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256Salted {
    hasher: PasswordHasher,
}

impl PasswordScheme for Sha256Salted {
    fn name(&self) -> &'static str {
        "sha256"
    }

    fn hash(&self, password: &str) -> Credential {
        let passhash = self.hasher.hash_password(password);
        let salt = PasswordHasher::salt_of(&passhash).unwrap_or_default().to_string();
        Credential { salt, passhash }
    }

    fn verify(&self, credential: &Credential, password: &str) -> bool {
        self.hasher.validate_password(&credential.passhash, password)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown password scheme '{0}' (expected 'sha1' or 'sha256')")]
pub struct UnknownScheme(pub String);

/// Configurable choice of password scheme
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PasswordSchemeKind {
    #[default]
    Sha1,
    Sha256,
}

impl PasswordSchemeKind {
    /// Instantiate the scheme. `salt_length` only applies to SHA-1.
    pub fn build(self, salt_length: usize) -> Box<dyn PasswordScheme> {
        match self {
            PasswordSchemeKind::Sha1 => Box::new(Sha1Salted { salt_length }),
            PasswordSchemeKind::Sha256 => Box::new(Sha256Salted::default()),
        }
    }
}

impl FromStr for PasswordSchemeKind {
    type Err = UnknownScheme;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sha1" | "sha-1" => Ok(PasswordSchemeKind::Sha1),
            "sha256" | "sha-256" => Ok(PasswordSchemeKind::Sha256),
            _ => Err(UnknownScheme(s.to_string())),
        }
    }
}

impl fmt::Display for PasswordSchemeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PasswordSchemeKind::Sha1 => write!(f, "sha1"),
            PasswordSchemeKind::Sha256 => write!(f, "sha256"),
        }
    }
}
