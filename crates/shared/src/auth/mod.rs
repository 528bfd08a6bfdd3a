// Auth module - message digest and password hashing

pub mod password_hasher;
pub mod password_security;
pub mod scheme;
pub mod sha1;

pub use password_hasher::PasswordHasher;
pub use password_security::{PasswordSecurity, DEFAULT_SALT_LENGTH};
pub use scheme::{Credential, PasswordScheme, PasswordSchemeKind, Sha1Salted, Sha256Salted};
