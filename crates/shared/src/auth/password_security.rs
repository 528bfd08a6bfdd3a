// PasswordSecurity - salt generation and salted SHA-1 password hashes
//
// The stored hash is sha1(password ++ salt) as 40 lowercase hex characters;
// the salt travels separately in its own column.

use rand::Rng;
use rand::distributions::Alphanumeric;

use super::sha1;

/// Salt length used when the caller has no preference
pub const DEFAULT_SALT_LENGTH: usize = 8;

/// Salted SHA-1 hashing helpers
pub struct PasswordSecurity;

impl PasswordSecurity {
    /// Generate a random salt of `length` characters drawn from `[0-9A-Za-z]`.
    pub fn generate_salt(length: usize) -> String {
        rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(length)
            .map(char::from)
            .collect()
    }

    /// Hash a password with the given salt.
    pub fn hash_password(password: &str, salt: &str) -> String {
        let mut salted = Vec::with_capacity(password.len() + salt.len());
        salted.extend_from_slice(password.as_bytes());
        salted.extend_from_slice(salt.as_bytes());
        sha1::hash(&salted)
    }

    /// Check `password` + `salt` against a previously stored hash.
    /// A stored value of the wrong shape simply fails to match.
    pub fn validate_password(hashed: &str, password: &str, salt: &str) -> bool {
        constant_time_eq(hashed.as_bytes(), Self::hash_password(password, salt).as_bytes())
    }
}

/// Compare two byte strings without short-circuiting on the first mismatch.
pub(crate) fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_salt_length_and_charset() {
        for length in [0, 1, 8, 16, 64] {
            let salt = PasswordSecurity::generate_salt(length);
            assert_eq!(salt.len(), length);
            assert!(salt.chars().all(|c| c.is_ascii_alphanumeric()));
        }
    }

    #[test]
    fn test_generate_salt_varies() {
        let a = PasswordSecurity::generate_salt(DEFAULT_SALT_LENGTH);
        let b = PasswordSecurity::generate_salt(DEFAULT_SALT_LENGTH);
        let c = PasswordSecurity::generate_salt(DEFAULT_SALT_LENGTH);
        assert!(a != b || b != c);
    }

    #[test]
    fn test_unsalted_hash_is_plain_sha1() {
        assert_eq!(
            PasswordSecurity::hash_password("abc", ""),
            "a9993e364706816aba3e25717850c26c9cd0d89d"
        );
    }

    #[test]
    fn test_password_then_salt_order() {
        assert_eq!(
            PasswordSecurity::hash_password("ab", "c"),
            sha1::hash(b"abc")
        );
        assert_ne!(
            PasswordSecurity::hash_password("TestPassword", "salt"),
            sha1::hash(b"saltTestPassword")
        );
    }

    #[test]
    fn test_validate_round_trip() {
        let salt = PasswordSecurity::generate_salt(DEFAULT_SALT_LENGTH);
        let hashed = PasswordSecurity::hash_password("TestPassword", &salt);

        assert!(PasswordSecurity::validate_password(&hashed, "TestPassword", &salt));
        assert!(!PasswordSecurity::validate_password(&hashed, "PasswordTest", &salt));
        assert!(!PasswordSecurity::validate_password(&hashed, "TestPassword", "other"));
    }

    #[test]
    fn test_validate_rejects_malformed_stored_value() {
        assert!(!PasswordSecurity::validate_password("", "pw", "salt"));
        assert!(!PasswordSecurity::validate_password("not-a-hash", "pw", "salt"));
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"abcd"));
        assert!(constant_time_eq(b"", b""));
    }
}
