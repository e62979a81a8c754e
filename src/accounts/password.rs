//! PBKDF2-SHA256 password hashing.
//!
//! Encoded form: `pbkdf2_sha256$<iterations>$<salt>$<base64 hash>`. The
//! iteration count travels with the hash, so raising the configured count
//! only affects newly set passwords.

use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use zeroize::Zeroize;

pub const ALGORITHM: &str = "pbkdf2_sha256";
const KEY_LENGTH: usize = 32;
const SALT_BYTES: usize = 16;

#[derive(Debug, Clone, Copy)]
pub struct PasswordHasher {
    iterations: u32,
}

impl PasswordHasher {
    pub fn new(iterations: u32) -> Self {
        Self {
            iterations: iterations.max(1),
        }
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    /// Hash with a fresh random salt.
    pub fn hash(&self, password: &str) -> String {
        let salt = generate_salt();
        encode(password, &salt, self.iterations)
    }

    /// Check `password` against an encoded hash. Malformed hashes never verify.
    pub fn verify(&self, password: &str, encoded: &str) -> bool {
        let mut parts = encoded.splitn(4, '$');
        let (Some(algorithm), Some(iterations), Some(salt), Some(expected)) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return false;
        };
        if algorithm != ALGORITHM || salt.is_empty() {
            return false;
        }
        let Ok(iterations) = iterations.parse::<u32>() else {
            return false;
        };
        if iterations == 0 {
            return false;
        }

        let mut derived = derive(password, salt, iterations);
        let candidate = STANDARD.encode(derived);
        derived.zeroize();
        candidate.as_bytes().ct_eq(expected.as_bytes()).into()
    }
}

fn generate_salt() -> String {
    let bytes: [u8; SALT_BYTES] = rand::random();
    URL_SAFE_NO_PAD.encode(bytes)
}

fn derive(password: &str, salt: &str, iterations: u32) -> [u8; KEY_LENGTH] {
    let mut key = [0u8; KEY_LENGTH];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt.as_bytes(), iterations, &mut key);
    key
}

fn encode(password: &str, salt: &str, iterations: u32) -> String {
    let mut key = derive(password, salt, iterations);
    let hash = STANDARD.encode(key);
    key.zeroize();
    format!("{ALGORITHM}${iterations}${salt}${hash}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hasher() -> PasswordHasher {
        PasswordHasher::new(1_000)
    }

    #[test]
    fn hash_has_expected_layout() {
        let encoded = hasher().hash("rahasia123");
        let parts: Vec<&str> = encoded.split('$').collect();
        assert_eq!(parts.len(), 4);
        assert_eq!(parts[0], "pbkdf2_sha256");
        assert_eq!(parts[1], "1000");
        assert!(!parts[2].is_empty());
    }

    #[test]
    fn verify_accepts_correct_password() {
        let h = hasher();
        let encoded = h.hash("rahasia123");
        assert!(h.verify("rahasia123", &encoded));
        assert!(!h.verify("rahasia124", &encoded));
    }

    #[test]
    fn salts_differ_between_hashes() {
        let h = hasher();
        assert_ne!(h.hash("same"), h.hash("same"));
    }

    #[test]
    fn verify_uses_stored_iteration_count() {
        let encoded = PasswordHasher::new(500).hash("pw");
        assert!(PasswordHasher::new(2_000).verify("pw", &encoded));
    }

    #[test]
    fn known_vector_matches() {
        // RFC 7914 PBKDF2-HMAC-SHA256 vector, c = 1.
        let encoded = encode("password", "salt", 1);
        assert_eq!(
            encoded,
            "pbkdf2_sha256$1$salt$Eg+2z/z4syxD5yJSVsT4N6hlSMkszDVICAWYfLcL4Xs="
        );
        assert!(hasher().verify("password", &encoded));
    }

    #[test]
    fn malformed_hashes_never_verify() {
        let h = hasher();
        assert!(!h.verify("pw", ""));
        assert!(!h.verify("pw", "!"));
        assert!(!h.verify("pw", "md5$1$salt$abc"));
        assert!(!h.verify("pw", "pbkdf2_sha256$zero$salt$abc"));
        assert!(!h.verify("pw", "pbkdf2_sha256$0$salt$abc"));
    }
}
