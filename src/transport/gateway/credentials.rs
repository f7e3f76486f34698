//! Client passwords and the producer API key.
//!
//! Passwords are stored as hex SHA-256 digests. Every secret comparison runs
//! in constant time.

use sha2::{Digest, Sha256};

pub fn hash_password(password: &str) -> String {
    hex::encode(Sha256::digest(password.as_bytes()))
}

pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    constant_time_eq(&hash_password(password), stored_hash.trim())
}

/// Constant-time equality comparison for secret strings.
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    use subtle::ConstantTimeEq;
    a.as_bytes().ct_eq(b.as_bytes()).into()
}
