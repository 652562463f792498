use sha1::{Digest, Sha1};

// Lowercase hex SHA-1 of a string; the identity scheme for courses, categories and assignments.
pub fn sha1_hex(input: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(input.as_bytes());
    format!("{:x}", hasher.finalize())
}
