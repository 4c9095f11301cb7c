//! Shared-secret check for machine-to-machine endpoints.

use sha2::{Digest, Sha256};

fn digest(value: &str) -> [u8; 32] {
    Sha256::digest(value.as_bytes()).into()
}

/// Compare `provided` against `expected` by SHA-256 digest.
///
/// Both sides are hashed to a fixed length first so the comparison does
/// not depend on where the inputs differ. An empty `expected` never
/// matches.
pub fn secret_matches(provided: &str, expected: &str) -> bool {
    if expected.is_empty() {
        return false;
    }
    let (a, b) = (digest(provided), digest(expected));
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matching_secret_is_accepted() {
        assert!(secret_matches("s3cret", "s3cret"));
    }

    #[test]
    fn wrong_or_unset_secret_is_rejected() {
        assert!(!secret_matches("s3cret", "other"));
        assert!(!secret_matches("", ""));
        assert!(!secret_matches("s3cret", ""));
    }
}
