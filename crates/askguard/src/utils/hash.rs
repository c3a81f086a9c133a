use sha2::{Digest, Sha256};

/// Lower-case hex SHA-256 of `input`; always 64 characters.
#[must_use]
pub fn sha256_hex(input: &str) -> String {
    hex::encode(Sha256::digest(input.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::sha256_hex;

    #[test]
    fn hash_is_stable_for_same_input() {
        let value = "askguard-stable";
        assert_eq!(sha256_hex(value), sha256_hex(value));
        assert_eq!(sha256_hex(value).len(), 64);
    }

    #[test]
    fn hash_differs_for_different_inputs() {
        assert_ne!(sha256_hex("alpha"), sha256_hex("beta"));
    }

    #[test]
    fn hash_matches_known_digest() {
        assert_eq!(
            sha256_hex(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
