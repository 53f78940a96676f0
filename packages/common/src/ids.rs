use rand::distr::Alphanumeric;
use rand::Rng;

/// Length of the random part of entity identifiers (e.g. `sig_…`).
const ENTITY_ID_LEN: usize = 12;

/// Generate a prefixed opaque identifier, e.g. `generate("sig")` -> `sig_x7Kp92mQdRwa`.
pub fn generate(prefix: &str) -> String {
    format!("{}_{}", prefix, random_token(ENTITY_ID_LEN))
}

/// A URL-safe random token of `len` alphanumeric characters drawn from the
/// thread-local CSPRNG.
pub fn random_token(len: usize) -> String {
    rand::rng()
        .sample_iter(Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_has_prefix_and_length() {
        let id = generate("sig");
        assert!(id.starts_with("sig_"));
        assert_eq!(id.len(), "sig_".len() + ENTITY_ID_LEN);
    }

    #[test]
    fn test_generate_is_url_safe() {
        let id = generate("del");
        assert!(id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_'));
    }

    #[test]
    fn test_random_token_length() {
        assert_eq!(random_token(24).len(), 24);
        assert_eq!(random_token(0).len(), 0);
    }

    #[test]
    fn test_ids_are_unique() {
        let a = generate("conn");
        let b = generate("conn");
        assert_ne!(a, b);
    }
}
