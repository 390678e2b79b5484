use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};

const TOKEN_BYTES: usize = 32;

/// A freshly minted bearer token and the digest that gets persisted in its place.
#[derive(Clone, PartialEq, Eq)]
pub struct IssuedToken {
    pub token: String,
    pub token_hash: String,
}

impl std::fmt::Debug for IssuedToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssuedToken")
            .field("token", &"<redacted>")
            .field("token_hash", &self.token_hash)
            .finish()
    }
}

/// Mints URL-safe bearer tokens from the operating system RNG and derives their lookup hashes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SecretTokenService;

impl SecretTokenService {
    pub fn issue(&self) -> IssuedToken {
        let mut bytes = [0u8; TOKEN_BYTES];
        OsRng.fill_bytes(&mut bytes);
        let token = hex::encode(bytes);
        let token_hash = self.hash(&token);
        IssuedToken { token, token_hash }
    }

    /// SHA-256 over the raw token, hex encoded.
    pub fn hash(&self, token: &str) -> String {
        hex::encode(Sha256::digest(token.as_bytes()))
    }
}

/// Short prefix of a hash for log lines; never log the token itself.
pub(crate) fn hash_prefix(hash: &str) -> &str {
    hash.get(..8).unwrap_or(hash)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_hash_matches_hash_of_token() {
        let service = SecretTokenService;
        let issued = service.issue();
        assert_eq!(service.hash(&issued.token), issued.token_hash);
        assert_ne!(issued.token, issued.token_hash);
    }

    #[test]
    fn issued_tokens_are_distinct() {
        let service = SecretTokenService;
        let first = service.issue();
        let second = service.issue();
        assert_ne!(first.token, second.token);
        assert_ne!(first.token_hash, second.token_hash);
    }

    #[test]
    fn tokens_carry_256_bits_and_are_url_safe() {
        let issued = SecretTokenService.issue();
        assert_eq!(issued.token.len(), TOKEN_BYTES * 2);
        assert!(issued.token.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(issued.token_hash.len(), 64);
    }

    #[test]
    fn hash_is_deterministic() {
        let service = SecretTokenService;
        assert_eq!(
            service.hash("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(service.hash("abc"), service.hash("abc"));
    }

    #[test]
    fn debug_output_redacts_token() {
        let issued = SecretTokenService.issue();
        let rendered = format!("{issued:?}");
        assert!(!rendered.contains(&issued.token));
        assert_eq!(hash_prefix(&issued.token_hash).len(), 8);
    }
}
