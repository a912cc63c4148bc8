//! Guest ticket tokens.
//!
//! A token is 32 random bytes, hex encoded, handed to the guest once at
//! reservation time. Only its SHA-256 digest is stored.

use rand::RngCore;
use sha2::{Digest, Sha256};

/// Length of an encoded ticket token.
pub const TICKET_TOKEN_LEN: usize = 64;

/// Generates a fresh random ticket token.
#[must_use]
pub fn generate_ticket_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// SHA-256 hex digest of `token`, as stored on the reservation.
#[must_use]
pub fn hash_ticket_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Returns `true` if `token` has the shape of an issued token.
#[must_use]
pub fn is_well_formed(token: &str) -> bool {
    token.len() == TICKET_TOKEN_LEN && token.bytes().all(|b| b.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_tokens_are_well_formed_and_unique() {
        let a = generate_ticket_token();
        let b = generate_ticket_token();
        assert!(is_well_formed(&a));
        assert_ne!(a, b);
    }

    #[test]
    fn hash_is_stable_sha256_hex() {
        assert_eq!(
            hash_ticket_token("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn malformed_tokens_are_detected() {
        assert!(!is_well_formed("short"));
        assert!(!is_well_formed(&"z".repeat(TICKET_TOKEN_LEN)));
    }
}
