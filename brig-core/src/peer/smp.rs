//! Socialist Millionaire Protocol answer derivation.
//!
//! `im.go` hard-codes the SMP question/answer pair as the literal
//! `"eule"`. That is explicitly disallowed here (REDESIGN FLAG in
//! spec.md §9): the expected answer is derived per-conversation from
//! the remote's fingerprint, so no shipped literal is ever the actual
//! secret.

/// Derives the expected SMP answer for a conversation: a fixed-width
/// hex token keyed by `session_salt` (random per conversation) over
/// the peer's long-term fingerprint. Both sides compute this
/// independently from the same fingerprint and salt; a mismatch means
/// the peer at the other end of the key exchange does not hold the
/// fingerprint it claims to.
pub fn expected_answer(session_salt: &[u8; 32], fingerprint: &[u8]) -> String {
    let digest = blake3::keyed_hash(session_salt, fingerprint);
    hex::encode(&digest.as_bytes()[..8])
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn deterministic_per_salt_and_fingerprint() {
        let salt = [1u8; 32];
        let a = expected_answer(&salt, b"peer-fingerprint");
        let b = expected_answer(&salt, b"peer-fingerprint");
        assert_eq!(a, b);
    }

    #[test]
    fn differs_across_fingerprints() {
        let salt = [1u8; 32];
        let a = expected_answer(&salt, b"alice");
        let b = expected_answer(&salt, b"bob");
        assert_ne!(a, b);
    }

    #[test]
    fn differs_across_salts() {
        let fp = b"same-fingerprint";
        let a = expected_answer(&[1u8; 32], fp);
        let b = expected_answer(&[2u8; 32], fp);
        assert_ne!(a, b);
    }

    #[test]
    fn never_equals_the_original_hardcoded_literal() {
        let salt = [9u8; 32];
        assert_ne!(expected_answer(&salt, b"anyone"), "eule");
    }
}
