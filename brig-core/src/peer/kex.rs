//! Key exchange abstraction for the peer channel.
//!
//! spec.md normatively requires only the conversation state machine
//! and the SMP authentication step; the actual wire handshake is left
//! open (OTRv2/OTRv3 compatibility is explicitly not mandated). This
//! models it as a trait so a future OTR-compatible implementation can
//! slot in, with a default X25519 + HKDF exchange grounded on `ring`,
//! the same crypto crate the teacher uses elsewhere (`crypto.rs`).

use parking_lot::Mutex;
use ring::{agreement, hkdf, rand::SecureRandom};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum KeyExchangeError {
    #[error("key generation failed")]
    Generation,
    #[error("key agreement failed")]
    Agreement,
    #[error("exchange already consumed")]
    AlreadyConsumed,
}

pub trait KeyExchange: Send + Sync {
    /// The local ephemeral public key to send to the peer.
    fn local_public_key(&self) -> &[u8];

    /// Consumes the local private key material and derives a 32-byte
    /// shared secret from the peer's public key. Can only succeed once.
    fn derive_shared_key(&self, peer_public_key: &[u8]) -> Result<[u8; 32], KeyExchangeError>;
}

struct Len32;
impl hkdf::KeyType for Len32 {
    fn len(&self) -> usize {
        32
    }
}

/// X25519 ECDH plus HKDF-SHA256, standing in for a Noise-style
/// handshake. Not OTR wire-compatible; spec.md doesn't require that,
/// only the state machine and SMP step.
pub struct NoiseLikeExchange {
    private_key: Mutex<Option<agreement::EphemeralPrivateKey>>,
    public_key: Vec<u8>,
}

impl NoiseLikeExchange {
    pub fn new(rng: &dyn SecureRandom) -> Result<Self, KeyExchangeError> {
        let private_key = agreement::EphemeralPrivateKey::generate(&agreement::X25519, rng)
            .map_err(|_| KeyExchangeError::Generation)?;
        let public_key = private_key
            .compute_public_key()
            .map_err(|_| KeyExchangeError::Generation)?
            .as_ref()
            .to_vec();

        Ok(NoiseLikeExchange {
            private_key: Mutex::new(Some(private_key)),
            public_key,
        })
    }
}

impl KeyExchange for NoiseLikeExchange {
    fn local_public_key(&self) -> &[u8] {
        &self.public_key
    }

    fn derive_shared_key(&self, peer_public_key: &[u8]) -> Result<[u8; 32], KeyExchangeError> {
        let private_key = self
            .private_key
            .lock()
            .take()
            .ok_or(KeyExchangeError::AlreadyConsumed)?;
        let peer_public = agreement::UnparsedPublicKey::new(&agreement::X25519, peer_public_key);

        agreement::agree_ephemeral(
            private_key,
            &peer_public,
            KeyExchangeError::Agreement,
            |shared_secret| {
                let salt = hkdf::Salt::new(hkdf::HKDF_SHA256, &[]);
                let prk = salt.extract(shared_secret);
                let okm = prk
                    .expand(&[b"brig-peer-channel"], Len32)
                    .map_err(|_| KeyExchangeError::Agreement)?;
                let mut out = [0u8; 32];
                okm.fill(&mut out).map_err(|_| KeyExchangeError::Agreement)?;
                Ok(out)
            },
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use ring::rand::SystemRandom;

    #[test]
    fn both_sides_derive_the_same_shared_key() {
        let rng = SystemRandom::new();
        let alice = NoiseLikeExchange::new(&rng).unwrap();
        let bob = NoiseLikeExchange::new(&rng).unwrap();

        let alice_public = alice.local_public_key().to_vec();
        let bob_public = bob.local_public_key().to_vec();

        let alice_shared = alice.derive_shared_key(&bob_public).unwrap();
        let bob_shared = bob.derive_shared_key(&alice_public).unwrap();

        assert_eq!(alice_shared, bob_shared);
    }

    #[test]
    fn reuse_after_consumption_fails() {
        let rng = SystemRandom::new();
        let alice = NoiseLikeExchange::new(&rng).unwrap();
        let bob = NoiseLikeExchange::new(&rng).unwrap();
        let bob_public = bob.local_public_key().to_vec();

        alice.derive_shared_key(&bob_public).unwrap();
        let err = alice.derive_shared_key(&bob_public).unwrap_err();
        assert!(matches!(err, KeyExchangeError::AlreadyConsumed));
    }
}
