use ring::rand::SecureRandom;
use serde::{Deserialize, Serialize};
use std::{convert::TryFrom, fmt};

/// An opaque content address: a 32-byte digest of unencrypted file
/// bytes plus metadata tag.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Hash(pub(crate) [u8; 32]);

impl Hash {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut inner = [0; 32];
        inner.copy_from_slice(&blake3::hash(bytes).as_bytes()[..]);
        Hash(inner)
    }

    pub(crate) fn random(random: &impl SecureRandom) -> Self {
        let mut inner = [0; 32];
        random.fill(&mut inner).expect("system RNG failure");
        Hash(inner)
    }

    pub const fn zero() -> Self {
        Hash([0; 32])
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// First 10 characters of the base58 encoding. UI only, never
    /// identity: two hashes with the same short form are not
    /// necessarily equal.
    pub fn short_b58(&self) -> String {
        let full = bs58::encode(&self.0).into_string();
        full.chars().take(10).collect()
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({})", hex::encode(self.0))
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl TryFrom<&str> for Hash {
    type Error = hex::FromHexError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        let mut inner = [0; 32];
        hex::decode_to_slice(s, &mut inner)?;
        Ok(Hash(inner))
    }
}

impl AsRef<[u8]> for Hash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}
