use super::{Error, Key};
use ring::aead;

/// Cipher selection is normative per the frame format; both variants
/// are implemented via `ring::aead`, which supports both AEADs
/// natively, so no separate chacha20poly1305 crate is needed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum CipherId {
    Aes256Gcm = 1,
    ChaCha20Poly1305 = 2,
}

impl TryFrom<u8> for CipherId {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Error> {
        match value {
            1 => Ok(CipherId::Aes256Gcm),
            2 => Ok(CipherId::ChaCha20Poly1305),
            other => Err(Error::UnknownCipher(other)),
        }
    }
}

impl CipherId {
    fn algorithm(self) -> &'static aead::Algorithm {
        match self {
            CipherId::Aes256Gcm => &aead::AES_256_GCM,
            CipherId::ChaCha20Poly1305 => &aead::CHACHA20_POLY1305,
        }
    }

    pub(crate) fn key(self, key: &Key) -> aead::LessSafeKey {
        let unbound = aead::UnboundKey::new(self.algorithm(), &key.0).expect("32-byte key");
        aead::LessSafeKey::new(unbound)
    }
}
