//! The repository's long-term peer identity: an Ed25519 keypair
//! persisted at `<repo>/otr.key` with `0600` permissions (spec.md §6),
//! whose public key's digest is this peer's fingerprint — the value
//! `Remote.fingerprint` and the SMP step in [`crate::peer::smp`]
//! authenticate against.
//!
//! Grounded on the teacher's `RawKey` in `crypto/rawkey.rs`: private
//! key material is `Zeroize`/`ZeroizeOnDrop` and only reachable through
//! `secrecy`'s `ExposeSecret`, the same discipline the teacher applies
//! to its own raw keys and to `Argon2UserPass`'s credentials.

use ring::{
    rand::SecureRandom,
    signature::{Ed25519KeyPair, KeyPair},
};
use secrecy::{ExposeSecret, Secret};
use std::{fs, io, path::Path};
use thiserror::Error;
use zeroize::Zeroize;

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

#[derive(Error, Debug)]
pub enum IdentityError {
    #[error("key generation failed")]
    Generation,
    #[error("stored key material is corrupt")]
    Corrupt,
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, IdentityError>;

/// A long-term Ed25519 identity. The PKCS#8 document backing it is
/// kept behind `secrecy::Secret` and zeroized on drop; only the
/// derived fingerprint and signing operations are exposed.
pub struct Identity {
    pkcs8: Secret<Pkcs8Bytes>,
    public_key: Vec<u8>,
}

struct Pkcs8Bytes(Vec<u8>);

impl Zeroize for Pkcs8Bytes {
    fn zeroize(&mut self) {
        self.0.zeroize();
    }
}

impl Identity {
    /// Generates a fresh identity using the system RNG.
    pub fn generate(rng: &dyn SecureRandom) -> Result<Self> {
        let doc = Ed25519KeyPair::generate_pkcs8(rng).map_err(|_| IdentityError::Generation)?;
        Self::from_pkcs8(doc.as_ref().to_vec())
    }

    fn from_pkcs8(bytes: Vec<u8>) -> Result<Self> {
        let keypair = Ed25519KeyPair::from_pkcs8(&bytes).map_err(|_| IdentityError::Corrupt)?;
        let public_key = keypair.public_key().as_ref().to_vec();
        Ok(Identity {
            pkcs8: Secret::new(Pkcs8Bytes(bytes)),
            public_key,
        })
    }

    /// Loads the identity at `path`, generating and persisting a new
    /// one if it doesn't exist yet — mirrors `Repo::open`'s
    /// create-on-first-use handling of `catalog.log`.
    pub fn load_or_generate(path: impl AsRef<Path>, rng: &dyn SecureRandom) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            let bytes = fs::read(path)?;
            Self::from_pkcs8(bytes)
        } else {
            let identity = Self::generate(rng)?;
            identity.save(path)?;
            Ok(identity)
        }
    }

    /// Writes the PKCS#8 document to `path` with owner-only
    /// permissions on Unix, matching spec.md §6's `otr.key (0600
    /// permissions)`.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        fs::write(path, &self.pkcs8.expose_secret().0)?;

        #[cfg(unix)]
        {
            let mut perms = fs::metadata(path)?.permissions();
            perms.set_mode(0o600);
            fs::set_permissions(path, perms)?;
        }

        Ok(())
    }

    pub fn public_key(&self) -> &[u8] {
        &self.public_key
    }

    /// The fingerprint peers authenticate against: a blake3 digest of
    /// the Ed25519 public key, base58-encoded the same way
    /// [`crate::hash::Hash::short_b58`] renders content hashes.
    pub fn fingerprint(&self) -> String {
        bs58::encode(blake3::hash(&self.public_key).as_bytes()).into_string()
    }

    pub fn sign(&self, message: &[u8]) -> Result<Vec<u8>> {
        let keypair =
            Ed25519KeyPair::from_pkcs8(&self.pkcs8.expose_secret().0).map_err(|_| IdentityError::Corrupt)?;
        Ok(keypair.sign(message).as_ref().to_vec())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use ring::signature::{UnparsedPublicKey, ED25519};

    fn rng() -> ring::rand::SystemRandom {
        ring::rand::SystemRandom::new()
    }

    #[test]
    fn generated_identity_signs_verifiably() {
        let identity = Identity::generate(&rng()).unwrap();
        let sig = identity.sign(b"hello").unwrap();

        let public_key = UnparsedPublicKey::new(&ED25519, identity.public_key());
        assert!(public_key.verify(b"hello", &sig).is_ok());
    }

    #[test]
    fn fingerprint_is_stable_for_the_same_identity() {
        let identity = Identity::generate(&rng()).unwrap();
        assert_eq!(identity.fingerprint(), identity.fingerprint());
    }

    #[test]
    fn different_identities_have_different_fingerprints() {
        let a = Identity::generate(&rng()).unwrap();
        let b = Identity::generate(&rng()).unwrap();
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn load_or_generate_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let key_path = dir.path().join("otr.key");

        let first = Identity::load_or_generate(&key_path, &rng()).unwrap();
        let second = Identity::load_or_generate(&key_path, &rng()).unwrap();

        assert_eq!(first.fingerprint(), second.fingerprint());
    }

    #[cfg(unix)]
    #[test]
    fn saved_key_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let key_path = dir.path().join("otr.key");
        Identity::load_or_generate(&key_path, &rng()).unwrap();

        let mode = fs::metadata(&key_path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
