//! Symmetric stream cipher framing.
//!
//! A seekable, authenticated, chunked stream format: encrypts an
//! arbitrary input stream under a 32-byte key and reads back as a
//! standard byte stream. See [`Writer`] and [`Reader`].

mod cipher;
mod pipe;
mod reader;
mod writer;

pub use cipher::CipherId;
pub use pipe::{decrypt, encrypt};
pub use reader::Reader;
pub use writer::Writer;

use std::io;
use thiserror::Error;

pub const MAGIC: [u8; 4] = [0x42, 0x49, 0x54, 0x00];
pub const VERSION: u8 = 1;
pub const CHUNK_SIZE: usize = 64 * 1024;
pub const TAG_SIZE: usize = 16;
pub const NONCE_BASE_SIZE: usize = 16;
pub const HEADER_SIZE: usize = 4 + 1 + 1 + NONCE_BASE_SIZE + 6;
pub const TRAILER_SIZE: usize = 4;

/// On-disk size of a full (non-final) chunk: two length fields, the
/// tag, and `CHUNK_SIZE` bytes of ciphertext. Constant, which is what
/// lets a `Reader` seek to any chunk index in O(1).
pub const FULL_CHUNK_DISK_SIZE: usize = 4 + 4 + TAG_SIZE + CHUNK_SIZE;

/// A 32-byte symmetric key for a `bit` stream.
#[derive(Clone)]
pub struct Key(pub [u8; 32]);

impl From<[u8; 32]> for Key {
    fn from(raw: [u8; 32]) -> Self {
        Key(raw)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Header {
    pub(crate) cipher_id: CipherId,
    pub(crate) nonce_base: [u8; NONCE_BASE_SIZE],
}

impl Header {
    pub(crate) fn to_bytes(self) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];
        out[0..4].copy_from_slice(&MAGIC);
        out[4] = VERSION;
        out[5] = self.cipher_id as u8;
        out[6..6 + NONCE_BASE_SIZE].copy_from_slice(&self.nonce_base);
        // out[6+NONCE_BASE_SIZE..] stays zeroed; reserved.
        out
    }

    pub(crate) fn parse(buf: &[u8; HEADER_SIZE]) -> Result<Self, Error> {
        if buf[0..4] != MAGIC {
            return Err(Error::BadMagic);
        }
        if buf[4] != VERSION {
            return Err(Error::UnsupportedVersion(buf[4]));
        }
        let cipher_id = CipherId::try_from(buf[5])?;
        let mut nonce_base = [0u8; NONCE_BASE_SIZE];
        nonce_base.copy_from_slice(&buf[6..6 + NONCE_BASE_SIZE]);

        Ok(Header {
            cipher_id,
            nonce_base,
        })
    }
}

/// Nonce for chunk `index`: `nonce_base XOR u96_le(index)`, truncated
/// to the 96-bit nonce every supported AEAD actually takes.
pub(crate) fn chunk_nonce(nonce_base: &[u8; NONCE_BASE_SIZE], index: u64) -> [u8; 12] {
    let mut nonce = [0u8; 12];
    nonce.copy_from_slice(&nonce_base[..12]);

    let counter = (index as u128).to_le_bytes();
    for i in 0..12 {
        nonce[i] ^= counter[i];
    }
    nonce
}

/// AAD for chunk `index`: `header || u64_le(index)`, binding each
/// chunk to both the stream and its position within it.
pub(crate) fn chunk_aad(header: &Header, index: u64) -> Vec<u8> {
    let mut aad = Vec::with_capacity(HEADER_SIZE + 8);
    aad.extend_from_slice(&header.to_bytes());
    aad.extend_from_slice(&index.to_le_bytes());
    aad
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("bad magic")]
    BadMagic,
    #[error("unsupported version: {0}")]
    UnsupportedVersion(u8),
    #[error("unknown cipher id: {0}")]
    UnknownCipher(u8),
    #[error("truncated stream")]
    TruncatedStream,
    #[error("integrity check failed")]
    IntegrityError,
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn scenario_1_all_zero_256kib() {
        let key = Key([0u8; 32]);
        let plaintext = vec![0u8; 256 * 1024];
        let mut out = Vec::new();

        {
            let mut w = Writer::new(&key, CipherId::Aes256Gcm, &mut out).unwrap();
            std::io::Write::write_all(&mut w, &plaintext).unwrap();
            w.finish().unwrap();
        }

        assert_eq!(&out[0..4], &MAGIC);
        let expected_len = HEADER_SIZE + 4 * (8 + TAG_SIZE + CHUNK_SIZE) + TRAILER_SIZE;
        assert_eq!(out.len(), expected_len);
    }

    #[test]
    fn round_trip_byte_for_byte() {
        let key = Key(*b"abcdefghijklmnopqrstuvwxyz012345");
        let plaintext: Vec<u8> = (0..200_000u32).map(|i| (i % 256) as u8).collect();
        let mut cipher = Vec::new();

        {
            let mut w = Writer::new(&key, CipherId::ChaCha20Poly1305, &mut cipher).unwrap();
            std::io::Write::write_all(&mut w, &plaintext).unwrap();
            w.finish().unwrap();
        }

        let mut decrypted = Vec::new();
        let mut r = Reader::new(Cursor::new(cipher), &key).unwrap();
        std::io::Read::read_to_end(&mut r, &mut decrypted).unwrap();

        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn seek_decrypt_scenario_2() {
        let key = Key(*b"abcdefghijklmnopqrstuvwxyz012345");
        let plaintext: Vec<u8> = (0..200_000u32).map(|i| (i % 256) as u8).collect();
        let mut cipher = Vec::new();

        {
            let mut w = Writer::new(&key, CipherId::Aes256Gcm, &mut cipher).unwrap();
            std::io::Write::write_all(&mut w, &plaintext).unwrap();
            w.finish().unwrap();
        }

        let mut r = Reader::new(Cursor::new(cipher), &key).unwrap();
        std::io::Seek::seek(&mut r, std::io::SeekFrom::Start(100_000)).unwrap();

        let mut buf = [0u8; 5];
        std::io::Read::read_exact(&mut r, &mut buf).unwrap();
        assert_eq!(buf, [100_000u32 as u8, 100_001u32 as u8, 100_002u32 as u8, 100_003u32 as u8, 100_004u32 as u8]);
    }

    #[test]
    fn bit_flip_fails_integrity() {
        let key = Key([7u8; 32]);
        let plaintext = b"the quick brown fox".to_vec();
        let mut cipher = Vec::new();

        {
            let mut w = Writer::new(&key, CipherId::Aes256Gcm, &mut cipher).unwrap();
            std::io::Write::write_all(&mut w, &plaintext).unwrap();
            w.finish().unwrap();
        }

        let flip_at = HEADER_SIZE + 10;
        cipher[flip_at] ^= 0x01;

        let mut r = Reader::new(Cursor::new(cipher), &key).unwrap();
        let mut buf = Vec::new();
        let err = std::io::Read::read_to_end(&mut r, &mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }
}
