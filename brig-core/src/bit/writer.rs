use super::{
    chunk_aad, chunk_nonce, CipherId, Error, Header, Key, CHUNK_SIZE, MAGIC, TAG_SIZE,
};
use ring::{
    aead::{self, LessSafeKey},
    rand::{SecureRandom, SystemRandom},
};
use std::io::{self, Write};

/// Encrypts a plaintext byte stream into the `bit` frame format.
///
/// Bytes passed to [`Write::write`] are buffered into `CHUNK_SIZE`
/// chunks; [`Writer::finish`] must be called to flush the final
/// (possibly partial) chunk and emit the trailer. Dropping a `Writer`
/// that was never finished leaves a truncated stream on the
/// underlying writer, so debug builds assert against it.
pub struct Writer<W: Write> {
    inner: W,
    header: Header,
    key: LessSafeKey,
    index: u64,
    buf: Vec<u8>,
    bytes_written: u64,
    finished: bool,
}

impl<W: Write> Writer<W> {
    pub fn new(key: &Key, cipher: CipherId, mut inner: W) -> Result<Self, Error> {
        let random = SystemRandom::new();
        let mut nonce_base = [0u8; super::NONCE_BASE_SIZE];
        random
            .fill(&mut nonce_base)
            .map_err(|_| Error::IntegrityError)?;

        let header = Header {
            cipher_id: cipher,
            nonce_base,
        };

        let header_bytes = header.to_bytes();
        inner.write_all(&header_bytes)?;

        Ok(Writer {
            inner,
            key: cipher.key(key),
            header,
            index: 0,
            buf: Vec::with_capacity(CHUNK_SIZE),
            bytes_written: header_bytes.len() as u64,
            finished: false,
        })
    }

    fn seal_chunk(&mut self) -> Result<(), Error> {
        let plain_len = self.buf.len();
        let nonce = chunk_nonce(&self.header.nonce_base, self.index);
        let aad = chunk_aad(&self.header, self.index);

        let tag = self
            .key
            .seal_in_place_separate_tag(
                aead::Nonce::assume_unique_for_key(nonce),
                aead::Aad::from(aad),
                &mut self.buf,
            )
            .map_err(|_| Error::IntegrityError)?;

        self.inner.write_all(&(plain_len as u32).to_le_bytes())?;
        self.inner.write_all(&(plain_len as u32).to_le_bytes())?;
        self.inner.write_all(tag.as_ref())?;
        self.inner.write_all(&self.buf)?;

        self.bytes_written += (8 + TAG_SIZE + plain_len) as u64;
        self.index += 1;
        self.buf.clear();

        Ok(())
    }

    /// Flush the final chunk (if any buffered bytes remain) and write
    /// the trailer. Returns the total number of bytes written to the
    /// underlying writer.
    pub fn finish(mut self) -> Result<u64, Error> {
        if !self.buf.is_empty() || self.index == 0 {
            self.seal_chunk()?;
        }
        self.inner.write_all(&MAGIC)?;
        self.bytes_written += MAGIC.len() as u64;
        self.finished = true;

        Ok(self.bytes_written)
    }
}

impl<W: Write> Write for Writer<W> {
    fn write(&mut self, mut data: &[u8]) -> io::Result<usize> {
        let total = data.len();

        while !data.is_empty() {
            let space = CHUNK_SIZE - self.buf.len();
            let take = space.min(data.len());
            self.buf.extend_from_slice(&data[..take]);
            data = &data[take..];

            if self.buf.len() == CHUNK_SIZE {
                self.seal_chunk()
                    .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
            }
        }

        Ok(total)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl<W: Write> Drop for Writer<W> {
    fn drop(&mut self) {
        debug_assert!(
            self.finished,
            "bit::Writer dropped without calling finish()"
        );
    }
}
