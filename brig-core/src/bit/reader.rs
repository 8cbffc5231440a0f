use super::{
    chunk_aad, chunk_nonce, Error, Header, Key, CHUNK_SIZE, FULL_CHUNK_DISK_SIZE, HEADER_SIZE,
    MAGIC, TAG_SIZE, TRAILER_SIZE,
};
use ring::aead::{self, LessSafeKey};
use std::io::{self, Read, Seek, SeekFrom};

/// Decrypts and (given `R: Seek`) seeks within a `bit`-framed stream.
///
/// Chunk `i` always occupies `FULL_CHUNK_DISK_SIZE` bytes on disk
/// except the last, which is sized from the stream's total length
/// computed once at construction time via `SeekFrom::End`. This is
/// what gives O(1) seeking by chunk index.
pub struct Reader<R> {
    inner: R,
    header: Header,
    key: LessSafeKey,
    chunk_count: u64,
    last_chunk_plain_len: usize,
    chunk_buf: Vec<u8>,
    chunk_index: Option<u64>,
    pos_in_chunk: usize,
    logical_pos: u64,
    logical_len: u64,
}

impl<R: Read + Seek> Reader<R> {
    pub fn new(mut inner: R, key: &Key) -> Result<Self, Error> {
        let mut header_bytes = [0u8; HEADER_SIZE];
        inner.read_exact(&mut header_bytes).map_err(map_eof)?;
        let header = Header::parse(&header_bytes)?;

        let total_len = inner.seek(SeekFrom::End(0))?;
        if total_len < (HEADER_SIZE + TRAILER_SIZE) as u64 {
            return Err(Error::TruncatedStream);
        }

        let mut trailer = [0u8; TRAILER_SIZE];
        inner.seek(SeekFrom::End(-(TRAILER_SIZE as i64)))?;
        inner.read_exact(&mut trailer).map_err(map_eof)?;
        if trailer != MAGIC {
            return Err(Error::BadMagic);
        }

        let chunks_bytes = total_len - HEADER_SIZE as u64 - TRAILER_SIZE as u64;
        let full = chunks_bytes / FULL_CHUNK_DISK_SIZE as u64;
        let rem = chunks_bytes % FULL_CHUNK_DISK_SIZE as u64;

        let (chunk_count, last_chunk_plain_len) = if rem == 0 {
            (full, CHUNK_SIZE)
        } else {
            if rem < (8 + TAG_SIZE) as u64 {
                return Err(Error::TruncatedStream);
            }
            (full + 1, (rem - (8 + TAG_SIZE) as u64) as usize)
        };

        let key_material = header.cipher_id.key(key);

        let mut reader = Reader {
            inner,
            header,
            key: key_material,
            chunk_count,
            last_chunk_plain_len,
            chunk_buf: Vec::new(),
            chunk_index: None,
            pos_in_chunk: 0,
            logical_pos: 0,
            logical_len: if chunk_count == 0 {
                0
            } else {
                (chunk_count - 1) * CHUNK_SIZE as u64 + last_chunk_plain_len as u64
            },
        };
        reader.inner.seek(SeekFrom::Start(HEADER_SIZE as u64))?;
        Ok(reader)
    }

    fn load_chunk(&mut self, index: u64) -> Result<(), Error> {
        if self.chunk_index == Some(index) {
            return Ok(());
        }
        if index >= self.chunk_count {
            self.chunk_buf.clear();
            self.chunk_index = Some(index);
            return Ok(());
        }

        let offset = HEADER_SIZE as u64 + index * FULL_CHUNK_DISK_SIZE as u64;
        self.inner.seek(SeekFrom::Start(offset))?;

        let mut len_buf = [0u8; 8];
        self.inner.read_exact(&mut len_buf).map_err(map_eof)?;
        let plain_len = u32::from_le_bytes(len_buf[0..4].try_into().unwrap()) as usize;
        let cipher_len = u32::from_le_bytes(len_buf[4..8].try_into().unwrap()) as usize;
        if plain_len != cipher_len {
            return Err(Error::IntegrityError);
        }

        let expected_plain_len = if index + 1 == self.chunk_count {
            self.last_chunk_plain_len
        } else {
            CHUNK_SIZE
        };
        if plain_len != expected_plain_len {
            return Err(Error::IntegrityError);
        }

        let mut tag = [0u8; TAG_SIZE];
        self.inner.read_exact(&mut tag).map_err(map_eof)?;

        let mut buf = vec![0u8; cipher_len + TAG_SIZE];
        self.inner
            .read_exact(&mut buf[..cipher_len])
            .map_err(map_eof)?;
        buf[cipher_len..].copy_from_slice(&tag);

        let nonce = chunk_nonce(&self.header.nonce_base, index);
        let aad = chunk_aad(&self.header, index);

        let plain = self
            .key
            .open_in_place(
                aead::Nonce::assume_unique_for_key(nonce),
                aead::Aad::from(aad),
                &mut buf,
            )
            .map_err(|_| Error::IntegrityError)?;

        self.chunk_buf = plain.to_vec();
        self.chunk_index = Some(index);

        Ok(())
    }
}

fn map_eof(e: io::Error) -> Error {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        Error::TruncatedStream
    } else {
        Error::Io(e)
    }
}

impl From<Error> for io::Error {
    fn from(e: Error) -> Self {
        match e {
            Error::IntegrityError | Error::BadMagic | Error::UnknownCipher(_) => {
                io::Error::new(io::ErrorKind::InvalidData, e)
            }
            Error::TruncatedStream => io::Error::new(io::ErrorKind::UnexpectedEof, e),
            Error::UnsupportedVersion(_) => io::Error::new(io::ErrorKind::InvalidData, e),
            Error::Io(io_err) => io_err,
        }
    }
}

impl<R: Read + Seek> Read for Reader<R> {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        if self.logical_pos >= self.logical_len {
            return Ok(0);
        }

        let index = self.logical_pos / CHUNK_SIZE as u64;
        if self.chunk_index != Some(index) {
            self.load_chunk(index)?;
        }
        self.pos_in_chunk = (self.logical_pos % CHUNK_SIZE as u64) as usize;

        let available = &self.chunk_buf[self.pos_in_chunk..];
        let n = available.len().min(out.len());
        out[..n].copy_from_slice(&available[..n]);

        self.pos_in_chunk += n;
        self.logical_pos += n as u64;

        Ok(n)
    }
}

impl<R: Read + Seek> Seek for Reader<R> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(n) => n,
            SeekFrom::End(delta) => {
                let base = self.logical_len as i64;
                (base + delta).max(0) as u64
            }
            SeekFrom::Current(delta) => ((self.logical_pos as i64) + delta).max(0) as u64,
        };

        // Seeking past end-of-stream returns zero bytes without error,
        // not a seek failure.
        let clamped = target.min(self.logical_len);
        let index = clamped / CHUNK_SIZE as u64;

        if self.chunk_index != Some(index) {
            self.load_chunk(index)?;
        }
        self.pos_in_chunk = (clamped % CHUNK_SIZE as u64) as usize;
        self.logical_pos = clamped;

        Ok(self.logical_pos)
    }
}

#[cfg(test)]
mod test {
    use super::super::*;
    use std::io::{Cursor, Read};

    #[test]
    fn seeking_past_end_returns_empty() {
        let key = Key([3u8; 32]);
        let mut cipher = Vec::new();
        {
            let mut w = Writer::new(&key, CipherId::Aes256Gcm, &mut cipher).unwrap();
            std::io::Write::write_all(&mut w, b"short").unwrap();
            w.finish().unwrap();
        }

        let mut r = Reader::new(Cursor::new(cipher), &key).unwrap();
        std::io::Seek::seek(&mut r, std::io::SeekFrom::Start(1_000)).unwrap();
        let mut buf = [0u8; 4];
        let n = r.read(&mut buf).unwrap();
        assert_eq!(n, 0);
    }
}
