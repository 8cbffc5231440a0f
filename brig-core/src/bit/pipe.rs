use super::{CipherId, Error, Key, Reader, Writer};
use std::io::{Read, Seek, Write};

/// `Encrypt(key32, src_reader, dst_writer) -> bytes_written`.
///
/// Convenience matching the original `format-util` filter: streams
/// `src` through a `bit::Writer` into `dst`, returning the number of
/// bytes written to `dst`.
pub fn encrypt<R: Read, W: Write>(
    key: &Key,
    cipher: CipherId,
    mut src: R,
    dst: W,
) -> Result<u64, Error> {
    let mut writer = Writer::new(key, cipher, dst)?;
    let mut buf = [0u8; 64 * 1024];

    loop {
        let n = src.read(&mut buf)?;
        if n == 0 {
            break;
        }
        writer.write_all(&buf[..n])?;
    }

    writer.finish()
}

/// `Decrypt(key32, src_reader, dst_writer) -> bytes_written`.
pub fn decrypt<R: Read + Seek, W: Write>(key: &Key, src: R, mut dst: W) -> Result<u64, Error> {
    let mut reader = Reader::new(src, key)?;
    let mut buf = [0u8; 64 * 1024];
    let mut total = 0u64;

    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        dst.write_all(&buf[..n])?;
        total += n as u64;
    }

    Ok(total)
}
