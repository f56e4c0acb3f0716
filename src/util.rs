use crate::error::{PatchError, Result};
use std::io::{Read, Seek, SeekFrom, Write};

pub fn read_slice<R: Read + Seek>(r: &mut R, offset: u64, len: u64) -> std::io::Result<Vec<u8>> {
    r.seek(SeekFrom::Start(offset))?;
    let mut v = vec![0u8; len as usize];
    r.read_exact(&mut v)?;
    Ok(v)
}

/// Copy exactly `len` bytes from the current position of `r` to `w`, in
/// `chunk_size` pieces with the remainder last.
pub fn copy_chunked<R: Read, W: Write>(
    r: &mut R,
    w: &mut W,
    len: u64,
    chunk_size: usize,
) -> Result<u64> {
    let chunk_size = chunk_size.max(1);
    let mut buf = vec![0u8; chunk_size.min(len as usize)];
    let chunks = len / chunk_size as u64;
    let remainder = (len % chunk_size as u64) as usize;

    let mut written = 0u64;
    for _ in 0..chunks {
        written += transfer(r, w, &mut buf[..chunk_size])?;
    }
    written += transfer(r, w, &mut buf[..remainder])?;

    if written != len {
        return Err(PatchError::ShortTransfer { expected: len, actual: written });
    }
    Ok(written)
}

// One chunk. Reads until the chunk is full or the source runs dry; a dry
// source shows up as a short count for the caller to reject.
fn transfer<R: Read, W: Write>(r: &mut R, w: &mut W, buf: &mut [u8]) -> Result<u64> {
    let mut filled = 0;
    while filled < buf.len() {
        match r.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    w.write_all(&buf[..filled])?;
    Ok(filled as u64)
}
