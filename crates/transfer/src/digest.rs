//! SHA-256 content digests computed in the same pass that moves the bytes.

use std::fmt;
use std::io::{self, Read, Write};

use sha2::{Digest, Sha256};

/// Length in bytes of a [`ContentDigest`].
pub const DIGEST_LEN: usize = 32;

/// SHA-256 digest of a byte stream. Equality is exact byte equality.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentDigest([u8; DIGEST_LEN]);

impl ContentDigest {
    /// Lowercase hex encoding.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentDigest({})", self.to_hex())
    }
}

/// Computes the digest of an in-memory buffer.
pub fn digest_bytes(data: &[u8]) -> ContentDigest {
    let mut hasher = Sha256::new();
    hasher.update(data);
    finish(hasher)
}

fn finish(hasher: Sha256) -> ContentDigest {
    let mut out = [0u8; DIGEST_LEN];
    out.copy_from_slice(&hasher.finalize());
    ContentDigest(out)
}

/// Writer adapter that hashes every byte the inner writer accepts.
///
/// Only the bytes reported as written by the inner writer are hashed, so the
/// digest always describes what actually reached the destination.
pub struct DigestWriter<W> {
    inner: W,
    hasher: Sha256,
    written: u64,
}

impl<W: Write> DigestWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            hasher: Sha256::new(),
            written: 0,
        }
    }

    /// Bytes written so far.
    pub fn bytes_written(&self) -> u64 {
        self.written
    }

    /// Returns the inner writer and the digest of everything written.
    pub fn finalize(self) -> (W, ContentDigest) {
        (self.inner, finish(self.hasher))
    }
}

impl<W: Write> Write for DigestWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.hasher.update(&buf[..n]);
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Which side of a copy failed.
#[derive(Debug)]
pub(crate) enum PumpError {
    Read(io::Error),
    Write(io::Error),
}

/// Copies `reader` into `writer` one buffer at a time.
///
/// Each buffer read is written once; `on_progress` receives the running
/// total after every write. Returns the number of bytes copied.
pub(crate) fn pump<R, W, F>(
    reader: &mut R,
    writer: &mut W,
    buf_size: usize,
    mut on_progress: F,
) -> Result<u64, PumpError>
where
    R: Read + ?Sized,
    W: Write + ?Sized,
    F: FnMut(u64),
{
    let mut buf = vec![0u8; buf_size.max(1)];
    let mut total = 0u64;
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(PumpError::Read(e)),
        };
        writer.write_all(&buf[..n]).map_err(PumpError::Write)?;
        total += n as u64;
        on_progress(total);
    }
    writer.flush().map_err(PumpError::Write)?;
    Ok(total)
}

/// Hashes everything `reader` yields. Returns the digest and the byte count.
pub fn digest_reader<R, F>(
    reader: &mut R,
    buf_size: usize,
    on_progress: F,
) -> io::Result<(ContentDigest, u64)>
where
    R: Read + ?Sized,
    F: FnMut(u64),
{
    let mut hasher = DigestWriter::new(io::sink());
    let bytes = pump(reader, &mut hasher, buf_size, on_progress).map_err(|e| match e {
        PumpError::Read(e) | PumpError::Write(e) => e,
    })?;
    let (_, digest) = hasher.finalize();
    Ok((digest, bytes))
}
