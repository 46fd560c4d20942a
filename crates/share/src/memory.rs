//! In-memory share with per-path fault injection.
//!
//! Stands in for a real server in tests and lets callers reproduce the
//! failure modes of a flaky network share deterministically.

use std::collections::HashMap;
use std::io::{self, Cursor, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::{RemoteFile, RemoteShare, RemoteWriter, validate_remote_path};

/// Faults injected for one remote path.
#[derive(Debug, Clone, Default)]
pub struct Faults {
    /// `create` fails.
    pub fail_create: bool,
    /// Writes fail once this many bytes have been accepted.
    pub fail_write_after: Option<u64>,
    /// `finish` on the writer fails.
    pub fail_finish: bool,
    /// `open` fails.
    pub fail_open: bool,
    /// Reads from an opened file fail.
    pub fail_read: bool,
    /// The first byte is flipped when the writer finishes.
    pub corrupt_on_finish: bool,
    /// `remove` fails.
    pub fail_remove: bool,
}

#[derive(Default)]
struct Inner {
    files: HashMap<PathBuf, Vec<u8>>,
    faults: HashMap<PathBuf, Faults>,
}

/// Thread-safe in-memory [`RemoteShare`].
#[derive(Clone, Default)]
pub struct MemoryShare {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryShare {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers faults for `path`, replacing any previous ones.
    pub fn inject(&self, path: impl Into<PathBuf>, faults: Faults) {
        let path = normalize(&path.into());
        self.lock().faults.insert(path, faults);
    }

    /// Stores `data` at `path` as if it had been uploaded.
    pub fn put(&self, path: impl Into<PathBuf>, data: impl Into<Vec<u8>>) {
        let path = normalize(&path.into());
        self.lock().files.insert(path, data.into());
    }

    /// Returns a copy of the content stored at `path`.
    pub fn contents(&self, path: impl AsRef<Path>) -> Option<Vec<u8>> {
        self.lock().files.get(&normalize(path.as_ref())).cloned()
    }

    /// Returns `true` if a file is stored at `path`.
    pub fn exists(&self, path: impl AsRef<Path>) -> bool {
        self.lock().files.contains_key(&normalize(path.as_ref()))
    }

    /// Number of stored files.
    pub fn len(&self) -> usize {
        self.lock().files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A panicking test thread must not hide the share from the others.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn faults(&self, path: &Path) -> Faults {
        self.lock().faults.get(path).cloned().unwrap_or_default()
    }
}

impl RemoteShare for MemoryShare {
    fn create(&self, path: &Path) -> io::Result<Box<dyn RemoteWriter>> {
        let path = checked(path)?;
        let faults = self.faults(&path);
        if faults.fail_create {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "injected create failure",
            ));
        }
        self.lock().files.insert(path.clone(), Vec::new());
        Ok(Box::new(MemoryWriter {
            share: self.clone(),
            path,
            written: 0,
            faults,
        }))
    }

    fn open(&self, path: &Path) -> io::Result<RemoteFile> {
        let path = checked(path)?;
        let faults = self.faults(&path);
        if faults.fail_open {
            return Err(io::Error::new(
                io::ErrorKind::ConnectionReset,
                "injected open failure",
            ));
        }
        let data = self
            .contents(&path)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "remote file not found"))?;
        let size = data.len() as u64;
        Ok(RemoteFile {
            reader: Box::new(MemoryReader {
                inner: Cursor::new(data),
                fail: faults.fail_read,
            }),
            size,
        })
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        let path = checked(path)?;
        if self.faults(&path).fail_remove {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "injected remove failure",
            ));
        }
        self.lock()
            .files
            .remove(&path)
            .map(|_| ())
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "remote file not found"))
    }
}

struct MemoryWriter {
    share: MemoryShare,
    path: PathBuf,
    written: u64,
    faults: Faults,
}

impl Write for MemoryWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if let Some(limit) = self.faults.fail_write_after {
            if self.written + buf.len() as u64 > limit {
                return Err(io::Error::new(
                    io::ErrorKind::ConnectionAborted,
                    "injected write failure",
                ));
            }
        }
        let mut inner = self.share.lock();
        inner
            .files
            .entry(self.path.clone())
            .or_default()
            .extend_from_slice(buf);
        self.written += buf.len() as u64;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl RemoteWriter for MemoryWriter {
    fn finish(self: Box<Self>) -> io::Result<()> {
        if self.faults.fail_finish {
            return Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "injected close failure",
            ));
        }
        if self.faults.corrupt_on_finish {
            let mut inner = self.share.lock();
            if let Some(first) = inner.files.get_mut(&self.path).and_then(|d| d.first_mut()) {
                *first ^= 0xFF;
            }
        }
        Ok(())
    }
}

struct MemoryReader {
    inner: Cursor<Vec<u8>>,
    fail: bool,
}

impl Read for MemoryReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.fail {
            return Err(io::Error::new(
                io::ErrorKind::ConnectionReset,
                "injected read failure",
            ));
        }
        self.inner.read(buf)
    }
}

fn checked(path: &Path) -> io::Result<PathBuf> {
    validate_remote_path(path).map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    Ok(normalize(path))
}

/// Drops `.` components so `./a.txt` and `a.txt` address the same file.
fn normalize(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, std::path::Component::CurDir))
        .collect()
}
