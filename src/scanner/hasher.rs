//! MD5 file hasher with streaming support.
//!
//! # Overview
//!
//! [`Hasher`] reads a file in fixed-size chunks and feeds each chunk into an
//! incremental MD5 state. After every chunk the caller's callback receives
//! the number of bytes just consumed, which is what drives live progress
//! reporting. The chunk buffer is allocated once per `Hasher` and reused for
//! every file, so one hasher per worker thread is the intended usage.
//!
//! MD5 is used as a change-detection checksum for large backup volumes; it
//! is not a security boundary.

use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;

use md5::{Digest, Md5};

use super::HashError;

/// 128-bit MD5 fingerprint.
pub type Fingerprint = [u8; 16];

/// Default read chunk size (10 MiB).
pub const DEFAULT_CHUNK_SIZE: usize = 10 << 20;

/// Streaming MD5 hasher with a reusable read buffer.
pub struct Hasher {
    buffer: Vec<u8>,
}

impl std::fmt::Debug for Hasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hasher")
            .field("chunk_size", &self.buffer.len())
            .finish()
    }
}

impl Default for Hasher {
    fn default() -> Self {
        Self::new()
    }
}

impl Hasher {
    /// Create a hasher using [`DEFAULT_CHUNK_SIZE`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_chunk_size(DEFAULT_CHUNK_SIZE)
    }

    /// Create a hasher reading `chunk_size` bytes at a time (minimum 1).
    #[must_use]
    pub fn with_chunk_size(chunk_size: usize) -> Self {
        Self {
            buffer: vec![0u8; chunk_size.max(1)],
        }
    }

    /// Size of the read buffer in bytes.
    #[must_use]
    pub fn chunk_size(&self) -> usize {
        self.buffer.len()
    }

    /// Hash the file at `path`, invoking `on_bytes_read` after every chunk.
    ///
    /// # Errors
    ///
    /// Returns a [`HashError`] when the file cannot be opened or a read
    /// fails part way. Both are per-file conditions; the caller decides how
    /// to report them.
    pub fn digest<F>(&mut self, path: &Path, mut on_bytes_read: F) -> Result<Fingerprint, HashError>
    where
        F: FnMut(u64),
    {
        let mut file = File::open(path).map_err(|e| HashError::from_io(path, e))?;
        let mut context = Md5::new();

        loop {
            let read = match file.read(&mut self.buffer) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(HashError::from_io(path, e)),
            };

            context.update(&self.buffer[..read]);
            on_bytes_read(read as u64);
        }

        let mut fingerprint = [0u8; 16];
        fingerprint.copy_from_slice(&context.finalize());
        Ok(fingerprint)
    }
}

/// Render a fingerprint as 32 lowercase hex characters.
#[must_use]
pub fn fingerprint_to_hex(fingerprint: &Fingerprint) -> String {
    use std::fmt::Write;

    fingerprint
        .iter()
        .fold(String::with_capacity(32), |mut out, byte| {
            let _ = write!(out, "{byte:02x}");
            out
        })
}
