//! Memory-mapped file reads for large photo files.
//!
//! RAW files are tens of megabytes; mapping them avoids copying the whole
//! file into the heap when only a preview segment or a checksum is needed.

use memmap2::Mmap;
use std::fs::File;
use std::io;
use std::path::Path;

/// Minimum file size to use memory-mapped I/O (1MB)
const MMAP_THRESHOLD: u64 = 1024 * 1024;

/// File bytes that may be either owned or memory-mapped.
pub enum FileBytes {
    /// Standard heap-allocated bytes
    Vec(Vec<u8>),
    /// Memory-mapped bytes (zero-copy from disk)
    Mmap(Mmap),
}

impl AsRef<[u8]> for FileBytes {
    fn as_ref(&self) -> &[u8] {
        match self {
            FileBytes::Vec(v) => v,
            FileBytes::Mmap(m) => m,
        }
    }
}

impl std::ops::Deref for FileBytes {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        self.as_ref()
    }
}

/// Read file bytes, memory-mapping files of 1MB or more.
pub fn read_file_bytes(path: &Path) -> io::Result<FileBytes> {
    let file = File::open(path)?;
    let len = file.metadata()?.len();

    if len >= MMAP_THRESHOLD {
        // SAFETY: the map is read-only and owns its file handle; a file
        // truncated underneath us is the same hazard any reader faces.
        let mmap = unsafe { Mmap::map(&file) }?;
        Ok(FileBytes::Mmap(mmap))
    } else {
        Ok(FileBytes::Vec(std::fs::read(path)?))
    }
}
