//! Raw capture access.
//!
//! A capture is decoded straight from a read-only mapping, so the decoder
//! walks chunk headers in place and never copies the stream.

use crate::Result;
use memmap2::Mmap;
use std::fs::File;
use std::path::{Path, PathBuf};

/// A `.tpx3` capture mapped into memory for decoding.
pub struct MappedFileReader {
    mmap: Mmap,
    path: PathBuf,
}

impl MappedFileReader {
    /// Maps the capture at `path`.
    ///
    /// # Errors
    /// Returns [`Error::Io`](crate::Error::Io) if the capture cannot be
    /// opened or mapped.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        // SAFETY: the mapping is read-only and captures are not rewritten while imported.
        #[allow(unsafe_code)]
        let mmap = unsafe { Mmap::map(&file)? };
        log::trace!("mapped {} ({} bytes)", path.display(), mmap.len());
        Ok(Self { mmap, path })
    }

    /// Raw chunk stream.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.mmap
    }

    /// Capture size in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.mmap.len()
    }

    /// True for a zero-byte capture, which decodes to no hits.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mmap.is_empty()
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}
