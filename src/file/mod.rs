//! File abstraction feeding byte buffers into the decoding engine.
//!
//! [`File`] abstracts over where the bytes come from through the [`Backend`] trait:
//! a memory-mapped file on disk ([`physical`]) or an in-memory buffer ([`memory`]).
//! The engine borrows the bytes for the lifetime of the decode and never closes or
//! re-maps the underlying file; [`File::bit_buf`] hands out the bit source a decode
//! runs against without copying.
//!
//! # Examples
//!
//! ```rust,no_run
//! use bitscope::{file::File, DecodeOptions, InArg, Registry};
//!
//! let file = File::from_path("capture.pcap".as_ref())?;
//! let registry = Registry::standard()?;
//! let decoded = registry.probe(file.bit_buf(), "probe", DecodeOptions::default())?;
//! println!("decoded as {}", decoded.format.name);
//! # Ok::<(), bitscope::Error>(())
//! ```

mod memory;
mod physical;

use std::{path::Path, sync::Arc};

use crate::bitbuf::BitBuf;
use crate::Result;

use memory::Memory;
use physical::Physical;

/// Trait abstracting over the data sources a [`File`] can wrap.
pub trait Backend: Send + Sync {
    /// The complete byte contents
    fn data(&self) -> &[u8];
}

struct BackendBytes(Arc<dyn Backend>);

impl AsRef<[u8]> for BackendBytes {
    fn as_ref(&self) -> &[u8] {
        self.0.data()
    }
}

/// An opened input file.
///
/// Cheap to clone; all clones share the same backend.
#[derive(Clone)]
pub struct File {
    backend: Arc<dyn Backend>,
}

impl File {
    /// Open and memory-map a file from disk.
    ///
    /// ## Arguments
    /// * 'path' - The file path to open
    ///
    /// # Errors
    /// Returns [`crate::Error::FileError`] on I/O failure or
    /// [`crate::Error::Empty`] for an empty file
    pub fn from_path(path: &Path) -> Result<File> {
        Ok(File {
            backend: Arc::new(Physical::new(path)?),
        })
    }

    /// Wrap an in-memory buffer.
    ///
    /// ## Arguments
    /// * 'data' - The buffer to wrap
    ///
    /// # Errors
    /// Returns [`crate::Error::Empty`] for an empty buffer
    pub fn from_mem(data: Vec<u8>) -> Result<File> {
        Ok(File {
            backend: Arc::new(Memory::new(data)?),
        })
    }

    /// Length of the file in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.backend.data().len()
    }

    /// True if the file holds no bytes. Construction rejects empty inputs, so
    /// this is false for every successfully opened file.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The bit source over the file contents, sharing the backend without copy.
    #[must_use]
    pub fn bit_buf(&self) -> BitBuf {
        BitBuf::new(Arc::new(BackendBytes(Arc::clone(&self.backend))))
    }
}
