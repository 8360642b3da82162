use super::Backend;
use crate::{Error::Empty, Result};

use memmap2::Mmap;
use std::{fs, path::Path};

/// Input file backed by a physical file on disk
#[derive(Debug)]
pub struct Physical {
    data: Mmap,
}

impl Physical {
    /// Create a new physical backend by memory-mapping a file
    ///
    /// ## Arguments
    /// * 'path' - The file path to use
    ///
    /// # Errors
    /// Returns [`crate::Error::FileError`] if the file cannot be opened or mapped,
    /// or [`Empty`] if it holds no bytes
    pub fn new(path: &Path) -> Result<Physical> {
        let file = fs::File::open(path)?;
        // Safety: the mapping is read-only and the file is kept open for the
        // lifetime of the map
        let data = unsafe { Mmap::map(&file)? };
        if data.is_empty() {
            return Err(Empty);
        }
        Ok(Physical { data })
    }
}

impl Backend for Physical {
    fn data(&self) -> &[u8] {
        &self.data
    }
}
