//! Random-access bit reading over shared byte buffers.
//!
//! [`BitBuf`] is the bit source every decode runs against: a bit-addressed view over an
//! immutable byte buffer. Bits are addressed in MSB-first order, so bit 0 is the high bit
//! of the first byte. Views share the underlying bytes, which makes sub-ranging and
//! cloning cheap; little-endian interpretation is layered on top by the decoder, not here.
//!
//! # Example
//!
//! ```rust
//! use bitscope::BitBuf;
//!
//! let buf = BitBuf::from(vec![0b1010_0001, 0xff]);
//! assert_eq!(buf.read_bits(0, 4)?, 0b1010);
//! assert_eq!(buf.read_bits(4, 8)?, 0b0001_1111);
//!
//! let sub = buf.sub(8, 8)?;
//! assert_eq!(sub.read_bits(0, 8)?, 0xff);
//! # Ok::<(), bitscope::Error>(())
//! ```

use std::fmt;
use std::sync::Arc;

use crate::{Error::OutOfRange, Result};

/// A bit-addressed, cheaply-cloneable view over an immutable byte buffer.
///
/// The buffer itself is shared behind an [`Arc`], so [`BitBuf::sub`] and `clone` never
/// copy data. A view is described by a start bit and a length in bits; reads are
/// MSB-first and bounds-checked against the view, never against the full buffer.
#[derive(Clone)]
pub struct BitBuf {
    data: Arc<dyn AsRef<[u8]> + Send + Sync>,
    start: u64,
    len: u64,
}

impl BitBuf {
    /// Create a view covering all bits of a shared byte source.
    pub fn new<B>(data: Arc<B>) -> Self
    where
        B: AsRef<[u8]> + Send + Sync + 'static,
    {
        let len = (data.as_ref().as_ref().len() as u64) * 8;
        BitBuf {
            data,
            start: 0,
            len,
        }
    }

    /// Length of the view in bits.
    #[must_use]
    pub fn len_bits(&self) -> u64 {
        self.len
    }

    /// Returns true if the view contains no bits.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn bytes(&self) -> &[u8] {
        (*self.data).as_ref()
    }

    fn check(&self, pos: u64, n: u64) -> Result<()> {
        if pos.checked_add(n).map_or(true, |end| end > self.len) {
            return Err(OutOfRange { pos, bits: n });
        }
        Ok(())
    }

    /// Read `n` bits starting at `pos` as an unsigned value, MSB-first.
    ///
    /// `n` must be in `0..=64`; `n == 0` reads nothing and returns 0.
    ///
    /// # Errors
    /// Returns [`OutOfRange`] if `n > 64` or if `pos + n` passes the end of the view
    pub fn read_bits(&self, pos: u64, n: u32) -> Result<u64> {
        if n > 64 {
            return Err(OutOfRange {
                pos,
                bits: u64::from(n),
            });
        }
        self.check(pos, u64::from(n))?;

        let bytes = self.bytes();
        let mut acc = 0u64;
        let mut bit = self.start + pos;
        let mut remaining = n;

        while remaining > 0 {
            let byte = u32::from(bytes[(bit / 8) as usize]);
            let offset = (bit % 8) as u32;
            let avail = 8 - offset;
            let take = remaining.min(avail);

            let chunk = (byte >> (avail - take)) & ((1 << take) - 1);
            acc = (acc << take) | u64::from(chunk);

            remaining -= take;
            bit += u64::from(take);
        }

        Ok(acc)
    }

    /// Construct a sub-view of `n` bits starting at `pos`, sharing the underlying bytes.
    ///
    /// # Errors
    /// Returns [`OutOfRange`] if the requested range passes the end of the view
    pub fn sub(&self, pos: u64, n: u64) -> Result<BitBuf> {
        self.check(pos, n)?;
        Ok(BitBuf {
            data: Arc::clone(&self.data),
            start: self.start + pos,
            len: n,
        })
    }

    /// Copy `n` bits starting at `pos` into a fresh byte buffer.
    ///
    /// The result is left-aligned: the first bit read lands in the MSB of the first
    /// byte, and a partial trailing byte is zero-padded on the right.
    ///
    /// # Errors
    /// Returns [`OutOfRange`] if the requested range passes the end of the view
    pub fn read_all_bits(&self, pos: u64, n: u64) -> Result<Vec<u8>> {
        self.check(pos, n)?;

        let mut out = Vec::with_capacity(((n + 7) / 8) as usize);
        let mut read = 0u64;
        while read < n {
            let take = (n - read).min(8) as u32;
            let chunk = self.read_bits(pos + read, take)? as u8;
            out.push(chunk << (8 - take));
            read += u64::from(take);
        }

        Ok(out)
    }

    /// Copy the whole view into a fresh, left-aligned byte buffer.
    ///
    /// # Errors
    /// Never fails for a well-formed view; shares [`BitBuf::read_all_bits`]'s contract
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        self.read_all_bits(0, self.len)
    }
}

impl From<Vec<u8>> for BitBuf {
    fn from(data: Vec<u8>) -> Self {
        BitBuf::new(Arc::new(data))
    }
}

impl From<&[u8]> for BitBuf {
    fn from(data: &[u8]) -> Self {
        BitBuf::new(Arc::new(data.to_vec()))
    }
}

impl fmt::Debug for BitBuf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BitBuf")
            .field("start", &self.start)
            .field("len", &self.len)
            .finish()
    }
}
