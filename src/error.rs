use thiserror::Error;

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// This enum covers every failure mode of the decoding engine: reads past the end of a bit
/// source or frame, assertion and mapper failures, malformed tree construction, format
/// dispatch misses, and recursion limits. Fatal decode errors are wrapped in
/// [`Error::Decode`] at the top-level entry point so callers see the tree path and bit
/// position of the field that failed.
///
/// # Error Categories
///
/// ## Bit source errors
/// - [`Error::OutOfRange`] - Read or seek beyond the bit source or the active frame
/// - [`Error::Empty`] - Empty input provided
///
/// ## Field emission errors
/// - [`Error::Assertion`] - An `AssertU`/`AssertStr`/`BitBufIsZero` check failed
/// - [`Error::Mapper`] - A scalar mapper rejected its input
/// - [`Error::DuplicateFieldName`] - Two children under one struct share a name
/// - [`Error::InvalidString`] - A string field held invalid UTF-8/UTF-16 data
///
/// ## Format dispatch errors
/// - [`Error::FormatMismatch`] - A format body rejected the caller-supplied in-argument
/// - [`Error::NoFormatMatched`] - A probe exhausted its group without a match
/// - [`Error::UnknownFormat`] - Decode was invoked with a name no format or group carries
/// - [`Error::DepthExceeded`] - Nested format recursion passed the configured bound
///
/// ## Context carriers
/// - [`Error::Fatal`] - A format body aborted the decode via the cursor
/// - [`Error::Decode`] - Wraps another error with the tree path and bit position
///
/// # Examples
///
/// ```rust
/// use bitscope::{BitBuf, Decoder, Error};
///
/// let mut d = Decoder::new(BitBuf::from(vec![0xff]));
/// let err = d.field_u("x", 16, &[]).unwrap_err();
/// assert!(matches!(err.root_cause(), Error::OutOfRange { .. }));
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// A read or seek would pass the end of the bit source or of the active frame.
    ///
    /// `pos` is the bit position the access started from and `bits` the number of bits
    /// requested. Seeks report `bits: 0`.
    #[error("out of range access of {bits} bits at bit {pos}")]
    OutOfRange {
        /// Bit position the access started from
        pos: u64,
        /// Number of bits requested
        bits: u64,
    },

    /// An inline assertion did not hold.
    ///
    /// Fatal outside of a probe; inside a probe the failing candidate is discarded and
    /// the next group member is tried.
    #[error("assertion failed: {0}")]
    Assertion(String),

    /// A scalar mapper returned an error while annotating a field.
    #[error("mapper failed: {0}")]
    Mapper(String),

    /// Two fields with the same name were emitted under one struct node.
    ///
    /// The first field remains in the partial tree; the second emission is rejected.
    #[error("duplicate field name `{0}`")]
    DuplicateFieldName(String),

    /// A format body rejected the in-argument supplied by its caller, for example an
    /// IPv4 decoder handed a frame with the wrong ether type.
    #[error("format rejected input: {0}")]
    FormatMismatch(String),

    /// Every candidate of a probed group failed to decode.
    #[error("no format in group `{group}` matched")]
    NoFormatMatched {
        /// The group that was probed
        group: String,
    },

    /// Nested format invocations passed the configured recursion bound.
    #[error("format recursion depth limit {0} exceeded")]
    DepthExceeded(u32),

    /// The requested format or group name is not present in the registry.
    #[error("unknown format or group `{0}`")]
    UnknownFormat(String),

    /// The registry could not be built, e.g. two formats registered one name.
    #[error("registry error: {0}")]
    Registry(String),

    /// A string field did not hold valid data for its declared encoding.
    #[error("invalid {encoding} string at bit {pos}")]
    InvalidString {
        /// The expected encoding
        encoding: &'static str,
        /// Bit position of the field
        pos: u64,
    },

    /// A format body aborted the decode through the cursor.
    #[error("{message} (bit {pos})")]
    Fatal {
        /// The message given to the cursor
        message: String,
        /// Bit position at the time of the abort
        pos: u64,
    },

    /// Another error annotated with the tree path and bit position of the field that
    /// was being emitted when it occurred.
    #[error("decode failed at `{path}` (bit {pos}): {source}")]
    Decode {
        /// Dotted path of the in-progress field
        path: String,
        /// Bit position at the time of the failure
        pos: u64,
        /// The underlying error
        #[source]
        source: Box<Error>,
    },

    /// File I/O error from the file backends.
    #[error("{0}")]
    FileError(#[from] std::io::Error),

    /// Provided input was empty.
    #[error("provided input was empty")]
    Empty,
}

impl Error {
    /// Strips [`Error::Decode`] context layers and returns the innermost error.
    #[must_use]
    pub fn root_cause(&self) -> &Error {
        let mut err = self;
        while let Error::Decode { source, .. } = err {
            err = source;
        }
        err
    }

    /// True if a probe barrier may recover from this error by trying the next
    /// group candidate.
    ///
    /// Everything a format body can produce mid-decode is recoverable; I/O
    /// failures from the backing file and the recursion bound are not.
    #[must_use]
    pub fn is_probe_recoverable(&self) -> bool {
        !matches!(
            self.root_cause(),
            Error::FileError(_) | Error::DepthExceeded(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_cause_unwraps_context() {
        let err = Error::Decode {
            path: "a.b".to_string(),
            pos: 16,
            source: Box::new(Error::DuplicateFieldName("x".to_string())),
        };
        assert!(matches!(err.root_cause(), Error::DuplicateFieldName(n) if n == "x"));
    }

    #[test]
    fn display_carries_path_and_pos() {
        let err = Error::Decode {
            path: "packet.header".to_string(),
            pos: 32,
            source: Box::new(Error::Assertion("expected 4".to_string())),
        };
        let s = err.to_string();
        assert!(s.contains("packet.header"));
        assert!(s.contains("32"));
    }
}
