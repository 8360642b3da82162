//! Scalar field values and the mapper layer that annotates them.
//!
//! Every leaf in a decoded tree holds a [`Scalar`]: the raw decoded primitive
//! ([`Actual`]) plus purely interpretive metadata such as a symbolic replacement
//! string, a human description, a numeric display hint, and a validation note.
//! Mappers never alter the decoded primitive; they only attach interpretation.
//!
//! # Key Components
//!
//! - [`Scalar`] / [`Actual`] - The tagged value carried by leaf nodes
//! - [`Mapper`] - A pure `Scalar -> Scalar` transformation applied at field emission
//! - [`mappers`] - The standard mapper set: symbol tables, display hints,
//!   assertions, and validations
//!
//! # Example
//!
//! ```rust
//! use bitscope::scalar::{mappers::UToSymStr, Actual, Mapper, Scalar};
//!
//! static NAMES: UToSymStr = UToSymStr(&[(1, "one"), (2, "two")]);
//!
//! let s = NAMES.map(Scalar::from(Actual::U64(2)))?;
//! assert_eq!(s.sym.as_deref(), Some("two"));
//! assert_eq!(s.actual, Actual::U64(2));
//! # Ok::<(), bitscope::Error>(())
//! ```

pub mod mappers;

use crate::Result;

/// The raw decoded primitive of a leaf field.
#[derive(Debug, Clone, PartialEq)]
pub enum Actual {
    /// Unsigned integer up to 64 bits
    U64(u64),
    /// Signed integer up to 64 bits, sign-extended from its field width
    S64(i64),
    /// Floating point value
    F64(f64),
    /// Raw bytes, left-aligned when the field was not byte-sized
    Bytes(Vec<u8>),
    /// UTF-8 text
    Str(String),
    /// Single-bit flag
    Bool(bool),
    /// No value; used by synthesized fields
    Null,
}

impl Actual {
    /// The unsigned value, if this is an [`Actual::U64`].
    #[must_use]
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Actual::U64(v) => Some(*v),
            _ => None,
        }
    }

    /// The string value, if this is an [`Actual::Str`].
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Actual::Str(s) => Some(s),
            _ => None,
        }
    }

    /// The byte value, if this is an [`Actual::Bytes`].
    #[must_use]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Actual::Bytes(b) => Some(b),
            _ => None,
        }
    }
}

/// Rendering hint for numeric scalars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum DisplayFormat {
    /// Base 10
    Decimal,
    /// Base 16
    Hex,
    /// Base 2
    Binary,
    /// Base 8
    Octal,
}

/// Outcome of a soft validation mapper.
///
/// Validation never interrupts a decode; the note is recorded on the scalar and
/// left for renderers and queries to surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Validation {
    /// The value matched the expectation
    Valid,
    /// The value did not match the expectation
    Invalid,
}

/// A decoded leaf value together with its interpretive annotations.
///
/// `sym` and `description` never alter `actual`; renderers prefer `sym` when present.
#[derive(Debug, Clone, PartialEq)]
pub struct Scalar {
    /// The decoded primitive
    pub actual: Actual,
    /// Symbolic replacement used when rendering, e.g. an enum name or dotted IP
    pub sym: Option<String>,
    /// Optional human description
    pub description: Option<String>,
    /// Numeric rendering hint
    pub display_format: Option<DisplayFormat>,
    /// Soft validation note attached by validate mappers
    pub validation: Option<Validation>,
}

impl Scalar {
    /// The unsigned value, if the actual is one.
    #[must_use]
    pub fn actual_u(&self) -> Option<u64> {
        self.actual.as_u64()
    }
}

impl From<Actual> for Scalar {
    fn from(actual: Actual) -> Self {
        Scalar {
            actual,
            sym: None,
            description: None,
            display_format: None,
            validation: None,
        }
    }
}

/// A pure scalar transformation.
///
/// Mappers compose by sequential application; a later mapper sees the earlier
/// one's output. A failing mapper aborts the field emission that applied it.
pub trait Mapper {
    /// Transform the scalar, attaching or checking interpretation.
    ///
    /// # Errors
    /// Implementations return an error to abort the current field emission,
    /// e.g. on a failed assertion
    fn map(&self, s: Scalar) -> Result<Scalar>;
}

impl<F> Mapper for F
where
    F: Fn(Scalar) -> Result<Scalar>,
{
    fn map(&self, s: Scalar) -> Result<Scalar> {
        self(s)
    }
}
