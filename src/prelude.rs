//! Curated re-exports for glob import.
//!
//! Pulls in the types nearly every user of the crate touches: the bit source,
//! the cursor and its options, the value tree, the registry, and the scalar
//! layer including the standard mappers.

pub use crate::bitbuf::BitBuf;
pub use crate::decode::{BitRange, DecodeOptions, Decoder, Endian, Node, NodeKind, Value};
pub use crate::file::File;
pub use crate::registry::{
    Decoded, Dependency, Format, InArg, OutArg, Registry, RegistryBuilder,
};
pub use crate::scalar::mappers::{
    ActualBin, ActualHex, ActualOct, AssertStr, AssertU, BitBufIsZero, UToDescription, UToScalar,
    UToSymStr, ValidateU, ValidateUBytes,
};
pub use crate::scalar::{Actual, DisplayFormat, Mapper, Scalar, Validation};
pub use crate::{Error, Result};
