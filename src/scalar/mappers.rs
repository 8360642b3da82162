//! The standard mapper set.
//!
//! Symbol-table mappers (`UTo*`) look their key up in a static slice and leave the
//! scalar unchanged on a miss. Display mappers set the numeric rendering hint.
//! Assert mappers fail the field emission on mismatch; validate mappers only record
//! a [`Validation`] note and let the decode continue.

use crate::{
    scalar::{DisplayFormat, Mapper, Scalar, Validation},
    Error, Result,
};

/// Symbol and description pair for [`UToScalar`] tables.
#[derive(Debug, Clone, Copy)]
pub struct SymEntry {
    /// Symbolic replacement, if any
    pub sym: Option<&'static str>,
    /// Human description, if any
    pub description: Option<&'static str>,
}

/// Maps an unsigned value to a symbol string via a static table.
pub struct UToSymStr(pub &'static [(u64, &'static str)]);

impl Mapper for UToSymStr {
    fn map(&self, mut s: Scalar) -> Result<Scalar> {
        if let Some(u) = s.actual.as_u64() {
            if let Some((_, sym)) = self.0.iter().find(|(k, _)| *k == u) {
                s.sym = Some((*sym).to_string());
            }
        }
        Ok(s)
    }
}

/// Maps an unsigned value to a symbol and/or description via a static table.
pub struct UToScalar(pub &'static [(u64, SymEntry)]);

impl Mapper for UToScalar {
    fn map(&self, mut s: Scalar) -> Result<Scalar> {
        if let Some(u) = s.actual.as_u64() {
            if let Some((_, entry)) = self.0.iter().find(|(k, _)| *k == u) {
                if let Some(sym) = entry.sym {
                    s.sym = Some(sym.to_string());
                }
                if let Some(description) = entry.description {
                    s.description = Some(description.to_string());
                }
            }
        }
        Ok(s)
    }
}

/// Maps an unsigned value to a description via a static table.
pub struct UToDescription(pub &'static [(u64, &'static str)]);

impl Mapper for UToDescription {
    fn map(&self, mut s: Scalar) -> Result<Scalar> {
        if let Some(u) = s.actual.as_u64() {
            if let Some((_, description)) = self.0.iter().find(|(k, _)| *k == u) {
                s.description = Some((*description).to_string());
            }
        }
        Ok(s)
    }
}

/// Sets the display hint to hexadecimal.
pub struct ActualHex;

impl Mapper for ActualHex {
    fn map(&self, mut s: Scalar) -> Result<Scalar> {
        s.display_format = Some(DisplayFormat::Hex);
        Ok(s)
    }
}

/// Sets the display hint to binary.
pub struct ActualBin;

impl Mapper for ActualBin {
    fn map(&self, mut s: Scalar) -> Result<Scalar> {
        s.display_format = Some(DisplayFormat::Binary);
        Ok(s)
    }
}

/// Sets the display hint to octal.
pub struct ActualOct;

impl Mapper for ActualOct {
    fn map(&self, mut s: Scalar) -> Result<Scalar> {
        s.display_format = Some(DisplayFormat::Octal);
        Ok(s)
    }
}

/// Fails the field emission unless the unsigned value is one of the listed ones.
pub struct AssertU(pub &'static [u64]);

impl Mapper for AssertU {
    fn map(&self, s: Scalar) -> Result<Scalar> {
        match s.actual.as_u64() {
            Some(u) if self.0.contains(&u) => Ok(s),
            actual => Err(Error::Assertion(format!(
                "expected one of {:?}, got {:?}",
                self.0, actual
            ))),
        }
    }
}

/// Fails the field emission unless the string value equals the expected one.
pub struct AssertStr(pub &'static str);

impl Mapper for AssertStr {
    fn map(&self, s: Scalar) -> Result<Scalar> {
        match s.actual.as_str() {
            Some(v) if v == self.0 => Ok(s),
            _ => Err(Error::Assertion(format!(
                "expected {:?}, got {:?}",
                self.0, s.actual
            ))),
        }
    }
}

/// Fails the field emission unless every raw byte is zero.
pub struct BitBufIsZero;

impl Mapper for BitBufIsZero {
    fn map(&self, s: Scalar) -> Result<Scalar> {
        match s.actual.as_bytes() {
            Some(b) if b.iter().all(|&v| v == 0) => Ok(s),
            _ => Err(Error::Assertion("expected all-zero bits".to_string())),
        }
    }
}

/// Records a validation note: `valid` if the unsigned value is one of the listed
/// ones, `invalid` otherwise. Never fails.
pub struct ValidateU(pub &'static [u64]);

impl Mapper for ValidateU {
    fn map(&self, mut s: Scalar) -> Result<Scalar> {
        let ok = s.actual.as_u64().is_some_and(|u| self.0.contains(&u));
        s.validation = Some(if ok {
            Validation::Valid
        } else {
            Validation::Invalid
        });
        Ok(s)
    }
}

/// Records a validation note by comparing the unsigned value against big-endian
/// bytes, typically a checksum sink's sum. Never fails.
pub struct ValidateUBytes(pub Vec<u8>);

impl Mapper for ValidateUBytes {
    fn map(&self, mut s: Scalar) -> Result<Scalar> {
        let expected = self
            .0
            .iter()
            .fold(0u64, |acc, &b| (acc << 8) | u64::from(b));
        let ok = s.actual.as_u64() == Some(expected);
        s.validation = Some(if ok {
            Validation::Valid
        } else {
            Validation::Invalid
        });
        Ok(s)
    }
}
