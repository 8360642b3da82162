// Copyright 2025-2026 The bitscope contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![deny(missing_docs)]
// - 'file/physical.rs' uses mmap to map a file into memory

//! # bitscope
//!
//! A bit-level decoding engine for inspecting binary files. Files of many formats
//! are decoded into a tree of symbolic values where every node is annotated with
//! the exact bit range it came from; the tree is then explored programmatically,
//! typically by a query-language runtime sitting on top of this crate.
//!
//! # Architecture
//!
//! The crate is organized around a cursor-oriented decoding core and a thin ring
//! of collaborators:
//!
//! - **Bit source** ([`BitBuf`]): random-access MSB-first bit reads over shared
//!   byte buffers, sub-range views without copy
//! - **Scalars and mappers** ([`scalar`]): raw field values plus composable,
//!   purely interpretive annotations (symbols, descriptions, display hints,
//!   validations)
//! - **Value tree** ([`Node`]): struct/array/leaf nodes carrying bit ranges,
//!   consumed read-only by query evaluators
//! - **Decoder cursor** ([`Decoder`]): the one object format bodies program
//!   against - field emitters, frames, seeks, endianness, format dispatch
//! - **Format registry** ([`Registry`]): named formats with dependency groups,
//!   probe-based auto-detection, typed in/out arguments
//! - **Collaborators** ([`checksum`], [`flows`]): checksum sinks and flow
//!   reassembly used by individual formats
//!
//! # Usage Examples
//!
//! ## Decoding an ad-hoc layout
//!
//! ```rust
//! use bitscope::{BitBuf, Decoder};
//!
//! let mut d = Decoder::new(BitBuf::from(vec![0x45, 0x00, 0x00, 0x28]));
//! d.field_u("version", 4, &[])?;
//! d.field_u("ihl", 4, &[])?;
//! d.field_u("dscp", 6, &[])?;
//! d.field_u("ecn", 2, &[])?;
//! let total_length = d.field_u("total_length", 16, &[])?;
//! assert_eq!(total_length, 40);
//!
//! let root = d.finish();
//! assert_eq!(root.child("total_length").unwrap().range().start, 16);
//! # Ok::<(), bitscope::Error>(())
//! ```
//!
//! ## Decoding a file with a registered format
//!
//! ```rust,no_run
//! use bitscope::{file::File, DecodeOptions, InArg, Registry};
//!
//! let file = File::from_path("frame.bin".as_ref())?;
//! let registry = Registry::standard()?;
//! let decoded = registry.decode(
//!     file.bit_buf(),
//!     "ether8023_frame",
//!     InArg::NONE,
//!     DecodeOptions::default(),
//! )?;
//!
//! let destination = decoded.root.child("destination").unwrap();
//! println!("destination: {:?}", destination.scalar().unwrap().sym);
//! # Ok::<(), bitscope::Error>(())
//! ```
//!
//! ## Probing
//!
//! ```rust,no_run
//! use bitscope::{file::File, DecodeOptions, Registry};
//!
//! let file = File::from_path("capture.pcap".as_ref())?;
//! let registry = Registry::standard()?;
//! let decoded = registry.probe(file.bit_buf(), "probe", DecodeOptions::default())?;
//! println!("detected {}", decoded.format.name);
//! # Ok::<(), bitscope::Error>(())
//! ```
//!
//! # Error Handling
//!
//! All operations return [`Result<T, Error>`](Result). Fatal decode errors carry
//! the tree path and bit position of the failing field; the partial tree decoded
//! before the failure is preserved and handed back alongside the error. Soft
//! validation issues never interrupt a decode - they are recorded on the value
//! tree itself.
//!
//! # Thread Safety
//!
//! A decode is single-threaded: cursors and under-construction trees are never
//! shared. Finished trees, [`BitBuf`]s and the frozen [`Registry`] are freely
//! shareable across threads, so distinct files can be decoded concurrently.

mod error;

pub mod bitbuf;
pub mod checksum;
pub mod decode;
pub mod file;
pub mod flows;
pub mod format;
pub mod registry;
pub mod scalar;

/// Convenient re-exports of the most commonly used types and traits.
///
/// ```rust
/// use bitscope::prelude::*;
///
/// let mut d = Decoder::new(BitBuf::from(vec![0xff]));
/// let all_set = d.field_u("flags", 8, &[])?;
/// assert_eq!(all_set, 0xff);
/// # Ok::<(), bitscope::Error>(())
/// ```
pub mod prelude;

/// `bitscope` Result type.
///
/// A type alias for `std::result::Result<T, Error>` where the error type is always
/// [`crate::Error`], used consistently throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// `bitscope` Error type.
///
/// See [`error::Error`] for the failure modes of the engine and how context is
/// attached to fatal decode errors.
pub use error::Error;

pub use bitbuf::BitBuf;
pub use decode::{BitRange, DecodeOptions, Decoder, Endian, Node, NodeKind, Value};
pub use registry::{
    Decoded, Dependency, Format, FormatHelp, InArg, OutArg, Registry, RegistryBuilder,
};
pub use scalar::{Actual, Mapper, Scalar};
