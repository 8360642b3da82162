//! The decoding engine: value tree and decoder cursor.
//!
//! This module is the heart of the crate. A decode invocation threads a
//! [`Decoder`] through a format body; every field operation reads bits,
//! constructs a [`Node`] annotated with its exact [`BitRange`], attaches it to
//! the compound under construction, and advances the cursor. The finished tree
//! is owned by the caller and consumed read-only, typically by a query
//! evaluator.
//!
//! # Key Components
//!
//! - [`Decoder`] - The cursor: field emitters, frames, seeks, endianness,
//!   format dispatch and probing
//! - [`Node`] / [`Value`] / [`NodeKind`] - The hierarchical value tree
//! - [`BitRange`] - Half-open bit range annotation carried by every node
//! - [`Endian`] / [`DecodeOptions`] - Cursor byte order and decode limits
//!
//! # Ordering and mutation rules
//!
//! Fields are emitted in call order and their ranges advance monotonically
//! unless a body explicitly seeks backwards to re-read a header. A node is
//! mutable only while the decode scope that created it is still open (through
//! [`Decoder::rewrite_scalar`]); once the scope closes the node is final.

mod decoder;
mod value;

pub use decoder::{DecodeOptions, Decoder, Endian};
pub use value::{BitRange, Node, NodeKind, Value};
