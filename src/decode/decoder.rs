//! The decoder cursor threaded through every format body.
//!
//! A [`Decoder`] owns the state of one decode invocation: the bit source, the current
//! bit position and default endianness, the compound node under construction, a stack
//! of framed sub-ranges, and the recursion depth of nested format dispatch. Format
//! bodies interact with the engine exclusively through this type: every `field_*`
//! method reads bits, builds a tree node, attaches it to the current parent, and
//! advances the cursor.
//!
//! Probe recovery is structural rather than unwinding: each dispatch candidate writes
//! into a scratch wrapper node, and on failure the wrapper is discarded and the cursor
//! position, endianness, and frame stack are restored before the next candidate runs.
//!
//! # Example
//!
//! ```rust
//! use bitscope::{BitBuf, Decoder};
//!
//! let mut d = Decoder::new(BitBuf::from(vec![0x45, 0x00]));
//! let version = d.field_u("version", 4, &[])?;
//! let ihl = d.field_u("ihl", 4, &[])?;
//! assert_eq!((version, ihl), (4, 5));
//!
//! let root = d.finish();
//! assert_eq!(root.child("version").unwrap().range().len, 4);
//! # Ok::<(), bitscope::Error>(())
//! ```

use crate::{
    bitbuf::BitBuf,
    decode::value::{BitRange, Node, NodeKind, Value},
    registry::{Format, InArg, OutArg, Registry},
    scalar::{Actual, Mapper, Scalar},
    Error, Result,
};

/// Byte order used by multi-byte integer reads.
///
/// The cursor starts big-endian; format bodies assign [`Decoder::endian`] directly,
/// typically after reading a magic word. Nested format decodes start big-endian again
/// and the surrounding endianness is restored when they return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Endian {
    /// Most significant byte first
    #[default]
    Big,
    /// Least significant byte first
    Little,
}

/// Per-decode configuration.
#[derive(Debug, Clone, Copy)]
pub struct DecodeOptions {
    /// Bound on nested format dispatch, protecting against adversarial nesting
    pub max_depth: u32,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        DecodeOptions { max_depth: 1024 }
    }
}

struct Frame {
    start: u64,
    end: u64,
}

/// The stateful cursor of a single decode invocation.
///
/// See the [module docs](self) for the construction rules. A format body receives a
/// `&mut Decoder` and must not retain it past return; the tree it builds outlives the
/// cursor and is handed back by [`Decoder::finish`] or the registry entry points.
pub struct Decoder<'r> {
    bits: BitBuf,
    registry: Option<&'r Registry>,
    /// Default byte order of integer reads; assignable by format bodies
    pub endian: Endian,
    pos: u64,
    frames: Vec<Frame>,
    depth: u32,
    options: DecodeOptions,
    stack: Vec<Node>,
}

impl<'r> Decoder<'r> {
    /// Create a standalone cursor over a bit source with a struct root.
    ///
    /// Format dispatch methods need a registry and fail on a standalone cursor;
    /// everything else works. Used directly in tests and by callers that decode
    /// ad-hoc layouts without registering a format.
    #[must_use]
    pub fn new(bits: BitBuf) -> Self {
        Decoder {
            bits,
            registry: None,
            endian: Endian::Big,
            pos: 0,
            frames: Vec::new(),
            depth: 0,
            options: DecodeOptions::default(),
            stack: vec![Node::new(None, BitRange { start: 0, len: 0 }, Value::Struct(Vec::new()))],
        }
    }

    pub(crate) fn for_format(
        bits: BitBuf,
        registry: &'r Registry,
        options: DecodeOptions,
        format: &Format,
        depth: u32,
        root_name: Option<String>,
    ) -> Self {
        let value = if format.root_array {
            Value::Array(Vec::new())
        } else {
            Value::Struct(Vec::new())
        };
        let name = root_name.or_else(|| format.root_name.map(str::to_string));
        Decoder {
            bits,
            registry: Some(registry),
            endian: Endian::Big,
            pos: 0,
            frames: Vec::new(),
            depth,
            options,
            stack: vec![Node::new(name, BitRange { start: 0, len: 0 }, value)],
        }
    }

    /// Finish the decode and hand back the root node.
    ///
    /// The root's range is set to cover everything consumed and every child range.
    #[must_use]
    pub fn finish(mut self) -> Node {
        debug_assert_eq!(self.stack.len(), 1, "unbalanced decode scopes");
        let mut root = self.stack.pop().expect("decoder scope stack is never empty");
        finalize_range(&mut root, 0, self.pos);
        root
    }

    // ------------------------------------------------------------------
    // Position and frames
    // ------------------------------------------------------------------

    fn frame_start(&self) -> u64 {
        self.frames.last().map_or(0, |f| f.start)
    }

    fn frame_end(&self) -> u64 {
        self.frames.last().map_or(self.bits.len_bits(), |f| f.end)
    }

    /// Current bit position.
    #[must_use]
    pub fn pos(&self) -> u64 {
        self.pos
    }

    /// Bits left until the end of the active frame (or of the source).
    #[must_use]
    pub fn bits_left(&self) -> u64 {
        self.frame_end().saturating_sub(self.pos)
    }

    /// True once the cursor reached the end of the active frame.
    #[must_use]
    pub fn end(&self) -> bool {
        self.pos >= self.frame_end()
    }

    /// Move the cursor to an absolute bit position within the active frame.
    ///
    /// # Errors
    /// Returns [`Error::OutOfRange`] if the target leaves the active frame
    pub fn seek_abs(&mut self, pos: u64) -> Result<()> {
        if pos < self.frame_start() || pos > self.frame_end() {
            return Err(Error::OutOfRange { pos, bits: 0 });
        }
        self.pos = pos;
        Ok(())
    }

    /// Move the cursor by a signed bit delta within the active frame.
    ///
    /// # Errors
    /// Returns [`Error::OutOfRange`] if the target leaves the active frame
    pub fn seek_rel(&mut self, delta: i64) -> Result<()> {
        let target = i128::from(self.pos) + i128::from(delta);
        let target = u64::try_from(target).map_err(|_| Error::OutOfRange {
            pos: self.pos,
            bits: 0,
        })?;
        self.seek_abs(target)
    }

    /// A sub-view of the bit source; coordinates are absolute, not frame-relative.
    ///
    /// # Errors
    /// Returns [`Error::OutOfRange`] if the range passes the end of the source
    pub fn bit_buf_range(&self, start: u64, len: u64) -> Result<BitBuf> {
        self.bits.sub(start, len)
    }

    /// Run `body` inside a frame of `len` bits starting at the current position.
    ///
    /// Reads inside the frame cannot pass its end. On successful exit the cursor is
    /// placed at `frame_start + len` whether the body consumed less; the surrounding
    /// endianness is restored either way.
    ///
    /// # Errors
    /// Returns [`Error::OutOfRange`] if the frame itself does not fit, or whatever
    /// the body fails with
    pub fn framed<T>(&mut self, len: u64, body: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let start = self.pos;
        let end = start
            .checked_add(len)
            .filter(|e| *e <= self.frame_end())
            .ok_or(Error::OutOfRange {
                pos: start,
                bits: len,
            })?;
        let endian = self.endian;

        self.frames.push(Frame { start, end });
        let result = body(self);
        self.frames.pop();
        self.endian = endian;

        if result.is_ok() {
            self.pos = end;
        }
        result
    }

    /// Temporarily relocate the cursor to an absolute range, run `body`, and restore
    /// the prior position and endianness.
    ///
    /// # Errors
    /// Returns [`Error::OutOfRange`] if the range passes the end of the source, or
    /// whatever the body fails with
    pub fn ranged<T>(
        &mut self,
        start: u64,
        len: u64,
        body: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        let end = start
            .checked_add(len)
            .filter(|e| *e <= self.bits.len_bits())
            .ok_or(Error::OutOfRange {
                pos: start,
                bits: len,
            })?;
        let saved_pos = self.pos;
        let endian = self.endian;

        self.frames.push(Frame { start, end });
        self.pos = start;
        let result = body(self);
        self.frames.pop();
        self.pos = saved_pos;
        self.endian = endian;

        result
    }

    // ------------------------------------------------------------------
    // Raw reads
    // ------------------------------------------------------------------

    /// Read `bits` bits at the cursor in the current endianness without emitting a
    /// field. Used inside [`Decoder::field_u_fn`] closures.
    ///
    /// # Errors
    /// Returns [`Error::OutOfRange`] if the read passes the active frame
    pub fn u(&mut self, bits: u32) -> Result<u64> {
        if u64::from(bits) > self.bits_left() {
            return Err(Error::OutOfRange {
                pos: self.pos,
                bits: u64::from(bits),
            });
        }
        let raw = self.bits.read_bits(self.pos, bits)?;
        self.pos += u64::from(bits);
        Ok(match self.endian {
            Endian::Big => raw,
            Endian::Little if bits > 8 => reverse_bytes(raw, bits),
            Endian::Little => raw,
        })
    }

    /// Stream the bytes of a bit range into a writer, typically a checksum sink.
    ///
    /// # Errors
    /// Returns [`Error::FileError`] if the writer fails
    pub fn copy<W: std::io::Write>(&self, writer: &mut W, buf: &BitBuf) -> Result<()> {
        let bytes = buf.to_bytes()?;
        writer.write_all(&bytes)?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Errors and warnings
    // ------------------------------------------------------------------

    /// Build a fatal error at the current position. The caller returns it to abort
    /// the decode; it unwinds to the nearest probe barrier or to the top-level entry.
    #[must_use]
    pub fn fatal(&self, message: impl Into<String>) -> Error {
        Error::Fatal {
            message: message.into(),
            pos: self.pos,
        }
    }

    /// Build a format-mismatch error, used by format bodies to reject an
    /// in-argument they are not responsible for.
    #[must_use]
    pub fn reject(&self, message: impl Into<String>) -> Error {
        Error::FormatMismatch(message.into())
    }

    /// Record a non-fatal warning on the node under construction; the decode
    /// continues.
    pub fn warn(&mut self, message: impl Into<String>) {
        self.current_mut().errors.push(message.into());
    }

    fn path_with(&self, name: &str) -> String {
        let mut parts: Vec<&str> = self.stack.iter().filter_map(Node::name).collect();
        parts.push(name);
        parts.join(".")
    }

    fn ctx(&self, name: &str, err: Error) -> Error {
        if matches!(err, Error::Decode { .. }) {
            return err;
        }
        Error::Decode {
            path: self.path_with(name),
            pos: self.pos,
            source: Box::new(err),
        }
    }

    pub(crate) fn top_context(&self, err: Error) -> Error {
        if matches!(err, Error::Decode { .. }) {
            return err;
        }
        let path: Vec<&str> = self.stack.iter().filter_map(Node::name).collect();
        Error::Decode {
            path: path.join("."),
            pos: self.pos,
            source: Box::new(err),
        }
    }

    // ------------------------------------------------------------------
    // Tree construction
    // ------------------------------------------------------------------

    fn current_mut(&mut self) -> &mut Node {
        self.stack
            .last_mut()
            .expect("decoder scope stack is never empty")
    }

    fn attach(&mut self, child: Node) -> Result<()> {
        let parent = self.current_mut();
        if matches!(parent.value, Value::Struct(_)) {
            if let Some(name) = child.name() {
                if parent.children().iter().any(|c| c.name() == Some(name)) {
                    return Err(Error::DuplicateFieldName(name.to_string()));
                }
            }
        }
        parent
            .children_mut()
            .expect("decode scopes are compound nodes")
            .push(child);
        Ok(())
    }

    fn emit_leaf(
        &mut self,
        name: &str,
        start: u64,
        scalar: Scalar,
        mappers: &[&dyn Mapper],
    ) -> Result<()> {
        let mut scalar = scalar;
        for mapper in mappers {
            scalar = mapper.map(scalar).map_err(|e| self.ctx(name, e))?;
        }
        let node = Node::new(
            Some(name.to_string()),
            BitRange {
                start,
                len: self.pos - start,
            },
            Value::Leaf(scalar),
        );
        self.attach(node).map_err(|e| self.ctx(name, e))
    }

    fn push_compound(&mut self, name: Option<String>, kind: NodeKind) {
        let value = match kind {
            NodeKind::Struct => Value::Struct(Vec::new()),
            NodeKind::Array => Value::Array(Vec::new()),
            NodeKind::Leaf => unreachable!("leaves are not decode scopes"),
        };
        self.stack.push(Node::new(
            name,
            BitRange {
                start: self.pos,
                len: 0,
            },
            value,
        ));
    }

    fn pop_attach(&mut self, entry: u64) -> Result<()> {
        let mut node = self
            .stack
            .pop()
            .expect("decoder scope stack is never empty");
        finalize_range(&mut node, entry, self.pos);
        let name = node.name().unwrap_or("").to_string();
        self.attach(node).map_err(|e| self.ctx(&name, e))
    }

    fn scoped<T>(
        &mut self,
        name: &str,
        kind: NodeKind,
        body: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        let entry = self.pos;
        self.push_compound(Some(name.to_string()), kind);
        match body(self) {
            Ok(value) => {
                self.pop_attach(entry)?;
                Ok(value)
            }
            Err(err) => {
                // keep the partial subtree so failed decodes still render
                let _ = self.pop_attach(entry);
                Err(err)
            }
        }
    }

    // ------------------------------------------------------------------
    // Leaf fields
    // ------------------------------------------------------------------

    /// Read `bits` bits (0..=64) as unsigned in the current endianness and emit a
    /// leaf under the current parent.
    ///
    /// # Errors
    /// Returns [`Error::OutOfRange`] past the frame, a mapper's error, or
    /// [`Error::DuplicateFieldName`] under a struct parent
    pub fn field_u(&mut self, name: &str, bits: u32, mappers: &[&dyn Mapper]) -> Result<u64> {
        let start = self.pos;
        let value = self.u(bits).map_err(|e| self.ctx(name, e))?;
        self.emit_leaf(name, start, Scalar::from(Actual::U64(value)), mappers)?;
        Ok(value)
    }

    /// Read `bits` bits as a two's-complement signed value, sign-extended from the
    /// field width, and emit a leaf.
    ///
    /// # Errors
    /// Same contract as [`Decoder::field_u`]
    pub fn field_s(&mut self, name: &str, bits: u32, mappers: &[&dyn Mapper]) -> Result<i64> {
        let start = self.pos;
        let raw = self.u(bits).map_err(|e| self.ctx(name, e))?;
        let value = sign_extend(raw, bits);
        self.emit_leaf(name, start, Scalar::from(Actual::S64(value)), mappers)?;
        Ok(value)
    }

    /// Read a 32- or 64-bit IEEE float in the current endianness and emit a leaf.
    ///
    /// # Errors
    /// Same contract as [`Decoder::field_u`]; other widths are fatal
    pub fn field_f(&mut self, name: &str, bits: u32, mappers: &[&dyn Mapper]) -> Result<f64> {
        let start = self.pos;
        let raw = self.u(bits).map_err(|e| self.ctx(name, e))?;
        let value = match bits {
            32 => f64::from(f32::from_bits(raw as u32)),
            64 => f64::from_bits(raw),
            _ => return Err(self.fatal(format!("unsupported float width {bits}"))),
        };
        self.emit_leaf(name, start, Scalar::from(Actual::F64(value)), mappers)?;
        Ok(value)
    }

    /// Read a single bit as a boolean and emit a leaf.
    ///
    /// # Errors
    /// Same contract as [`Decoder::field_u`]
    pub fn field_bool(&mut self, name: &str, mappers: &[&dyn Mapper]) -> Result<bool> {
        let start = self.pos;
        let value = self.u(1).map_err(|e| self.ctx(name, e))? != 0;
        self.emit_leaf(name, start, Scalar::from(Actual::Bool(value)), mappers)?;
        Ok(value)
    }

    /// Copy `len` bits into a raw-bytes leaf without scalar conversion.
    ///
    /// # Errors
    /// Same contract as [`Decoder::field_u`]
    pub fn field_raw_len(
        &mut self,
        name: &str,
        len: u64,
        mappers: &[&dyn Mapper],
    ) -> Result<Vec<u8>> {
        let start = self.pos;
        if len > self.bits_left() {
            return Err(self.ctx(name, Error::OutOfRange { pos: start, bits: len }));
        }
        let bytes = self
            .bits
            .read_all_bits(self.pos, len)
            .map_err(|e| self.ctx(name, e))?;
        self.pos += len;
        self.emit_leaf(name, start, Scalar::from(Actual::Bytes(bytes.clone())), mappers)?;
        Ok(bytes)
    }

    /// Read `byte_len` bytes as UTF-8 and emit a string leaf.
    ///
    /// # Errors
    /// Returns [`Error::InvalidString`] for invalid UTF-8, otherwise the contract of
    /// [`Decoder::field_u`]
    pub fn field_utf8(
        &mut self,
        name: &str,
        byte_len: u64,
        mappers: &[&dyn Mapper],
    ) -> Result<String> {
        let start = self.pos;
        let len = byte_len * 8;
        if len > self.bits_left() {
            return Err(self.ctx(name, Error::OutOfRange { pos: start, bits: len }));
        }
        let bytes = self
            .bits
            .read_all_bits(self.pos, len)
            .map_err(|e| self.ctx(name, e))?;
        let text = String::from_utf8(bytes).map_err(|_| {
            self.ctx(
                name,
                Error::InvalidString {
                    encoding: "UTF-8",
                    pos: start,
                },
            )
        })?;
        self.pos += len;
        self.emit_leaf(name, start, Scalar::from(Actual::Str(text.clone())), mappers)?;
        Ok(text)
    }

    /// Read a NUL-terminated UTF-8 string, consuming the terminator.
    ///
    /// # Errors
    /// Returns [`Error::OutOfRange`] if the frame ends before a NUL, otherwise the
    /// contract of [`Decoder::field_utf8`]
    pub fn field_utf8_null(&mut self, name: &str, mappers: &[&dyn Mapper]) -> Result<String> {
        let start = self.pos;
        let mut bytes = Vec::new();
        loop {
            let b = self.u(8).map_err(|e| self.ctx(name, e))? as u8;
            if b == 0 {
                break;
            }
            bytes.push(b);
        }
        let text = String::from_utf8(bytes).map_err(|_| {
            self.ctx(
                name,
                Error::InvalidString {
                    encoding: "UTF-8",
                    pos: start,
                },
            )
        })?;
        self.emit_leaf(name, start, Scalar::from(Actual::Str(text.clone())), mappers)?;
        Ok(text)
    }

    /// Read exactly `fixed` bytes, trimming the string at the first NUL but
    /// consuming all bytes.
    ///
    /// # Errors
    /// Same contract as [`Decoder::field_utf8`]
    pub fn field_utf8_null_fixed_len(
        &mut self,
        name: &str,
        fixed: u64,
        mappers: &[&dyn Mapper],
    ) -> Result<String> {
        let start = self.pos;
        let len = fixed * 8;
        if len > self.bits_left() {
            return Err(self.ctx(name, Error::OutOfRange { pos: start, bits: len }));
        }
        let mut bytes = self
            .bits
            .read_all_bits(self.pos, len)
            .map_err(|e| self.ctx(name, e))?;
        if let Some(nul) = bytes.iter().position(|&b| b == 0) {
            bytes.truncate(nul);
        }
        let text = String::from_utf8(bytes).map_err(|_| {
            self.ctx(
                name,
                Error::InvalidString {
                    encoding: "UTF-8",
                    pos: start,
                },
            )
        })?;
        self.pos += len;
        self.emit_leaf(name, start, Scalar::from(Actual::Str(text.clone())), mappers)?;
        Ok(text)
    }

    /// Read `byte_len` bytes as UTF-16LE and emit a string leaf.
    ///
    /// # Errors
    /// Returns [`Error::InvalidString`] for odd lengths or invalid UTF-16, otherwise
    /// the contract of [`Decoder::field_u`]
    pub fn field_utf16le(
        &mut self,
        name: &str,
        byte_len: u64,
        mappers: &[&dyn Mapper],
    ) -> Result<String> {
        let start = self.pos;
        let len = byte_len * 8;
        if byte_len % 2 != 0 || len > self.bits_left() {
            return Err(self.ctx(
                name,
                Error::InvalidString {
                    encoding: "UTF-16LE",
                    pos: start,
                },
            ));
        }
        let bytes = self
            .bits
            .read_all_bits(self.pos, len)
            .map_err(|e| self.ctx(name, e))?;
        let units: Vec<u16> = bytes
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        let text = String::from_utf16(&units).map_err(|_| {
            self.ctx(
                name,
                Error::InvalidString {
                    encoding: "UTF-16LE",
                    pos: start,
                },
            )
        })?;
        self.pos += len;
        self.emit_leaf(name, start, Scalar::from(Actual::Str(text.clone())), mappers)?;
        Ok(text)
    }

    /// Emit a leaf computed by `body` from raw reads; the leaf's range covers
    /// whatever the body consumed.
    ///
    /// # Errors
    /// Whatever the body fails with, plus the attach contract of [`Decoder::field_u`]
    pub fn field_u_fn(
        &mut self,
        name: &str,
        body: impl FnOnce(&mut Self) -> Result<u64>,
        mappers: &[&dyn Mapper],
    ) -> Result<u64> {
        let start = self.pos;
        let value = body(self).map_err(|e| self.ctx(name, e))?;
        self.emit_leaf(name, start, Scalar::from(Actual::U64(value)), mappers)?;
        Ok(value)
    }

    /// Emit a synthesized unsigned value as a zero-length leaf at the current
    /// position. Used for computed results such as reassembled-flow metadata.
    ///
    /// # Errors
    /// A mapper's error or [`Error::DuplicateFieldName`]
    pub fn field_value_u(&mut self, name: &str, value: u64, mappers: &[&dyn Mapper]) -> Result<()> {
        let start = self.pos;
        self.emit_leaf(name, start, Scalar::from(Actual::U64(value)), mappers)
    }

    /// Emit a synthesized string as a zero-length leaf at the current position.
    ///
    /// # Errors
    /// A mapper's error or [`Error::DuplicateFieldName`]
    pub fn field_value_str(
        &mut self,
        name: &str,
        value: &str,
        mappers: &[&dyn Mapper],
    ) -> Result<()> {
        let start = self.pos;
        self.emit_leaf(
            name,
            start,
            Scalar::from(Actual::Str(value.to_string())),
            mappers,
        )
    }

    /// Emit a synthesized boolean as a zero-length leaf at the current position.
    ///
    /// # Errors
    /// A mapper's error or [`Error::DuplicateFieldName`]
    pub fn field_value_bool(
        &mut self,
        name: &str,
        value: bool,
        mappers: &[&dyn Mapper],
    ) -> Result<()> {
        let start = self.pos;
        self.emit_leaf(name, start, Scalar::from(Actual::Bool(value)), mappers)
    }

    /// Re-apply mappers to the scalar of an already emitted direct child of the
    /// current parent. Used to annotate a checksum field after the body finished
    /// scanning the ranges the checksum covers.
    ///
    /// # Errors
    /// Returns [`Error::Mapper`] if no leaf with that name exists in the current
    /// scope, or a mapper's error
    pub fn rewrite_scalar(&mut self, name: &str, mappers: &[&dyn Mapper]) -> Result<()> {
        let parent = self
            .stack
            .last()
            .expect("decoder scope stack is never empty");
        let idx = parent
            .children()
            .iter()
            .position(|c| c.name() == Some(name))
            .ok_or_else(|| Error::Mapper(format!("no field `{name}` to rewrite in this scope")))?;
        let mut scalar = parent.children()[idx]
            .scalar()
            .cloned()
            .ok_or_else(|| Error::Mapper(format!("field `{name}` is not a leaf")))?;

        for mapper in mappers {
            scalar = mapper.map(scalar).map_err(|e| self.ctx(name, e))?;
        }

        let children = self
            .current_mut()
            .children_mut()
            .expect("decode scopes are compound nodes");
        children[idx].value = Value::Leaf(scalar);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Compound fields
    // ------------------------------------------------------------------

    /// Create a struct child, run `body` with it as the current parent, and set its
    /// range from the entry and exit positions and its children.
    ///
    /// # Errors
    /// Whatever the body fails with; the partial subtree stays attached
    pub fn field_struct<T>(
        &mut self,
        name: &str,
        body: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        self.scoped(name, NodeKind::Struct, body)
    }

    /// Create an array child, run `body` with it as the current parent; children
    /// added by the body are indexed in emission order.
    ///
    /// # Errors
    /// Whatever the body fails with; the partial subtree stays attached
    pub fn field_array<T>(
        &mut self,
        name: &str,
        body: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        self.scoped(name, NodeKind::Array, body)
    }

    /// Create an array child of `elem` structs, running `body` once per element
    /// while `cond` holds. `cond` receives the cursor and the number of elements
    /// decoded so far.
    ///
    /// # Errors
    /// Whatever the body fails with; the partial subtree stays attached
    pub fn field_struct_array_loop(
        &mut self,
        name: &str,
        elem: &str,
        mut cond: impl FnMut(&Self, usize) -> bool,
        mut body: impl FnMut(&mut Self) -> Result<()>,
    ) -> Result<()> {
        self.field_array(name, |d| {
            let mut count = 0;
            while cond(d, count) {
                d.field_struct(elem, |d| body(d))?;
                count += 1;
            }
            Ok(())
        })
    }

    // ------------------------------------------------------------------
    // Format dispatch
    // ------------------------------------------------------------------

    fn candidates(&self, group: &str) -> Result<(&'r Registry, &'r [&'static Format])> {
        let registry = self
            .registry
            .ok_or_else(|| Error::UnknownFormat(group.to_string()))?;
        let formats = registry
            .resolve(group)
            .ok_or_else(|| Error::UnknownFormat(group.to_string()))?;
        Ok((registry, formats))
    }

    fn dispatch(
        &mut self,
        name: &str,
        group: &str,
        len: u64,
        exact_len: bool,
        in_arg: InArg<'_>,
    ) -> Result<(&'static Format, OutArg)> {
        if self.depth >= self.options.max_depth {
            return Err(Error::DepthExceeded(self.options.max_depth));
        }
        let (_, formats) = self.candidates(group)?;
        let start = self.pos;
        let end = start
            .checked_add(len)
            .filter(|e| *e <= self.frame_end())
            .ok_or(Error::OutOfRange {
                pos: start,
                bits: len,
            })?;

        for &format in formats {
            let saved_stack = self.stack.len();
            let saved_endian = self.endian;

            let kind = if format.root_array {
                NodeKind::Array
            } else {
                NodeKind::Struct
            };
            self.push_compound(Some(name.to_string()), kind);
            self.frames.push(Frame { start, end });
            self.depth += 1;
            self.endian = Endian::Big;

            let result = (format.decode_fn)(self, in_arg).and_then(|out| {
                if exact_len && self.pos < end {
                    self.field_raw_len("unknown", end - self.pos, &[])?;
                }
                Ok(out)
            });

            self.depth -= 1;
            self.frames.pop();
            self.endian = saved_endian;

            match result {
                Ok(out) => {
                    if exact_len {
                        self.pos = end;
                    }
                    self.pop_attach(start)?;
                    return Ok((format, out));
                }
                Err(err) if err.is_probe_recoverable() => {
                    self.stack.truncate(saved_stack);
                    self.pos = start;
                }
                Err(err) => {
                    self.stack.truncate(saved_stack);
                    self.pos = start;
                    return Err(err);
                }
            }
        }

        Err(Error::NoFormatMatched {
            group: group.to_string(),
        })
    }

    /// Dispatch the remaining bits of the active frame to a format or probe group
    /// and attach the resulting sub-tree under `name`. The cursor advances by
    /// exactly what the accepted format consumed.
    ///
    /// # Errors
    /// Returns [`Error::NoFormatMatched`] when every candidate fails,
    /// [`Error::UnknownFormat`] for an unregistered name, or
    /// [`Error::DepthExceeded`]
    pub fn field_format(&mut self, name: &str, group: &str, in_arg: InArg<'_>) -> Result<OutArg> {
        let left = self.bits_left();
        self.dispatch(name, group, left, false, in_arg)
            .map(|(_, out)| out)
            .map_err(|e| self.ctx(name, e))
    }

    /// Like [`Decoder::field_format`], but confined to `len` bits. The cursor
    /// advances by exactly `len` regardless of sub-format consumption; trailing
    /// unconsumed bits materialize as a raw `unknown` leaf.
    ///
    /// # Errors
    /// Same contract as [`Decoder::field_format`]
    pub fn field_format_len(
        &mut self,
        name: &str,
        len: u64,
        group: &str,
        in_arg: InArg<'_>,
    ) -> Result<OutArg> {
        self.dispatch(name, group, len, true, in_arg)
            .map(|(_, out)| out)
            .map_err(|e| self.ctx(name, e))
    }

    /// Attempt [`Decoder::field_format_len`]; on any recoverable failure fall back
    /// to a raw-bytes leaf of `len` bits under `name` and return `None`.
    ///
    /// # Errors
    /// Only non-recoverable errors (I/O, recursion bound) propagate
    pub fn field_format_or_raw_len(
        &mut self,
        name: &str,
        len: u64,
        group: &str,
        in_arg: InArg<'_>,
    ) -> Result<OutArg> {
        match self.dispatch(name, group, len, true, in_arg) {
            Ok((_, out)) => Ok(out),
            Err(err) if err.is_probe_recoverable() => {
                self.field_raw_len(name, len, &[])?;
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    /// Run a format inline: its fields are emitted directly into the current node
    /// instead of a named child. Used when a block's layout is owned by another
    /// registered format.
    ///
    /// # Errors
    /// Same contract as [`Decoder::field_format`]
    pub fn format(&mut self, group: &str, in_arg: InArg<'_>) -> Result<OutArg> {
        if self.depth >= self.options.max_depth {
            return Err(Error::DepthExceeded(self.options.max_depth));
        }
        let (_, formats) = self.candidates(group)?;
        let start = self.pos;

        for &format in formats {
            let saved_children = self
                .stack
                .last()
                .map_or(0, |parent| parent.children().len());
            let saved_endian = self.endian;
            self.depth += 1;
            self.endian = Endian::Big;

            let result = (format.decode_fn)(self, in_arg);

            self.depth -= 1;
            self.endian = saved_endian;

            match result {
                Ok(out) => return Ok(out),
                Err(err) => {
                    if let Some(children) = self.current_mut().children_mut() {
                        children.truncate(saved_children);
                    }
                    self.pos = start;
                    if !err.is_probe_recoverable() {
                        return Err(err);
                    }
                }
            }
        }

        Err(Error::NoFormatMatched {
            group: group.to_string(),
        })
    }

    /// Dispatch a format against a different, already-reassembled bit source. On
    /// success the decoded tree is attached under `name` carrying its own buffer;
    /// on failure nothing is attached and the error is returned for the caller to
    /// handle.
    ///
    /// # Errors
    /// Same contract as [`Decoder::field_format`]; the tree is never mutated on error
    pub fn try_field_format_bit_buf(
        &mut self,
        name: &str,
        buf: BitBuf,
        group: &str,
        in_arg: InArg<'_>,
    ) -> Result<OutArg> {
        if self.depth >= self.options.max_depth {
            return Err(Error::DepthExceeded(self.options.max_depth));
        }
        let (registry, formats) = self.candidates(group)?;

        for &format in formats {
            let mut sub = Decoder::for_format(
                buf.clone(),
                registry,
                self.options,
                format,
                self.depth + 1,
                Some(name.to_string()),
            );
            match (format.decode_fn)(&mut sub, in_arg) {
                Ok(out) => {
                    let mut node = sub.finish();
                    node.buf = Some(buf);
                    self.attach(node).map_err(|e| self.ctx(name, e))?;
                    return Ok(out);
                }
                Err(err) if err.is_probe_recoverable() => {}
                Err(err) => return Err(err),
            }
        }

        Err(Error::NoFormatMatched {
            group: group.to_string(),
        })
    }

    /// Attach a separate bit source as a raw-bytes leaf carrying its own buffer.
    /// The fallback companion of [`Decoder::try_field_format_bit_buf`].
    ///
    /// # Errors
    /// [`Error::DuplicateFieldName`] under a struct parent
    pub fn field_root_bit_buf(&mut self, name: &str, buf: BitBuf) -> Result<()> {
        let bytes = buf.to_bytes()?;
        let mut node = Node::new(
            Some(name.to_string()),
            BitRange {
                start: 0,
                len: buf.len_bits(),
            },
            Value::Leaf(Scalar::from(Actual::Bytes(bytes))),
        );
        node.buf = Some(buf);
        self.attach(node).map_err(|e| self.ctx(name, e))
    }
}

/// Set a compound's range to cover its entry/exit span and every same-buffer child.
fn finalize_range(node: &mut Node, entry: u64, exit: u64) {
    let mut start = entry.min(exit);
    let mut end = entry.max(exit);
    for child in node.children() {
        if child.buf().is_some() {
            continue;
        }
        start = start.min(child.range().start);
        end = end.max(child.range().end());
    }
    node.range = BitRange {
        start,
        len: end - start,
    };
}

fn sign_extend(value: u64, bits: u32) -> i64 {
    if bits == 0 {
        return 0;
    }
    let shift = 64 - bits;
    ((value << shift) as i64) >> shift
}

fn reverse_bytes(value: u64, bits: u32) -> u64 {
    let nbytes = (bits + 7) / 8;
    let mut v = value;
    let mut out = 0u64;
    for _ in 0..nbytes {
        out = (out << 8) | (v & 0xff);
        v >>= 8;
    }
    out
}
