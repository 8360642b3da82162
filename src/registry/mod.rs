//! Format descriptors, the frozen registry, and the top-level decode entry points.
//!
//! Formats are registered during program start on a [`RegistryBuilder`]; `build()`
//! validates the set and freezes it into an immutable [`Registry`]. After the first
//! decode begins no further registration happens - the builder is consumed. Probing
//! iterates a group's members in `(probe_order, name)` order.
//!
//! # Key Components
//!
//! - [`Format`] - Immutable descriptor: name, groups, dependencies, decode entry,
//!   typed in/out argument convention, root shape, help
//! - [`RegistryBuilder`] / [`Registry`] - Init-phase registration and the frozen
//!   lookup table
//! - [`Registry::decode`] / [`Registry::probe`] - Top-level decode entry points
//! - [`InArg`] / [`OutArg`] - Opaque per-format arguments, downcast by format
//!   identity
//!
//! # Example
//!
//! ```rust
//! use bitscope::{BitBuf, DecodeOptions, Registry};
//!
//! let registry = Registry::standard()?;
//! let frame = vec![
//!     0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x00, 0x11, 0x22, 0x33, 0x44, 0x55,
//!     0xff, 0xff, 0xde, 0xad, 0xbe, 0xef,
//! ];
//! let decoded = registry.decode(
//!     BitBuf::from(frame),
//!     "ether8023_frame",
//!     bitscope::InArg::NONE,
//!     DecodeOptions::default(),
//! )?;
//! assert!(decoded.root.child("payload").is_some());
//! # Ok::<(), bitscope::Error>(())
//! ```

use std::any::Any;

use rustc_hash::FxHashMap;

use crate::{
    bitbuf::BitBuf,
    decode::{DecodeOptions, Decoder, Node},
    Error, Result,
};

/// A dependency declaration: the format and group names a format dispatches to.
///
/// Dependencies are descriptive; an empty group is legal and simply never matches
/// a probe. The registry exposes them so tooling can walk the format graph.
#[derive(Debug, Clone, Copy)]
pub struct Dependency {
    /// Format or group names this format invokes
    pub names: &'static [&'static str],
}

/// One worked example inside a format's help.
#[derive(Debug, Clone, Copy)]
pub struct HelpExample {
    /// What the example shows
    pub comment: &'static str,
    /// The query snippet
    pub code: &'static str,
}

/// A host function a format registers with the query evaluator.
#[derive(Debug, Clone, Copy)]
pub struct HelpFunction {
    /// Function name as exposed to queries
    pub name: &'static str,
    /// Worked examples
    pub examples: &'static [HelpExample],
}

/// An external reference for a format.
#[derive(Debug, Clone, Copy)]
pub struct HelpReference {
    /// Human title
    pub title: &'static str,
    /// Link target
    pub url: &'static str,
}

/// Optional per-format help surfaced through the registry read-view.
#[derive(Debug, Clone, Copy)]
pub struct FormatHelp {
    /// Free-form notes
    pub notes: &'static str,
    /// Registered query functions
    pub functions: &'static [HelpFunction],
    /// External references
    pub references: &'static [HelpReference],
}

/// The opaque in-argument handed to a format body.
///
/// Callers wrap a per-group record ([`crate::format::InetPacketIn`] and friends);
/// bodies downcast by the type they expect and must tolerate absence.
#[derive(Clone, Copy)]
pub struct InArg<'a>(Option<&'a dyn Any>);

impl<'a> InArg<'a> {
    /// The absent argument.
    pub const NONE: InArg<'static> = InArg(None);

    /// Wrap a typed argument.
    #[must_use]
    pub fn of<T: Any>(value: &'a T) -> InArg<'a> {
        InArg(Some(value))
    }

    /// Downcast to the record type the format expects, if present and matching.
    #[must_use]
    pub fn get<T: Any>(&self) -> Option<&'a T> {
        self.0.and_then(<dyn Any>::downcast_ref)
    }
}

/// The opaque out-argument a format body returns; absent when the format has
/// nothing to report back to its caller.
pub type OutArg = Option<Box<dyn Any>>;

/// A format body: receives the cursor and the caller's in-argument, returns its
/// out-argument. Bodies must not retain the cursor past return.
pub type DecodeFn = fn(&mut Decoder<'_>, InArg<'_>) -> Result<OutArg>;

/// Immutable descriptor of a registered format.
pub struct Format {
    /// Unique format name
    pub name: &'static str,
    /// Human description
    pub description: &'static str,
    /// Probe tie-break, low to high, then by name
    pub probe_order: i32,
    /// Groups this format is a candidate of
    pub groups: &'static [&'static str],
    /// Formats and groups this format dispatches to
    pub dependencies: &'static [Dependency],
    /// The decode entry point
    pub decode_fn: DecodeFn,
    /// Root node is an array instead of a struct
    pub root_array: bool,
    /// Name of the root node, used together with `root_array`
    pub root_name: Option<&'static str>,
    /// Host function names registered with the query evaluator
    pub functions: &'static [&'static str],
    /// Optional help block
    pub help: Option<&'static FormatHelp>,
}

/// The result of a top-level decode.
///
/// A fatal error mid-decode does not discard the work done before it: the partial
/// tree is kept in `root` and the error, annotated with the failing field's path
/// and bit position, lands in `error`.
pub struct Decoded {
    /// The format that produced the tree
    pub format: &'static Format,
    /// The decoded (possibly partial) tree
    pub root: Node,
    /// The format's out-argument; absent on failure
    pub out: OutArg,
    /// The fatal error that stopped the decode, if any
    pub error: Option<Error>,
}

impl std::fmt::Debug for Decoded {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Decoded")
            .field("format", &self.format.name)
            .field("root", &self.root)
            .field("out", &self.out.is_some())
            .field("error", &self.error)
            .finish()
    }
}

/// Init-phase registration handle. Consumed by [`RegistryBuilder::build`].
#[derive(Default)]
pub struct RegistryBuilder {
    formats: Vec<&'static Format>,
}

impl RegistryBuilder {
    /// Create an empty builder.
    #[must_use]
    pub fn new() -> Self {
        RegistryBuilder::default()
    }

    /// Register a format descriptor.
    pub fn register(&mut self, format: &'static Format) -> &mut Self {
        self.formats.push(format);
        self
    }

    /// Validate the registered set and freeze it.
    ///
    /// # Errors
    /// Returns [`Error::Registry`] if two formats share a name
    pub fn build(self) -> Result<Registry> {
        let mut resolve: FxHashMap<&'static str, Vec<&'static Format>> = FxHashMap::default();

        for &format in &self.formats {
            let by_name = resolve.entry(format.name).or_default();
            if by_name.iter().any(|f| f.name == format.name) {
                return Err(Error::Registry(format!(
                    "format `{}` registered twice",
                    format.name
                )));
            }
            by_name.push(format);
            for &group in format.groups {
                resolve.entry(group).or_default().push(format);
            }
        }

        for members in resolve.values_mut() {
            members.sort_by_key(|f| (f.probe_order, f.name));
        }

        Ok(Registry {
            formats: self.formats,
            resolve,
        })
    }
}

/// The frozen, process-wide format table.
///
/// Lookup-only once built; safe to share across threads and across decodes.
pub struct Registry {
    formats: Vec<&'static Format>,
    resolve: FxHashMap<&'static str, Vec<&'static Format>>,
}

impl Registry {
    /// Build a registry holding every built-in format.
    ///
    /// # Errors
    /// Returns [`Error::Registry`] if the built-in table is inconsistent
    pub fn standard() -> Result<Registry> {
        let mut builder = RegistryBuilder::new();
        for &format in crate::format::FORMATS {
            builder.register(format);
        }
        builder.build()
    }

    /// Every registered format, in registration order.
    #[must_use]
    pub fn formats(&self) -> &[&'static Format] {
        &self.formats
    }

    /// Look a format up by its exact name.
    #[must_use]
    pub fn format(&self, name: &str) -> Option<&'static Format> {
        self.formats.iter().copied().find(|f| f.name == name)
    }

    /// Resolve a format or group name to its probe candidates, sorted by
    /// `(probe_order, name)`.
    #[must_use]
    pub fn resolve(&self, name: &str) -> Option<&[&'static Format]> {
        self.resolve.get(name).map(Vec::as_slice)
    }

    /// Decode a bit source with one explicitly named format.
    ///
    /// A fatal error during the decode is returned inside [`Decoded::error`]
    /// together with the partial tree; `Err` means the decode could not start.
    ///
    /// # Errors
    /// Returns [`Error::UnknownFormat`] if no format carries that name
    pub fn decode(
        &self,
        bits: BitBuf,
        format: &str,
        in_arg: InArg<'_>,
        options: DecodeOptions,
    ) -> Result<Decoded> {
        let format = self
            .format(format)
            .ok_or_else(|| Error::UnknownFormat(format.to_string()))?;
        let mut d = Decoder::for_format(bits, self, options, format, 0, None);
        match (format.decode_fn)(&mut d, in_arg) {
            Ok(out) => Ok(Decoded {
                format,
                root: d.finish(),
                out,
                error: None,
            }),
            Err(err) => {
                let err = d.top_context(err);
                Ok(Decoded {
                    format,
                    root: d.finish(),
                    out: None,
                    error: Some(err),
                })
            }
        }
    }

    /// Trial-decode the candidates of a group in order and commit the first
    /// accepting format. Partial trees of failed candidates are discarded.
    ///
    /// # Errors
    /// Returns [`Error::NoFormatMatched`] when every candidate fails and
    /// [`Error::UnknownFormat`] for a name no format or group carries
    pub fn probe(
        &self,
        bits: BitBuf,
        group: &str,
        options: DecodeOptions,
    ) -> Result<Decoded> {
        let formats = self
            .resolve(group)
            .ok_or_else(|| Error::UnknownFormat(group.to_string()))?;

        for &format in formats {
            let mut d = Decoder::for_format(bits.clone(), self, options, format, 0, None);
            match (format.decode_fn)(&mut d, InArg::NONE) {
                Ok(out) => {
                    return Ok(Decoded {
                        format,
                        root: d.finish(),
                        out,
                        error: None,
                    })
                }
                Err(err) if err.is_probe_recoverable() => {}
                Err(err) => return Err(err),
            }
        }

        Err(Error::NoFormatMatched {
            group: group.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scalar::mappers::AssertU;

    fn decode_a(d: &mut Decoder<'_>, _in: InArg<'_>) -> Result<OutArg> {
        d.field_u("magic", 8, &[&AssertU(&[0xaa])])?;
        Ok(None)
    }

    fn decode_b(d: &mut Decoder<'_>, _in: InArg<'_>) -> Result<OutArg> {
        d.field_u("magic", 8, &[&AssertU(&[0xbb])])?;
        Ok(None)
    }

    static FORMAT_A: Format = Format {
        name: "aa",
        description: "A",
        probe_order: 10,
        groups: &["letters"],
        dependencies: &[],
        decode_fn: decode_a,
        root_array: false,
        root_name: None,
        functions: &[],
        help: None,
    };

    static FORMAT_B: Format = Format {
        name: "bb",
        description: "B",
        probe_order: 0,
        groups: &["letters"],
        dependencies: &[],
        decode_fn: decode_b,
        root_array: false,
        root_name: None,
        functions: &[],
        help: None,
    };

    fn registry() -> Registry {
        let mut builder = RegistryBuilder::new();
        builder.register(&FORMAT_A).register(&FORMAT_B);
        builder.build().unwrap()
    }

    #[test]
    fn groups_sort_by_probe_order_then_name() {
        let reg = registry();
        let members = reg.resolve("letters").unwrap();
        assert_eq!(members[0].name, "bb");
        assert_eq!(members[1].name, "aa");
    }

    #[test]
    fn resolve_by_format_name_is_a_singleton() {
        let reg = registry();
        assert_eq!(reg.resolve("aa").unwrap().len(), 1);
        assert!(reg.resolve("zz").is_none());
    }

    #[test]
    fn duplicate_registration_fails() {
        let mut builder = RegistryBuilder::new();
        builder.register(&FORMAT_A).register(&FORMAT_A);
        assert!(matches!(builder.build(), Err(Error::Registry(_))));
    }

    #[test]
    fn probe_commits_matching_candidate() {
        let reg = registry();
        let decoded = reg
            .probe(
                BitBuf::from(vec![0xaa]),
                "letters",
                DecodeOptions::default(),
            )
            .unwrap();
        assert_eq!(decoded.format.name, "aa");
    }

    #[test]
    fn probe_of_empty_source_matches_nothing() {
        let reg = registry();
        let err = reg
            .probe(BitBuf::from(Vec::new()), "letters", DecodeOptions::default())
            .unwrap_err();
        assert!(matches!(err, Error::NoFormatMatched { .. }));
    }

    #[test]
    fn explicit_decode_keeps_partial_tree_on_failure() {
        let reg = registry();
        let decoded = reg
            .decode(
                BitBuf::from(vec![0xbb]),
                "aa",
                InArg::NONE,
                DecodeOptions::default(),
            )
            .unwrap();
        let err = decoded.error.unwrap();
        assert!(matches!(err.root_cause(), Error::Assertion(_)));
    }

    #[test]
    fn in_arg_downcasts_by_type() {
        let value = 7u32;
        let arg = InArg::of(&value);
        assert_eq!(arg.get::<u32>(), Some(&7));
        assert!(arg.get::<u64>().is_none());
        assert!(InArg::NONE.get::<u32>().is_none());
    }
}
