//! Engine-level integration tests: universal tree invariants, probe rollback,
//! recursion bounds, duplicate-name rejection, and length-framed remainders.

use bitscope::prelude::*;

// ----------------------------------------------------------------------
// Test formats
// ----------------------------------------------------------------------

fn decode_inner(d: &mut Decoder<'_>, _in_arg: InArg<'_>) -> Result<OutArg> {
    d.field_u("magic", 8, &[&AssertU(&[0x7f])])?;
    d.field_u("value", 8, &[])?;
    Ok(None)
}

static INNER: Format = Format {
    name: "inner",
    description: "inner test format",
    probe_order: 0,
    groups: &["inner_group"],
    dependencies: &[],
    decode_fn: decode_inner,
    root_array: false,
    root_name: None,
    functions: &[],
    help: None,
};

fn decode_outer(d: &mut Decoder<'_>, _in_arg: InArg<'_>) -> Result<OutArg> {
    d.field_u("head", 8, &[])?;
    d.field_format_or_raw_len("body", d.bits_left(), "inner_group", InArg::NONE)?;
    Ok(None)
}

static OUTER: Format = Format {
    name: "outer",
    description: "outer test format",
    probe_order: 0,
    groups: &[],
    dependencies: &[Dependency {
        names: &["inner_group"],
    }],
    decode_fn: decode_outer,
    root_array: false,
    root_name: None,
    functions: &[],
    help: None,
};

fn decode_framing(d: &mut Decoder<'_>, _in_arg: InArg<'_>) -> Result<OutArg> {
    d.field_format_len("sub", 32, "inner", InArg::NONE)?;
    d.field_u("tail", 8, &[])?;
    Ok(None)
}

static FRAMING: Format = Format {
    name: "framing",
    description: "length-framed sub-format",
    probe_order: 0,
    groups: &[],
    dependencies: &[Dependency { names: &["inner"] }],
    decode_fn: decode_framing,
    root_array: false,
    root_name: None,
    functions: &[],
    help: None,
};

fn decode_recursive(d: &mut Decoder<'_>, _in_arg: InArg<'_>) -> Result<OutArg> {
    d.field_u("n", 8, &[])?;
    d.field_format("next", "recurse", InArg::NONE)?;
    Ok(None)
}

static RECURSIVE: Format = Format {
    name: "recursive",
    description: "self-recursive format",
    probe_order: 0,
    groups: &["recurse"],
    dependencies: &[Dependency { names: &["recurse"] }],
    decode_fn: decode_recursive,
    root_array: false,
    root_name: None,
    functions: &[],
    help: None,
};

fn decode_duplicate(d: &mut Decoder<'_>, _in_arg: InArg<'_>) -> Result<OutArg> {
    d.field_u("x", 8, &[])?;
    d.field_u("x", 8, &[])?;
    Ok(None)
}

static DUPLICATE: Format = Format {
    name: "duplicate",
    description: "emits one name twice",
    probe_order: 0,
    groups: &[],
    dependencies: &[],
    decode_fn: decode_duplicate,
    root_array: false,
    root_name: None,
    functions: &[],
    help: None,
};

static VALUE_NAMES: UToSymStr = UToSymStr(&[(1, "one"), (2, "two")]);

fn decode_plain(d: &mut Decoder<'_>, _in_arg: InArg<'_>) -> Result<OutArg> {
    d.field_u("a", 4, &[])?;
    d.field_u("b", 12, &[])?;
    d.field_struct("s", |d| {
        d.field_u("c", 8, &[])?;
        Ok(())
    })?;
    Ok(None)
}

fn decode_mapped(d: &mut Decoder<'_>, _in_arg: InArg<'_>) -> Result<OutArg> {
    d.field_u("a", 4, &[&VALUE_NAMES, &ActualHex])?;
    d.field_u("b", 12, &[&ActualBin])?;
    d.field_struct("s", |d| {
        d.field_u("c", 8, &[&VALUE_NAMES])?;
        Ok(())
    })?;
    Ok(None)
}

static PLAIN: Format = Format {
    name: "plain",
    description: "layout without mappers",
    probe_order: 0,
    groups: &[],
    dependencies: &[],
    decode_fn: decode_plain,
    root_array: false,
    root_name: None,
    functions: &[],
    help: None,
};

static MAPPED: Format = Format {
    name: "mapped",
    description: "same layout with mappers",
    probe_order: 0,
    groups: &[],
    dependencies: &[],
    decode_fn: decode_mapped,
    root_array: false,
    root_name: None,
    functions: &[],
    help: None,
};

fn registry() -> Registry {
    let mut builder = RegistryBuilder::new();
    builder
        .register(&INNER)
        .register(&OUTER)
        .register(&FRAMING)
        .register(&RECURSIVE)
        .register(&DUPLICATE)
        .register(&PLAIN)
        .register(&MAPPED);
    builder.build().unwrap()
}

fn decode(format: &str, bytes: Vec<u8>) -> Decoded {
    decode_with(format, bytes, DecodeOptions::default())
}

fn decode_with(format: &str, bytes: Vec<u8>, options: DecodeOptions) -> Decoded {
    registry()
        .decode(BitBuf::from(bytes), format, InArg::NONE, options)
        .unwrap()
}

// ----------------------------------------------------------------------
// Universal invariants
// ----------------------------------------------------------------------

/// Walks a tree checking the invariants every successful decode upholds:
/// compound ranges cover their children, sibling ranges advance without
/// overlap, struct sibling names are pairwise distinct. Returns the summed
/// leaf range length.
fn check_invariants(node: &Node) -> u64 {
    let children = node.children();

    if node.kind() == NodeKind::Struct {
        for (i, a) in children.iter().enumerate() {
            for b in &children[i + 1..] {
                assert_ne!(a.name(), b.name(), "duplicate sibling name under struct");
            }
        }
    }

    if node.kind() == NodeKind::Leaf {
        return node.range().len;
    }

    let mut sum = 0;
    let mut prev_end = node.range().start;
    for child in children {
        if child.buf().is_some() {
            // trees decoded from their own buffer have their own coordinates
            sum += check_invariants(child);
            continue;
        }
        assert!(
            child.range().start >= node.range().start
                && child.range().end() <= node.range().end(),
            "child range escapes its parent"
        );
        assert!(
            child.range().start >= prev_end,
            "sibling ranges overlap or regress"
        );
        prev_end = child.range().end();
        sum += check_invariants(child);
    }
    sum
}

#[test]
fn invariants_hold_for_nested_dispatch() {
    let decoded = decode("outer", vec![0x01, 0x7f, 0x42]);
    assert!(decoded.error.is_none());
    let leaf_bits = check_invariants(&decoded.root);
    assert!(leaf_bits <= 3 * 8);
    assert_eq!(decoded.root.range().len, 24);
}

#[test]
fn invariants_hold_for_builtin_formats() {
    let registry = Registry::standard().unwrap();

    // ethernet frame carrying an unknown-protocol ipv4 packet
    let mut frame = vec![0xff; 6];
    frame.extend_from_slice(&[0, 1, 2, 3, 4, 5]);
    frame.extend_from_slice(&[0x08, 0x00]);
    frame.extend_from_slice(&[
        0x45, 0x00, 0x00, 0x18, 0x00, 0x00, 0x00, 0x00, 0x40, 0xfd, 0x00, 0x00, 10, 0, 0, 1, 10,
        0, 0, 2, 0xaa, 0xbb, 0xcc, 0xdd,
    ]);
    let source_bits = frame.len() as u64 * 8;

    let decoded = registry
        .decode(
            BitBuf::from(frame),
            "ether8023_frame",
            InArg::NONE,
            DecodeOptions::default(),
        )
        .unwrap();
    assert!(decoded.error.is_none());
    let leaf_bits = check_invariants(&decoded.root);
    assert!(leaf_bits <= source_bits);
}

#[test]
fn identity_decode_has_same_shape_and_actuals() {
    let bytes = vec![0x12, 0x34, 0x02];
    let plain = decode("plain", bytes.clone());
    let mapped = decode("mapped", bytes);
    assert!(plain.error.is_none());
    assert!(mapped.error.is_none());

    assert!(plain.root.same_shape(&mapped.root));

    fn actuals(node: &Node, out: &mut Vec<Actual>) {
        if let Some(s) = node.scalar() {
            out.push(s.actual.clone());
        }
        for child in node.children() {
            actuals(child, out);
        }
    }
    let mut plain_actuals = Vec::new();
    let mut mapped_actuals = Vec::new();
    actuals(&plain.root, &mut plain_actuals);
    actuals(&mapped.root, &mut mapped_actuals);
    assert_eq!(plain_actuals, mapped_actuals);
}

// ----------------------------------------------------------------------
// Dispatch behaviors
// ----------------------------------------------------------------------

#[test]
fn probe_failure_rolls_back_and_falls_to_raw() {
    // wrong inner magic: the candidate fails mid-decode and must leave no trace
    let decoded = decode("outer", vec![0x01, 0x00, 0x42]);
    assert!(decoded.error.is_none());

    let body = decoded.root.child("body").unwrap();
    assert_eq!(body.kind(), NodeKind::Leaf);
    assert_eq!(body.range().len, 16);
    assert!(body.child("magic").is_none());
    check_invariants(&decoded.root);
}

#[test]
fn length_framed_remainder_becomes_unknown_leaf() {
    let decoded = decode("framing", vec![0x7f, 0x01, 0xaa, 0xbb, 0xcc]);
    assert!(decoded.error.is_none(), "{:?}", decoded.error);

    let sub = decoded.root.child("sub").unwrap();
    assert_eq!(sub.range().len, 32);
    let unknown = sub.child("unknown").unwrap();
    assert_eq!(unknown.kind(), NodeKind::Leaf);
    assert_eq!(unknown.range().len, 16);

    // the cursor landed exactly past the frame
    let tail = decoded.root.child("tail").unwrap();
    assert_eq!(tail.range().start, 32);
    assert_eq!(tail.scalar().unwrap().actual_u(), Some(0xcc));
}

#[test]
fn recursion_depth_is_bounded() {
    let decoded = decode_with(
        "recursive",
        vec![0x00; 64],
        DecodeOptions { max_depth: 8 },
    );
    let err = decoded.error.unwrap();
    assert!(matches!(err.root_cause(), Error::DepthExceeded(8)));
}

#[test]
fn duplicate_field_name_fails_and_keeps_first() {
    let decoded = decode("duplicate", vec![0xaa, 0xbb]);
    let err = decoded.error.unwrap();
    assert!(matches!(err.root_cause(), Error::DuplicateFieldName(n) if n == "x"));

    let x = decoded.root.child("x").unwrap();
    assert_eq!(x.scalar().unwrap().actual_u(), Some(0xaa));
    assert_eq!(decoded.root.len(), 1);
}

#[test]
fn fatal_error_reports_path_and_position() {
    // the length-framed sub-format asks for 32 bits of an 8-bit source
    let decoded = decode("framing", vec![0x7f]);
    let err = decoded.error.unwrap();
    let message = err.to_string();
    assert!(message.contains("sub"), "unexpected error: {message}");
    assert!(matches!(err.root_cause(), Error::OutOfRange { .. }));
}
