//! Vorbis comment header.

use crate::{
    decode::{Decoder, Endian},
    format::names,
    registry::{Format, FormatHelp, HelpReference, InArg, OutArg},
    Result,
};

/// Vorbis comment header: little-endian length-prefixed vendor string and
/// `key=value` user comment list.
pub static FORMAT: Format = Format {
    name: names::VORBIS_COMMENT,
    description: "Vorbis comment",
    probe_order: 0,
    groups: &[],
    dependencies: &[],
    decode_fn: decode_comment,
    root_array: false,
    root_name: None,
    functions: &[],
    help: Some(&HELP),
};

static HELP: FormatHelp = FormatHelp {
    notes: "",
    functions: &[],
    references: &[HelpReference {
        title: "Vorbis I specification",
        url: "https://xiph.org/vorbis/doc/Vorbis_I_spec.html",
    }],
};

fn decode_comment(d: &mut Decoder<'_>, _in_arg: InArg<'_>) -> Result<OutArg> {
    d.endian = Endian::Little;

    let vendor_length = d.field_u("vendor_length", 32, &[])?;
    d.field_utf8("vendor", vendor_length, &[])?;
    let user_comment_count = d.field_u("user_comment_list_length", 32, &[])?;
    d.field_struct_array_loop(
        "user_comments",
        "comment",
        |_, i| (i as u64) < user_comment_count,
        |d| {
            let length = d.field_u("length", 32, &[])?;
            d.field_utf8("comment", length, &[])?;
            Ok(())
        },
    )?;

    Ok(None)
}
