//! PlayReady PSSH data: a little-endian record loop with UTF-16LE XML payloads.

use crate::{
    decode::{Decoder, Endian},
    format::names,
    registry::{Format, InArg, OutArg},
    scalar::mappers::UToSymStr,
    Result,
};

/// PlayReady PSSH data.
pub static FORMAT: Format = Format {
    name: names::PSSH_PLAYREADY,
    description: "PlayReady PSSH",
    probe_order: 0,
    groups: &[],
    dependencies: &[],
    decode_fn: decode_pssh_playready,
    root_array: false,
    root_name: None,
    functions: &[],
    help: None,
};

const RECORD_RIGHTS_MANAGEMENT_HEADER: u64 = 1;
const RECORD_LICENSE_STORE: u64 = 2;

static RECORD_TYPES: UToSymStr = UToSymStr(&[
    (RECORD_RIGHTS_MANAGEMENT_HEADER, "Rights management header"),
    (RECORD_LICENSE_STORE, "License store"),
]);

fn decode_pssh_playready(d: &mut Decoder<'_>, _in_arg: InArg<'_>) -> Result<OutArg> {
    d.endian = Endian::Little;

    d.field_u("size", 32, &[])?;
    let count = d.field_u("count", 16, &[])?;
    d.field_struct_array_loop(
        "records",
        "record",
        |_, i| (i as u64) < count,
        |d| {
            let record_type = d.field_u("type", 16, &[&RECORD_TYPES])?;
            let record_len = d.field_u("len", 16, &[])?;
            match record_type {
                RECORD_RIGHTS_MANAGEMENT_HEADER | RECORD_LICENSE_STORE => {
                    d.field_utf16le("xml", record_len, &[])?;
                }
                _ => {
                    d.field_raw_len("data", record_len * 8, &[])?;
                }
            }
            Ok(())
        },
    )?;

    Ok(None)
}
